use axum::{body::Body, http::Request, http::StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

#[tokio::test]
async fn livez_healthy_and_catalog_listed() {
    let app = cr_api::create_router(cr_api::test_state());

    let livez_response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/livez")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(livez_response.status(), StatusCode::OK);
    assert!(livez_response.headers().contains_key("x-request-id"));

    let careers = app
        .oneshot(
            Request::builder()
                .uri("/api/careers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(careers.status(), StatusCode::OK);
    let bytes = careers.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json.as_array().map(Vec::len), Some(5));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = cr_api::create_router(cr_api::test_state());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/nothing-here")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn question_banks_are_served() {
    let app = cr_api::create_router(cr_api::test_state());

    for (uri, key) in [
        ("/api/questions/mbti", "mbti_questions"),
        ("/api/questions/multiple-intelligence", "mi_questions"),
    ] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json[key].as_array().map(Vec::len), Some(16), "{uri}");
    }
}
