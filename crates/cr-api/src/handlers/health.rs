use std::sync::atomic::Ordering;

use axum::{Json, extract::State};
use serde_json::json;

use crate::SharedState;
use crate::error::ApiError;

pub async fn livez() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn readyz(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.readiness.load(Ordering::SeqCst) {
        return Err(ApiError::ServiceUnavailable("shutting_down".into()));
    }
    if state.catalog.is_empty() {
        return Err(ApiError::ServiceUnavailable("catalog_empty".into()));
    }

    let registry = state.registry();
    let models = registry
        .statuses()
        .into_iter()
        .map(|status| (status.kind.name(), status.state))
        .collect::<std::collections::BTreeMap<_, _>>();

    Ok(Json(json!({
        "status": "ok",
        "careers": state.catalog.len(),
        "models": models,
        "semantic": registry.semantic_available(),
        "llm": state.llm.as_ref().map(|client| client.provider_name()),
        "application": env!("CARGO_PKG_NAME"),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_state;

    #[tokio::test]
    async fn readyz_rejects_when_readiness_disabled() {
        let state = test_state();
        state.readiness.store(false, Ordering::SeqCst);

        let result = readyz(State(state)).await;

        match result {
            Err(ApiError::ServiceUnavailable(code)) => {
                assert!(code.contains("shutting_down"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn readyz_reports_untrained_models() {
        let Json(body) = readyz(State(test_state())).await.unwrap();

        assert_eq!(body["careers"], 5);
        assert_eq!(body["models"]["neural"], "untrained");
        assert_eq!(body["models"]["forest"], "untrained");
        assert_eq!(body["llm"], "mock");
    }
}
