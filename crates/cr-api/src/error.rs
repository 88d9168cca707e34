use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{borrow::Cow, future::Future};
use thiserror::Error;
use tracing::error;

use cr_common::catalog::CatalogError;
use cr_common::profile::QuestionBankError;
use cr_common::{InputError, PredictorError, RecommendError};

use crate::llm::LlmError;

tokio::task_local! {
    static REQUEST_ID: String;
}

fn sanitize_message(message: &str) -> String {
    const MAX_LEN: usize = 240;

    let mut cleaned = message
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .replace(['\n', '\r'], " ");

    cleaned = cleaned
        .split_whitespace()
        .map(|token| {
            if token.contains("://") {
                "[redacted-url]".to_string()
            } else if let Some((base, _)) = token.split_once('?') {
                if base.is_empty() {
                    "[redacted-query]".to_string()
                } else {
                    format!("{base}?[redacted]")
                }
            } else if token.starts_with('/') || token.contains('\\') {
                "[redacted-path]".to_string()
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.len() > MAX_LEN {
        let mut cut = MAX_LEN;
        while !cleaned.is_char_boundary(cut) {
            cut -= 1;
        }
        cleaned.truncate(cut);
        cleaned.push('…');
    }

    if cleaned.trim().is_empty() {
        "unexpected error".to_string()
    } else {
        cleaned
    }
}

pub async fn with_request_id<Fut, T>(request_id: Option<String>, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    if let Some(request_id) = request_id {
        REQUEST_ID.scope(request_id, fut).await
    } else {
        fut.await
    }
}

pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|value| value.clone()).ok()
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("too many requests: {0}")]
    TooManyRequests(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("upstream error: {0}")]
    BadGateway(String),
    #[error("upstream timeout: {0}")]
    GatewayTimeout(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    request_id: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let code = self.code();
        let request_id = current_request_id();

        error!(
            code,
            status = %status,
            request_id = request_id.as_deref().unwrap_or(""),
            error = %self,
            "api_error"
        );

        let body = Json(ErrorResponse {
            code,
            message: self.public_message().into_owned(),
            request_id,
        });

        (status, body).into_response()
    }
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::TooManyRequests(_) => "too_many_requests",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::BadGateway(_) => "bad_gateway",
            ApiError::GatewayTimeout(_) => "gateway_timeout",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn public_message(&self) -> Cow<'static, str> {
        match self {
            ApiError::BadRequest(msg) => Cow::Owned(sanitize_message(msg)),
            ApiError::NotFound(msg) => Cow::Owned(sanitize_message(msg)),
            ApiError::Conflict(msg) => Cow::Owned(sanitize_message(msg)),
            ApiError::ServiceUnavailable(msg) => Cow::Owned(sanitize_message(msg)),
            ApiError::TooManyRequests(_) => Cow::Borrowed("too many requests"),
            ApiError::BadGateway(_) => Cow::Borrowed("upstream service failed"),
            ApiError::GatewayTimeout(_) => Cow::Borrowed("upstream service timed out"),
            ApiError::Internal(_) => Cow::Borrowed("internal server error"),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<InputError> for ApiError {
    fn from(value: InputError) -> Self {
        ApiError::BadRequest(value.to_string())
    }
}

impl From<RecommendError> for ApiError {
    fn from(value: RecommendError) -> Self {
        match value {
            RecommendError::Input(err) => err.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PredictorError> for ApiError {
    fn from(value: PredictorError) -> Self {
        match value {
            PredictorError::ModelNotTrained(_) | PredictorError::TrainingInProgress(_) => {
                ApiError::Conflict(value.to_string())
            }
            PredictorError::Unavailable(_) => ApiError::ServiceUnavailable(value.to_string()),
            PredictorError::Training(_) | PredictorError::Persistence(_) => {
                ApiError::Internal(value.to_string())
            }
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(value: LlmError) -> Self {
        match value {
            LlmError::Timeout(_) => ApiError::GatewayTimeout(value.to_string()),
            LlmError::MissingApiKey(_) => ApiError::ServiceUnavailable(value.to_string()),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::Empty => ApiError::ServiceUnavailable(value.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<QuestionBankError> for ApiError {
    fn from(value: QuestionBankError) -> Self {
        ApiError::Internal(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use serde_json::Value;

    use super::*;
    use cr_common::predictor::ModelKind;

    #[tokio::test]
    async fn includes_request_id_in_response_body_when_present() {
        let err = ApiError::Internal("boom".into());
        let response = with_request_id(Some("req-123".into()), async { err.into_response() }).await;

        let (parts, body) = response.into_parts();
        assert_eq!(parts.status, StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = body.collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["request_id"], "req-123");
        assert_eq!(json["message"], "internal server error");
    }

    #[test]
    fn sanitize_redacts_paths_and_urls() {
        let cleaned = sanitize_message("read /etc/models/neural.json via https://host/x failed");

        assert_eq!(cleaned, "read [redacted-path] via [redacted-url] failed");
    }

    #[test]
    fn sanitize_truncates_on_char_boundary() {
        let cleaned = sanitize_message(&"á".repeat(300));

        assert!(cleaned.ends_with('…'));
        assert!(cleaned.len() <= 240 + '…'.len_utf8());
    }

    #[test]
    fn engine_errors_map_to_status_codes() {
        assert_eq!(
            ApiError::from(InputError::InvalidCode("XX".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(PredictorError::TrainingInProgress(ModelKind::Forest)).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(PredictorError::Unavailable("off".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(RecommendError::NoPrediction("none".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(LlmError::Timeout(std::time::Duration::from_secs(3))).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError::from(LlmError::EmptyResponse).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn broken_question_bank_is_internal() {
        let err = cr_common::profile::QuestionBank::parse("{", "[]").unwrap_err();

        let api = ApiError::from(err);

        assert_eq!(api.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.public_message(), "internal server error");
    }
}
