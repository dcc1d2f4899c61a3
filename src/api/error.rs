use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::DomainError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Too many requests. Slow down.")]
    TooManyRequests,

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::TooManyRequests => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            Self::Multipart(e) => (e.status(), e.body_text()),
            Self::Domain(e) => match e {
                DomainError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                DomainError::TooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
                DomainError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
                DomainError::ExternalService(_) => (
                    StatusCode::BAD_GATEWAY,
                    "Upstream model service failed".to_string(),
                ),
                DomainError::Storage(_)
                | DomainError::Inconsistent { .. }
                | DomainError::Internal(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                ),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> (StatusCode, String) {
        err.status_and_message()
    }

    #[test]
    fn test_domain_errors_map_to_statuses() {
        assert_eq!(
            status_of(DomainError::validation("Empty query").into()),
            (StatusCode::BAD_REQUEST, "Empty query".to_string())
        );
        assert_eq!(
            status_of(DomainError::TooLarge("Uploaded file too large".into()).into()).0,
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_of(DomainError::external("timeout").into()).0,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(DomainError::Inconsistent { index: 1, records: 2 }.into()),
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string()
            )
        );
    }

    #[test]
    fn test_rate_limit_message() {
        assert_eq!(
            status_of(ApiError::TooManyRequests),
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Slow down.".to_string()
            )
        );
    }
}
