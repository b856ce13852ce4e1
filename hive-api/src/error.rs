//! API error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hive_core::CoreError;
use serde::Serialize;
use thiserror::Error;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ApiError {
    fn status_code_message(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            ApiError::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
            ApiError::Core(e) => Self::map_core(e),
        }
    }

    /// Translate engine errors into the HTTP taxonomy: missing entities are
    /// 404, precondition and validation failures are 400, authorization
    /// failures are 403, upstream failures are 500.
    fn map_core(e: &CoreError) -> (StatusCode, &'static str, String) {
        match e {
            CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
            CoreError::NotAParty { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN", e.to_string()),
            CoreError::InvalidTransition { .. }
            | CoreError::AlreadyAssigned(_)
            | CoreError::PaymentIncomplete(_)
            | CoreError::StartTimePassed(_)
            | CoreError::ApprovalNotRequested(_) => {
                (StatusCode::BAD_REQUEST, "STATE_CONFLICT", e.to_string())
            }
            CoreError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
            }
            CoreError::InvalidSignature(_) | CoreError::InvalidPayload(_) => {
                (StatusCode::BAD_REQUEST, "WEBHOOK_REJECTED", e.to_string())
            }
            CoreError::Gateway(_)
            | CoreError::Scheduler(_)
            | CoreError::Storage(_)
            | CoreError::Configuration(_) => {
                // Do not leak upstream detail to clients
                tracing::error!(error = %e, "upstream dependency failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An error occurred while processing the request".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.status_code_message();

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        let (status, code, _) = ApiError::Core(CoreError::NotFound {
            entity: "booking",
            id: "b-1".to_string(),
        })
        .status_code_message();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");

        let (status, _, _) = ApiError::Core(CoreError::NotAParty {
            actor: "u".to_string(),
            booking: "b".to_string(),
        })
        .status_code_message();
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, code, _) =
            ApiError::Core(CoreError::AlreadyAssigned("b-1".to_string())).status_code_message();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "STATE_CONFLICT");
    }

    #[test]
    fn test_upstream_errors_do_not_leak_detail() {
        let (status, _, message) =
            ApiError::Core(CoreError::Gateway("secret detail".to_string()))
                .status_code_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("secret detail"));
    }
}
