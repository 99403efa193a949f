//! Request-layer errors with structured JSON responses.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};
use trajedit_core::EngineError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Malformed document: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Engine(EngineError::StaleEdit { .. }) => StatusCode::CONFLICT,
            Self::Engine(EngineError::NoMatch { .. }) => StatusCode::NOT_FOUND,
            Self::Engine(_) | Self::InvalidJson(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Engine(e) => e.kind(),
            Self::InvalidJson(_) => "MALFORMED_DOCUMENT",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            error!(error_code = code, message = %message, "API error");
        } else {
            debug!(error_code = code, message = %message, "Client error");
        }

        let body = ErrorResponse {
            error: message,
            code,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_map_to_status() {
        let stale = ApiError::from(EngineError::StaleEdit { step: 2 });
        assert_eq!(stale.status_code(), StatusCode::CONFLICT);
        assert_eq!(stale.error_code(), "STALE_EDIT");

        let no_match = ApiError::from(EngineError::NoMatch {
            pattern: "x".to_string(),
        });
        assert_eq!(no_match.status_code(), StatusCode::NOT_FOUND);

        let range = ApiError::from(EngineError::OutOfRange { step: 9, steps: 3 });
        assert_eq!(range.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(range.error_code(), "OUT_OF_RANGE");
    }

    #[test]
    fn test_invalid_json_is_malformed_document() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let api = ApiError::from(err);
        assert_eq!(api.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(api.error_code(), "MALFORMED_DOCUMENT");
    }

    #[test]
    fn test_io_is_server_error() {
        let api = ApiError::from(std::io::Error::other("disk full"));
        assert_eq!(api.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.error_code(), "IO_ERROR");
    }
}
