//! API error types and dialect-specific response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Which wire format the caller speaks; decides the error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    OpenAi,
    Anthropic,
}

#[derive(Debug)]
pub enum ApiError {
    /// Bad body shape, missing required fields, out-of-range values. 400.
    InvalidRequest { dialect: Dialect, message: String },
    /// Upstream or internal failure after a valid request. 500.
    Internal { dialect: Dialect, message: String },
}

impl ApiError {
    pub fn invalid(dialect: Dialect, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            dialect,
            message: message.into(),
        }
    }

    pub fn internal(dialect: Dialect, message: impl Into<String>) -> Self {
        Self::Internal {
            dialect,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, dialect, error_type, message) = match self {
            ApiError::InvalidRequest { dialect, message } => (
                StatusCode::BAD_REQUEST,
                dialect,
                "invalid_request_error",
                message,
            ),
            ApiError::Internal { dialect, message } => {
                let error_type = match dialect {
                    Dialect::OpenAi => "api_error",
                    Dialect::Anthropic => "internal_error",
                };
                (StatusCode::INTERNAL_SERVER_ERROR, dialect, error_type, message)
            }
        };

        tracing::error!("request failed ({status}): {message}");

        let body = match dialect {
            Dialect::OpenAi => json!({
                "error": {
                    "message": message,
                    "type": error_type,
                    "param": null,
                    "code": null,
                }
            }),
            Dialect::Anthropic => json!({
                "type": "error",
                "error": {
                    "type": error_type,
                    "message": message,
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_invalid_envelope() {
        let response = ApiError::invalid(Dialect::OpenAi, "missing required field: model");
        let rendered = response.into_response();
        assert_eq!(rendered.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_anthropic_internal_envelope() {
        let response = ApiError::internal(Dialect::Anthropic, "upstream exploded");
        let rendered = response.into_response();
        assert_eq!(rendered.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
