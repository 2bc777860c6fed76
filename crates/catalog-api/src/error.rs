//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping internal errors to appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use catalog_core::error::CatalogError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 422 Unprocessable Entity - text the embedder rejects, or wrong vector size.
    UnprocessableEntity(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 503 Service Unavailable - record store unreachable.
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, message) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg),
            ApiError::NotFound(msg) => ("not_found", msg),
            ApiError::UnprocessableEntity(msg) => ("unprocessable_entity", msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                ("internal_error", msg)
            }
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg),
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match &err {
            CatalogError::Embedding(_) | CatalogError::DimensionMismatch { .. } => {
                ApiError::UnprocessableEntity(err.to_string())
            }
            CatalogError::Connection(_) => ApiError::ServiceUnavailable(err.to_string()),
            CatalogError::Config(msg) => ApiError::BadRequest(msg.clone()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_status_mapping() {
        let cases = [
            (CatalogError::Embedding("empty".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (
                CatalogError::DimensionMismatch {
                    expected: 384,
                    actual: 3,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (CatalogError::Connection("down".into()), StatusCode::SERVICE_UNAVAILABLE),
            (CatalogError::Config("bad".into()), StatusCode::BAD_REQUEST),
            (CatalogError::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_dimension_message_is_kept() {
        let err = ApiError::from(CatalogError::DimensionMismatch {
            expected: 384,
            actual: 3,
        });
        match err {
            ApiError::UnprocessableEntity(msg) => assert!(msg.contains("expected 384")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
