//! HTTP error envelope.
//!
//! ## Status Mapping
//! ```text
//! ErrorKind::Validation  → 400  {"error", "details": [{field, message}]}
//! ErrorKind::NotFound    → 404  {"error"}
//! ErrorKind::Conflict    → 409  {"error"}
//! ErrorKind::Storage     → 500  {"error": "Internal server error"}
//! malformed JSON body    → 400  {"error"}
//! undecodable query      → 400  {"error"}
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use catalog_core::{CoreError, ErrorKind, ValidationErrors};
use catalog_db::DbError;
use serde::Serialize;
use thiserror::Error;

/// Errors a handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Catalog(#[from] DbError),

    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error("Invalid query string: {0}")]
    BadQuery(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadQuery(rejection.body_text())
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        ApiError::Catalog(DbError::Domain(error))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<FieldError>,
}

fn details(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .errors()
        .iter()
        .map(|e| FieldError {
            field: e.field().to_string(),
            message: e.to_string(),
        })
        .collect()
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) | ApiError::BadQuery(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: message,
                    details: Vec::new(),
                },
            ),
            ApiError::Catalog(error) => {
                let status = status_for(error.kind());
                let details = match &error {
                    DbError::Domain(CoreError::Validation(errors)) => details(errors),
                    _ => Vec::new(),
                };
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %error, "Catalog storage failure");
                    "Internal server error".to_string()
                } else {
                    error.to_string()
                };
                (
                    status,
                    ErrorBody {
                        error: message,
                        details,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::ValidationError;

    #[test]
    fn test_status_by_kind() {
        let cases = [
            (ApiError::from(CoreError::not_found("Product", "p1")), StatusCode::NOT_FOUND),
            (
                ApiError::from(DbError::duplicate("sku", "MILK-1")),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(CoreError::InsufficientStock {
                    id: "p1".into(),
                    available: 1,
                    requested: -3,
                }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(CoreError::NothingToUpdate {
                    entity: "Product".into(),
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(DbError::QueryFailed("disk I/O error".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::BadRequest("EOF".into()), StatusCode::BAD_REQUEST),
            (ApiError::BadQuery("duplicate field".into()), StatusCode::BAD_REQUEST),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_validation_details() {
        let mut errors = ValidationErrors::new();
        errors.push(ValidationError::Required { field: "name".into() });
        errors.push(ValidationError::Negative { field: "stock".into() });

        let body = match ApiError::from(CoreError::Validation(errors)) {
            ApiError::Catalog(DbError::Domain(CoreError::Validation(errors))) => details(&errors),
            other => panic!("unexpected error: {other}"),
        };

        assert_eq!(body.len(), 2);
        assert_eq!(body[0].field, "name");
        assert_eq!(body[1].message, "stock must not be negative");
    }
}
