//! Error handling for the Pharmacy Management Platform
//!
//! Services return typed [`AppError`] values; the HTTP status is chosen only
//! when an error is turned into a response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::AllocationError;
use thiserror::Error;

/// PostgreSQL SQLSTATE codes that mean "another transaction got there first"
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions: requires {0}")]
    InsufficientPermissions(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Stock and concurrency errors
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: i64,
        available: i64,
        requested: i64,
    },

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),
}

impl AppError {
    /// Validation failure on a named field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrencyConflict(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let code = db_err.code().map(|c| c.into_owned());
            match code.as_deref() {
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) | Some(LOCK_NOT_AVAILABLE) => {
                    return AppError::ConcurrencyConflict(db_err.message().to_string());
                }
                Some(FOREIGN_KEY_VIOLATION) => {
                    return AppError::Conflict {
                        resource: db_err.constraint().unwrap_or("reference").to_string(),
                        message: "Record is still referenced by other data".to_string(),
                    };
                }
                Some(CHECK_VIOLATION) => {
                    return AppError::Conflict {
                        resource: db_err.constraint().unwrap_or("check").to_string(),
                        message: db_err.message().to_string(),
                    };
                }
                _ => {}
            }
        }

        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record".to_string()),
            sqlx::Error::PoolTimedOut => {
                AppError::ConcurrencyConflict("Timed out waiting for a database connection".to_string())
            }
            other => AppError::DatabaseError(other),
        }
    }
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::InsufficientStock {
                product_id,
                available,
                requested,
            } => AppError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            AllocationError::InvalidQuantity(_) => AppError::validation("quantity", err.to_string()),
            AllocationError::NoBatches(product_id) => {
                AppError::NotFound(format!("Stock batches for product {}", product_id))
            }
            AllocationError::ReturnExceedsAllocation { .. } => AppError::Conflict {
                resource: "allocation".to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        match field_errors.into_iter().next() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid {}", field));
                AppError::validation(field, message)
            }
            None => AppError::validation("input", "Invalid input"),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            details: None,
        }
    }
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("TOKEN_EXPIRED", "Token has expired"),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_TOKEN", "Invalid token"),
            ),
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message.clone()),
            ),
            AppError::InsufficientPermissions(permission) => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    format!("Permission denied: requires {}", permission),
                ),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone())
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::InsufficientStock {
                product_id,
                available,
                requested,
            } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    details: Some(serde_json::json!({
                        "product_id": product_id,
                        "available": available,
                        "requested": requested,
                    })),
                    ..ErrorDetail::new("INSUFFICIENT_STOCK", self.to_string())
                },
            ),
            AppError::ConcurrencyConflict(_) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    details: Some(serde_json::json!({ "retryable": self.is_retryable() })),
                    ..ErrorDetail::new(
                        "CONCURRENCY_CONFLICT",
                        "Stock was being modified by another request. Please retry.",
                    )
                },
            ),
            AppError::Conflict { resource, message } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    field: Some(resource.clone()),
                    ..ErrorDetail::new("CONFLICT", message.clone())
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (AppError::validation("quantity", "bad"), StatusCode::BAD_REQUEST),
            (AppError::NotFound("Sale".to_string()), StatusCode::NOT_FOUND),
            (
                AppError::InsufficientStock {
                    product_id: 1,
                    available: 2,
                    requested: 3,
                },
                StatusCode::CONFLICT,
            ),
            (
                AppError::ConcurrencyConflict("lock timeout".to_string()),
                StatusCode::CONFLICT,
            ),
            (
                AppError::InsufficientPermissions("sale:delete".to_string()),
                StatusCode::FORBIDDEN,
            ),
            (AppError::InvalidToken, StatusCode::UNAUTHORIZED),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_insufficient_stock_detail_carries_numbers() {
        let err = AppError::InsufficientStock {
            product_id: 7,
            available: 2,
            requested: 5,
        };
        let (_, detail) = err.status_and_detail();
        let details = detail.details.unwrap();
        assert_eq!(details["product_id"], 7);
        assert_eq!(details["available"], 2);
        assert_eq!(details["requested"], 5);
    }

    #[test]
    fn test_allocation_error_conversion() {
        let err: AppError = AllocationError::InsufficientStock {
            product_id: 3,
            available: 1,
            requested: 2,
        }
        .into();
        assert!(matches!(
            err,
            AppError::InsufficientStock {
                product_id: 3,
                available: 1,
                requested: 2
            }
        ));

        let err: AppError = AllocationError::InvalidQuantity(0).into();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "quantity"));

        let err: AppError = AllocationError::NoBatches(9).into();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_concurrency_conflict_body_marks_retryable() {
        let (status, detail) =
            AppError::ConcurrencyConflict("lock timeout".to_string()).status_and_detail();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(detail.code, "CONCURRENCY_CONFLICT");
        assert_eq!(detail.details.unwrap()["retryable"], true);
    }

    #[test]
    fn test_only_concurrency_conflicts_are_retryable() {
        assert!(AppError::ConcurrencyConflict("deadlock".to_string()).is_retryable());
        assert!(!AppError::InsufficientStock {
            product_id: 1,
            available: 0,
            requested: 1
        }
        .is_retryable());
    }
}
