use http::StatusCode;
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};

/// JSON error body handed to whichever route layer hosts the cart service.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Folds a storage failure raised inside an atomic unit into
    /// `TransactionFailed`; domain errors pass through unchanged.
    pub fn into_transaction_failure(self) -> Self {
        match self {
            Self::DatabaseError(err) => Self::TransactionFailed(err.to_string()),
            other => other,
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::DatabaseError(_)
            | Self::TransactionFailed(_)
            | Self::EventError(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::TransactionFailed(_) => "Cart update could not be completed".to_string(),
            Self::EventError(_) | Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn error_response(&self) -> ErrorResponse {
        let status = self.status_code();
        ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::{Validate, ValidationErrors};

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InvalidOperation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::TransactionFailed("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn service_error_response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("relation carts".into())).response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::TransactionFailed("deadlock detected".into()).response_message(),
            "Cart update could not be completed"
        );
        assert_eq!(
            ServiceError::NotFound("Cart 42 not found".into()).response_message(),
            "Not found: Cart 42 not found"
        );
    }

    #[test]
    fn transaction_failure_only_wraps_storage_errors() {
        let wrapped = ServiceError::DatabaseError(DbErr::Custom("io".into()))
            .into_transaction_failure();
        assert!(matches!(wrapped, ServiceError::TransactionFailed(msg) if msg.contains("io")));

        let untouched = ServiceError::NotFound("anonymous cart".into()).into_transaction_failure();
        assert!(matches!(untouched, ServiceError::NotFound(_)));
    }

    #[test]
    fn error_response_uses_canonical_reason() {
        let body = ServiceError::NotFound("Cart missing".into()).error_response();
        assert_eq!(body.error, "Not Found");
        assert_eq!(body.message, "Not found: Cart missing");
        assert!(!body.timestamp.is_empty());
    }

    #[derive(Validate)]
    struct Quantity {
        #[validate(range(min = 1))]
        value: i32,
    }

    #[test]
    fn validation_errors_convert_to_validation_error() {
        let errors: ValidationErrors = Quantity { value: 0 }
            .validate()
            .expect_err("zero quantity must fail validation");
        let err = ServiceError::from(errors);
        assert!(matches!(err, ServiceError::ValidationError(msg) if msg.contains("value")));
    }
}
