//! Unified error handling for the engine.
//!
//! [`StoreError`] covers infrastructure faults from a document store.
//! [`CoreError`] is what every engine operation returns; request handlers turn
//! it into a response with [`IntoResponse`], which logs server faults and keeps
//! store internals out of the body.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use shopfloor_core::ProductId;
use thiserror::Error;

/// Errors raised by a document store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migrations could not be applied.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A document or aggregation row did not match its schema.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// A document with the same id already exists.
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The backend cannot execute this pipeline shape.
    #[error("unsupported pipeline: {0}")]
    Unsupported(String),

    /// An in-process lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::DataCorruption(err.to_string())
    }
}

/// Error type returned by every engine operation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Missing or malformed identifiers, or a request that cannot apply.
    #[error("Bad request: {0}")]
    InvalidRequest(String),

    /// User or product absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The user already holds the maximum number of addresses.
    #[error("Address quota exceeded: at most {limit} addresses per user")]
    QuotaExceeded {
        /// The quota that was hit.
        limit: usize,
    },

    /// A tracked product does not have enough units for the purchase.
    #[error("Out of stock: {0}")]
    OutOfStock(ProductId),

    /// Infrastructure fault. The operation did not apply and may be retried.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The operation's deadline expired before the store answered.
    #[error("Timed out: {operation} exceeded {after:?}")]
    Timeout {
        /// Name of the operation that ran out of time.
        operation: &'static str,
        /// The deadline that was exceeded.
        after: Duration,
    },
}

impl CoreError {
    /// Whether re-running the whole operation is safe and may succeed.
    ///
    /// Store faults and timeouts never leave a partial update behind, so both
    /// are retryable. Everything else is a caller error or a business rule.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Timeout { .. })
    }

    /// HTTP status code a request handler should answer with.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::QuotaExceeded { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::OutOfStock(_) => StatusCode::CONFLICT,
            Self::Store(_) | Self::Timeout { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        match &self {
            Self::Store(err) => tracing::error!(error = %err, "Store fault"),
            Self::Timeout { operation, after } => {
                tracing::error!(operation, after = ?after, "Operation timed out");
            }
            _ => {}
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Store(_) | Self::Timeout { .. } => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (self.status_code(), message).into_response()
    }
}

/// Result type alias for `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: CoreError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_core_error_display() {
        let err = CoreError::NotFound("user".to_string());
        assert_eq!(err.to_string(), "Not found: user");

        let err = CoreError::QuotaExceeded { limit: 2 };
        assert_eq!(
            err.to_string(),
            "Address quota exceeded: at most 2 addresses per user"
        );
    }

    #[test]
    fn test_core_error_status_codes() {
        assert_eq!(
            get_status(CoreError::InvalidRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CoreError::QuotaExceeded { limit: 2 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CoreError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CoreError::OutOfStock(ProductId::generate())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CoreError::Store(StoreError::Poisoned)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(CoreError::Timeout {
                operation: "checkout",
                after: Duration::from_secs(5),
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_retryable() {
        assert!(CoreError::Store(StoreError::Poisoned).is_retryable());
        assert!(
            CoreError::Timeout {
                operation: "add_to_cart",
                after: Duration::from_secs(5),
            }
            .is_retryable()
        );
        assert!(!CoreError::QuotaExceeded { limit: 2 }.is_retryable());
        assert!(!CoreError::NotFound("user".to_string()).is_retryable());
    }
}
