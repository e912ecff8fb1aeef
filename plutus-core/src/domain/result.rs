//! Result and error types for the core library

use thiserror::Error;

use super::account::AccountId;

/// Core library error type
///
/// Business outcomes of a transfer (insufficient funds, inactive account)
/// are not errors: they are recorded as failed transactions and returned
/// as `Ok`. Everything here either rejects the input before anything is
/// written or reports an infrastructure fault.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timed out waiting for the lock on account {0}")]
    LockTimeout(AccountId),

    #[error("Lock order violation: {0}")]
    LockOrder(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid transfer error
    pub fn invalid_transfer(msg: impl Into<String>) -> Self {
        Self::InvalidTransfer(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a store unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True for infrastructure failures.
    ///
    /// No partial state exists after one of these, so the caller may retry
    /// the whole transfer. Input errors are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::LockTimeout(_) | Error::StoreUnavailable(_) | Error::Database(_)
        )
    }

    /// Stable machine-readable code, used by the CLI's JSON output
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidTransfer(_) => "INVALID_TRANSFER",
            Error::NotFound(_) => "NOT_FOUND",
            Error::LockTimeout(_) => "LOCK_TIMEOUT",
            Error::LockOrder(_) => "LOCK_ORDER",
            Error::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Other(_) => "ERROR",
        }
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// A stored enum column held a value this build does not know
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::LockTimeout(AccountId(1)).is_retryable());
        assert!(Error::unavailable("down").is_retryable());
        assert!(Error::database("io").is_retryable());

        assert!(!Error::invalid_transfer("same account").is_retryable());
        assert!(!Error::not_found("account 9").is_retryable());
        assert!(!Error::validation("bad").is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::invalid_transfer("amount must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Invalid transfer: amount must be greater than zero"
        );
        assert_eq!(err.code(), "INVALID_TRANSFER");

        let err = Error::LockTimeout(AccountId(42));
        assert!(err.to_string().contains("account 42"));
    }

    #[test]
    fn test_unknown_variant_message() {
        let err = UnknownVariant::new("account status", "dormant");
        assert_eq!(err.to_string(), "unknown account status: 'dormant'");
    }
}
