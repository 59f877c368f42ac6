//! Error types and handling
//!
//! Every failure the reconciler can produce maps onto one variant of
//! [`CertError`]. Only revocation failures are recoverable inside a workflow;
//! everything else aborts the current operation and leaves persisted state
//! untouched.

use thiserror::Error;
use tracing::error;

/// Certificate lifecycle error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CertError {
    /// Malformed input: UUID, duration, PEM, conflicting fields, thumbprint
    #[error("Validation error: {0}")]
    Validation(String),

    /// Several independent validation failures collected in one pass
    #[error("Validation errors: {}", .0.join("; "))]
    ValidationErrors(Vec<String>),

    /// Signing service rejected or failed the sign call
    #[error("Signing error: {0}")]
    Signing(String),

    /// Signing service failed the revoke call
    #[error("Revocation error: {0}")]
    Revocation(String),

    /// Persisted record could not be interpreted
    #[error("Corrupted state: {0}")]
    CorruptedState(String),

    /// Caller cancelled while an external call was outstanding
    #[error("Operation cancelled")]
    Cancelled,

    /// Operation deadline elapsed while an external call was outstanding
    #[error("Operation timed out after {0:?}")]
    TimedOut(std::time::Duration),

    /// No persisted state for the requested certificate
    #[error("Not found: {0}")]
    NotFound(String),

    /// State persistence failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CertError {
    /// Short machine-readable identifier for the error class
    pub fn kind(&self) -> &'static str {
        match self {
            CertError::Validation(_) | CertError::ValidationErrors(_) => "validation_error",
            CertError::Signing(_) => "signing_error",
            CertError::Revocation(_) => "revocation_error",
            CertError::CorruptedState(_) => "corrupted_state",
            CertError::Cancelled => "cancelled",
            CertError::TimedOut(_) => "timed_out",
            CertError::NotFound(_) => "not_found",
            CertError::Storage(_) => "storage_error",
            CertError::Config(_) => "config_error",
        }
    }

    /// Whether the error aborts the enclosing workflow
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CertError::Revocation(_))
    }

    /// Whether the error points at persisted state needing operator attention
    pub fn needs_operator(&self) -> bool {
        matches!(self, CertError::CorruptedState(_) | CertError::Storage(_))
    }

    /// Log the error at the level matching its class
    pub fn log(&self) {
        if self.needs_operator() {
            error!(error = %self, error_type = self.kind(), "Certificate state error");
        }
    }
}

// Implement From for common error types

impl From<sqlx::Error> for CertError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CertError::NotFound("Record not found".to_string()),
            _ => CertError::Storage(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for CertError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        CertError::Storage(format!("Migration failed: {}", err))
    }
}

impl From<serde_json::Error> for CertError {
    fn from(err: serde_json::Error) -> Self {
        CertError::CorruptedState(format!("JSON decoding error: {}", err))
    }
}

impl From<anyhow::Error> for CertError {
    fn from(err: anyhow::Error) -> Self {
        CertError::Config(err.to_string())
    }
}

/// Result type alias for certificate operations
pub type CertResult<T> = Result<T, CertError>;
