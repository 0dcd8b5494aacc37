//! Unified error taxonomy shared by the memory layer and the sprint daemon.

use thiserror::Error;

/// Domain-level errors that can occur across the memory layer and the
/// sprint daemon.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("adapter not registered: {0}")]
    AdapterUnavailable(String),

    #[error("adapter call failed: {0}")]
    AdapterCall(String),

    #[error("adapter deadline exceeded")]
    Timeout,

    #[error("invalid state transition from {from} to {to}")]
    TransitionInvalid { from: String, to: String },

    #[error("external tool error: {0}")]
    ExternalTool(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("malformed request: {0}")]
    Ipc(String),

    #[error("issue not found: {0}")]
    IssueNotFound(String),

    #[error("issue {0} is not actionable")]
    NotActionable(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for DomainError {
    fn from(err: serde_yaml::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Persistence(err.to_string())
    }
}
