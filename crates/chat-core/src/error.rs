//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Screen name is empty or only whitespace
    #[error("screen name must not be blank")]
    BlankName,

    /// Screen name contains a line break and cannot travel on one wire line
    #[error("screen name must be a single line: {0:?}")]
    MultiLineName(String),

    /// Illegal session lifecycle transition
    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
