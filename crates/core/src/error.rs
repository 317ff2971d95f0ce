//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// ownership, sufficiency). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Amount is outside what the operation's policy allows.
    #[error("invalid amount {amount}: minimum is {minimum}")]
    InvalidAmount { amount: i64, minimum: i64 },

    /// A request field was missing or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A debit would take the balance below zero.
    #[error("insufficient balance: attempted {attempted}, available {available}")]
    InsufficientBalance { attempted: i64, available: i64 },

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The caller does not own the resource.
    #[error("forbidden")]
    Forbidden,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
