//! The engine's failure taxonomy.

use thiserror::Error;

use custodia_core::{AccountId, DomainError};

use crate::store::StoreError;

/// Every way a wallet operation can fail, as seen by the transport layer.
///
/// Client-caused kinds are surfaced verbatim; `StoreUnavailable` covers all
/// infrastructure trouble including lock and statement timeouts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("invalid amount {amount}: minimum is {minimum}")]
    InvalidAmount { amount: i64, minimum: i64 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("insufficient balance: attempted {attempted}, available {available}")]
    InsufficientBalance { attempted: i64, available: i64 },

    #[error("account does not belong to the caller")]
    Forbidden,

    #[error("account {0} not found")]
    NotFound(AccountId),

    #[error("idempotency conflict: {0}")]
    IdempotencyConflict(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl WalletError {
    pub fn is_client_error(&self) -> bool {
        !matches!(self, WalletError::StoreUnavailable(_))
    }
}

impl From<DomainError> for WalletError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidAmount { amount, minimum } => {
                WalletError::InvalidAmount { amount, minimum }
            }
            DomainError::Validation(msg) => WalletError::InvalidRequest(msg),
            DomainError::InvalidId(msg) => WalletError::InvalidRequest(msg),
            DomainError::InsufficientBalance {
                attempted,
                available,
            } => WalletError::InsufficientBalance {
                attempted,
                available,
            },
            DomainError::Forbidden => WalletError::Forbidden,
        }
    }
}

impl From<StoreError> for WalletError {
    fn from(value: StoreError) -> Self {
        WalletError::StoreUnavailable(value.to_string())
    }
}
