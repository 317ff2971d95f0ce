//! Typed commands accepted from the transport layer.

use serde::{Deserialize, Serialize};

use custodia_core::{AccountId, DomainError, DomainResult, UserId};

use crate::entry::ExternalDestination;
use crate::policy::MutationPolicy;

/// Command: cash withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdraw {
    pub account_id: AccountId,
    pub requested_by: UserId,
    pub amount: i64,
    pub idempotency_key: Option<String>,
}

/// Command: transfer out to an external bank account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransferOut {
    pub account_id: AccountId,
    pub requested_by: UserId,
    pub amount: i64,
    pub destination: ExternalDestination,
    pub idempotency_key: Option<String>,
}

/// Command: top-up from an external rail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUp {
    pub account_id: AccountId,
    pub requested_by: UserId,
    pub amount: i64,
    pub idempotency_key: Option<String>,
}

/// Command: move funds between two accounts held in this system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub account_id: AccountId,
    pub to_account_id: AccountId,
    pub requested_by: UserId,
    pub amount: i64,
    pub idempotency_key: Option<String>,
}

/// Query: current balance of an owned account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBalance {
    pub account_id: AccountId,
    pub requested_by: UserId,
}

/// Single-account mutation understood by the engine, with any
/// operation-specific metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Withdraw,
    BankTransferOut(ExternalDestination),
    TopUp,
}

impl Mutation {
    pub fn policy(&self) -> MutationPolicy {
        match self {
            Mutation::Withdraw => MutationPolicy::WITHDRAW,
            Mutation::BankTransferOut(_) => MutationPolicy::BANK_TRANSFER_OUT,
            Mutation::TopUp => MutationPolicy::TOP_UP,
        }
    }

    pub fn destination(&self) -> Option<&ExternalDestination> {
        match self {
            Mutation::BankTransferOut(d) => Some(d),
            _ => None,
        }
    }

    /// Operation-specific required fields.
    pub fn check_fields(&self) -> DomainResult<()> {
        if let Mutation::BankTransferOut(d) = self {
            if d.account.trim().is_empty() || d.bank_name.trim().is_empty() {
                return Err(DomainError::validation(
                    "destination account and bank name are required",
                ));
            }
        }
        Ok(())
    }
}
