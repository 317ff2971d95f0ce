//! Per-operation business rules applied by the mutation engine.

use custodia_core::{DomainError, DomainResult};

use crate::entry::EntryKind;

/// Minimum cash withdrawal / transfer-out, in minor units.
pub const MIN_DEBIT_AMOUNT: i64 = 50_000;

/// Minimum top-up, in minor units.
pub const MIN_TOP_UP_AMOUNT: i64 = 10_000;

/// Direction of a balance movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Debit,
    Credit,
}

/// One row of the policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationPolicy {
    pub sign: Sign,
    pub minimum: i64,
    pub kind: EntryKind,
    pub description: &'static str,
}

impl MutationPolicy {
    pub const WITHDRAW: MutationPolicy = MutationPolicy {
        sign: Sign::Debit,
        minimum: MIN_DEBIT_AMOUNT,
        kind: EntryKind::Withdraw,
        description: "ATM Cash Withdrawal",
    };

    pub const BANK_TRANSFER_OUT: MutationPolicy = MutationPolicy {
        sign: Sign::Debit,
        minimum: MIN_DEBIT_AMOUNT,
        kind: EntryKind::TransferOut,
        description: "Bank Withdrawal",
    };

    pub const TOP_UP: MutationPolicy = MutationPolicy {
        sign: Sign::Credit,
        minimum: MIN_TOP_UP_AMOUNT,
        kind: EntryKind::TopUp,
        description: "Top Up",
    };

    /// Debit leg of an internal account-to-account transfer.
    pub const INTERNAL_TRANSFER: MutationPolicy = MutationPolicy {
        sign: Sign::Debit,
        minimum: MIN_DEBIT_AMOUNT,
        kind: EntryKind::TransferOut,
        description: "Transfer",
    };

    /// Reject amounts below the operation's minimum (which also rules out
    /// zero and negative amounts).
    pub fn check_amount(&self, amount: i64) -> DomainResult<()> {
        if amount < self.minimum {
            return Err(DomainError::InvalidAmount {
                amount,
                minimum: self.minimum,
            });
        }
        Ok(())
    }

    /// The signed delta this policy applies for a (positive) amount.
    pub fn delta(&self, amount: i64) -> i64 {
        match self.sign {
            Sign::Debit => -amount,
            Sign::Credit => amount,
        }
    }
}
