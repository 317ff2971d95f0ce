//! Closed set of per-operation results.

use chrono::{DateTime, Utc};
use serde::Serialize;

use custodia_core::{AccountId, EntryId};

use crate::entry::{EntryKind, LedgerEntry};

/// What the engine returns for a committed single-account mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub account_number: String,
    pub new_balance: i64,
    pub entry: LedgerEntry,
    /// True when an earlier request with the same idempotency key was found
    /// and nothing new was written.
    pub replayed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawReceipt {
    pub account_id: AccountId,
    pub account_number: String,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub final_balance: i64,
    pub entry_id: EntryId,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransferReceipt {
    pub account_id: AccountId,
    pub account_number: String,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub final_balance: i64,
    #[serde(rename = "to")]
    pub destination: String,
    pub bank_name: String,
    pub entry_id: EntryId,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpReceipt {
    pub account_id: AccountId,
    pub account_number: String,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub final_balance: i64,
    pub entry_id: EntryId,
    pub at: DateTime<Utc>,
}

/// Result of an internal transfer: both legs plus the source's new balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub account_id: AccountId,
    pub account_number: String,
    pub to_account_id: AccountId,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub final_balance: i64,
    pub debit: LedgerEntry,
    pub credit: LedgerEntry,
    pub at: DateTime<Utc>,
}

impl From<MutationOutcome> for WithdrawReceipt {
    fn from(o: MutationOutcome) -> Self {
        Self {
            account_id: o.entry.account_id,
            account_number: o.account_number,
            amount: o.entry.amount.saturating_abs(),
            kind: o.entry.kind,
            final_balance: o.new_balance,
            entry_id: o.entry.id,
            at: o.entry.created_at,
        }
    }
}

impl From<MutationOutcome> for TopUpReceipt {
    fn from(o: MutationOutcome) -> Self {
        Self {
            account_id: o.entry.account_id,
            account_number: o.account_number,
            amount: o.entry.amount,
            kind: o.entry.kind,
            final_balance: o.new_balance,
            entry_id: o.entry.id,
            at: o.entry.created_at,
        }
    }
}

impl From<MutationOutcome> for BankTransferReceipt {
    fn from(o: MutationOutcome) -> Self {
        Self {
            account_id: o.entry.account_id,
            account_number: o.account_number,
            amount: o.entry.amount.saturating_abs(),
            kind: o.entry.kind,
            final_balance: o.new_balance,
            destination: o.entry.external_destination.clone().unwrap_or_default(),
            bank_name: o.entry.external_bank_name.clone().unwrap_or_default(),
            entry_id: o.entry.id,
            at: o.entry.created_at,
        }
    }
}
