use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use custodia_core::{AccountId, DomainError, EntryId};

/// What kind of balance movement an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    Withdraw,
    TransferOut,
    TransferIn,
    TopUp,
}

impl EntryKind {
    pub const ALL: [EntryKind; 4] = [
        EntryKind::Withdraw,
        EntryKind::TransferOut,
        EntryKind::TransferIn,
        EntryKind::TopUp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Withdraw => "WITHDRAW",
            EntryKind::TransferOut => "TRANSFER_OUT",
            EntryKind::TransferIn => "TRANSFER_IN",
            EntryKind::TopUp => "TOP_UP",
        }
    }
}

impl core::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for EntryKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntryKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown entry kind: {s}")))
    }
}

/// External rail metadata for a bank transfer-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDestination {
    /// Destination account at the receiving bank.
    pub account: String,
    pub bank_name: String,
}

/// Immutable record of one balance-affecting event.
///
/// `amount` is the signed delta applied to the account (positive = credit).
/// Entries are written exactly once, in the same atomic unit as the balance
/// change they describe, and are never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub amount: i64,
    pub kind: EntryKind,
    pub description: String,
    pub external_destination: Option<String>,
    pub external_bank_name: Option<String>,
    /// Links the two legs of an internal transfer.
    pub related_entry_id: Option<EntryId>,
    /// Account balance immediately after this entry was applied.
    pub balance_after: i64,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        id: EntryId,
        account_id: AccountId,
        amount: i64,
        kind: EntryKind,
        description: impl Into<String>,
        balance_after: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id,
            amount,
            kind,
            description: description.into(),
            external_destination: None,
            external_bank_name: None,
            related_entry_id: None,
            balance_after,
            idempotency_key: None,
            created_at,
        }
    }

    pub fn with_destination(mut self, destination: &ExternalDestination) -> Self {
        self.external_destination = Some(destination.account.clone());
        self.external_bank_name = Some(destination.bank_name.clone());
        self
    }

    pub fn with_related(mut self, related: EntryId) -> Self {
        self.related_entry_id = Some(related);
        self
    }

    pub fn with_idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_wire_form_is_stable() {
        for kind in EntryKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.as_str().to_string()));
            assert_eq!(kind.as_str().parse::<EntryKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!("TOPUP".parse::<EntryKind>().is_err());
    }

    #[test]
    fn destination_is_copied_onto_entry() {
        let destination = ExternalDestination {
            account: "1234567890".to_string(),
            bank_name: "Bank Mandiri".to_string(),
        };
        let entry = LedgerEntry::new(
            EntryId::new(),
            AccountId::new(),
            -60_000,
            EntryKind::TransferOut,
            "Bank Withdrawal",
            40_000,
            Utc::now(),
        )
        .with_destination(&destination);

        assert_eq!(entry.external_destination.as_deref(), Some("1234567890"));
        assert_eq!(entry.external_bank_name.as_deref(), Some("Bank Mandiri"));
    }
}
