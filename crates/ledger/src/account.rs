use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use custodia_core::{AccountId, DomainError, DomainResult, UserId};

/// A custodial monetary account.
///
/// The balance is in minor currency units and can only move through
/// [`Account::apply_delta`], which refuses to take it below zero. Callers never
/// set it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner_id: UserId,
    pub account_number: String,
    balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    /// A freshly opened account: zero balance, no history.
    pub fn open(
        id: AccountId,
        owner_id: UserId,
        account_number: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            account_number: account_number.into(),
            balance: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Rebuild an account from persisted state.
    ///
    /// Only storage adapters should call this; a negative persisted balance is
    /// reported as an invariant breach rather than silently accepted.
    pub fn restore(
        id: AccountId,
        owner_id: UserId,
        account_number: String,
        balance: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        deleted_at: Option<DateTime<Utc>>,
    ) -> DomainResult<Self> {
        if balance < 0 {
            return Err(DomainError::validation(format!(
                "persisted balance for account {id} is negative ({balance})"
            )));
        }
        Ok(Self {
            id,
            owner_id,
            account_number,
            balance,
            created_at,
            updated_at,
            deleted_at,
        })
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Ownership gate shared by every caller-initiated operation.
    pub fn ensure_owned_by(&self, user_id: UserId) -> DomainResult<()> {
        if self.owner_id != user_id {
            return Err(DomainError::Forbidden);
        }
        Ok(())
    }

    /// Apply a signed delta and return the new balance.
    ///
    /// The account is left untouched when the result would be negative or overflow.
    pub fn apply_delta(&mut self, delta: i64, at: DateTime<Utc>) -> DomainResult<i64> {
        let next = self
            .balance
            .checked_add(delta)
            .ok_or_else(|| DomainError::validation("balance overflow"))?;

        if next < 0 {
            return Err(DomainError::InsufficientBalance {
                attempted: delta.saturating_neg(),
                available: self.balance,
            });
        }

        self.balance = next;
        self.updated_at = at;
        Ok(next)
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            account_id: self.id,
            owner_id: self.owner_id,
            account_number: self.account_number.clone(),
            balance: self.balance,
            updated_at: self.updated_at,
        }
    }
}

/// Read-only projection of an account returned by balance queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: AccountId,
    pub owner_id: UserId,
    pub account_number: String,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}
