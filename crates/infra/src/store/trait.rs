use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use custodia_core::{AccountId, EntryId, UserId};
use custodia_ledger::{Account, LedgerEntry};

/// Storage operation error.
///
/// These are **infrastructure errors** as opposed to domain errors
/// (validation, ownership, sufficiency). The engine reports all of them to
/// callers as `StoreUnavailable`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend unreachable or the operation failed for a non-specific reason.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A lock wait or statement exceeded its bound.
    #[error("store timeout: {0}")]
    Timeout(String),

    /// A uniqueness or append-only constraint rejected the write.
    #[error("store conflict: {0}")]
    Conflict(String),

    /// Persisted data could not be mapped back into domain types.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// A write was attempted on an account row the transaction has not locked.
    #[error("account {0} is not locked by this transaction")]
    LockNotHeld(AccountId),
}

/// Account Store: mutable balances keyed by account id.
///
/// Reads here are plain (unlocked) reads. Soft-deleted accounts are never
/// returned. Balance writes only happen through a [`StoreTransaction`].
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Current committed state of an account, if it exists and is not deleted.
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Provisioning seam: create a zero-balance account with a fresh account
    /// number. Account numbers are never reused.
    async fn open_account(&self, owner_id: UserId) -> Result<Account, StoreError>;

    /// Soft-delete: the row stays, its balance is frozen and it disappears
    /// from every lookup.
    async fn close_account(&self, id: AccountId) -> Result<(), StoreError>;
}

/// Ledger Entry Store: append-only, immutable transaction records.
#[async_trait]
pub trait LedgerEntryStore: Send + Sync {
    /// All entries of an account in creation order.
    async fn ledger_entries(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, StoreError>;

    async fn ledger_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>, StoreError>;
}

/// One atomic unit against both stores.
///
/// ## Locking
///
/// `find_account_for_update` takes an exclusive lock on the account row that
/// is held until the transaction ends. A second transaction asking for the
/// same row waits; rows of different accounts never block each other.
///
/// ## Atomicity
///
/// Writes are invisible to other readers until `commit`. `rollback`, or
/// simply dropping the transaction, discards both the account writes and the
/// entry inserts made within it.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Locked read of an account row (`SELECT ... FOR UPDATE`).
    async fn find_account_for_update(
        &mut self,
        id: AccountId,
    ) -> Result<Option<Account>, StoreError>;

    /// Earlier entry written for the same `(account, idempotency key)`.
    async fn find_entry_by_idempotency_key(
        &mut self,
        account_id: AccountId,
        key: &str,
    ) -> Result<Option<LedgerEntry>, StoreError>;

    /// Persist a new balance. The row must already be locked by this transaction.
    async fn save_account(&mut self, account: &Account) -> Result<(), StoreError>;

    /// Insert an entry. Never updates an existing row.
    async fn append_ledger_entry(&mut self, entry: LedgerEntry) -> Result<LedgerEntry, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Both stores plus the transaction boundary primitive.
#[async_trait]
pub trait WalletStore: AccountStore + LedgerEntryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

#[async_trait]
impl<S> AccountStore for Arc<S>
where
    S: AccountStore + ?Sized,
{
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        (**self).find_account(id).await
    }

    async fn open_account(&self, owner_id: UserId) -> Result<Account, StoreError> {
        (**self).open_account(owner_id).await
    }

    async fn close_account(&self, id: AccountId) -> Result<(), StoreError> {
        (**self).close_account(id).await
    }
}

#[async_trait]
impl<S> LedgerEntryStore for Arc<S>
where
    S: LedgerEntryStore + ?Sized,
{
    async fn ledger_entries(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).ledger_entries(account_id).await
    }

    async fn ledger_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>, StoreError> {
        (**self).ledger_entry(id).await
    }
}

#[async_trait]
impl<S> WalletStore for Arc<S>
where
    S: WalletStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        (**self).begin().await
    }
}
