use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OwnedMutexGuard;

use custodia_core::{AccountId, EntryId, UserId};
use custodia_ledger::{Account, LedgerEntry};

use super::r#trait::{AccountStore, LedgerEntryStore, StoreError, StoreTransaction, WalletStore};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<AccountId, Account>,
    entries: Vec<LedgerEntry>,
}

#[derive(Debug, Default)]
struct Inner {
    state: RwLock<State>,
    row_locks: Mutex<HashMap<AccountId, Arc<tokio::sync::Mutex<()>>>>,
    next_account_number: AtomicU64,
    fail_next_append: AtomicBool,
}

impl Inner {
    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn is_live(&self, id: AccountId) -> Result<bool, StoreError> {
        Ok(self.read()?.accounts.get(&id).is_some_and(|a| !a.is_deleted()))
    }

    /// Row lock handle for an existing account. Callers must check the row
    /// exists first; entries are pruned again by [`Inner::release`].
    fn row_lock(&self, id: AccountId) -> Result<Arc<tokio::sync::Mutex<()>>, StoreError> {
        let mut locks = self
            .row_locks
            .lock()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(locks.entry(id).or_default().clone())
    }

    /// Drop the map entries of `ids` that nobody holds or waits on.
    fn release(&self, ids: impl IntoIterator<Item = AccountId>) {
        let Ok(mut locks) = self.row_locks.lock() else {
            return;
        };
        for id in ids {
            if locks.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(&id);
            }
        }
    }
}

/// In-memory account + ledger store.
///
/// Intended for tests/dev. Each account row has its own async mutex standing
/// in for a database row lock; committed state lives behind one `RwLock` so a
/// commit publishes the balance and its entries in a single step.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWalletStore {
    inner: Arc<Inner>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `append_ledger_entry` fail, to exercise rollback paths.
    pub fn inject_append_failure(&self) {
        self.inner.fail_next_append.store(true, Ordering::SeqCst);
    }

    /// Number of committed entries across all accounts.
    pub fn entry_count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read()?.entries.len())
    }
}

#[async_trait]
impl AccountStore for InMemoryWalletStore {
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let state = self.inner.read()?;
        Ok(state.accounts.get(&id).filter(|a| !a.is_deleted()).cloned())
    }

    async fn open_account(&self, owner_id: UserId) -> Result<Account, StoreError> {
        let number = self.inner.next_account_number.fetch_add(1, Ordering::SeqCst) + 1;
        let account =
            Account::open(AccountId::new(), owner_id, format!("{number:010}"), Utc::now());

        let mut state = self.inner.write()?;
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn close_account(&self, id: AccountId) -> Result<(), StoreError> {
        if !self.inner.is_live(id)? {
            return Ok(());
        }

        let row = self.inner.row_lock(id)?.lock_owned().await;

        let closed = self.inner.write().map(|mut state| {
            if let Some(account) = state.accounts.get_mut(&id) {
                if account.deleted_at.is_none() {
                    account.deleted_at = Some(Utc::now());
                }
            }
        });
        drop(row);
        self.inner.release([id]);
        closed
    }
}

#[async_trait]
impl LedgerEntryStore for InMemoryWalletStore {
    async fn ledger_entries(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self.inner.read()?;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn ledger_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>, StoreError> {
        let state = self.inner.read()?;
        Ok(state.entries.iter().find(|e| e.id == id).cloned())
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(InMemoryTransaction {
            inner: self.inner.clone(),
            held: HashMap::new(),
            staged_accounts: HashMap::new(),
            staged_entries: Vec::new(),
        }))
    }
}

/// Transaction over [`InMemoryWalletStore`].
///
/// Row locks are owned guards released when the transaction is dropped, which
/// is also how rollback happens.
pub struct InMemoryTransaction {
    inner: Arc<Inner>,
    held: HashMap<AccountId, OwnedMutexGuard<()>>,
    staged_accounts: HashMap<AccountId, Account>,
    staged_entries: Vec<LedgerEntry>,
}

impl InMemoryTransaction {
    fn release_rows(&mut self) {
        let held = std::mem::take(&mut self.held);
        let ids: Vec<AccountId> = held.keys().copied().collect();
        drop(held);
        self.inner.release(ids);
    }

    fn key_taken(&self, committed: &[LedgerEntry], entry: &LedgerEntry) -> bool {
        let Some(key) = entry.idempotency_key.as_deref() else {
            return false;
        };
        committed
            .iter()
            .chain(self.staged_entries.iter())
            .any(|e| e.account_id == entry.account_id && e.idempotency_key.as_deref() == Some(key))
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn find_account_for_update(
        &mut self,
        id: AccountId,
    ) -> Result<Option<Account>, StoreError> {
        if !self.held.contains_key(&id) {
            if !self.inner.is_live(id)? {
                return Ok(None);
            }
            let lock = self.inner.row_lock(id)?;
            let guard = lock.lock_owned().await;
            self.held.insert(id, guard);
        }

        if let Some(staged) = self.staged_accounts.get(&id) {
            return Ok(Some(staged.clone()));
        }

        let state = self.inner.read()?;
        Ok(state.accounts.get(&id).filter(|a| !a.is_deleted()).cloned())
    }

    async fn find_entry_by_idempotency_key(
        &mut self,
        account_id: AccountId,
        key: &str,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let matches = |e: &&LedgerEntry| {
            e.account_id == account_id && e.idempotency_key.as_deref() == Some(key)
        };

        if let Some(staged) = self.staged_entries.iter().find(matches) {
            return Ok(Some(staged.clone()));
        }

        let state = self.inner.read()?;
        Ok(state.entries.iter().find(matches).cloned())
    }

    async fn save_account(&mut self, account: &Account) -> Result<(), StoreError> {
        if !self.held.contains_key(&account.id) {
            return Err(StoreError::LockNotHeld(account.id));
        }
        self.staged_accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn append_ledger_entry(&mut self, entry: LedgerEntry) -> Result<LedgerEntry, StoreError> {
        if self.inner.fail_next_append.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected append failure".to_string()));
        }

        let state = self.inner.read()?;
        let duplicate_id = state
            .entries
            .iter()
            .chain(self.staged_entries.iter())
            .any(|e| e.id == entry.id);
        if duplicate_id {
            return Err(StoreError::Conflict(format!("entry {} already exists", entry.id)));
        }
        if self.key_taken(&state.entries, &entry) {
            return Err(StoreError::Conflict(format!(
                "idempotency key already used on account {}",
                entry.account_id
            )));
        }
        drop(state);

        self.staged_entries.push(entry.clone());
        Ok(entry)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        let mut state = self.inner.write()?;
        for (id, account) in std::mem::take(&mut self.staged_accounts) {
            state.accounts.insert(id, account);
        }
        state.entries.append(&mut self.staged_entries);
        drop(state);
        // Row locks are released only after the new state is visible.
        self.release_rows();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        self.release_rows();
    }
}
