//! Postgres-backed account + ledger store.
//!
//! Balances live in `accounts`, entries in the append-only `ledger_entries`
//! table (a trigger rejects UPDATE/DELETE). Mutations run inside one SQL
//! transaction that locks the account row with `SELECT ... FOR UPDATE`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database | `55P03` | `Timeout` | `lock_timeout` expired waiting for a row lock |
//! | Database | `57014` | `Timeout` | `statement_timeout` cancelled the statement |
//! | Database | `23505` | `Conflict` | duplicate entry id / idempotency key |
//! | Database | `23514` | `Conflict` | check constraint (e.g. negative balance) |
//! | Database | `P0001` | `Conflict` | append-only trigger fired |
//! | PoolTimedOut | N/A | `Timeout` | no connection available |
//! | ColumnDecode / Decode | N/A | `Corrupt` | row could not be mapped |
//! | Other | N/A | `Unavailable` | network errors, closed pool, etc. |

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use custodia_core::{AccountId, EntryId, UserId};
use custodia_ledger::{Account, EntryKind, LedgerEntry};

use super::r#trait::{AccountStore, LedgerEntryStore, StoreError, StoreTransaction, WalletStore};
use crate::config::StoreConfig;

const SCHEMA: &str = include_str!("../../migrations/0001_wallet.sql");

const ACCOUNT_COLUMNS: &str =
    "id, user_id, account_number, balance, created_at, updated_at, deleted_at";

const ENTRY_COLUMNS: &str = "id, account_id, amount, kind, description, external_destination, \
     external_bank_name, related_entry_id, balance_after, idempotency_key, created_at";

/// Postgres-backed wallet store.
///
/// Uses the SQLx connection pool, which is `Send + Sync` and cheap to clone.
#[derive(Debug, Clone)]
pub struct PostgresWalletStore {
    pool: PgPool,
    config: StoreConfig,
}

impl PostgresWalletStore {
    pub fn new(pool: PgPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// Open a pool sized from `config`.
    pub async fn connect(config: StoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, config))
    }

    /// Apply the schema (idempotent).
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AccountStore for PostgresWalletStore {
    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let sql =
            format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_account", e))?;

        row.as_ref().map(account_from_row).transpose()
    }

    #[instrument(skip(self), fields(owner_id = %owner_id), err)]
    async fn open_account(&self, owner_id: UserId) -> Result<Account, StoreError> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO accounts (id, user_id, account_number, balance, created_at, updated_at) \
             VALUES ($1, $2, lpad(nextval('account_number_seq')::text, 10, '0'), 0, $3, $3) \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(AccountId::new().as_uuid())
            .bind(owner_id.as_uuid())
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("open_account", e))?;

        account_from_row(&row)
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn close_account(&self, id: AccountId) -> Result<(), StoreError> {
        sqlx::query("UPDATE accounts SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("close_account", e))?;
        Ok(())
    }
}

#[async_trait]
impl LedgerEntryStore for PostgresWalletStore {
    #[instrument(skip(self), fields(account_id = %account_id), err)]
    async fn ledger_entries(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, StoreError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE account_id = $1 ORDER BY seq ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(account_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ledger_entries", e))?;

        rows.iter().map(entry_from_row).collect()
    }

    #[instrument(skip(self), fields(entry_id = %id), err)]
    async fn ledger_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>, StoreError> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ledger_entry", e))?;

        row.as_ref().map(entry_from_row).transpose()
    }
}

#[async_trait]
impl WalletStore for PostgresWalletStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            "SELECT set_config('lock_timeout', $1, true), \
             set_config('statement_timeout', $2, true)",
        )
            .bind(format!("{}ms", self.config.lock_timeout.as_millis()))
            .bind(format!("{}ms", self.config.statement_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_timeouts", e))?;

        Ok(Box::new(PostgresTransaction {
            tx,
            locked: HashSet::new(),
        }))
    }
}

/// One SQL transaction. Dropping it without `commit` rolls back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
    locked: HashSet<AccountId>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn find_account_for_update(
        &mut self,
        id: AccountId,
    ) -> Result<Option<Account>, StoreError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_account_for_update", e))?;

        let account = row.as_ref().map(account_from_row).transpose()?;
        if account.is_some() {
            self.locked.insert(id);
        }
        Ok(account)
    }

    async fn find_entry_by_idempotency_key(
        &mut self,
        account_id: AccountId,
        key: &str,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries \
             WHERE account_id = $1 AND idempotency_key = $2"
        );
        let row = sqlx::query(&sql)
            .bind(account_id.as_uuid())
            .bind(key)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_entry_by_idempotency_key", e))?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn save_account(&mut self, account: &Account) -> Result<(), StoreError> {
        if !self.locked.contains(&account.id) {
            return Err(StoreError::LockNotHeld(account.id));
        }

        let result = sqlx::query("UPDATE accounts SET balance = $2, updated_at = $3 WHERE id = $1")
            .bind(account.id.as_uuid())
            .bind(account.balance())
            .bind(account.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("save_account", e))?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Conflict(format!(
                "account {} vanished while locked",
                account.id
            )));
        }
        Ok(())
    }

    async fn append_ledger_entry(&mut self, entry: LedgerEntry) -> Result<LedgerEntry, StoreError> {
        let sql = format!(
            "INSERT INTO ledger_entries ({ENTRY_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        );
        sqlx::query(&sql)
            .bind(entry.id.as_uuid())
            .bind(entry.account_id.as_uuid())
            .bind(entry.amount)
            .bind(entry.kind.as_str())
            .bind(&entry.description)
            .bind(entry.external_destination.as_deref())
            .bind(entry.external_bank_name.as_deref())
            .bind(entry.related_entry_id.map(|id| *id.as_uuid()))
            .bind(entry.balance_after)
            .bind(entry.idempotency_key.as_deref())
            .bind(entry.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("append_ledger_entry", e))?;

        Ok(entry)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    let decode = |e: sqlx::Error| StoreError::Corrupt(format!("accounts row: {e}"));

    let id: uuid::Uuid = row.try_get("id").map_err(decode)?;
    let user_id: uuid::Uuid = row.try_get("user_id").map_err(decode)?;
    let account_number: String = row.try_get("account_number").map_err(decode)?;
    let balance: i64 = row.try_get("balance").map_err(decode)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(decode)?;
    let deleted_at: Option<DateTime<Utc>> = row.try_get("deleted_at").map_err(decode)?;

    Account::restore(
        AccountId::from_uuid(id),
        UserId::from_uuid(user_id),
        account_number,
        balance,
        created_at,
        updated_at,
        deleted_at,
    )
    .map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn entry_from_row(row: &PgRow) -> Result<LedgerEntry, StoreError> {
    let decode = |e: sqlx::Error| StoreError::Corrupt(format!("ledger_entries row: {e}"));

    let kind: String = row.try_get("kind").map_err(decode)?;
    let kind: EntryKind = kind
        .parse()
        .map_err(|e: custodia_core::DomainError| StoreError::Corrupt(e.to_string()))?;
    let related: Option<uuid::Uuid> = row.try_get("related_entry_id").map_err(decode)?;

    Ok(LedgerEntry {
        id: EntryId::from_uuid(row.try_get("id").map_err(decode)?),
        account_id: AccountId::from_uuid(row.try_get("account_id").map_err(decode)?),
        amount: row.try_get("amount").map_err(decode)?,
        kind,
        description: row.try_get("description").map_err(decode)?,
        external_destination: row.try_get("external_destination").map_err(decode)?,
        external_bank_name: row.try_get("external_bank_name").map_err(decode)?,
        related_entry_id: related.map(EntryId::from_uuid),
        balance_after: row.try_get("balance_after").map_err(decode)?,
        idempotency_key: row.try_get("idempotency_key").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                // lock_not_available / query_canceled
                Some("55P03") | Some("57014") => StoreError::Timeout(msg),
                // unique violation / check violation / raised by trigger
                Some("23505") | Some("23514") | Some("P0001") => StoreError::Conflict(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Timeout(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("decode error in {operation}: {err}"))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {operation}: {err}")),
    }
}
