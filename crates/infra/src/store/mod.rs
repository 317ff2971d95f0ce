//! Account and ledger-entry storage boundary.
//!
//! Defines the storage contracts the mutation engine consumes plus the
//! in-memory (tests/dev) and Postgres (production) implementations.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryTransaction, InMemoryWalletStore};
pub use postgres::{PostgresTransaction, PostgresWalletStore};
pub use r#trait::{AccountStore, LedgerEntryStore, StoreError, StoreTransaction, WalletStore};
