//! Configuration handed to the engine and stores at construction time.
//!
//! Nothing in this crate reads the process environment; the binary builds
//! these values once at startup and passes them in.

use std::time::Duration;

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on one atomic apply (lock wait + writes + commit).
    pub apply_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            apply_timeout: Duration::from_secs(5),
        }
    }
}

/// Postgres store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// `SET LOCAL lock_timeout` for every mutation transaction.
    pub lock_timeout: Duration,
    /// `SET LOCAL statement_timeout` for every mutation transaction.
    pub statement_timeout: Duration,
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            lock_timeout: Duration::from_secs(3),
            statement_timeout: Duration::from_secs(5),
        }
    }
}
