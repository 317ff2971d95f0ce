//! Infrastructure layer: storage, the balance mutation engine, config.

pub mod command_handlers;
pub mod config;
pub mod engine;
pub mod error;
pub mod store;

mod integration_tests;

pub use command_handlers::CommandHandlers;
pub use config::{EngineConfig, StoreConfig};
pub use engine::{BalanceMutationEngine, Reconciliation};
pub use error::WalletError;
