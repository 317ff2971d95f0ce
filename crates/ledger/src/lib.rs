//! Wallet ledger module (accounts, append-only entries, mutation policy).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod account;
pub mod command;
pub mod entry;
pub mod policy;
pub mod receipt;

pub use account::{Account, AccountSnapshot};
pub use command::{BankTransferOut, GetBalance, Mutation, TopUp, Transfer, Withdraw};
pub use entry::{EntryKind, ExternalDestination, LedgerEntry};
pub use policy::{MutationPolicy, Sign};
pub use receipt::{
    BankTransferReceipt, MutationOutcome, TopUpReceipt, TransferReceipt, WithdrawReceipt,
};
