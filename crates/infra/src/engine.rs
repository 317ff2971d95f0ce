//! Balance Mutation Engine.
//!
//! The only component allowed to change an account's balance. Every change
//! is paired, inside one store transaction, with the ledger entry describing
//! it.
//!
//! ## Apply Flow
//!
//! ```text
//! begin
//!   ↓
//! 1. Lock the account row (find_account_for_update)
//!   ↓
//! 2. Ownership check (NotFound / Forbidden)
//!   ↓
//! 3. Required fields + amount policy (InvalidRequest / InvalidAmount)
//!   ↓
//! 4. Idempotency lookup (replay / IdempotencyConflict)
//!   ↓
//! 5. Recompute balance under the lock (InsufficientBalance)
//!   ↓
//! 6. save_account + append_ledger_entry
//!   ↓
//! commit (any earlier failure rolls both writes back)
//! ```
//!
//! Everything from `begin` up to the commit decision runs under
//! `EngineConfig::apply_timeout`. When it elapses the in-flight transaction
//! is dropped, which releases the row lock and discards its writes, and the
//! caller gets `StoreUnavailable`. `commit` itself is issued outside the
//! limit, so an elapsed limit never hides a write that went through.
//!
//! The engine holds no state between calls; serialization of concurrent
//! requests against one account comes entirely from the store's row lock.

use std::future::Future;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use custodia_core::{AccountId, EntryId, UserId};
use custodia_ledger::{
    Account, AccountSnapshot, EntryKind, LedgerEntry, Mutation, MutationOutcome, MutationPolicy,
    TransferReceipt,
};

use crate::config::EngineConfig;
use crate::error::WalletError;
use crate::store::{AccountStore, LedgerEntryStore, StoreTransaction, WalletStore};

/// Result of recomputing an account's balance from its ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub account_id: AccountId,
    pub balance: i64,
    pub ledger_sum: i64,
    pub consistent: bool,
}

#[derive(Debug, Clone)]
pub struct BalanceMutationEngine<S> {
    store: S,
    config: EngineConfig,
}

impl<S> BalanceMutationEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }
}

impl<S> BalanceMutationEngine<S>
where
    S: WalletStore,
{
    /// Apply one single-account mutation.
    ///
    /// Returns the new balance together with the entry that records it. A
    /// repeated `idempotency_key` with the same operation and amount returns
    /// the original outcome with `replayed = true` and writes nothing.
    #[instrument(
        skip(self, mutation, idempotency_key),
        fields(account_id = %account_id, user_id = %requested_by, kind = %mutation.policy().kind)
    )]
    pub async fn apply(
        &self,
        account_id: AccountId,
        requested_by: UserId,
        amount: i64,
        mutation: Mutation,
        idempotency_key: Option<String>,
    ) -> Result<MutationOutcome, WalletError> {
        let result = self
            .apply_unit(account_id, requested_by, amount, &mutation, idempotency_key)
            .await;

        match &result {
            Ok(outcome) if outcome.replayed => {
                info!(entry_id = %outcome.entry.id, "idempotent replay, nothing written");
            }
            Ok(outcome) => {
                info!(
                    entry_id = %outcome.entry.id,
                    new_balance = outcome.new_balance,
                    "balance mutation committed"
                );
            }
            Err(err) => log_failure("apply", err),
        }
        result
    }

    /// Move funds between two accounts held here, writing a linked
    /// `TRANSFER_OUT` / `TRANSFER_IN` pair in one transaction.
    #[instrument(
        skip(self, idempotency_key),
        fields(account_id = %source_id, to_account_id = %destination_id, user_id = %requested_by)
    )]
    pub async fn transfer(
        &self,
        source_id: AccountId,
        destination_id: AccountId,
        requested_by: UserId,
        amount: i64,
        idempotency_key: Option<String>,
    ) -> Result<TransferReceipt, WalletError> {
        let result = if source_id == destination_id {
            Err(WalletError::InvalidRequest(
                "source and destination accounts must differ".to_string(),
            ))
        } else {
            self.transfer_unit(source_id, destination_id, requested_by, amount, idempotency_key)
                .await
        };

        match &result {
            Ok(receipt) => info!(
                debit_entry_id = %receipt.debit.id,
                credit_entry_id = %receipt.credit.id,
                new_balance = receipt.final_balance,
                "transfer committed"
            ),
            Err(err) => log_failure("transfer", err),
        }
        result
    }

    /// Current balance and metadata of an owned account. Takes no row lock.
    #[instrument(skip(self), fields(account_id = %account_id, user_id = %requested_by))]
    pub async fn snapshot(
        &self,
        account_id: AccountId,
        requested_by: UserId,
    ) -> Result<AccountSnapshot, WalletError> {
        let result = self.owned_account(account_id, requested_by).await;
        if let Err(err) = &result {
            log_failure("snapshot", err);
        }
        result.map(|account| account.snapshot())
    }

    /// Ledger entries of an owned account, oldest first.
    #[instrument(skip(self), fields(account_id = %account_id, user_id = %requested_by))]
    pub async fn history(
        &self,
        account_id: AccountId,
        requested_by: UserId,
    ) -> Result<Vec<LedgerEntry>, WalletError> {
        let result = match self.owned_account(account_id, requested_by).await {
            Ok(_) => self.store.ledger_entries(account_id).await.map_err(WalletError::from),
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            log_failure("history", err);
        }
        result
    }

    /// Recompute `balance == sum(entries)` for one account.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn reconcile(&self, account_id: AccountId) -> Result<Reconciliation, WalletError> {
        let account = self
            .store
            .find_account(account_id)
            .await?
            .ok_or(WalletError::NotFound(account_id))?;
        let entries = self.store.ledger_entries(account_id).await?;

        let ledger_sum = entries
            .iter()
            .fold(0i64, |acc, e| acc.saturating_add(e.amount));
        let reconciliation = Reconciliation {
            account_id,
            balance: account.balance(),
            ledger_sum,
            consistent: account.balance() == ledger_sum,
        };

        if !reconciliation.consistent {
            error!(
                balance = reconciliation.balance,
                ledger_sum = reconciliation.ledger_sum,
                "balance does not match ledger"
            );
        }
        Ok(reconciliation)
    }

    async fn owned_account(
        &self,
        account_id: AccountId,
        requested_by: UserId,
    ) -> Result<Account, WalletError> {
        let account = self
            .store
            .find_account(account_id)
            .await?
            .ok_or(WalletError::NotFound(account_id))?;
        account.ensure_owned_by(requested_by)?;
        Ok(account)
    }

    async fn bounded<T>(
        &self,
        unit: impl Future<Output = Result<T, WalletError>>,
    ) -> Result<T, WalletError> {
        let limit = self.config.apply_timeout;
        tokio::time::timeout(limit, unit).await.unwrap_or_else(|_| {
            Err(WalletError::StoreUnavailable(format!(
                "atomic apply exceeded {}ms",
                limit.as_millis()
            )))
        })
    }

    /// Begin, lock and decide under the time limit, then commit.
    async fn apply_unit(
        &self,
        account_id: AccountId,
        requested_by: UserId,
        amount: i64,
        mutation: &Mutation,
        idempotency_key: Option<String>,
    ) -> Result<MutationOutcome, WalletError> {
        let (tx, outcome) = self
            .bounded(async {
                let mut tx = self.store.begin().await?;
                let decided = apply_locked(
                    &mut *tx,
                    account_id,
                    requested_by,
                    amount,
                    mutation,
                    idempotency_key,
                )
                .await;
                match decided {
                    Ok(outcome) => Ok((tx, outcome)),
                    Err(err) => {
                        discard(tx).await;
                        Err(err)
                    }
                }
            })
            .await?;

        tx.commit().await?;
        Ok(outcome)
    }

    async fn transfer_unit(
        &self,
        source_id: AccountId,
        destination_id: AccountId,
        requested_by: UserId,
        amount: i64,
        idempotency_key: Option<String>,
    ) -> Result<TransferReceipt, WalletError> {
        let (tx, decision) = self
            .bounded(async {
                let mut tx = self.store.begin().await?;
                let decided = transfer_locked(
                    &mut *tx,
                    source_id,
                    destination_id,
                    requested_by,
                    amount,
                    idempotency_key,
                )
                .await;
                match decided {
                    Ok(decision) => Ok((tx, decision)),
                    Err(err) => {
                        discard(tx).await;
                        Err(err)
                    }
                }
            })
            .await?;

        match decision {
            TransferDecision::Committed(receipt) => {
                tx.commit().await?;
                Ok(receipt)
            }
            TransferDecision::Replay { source, debit } => {
                discard(tx).await;
                self.bounded(self.replay_transfer(source, debit, destination_id))
                    .await
            }
        }
    }

    /// Rebuild the receipt of an already committed transfer from its debit leg.
    async fn replay_transfer(
        &self,
        source: Account,
        debit: LedgerEntry,
        destination_id: AccountId,
    ) -> Result<TransferReceipt, WalletError> {
        let credit = match debit.related_entry_id {
            Some(id) => self.store.ledger_entry(id).await?,
            None => None,
        };
        let credit = credit
            .filter(|c| c.account_id == destination_id)
            .ok_or_else(|| {
                WalletError::IdempotencyConflict(
                    "idempotency key was used for a different transfer".to_string(),
                )
            })?;

        Ok(TransferReceipt {
            account_id: source.id,
            account_number: source.account_number,
            to_account_id: destination_id,
            amount: credit.amount,
            kind: debit.kind,
            final_balance: debit.balance_after,
            at: debit.created_at,
            debit,
            credit,
        })
    }
}

enum TransferDecision {
    Committed(TransferReceipt),
    Replay { source: Account, debit: LedgerEntry },
}

async fn apply_locked(
    tx: &mut dyn StoreTransaction,
    account_id: AccountId,
    requested_by: UserId,
    amount: i64,
    mutation: &Mutation,
    idempotency_key: Option<String>,
) -> Result<MutationOutcome, WalletError> {
    let mut account = tx
        .find_account_for_update(account_id)
        .await?
        .ok_or(WalletError::NotFound(account_id))?;
    account.ensure_owned_by(requested_by)?;

    let policy = mutation.policy();
    mutation.check_fields()?;
    policy.check_amount(amount)?;
    let delta = policy.delta(amount);

    if let Some(key) = idempotency_key.as_deref() {
        if let Some(previous) = tx.find_entry_by_idempotency_key(account_id, key).await? {
            ensure_same_request(&previous, policy, delta, false)?;
            return Ok(MutationOutcome {
                account_number: account.account_number,
                new_balance: previous.balance_after,
                entry: previous,
                replayed: true,
            });
        }
    }

    let now = Utc::now();
    let new_balance = account.apply_delta(delta, now)?;

    let mut entry = LedgerEntry::new(
        EntryId::new(),
        account_id,
        delta,
        policy.kind,
        policy.description,
        new_balance,
        now,
    )
    .with_idempotency_key(idempotency_key);
    if let Some(destination) = mutation.destination() {
        entry = entry.with_destination(destination);
    }

    tx.save_account(&account).await?;
    let entry = tx.append_ledger_entry(entry).await?;

    Ok(MutationOutcome {
        account_number: account.account_number,
        new_balance,
        entry,
        replayed: false,
    })
}

async fn transfer_locked(
    tx: &mut dyn StoreTransaction,
    source_id: AccountId,
    destination_id: AccountId,
    requested_by: UserId,
    amount: i64,
    idempotency_key: Option<String>,
) -> Result<TransferDecision, WalletError> {
    // Fixed lock order keeps two opposite transfers from deadlocking.
    let (first, second) = if source_id < destination_id {
        (source_id, destination_id)
    } else {
        (destination_id, source_id)
    };
    let first_row = tx.find_account_for_update(first).await?;
    let second_row = tx.find_account_for_update(second).await?;
    let (source, destination) = if first == source_id {
        (first_row, second_row)
    } else {
        (second_row, first_row)
    };

    let mut source = source.ok_or(WalletError::NotFound(source_id))?;
    source.ensure_owned_by(requested_by)?;
    let mut destination = destination.ok_or(WalletError::NotFound(destination_id))?;

    let policy = MutationPolicy::INTERNAL_TRANSFER;
    policy.check_amount(amount)?;
    let delta = policy.delta(amount);

    if let Some(key) = idempotency_key.as_deref() {
        if let Some(previous) = tx.find_entry_by_idempotency_key(source_id, key).await? {
            ensure_same_request(&previous, policy, delta, true)?;
            return Ok(TransferDecision::Replay {
                source,
                debit: previous,
            });
        }
    }

    let now = Utc::now();
    let source_balance = source.apply_delta(delta, now)?;
    let destination_balance = destination.apply_delta(amount, now)?;

    let debit_id = EntryId::new();
    let credit_id = EntryId::new();
    let debit = LedgerEntry::new(
        debit_id,
        source_id,
        delta,
        EntryKind::TransferOut,
        format!("{} to {}", policy.description, destination.account_number),
        source_balance,
        now,
    )
    .with_related(credit_id)
    .with_idempotency_key(idempotency_key);
    let credit = LedgerEntry::new(
        credit_id,
        destination_id,
        amount,
        EntryKind::TransferIn,
        format!("{} from {}", policy.description, source.account_number),
        destination_balance,
        now,
    )
    .with_related(debit_id);

    tx.save_account(&source).await?;
    tx.save_account(&destination).await?;
    let debit = tx.append_ledger_entry(debit).await?;
    let credit = tx.append_ledger_entry(credit).await?;

    Ok(TransferDecision::Committed(TransferReceipt {
        account_id: source_id,
        account_number: source.account_number,
        to_account_id: destination_id,
        amount,
        kind: EntryKind::TransferOut,
        final_balance: source_balance,
        debit,
        credit,
        at: now,
    }))
}

/// An idempotency key may only be reused for the identical request.
fn ensure_same_request(
    previous: &LedgerEntry,
    policy: MutationPolicy,
    delta: i64,
    linked: bool,
) -> Result<(), WalletError> {
    if previous.kind == policy.kind
        && previous.amount == delta
        && previous.related_entry_id.is_some() == linked
    {
        return Ok(());
    }
    Err(WalletError::IdempotencyConflict(format!(
        "idempotency key already used for {} of {}",
        previous.kind,
        previous.amount.saturating_abs()
    )))
}

async fn discard(tx: Box<dyn StoreTransaction>) {
    if let Err(err) = tx.rollback().await {
        warn!(error = %err, "rollback failed; transaction dropped");
    }
}

fn log_failure(operation: &'static str, err: &WalletError) {
    match err {
        WalletError::StoreUnavailable(_) => error!(operation, error = %err, "store failure"),
        WalletError::Forbidden => warn!(operation, error = %err, "rejected non-owner"),
        _ => debug!(operation, error = %err, "rejected"),
    }
}
