//! Command Handlers: one method per inbound command.
//!
//! Each handler forwards its command to the engine and projects the outcome
//! onto that operation's receipt type. No business rule lives here.

use tracing::info;

use custodia_core::UserId;
use custodia_ledger::{
    AccountSnapshot, BankTransferOut, BankTransferReceipt, GetBalance, LedgerEntry, Mutation,
    TopUp, TopUpReceipt, Transfer, TransferReceipt, Withdraw, WithdrawReceipt,
};

use crate::engine::BalanceMutationEngine;
use crate::error::WalletError;
use crate::store::{AccountStore, WalletStore};

#[derive(Debug, Clone)]
pub struct CommandHandlers<S> {
    engine: BalanceMutationEngine<S>,
}

impl<S> CommandHandlers<S> {
    pub fn new(engine: BalanceMutationEngine<S>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &BalanceMutationEngine<S> {
        &self.engine
    }
}

impl<S> CommandHandlers<S>
where
    S: WalletStore,
{
    pub async fn withdraw(&self, cmd: Withdraw) -> Result<WithdrawReceipt, WalletError> {
        self.engine
            .apply(
                cmd.account_id,
                cmd.requested_by,
                cmd.amount,
                Mutation::Withdraw,
                cmd.idempotency_key,
            )
            .await
            .map(WithdrawReceipt::from)
    }

    pub async fn bank_transfer_out(
        &self,
        cmd: BankTransferOut,
    ) -> Result<BankTransferReceipt, WalletError> {
        self.engine
            .apply(
                cmd.account_id,
                cmd.requested_by,
                cmd.amount,
                Mutation::BankTransferOut(cmd.destination),
                cmd.idempotency_key,
            )
            .await
            .map(BankTransferReceipt::from)
    }

    pub async fn top_up(&self, cmd: TopUp) -> Result<TopUpReceipt, WalletError> {
        self.engine
            .apply(
                cmd.account_id,
                cmd.requested_by,
                cmd.amount,
                Mutation::TopUp,
                cmd.idempotency_key,
            )
            .await
            .map(TopUpReceipt::from)
    }

    pub async fn transfer(&self, cmd: Transfer) -> Result<TransferReceipt, WalletError> {
        self.engine
            .transfer(
                cmd.account_id,
                cmd.to_account_id,
                cmd.requested_by,
                cmd.amount,
                cmd.idempotency_key,
            )
            .await
    }

    pub async fn get_balance(&self, query: GetBalance) -> Result<AccountSnapshot, WalletError> {
        self.engine
            .snapshot(query.account_id, query.requested_by)
            .await
    }

    pub async fn history(&self, query: GetBalance) -> Result<Vec<LedgerEntry>, WalletError> {
        self.engine
            .history(query.account_id, query.requested_by)
            .await
    }

    /// Provision a zero-balance account for `owner`.
    pub async fn open_account(&self, owner: UserId) -> Result<AccountSnapshot, WalletError> {
        let account = self.engine.store().open_account(owner).await?;
        info!(
            account_id = %account.id,
            account_number = %account.account_number,
            owner_id = %owner,
            "account opened"
        );
        Ok(account.snapshot())
    }
}
