//! Integration tests for the full mutation pipeline.
//!
//! Tests: Command → CommandHandlers → Engine → Store transaction → Ledger
//!
//! Verifies:
//! - The worked scenarios for withdraw, bank transfer-out and top-up
//! - Failed mutations leave balance and ledger untouched
//! - A failure after the balance write rolls the whole unit back
//! - Non-owners are rejected before anything is written

#[cfg(test)]
mod tests {
    use custodia_core::{AccountId, UserId};
    use custodia_ledger::{
        BankTransferOut, EntryKind, ExternalDestination, GetBalance, TopUp, Transfer, Withdraw,
    };

    use crate::command_handlers::CommandHandlers;
    use crate::config::EngineConfig;
    use crate::engine::BalanceMutationEngine;
    use crate::error::WalletError;
    use crate::store::{AccountStore, InMemoryWalletStore, LedgerEntryStore};

    fn setup() -> (CommandHandlers<InMemoryWalletStore>, InMemoryWalletStore) {
        let store = InMemoryWalletStore::new();
        let engine = BalanceMutationEngine::new(store.clone(), EngineConfig::default());
        (CommandHandlers::new(engine), store)
    }

    async fn account_with_balance(
        handlers: &CommandHandlers<InMemoryWalletStore>,
        owner: UserId,
        balance: i64,
    ) -> AccountId {
        let account = handlers.open_account(owner).await.unwrap();
        handlers
            .top_up(TopUp {
                account_id: account.account_id,
                requested_by: owner,
                amount: balance,
                idempotency_key: None,
            })
            .await
            .unwrap();
        account.account_id
    }

    fn withdraw(account_id: AccountId, requested_by: UserId, amount: i64) -> Withdraw {
        Withdraw {
            account_id,
            requested_by,
            amount,
            idempotency_key: None,
        }
    }

    async fn balance(
        handlers: &CommandHandlers<InMemoryWalletStore>,
        account_id: AccountId,
        owner: UserId,
    ) -> i64 {
        handlers
            .get_balance(GetBalance {
                account_id,
                requested_by: owner,
            })
            .await
            .unwrap()
            .balance
    }

    #[tokio::test]
    async fn withdrawing_the_whole_balance_leaves_zero() {
        let (handlers, store) = setup();
        let owner = UserId::new();
        let account_id = account_with_balance(&handlers, owner, 50_000).await;

        let receipt = handlers
            .withdraw(withdraw(account_id, owner, 50_000))
            .await
            .unwrap();

        assert_eq!(receipt.final_balance, 0);
        assert_eq!(receipt.kind, EntryKind::Withdraw);

        let entries = store.ledger_entries(account_id).await.unwrap();
        let withdrawals: Vec<_> = entries
            .iter()
            .filter(|e| e.kind == EntryKind::Withdraw)
            .collect();
        assert_eq!(withdrawals.len(), 1);
        assert_eq!(withdrawals[0].amount, -50_000);
    }

    #[tokio::test]
    async fn overdraw_is_rejected_without_side_effects() {
        let (handlers, store) = setup();
        let owner = UserId::new();
        let account_id = account_with_balance(&handlers, owner, 50_000).await;
        let entries_before = store.entry_count().unwrap();

        let err = handlers
            .withdraw(withdraw(account_id, owner, 100_000))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            WalletError::InsufficientBalance {
                attempted: 100_000,
                available: 50_000
            }
        );
        assert_eq!(balance(&handlers, account_id, owner).await, 50_000);
        assert_eq!(store.entry_count().unwrap(), entries_before);
    }

    #[tokio::test]
    async fn bank_transfer_out_records_destination() {
        let (handlers, store) = setup();
        let owner = UserId::new();
        let account_id = account_with_balance(&handlers, owner, 100_000).await;

        let receipt = handlers
            .bank_transfer_out(BankTransferOut {
                account_id,
                requested_by: owner,
                amount: 60_000,
                destination: ExternalDestination {
                    account: "1234567890".to_string(),
                    bank_name: "Mandiri".to_string(),
                },
                idempotency_key: None,
            })
            .await
            .unwrap();
        assert_eq!(receipt.final_balance, 40_000);

        let entries = store.ledger_entries(account_id).await.unwrap();
        let last = entries.last().unwrap();
        assert_eq!(last.kind, EntryKind::TransferOut);
        assert_eq!(last.amount, -60_000);
        assert_eq!(last.description, "Bank Withdrawal");
        assert_eq!(last.external_destination.as_deref(), Some("1234567890"));
        assert_eq!(last.external_bank_name.as_deref(), Some("Mandiri"));
        assert_eq!(last.related_entry_id, None);
    }

    #[tokio::test]
    async fn amount_boundaries() {
        let (handlers, _store) = setup();
        let owner = UserId::new();
        let account_id = account_with_balance(&handlers, owner, 200_000).await;

        assert!(handlers.withdraw(withdraw(account_id, owner, 50_000)).await.is_ok());
        assert!(matches!(
            handlers.withdraw(withdraw(account_id, owner, 49_999)).await,
            Err(WalletError::InvalidAmount { minimum: 50_000, .. })
        ));

        let top_up = |amount| TopUp {
            account_id,
            requested_by: owner,
            amount,
            idempotency_key: None,
        };
        assert!(handlers.top_up(top_up(10_000)).await.is_ok());
        assert!(matches!(
            handlers.top_up(top_up(9_999)).await,
            Err(WalletError::InvalidAmount { minimum: 10_000, .. })
        ));
        assert!(matches!(
            handlers.top_up(top_up(0)).await,
            Err(WalletError::InvalidAmount { .. })
        ));
        assert!(matches!(
            handlers.top_up(top_up(-10_000)).await,
            Err(WalletError::InvalidAmount { .. })
        ));
    }

    #[tokio::test]
    async fn debit_then_credit_round_trips() {
        let (handlers, store) = setup();
        let owner = UserId::new();
        let account_id = account_with_balance(&handlers, owner, 80_000).await;
        let before = store.ledger_entries(account_id).await.unwrap().len();

        handlers
            .withdraw(withdraw(account_id, owner, 60_000))
            .await
            .unwrap();
        handlers
            .top_up(TopUp {
                account_id,
                requested_by: owner,
                amount: 60_000,
                idempotency_key: None,
            })
            .await
            .unwrap();

        let entries = store.ledger_entries(account_id).await.unwrap();
        assert_eq!(entries.len(), before + 2);
        assert_eq!(entries[before..].iter().map(|e| e.amount).sum::<i64>(), 0);
        assert_eq!(balance(&handlers, account_id, owner).await, 80_000);
    }

    #[tokio::test]
    async fn non_owner_is_forbidden_for_every_operation() {
        let (handlers, store) = setup();
        let owner = UserId::new();
        let stranger = UserId::new();
        let account_id = account_with_balance(&handlers, owner, 100_000).await;
        let other = handlers.open_account(stranger).await.unwrap().account_id;
        let entries_before = store.entry_count().unwrap();

        assert_eq!(
            handlers.withdraw(withdraw(account_id, stranger, 50_000)).await.unwrap_err(),
            WalletError::Forbidden
        );
        assert_eq!(
            handlers
                .top_up(TopUp {
                    account_id,
                    requested_by: stranger,
                    amount: 10_000,
                    idempotency_key: None,
                })
                .await
                .unwrap_err(),
            WalletError::Forbidden
        );
        assert_eq!(
            handlers
                .bank_transfer_out(BankTransferOut {
                    account_id,
                    requested_by: stranger,
                    amount: 50_000,
                    destination: ExternalDestination {
                        account: "1".to_string(),
                        bank_name: "BCA".to_string(),
                    },
                    idempotency_key: None,
                })
                .await
                .unwrap_err(),
            WalletError::Forbidden
        );
        assert_eq!(
            handlers
                .transfer(Transfer {
                    account_id,
                    to_account_id: other,
                    requested_by: stranger,
                    amount: 50_000,
                    idempotency_key: None,
                })
                .await
                .unwrap_err(),
            WalletError::Forbidden
        );
        assert_eq!(
            handlers
                .get_balance(GetBalance {
                    account_id,
                    requested_by: stranger,
                })
                .await
                .unwrap_err(),
            WalletError::Forbidden
        );

        assert_eq!(balance(&handlers, account_id, owner).await, 100_000);
        assert_eq!(store.entry_count().unwrap(), entries_before);
    }

    #[tokio::test]
    async fn failed_append_rolls_back_balance_write() {
        let (handlers, store) = setup();
        let owner = UserId::new();
        let account_id = account_with_balance(&handlers, owner, 100_000).await;
        let entries_before = store.entry_count().unwrap();

        store.inject_append_failure();
        let err = handlers
            .withdraw(withdraw(account_id, owner, 50_000))
            .await
            .unwrap_err();

        assert!(matches!(err, WalletError::StoreUnavailable(_)));
        assert!(!err.is_client_error());
        assert_eq!(balance(&handlers, account_id, owner).await, 100_000);
        assert_eq!(store.entry_count().unwrap(), entries_before);
    }

    #[tokio::test]
    async fn closed_account_is_not_found() {
        let (handlers, store) = setup();
        let owner = UserId::new();
        let account_id = account_with_balance(&handlers, owner, 100_000).await;

        store.close_account(account_id).await.unwrap();

        assert_eq!(
            handlers.withdraw(withdraw(account_id, owner, 50_000)).await.unwrap_err(),
            WalletError::NotFound(account_id)
        );
        assert_eq!(
            handlers
                .get_balance(GetBalance {
                    account_id,
                    requested_by: owner,
                })
                .await
                .unwrap_err(),
            WalletError::NotFound(account_id)
        );
    }

    #[tokio::test]
    async fn transfer_to_missing_account_is_not_found_and_writes_nothing() {
        let (handlers, store) = setup();
        let owner = UserId::new();
        let account_id = account_with_balance(&handlers, owner, 100_000).await;
        let entries_before = store.entry_count().unwrap();
        let missing = AccountId::new();

        let err = handlers
            .transfer(Transfer {
                account_id,
                to_account_id: missing,
                requested_by: owner,
                amount: 50_000,
                idempotency_key: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err, WalletError::NotFound(missing));
        assert_eq!(balance(&handlers, account_id, owner).await, 100_000);
        assert_eq!(store.entry_count().unwrap(), entries_before);
    }

    #[tokio::test]
    async fn opposite_transfers_do_not_deadlock() {
        let (handlers, _store) = setup();
        let alice = UserId::new();
        let bob = UserId::new();
        let a = account_with_balance(&handlers, alice, 1_000_000).await;
        let b = account_with_balance(&handlers, bob, 1_000_000).await;

        let mut tasks = Vec::new();
        for i in 0..20 {
            let handlers = handlers.clone();
            let (from, to, who) = if i % 2 == 0 { (a, b, alice) } else { (b, a, bob) };
            tasks.push(tokio::spawn(async move {
                handlers
                    .transfer(Transfer {
                        account_id: from,
                        to_account_id: to,
                        requested_by: who,
                        amount: 50_000,
                        idempotency_key: None,
                    })
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let engine = handlers.engine();
        assert_eq!(balance(&handlers, a, alice).await, 1_000_000);
        assert_eq!(balance(&handlers, b, bob).await, 1_000_000);
        assert!(engine.reconcile(a).await.unwrap().consistent);
        assert!(engine.reconcile(b).await.unwrap().consistent);
    }
}
