use std::sync::Arc;

use tracing::{info, warn};

use custodia_infra::store::{InMemoryWalletStore, PostgresWalletStore, StoreError, WalletStore};
use custodia_infra::{BalanceMutationEngine, CommandHandlers};

use crate::config::AppConfig;

pub type DynWalletStore = Arc<dyn WalletStore>;

pub struct AppServices {
    pub handlers: CommandHandlers<DynWalletStore>,
}

impl AppServices {
    pub fn new(store: DynWalletStore, config: &AppConfig) -> Self {
        Self {
            handlers: CommandHandlers::new(BalanceMutationEngine::new(
                store,
                config.engine_config(),
            )),
        }
    }
}

/// Pick the store from config: Postgres when a database URL is present,
/// otherwise an in-memory store that lives as long as the process.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    let store: DynWalletStore = match config.store_config() {
        Some(store_config) => {
            let store = PostgresWalletStore::connect(store_config).await?;
            store.migrate().await?;
            info!("using postgres wallet store");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; balances are kept in memory only");
            Arc::new(InMemoryWalletStore::new())
        }
    };

    Ok(AppServices::new(store, config))
}
