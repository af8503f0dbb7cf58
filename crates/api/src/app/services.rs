use std::sync::Arc;

use stockflow_infra::StoreResult;
use stockflow_infra::config::Config;
use stockflow_infra::services::{CatalogService, SaleOrderLifecycle, StockMovementService};
use stockflow_infra::store::{InMemoryStockStore, PostgresStockStore, StockStore};

/// Shared store handle; the backend is chosen once at startup.
pub type SharedStore = Arc<dyn StockStore>;

/// Services the handlers call, all backed by one store.
pub struct AppServices {
    pub catalog: CatalogService<SharedStore>,
    pub movements: StockMovementService<SharedStore>,
    pub orders: SaleOrderLifecycle<SharedStore>,
    /// `"postgres"` or `"in_memory"`, reported by `/health`.
    pub backend: &'static str,
}

impl AppServices {
    pub fn new(store: SharedStore, backend: &'static str) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            movements: StockMovementService::new(store.clone()),
            orders: SaleOrderLifecycle::new(store),
            backend,
        }
    }

    /// Dev/test wiring: a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStockStore::new()), "in_memory")
    }
}

/// Postgres when `DATABASE_URL` is set (schema applied on startup), otherwise in-memory.
pub async fn build_services(config: &Config) -> StoreResult<AppServices> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresStockStore::connect(url, config.max_connections).await?;
            store.migrate().await?;
            Ok(AppServices::new(Arc::new(store), "postgres"))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory stock store (state is lost on exit)");
            Ok(AppServices::in_memory())
        }
    }
}
