use std::sync::Arc;

use anyhow::Result;
use teamboard_storage::{MemoryStore, MetricStore, PgStore};
use tracing::info;

use crate::config::{DaemonConfig, StoreBackend, StoreConfig};
use crate::metrics::Metrics;

/// Application context shared by every request handler
///
/// Built once at start-up and handed to the router; there is no other
/// process-wide state.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<DaemonConfig>,
    pub store: Arc<dyn MetricStore>,
    pub metrics: Arc<Metrics>,
}

impl AppContext {
    pub fn new(config: DaemonConfig, store: Arc<dyn MetricStore>) -> Result<Self> {
        Ok(Self {
            config: Arc::new(config),
            store,
            metrics: Arc::new(Metrics::new()?),
        })
    }
}

/// Open the configured store
pub async fn connect_store(config: &StoreConfig) -> Result<Arc<dyn MetricStore>> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store; records are lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let store =
                PgStore::connect(&config.url, config.max_connections, config.acquire_timeout())
                    .await?;
            store.bootstrap().await?;
            Ok(Arc::new(store))
        }
    }
}
