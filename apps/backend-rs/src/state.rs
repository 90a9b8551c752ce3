use std::path::Path;
use std::sync::Arc;

use crate::{
    config::AppConfig,
    db,
    error::AppResult,
    repository::{event_store::EventStore, memory::InMemoryEventStore, postgres::PgEventStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub event_store: Option<Arc<dyn EventStore>>,
}

impl AppState {
    /// Postgres wins when `DATABASE_URL` is set; otherwise an optional JSON
    /// fixture backs the in-memory store.
    pub fn build(config: AppConfig) -> AppResult<Self> {
        let event_store: Option<Arc<dyn EventStore>> = if let Some(pool) = db::build_pool(&config)? {
            Some(Arc::new(PgEventStore::new(pool)))
        } else if let Some(path) = config.local_events_path.as_deref() {
            let store = InMemoryEventStore::from_path(Path::new(path))?;
            tracing::info!(path, events = store.event_count(), "Loaded local events fixture");
            Some(Arc::new(store))
        } else {
            None
        };

        Ok(Self {
            config: Arc::new(config),
            event_store,
        })
    }

    #[cfg(test)]
    pub fn with_store(config: AppConfig, store: Option<Arc<dyn EventStore>>) -> Self {
        Self {
            config: Arc::new(config),
            event_store: store,
        }
    }
}
