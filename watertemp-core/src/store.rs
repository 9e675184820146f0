use crate::{AgentConfig, store::sqlite::SqliteStore};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod sqlite;

/// Destination for fetched temperatures.
///
/// `save` never fails from the caller's point of view: a reading that cannot
/// be written is logged and dropped.
#[async_trait]
pub trait ReadingSink: Send + Sync + Debug {
    async fn save(&self, temperature: f64);
}

/// Construct the configured store.
pub fn sink_from_config(config: &AgentConfig) -> Arc<dyn ReadingSink> {
    Arc::new(SqliteStore::from_config(config))
}
