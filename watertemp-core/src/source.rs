use crate::{AgentConfig, source::smhi::SmhiSource};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod smhi;

/// Something that can report the latest water temperature.
///
/// Implementations absorb every failure: an unreachable upstream, an error
/// status or a body without data all come back as `None`.
#[async_trait]
pub trait TemperatureSource: Send + Sync + Debug {
    async fn fetch(&self) -> Option<f64>;
}

/// Construct the configured source.
pub fn source_from_config(config: &AgentConfig) -> Arc<dyn TemperatureSource> {
    Arc::new(SmhiSource::from_config(config))
}
