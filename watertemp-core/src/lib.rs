//! Core library for the `watertemp` CLI.
//!
//! This crate defines:
//! - Configuration loading and validation
//! - The temperature source (SMHI open data API)
//! - The SQLite reading store
//! - The background polling agent tying the two together
//!
//! It is used by `watertemp-cli`, but can also be reused by other binaries or services.

pub mod agent;
pub mod config;
pub mod error;
pub mod model;
pub mod source;
pub mod store;

#[cfg(test)]
mod test_support;

pub use agent::PollingAgent;
pub use config::{AgentConfig, LogLevel};
pub use error::{AgentError, ConfigError, FetchError, StoreError};
pub use model::{NewReading, Reading};
pub use source::{TemperatureSource, smhi::SmhiSource};
pub use store::{ReadingSink, sqlite::SqliteStore};
