//! Error types for the polling pipeline.
//!
//! `FetchError` and `StoreError` stay inside their components: `fetch()` and
//! `save()` log them and carry on. Only `AgentError` ends a background loop.

use thiserror::Error;

/// Invalid configuration value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid `{field}` in configuration: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Failure while asking the upstream API for a reading.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream responded with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to parse response JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure while persisting or reading readings.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Refusing to store non-finite temperature {0}")]
    InvalidReading(f64),
}

/// Conditions that stop (or prevent) a background polling loop.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Polling agent is already running")]
    AlreadyRunning,

    #[error("Polling agent is still finishing its last iteration")]
    Stopping,

    #[error("No Tokio runtime available to run the polling agent: {0}")]
    Runtime(String),

    #[error("Temperature source produced a non-finite reading: {0}")]
    InvalidReading(f64),

    #[error("Polling task terminated abnormally: {0}")]
    Join(String),
}
