use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::level_filters::LevelFilter;

use crate::error::ConfigError;

pub const DEFAULT_STATION_ID: u32 = 25133;
pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_API_URL: &str =
    "https://opendata-download-ocobs.smhi.se/api/version/1.0/parameter/5/station/";
pub const DEFAULT_LOG_FILE: &str = "logs/application.log";

/// Minimum severity written to the log file.
///
/// Parsed leniently: matching is case-insensitive and anything unknown
/// falls back to `Information`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
    Debug,
    #[default]
    Information,
    Warning,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "information" | "info" => LogLevel::Information,
            "warning" | "warn" => LogLevel::Warning,
            "error" => LogLevel::Error,
            "fatal" => LogLevel::Fatal,
            _ => LogLevel::Information,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Information => "information",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Information => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Fatal => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for LogLevel {
    fn from(value: String) -> Self {
        LogLevel::parse(&value)
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Information => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Fatal => LevelFilter::ERROR,
        }
    }
}

/// Settings shared read-only by the source, the store and the agent.
///
/// Example TOML:
/// ```toml
/// monitorTemperature = true
/// stationId = 25133
/// pollingInterval = 10
/// databasePath = "temperatures.db"
/// loggingLevel = "information"
/// apiUrl = "https://opendata-download-ocobs.smhi.se/api/version/1.0/parameter/5/station/"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Start the background agent as soon as the CLI launches.
    pub monitor_temperature: bool,
    pub station_id: u32,
    /// Seconds between two polls.
    pub polling_interval: u64,
    pub database_path: PathBuf,
    pub logging_level: LogLevel,
    pub api_url: String,
    pub log_file: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            monitor_temperature: true,
            station_id: DEFAULT_STATION_ID,
            polling_interval: DEFAULT_POLLING_INTERVAL_SECS,
            database_path: default_database_path(),
            logging_level: LogLevel::default(),
            api_url: DEFAULT_API_URL.to_string(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl AgentConfig {
    /// Load config from `path`, or from the platform config file when no path
    /// is given. A file that does not exist yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_file_path()?,
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }

    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let cfg: AgentConfig =
            toml::from_str(contents).context("Failed to parse configuration TOML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling_interval == 0 {
            return Err(ConfigError::Invalid {
                field: "pollingInterval",
                reason: "must be greater than zero seconds".to_string(),
            });
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "databasePath",
                reason: "must not be empty".to_string(),
            });
        }

        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "apiUrl",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the platform config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = project_dirs()
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval)
    }

    /// Label stored as the location of every reading.
    ///
    /// Derived from `stationId` rather than fixed, so readings from a
    /// reconfigured station are not stored under the old station's name.
    pub fn station_label(&self) -> String {
        format!("Station {}", self.station_id)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "watertemp", "watertemp")
}

fn default_database_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("temperatures.db"))
        .unwrap_or_else(|| PathBuf::from("temperatures.db"))
}
