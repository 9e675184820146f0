//! SQLite persistence for readings.
//!
//! Every call opens its own connection and closes it before returning, so
//! no connection is ever shared between callers.

use async_trait::async_trait;
use sqlx::{ConnectOptions, Connection, SqliteConnection, sqlite::SqliteConnectOptions};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, warn};

use crate::{
    AgentConfig,
    error::StoreError,
    model::{NewReading, Reading},
};

use super::ReadingSink;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS water_temperatures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    temperature REAL NOT NULL,
    observed_at TEXT NOT NULL,
    location TEXT NOT NULL
)";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    location: String,
}

impl SqliteStore {
    /// `location` is the label stored with every reading.
    pub fn new(path: impl Into<PathBuf>, location: impl Into<String>) -> Self {
        Self { path: path.into(), location: location.into() }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(&config.database_path, config.station_label())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Append one reading captured now, returning it with its assigned id.
    pub async fn insert(&self, temperature: f64) -> Result<Reading, StoreError> {
        let reading = NewReading::new(temperature, self.location.as_str())?;

        let mut conn = self.connect().await?;
        let result = sqlx::query(
            "INSERT INTO water_temperatures (temperature, observed_at, location) VALUES (?, ?, ?)",
        )
        .bind(reading.temperature)
        .bind(reading.observed_at)
        .bind(reading.location.as_str())
        .execute(&mut conn)
        .await;
        close(conn).await;

        let id = result?.last_insert_rowid();
        Ok(reading.with_id(id))
    }

    /// Latest readings, newest first. A database that does not exist yet is empty.
    pub async fn recent(&self, limit: u32) -> Result<Vec<Reading>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut conn = self.connect().await?;
        let result = sqlx::query_as::<_, Reading>(
            "SELECT id, temperature, observed_at, location FROM water_temperatures
             ORDER BY id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&mut conn)
        .await;
        close(conn).await;

        Ok(result?)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        if !self.path.exists() {
            return Ok(0);
        }

        let mut conn = self.connect().await?;
        let result = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM water_temperatures")
            .fetch_one(&mut conn)
            .await;
        close(conn).await;

        Ok(result?)
    }

    async fn connect(&self) -> Result<SqliteConnection, StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        debug!(path = %self.path.display(), "Opening database connection");

        let mut conn = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .connect()
            .await?;

        if let Err(err) = sqlx::query(SCHEMA).execute(&mut conn).await {
            close(conn).await;
            return Err(err.into());
        }

        Ok(conn)
    }
}

async fn close(conn: SqliteConnection) {
    if let Err(err) = conn.close().await {
        warn!(error = %err, "Failed to close database connection");
    }
}

#[async_trait]
impl ReadingSink for SqliteStore {
    async fn save(&self, temperature: f64) {
        match self.insert(temperature).await {
            Ok(reading) => {
                info!(
                    id = reading.id,
                    temperature = reading.temperature,
                    location = %reading.location,
                    "Water temperature saved to database"
                );
            }
            Err(err) => {
                error!(
                    path = %self.path.display(),
                    temperature,
                    error = ?err,
                    "Failed to save water temperature"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CapturedLogs;
    use chrono::Utc;

    const LABEL: &str = "Station 25133";

    fn store_in(dir: &tempfile::TempDir) -> SqliteStore {
        SqliteStore::new(dir.path().join("temperatures.db"), LABEL)
    }

    #[tokio::test]
    async fn save_appends_one_reading() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let before = Utc::now();
        store.save(7.5).await;
        let after = Utc::now();

        assert_eq!(store.count().await.unwrap(), 1);

        let readings = store.recent(10).await.unwrap();
        assert_eq!(readings.len(), 1);

        let reading = &readings[0];
        assert_eq!(reading.temperature, 7.5);
        assert_eq!(reading.location, LABEL);
        assert!(reading.observed_at >= before && reading.observed_at <= after);
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let first = store.insert(10.0).await.unwrap();
        let second = store.insert(11.0).await.unwrap();

        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_limited() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        for t in [1.0, 2.0, 3.0] {
            store.save(t).await;
        }

        let readings = store.recent(2).await.unwrap();
        let temps: Vec<f64> = readings.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![3.0, 2.0]);
    }

    #[tokio::test]
    async fn separate_stores_share_the_file_not_a_connection() {
        let dir = tempfile::tempdir().unwrap();
        let a = store_in(&dir);
        let b = store_in(&dir);

        a.save(4.0).await;
        b.save(5.0).await;

        assert_eq!(a.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn missing_database_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(store.recent(5).await.unwrap().is_empty());
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("a").join("b").join("t.db"), LABEL);

        store.save(6.0).await;

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn non_finite_temperature_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(matches!(
            store.insert(f64::NAN).await,
            Err(StoreError::InvalidReading(_))
        ));

        store.save(f64::INFINITY).await;
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn storage_failure_does_not_propagate() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file.
        let store = SqliteStore::new(dir.path(), LABEL);

        assert!(store.insert(7.5).await.is_err());
        store.save(7.5).await;
    }

    #[tokio::test]
    async fn storage_failure_is_logged_as_error() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path(), LABEL);

        store.save(7.5).await;

        assert!(logs.has("ERROR", "Failed to save water temperature"));
        assert!(!logs.has("INFO", "Water temperature saved to database"));
    }

    #[tokio::test]
    async fn successful_save_is_logged_as_info() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let dir = tempfile::tempdir().unwrap();

        store_in(&dir).save(7.5).await;

        assert!(logs.has("INFO", "Water temperature saved to database"));
        assert!(!logs.has("ERROR", "Failed to save water temperature"));
    }

    #[test]
    fn from_config_uses_station_label() {
        let cfg = AgentConfig { station_id: 35133, ..AgentConfig::default() };
        let store = SqliteStore::from_config(&cfg);

        assert_eq!(store.location(), "Station 35133");
        assert_eq!(store.path(), cfg.database_path.as_path());
    }
}
