//! Process-wide log sink.
//!
//! One `tracing` subscriber writing plain lines to a daily rolling log file
//! (`application.log.YYYY-MM-DD`) through a non-blocking writer. The
//! interactive menu owns stdout, so nothing is logged there.

use anyhow::{Context, Result, anyhow};
use std::{fs, path::Path};
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::EnvFilter;
use watertemp_core::LogLevel;

const DEFAULT_FILE_NAME: &str = "application.log";

/// Keeps the background log writer alive. Dropping it flushes pending lines.
#[must_use = "dropping the guard flushes and detaches the log file"]
pub struct LogGuard {
    _worker: WorkerGuard,
}

/// Install the global subscriber. `RUST_LOG` overrides `level` when set.
pub fn init(level: LogLevel, path: &Path) -> Result<LogGuard> {
    let (writer, worker) = file_writer(path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {e}"))?;

    Ok(LogGuard { _worker: worker })
}

/// Daily rolling appender for `path`, behind a non-blocking worker.
///
/// The file name of `path` becomes the prefix of each day's file.
fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let (dir, prefix) = split_log_path(path);

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .build(dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))?;

    Ok(tracing_appender::non_blocking(appender))
}

fn split_log_path(path: &Path) -> (&Path, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let prefix = path
        .file_name()
        .map_or_else(|| DEFAULT_FILE_NAME.to_string(), |name| name.to_string_lossy().into_owned());

    (dir, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn log_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn guard_flushes_lines_to_the_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("application.log");

        let (mut writer, guard) = file_writer(&path).unwrap();
        writer.write_all(b"first line\n").unwrap();
        drop(guard);

        let logs_dir = dir.path().join("logs");
        let files = log_files(&logs_dir);
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with("application.log."), "unexpected file {}", files[0]);

        let contents = fs::read_to_string(logs_dir.join(&files[0])).unwrap();
        assert_eq!(contents, "first line\n");
    }

    #[test]
    fn reopening_appends_to_the_same_day() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.log");

        for line in ["old\n", "new\n"] {
            let (mut writer, guard) = file_writer(&path).unwrap();
            writer.write_all(line.as_bytes()).unwrap();
            drop(guard);
        }

        let files = log_files(dir.path());
        assert_eq!(files.len(), 1);
        assert_eq!(fs::read_to_string(dir.path().join(&files[0])).unwrap(), "old\nnew\n");
    }

    #[test]
    fn bare_file_name_logs_to_the_working_directory() {
        assert_eq!(
            split_log_path(Path::new("watertemp.log")),
            (Path::new("."), "watertemp.log".to_string())
        );
        assert_eq!(
            split_log_path(Path::new("logs/application.log")),
            (Path::new("logs"), "application.log".to_string())
        );
    }
}
