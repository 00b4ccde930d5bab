//! Logging setup for the tabledrift binary and per-job log files.
//!
//! Console output and the optional run-level log file come from
//! `tracing-subscriber`. Each bulk job additionally gets its own
//! append-only file, written by [`JobLog`] and mirrored as `tracing`
//! events tagged with the job key.

use crate::Result;
use crate::error::DriftError;
use chrono::{SecondsFormat, Utc};
use std::fmt::Display;
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

/// File name of the run-level log inside a log directory.
pub const RUN_LOG_FILE: &str = "_run.log";

/// Maps CLI verbosity flags to a log level.
///
/// `quiet` wins over any verbosity; otherwise 0=INFO, 1=DEBUG, 2+=TRACE.
pub fn level_for(verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

/// Initializes structured logging based on verbosity level.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - If true, only show ERROR level logs
/// * `run_log` - Optional file that receives a plain-text copy of every event
///
/// # Errors
/// Returns an error if the run log cannot be opened or a global subscriber
/// is already installed.
///
/// # Example
/// ```rust,no_run
/// use tabledrift_core::logging::init_logging;
///
/// // Initialize at DEBUG level
/// init_logging(1, false, None).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool, run_log: Option<&Path>) -> Result<()> {
    let level = level_for(verbose, quiet);

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let file_layer = match run_log {
        Some(path) => {
            let file = open_append(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| DriftError::configuration(format!("Failed to initialize logging: {e}")))?;

    Ok(())
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            DriftError::io(format!("Failed to create log directory {}", parent.display()), e)
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| DriftError::io(format!("Failed to open log file {}", path.display()), e))
}

/// Append-only log for a single job.
///
/// Lines are buffered in memory and appended to `<dir>/<key>.log` with
/// non-blocking I/O on [`JobLog::flush`]. A job log that cannot be written
/// degrades to tracing output only; a broken log file never fails the job
/// it belongs to.
#[derive(Debug)]
pub struct JobLog {
    key: String,
    path: Option<PathBuf>,
    buffer: String,
}

impl JobLog {
    /// Creates `<dir>/<key>.log` for appending.
    ///
    /// # Errors
    /// Returns an I/O error if the directory or file cannot be created.
    pub async fn open(dir: &Path, key: &str) -> Result<Self> {
        let path = dir.join(format!("{key}.log"));
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            DriftError::io(format!("Failed to create log directory {}", dir.display()), e)
        })?;
        append_async(&path, b"").await?;
        Ok(Self {
            key: key.to_string(),
            path: Some(path),
            buffer: String::new(),
        })
    }

    /// A job log that only emits tracing events.
    pub fn disabled(key: &str) -> Self {
        Self {
            key: key.to_string(),
            path: None,
            buffer: String::new(),
        }
    }

    /// Job key this log belongs to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Path of the log file, if one is being written.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Records an INFO line.
    pub fn info(&mut self, message: impl Display) {
        self.write(Level::INFO, &message.to_string());
    }

    /// Records a WARN line.
    pub fn warn(&mut self, message: impl Display) {
        self.write(Level::WARN, &message.to_string());
    }

    /// Records an ERROR line.
    pub fn error(&mut self, message: impl Display) {
        self.write(Level::ERROR, &message.to_string());
    }

    fn write(&mut self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(job = %self.key, "{}", message),
            Level::WARN => tracing::warn!(job = %self.key, "{}", message),
            _ => tracing::info!(job = %self.key, "{}", message),
        }

        if self.path.is_none() {
            return;
        }
        let _ = writeln!(
            self.buffer,
            "{} {:<5} {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            message
        );
    }

    /// Appends buffered lines to the file.
    ///
    /// On failure file output is disabled and later lines go to tracing only.
    pub async fn flush(&mut self) {
        let Some(path) = &self.path else {
            return;
        };
        if self.buffer.is_empty() {
            return;
        }
        if let Err(e) = append_async(path, self.buffer.as_bytes()).await {
            tracing::warn!(job = %self.key, "Job log write failed, disabling file output: {}", e);
            self.path = None;
        }
        self.buffer.clear();
    }
}

async fn append_async(path: &Path, bytes: &[u8]) -> Result<()> {
    let io_error =
        |e: std::io::Error| DriftError::io(format!("Failed to write log file {}", path.display()), e);
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(io_error)?;
    file.write_all(bytes).await.map_err(io_error)?;
    file.flush().await.map_err(io_error)?;
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;

    // Logging can only be initialized once per test process,
    // so init_logging itself is not exercised here.

    #[test]
    fn test_verbosity_levels() {
        let test_cases = [
            ((true, 0), Level::ERROR),
            ((true, 5), Level::ERROR),
            ((false, 0), Level::INFO),
            ((false, 1), Level::DEBUG),
            ((false, 2), Level::TRACE),
            ((false, 10), Level::TRACE),
        ];

        for ((quiet, verbose), expected) in test_cases {
            assert_eq!(
                level_for(verbose, quiet),
                expected,
                "Failed for quiet={quiet}, verbose={verbose}"
            );
        }
    }

    #[tokio::test]
    async fn test_job_log_appends() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = JobLog::open(dir.path(), "0001_main.orders").await.unwrap();
            log.info("started");
            log.error("Table not found: main.orders");
            log.flush().await;
        }
        {
            let mut log = JobLog::open(dir.path(), "0001_main.orders").await.unwrap();
            log.warn("second attempt");
            log.flush().await;
        }

        let content = std::fs::read_to_string(dir.path().join("0001_main.orders.log")).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("INFO"));
        assert!(lines[1].contains("ERROR") && lines[1].contains("main.orders"));
        assert!(lines[2].ends_with("second attempt"));
    }

    #[tokio::test]
    async fn test_job_log_writes_only_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = JobLog::open(&dir.path().join("nested"), "0002_a__b").await.unwrap();
        let path = log.path().unwrap().to_path_buf();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        log.info("buffered");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        log.flush().await;
        assert!(std::fs::read_to_string(&path).unwrap().ends_with("buffered\n"));

        // A second flush with nothing buffered leaves the file alone.
        log.flush().await;
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[tokio::test]
    async fn test_disabled_job_log_has_no_path() {
        let mut log = JobLog::disabled("job");
        log.info("nothing written");
        log.flush().await;
        assert!(log.path().is_none());
        assert_eq!(log.key(), "job");
    }
}
