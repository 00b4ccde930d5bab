//! Bulk comparison runs.
//!
//! [`BulkScheduler`] runs one [`TableComparator`] invocation per job under a
//! bounded number of concurrent workers. Each job is isolated: errors,
//! panics and timeouts end that job only and the batch continues.
//!
//! Workers never touch the summary. They send [`JobEvent`]s over a channel
//! to a single aggregating task that owns the [`RunSummaryBuilder`] and
//! applies every state transition.
//!
//! # Module Structure
//! - `job`: job specs, records and the status state machine
//! - `job_list`: CSV job list input and output
//! - `summary`: run summaries and their builder
//! - `aggregate`: derived report views
//! - `retry`: retry job lists from a previous summary

pub mod aggregate;
pub mod job;
pub mod job_list;
pub mod retry;
pub mod summary;

pub use aggregate::{RankBy, ResultAggregator, RowCountDifference, SummaryReport, Totals};
pub use job::{JobOutcome, JobRecord, JobSpec, JobStatus, TransitionError, job_key};
pub use job_list::{parse_job_list, read_job_list, write_job_list, write_job_list_to};
pub use retry::{needs_retry, retry_filter, retry_jobs};
pub use summary::{RunFilter, RunSummary, RunSummaryBuilder};

use crate::Result;
use crate::compare::TableComparator;
use crate::config::{ComparisonConfig, SchedulerConfig};
use crate::error::ErrorCategory;
use crate::logging::JobLog;
use crate::sources::SourceProvider;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, warn};

/// State change reported by a worker.
#[derive(Debug)]
pub enum JobEvent {
    /// The job acquired a worker and began executing.
    Started {
        index: usize,
        at: DateTime<Utc>,
        log_file: Option<PathBuf>,
    },
    /// The job reached a terminal outcome.
    Finished {
        index: usize,
        at: DateTime<Utc>,
        outcome: JobOutcome,
    },
}

/// Shared, read-only state handed to every worker.
struct WorkerContext {
    comparator: TableComparator,
    timeout: Duration,
    log_dir: Option<PathBuf>,
}

impl WorkerContext {
    async fn open_log(&self, key: &str) -> JobLog {
        match &self.log_dir {
            Some(dir) => JobLog::open(dir, key).await.unwrap_or_else(|e| {
                warn!("Job log for {} unavailable: {}", key, e);
                JobLog::disabled(key)
            }),
            None => JobLog::disabled(key),
        }
    }
}

/// Runs many table comparisons with bounded concurrency.
pub struct BulkScheduler {
    source: Arc<dyn SourceProvider>,
    destination: Arc<dyn SourceProvider>,
    comparison: ComparisonConfig,
    config: SchedulerConfig,
}

impl std::fmt::Debug for BulkScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkScheduler")
            .field("source", &self.source.describe())
            .field("destination", &self.destination.describe())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BulkScheduler {
    /// Creates a scheduler comparing tables between two providers.
    pub fn new(
        source: Arc<dyn SourceProvider>,
        destination: Arc<dyn SourceProvider>,
        comparison: ComparisonConfig,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            source,
            destination,
            comparison,
            config,
        }
    }

    /// Scheduler settings in use.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Runs every job and returns the finished summary.
    ///
    /// With a concurrency of 1 jobs run strictly in submission order. Jobs
    /// are always started in submission order; completion order is not
    /// guaranteed above 1. The summary lists records in submission order
    /// with their actual start and end times.
    ///
    /// # Errors
    /// Returns a configuration error if the scheduler settings are invalid.
    /// Failures of individual jobs never surface here.
    pub async fn run(&self, jobs: Vec<JobSpec>, filter: RunFilter) -> Result<RunSummary> {
        self.config.validate()?;

        if let Some(dir) = &self.config.log_dir
            && let Err(e) = std::fs::create_dir_all(dir)
        {
            warn!("Cannot create log directory {}: {}", dir.display(), e);
        }

        let started_at = Utc::now();
        let builder = RunSummaryBuilder::new(filter, &jobs, started_at)
            .with_log_dir(self.config.log_dir.clone());
        let run_id = builder.run_id();
        info!(
            "Run {} starting: {} jobs, concurrency {}, timeout {}s",
            run_id,
            jobs.len(),
            self.config.concurrency,
            self.config.job_timeout_secs
        );

        let (events, receiver) = mpsc::unbounded_channel();
        let aggregator = tokio::spawn(aggregate_events(builder, receiver));

        let context = Arc::new(WorkerContext {
            comparator: TableComparator::new(
                Arc::clone(&self.source),
                Arc::clone(&self.destination),
                self.comparison.clone(),
            ),
            timeout: self.config.job_timeout(),
            log_dir: self.config.log_dir.clone(),
        });
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));

        let mut workers = Vec::with_capacity(jobs.len());
        for (index, spec) in jobs.into_iter().enumerate() {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                warn!("Worker pool closed, {} remains pending", spec.key(index));
                break;
            };
            let context = Arc::clone(&context);
            let events = events.clone();
            workers.push(tokio::spawn(async move {
                run_job(&context, index, spec, &events).await;
                drop(permit);
            }));
        }
        drop(events);

        for joined in futures::future::join_all(workers).await {
            if let Err(e) = joined {
                warn!("Worker task ended abnormally: {}", e);
            }
        }

        let summary = match aggregator.await {
            Ok(summary) => summary,
            Err(e) => {
                return Err(crate::error::DriftError::query_failed(format!(
                    "Run summary aggregation failed: {e}"
                )));
            }
        };

        info!(
            "Run {} finished: {} total, {} passed, {} failed, {} errored ({} timed out)",
            summary.run_id,
            summary.total,
            summary.passed,
            summary.failed,
            summary.errored,
            summary.timed_out
        );
        Ok(summary)
    }
}

/// Owns the summary for the duration of a run.
async fn aggregate_events(
    mut builder: RunSummaryBuilder,
    mut receiver: mpsc::UnboundedReceiver<JobEvent>,
) -> RunSummary {
    while let Some(event) = receiver.recv().await {
        let applied = match event {
            JobEvent::Started { index, at, log_file } => builder.started(index, at, log_file),
            JobEvent::Finished { index, at, outcome } => builder.finished(index, outcome, at),
        };
        if let Err(e) = applied {
            warn!("Ignoring job event: {}", e);
        }
    }
    builder.finish(Utc::now())
}

/// Executes one job end to end and reports its events.
async fn run_job(
    context: &Arc<WorkerContext>,
    index: usize,
    spec: JobSpec,
    events: &mpsc::UnboundedSender<JobEvent>,
) {
    let key = spec.key(index);
    let mut log = context.open_log(&key).await;
    let send = |event: JobEvent| {
        if events.send(event).is_err() {
            warn!("Run summary closed before job {} reported", key);
        }
    };

    send(JobEvent::Started {
        index,
        at: Utc::now(),
        log_file: log.path().map(std::path::Path::to_path_buf),
    });
    log.info(format!(
        "Starting {} -> {}",
        spec.mapping.source, spec.mapping.destination
    ));
    log.flush().await;

    let outcome = match &spec.defect {
        Some(defect) => JobOutcome::Failed {
            message: format!("Invalid job record: {defect}"),
            category: ErrorCategory::Configuration,
        },
        None => execute(context, spec).await,
    };

    match &outcome {
        JobOutcome::Completed(result) => {
            log.info(format!(
                "Rows {} -> {} ({:+}, {:.4}%)",
                result.source_row_count,
                result.destination_row_count,
                result.row_count_delta,
                result.row_count_delta_pct
            ));
            for column in result.failed_columns() {
                log.warn(format!("Column {column} failed"));
            }
            log.info(format!("Finished with status {:?} in {}ms", result.status, result.duration_ms));
        }
        JobOutcome::Failed { message, category } => {
            log.error(format!("Job failed ({category:?}): {message}"));
        }
        JobOutcome::TimedOut { after } => {
            log.error(format!("Job cancelled after {}s timeout", after.as_secs()));
        }
    }
    log.flush().await;

    send(JobEvent::Finished {
        index,
        at: Utc::now(),
        outcome,
    });
}

/// Runs the comparison in its own task so a timeout can cancel it.
async fn execute(context: &Arc<WorkerContext>, spec: JobSpec) -> JobOutcome {
    let worker = Arc::clone(context);
    let mapping = spec.mapping;
    let mut handle = tokio::spawn(async move { worker.comparator.compare(&mapping).await });

    match tokio::time::timeout(context.timeout, &mut handle).await {
        Ok(Ok(Ok(result))) => JobOutcome::Completed(Box::new(result)),
        Ok(Ok(Err(e))) => JobOutcome::from_error(&e),
        Ok(Err(e)) => JobOutcome::Failed {
            message: format!("Comparison task panicked: {e}"),
            category: ErrorCategory::Execution,
        },
        Err(_) => {
            handle.abort();
            // Wait for cancellation so the job's connections are released
            // before the timeout is recorded.
            if let Err(e) = handle.await {
                debug!("Cancelled comparison: {}", e);
            }
            JobOutcome::TimedOut {
                after: context.timeout,
            }
        }
    }
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
    use crate::models::TableRef;
    use crate::sources::{MemoryCatalog, MemoryProvider, MemoryTable};
    use serde_json::json;

    fn provider(schema: &str, tables: usize) -> MemoryProvider {
        let mut catalog = MemoryCatalog::new();
        for i in 0..tables {
            catalog.insert(
                MemoryTable::new(TableRef::new(schema, format!("T{i}")))
                    .with_column("ID", "INTEGER", (0..20).map(|v| json!(v))),
            );
        }
        MemoryProvider::new(catalog)
    }

    fn jobs(n: usize) -> Vec<JobSpec> {
        (0..n)
            .map(|i| JobSpec::new(TableRef::new("SRC", format!("T{i}")), TableRef::new("DST", format!("T{i}"))))
            .collect()
    }

    #[tokio::test]
    async fn test_defective_job_is_an_error() {
        let scheduler = BulkScheduler::new(
            Arc::new(provider("SRC", 1)),
            Arc::new(provider("DST", 1)),
            ComparisonConfig::default(),
            SchedulerConfig::default(),
        );
        let mut list = jobs(1);
        list.push(JobSpec::defective(list[0].mapping.clone(), "row 2: bad"));

        let summary = scheduler.run(list, RunFilter::default()).await.unwrap();
        assert_eq!(summary.records[0].status, JobStatus::Pass);
        assert_eq!(summary.records[1].status, JobStatus::Error);
        assert_eq!(summary.records[1].error_category, Some(ErrorCategory::Configuration));
    }

    #[tokio::test]
    async fn test_job_logs_written() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = BulkScheduler::new(
            Arc::new(provider("SRC", 2)),
            Arc::new(provider("DST", 1)),
            ComparisonConfig::default(),
            SchedulerConfig::default().with_log_dir(dir.path()),
        );
        let summary = scheduler.run(jobs(2), RunFilter::default()).await.unwrap();

        let missing = &summary.records[1];
        assert_eq!(missing.status, JobStatus::Error);
        let log = std::fs::read_to_string(missing.log_file.as_ref().unwrap()).unwrap();
        assert!(log.contains("Table not found: DST.T1"));
        assert!(dir.path().join(format!("{}.log", summary.records[0].key)).exists());
    }

    #[tokio::test]
    async fn test_invalid_scheduler_config_rejected() {
        let config = SchedulerConfig {
            job_timeout_secs: 0,
            ..SchedulerConfig::default()
        };
        let scheduler = BulkScheduler::new(
            Arc::new(provider("SRC", 1)),
            Arc::new(provider("DST", 1)),
            ComparisonConfig::default(),
            config,
        );
        assert!(scheduler.run(jobs(1), RunFilter::default()).await.is_err());
    }
}
