//! Run summaries.

use super::job::{JobOutcome, JobRecord, JobSpec, JobStatus, TransitionError};
use crate::Result;
use crate::error::DriftError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Criteria describing which jobs a run covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFilter {
    /// Business date the run was filtered on; recorded, not interpreted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_date: Option<String>,
    /// Where the job list came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_source: Option<String>,
    /// Run this one retries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<Uuid>,
}

/// Machine-readable outcome of a bulk run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub filter: RunFilter,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_duration_ms: u64,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// ERROR and TIMEOUT jobs
    pub errored: usize,
    /// TIMEOUT jobs, also counted in `errored`
    pub timed_out: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    /// One record per submitted job, in submission order
    pub records: Vec<JobRecord>,
}

impl RunSummary {
    /// True iff every job passed.
    pub fn is_success(&self) -> bool {
        self.records.iter().all(|r| r.status == JobStatus::Pass)
    }

    /// Process exit code for this run: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_success())
    }

    /// Records with a given status, in submission order.
    pub fn with_status(&self, status: JobStatus) -> impl Iterator<Item = &JobRecord> {
        self.records.iter().filter(move |r| r.status == status)
    }

    /// Serializes the summary as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns a serialization error if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DriftError::serialization("Failed to serialize run summary", e))
    }

    /// Parses a summary from JSON.
    ///
    /// # Errors
    /// Returns a serialization error if the JSON does not describe a summary.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| DriftError::serialization("Failed to parse run summary", e))
    }

    /// Loads a summary written by a previous run.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            DriftError::io(format!("Failed to read run summary {}", path.display()), e)
        })?;
        Self::from_json(&json)
    }
}

/// Incrementally built summary, owned by a single aggregating task.
#[derive(Debug)]
pub struct RunSummaryBuilder {
    run_id: Uuid,
    filter: RunFilter,
    started_at: DateTime<Utc>,
    log_dir: Option<PathBuf>,
    records: Vec<JobRecord>,
}

impl RunSummaryBuilder {
    /// Starts a summary with one pending record per job.
    pub fn new(filter: RunFilter, jobs: &[JobSpec], started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            filter,
            started_at,
            log_dir: None,
            records: jobs
                .iter()
                .enumerate()
                .map(|(index, spec)| JobRecord::pending(index, spec))
                .collect(),
        }
    }

    /// Records where per-job logs are written.
    pub fn with_log_dir(mut self, log_dir: Option<PathBuf>) -> Self {
        self.log_dir = log_dir;
        self
    }

    /// Run identifier.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Current state of one job.
    pub fn record(&self, index: usize) -> Option<&JobRecord> {
        self.records.get(index)
    }

    fn record_mut(&mut self, index: usize) -> std::result::Result<&mut JobRecord, TransitionError> {
        self.records
            .get_mut(index)
            .ok_or(TransitionError::UnknownJob { index })
    }

    /// Marks a job as running.
    ///
    /// # Errors
    /// Returns [`TransitionError`] for unknown or non-pending jobs.
    pub fn started(
        &mut self,
        index: usize,
        at: DateTime<Utc>,
        log_file: Option<PathBuf>,
    ) -> std::result::Result<(), TransitionError> {
        self.record_mut(index)?.start(at, log_file)
    }

    /// Stores a job's terminal outcome.
    ///
    /// # Errors
    /// Returns [`TransitionError`] for unknown or non-running jobs.
    pub fn finished(
        &mut self,
        index: usize,
        outcome: JobOutcome,
        at: DateTime<Utc>,
    ) -> std::result::Result<(), TransitionError> {
        self.record_mut(index)?.finish(outcome, at)
    }

    /// Completes the summary. Jobs that never reached a terminal state are
    /// recorded as ERROR, so every submitted job appears exactly once.
    pub fn finish(mut self, finished_at: DateTime<Utc>) -> RunSummary {
        for record in self.records.iter_mut().filter(|r| !r.status.is_terminal()) {
            tracing::warn!("Job {} ended in state {}", record.key, record.status);
            record.abandon(finished_at, "Job did not reach a terminal state");
        }

        let count = |status: JobStatus| self.records.iter().filter(|r| r.status == status).count();
        let passed = count(JobStatus::Pass);
        let failed = count(JobStatus::Fail);
        let timed_out = count(JobStatus::Timeout);
        let errored = count(JobStatus::Error).saturating_add(timed_out);

        RunSummary {
            run_id: self.run_id,
            filter: self.filter,
            started_at: self.started_at,
            finished_at,
            total_duration_ms: u64::try_from(finished_at.signed_duration_since(self.started_at).num_milliseconds())
                .unwrap_or(0),
            total: self.records.len(),
            passed,
            failed,
            errored,
            timed_out,
            log_dir: self.log_dir,
            records: self.records,
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
    use crate::error::ErrorCategory;
    use crate::models::TableRef;
    use std::time::Duration;

    fn jobs(n: usize) -> Vec<JobSpec> {
        (0..n)
            .map(|i| {
                JobSpec::new(
                    TableRef::new("src", format!("t{i}")),
                    TableRef::new("dst", format!("t{i}")),
                )
            })
            .collect()
    }

    #[test]
    fn test_counts_and_exit_code() {
        let start = Utc::now();
        let mut builder = RunSummaryBuilder::new(RunFilter::default(), &jobs(3), start);
        for i in 0..3 {
            builder.started(i, start, None).unwrap();
        }
        builder
            .finished(
                0,
                JobOutcome::Failed {
                    message: "refused".into(),
                    category: ErrorCategory::Connectivity,
                },
                start,
            )
            .unwrap();
        builder
            .finished(1, JobOutcome::TimedOut { after: Duration::from_secs(1) }, start)
            .unwrap();

        let summary = builder.finish(start + chrono::Duration::seconds(2));
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 0);
        assert_eq!(summary.errored, 3);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.total_duration_ms, 2000);
        assert_eq!(summary.records[2].status, JobStatus::Error);
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn test_unknown_job_rejected() {
        let mut builder = RunSummaryBuilder::new(RunFilter::default(), &jobs(1), Utc::now());
        assert_eq!(
            builder.started(5, Utc::now(), None),
            Err(TransitionError::UnknownJob { index: 5 })
        );
    }

    #[test]
    fn test_empty_run_is_success() {
        let summary = RunSummaryBuilder::new(RunFilter::default(), &[], Utc::now()).finish(Utc::now());
        assert!(summary.is_success());
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn test_json_round_trip() {
        let filter = RunFilter {
            filter_date: Some("2024-06-30".into()),
            job_source: Some("jobs.csv".into()),
            retry_of: None,
        };
        let summary = RunSummaryBuilder::new(filter, &jobs(2), Utc::now()).finish(Utc::now());
        let json = summary.to_json().unwrap();
        assert!(json.contains("\"filter_date\": \"2024-06-30\""));
        assert_eq!(RunSummary::from_json(&json).unwrap(), summary);
    }
}
