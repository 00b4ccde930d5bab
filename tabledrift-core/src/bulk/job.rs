//! Jobs and their lifecycle.
//!
//! A job moves through `PENDING -> RUNNING -> {PASS, FAIL, ERROR, TIMEOUT}`.
//! Transitions are one-way; anything else is rejected with a
//! [`TransitionError`].

use crate::compare::TableMapping;
use crate::error::{DriftError, ErrorCategory};
use crate::models::{ComparisonStatus, TableComparisonResult, TableRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// One entry of a job list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub mapping: TableMapping,
    /// Problem found while reading the job list. A defective job still
    /// runs through the scheduler and ends as ERROR.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defect: Option<String>,
}

impl JobSpec {
    /// Creates a job for a table pair.
    pub fn new(source: TableRef, destination: TableRef) -> Self {
        Self {
            mapping: TableMapping::new(source, destination),
            defect: None,
        }
    }

    /// Wraps an existing mapping.
    pub fn from_mapping(mapping: TableMapping) -> Self {
        Self {
            mapping,
            defect: None,
        }
    }

    /// A job that fails with a configuration error when run.
    pub fn defective(mapping: TableMapping, defect: impl Into<String>) -> Self {
        Self {
            mapping,
            defect: Some(defect.into()),
        }
    }

    /// Key naming this job's log file, unique within one run.
    pub fn key(&self, index: usize) -> String {
        job_key(index, &self.mapping.source, &self.mapping.destination)
    }
}

/// Builds `<index>_<source>__<destination>` with filesystem-safe characters.
pub fn job_key(index: usize, source: &TableRef, destination: &TableRef) -> String {
    let raw = format!("{index:04}_{source}__{destination}");
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Execution status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Running,
    Pass,
    Fail,
    Error,
    Timeout,
}

impl JobStatus {
    /// True for PASS, FAIL, ERROR and TIMEOUT.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Pass | JobStatus::Fail | JobStatus::Error | JobStatus::Timeout
        )
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match self {
            JobStatus::Pending => next == JobStatus::Running,
            JobStatus::Running => next.is_terminal(),
            JobStatus::Pass | JobStatus::Fail | JobStatus::Error | JobStatus::Timeout => false,
        }
    }

    /// Process-style exit code of a terminal status.
    pub fn exit_code(self) -> Option<i32> {
        match self {
            JobStatus::Pass => Some(0),
            JobStatus::Fail => Some(1),
            JobStatus::Error | JobStatus::Timeout => Some(-1),
            JobStatus::Pending | JobStatus::Running => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Pass => "PASS",
            JobStatus::Fail => "FAIL",
            JobStatus::Error => "ERROR",
            JobStatus::Timeout => "TIMEOUT",
        };
        f.write_str(label)
    }
}

/// Rejected job state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("job {index}: illegal transition {from} -> {to}")]
    Illegal {
        index: usize,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("no job with index {index}")]
    UnknownJob { index: usize },
}

/// How a job's execution ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The comparator returned a result
    Completed(Box<TableComparisonResult>),
    /// The comparator returned an error or the job could not start
    Failed {
        message: String,
        category: ErrorCategory,
    },
    /// The wall-clock limit was reached and the job was cancelled
    TimedOut { after: Duration },
}

impl JobOutcome {
    /// Outcome for an error raised by the comparator.
    pub fn from_error(error: &DriftError) -> Self {
        JobOutcome::Failed {
            message: error.to_string(),
            category: error.category(),
        }
    }

    /// Terminal status this outcome leads to.
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed(result) => match result.status {
                ComparisonStatus::Pass => JobStatus::Pass,
                ComparisonStatus::Fail => JobStatus::Fail,
            },
            JobOutcome::Failed { .. } => JobStatus::Error,
            JobOutcome::TimedOut { .. } => JobStatus::Timeout,
        }
    }
}

/// Execution record of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Position in the submitted job list
    pub index: usize,
    pub key: String,
    pub source: TableRef,
    pub destination: TableRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Present exactly when the comparator completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TableComparisonResult>,
}

impl JobRecord {
    /// A pending record for a submitted job.
    pub fn pending(index: usize, spec: &JobSpec) -> Self {
        Self {
            index,
            key: spec.key(index),
            source: spec.mapping.source.clone(),
            destination: spec.mapping.destination.clone(),
            columns: spec.mapping.columns.clone(),
            status: JobStatus::Pending,
            exit_code: None,
            error: None,
            error_category: None,
            started_at: None,
            finished_at: None,
            duration_ms: None,
            log_file: None,
            result: None,
        }
    }

    /// The table mapping this record was created from.
    pub fn mapping(&self) -> TableMapping {
        TableMapping::new(self.source.clone(), self.destination.clone())
            .with_columns(self.columns.iter().cloned())
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::Illegal {
                index: self.index,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.exit_code = next.exit_code();
        Ok(())
    }

    /// PENDING -> RUNNING.
    ///
    /// # Errors
    /// Returns [`TransitionError`] unless the job is pending.
    pub fn start(&mut self, at: DateTime<Utc>, log_file: Option<PathBuf>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(at);
        self.log_file = log_file;
        Ok(())
    }

    /// RUNNING -> terminal status derived from `outcome`.
    ///
    /// # Errors
    /// Returns [`TransitionError`] unless the job is running.
    pub fn finish(&mut self, outcome: JobOutcome, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(outcome.status())?;
        self.finished_at = Some(at);
        self.duration_ms = self.started_at.map(|started| {
            u64::try_from(at.signed_duration_since(started).num_milliseconds()).unwrap_or(0)
        });
        match outcome {
            JobOutcome::Completed(result) => self.result = Some(*result),
            JobOutcome::Failed { message, category } => {
                self.error = Some(message);
                self.error_category = Some(category);
            }
            JobOutcome::TimedOut { after } => {
                self.error = Some(format!("Job exceeded timeout of {}s", after.as_secs()));
            }
        }
        Ok(())
    }

    /// Forces a job that never reached a terminal state to ERROR.
    pub fn abandon(&mut self, at: DateTime<Utc>, reason: &str) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Error;
        self.exit_code = JobStatus::Error.exit_code();
        self.error = Some(reason.to_string());
        self.error_category = Some(ErrorCategory::Execution);
        self.finished_at = Some(at);
        self.duration_ms = self
            .started_at
            .map(|started| u64::try_from(at.signed_duration_since(started).num_milliseconds()).unwrap_or(0));
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
    use crate::models::{CheckResult, CheckTally, Verdict};

    fn spec() -> JobSpec {
        JobSpec::new(TableRef::new("SAPISU", "EABL"), TableRef::new("replica", "eabl"))
    }

    fn result(status: ComparisonStatus) -> TableComparisonResult {
        let now = Utc::now();
        TableComparisonResult {
            source: TableRef::new("SAPISU", "EABL"),
            destination: TableRef::new("replica", "eabl"),
            source_row_count: 10,
            destination_row_count: 10,
            row_count_delta: 0,
            row_count_delta_pct: 0.0,
            row_count_check: CheckResult {
                verdict: Verdict::Pass,
                actual: 0.0,
                threshold: 0.1,
                margin: 0.1,
            },
            schema_diff: Vec::new(),
            schema_check: Verdict::Pass,
            source_sample_size: 10,
            destination_sample_size: 10,
            columns: Vec::new(),
            checks: CheckTally::default(),
            status,
            started_at: now,
            finished_at: now,
            duration_ms: 0,
        }
    }

    #[test]
    fn test_job_key_is_filesystem_safe() {
        let key = job_key(
            7,
            &TableRef::new("SAP ISU", "EABL/V"),
            &TableRef::new("replica", "eabl"),
        );
        assert_eq!(key, "0007_SAP_ISU.EABL_V__replica.eabl");
    }

    #[test]
    fn test_transitions_are_one_way() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(!Pending.can_transition_to(Pass));
        for terminal in [Pass, Fail, Error, Timeout] {
            assert!(Running.can_transition_to(terminal));
            assert!(!terminal.can_transition_to(Running));
            assert!(!terminal.can_transition_to(Pending));
        }
        assert!(!Running.can_transition_to(Pending));
    }

    #[test]
    fn test_lifecycle_pass() {
        let mut record = JobRecord::pending(0, &spec());
        let start = Utc::now();
        record.start(start, None).unwrap();
        assert_eq!(record.status, JobStatus::Running);
        assert_eq!(record.exit_code, None);

        record
            .finish(
                JobOutcome::Completed(Box::new(result(ComparisonStatus::Pass))),
                start + chrono::Duration::milliseconds(1500),
            )
            .unwrap();
        assert_eq!(record.status, JobStatus::Pass);
        assert_eq!(record.exit_code, Some(0));
        assert_eq!(record.duration_ms, Some(1500));
        assert!(record.result.is_some());
    }

    #[test]
    fn test_fail_and_error_exit_codes() {
        let mut failed = JobRecord::pending(0, &spec());
        failed.start(Utc::now(), None).unwrap();
        failed
            .finish(JobOutcome::Completed(Box::new(result(ComparisonStatus::Fail))), Utc::now())
            .unwrap();
        assert_eq!(failed.exit_code, Some(1));

        let mut errored = JobRecord::pending(1, &spec());
        errored.start(Utc::now(), None).unwrap();
        errored
            .finish(
                JobOutcome::from_error(&DriftError::table_not_found("SAPISU.EABL")),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(errored.status, JobStatus::Error);
        assert_eq!(errored.exit_code, Some(-1));
        assert_eq!(errored.error_category, Some(ErrorCategory::SchemaRead));
        assert!(errored.error.as_deref().unwrap().contains("SAPISU.EABL"));
        assert!(errored.result.is_none());
    }

    #[test]
    fn test_finish_requires_running() {
        let mut record = JobRecord::pending(3, &spec());
        let err = record
            .finish(JobOutcome::TimedOut { after: Duration::from_secs(5) }, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::Illegal {
                index: 3,
                from: JobStatus::Pending,
                to: JobStatus::Timeout
            }
        );
        assert_eq!(record.status, JobStatus::Pending);
    }

    #[test]
    fn test_abandon_only_touches_unfinished_jobs() {
        let mut pending = JobRecord::pending(0, &spec());
        pending.abandon(Utc::now(), "scheduler stopped");
        assert_eq!(pending.status, JobStatus::Error);

        let mut done = JobRecord::pending(1, &spec());
        done.start(Utc::now(), None).unwrap();
        done.finish(JobOutcome::TimedOut { after: Duration::from_secs(1) }, Utc::now())
            .unwrap();
        done.abandon(Utc::now(), "scheduler stopped");
        assert_eq!(done.status, JobStatus::Timeout);
    }

    #[test]
    fn test_status_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&JobStatus::Timeout).unwrap(), "\"TIMEOUT\"");
    }
}
