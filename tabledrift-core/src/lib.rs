//! Core engine for tabledrift.
//!
//! This crate compares two representations of the same logical table (a
//! source system table and its replicated or transformed counterpart) and
//! decides whether they are still statistically consistent. Tables are
//! sampled rather than compared row by row, so every verdict is a
//! statistical approximation.
//!
//! # Guarantees
//! - All data source operations are read-only
//! - No credentials are stored or logged
//! - A failing job never aborts a bulk run
//! - Test results are deterministic for a given pair of samples
//!
//! # Architecture
//! - [`classify`] maps declared column types to a closed set of classes
//! - [`stats`] computes KS, t-test, chi-square and PSI statistics
//! - [`thresholds`] turns metrics into PASS/FAIL verdicts with margins
//! - [`compare`] runs one table-pair comparison end to end
//! - [`bulk`] schedules many comparisons and aggregates their outcomes
//! - [`profile`] summarizes the columns of a single table
//! - [`sources`] is the data source boundary (SQLite and in-memory)

pub mod bulk;
pub mod classify;
pub mod compare;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod profile;
pub mod sources;
pub mod stats;
pub mod thresholds;

// Re-export commonly used types
pub use bulk::{
    BulkScheduler, JobRecord, JobSpec, JobStatus, ResultAggregator, RunFilter, RunSummary,
    read_job_list, retry_jobs, write_job_list,
};
pub use classify::{Classification, classify};
pub use compare::{TableComparator, TableMapping};
pub use config::{
    ComparisonConfig, ProfileConfig, SamplingConfig, SchedulerConfig, ThresholdConfig,
};
pub use error::{DriftError, ErrorCategory, Result};
pub use logging::init_logging;
pub use models::{
    ColumnComparisonResult, ColumnSchema, ComparisonStatus, TableComparisonResult, TableRef,
    TestKind, TestResult, Verdict,
};
pub use profile::{ColumnProfile, ProfilingSummary, TableProfile, TableProfiler};
pub use sources::{DataSource, SourceProvider, create_provider};
pub use stats::StatisticalTestRunner;
pub use thresholds::ThresholdEvaluator;
