//! Bulk scheduler integration tests.
//!
//! This test suite covers:
//! - Partial-failure isolation across a batch
//! - Per-job timeouts with forced cancellation
//! - Connection release on every exit path
//! - Sequential and parallel execution
//! - Retry job lists built from a finished run

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::arithmetic_side_effects
)]

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tabledrift_core::{
    BulkScheduler, ComparisonConfig, ErrorCategory, JobSpec, JobStatus, RunFilter,
    SchedulerConfig, TableRef,
    bulk::{needs_retry, retry_filter, retry_jobs},
    sources::{MemoryCatalog, MemoryProvider, MemoryTable},
};

const TABLES: usize = 6;

fn catalog(schema: &str) -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    for i in 0..TABLES {
        catalog.insert(
            MemoryTable::new(TableRef::new(schema, format!("T{i}")))
                .with_column("ID", "BIGINT", (0..40).map(|v| json!(v)))
                .with_column(
                    "KIND",
                    "VARCHAR(4)",
                    (0..40).map(|v| json!(if v % 2 == 0 { "A" } else { "B" })),
                ),
        );
    }
    catalog
}

fn jobs(n: usize) -> Vec<JobSpec> {
    (0..n)
        .map(|i| {
            JobSpec::new(
                TableRef::new("SRC", format!("T{i}")),
                TableRef::new("DST", format!("T{i}")),
            )
        })
        .collect()
}

fn scheduler(
    source: &MemoryProvider,
    destination: &MemoryProvider,
    config: SchedulerConfig,
) -> BulkScheduler {
    BulkScheduler::new(
        Arc::new(source.clone()),
        Arc::new(destination.clone()),
        ComparisonConfig::default(),
        config,
    )
}

#[tokio::test]
async fn test_connectivity_error_is_isolated() {
    let source = MemoryProvider::new(catalog("SRC"))
        .with_unreachable_table(TableRef::new("SRC", "T2"));
    let destination = MemoryProvider::new(catalog("DST"));

    let summary = scheduler(&source, &destination, SchedulerConfig::default())
        .run(jobs(5), RunFilter::default())
        .await
        .unwrap();

    assert_eq!(summary.total, 5);
    assert_eq!(summary.passed, 4);
    assert_eq!(summary.errored, 1);
    assert_eq!(summary.records.len(), 5);
    for (index, record) in summary.records.iter().enumerate() {
        assert_eq!(record.index, index);
        if index == 2 {
            assert_eq!(record.status, JobStatus::Error);
            assert_eq!(record.error_category, Some(ErrorCategory::Connectivity));
            assert!(record.result.is_none());
        } else {
            assert_eq!(record.status, JobStatus::Pass);
            assert_eq!(record.exit_code, Some(0));
            assert!(record.result.is_some());
        }
    }
    assert!(!summary.is_success());
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(source.open_connections(), 0);
    assert_eq!(destination.open_connections(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_cancels_only_the_slow_job() {
    let source = MemoryProvider::new(catalog("SRC"));
    let destination = MemoryProvider::new(catalog("DST"))
        .with_table_delay(TableRef::new("DST", "T1"), Duration::from_secs(7200));
    let config = SchedulerConfig::default()
        .with_concurrency(2)
        .with_job_timeout(Duration::from_secs(60));

    let summary = scheduler(&source, &destination, config)
        .run(jobs(4), RunFilter::default())
        .await
        .unwrap();

    let statuses: Vec<_> = summary.records.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![JobStatus::Pass, JobStatus::Timeout, JobStatus::Pass, JobStatus::Pass]
    );
    assert_eq!(summary.passed, 3);
    assert_eq!(summary.timed_out, 1);
    assert_eq!(summary.errored, 1);
    assert_eq!(summary.records[1].exit_code, Some(-1));
    assert!(summary.records[1].error.as_deref().unwrap().contains("60s"));

    // The cancelled job gave its connections back.
    assert_eq!(source.open_connections(), 0);
    assert_eq!(destination.open_connections(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_parallel_jobs_overlap() {
    let mut source = MemoryProvider::new(catalog("SRC"));
    for i in 0..TABLES {
        source = source.with_table_delay(TableRef::new("SRC", format!("T{i}")), Duration::from_secs(10));
    }
    let destination = MemoryProvider::new(catalog("DST"));
    let config = SchedulerConfig::default().with_concurrency(3);

    let started = tokio::time::Instant::now();
    let summary = scheduler(&source, &destination, config)
        .run(jobs(TABLES), RunFilter::default())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.passed, TABLES);
    // Three delayed lookups per job, two waves of three jobs.
    assert!(elapsed >= Duration::from_secs(60), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(180), "{elapsed:?}");
    assert_eq!(source.total_connections(), TABLES);
}

#[tokio::test]
async fn test_sequential_jobs_run_in_submission_order() {
    let source = MemoryProvider::new(catalog("SRC"));
    let destination = MemoryProvider::new(catalog("DST"));

    let summary = scheduler(&source, &destination, SchedulerConfig::default())
        .run(jobs(TABLES), RunFilter::default())
        .await
        .unwrap();

    for pair in summary.records.windows(2) {
        let previous_end = pair[0].finished_at.unwrap();
        let next_start = pair[1].started_at.unwrap();
        assert!(next_start >= previous_end);
    }
}

#[tokio::test]
async fn test_every_job_reported_when_all_fail() {
    let source = MemoryProvider::new(catalog("SRC")).unreachable();
    let destination = MemoryProvider::new(catalog("DST"));

    let summary = scheduler(&source, &destination, SchedulerConfig::default().with_concurrency(4))
        .run(jobs(TABLES), RunFilter::default())
        .await
        .unwrap();

    assert_eq!(summary.total, TABLES);
    assert_eq!(summary.errored, TABLES);
    assert!(summary.records.iter().all(|r| r.status == JobStatus::Error));
    assert_eq!(destination.open_connections(), 0);
}

#[tokio::test]
async fn test_retry_reruns_only_failures() {
    let flaky = MemoryProvider::new(catalog("SRC"))
        .with_unreachable_table(TableRef::new("SRC", "T1"))
        .with_unreachable_table(TableRef::new("SRC", "T3"));
    let destination = MemoryProvider::new(catalog("DST"));
    let filter = RunFilter {
        filter_date: Some("2024-06-30".into()),
        ..RunFilter::default()
    };

    let first = scheduler(&flaky, &destination, SchedulerConfig::default())
        .run(jobs(5), filter)
        .await
        .unwrap();
    assert_eq!(first.errored, 2);

    let retry = retry_jobs(&first, needs_retry);
    assert_eq!(retry.len(), 2);

    let healthy = MemoryProvider::new(catalog("SRC"));
    let second = scheduler(&healthy, &destination, SchedulerConfig::default())
        .run(retry, retry_filter(&first))
        .await
        .unwrap();
    assert!(second.is_success());
    assert_eq!(second.filter.retry_of, Some(first.run_id));
    let tables: Vec<_> = second.records.iter().map(|r| r.source.table.as_str()).collect();
    assert_eq!(tables, vec!["T1", "T3"]);
}
