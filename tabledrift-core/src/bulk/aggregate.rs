//! Derived views over finished runs.
//!
//! [`ResultAggregator`] never mutates a summary; every view is computed
//! from the job records on demand.

use super::job::{JobRecord, JobStatus};
use super::summary::RunSummary;
use crate::models::TableRef;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Ordering key for ranked row-count differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    Absolute,
    Percentage,
}

/// Row-count difference of one completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowCountDifference {
    pub index: usize,
    pub source: TableRef,
    pub destination: TableRef,
    pub source_rows: u64,
    pub destination_rows: u64,
    /// destination minus source
    pub delta: i64,
    pub delta_pct: f64,
    pub status: JobStatus,
}

impl RowCountDifference {
    fn from_record(record: &JobRecord) -> Option<Self> {
        let result = record.result.as_ref()?;
        Some(Self {
            index: record.index,
            source: record.source.clone(),
            destination: record.destination.clone(),
            source_rows: result.source_row_count,
            destination_rows: result.destination_row_count,
            delta: result.row_count_delta,
            delta_pct: result.row_count_delta_pct,
            status: record.status,
        })
    }

    /// Absolute row difference.
    pub fn abs_delta(&self) -> u64 {
        self.delta.unsigned_abs()
    }
}

/// Job counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// ERROR and TIMEOUT jobs
    pub errored: usize,
    pub timed_out: usize,
    pub total_duration_ms: u64,
}

/// Aggregated report over one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub totals: Totals,
    /// Jobs with a completed comparison
    pub compared_tables: usize,
    pub perfect_matches: usize,
    pub with_differences: usize,
    pub destination_has_more: usize,
    pub source_has_more: usize,
    pub total_source_rows: u64,
    pub total_destination_rows: u64,
    pub total_abs_difference: u64,
    /// `(1 - total_abs_difference / total_source_rows) * 100`; None without
    /// source rows
    pub match_rate_pct: Option<f64>,
    pub top_by_absolute: Vec<RowCountDifference>,
    pub top_by_percentage: Vec<RowCountDifference>,
}

/// Stateless folds over job records.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    /// Job counts by terminal status plus summed job durations.
    pub fn totals(records: &[JobRecord]) -> Totals {
        let mut totals = Totals {
            total: records.len(),
            ..Totals::default()
        };
        for record in records {
            match record.status {
                JobStatus::Pass => totals.passed = totals.passed.saturating_add(1),
                JobStatus::Fail => totals.failed = totals.failed.saturating_add(1),
                JobStatus::Error => totals.errored = totals.errored.saturating_add(1),
                JobStatus::Timeout => {
                    totals.errored = totals.errored.saturating_add(1);
                    totals.timed_out = totals.timed_out.saturating_add(1);
                }
                JobStatus::Pending | JobStatus::Running => {}
            }
            totals.total_duration_ms = totals
                .total_duration_ms
                .saturating_add(record.duration_ms.unwrap_or(0));
        }
        totals
    }

    /// Completed jobs ordered by descending difference.
    ///
    /// Ties keep submission order.
    pub fn ranked(records: &[JobRecord], by: RankBy) -> Vec<RowCountDifference> {
        let mut differences: Vec<_> = records
            .iter()
            .filter_map(RowCountDifference::from_record)
            .collect();
        differences.sort_by(|a, b| match by {
            RankBy::Absolute => b.abs_delta().cmp(&a.abs_delta()),
            RankBy::Percentage => b
                .delta_pct
                .partial_cmp(&a.delta_pct)
                .unwrap_or(Ordering::Equal),
        });
        differences
    }

    /// The `n` largest differences.
    pub fn top_differences(records: &[JobRecord], n: usize, by: RankBy) -> Vec<RowCountDifference> {
        let mut ranked = Self::ranked(records, by);
        ranked.retain(|d| d.delta != 0);
        ranked.truncate(n);
        ranked
    }

    /// Completed jobs whose row counts match exactly, in submission order.
    pub fn perfect_matches(records: &[JobRecord]) -> Vec<RowCountDifference> {
        records
            .iter()
            .filter_map(RowCountDifference::from_record)
            .filter(|d| d.delta == 0)
            .collect()
    }

    /// Full report with `top_n` entries per ranking.
    #[allow(clippy::cast_precision_loss)]
    pub fn report(summary: &RunSummary, top_n: usize) -> SummaryReport {
        let records = &summary.records;
        let differences: Vec<_> = records
            .iter()
            .filter_map(RowCountDifference::from_record)
            .collect();

        let total_source_rows: u64 = differences.iter().map(|d| d.source_rows).sum();
        let total_destination_rows: u64 = differences.iter().map(|d| d.destination_rows).sum();
        let total_abs_difference: u64 = differences.iter().map(RowCountDifference::abs_delta).sum();
        let match_rate_pct = (total_source_rows > 0).then(|| {
            (1.0 - total_abs_difference as f64 / total_source_rows as f64) * 100.0
        });

        let mut totals = Self::totals(records);
        totals.total_duration_ms = summary.total_duration_ms;

        SummaryReport {
            totals,
            compared_tables: differences.len(),
            perfect_matches: differences.iter().filter(|d| d.delta == 0).count(),
            with_differences: differences.iter().filter(|d| d.delta != 0).count(),
            destination_has_more: differences.iter().filter(|d| d.delta > 0).count(),
            source_has_more: differences.iter().filter(|d| d.delta < 0).count(),
            total_source_rows,
            total_destination_rows,
            total_abs_difference,
            match_rate_pct,
            top_by_absolute: Self::top_differences(records, top_n, RankBy::Absolute),
            top_by_percentage: Self::top_differences(records, top_n, RankBy::Percentage),
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
    use crate::bulk::job::{JobOutcome, JobSpec};
    use crate::bulk::summary::{RunFilter, RunSummaryBuilder};
    use crate::error::ErrorCategory;
    use crate::models::{
        CheckResult, CheckTally, ComparisonStatus, TableComparisonResult, Verdict,
    };
    use crate::thresholds::row_count_delta_pct;
    use chrono::Utc;

    fn completed(source_rows: u64, destination_rows: u64) -> JobOutcome {
        let now = Utc::now();
        let delta = i64::try_from(destination_rows).unwrap() - i64::try_from(source_rows).unwrap();
        JobOutcome::Completed(Box::new(TableComparisonResult {
            source: TableRef::new("s", "t"),
            destination: TableRef::new("d", "t"),
            source_row_count: source_rows,
            destination_row_count: destination_rows,
            row_count_delta: delta,
            row_count_delta_pct: row_count_delta_pct(source_rows, destination_rows),
            row_count_check: CheckResult {
                verdict: Verdict::Pass,
                actual: 0.0,
                threshold: 0.1,
                margin: 0.1,
            },
            schema_diff: Vec::new(),
            schema_check: Verdict::Pass,
            source_sample_size: 0,
            destination_sample_size: 0,
            columns: Vec::new(),
            checks: CheckTally::default(),
            status: if delta == 0 {
                ComparisonStatus::Pass
            } else {
                ComparisonStatus::Fail
            },
            started_at: now,
            finished_at: now,
            duration_ms: 0,
        }))
    }

    fn summary() -> RunSummary {
        let outcomes = vec![
            completed(1000, 1000),
            completed(1000, 1100),
            completed(10, 5),
            JobOutcome::Failed {
                message: "unreachable".into(),
                category: ErrorCategory::Connectivity,
            },
            completed(500, 500),
        ];
        let jobs: Vec<_> = (0..outcomes.len())
            .map(|i| {
                JobSpec::new(
                    TableRef::new("s", format!("t{i}")),
                    TableRef::new("d", format!("t{i}")),
                )
            })
            .collect();
        let now = Utc::now();
        let mut builder = RunSummaryBuilder::new(RunFilter::default(), &jobs, now);
        for (index, outcome) in outcomes.into_iter().enumerate() {
            builder.started(index, now, None).unwrap();
            builder.finished(index, outcome, now).unwrap();
        }
        builder.finish(now)
    }

    #[test]
    fn test_totals() {
        let totals = ResultAggregator::totals(&summary().records);
        assert_eq!(totals.total, 5);
        assert_eq!(totals.passed, 2);
        assert_eq!(totals.failed, 2);
        assert_eq!(totals.errored, 1);
    }

    #[test]
    fn test_ranking() {
        let summary = summary();
        let by_abs: Vec<_> = ResultAggregator::ranked(&summary.records, RankBy::Absolute)
            .iter()
            .map(|d| d.index)
            .collect();
        assert_eq!(by_abs, vec![1, 2, 0, 4]);

        let by_pct: Vec<_> = ResultAggregator::ranked(&summary.records, RankBy::Percentage)
            .iter()
            .map(|d| d.index)
            .collect();
        assert_eq!(by_pct, vec![2, 1, 0, 4]);
    }

    #[test]
    fn test_perfect_matches_and_top_n() {
        let summary = summary();
        let perfect: Vec<_> = ResultAggregator::perfect_matches(&summary.records)
            .iter()
            .map(|d| d.index)
            .collect();
        assert_eq!(perfect, vec![0, 4]);

        let top = ResultAggregator::top_differences(&summary.records, 1, RankBy::Absolute);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].delta, 100);
    }

    #[test]
    fn test_report() {
        let summary = summary();
        let before = summary.clone();
        let report = ResultAggregator::report(&summary, 10);

        assert_eq!(summary, before);
        assert_eq!(report.compared_tables, 4);
        assert_eq!(report.perfect_matches, 2);
        assert_eq!(report.with_differences, 2);
        assert_eq!(report.destination_has_more, 1);
        assert_eq!(report.source_has_more, 1);
        assert_eq!(report.total_source_rows, 2510);
        assert_eq!(report.total_abs_difference, 105);
        let rate = report.match_rate_pct.unwrap();
        assert!((rate - (1.0 - 105.0 / 2510.0) * 100.0).abs() < 1e-9);
        assert_eq!(report.top_by_absolute.len(), 2);
    }

    #[test]
    fn test_report_without_completed_jobs() {
        let summary = RunSummaryBuilder::new(RunFilter::default(), &[], Utc::now()).finish(Utc::now());
        let report = ResultAggregator::report(&summary, 5);
        assert_eq!(report.match_rate_pct, None);
        assert!(report.top_by_absolute.is_empty());
    }
}
