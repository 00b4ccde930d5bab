//! Single table-pair comparison.
//!
//! [`TableComparator`] runs the full pipeline for one source/destination
//! pair:
//!
//! 1. read both schemas and diff them
//! 2. count rows on both sides
//! 3. size the samples proportionally and draw them
//! 4. run the statistical tests for every comparable column
//! 5. evaluate thresholds and assemble a [`TableComparisonResult`]
//!
//! The comparator holds no mutable state. Each call opens its own
//! connection to each side and drops it before returning.

pub mod schema_diff;

pub use schema_diff::{ColumnPair, SchemaDiff, diff_schemas};

use crate::Result;
use crate::classify::Classification;
use crate::config::ComparisonConfig;
use crate::error::DriftError;
use crate::models::{
    CheckTally, ColumnComparisonResult, ColumnSchema, ComparisonStatus, RangeComparison, Sample,
    TableComparisonResult, TableRef, TableSample, Verdict,
};
use crate::sources::SourceProvider;
use crate::stats::StatisticalTestRunner;
use crate::thresholds::{ThresholdEvaluator, overall, row_count_delta_pct};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// The two tables of one comparison, plus an optional column filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableMapping {
    pub source: TableRef,
    pub destination: TableRef,
    /// Columns to test; empty means every comparable column
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

impl TableMapping {
    /// Creates a mapping that compares every column.
    pub fn new(source: TableRef, destination: TableRef) -> Self {
        Self {
            source,
            destination,
            columns: Vec::new(),
        }
    }

    /// Restricts testing to the named columns.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Checks that both identifiers are complete.
    ///
    /// # Errors
    /// Returns a configuration error naming the incomplete identifier.
    pub fn validate(&self) -> Result<()> {
        for (side, table) in [("source", &self.source), ("destination", &self.destination)] {
            if !table.is_valid() {
                return Err(DriftError::configuration(format!(
                    "Incomplete {side} table identifier: '{table}'"
                )));
            }
        }
        Ok(())
    }
}

/// Compares one table pair between two data sources.
pub struct TableComparator {
    source: Arc<dyn SourceProvider>,
    destination: Arc<dyn SourceProvider>,
    config: ComparisonConfig,
    runner: StatisticalTestRunner,
    evaluator: ThresholdEvaluator,
}

impl std::fmt::Debug for TableComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableComparator")
            .field("source", &self.source.describe())
            .field("destination", &self.destination.describe())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TableComparator {
    /// Creates a comparator over two providers.
    pub fn new(
        source: Arc<dyn SourceProvider>,
        destination: Arc<dyn SourceProvider>,
        config: ComparisonConfig,
    ) -> Self {
        let runner = StatisticalTestRunner::new(&config);
        let evaluator = ThresholdEvaluator::new(config.thresholds.clone());
        Self {
            source,
            destination,
            config,
            runner,
            evaluator,
        }
    }

    /// Comparison settings in use.
    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    /// Compares one table pair.
    ///
    /// # Errors
    /// Returns an error for conditions that prevent any result: invalid
    /// configuration, an unreachable side, a missing table or an unreadable
    /// schema. Failures inside individual tests are reported in the result
    /// as SKIPPED or ERROR and never surface here.
    pub async fn compare(&self, mapping: &TableMapping) -> Result<TableComparisonResult> {
        self.config.validate()?;
        mapping.validate()?;

        let started_at = Utc::now();
        let timer = Instant::now();
        info!("Comparing {} -> {}", mapping.source, mapping.destination);

        let source = self.source.connect().await?;
        let destination = self.destination.connect().await?;
        debug!(
            "Connected to {} and {}",
            source.source_type(),
            destination.source_type()
        );

        let source_schema = source.table_schema(&mapping.source).await?;
        let destination_schema = destination.table_schema(&mapping.destination).await?;
        let mut diff = diff_schemas(&source_schema, &destination_schema);
        diff.retain_columns(&mapping.columns);
        if !diff.changes.is_empty() {
            info!(
                "{} schema changes between {} and {}",
                diff.changes.len(),
                mapping.source,
                mapping.destination
            );
        }

        let source_rows = source.row_count(&mapping.source).await?;
        let destination_rows = destination.row_count(&mapping.destination).await?;
        let row_count_check = self.evaluator.row_count(source_rows, destination_rows);

        let (source_limit, destination_limit) = self.config.sampling.plan(source_rows, destination_rows);
        debug!(
            "Sampling {} of {} source rows and {} of {} destination rows",
            source_limit, source_rows, destination_limit, destination_rows
        );

        let source_columns: Vec<ColumnSchema> =
            diff.comparable.iter().map(|p| p.source.clone()).collect();
        let destination_columns: Vec<ColumnSchema> =
            diff.comparable.iter().map(|p| p.destination.clone()).collect();
        let source_sample = source
            .sample(&mapping.source, &source_columns, source_limit)
            .await?;
        let destination_sample = destination
            .sample(&mapping.destination, &destination_columns, destination_limit)
            .await?;

        // Connections are not needed past this point.
        drop(source);
        drop(destination);

        let mut checks = CheckTally::default();
        checks.record(row_count_check.verdict);

        let schema_check = if !self.config.fail_on_schema_drift {
            Verdict::Skipped
        } else if diff.has_drift() {
            Verdict::Fail
        } else {
            Verdict::Pass
        };
        checks.record(schema_check);

        let mut columns = Vec::with_capacity(diff.comparable.len());
        for pair in &diff.comparable {
            let left = source_sample.column(&pair.source.name);
            let right = destination_sample.column(&pair.destination.name);
            let column = self.compare_column(pair, &left, &right);
            for test in &column.tests {
                checks.record(test.verdict);
            }
            checks.record(column.null_rate.check.verdict);
            if let Some(range) = &column.range {
                checks.record(range.verdict);
            }
            columns.push(column);
        }

        let status = if checks.failed > 0 {
            ComparisonStatus::Fail
        } else {
            ComparisonStatus::Pass
        };
        let drawn = |sample: &TableSample| {
            sample.columns.values().map(Sample::len).max().unwrap_or(0)
        };

        let result = TableComparisonResult {
            source: mapping.source.clone(),
            destination: mapping.destination.clone(),
            source_row_count: source_rows,
            destination_row_count: destination_rows,
            row_count_delta: signed_delta(source_rows, destination_rows),
            row_count_delta_pct: row_count_delta_pct(source_rows, destination_rows),
            row_count_check,
            schema_diff: diff.changes,
            schema_check,
            source_sample_size: drawn(&source_sample),
            destination_sample_size: drawn(&destination_sample),
            columns,
            checks,
            status,
            started_at,
            finished_at: Utc::now(),
            duration_ms: u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        info!(
            "{} -> {}: {:?} ({} passed, {} failed, {} skipped, {} errored)",
            mapping.source,
            mapping.destination,
            result.status,
            checks.passed,
            checks.failed,
            checks.skipped,
            checks.errored
        );
        Ok(result)
    }

    fn compare_column(&self, pair: &ColumnPair, left: &Sample, right: &Sample) -> ColumnComparisonResult {
        let tests: Vec<_> = self
            .runner
            .run(pair.classification, left, right)
            .iter()
            .map(|run| self.evaluator.evaluate_test(run))
            .collect();
        for test in tests.iter().filter(|t| t.verdict == Verdict::Error) {
            debug!(
                "{} on {} errored: {}",
                test.kind,
                pair.source.name,
                test.detail.as_deref().unwrap_or("unknown")
            );
        }

        let null_rate = self
            .evaluator
            .null_rate(left.null_rate_pct(), right.null_rate_pct());
        let range = (pair.classification == Classification::Temporal)
            .then(|| range_check(left, right, self.config.temporal.range_tolerance_secs));

        let source_distinct = left.distinct_count();
        let destination_distinct = right.distinct_count();
        let verdict = overall(
            tests
                .iter()
                .map(|t| t.verdict)
                .chain(std::iter::once(null_rate.check.verdict))
                .chain(range.iter().map(|r| r.verdict)),
        );

        ColumnComparisonResult {
            name: pair.source.name.clone(),
            classification: pair.classification,
            tests,
            null_rate,
            source_distinct,
            destination_distinct,
            distinct_count_delta: signed_delta(source_distinct as u64, destination_distinct as u64),
            range,
            verdict,
        }
    }
}

/// destination minus source, saturating at the i64 bounds.
fn signed_delta(source: u64, destination: u64) -> i64 {
    if destination >= source {
        i64::try_from(destination.abs_diff(source)).unwrap_or(i64::MAX)
    } else {
        i64::try_from(source.abs_diff(destination)).map_or(i64::MIN, i64::saturating_neg)
    }
}

/// Compares the min and max timestamps of two samples.
///
/// PASS when both endpoints moved by at most `tolerance_secs`. A side with
/// no parseable timestamps leaves the check SKIPPED.
pub fn range_check(source: &Sample, destination: &Sample, tolerance_secs: i64) -> RangeComparison {
    let bounds = |sample: &Sample| {
        let timestamps = sample.timestamps();
        (
            timestamps.iter().min().copied(),
            timestamps.iter().max().copied(),
        )
    };
    let (source_min, source_max) = bounds(source);
    let (destination_min, destination_max) = bounds(destination);

    let max_shift_secs = match (source_min, source_max, destination_min, destination_max) {
        (Some(smin), Some(smax), Some(dmin), Some(dmax)) => Some(
            dmin.signed_duration_since(smin)
                .num_seconds()
                .saturating_abs()
                .max(dmax.signed_duration_since(smax).num_seconds().saturating_abs()),
        ),
        _ => None,
    };
    let verdict = match max_shift_secs {
        Some(shift) if shift <= tolerance_secs => Verdict::Pass,
        Some(_) => Verdict::Fail,
        None => Verdict::Skipped,
    };

    RangeComparison {
        source_min,
        source_max,
        destination_min,
        destination_max,
        max_shift_secs,
        verdict,
        tolerance_secs,
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
    use crate::models::{SchemaChange, TestKind, Value, parse_timestamp};
    use crate::sources::{MemoryCatalog, MemoryProvider, MemoryTable};
    use serde_json::json;

    fn table(schema: &str, name: &str) -> TableRef {
        TableRef::new(schema, name)
    }

    fn comparator(source: MemoryCatalog, destination: MemoryCatalog) -> TableComparator {
        TableComparator::new(
            Arc::new(MemoryProvider::new(source)),
            Arc::new(MemoryProvider::new(destination)),
            ComparisonConfig::default(),
        )
    }

    fn orders(schema: &str, rows: i64) -> MemoryTable {
        MemoryTable::new(table(schema, "ORDERS"))
            .with_column("ID", "INTEGER", (0..rows).map(|i| json!(i)))
            .with_column(
                "STATUS",
                "VARCHAR(10)",
                (0..rows).map(|i| json!(if i % 3 == 0 { "open" } else { "closed" })),
            )
    }

    #[tokio::test]
    async fn test_identical_tables_pass() {
        let catalog = MemoryCatalog::new().with_table(orders("SRC", 200));
        let dest = MemoryCatalog::new().with_table(orders("DST", 200));
        let mapping = TableMapping::new(table("SRC", "ORDERS"), table("DST", "ORDERS"));

        let result = comparator(catalog, dest).compare(&mapping).await.unwrap();
        assert_eq!(result.status, ComparisonStatus::Pass);
        assert_eq!(result.row_count_delta, 0);
        assert_eq!(result.schema_check, Verdict::Pass);
        assert_eq!(result.columns.len(), 2);
        let status = &result.columns[1];
        let psi = status.tests.iter().find(|t| t.kind == TestKind::Psi).unwrap();
        assert_eq!(psi.value, Some(0.0));
        assert_eq!(result.source_sample_size, 200);
    }

    #[tokio::test]
    async fn test_row_count_drift_fails() {
        let catalog = MemoryCatalog::new().with_table(orders("SRC", 100).with_row_count(100_000));
        let dest = MemoryCatalog::new().with_table(orders("DST", 100).with_row_count(100_200));
        let mapping = TableMapping::new(table("SRC", "ORDERS"), table("DST", "ORDERS"));

        let result = comparator(catalog, dest).compare(&mapping).await.unwrap();
        assert_eq!(result.row_count_delta, 200);
        assert_eq!(result.row_count_check.verdict, Verdict::Fail);
        assert_eq!(result.status, ComparisonStatus::Fail);
    }

    #[tokio::test]
    async fn test_one_sided_column_is_not_tested() {
        let source = orders("SRC", 50).with_column("LEGACY", "INTEGER", (0..50).map(|i| json!(i)));
        let comparator = comparator(
            MemoryCatalog::new().with_table(source),
            MemoryCatalog::new().with_table(orders("DST", 50)),
        );
        let mapping = TableMapping::new(table("SRC", "ORDERS"), table("DST", "ORDERS"));

        let result = comparator.compare(&mapping).await.unwrap();
        assert!(result.schema_diff.iter().any(|c| matches!(
            c,
            SchemaChange::Removed { column, .. } if column == "LEGACY"
        )));
        assert!(result.columns.iter().all(|c| c.name != "LEGACY"));
        assert_eq!(result.schema_check, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_schema_drift_tolerated_when_disabled() {
        let source = orders("SRC", 50).with_column("LEGACY", "INTEGER", (0..50).map(|i| json!(i)));
        let comparator = TableComparator::new(
            Arc::new(MemoryProvider::new(MemoryCatalog::new().with_table(source))),
            Arc::new(MemoryProvider::new(MemoryCatalog::new().with_table(orders("DST", 50)))),
            ComparisonConfig::default().with_fail_on_schema_drift(false),
        );
        let mapping = TableMapping::new(table("SRC", "ORDERS"), table("DST", "ORDERS"));

        let result = comparator.compare(&mapping).await.unwrap();
        assert_eq!(result.schema_check, Verdict::Skipped);
        assert_eq!(result.status, ComparisonStatus::Pass);
    }

    #[tokio::test]
    async fn test_missing_table_is_an_error() {
        let comparator = comparator(
            MemoryCatalog::new().with_table(orders("SRC", 10)),
            MemoryCatalog::new(),
        );
        let mapping = TableMapping::new(table("SRC", "ORDERS"), table("DST", "ORDERS"));
        let err = comparator.compare(&mapping).await.unwrap_err();
        assert!(matches!(err, DriftError::TableNotFound { ref table } if table == "DST.ORDERS"));
    }

    #[tokio::test]
    async fn test_column_filter_limits_tests() {
        let comparator = comparator(
            MemoryCatalog::new().with_table(orders("SRC", 30)),
            MemoryCatalog::new().with_table(orders("DST", 30)),
        );
        let mapping =
            TableMapping::new(table("SRC", "ORDERS"), table("DST", "ORDERS")).with_columns(["status"]);
        let result = comparator.compare(&mapping).await.unwrap();
        assert_eq!(result.columns.len(), 1);
        assert_eq!(result.columns[0].name, "STATUS");
    }

    #[tokio::test]
    async fn test_incomplete_mapping_rejected() {
        let comparator = comparator(MemoryCatalog::new(), MemoryCatalog::new());
        let mapping = TableMapping::new(table("", "ORDERS"), table("DST", "ORDERS"));
        let err = comparator.compare(&mapping).await.unwrap_err();
        assert!(matches!(err, DriftError::Configuration { .. }));
    }

    #[test]
    fn test_range_check() {
        let ts = |s: &str| Value::Timestamp(parse_timestamp(s).unwrap());
        let source = Sample::new(vec![ts("2024-01-01"), ts("2024-03-01"), Value::Null]);
        let shifted = Sample::new(vec![ts("2024-01-01 12:00:00"), ts("2024-03-01")]);
        let far = Sample::new(vec![ts("2024-01-01"), ts("2024-03-05")]);

        let near = range_check(&source, &shifted, 86_400);
        assert_eq!(near.verdict, Verdict::Pass);
        assert_eq!(near.max_shift_secs, Some(43_200));

        assert_eq!(range_check(&source, &far, 86_400).verdict, Verdict::Fail);
        assert_eq!(
            range_check(&source, &Sample::default(), 86_400).verdict,
            Verdict::Skipped
        );
    }

    #[test]
    fn test_signed_delta() {
        assert_eq!(signed_delta(100, 150), 50);
        assert_eq!(signed_delta(150, 100), -50);
        assert_eq!(signed_delta(0, 0), 0);
        assert_eq!(signed_delta(0, u64::MAX), i64::MAX);
        assert_eq!(signed_delta(u64::MAX, 0), i64::MIN);
    }
}
