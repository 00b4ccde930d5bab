//! Single-table profiling.
//!
//! [`TableProfiler`] samples one table on one side and summarizes every
//! column: null and distinct counts, the most frequent values, and metrics
//! specific to the column class. Binary and nested columns are listed as
//! excluded rather than profiled.
//!
//! [`TableProfiler::profile_tables`] profiles a list of tables one after the
//! other. A table that fails is recorded in the [`ProfilingSummary`] and the
//! rest still run.

pub mod metrics;

pub use metrics::{
    BasicStats, BooleanStats, CategoricalStats, ColumnProfile, DateGap, NumericStats,
    TemporalStats, ValueFrequency, WeekdayCount, profile_column,
};

use crate::Result;
use crate::config::ProfileConfig;
use crate::error::DriftError;
use crate::models::{ColumnSchema, Sample, TableRef};
use crate::sources::SourceProvider;
use chrono::{DateTime, Utc};
use metrics::is_boolean_type;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Cell-level completeness of a profiled sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetrics {
    pub total_cells: usize,
    pub null_cells: usize,
    pub null_pct: f64,
    pub completeness_pct: f64,
    /// Columns whose sampled values are all distinct and non-null
    pub unique_column_count: usize,
}

impl TableMetrics {
    /// Aggregates column profiles over a sample of `sample_size` rows.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_columns(sample_size: usize, columns: &[ColumnProfile]) -> Self {
        let total_cells = sample_size.saturating_mul(columns.len());
        let null_cells = columns
            .iter()
            .fold(0_usize, |sum, c| sum.saturating_add(c.basic.null_count));
        let null_pct = if total_cells == 0 {
            0.0
        } else {
            null_cells as f64 / total_cells as f64 * 100.0
        };
        Self {
            total_cells,
            null_cells,
            null_pct,
            completeness_pct: 100.0 - null_pct,
            unique_column_count: columns.iter().filter(|c| c.basic.is_unique).count(),
        }
    }
}

/// Profile of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableProfile {
    pub table: TableRef,
    pub source_type: String,
    pub profiled_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// `None` when the row count query failed
    pub row_count: Option<u64>,
    pub column_count: usize,
    /// Rows actually drawn
    pub sample_size: usize,
    pub metrics: TableMetrics,
    pub columns: Vec<ColumnProfile>,
    /// Columns skipped because their type cannot be summarized
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_columns: Vec<String>,
}

impl TableProfile {
    /// Profile of a column by exact name.
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Serializes the profile as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns a serialization error if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DriftError::serialization("Failed to serialize table profile", e))
    }
}

/// Outcome of profiling one table in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProfileStatus {
    Success,
    Error,
}

/// One table's entry in a [`ProfilingSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileOutcome {
    pub table: TableRef,
    pub status: ProfileStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completeness_pct: Option<f64>,
    /// Where the profile JSON was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of profiling a list of tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilingSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_duration_ms: u64,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Mean completeness over successful profiles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_completeness_pct: Option<f64>,
    /// One entry per table, in input order
    pub results: Vec<ProfileOutcome>,
}

impl ProfilingSummary {
    /// True iff every table was profiled.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Process exit code: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_success())
    }

    /// Serializes the summary as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns a serialization error if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DriftError::serialization("Failed to serialize profiling summary", e))
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_results(started_at: DateTime<Utc>, results: Vec<ProfileOutcome>) -> Self {
        let finished_at = Utc::now();
        let completeness: Vec<f64> = results.iter().filter_map(|r| r.completeness_pct).collect();
        let successful = results
            .iter()
            .filter(|r| r.status == ProfileStatus::Success)
            .count();
        Self {
            started_at,
            finished_at,
            total_duration_ms: u64::try_from(
                finished_at.signed_duration_since(started_at).num_milliseconds(),
            )
            .unwrap_or(0),
            total: results.len(),
            successful,
            failed: results.len().saturating_sub(successful),
            average_completeness_pct: (!completeness.is_empty())
                .then(|| completeness.iter().sum::<f64>() / completeness.len() as f64),
            results,
        }
    }
}

/// Profiles tables on one data source.
pub struct TableProfiler {
    provider: Arc<dyn SourceProvider>,
    config: ProfileConfig,
}

impl std::fmt::Debug for TableProfiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableProfiler")
            .field("provider", &self.provider.describe())
            .field("config", &self.config)
            .finish()
    }
}

impl TableProfiler {
    /// Creates a profiler over one provider.
    pub fn new(provider: Arc<dyn SourceProvider>, config: ProfileConfig) -> Self {
        Self { provider, config }
    }

    /// Profiling settings in use.
    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    /// Profiles one table.
    ///
    /// A failed row count is logged and leaves `row_count` empty; sampling
    /// then asks for the configured sample size.
    ///
    /// # Errors
    /// Returns an error for invalid settings, an unreachable source, a
    /// missing table, a table with no profilable columns, or a failed
    /// sampling query.
    pub async fn profile(&self, table: &TableRef) -> Result<TableProfile> {
        self.config.validate()?;
        if !table.is_valid() {
            return Err(DriftError::configuration(format!(
                "Incomplete table identifier: '{table}'"
            )));
        }

        let profiled_at = Utc::now();
        let timer = Instant::now();
        info!("Profiling {}", table);

        let source = self.provider.connect().await?;
        let schema = source.table_schema(table).await?;
        let row_count = match source.row_count(table).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!("Could not count rows of {}: {}", table, e);
                None
            }
        };

        let (profiled, excluded): (Vec<ColumnSchema>, Vec<ColumnSchema>) = schema
            .columns
            .iter()
            .cloned()
            .partition(is_profilable);
        if !excluded.is_empty() {
            info!(
                "Excluding {} columns of {} from profiling",
                excluded.len(),
                table
            );
        }
        if profiled.is_empty() {
            return Err(DriftError::configuration(format!(
                "Table {table} has no profilable columns"
            )));
        }

        let limit = row_count.map_or(self.config.sample_size, |rows| {
            usize::try_from(rows).map_or(self.config.sample_size, |rows| {
                rows.min(self.config.sample_size)
            })
        });
        debug!("Sampling {} rows of {}", limit, table);
        let sample = source.sample(table, &profiled, limit).await?;
        let source_type = source.source_type().to_string();
        drop(source);

        let now = profiled_at.naive_utc();
        let columns: Vec<ColumnProfile> = profiled
            .iter()
            .map(|column| profile_column(column, &sample.column(&column.name), &self.config, now))
            .collect();
        let sample_size = sample.columns.values().map(Sample::len).max().unwrap_or(0);
        let metrics = TableMetrics::from_columns(sample_size, &columns);

        info!(
            "Profiled {} columns of {} ({:.1}% complete)",
            columns.len(),
            table,
            metrics.completeness_pct
        );
        Ok(TableProfile {
            table: table.clone(),
            source_type,
            profiled_at,
            duration_ms: u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX),
            row_count,
            column_count: schema.columns.len(),
            sample_size,
            metrics,
            columns,
            excluded_columns: excluded.into_iter().map(|c| c.name).collect(),
        })
    }

    /// Profiles each table in turn.
    ///
    /// With `output_dir` set, each profile is written there as
    /// `NNNN_schema.table.json`. A table that fails to profile or to write
    /// is recorded as an error and does not stop the batch.
    ///
    /// # Errors
    /// Returns an error only when `output_dir` cannot be created.
    pub async fn profile_tables(
        &self,
        tables: &[TableRef],
        output_dir: Option<&Path>,
    ) -> Result<ProfilingSummary> {
        if let Some(dir) = output_dir {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                DriftError::io(format!("Failed to create profile directory {}", dir.display()), e)
            })?;
        }

        let started_at = Utc::now();
        let mut results = Vec::with_capacity(tables.len());
        for (index, table) in tables.iter().enumerate() {
            let timer = Instant::now();
            let outcome = match self.profile(table).await {
                Ok(profile) => {
                    let written = match output_dir {
                        Some(dir) => write_profile(dir, index, &profile).await.map(Some),
                        None => Ok(None),
                    };
                    match written {
                        Ok(report_file) => ProfileOutcome {
                            table: table.clone(),
                            status: ProfileStatus::Success,
                            duration_ms: 0,
                            row_count: profile.row_count,
                            column_count: Some(profile.column_count),
                            completeness_pct: Some(profile.metrics.completeness_pct),
                            report_file,
                            error: None,
                        },
                        Err(e) => failed_outcome(table, &e),
                    }
                }
                Err(e) => failed_outcome(table, &e),
            };
            results.push(ProfileOutcome {
                duration_ms: u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX),
                ..outcome
            });
        }

        let summary = ProfilingSummary::from_results(started_at, results);
        info!(
            "Profiled {} tables: {} succeeded, {} failed",
            summary.total, summary.successful, summary.failed
        );
        Ok(summary)
    }
}

fn is_profilable(column: &ColumnSchema) -> bool {
    column.classification().is_comparable() || is_boolean_type(&column.data_type)
}

fn failed_outcome(table: &TableRef, e: &DriftError) -> ProfileOutcome {
    error!("Profiling {} failed: {}", table, e);
    ProfileOutcome {
        table: table.clone(),
        status: ProfileStatus::Error,
        duration_ms: 0,
        row_count: None,
        column_count: None,
        completeness_pct: None,
        report_file: None,
        error: Some(e.to_string()),
    }
}

async fn write_profile(dir: &Path, index: usize, profile: &TableProfile) -> Result<PathBuf> {
    let path = dir.join(format!("{index:04}_{}.json", profile.table));
    let json = profile.to_json()?;
    tokio::fs::write(&path, json)
        .await
        .map_err(|e| DriftError::io(format!("Failed to write profile {}", path.display()), e))?;
    Ok(path)
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
    use crate::models::Value;
    use crate::sources::{MemoryCatalog, MemoryProvider, MemoryTable};
    use serde_json::json;

    fn customers() -> MemoryTable {
        MemoryTable::new(TableRef::new("CRM", "CUSTOMERS"))
            .with_column("ID", "INTEGER", (1..=6).map(|i| json!(i)))
            .with_column(
                "REGION",
                "NVARCHAR(10)",
                ["EU", "EU", "US", "EU", "APAC", "US"].map(|r| json!(r)),
            )
            .with_column(
                "CREATED",
                "TIMESTAMP",
                [
                    json!("2024-01-01 10:00:00"),
                    json!("2024-01-02 11:00:00"),
                    json!(null),
                    json!("2024-01-08 09:00:00"),
                    json!("2024-01-09 10:00:00"),
                    json!(null),
                ],
            )
            .with_column("ACTIVE", "BOOLEAN", [true, true, false, true, false, true].map(|b| json!(b)))
            .with_column("PHOTO", "BLOB", (1..=6).map(|_| json!(null)))
    }

    fn profiler(config: ProfileConfig) -> TableProfiler {
        let catalog = MemoryCatalog::new().with_table(customers());
        TableProfiler::new(Arc::new(MemoryProvider::new(catalog).with_seed(3)), config)
    }

    #[test]
    fn test_table_metrics() {
        let column = |nulls: usize| {
            let mut values = vec![Value::Number(1.0); 4 - nulls];
            values.extend(vec![Value::Null; nulls]);
            profile_column(
                &ColumnSchema::new("C", "INTEGER", 1),
                &Sample::new(values),
                &ProfileConfig::default(),
                Utc::now().naive_utc(),
            )
        };
        let metrics = TableMetrics::from_columns(4, &[column(0), column(2)]);
        assert_eq!(metrics.total_cells, 8);
        assert_eq!(metrics.null_cells, 2);
        assert_eq!(metrics.null_pct, 25.0);
        assert_eq!(metrics.completeness_pct, 75.0);
        assert_eq!(metrics.unique_column_count, 0);

        let empty = TableMetrics::from_columns(0, &[]);
        assert_eq!(empty.completeness_pct, 100.0);
    }

    #[tokio::test]
    async fn test_profile_table() {
        let profile = profiler(ProfileConfig::default())
            .profile(&TableRef::new("CRM", "CUSTOMERS"))
            .await
            .unwrap();

        assert_eq!(profile.row_count, Some(6));
        assert_eq!(profile.sample_size, 6);
        assert_eq!(profile.column_count, 5);
        assert_eq!(profile.columns.len(), 4);
        assert_eq!(profile.excluded_columns, vec!["PHOTO".to_string()]);
        assert_eq!(profile.metrics.unique_column_count, 1);
        assert_eq!(profile.metrics.null_cells, 2);

        let id = profile.column("ID").unwrap();
        assert!(id.basic.is_unique);
        assert_eq!(id.numeric.as_ref().unwrap().mean, 3.5);

        let region = profile.column("REGION").unwrap();
        assert_eq!(region.top_values[0].value, "EU");
        assert_eq!(region.top_values[0].count, 3);
        assert_eq!(region.categorical.as_ref().unwrap().mode.as_deref(), Some("EU"));

        let created = profile.column("CREATED").unwrap();
        assert_eq!(created.basic.null_count, 2);
        let temporal = created.temporal.as_ref().unwrap();
        assert_eq!(temporal.span_days, 8);
        assert_eq!(temporal.gaps.len(), 1);

        let active = profile.column("ACTIVE").unwrap();
        assert_eq!(active.boolean.as_ref().unwrap().true_count, 4);
    }

    #[tokio::test]
    async fn test_profile_caps_sample_size() {
        let profile = profiler(ProfileConfig::default().with_sample_size(3))
            .profile(&TableRef::new("CRM", "CUSTOMERS"))
            .await
            .unwrap();
        assert_eq!(profile.sample_size, 3);
        assert_eq!(profile.column("ID").unwrap().basic.count, 3);
    }

    #[tokio::test]
    async fn test_profile_rejects_invalid_settings() {
        let result = profiler(ProfileConfig::default().with_top_k(0))
            .profile(&TableRef::new("CRM", "CUSTOMERS"))
            .await;
        assert!(matches!(result, Err(DriftError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_profile_tables_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let tables = [
            TableRef::new("CRM", "CUSTOMERS"),
            TableRef::new("CRM", "MISSING"),
        ];
        let summary = profiler(ProfileConfig::default())
            .profile_tables(&tables, Some(dir.path()))
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(summary.results[1].status, ProfileStatus::Error);
        assert!(summary.results[1].error.as_ref().unwrap().contains("MISSING"));

        let report = summary.results[0].report_file.as_ref().unwrap();
        assert!(report.ends_with("0000_CRM.CUSTOMERS.json"));
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(report).unwrap()).unwrap();
        assert_eq!(json["table"]["table"], "CUSTOMERS");
        assert_eq!(
            summary.average_completeness_pct,
            Some(summary.results[0].completeness_pct.unwrap())
        );
    }
}
