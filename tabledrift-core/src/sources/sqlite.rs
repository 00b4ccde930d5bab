//! SQLite data source.
//!
//! # Connection Modes
//! - File-based: `sqlite:///path/to/database.db` or `sqlite://./relative.db`
//! - Plain paths ending in `.db`, `.sqlite` or `.sqlite3`
//!
//! The schema part of a [`TableRef`] names an attached database (`main`
//! for the primary file). Databases are opened read-only, one single
//! connection pool per job side.

use super::{DataSource, SourceProvider};
use crate::Result;
use crate::classify::Classification;
use crate::error::{DriftError, redact_database_url};
use crate::models::{ColumnSchema, Sample, TableRef, TableSample, TableSchema, Value};
use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

/// Opens read-only SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    connection_string: String,
    options: SqliteConnectOptions,
    acquire_timeout: Duration,
    seed: Option<u64>,
}

impl SqliteProvider {
    /// Creates a provider from a connection string.
    ///
    /// # Errors
    /// Returns a configuration error if the connection string is invalid.
    pub fn new(connection_string: &str) -> Result<Self> {
        let normalized = normalize_connection_string(connection_string);
        let options = SqliteConnectOptions::from_str(&normalized)
            .map_err(|e| DriftError::configuration(format!("Invalid SQLite connection string: {e}")))?
            .read_only(true);
        Ok(Self {
            connection_string: connection_string.to_string(),
            options,
            acquire_timeout: Duration::from_secs(30),
            seed: None,
        })
    }

    /// Sets how long to wait for the database file to open.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Samples reproducibly: the same seed over unchanged data draws the
    /// same rows.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Normalizes connection string to SQLite URL format.
fn normalize_connection_string(connection_string: &str) -> String {
    if connection_string == ":memory:" {
        return "sqlite::memory:".to_string();
    }
    if connection_string.starts_with("sqlite:") {
        return connection_string.to_string();
    }
    // Convert file path to sqlite:// URL
    format!("sqlite://{connection_string}")
}

#[async_trait]
impl SourceProvider for SqliteProvider {
    async fn connect(&self) -> Result<Box<dyn DataSource>> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(self.acquire_timeout)
            .connect_with(self.options.clone())
            .await
            .map_err(|e| {
                DriftError::connection_context(
                    format!(
                        "Failed to open SQLite database {}",
                        redact_database_url(&self.connection_string)
                    ),
                    e,
                )
            })?;
        Ok(Box::new(SqliteSource {
            pool,
            seed: self.seed,
        }))
    }

    fn describe(&self) -> String {
        redact_database_url(&normalize_connection_string(&self.connection_string))
    }
}

/// One pooled connection to a SQLite database.
#[derive(Debug)]
pub struct SqliteSource {
    pool: SqlitePool,
    seed: Option<u64>,
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn qualified_name(table: &TableRef) -> String {
    format!(
        "{}.{}",
        quote_identifier(&table.schema),
        quote_identifier(&table.table)
    )
}

/// Select list for one sampled column.
///
/// Numerical columns carry their storage class next to the value, since
/// `CAST(x AS REAL)` turns unparseable text into 0.0 without complaint.
fn projection(name: &str, class: Classification) -> String {
    let column = quote_identifier(name);
    if class == Classification::Numerical {
        format!(
            "typeof({column}), CAST({column} AS REAL), \
             CASE WHEN typeof({column}) = 'blob' THEN '<blob>' ELSE CAST({column} AS TEXT) END"
        )
    } else {
        format!("CAST({column} AS TEXT)")
    }
}

/// Builds a numerical sample value from its storage class.
///
/// Integers and reals become numbers. Text that parses as a number is read
/// as one; anything else stays text and is rejected by the tests.
fn numeric_value(storage: Option<&str>, real: Option<f64>, text: Option<String>) -> Value {
    match storage {
        None | Some("null") => Value::Null,
        Some("integer" | "real") => real.map_or(Value::Null, Value::Number),
        Some(_) => text.map_or(Value::Null, |text| {
            Value::from_text(&text, Classification::Numerical)
        }),
    }
}

impl SqliteSource {
    async fn random_rows(&self, select: &str, limit: usize) -> Result<Vec<SqliteRow>> {
        let rows = sqlx::query(&format!("{select} ORDER BY RANDOM() LIMIT ?"))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Picks up to `limit` rowids with a seeded generator.
    ///
    /// Returns `None` for tables without a rowid, which fall back to
    /// unseeded sampling.
    async fn seeded_rowids(&self, table: &TableRef, limit: usize, seed: u64) -> Result<Option<Vec<i64>>> {
        let query = format!("SELECT rowid FROM {} ORDER BY rowid", qualified_name(table));
        let rowids: Vec<i64> = match sqlx::query_scalar(&query).fetch_all(&self.pool).await {
            Ok(rowids) => rowids,
            Err(e) => {
                tracing::warn!("{} has no usable rowid, sampling unseeded: {}", table, e);
                return Ok(None);
            }
        };
        Ok(Some(pick_rowids(&rowids, limit, seed)))
    }
}

/// Seeded choice of `limit` rowids, returned in ascending order.
fn pick_rowids(rowids: &[i64], limit: usize, seed: u64) -> Vec<i64> {
    if limit >= rowids.len() {
        return rowids.to_vec();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked: Vec<i64> = rand::seq::index::sample(&mut rng, rowids.len(), limit)
        .into_vec()
        .into_iter()
        .filter_map(|i| rowids.get(i).copied())
        .collect();
    picked.sort_unstable();
    picked
}

#[async_trait]
impl DataSource for SqliteSource {
    async fn table_schema(&self, table: &TableRef) -> Result<TableSchema> {
        let query = format!(
            "PRAGMA {}.table_info({})",
            quote_identifier(&table.schema),
            quote_identifier(&table.table)
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DriftError::schema_read(table.to_string(), e.to_string()))?;

        if rows.is_empty() {
            return Err(DriftError::table_not_found(table.to_string()));
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let cid: i64 = row
                .try_get("cid")
                .map_err(|e| DriftError::schema_read(table.to_string(), e.to_string()))?;
            let name: String = row
                .try_get("name")
                .map_err(|e| DriftError::schema_read(table.to_string(), e.to_string()))?;
            let data_type: String = row.try_get("type").unwrap_or_default();
            let position = u32::try_from(cid.saturating_add(1)).unwrap_or(u32::MAX);
            columns.push(ColumnSchema::new(name, data_type, position));
        }

        tracing::debug!("Read {} columns from {}", columns.len(), table);
        Ok(TableSchema {
            table: table.clone(),
            columns,
        })
    }

    async fn row_count(&self, table: &TableRef) -> Result<u64> {
        let query = format!("SELECT COUNT(*) FROM {}", qualified_name(table));
        let count: i64 = sqlx::query_scalar(&query).fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn sample(
        &self,
        table: &TableRef,
        columns: &[ColumnSchema],
        limit: usize,
    ) -> Result<TableSample> {
        if columns.is_empty() || limit == 0 {
            return Ok(TableSample {
                requested: limit,
                columns: columns
                    .iter()
                    .map(|c| (c.name.clone(), Sample::default()))
                    .collect(),
            });
        }

        let classes: Vec<Classification> = columns.iter().map(ColumnSchema::classification).collect();
        let projections: Vec<String> = columns
            .iter()
            .zip(&classes)
            .map(|(column, class)| projection(&column.name, *class))
            .collect();
        let select = format!("SELECT {} FROM {}", projections.join(", "), qualified_name(table));

        let rows = match self.seed {
            Some(seed) => match self.seeded_rowids(table, limit, seed).await? {
                Some(rowids) => {
                    let picked = serde_json::to_string(&rowids).map_err(|e| {
                        DriftError::serialization("Failed to encode sampled row ids", e)
                    })?;
                    sqlx::query(&format!(
                        "{select} WHERE rowid IN (SELECT value FROM json_each(?)) ORDER BY rowid"
                    ))
                    .bind(picked)
                    .fetch_all(&self.pool)
                    .await?
                }
                None => self.random_rows(&select, limit).await?,
            },
            None => self.random_rows(&select, limit).await?,
        };

        let mut values: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); columns.len()];
        for row in &rows {
            let mut offset = 0;
            for (index, class) in classes.iter().enumerate() {
                let value = if *class == Classification::Numerical {
                    let storage: Option<String> = row.try_get(offset)?;
                    let real: Option<f64> = row.try_get(offset.saturating_add(1))?;
                    let text: Option<String> = row.try_get(offset.saturating_add(2))?;
                    offset = offset.saturating_add(3);
                    numeric_value(storage.as_deref(), real, text)
                } else {
                    let text: Option<String> = row.try_get(offset)?;
                    offset = offset.saturating_add(1);
                    text.map_or(Value::Null, |text| Value::from_text(&text, *class))
                };
                values[index].push(value);
            }
        }

        tracing::debug!("Sampled {} rows from {}", rows.len(), table);
        let sampled: BTreeMap<String, Sample> = columns
            .iter()
            .zip(values)
            .map(|(column, values)| (column.name.clone(), Sample::new(values)))
            .collect();
        Ok(TableSample {
            requested: limit,
            columns: sampled,
        })
    }

    fn source_type(&self) -> &'static str {
        "sqlite"
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

    #[test]
    fn test_normalize_connection_string() {
        assert_eq!(normalize_connection_string(":memory:"), "sqlite::memory:");
        assert_eq!(normalize_connection_string("sqlite://a.db"), "sqlite://a.db");
        assert_eq!(normalize_connection_string("/tmp/a.db"), "sqlite:///tmp/a.db");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("orders"), "\"orders\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(qualified_name(&TableRef::new("main", "t")), "\"main\".\"t\"");
    }

    #[test]
    fn test_numeric_value_keeps_unparseable_text() {
        assert_eq!(numeric_value(Some("integer"), Some(4.0), Some("4".into())), Value::Number(4.0));
        assert_eq!(numeric_value(Some("real"), Some(2.5), Some("2.5".into())), Value::Number(2.5));
        assert_eq!(numeric_value(Some("null"), None, None), Value::Null);
        assert_eq!(numeric_value(Some("text"), Some(0.0), Some(" 7.5".into())), Value::Number(7.5));
        assert_eq!(
            numeric_value(Some("text"), Some(0.0), Some("n/a".into())),
            Value::Text("n/a".into())
        );
        assert_eq!(
            numeric_value(Some("blob"), Some(0.0), Some("<blob>".into())),
            Value::Text("<blob>".into())
        );
    }

    #[test]
    fn test_pick_rowids_is_seeded() {
        let rowids: Vec<i64> = (1..=1000).collect();
        let first = pick_rowids(&rowids, 25, 42);
        assert_eq!(first.len(), 25);
        assert_eq!(first, pick_rowids(&rowids, 25, 42));
        assert_ne!(first, pick_rowids(&rowids, 25, 43));
        assert!(first.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(pick_rowids(&rowids[..10], 25, 42), rowids[..10].to_vec());
    }

    #[test]
    fn test_provider_rejects_garbage() {
        assert!(SqliteProvider::new("sqlite://?mode=bogus").is_err());
    }
}
