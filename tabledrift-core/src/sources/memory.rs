//! In-process data source.
//!
//! Tables live in a [`MemoryCatalog`], built in code or loaded from a JSON
//! fixture of the form:
//!
//! ```json
//! {
//!   "tables": [
//!     {
//!       "schema": "SAPISU",
//!       "table": "EABL",
//!       "columns": [{"name": "ABLBELNR", "type": "NVARCHAR(20)"}],
//!       "rows": [["000100"], ["000101"]],
//!       "row_count": 1200000
//!     }
//!   ]
//! }
//! ```
//!
//! `row_count` is optional and overrides the number of stored rows, so a
//! small fixture can stand in for a large table. The provider can inject
//! latency and connectivity failures per table.

use super::{DataSource, SourceProvider};
use crate::Result;
use crate::error::DriftError;
use crate::models::{ColumnSchema, Sample, TableRef, TableSample, TableSchema, Value};
use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One table held in memory, stored column by column.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryTable {
    pub table: TableRef,
    pub columns: Vec<ColumnSchema>,
    data: Vec<Vec<serde_json::Value>>,
    reported_rows: Option<u64>,
}

impl MemoryTable {
    /// Creates a table with no columns.
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            columns: Vec::new(),
            data: Vec::new(),
            reported_rows: None,
        }
    }

    /// Appends a column with its values.
    pub fn with_column<I>(mut self, name: &str, data_type: &str, values: I) -> Self
    where
        I: IntoIterator<Item = serde_json::Value>,
    {
        let position = u32::try_from(self.columns.len()).map_or(u32::MAX, |n| n.saturating_add(1));
        self.columns.push(ColumnSchema::new(name, data_type, position));
        self.data.push(values.into_iter().collect());
        self
    }

    /// Overrides the row count reported by `COUNT(*)`.
    pub fn with_row_count(mut self, rows: u64) -> Self {
        self.reported_rows = Some(rows);
        self
    }

    /// Stored rows; columns shorter than the longest read as NULL.
    pub fn stored_rows(&self) -> usize {
        self.data.iter().map(Vec::len).max().unwrap_or(0)
    }

    fn row_count(&self) -> u64 {
        self.reported_rows
            .unwrap_or_else(|| u64::try_from(self.stored_rows()).unwrap_or(u64::MAX))
    }

    fn column_values(&self, name: &str) -> Option<(&ColumnSchema, &[serde_json::Value])> {
        let key = name.to_uppercase();
        self.columns
            .iter()
            .position(|c| c.match_key() == key)
            .map(|i| (&self.columns[i], self.data[i].as_slice()))
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct FixtureFile {
    tables: Vec<FixtureTable>,
}

#[derive(Debug, Deserialize, Serialize)]
struct FixtureTable {
    schema: String,
    table: String,
    columns: Vec<FixtureColumn>,
    #[serde(default)]
    rows: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    row_count: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
struct FixtureColumn {
    name: String,
    #[serde(rename = "type")]
    data_type: String,
}

impl From<FixtureTable> for MemoryTable {
    fn from(fixture: FixtureTable) -> Self {
        let mut table = MemoryTable::new(TableRef::new(fixture.schema, fixture.table));
        for (index, column) in fixture.columns.iter().enumerate() {
            let values = fixture
                .rows
                .iter()
                .map(|row| row.get(index).cloned().unwrap_or(serde_json::Value::Null));
            table = table.with_column(&column.name, &column.data_type, values);
        }
        table.reported_rows = fixture.row_count;
        table
    }
}

/// Set of in-memory tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryCatalog {
    tables: HashMap<TableRef, MemoryTable>,
}

impl MemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a table.
    pub fn with_table(mut self, table: MemoryTable) -> Self {
        self.insert(table);
        self
    }

    /// Adds or replaces a table.
    pub fn insert(&mut self, table: MemoryTable) {
        self.tables.insert(table.table.clone(), table);
    }

    /// Looks up a table, matching names case-insensitively.
    pub fn get(&self, table: &TableRef) -> Option<&MemoryTable> {
        self.tables.get(table).or_else(|| {
            self.tables.values().find(|t| {
                t.table.schema.eq_ignore_ascii_case(&table.schema)
                    && t.table.table.eq_ignore_ascii_case(&table.table)
            })
        })
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Parses a JSON fixture.
    ///
    /// # Errors
    /// Returns a serialization error for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: FixtureFile = serde_json::from_str(json)
            .map_err(|e| DriftError::serialization("Failed to parse table fixture", e))?;
        Ok(fixture
            .tables
            .into_iter()
            .map(MemoryTable::from)
            .fold(Self::new(), Self::with_table))
    }

    /// Loads a JSON fixture file.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be read and a serialization
    /// error if it is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DriftError::io(format!("Failed to read fixture {}", path.display()), e)
        })?;
        Self::from_json(&content)
    }
}

#[derive(Debug, Clone, Default)]
struct Behaviour {
    unreachable: bool,
    unreachable_tables: HashSet<TableRef>,
    delays: HashMap<TableRef, Duration>,
}

/// Provider handing out connections to a shared [`MemoryCatalog`].
#[derive(Debug, Clone)]
pub struct MemoryProvider {
    catalog: Arc<MemoryCatalog>,
    behaviour: Arc<Behaviour>,
    seed: u64,
    open_connections: Arc<AtomicUsize>,
    total_connections: Arc<AtomicUsize>,
}

impl MemoryProvider {
    /// Creates a provider over a catalog.
    pub fn new(catalog: MemoryCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            behaviour: Arc::new(Behaviour::default()),
            seed: 0,
            open_connections: Arc::new(AtomicUsize::new(0)),
            total_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sets the seed used when down-sampling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // Fault injection and connection accounting for scheduler tests.

    /// Makes every connection attempt fail.
    #[doc(hidden)]
    pub fn unreachable(mut self) -> Self {
        Arc::make_mut(&mut self.behaviour).unreachable = true;
        self
    }

    /// Makes every operation on one table fail with a connectivity error.
    #[doc(hidden)]
    pub fn with_unreachable_table(mut self, table: TableRef) -> Self {
        Arc::make_mut(&mut self.behaviour)
            .unreachable_tables
            .insert(table);
        self
    }

    /// Delays every operation on one table.
    #[doc(hidden)]
    pub fn with_table_delay(mut self, table: TableRef, delay: Duration) -> Self {
        Arc::make_mut(&mut self.behaviour)
            .delays
            .insert(table, delay);
        self
    }

    /// Connections currently held by callers.
    #[doc(hidden)]
    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    /// Connections opened since the provider was created.
    #[doc(hidden)]
    pub fn total_connections(&self) -> usize {
        self.total_connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceProvider for MemoryProvider {
    async fn connect(&self) -> Result<Box<dyn DataSource>> {
        if self.behaviour.unreachable {
            return Err(DriftError::connection_failed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "memory source marked unreachable",
            )));
        }
        self.open_connections.fetch_add(1, Ordering::SeqCst);
        self.total_connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySource {
            catalog: Arc::clone(&self.catalog),
            behaviour: Arc::clone(&self.behaviour),
            seed: self.seed,
            _guard: ConnectionGuard {
                open: Arc::clone(&self.open_connections),
            },
        }))
    }

    fn describe(&self) -> String {
        format!("memory ({} tables)", self.catalog.len())
    }
}

#[derive(Debug)]
struct ConnectionGuard {
    open: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One connection to a memory catalog.
#[derive(Debug)]
pub struct MemorySource {
    catalog: Arc<MemoryCatalog>,
    behaviour: Arc<Behaviour>,
    seed: u64,
    _guard: ConnectionGuard,
}

impl MemorySource {
    async fn lookup(&self, table: &TableRef) -> Result<&MemoryTable> {
        if let Some(delay) = self.behaviour.delays.get(table) {
            tokio::time::sleep(*delay).await;
        }
        if self.behaviour.unreachable_tables.contains(table) {
            return Err(DriftError::connection_context(
                format!("Lost connection while reading {table}"),
                std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset"),
            ));
        }
        self.catalog
            .get(table)
            .ok_or_else(|| DriftError::table_not_found(table.to_string()))
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn table_schema(&self, table: &TableRef) -> Result<TableSchema> {
        let stored = self.lookup(table).await?;
        Ok(TableSchema {
            table: table.clone(),
            columns: stored.columns.clone(),
        })
    }

    async fn row_count(&self, table: &TableRef) -> Result<u64> {
        Ok(self.lookup(table).await?.row_count())
    }

    async fn sample(
        &self,
        table: &TableRef,
        columns: &[ColumnSchema],
        limit: usize,
    ) -> Result<TableSample> {
        let stored = self.lookup(table).await?;
        let rows = stored.stored_rows();

        let indices: Vec<usize> = if limit >= rows {
            (0..rows).collect()
        } else {
            let mut rng = StdRng::seed_from_u64(self.seed);
            let mut picked = rand::seq::index::sample(&mut rng, rows, limit).into_vec();
            picked.sort_unstable();
            picked
        };

        let mut sampled = BTreeMap::new();
        for column in columns {
            let Some((schema, values)) = stored.column_values(&column.name) else {
                return Err(DriftError::query_failed(format!(
                    "Column {} not found in {table}",
                    column.name
                )));
            };
            let classification = schema.classification();
            let sample = indices
                .iter()
                .map(|&i| {
                    values
                        .get(i)
                        .map_or(Value::Null, |v| Value::from_json(v, classification))
                })
                .collect();
            sampled.insert(column.name.clone(), Sample::new(sample));
        }

        tracing::trace!("Sampled {} rows from memory table {}", indices.len(), table);
        Ok(TableSample {
            requested: limit,
            columns: sampled,
        })
    }

    fn source_type(&self) -> &'static str {
        "memory"
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
    use serde_json::json;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new().with_table(
            MemoryTable::new(TableRef::new("main", "orders"))
                .with_column("ID", "INTEGER", (1..=10).map(|i| json!(i)))
                .with_column("STATUS", "TEXT", (1..=10).map(|i| json!(if i % 2 == 0 { "open" } else { "closed" }))),
        )
    }

    #[tokio::test]
    async fn test_schema_and_count() {
        let provider = MemoryProvider::new(catalog());
        let source = provider.connect().await.unwrap();
        let table = TableRef::new("MAIN", "Orders");
        let schema = source.table_schema(&table).await.unwrap();
        assert_eq!(schema.columns.len(), 2);
        assert_eq!(source.row_count(&table).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_missing_table() {
        let provider = MemoryProvider::new(catalog());
        let source = provider.connect().await.unwrap();
        let err = source
            .table_schema(&TableRef::new("main", "missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, DriftError::TableNotFound { ref table } if table == "main.missing"));
    }

    #[tokio::test]
    async fn test_sampling_is_seeded_and_bounded() {
        let provider = MemoryProvider::new(catalog()).with_seed(7);
        let source = provider.connect().await.unwrap();
        let table = TableRef::new("main", "orders");
        let schema = source.table_schema(&table).await.unwrap();

        let first = source.sample(&table, &schema.columns, 4).await.unwrap();
        let second = source.sample(&table, &schema.columns, 4).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.column("ID").len(), 4);

        let all = source.sample(&table, &schema.columns, 100).await.unwrap();
        assert_eq!(all.column("ID").len(), 10);
        assert_eq!(all.column("ID").values[0], Value::Number(1.0));
    }

    #[tokio::test]
    async fn test_connection_guard_releases() {
        let provider = MemoryProvider::new(catalog());
        {
            let _a = provider.connect().await.unwrap();
            let _b = provider.connect().await.unwrap();
            assert_eq!(provider.open_connections(), 2);
        }
        assert_eq!(provider.open_connections(), 0);
        assert_eq!(provider.total_connections(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        let provider = MemoryProvider::new(catalog()).unreachable();
        let err = provider.connect().await.err().unwrap();
        assert_eq!(err.category(), crate::error::ErrorCategory::Connectivity);
    }

    #[test]
    fn test_fixture_parsing() {
        let json = r#"{
            "tables": [{
                "schema": "SAPISU",
                "table": "EABL",
                "columns": [{"name": "ABLBELNR", "type": "NVARCHAR(20)"}, {"name": "V_ZWSTAND", "type": "DECIMAL(17,14)"}],
                "rows": [["000100", 12.5], ["000101", null]],
                "row_count": 1200000
            }]
        }"#;
        let catalog = MemoryCatalog::from_json(json).unwrap();
        let table = catalog.get(&TableRef::new("SAPISU", "EABL")).unwrap();
        assert_eq!(table.stored_rows(), 2);
        assert_eq!(table.row_count(), 1_200_000);
        assert_eq!(table.columns[1].ordinal_position, 2);
    }
}
