//! SQLite data source tests.
//!
//! This test suite covers:
//! - Schema reads through PRAGMA table_info
//! - Missing table detection
//! - Row counts and bounded random sampling
//! - A full comparison between two SQLite databases
//! - Text in numeric columns surfacing as test errors
//! - Seeded, reproducible sampling
//! - Column profiles of a SQLite table

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::arithmetic_side_effects
)]

#![cfg(feature = "sqlite")]

use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;
use std::sync::Arc;
use tabledrift_core::{
    Classification, ComparisonConfig, ComparisonStatus, DriftError, Result, TableComparator,
    ProfileConfig, TableMapping, TableProfiler, TableRef, TestKind, Verdict, create_provider,
    models::Value,
    sources::{SourceProvider, SqliteProvider},
};

/// Creates a database with a `readings` table of `rows` generated rows.
async fn create_database(path: &Path, rows: u32, reading_offset: f64) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .unwrap();

    sqlx::query(
        "CREATE TABLE readings (
            id INTEGER PRIMARY KEY,
            meter TEXT NOT NULL,
            reading REAL,
            taken_at TIMESTAMP,
            payload BLOB
        )",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO readings (id, meter, reading, taken_at, payload)
         WITH RECURSIVE seq(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM seq WHERE x < ?)
         SELECT x,
                'M' || (x % 5),
                CASE WHEN x % 10 = 0 THEN NULL ELSE (x % 97) + ? END,
                datetime('2024-01-01', '+' || (x % 240) || ' hours'),
                randomblob(4)
         FROM seq",
    )
    .bind(rows)
    .bind(reading_offset)
    .execute(&pool)
    .await
    .unwrap();

    pool.close().await;
}

/// Creates a `ledger` table whose NUMERIC `amount` column holds `'n/a'`
/// on every other row when `with_text` is set.
async fn create_ledger(path: &Path, rows: u32, with_text: bool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .unwrap();

    sqlx::query("CREATE TABLE ledger (id INTEGER PRIMARY KEY, amount NUMERIC)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO ledger (id, amount)
         WITH RECURSIVE seq(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM seq WHERE x < ?)
         SELECT x, CASE WHEN ? AND x % 2 = 0 THEN 'n/a' ELSE x % 50 END FROM seq",
    )
    .bind(rows)
    .bind(with_text)
    .execute(&pool)
    .await
    .unwrap();

    pool.close().await;
}

fn readings() -> TableRef {
    TableRef::new("main", "readings")
}

#[tokio::test]
async fn test_sqlite_schema_and_row_count() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("source.db");
    create_database(&path, 200, 0.0).await;

    let provider = SqliteProvider::new(path.to_str().unwrap())?;
    let source = provider.connect().await?;
    assert_eq!(source.source_type(), "sqlite");

    let schema = source.table_schema(&readings()).await?;
    let columns: Vec<_> = schema
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.classification()))
        .collect();
    assert_eq!(
        columns,
        vec![
            ("id", Classification::Numerical),
            ("meter", Classification::Categorical),
            ("reading", Classification::Numerical),
            ("taken_at", Classification::Temporal),
            ("payload", Classification::Unsupported),
        ]
    );
    assert_eq!(schema.columns[0].ordinal_position, 1);
    assert_eq!(source.row_count(&readings()).await?, 200);
    Ok(())
}

#[tokio::test]
async fn test_sqlite_missing_table() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("source.db");
    create_database(&path, 10, 0.0).await;

    let source = SqliteProvider::new(path.to_str().unwrap())?.connect().await?;
    let err = source
        .table_schema(&TableRef::new("main", "absent"))
        .await
        .unwrap_err();
    assert!(matches!(err, DriftError::TableNotFound { ref table } if table == "main.absent"));
    Ok(())
}

#[tokio::test]
async fn test_sqlite_sample_is_bounded_and_typed() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("source.db");
    create_database(&path, 500, 0.0).await;

    let source = SqliteProvider::new(path.to_str().unwrap())?.connect().await?;
    let schema = source.table_schema(&readings()).await?;
    let wanted: Vec<_> = schema
        .columns
        .iter()
        .filter(|c| c.name != "payload")
        .cloned()
        .collect();

    let sample = source.sample(&readings(), &wanted, 50).await?;
    assert_eq!(sample.columns.len(), 4);
    assert!(sample.columns.values().all(|s| s.len() == 50));

    let reading = sample.column("reading");
    assert!(reading
        .values
        .iter()
        .all(|v| matches!(v, Value::Number(_) | Value::Null)));
    assert!(sample
        .column("taken_at")
        .values
        .iter()
        .all(|v| matches!(v, Value::Timestamp(_))));
    assert!(sample
        .column("meter")
        .values
        .iter()
        .all(|v| matches!(v, Value::Text(t) if t.starts_with('M'))));
    Ok(())
}

#[tokio::test]
async fn test_sqlite_comparison_end_to_end() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("source.db");
    let same_path = dir.path().join("replica.db");
    let shifted_path = dir.path().join("shifted.db");
    create_database(&source_path, 1000, 0.0).await;
    create_database(&same_path, 1000, 0.0).await;
    create_database(&shifted_path, 1000, 500.0).await;

    let source = create_provider(source_path.to_str().unwrap(), None)?;
    let mapping = TableMapping::new(readings(), readings());

    let replica = TableComparator::new(
        Arc::clone(&source),
        create_provider(same_path.to_str().unwrap(), None)?,
        ComparisonConfig::default(),
    )
    .compare(&mapping)
    .await?;
    assert_eq!(replica.status, ComparisonStatus::Pass);
    assert_eq!(replica.row_count_delta, 0);
    // payload is BLOB on both sides and never tested
    assert!(replica.columns.iter().all(|c| c.name != "payload"));

    let shifted = TableComparator::new(
        source,
        create_provider(shifted_path.to_str().unwrap(), None)?,
        ComparisonConfig::default(),
    )
    .compare(&mapping)
    .await?;
    assert_eq!(shifted.status, ComparisonStatus::Fail);
    let reading = shifted.columns.iter().find(|c| c.name == "reading").unwrap();
    assert_eq!(reading.verdict, Verdict::Fail);
    let ks = reading.tests.iter().find(|t| t.kind == TestKind::Ks).unwrap();
    assert_eq!(ks.verdict, Verdict::Fail);
    assert_eq!(shifted.failed_columns(), vec!["reading"]);
    Ok(())
}

#[tokio::test]
async fn test_sqlite_text_in_numeric_column_is_an_error() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let clean_path = dir.path().join("clean.db");
    let dirty_path = dir.path().join("dirty.db");
    create_ledger(&clean_path, 100, false).await;
    create_ledger(&dirty_path, 100, true).await;

    let ledger = TableRef::new("main", "ledger");
    let dirty = SqliteProvider::new(dirty_path.to_str().unwrap())?.connect().await?;
    let schema = dirty.table_schema(&ledger).await?;
    let sample = dirty.sample(&ledger, &schema.columns, 100).await?;
    let amounts = sample.column("amount");
    let text = amounts
        .values
        .iter()
        .filter(|v| matches!(v, Value::Text(t) if t == "n/a"))
        .count();
    assert_eq!(text, 50);
    assert!(!amounts.values.iter().any(|v| *v == Value::Number(0.0)));

    let result = TableComparator::new(
        create_provider(clean_path.to_str().unwrap(), None)?,
        create_provider(dirty_path.to_str().unwrap(), None)?,
        ComparisonConfig::default(),
    )
    .compare(&TableMapping::new(ledger.clone(), ledger))
    .await?;

    let amount = result.columns.iter().find(|c| c.name == "amount").unwrap();
    for kind in [TestKind::Ks, TestKind::TTest] {
        let test = amount.tests.iter().find(|t| t.kind == kind).unwrap();
        assert_eq!(test.verdict, Verdict::Error, "{kind}");
    }
    assert_ne!(result.status, ComparisonStatus::Fail);
    assert!(result.checks.errored >= 2);
    Ok(())
}

#[tokio::test]
async fn test_sqlite_seeded_samples_repeat() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("source.db");
    create_database(&path, 500, 0.0).await;

    let provider = SqliteProvider::new(path.to_str().unwrap())?.with_seed(42);
    let source = provider.connect().await?;
    let schema = source.table_schema(&readings()).await?;
    let id = vec![schema.columns[0].clone()];

    let first = source.sample(&readings(), &id, 20).await?;
    let second = source.sample(&readings(), &id, 20).await?;
    assert_eq!(first.column("id").len(), 20);
    assert_eq!(first, second);

    let other = SqliteProvider::new(path.to_str().unwrap())?
        .with_seed(7)
        .connect()
        .await?
        .sample(&readings(), &id, 20)
        .await?;
    assert_ne!(first, other);

    // Seeds flow through create_provider as well.
    let created = create_provider(path.to_str().unwrap(), Some(42))?
        .connect()
        .await?
        .sample(&readings(), &id, 20)
        .await?;
    assert_eq!(first, created);
    Ok(())
}

#[tokio::test]
async fn test_sqlite_table_profile() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lake.db");
    create_database(&path, 200, 0.0).await;

    let profiler = TableProfiler::new(
        create_provider(path.to_str().unwrap(), Some(11))?,
        ProfileConfig::default().with_top_k(3),
    );
    let profile = profiler.profile(&readings()).await?;

    assert_eq!(profile.source_type, "sqlite");
    assert_eq!(profile.row_count, Some(200));
    assert_eq!(profile.sample_size, 200);
    assert_eq!(profile.excluded_columns, vec!["payload".to_string()]);

    let id = profile.column("id").unwrap();
    assert!(id.basic.is_unique);
    let id_stats = id.numeric.as_ref().unwrap();
    assert_eq!(id_stats.min, 1.0);
    assert_eq!(id_stats.max, 200.0);
    assert_eq!(id_stats.median, 100.5);

    let meter = profile.column("meter").unwrap();
    assert_eq!(meter.basic.distinct_count, 5);
    let top: Vec<_> = meter
        .top_values
        .iter()
        .map(|v| (v.value.as_str(), v.count))
        .collect();
    assert_eq!(top, vec![("M0", 40), ("M1", 40), ("M2", 40)]);

    let reading = profile.column("reading").unwrap();
    assert_eq!(reading.basic.null_count, 20);
    assert_eq!(reading.basic.null_rate_pct, 10.0);
    assert!(reading.error.is_none());

    let taken_at = profile.column("taken_at").unwrap().temporal.as_ref().unwrap();
    assert_eq!(taken_at.min.to_string(), "2024-01-01 01:00:00");
    assert_eq!(taken_at.span_days, 8);
    assert!(taken_at.gaps.is_empty());
    assert_eq!(taken_at.hour_counts.as_ref().map(|h| h.len()), Some(24));

    assert_eq!(profile.metrics.null_cells, 20);
    Ok(())
}
