//! End-to-end table comparison tests over in-memory sources.
//!
//! This test suite covers:
//! - Statistical agreement on identically distributed columns
//! - Exact PSI of zero for identical frequency tables
//! - Chi-square skipping above the cardinality cap
//! - Proportional sample sizing
//! - Determinism of repeated comparisons

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::arithmetic_side_effects
)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};
use std::sync::Arc;
use tabledrift_core::{
    ComparisonConfig, ComparisonStatus, Result, SamplingConfig, TableComparator, TableMapping,
    TableRef, TestKind, Verdict,
    sources::{MemoryCatalog, MemoryProvider, MemoryTable},
};

fn uniform(seed: u64, n: usize) -> Vec<Value> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| json!(rng.random::<f64>() * 100.0)).collect()
}

fn comparator_for(
    source: MemoryTable,
    destination: MemoryTable,
    config: ComparisonConfig,
) -> TableComparator {
    TableComparator::new(
        Arc::new(MemoryProvider::new(MemoryCatalog::new().with_table(source)).with_seed(7)),
        Arc::new(MemoryProvider::new(MemoryCatalog::new().with_table(destination)).with_seed(7)),
        config,
    )
}

fn mapping() -> TableMapping {
    TableMapping::new(TableRef::new("SRC", "MEASURES"), TableRef::new("DST", "MEASURES"))
}

#[tokio::test]
async fn test_identical_distributions_pass_numerical_tests() -> Result<()> {
    let trials = 20_u64;
    let mut passing = 0;
    for trial in 0..trials {
        let source = MemoryTable::new(TableRef::new("SRC", "MEASURES")).with_column(
            "AMOUNT",
            "DECIMAL(15,2)",
            uniform(trial * 2 + 1, 2000),
        );
        let destination = MemoryTable::new(TableRef::new("DST", "MEASURES")).with_column(
            "AMOUNT",
            "DOUBLE",
            uniform(trial * 2 + 2, 2000),
        );
        let result = comparator_for(source, destination, ComparisonConfig::default())
            .compare(&mapping())
            .await?;

        let column = &result.columns[0];
        assert_eq!(column.tests.len(), 2);
        assert!(column.tests.iter().all(|t| t.verdict.is_executed()));
        if column.verdict == Verdict::Pass {
            passing += 1;
        }
    }

    // Each trial fails by chance roughly one time in ten.
    assert!(passing >= 14, "only {passing} of {trials} trials passed");
    Ok(())
}

#[tokio::test]
async fn test_identical_frequency_tables_have_zero_psi() -> Result<()> {
    let labels = ["open", "closed", "pending", "void"];
    let forward: Vec<Value> = (0..400).map(|i| json!(labels[i % 4])).collect();
    let mut reversed = forward.clone();
    reversed.reverse();

    let source = MemoryTable::new(TableRef::new("SRC", "MEASURES")).with_column("STATE", "NVARCHAR(10)", forward);
    let destination =
        MemoryTable::new(TableRef::new("DST", "MEASURES")).with_column("STATE", "VARCHAR(10)", reversed);

    let result = comparator_for(source, destination, ComparisonConfig::default())
        .compare(&mapping())
        .await?;
    let psi = result.columns[0]
        .tests
        .iter()
        .find(|t| t.kind == TestKind::Psi)
        .expect("PSI computed");
    assert_eq!(psi.value, Some(0.0));
    assert_eq!(psi.verdict, Verdict::Pass);
    assert_eq!(result.status, ComparisonStatus::Pass);
    Ok(())
}

#[tokio::test]
async fn test_high_cardinality_skips_chi_square() -> Result<()> {
    let values: Vec<Value> = (0..400).map(|i| json!(format!("K{:03}", i % 200))).collect();
    let source =
        MemoryTable::new(TableRef::new("SRC", "MEASURES")).with_column("CODE", "TEXT", values.clone());
    let destination = MemoryTable::new(TableRef::new("DST", "MEASURES")).with_column("CODE", "TEXT", values);

    let result = comparator_for(source, destination, ComparisonConfig::default())
        .compare(&mapping())
        .await?;
    let tests = &result.columns[0].tests;
    let chi = tests.iter().find(|t| t.kind == TestKind::ChiSquare).unwrap();
    let psi = tests.iter().find(|t| t.kind == TestKind::Psi).unwrap();
    assert_eq!(chi.verdict, Verdict::Skipped);
    assert!(chi.detail.as_deref().unwrap().contains("cardinality 200"));
    assert_eq!(psi.verdict, Verdict::Pass);
    assert_eq!(result.checks.skipped, 1);
    assert_eq!(result.status, ComparisonStatus::Pass);
    Ok(())
}

#[tokio::test]
async fn test_samples_are_sized_proportionally() -> Result<()> {
    let source =
        MemoryTable::new(TableRef::new("SRC", "MEASURES")).with_column("AMOUNT", "INTEGER", uniform(1, 1000));
    let destination =
        MemoryTable::new(TableRef::new("DST", "MEASURES")).with_column("AMOUNT", "INTEGER", uniform(2, 500));
    let config = ComparisonConfig::default()
        .with_sampling(SamplingConfig::default().with_max_sample_size(100));

    let result = comparator_for(source, destination, config).compare(&mapping()).await?;
    assert_eq!(result.source_row_count, 1000);
    assert_eq!(result.destination_row_count, 500);
    assert_eq!(result.source_sample_size, 100);
    assert_eq!(result.destination_sample_size, 50);
    Ok(())
}

#[tokio::test]
async fn test_repeated_comparison_is_deterministic() -> Result<()> {
    let source = MemoryTable::new(TableRef::new("SRC", "MEASURES"))
        .with_column("AMOUNT", "REAL", uniform(11, 3000))
        .with_column(
            "STATE",
            "VARCHAR(8)",
            (0..3000).map(|i| json!(if i % 7 == 0 { "void" } else { "ok" })),
        );
    let destination = MemoryTable::new(TableRef::new("DST", "MEASURES"))
        .with_column("AMOUNT", "REAL", uniform(12, 2800))
        .with_column(
            "STATE",
            "VARCHAR(8)",
            (0..2800).map(|i| json!(if i % 5 == 0 { "void" } else { "ok" })),
        );
    let config = ComparisonConfig::default()
        .with_sampling(SamplingConfig::default().with_max_sample_size(500));
    let comparator = comparator_for(source, destination, config);

    let first = comparator.compare(&mapping()).await?;
    let second = comparator.compare(&mapping()).await?;
    assert_eq!(first.columns, second.columns);
    assert_eq!(first.status, second.status);
    Ok(())
}

#[tokio::test]
async fn test_temporal_columns_get_range_and_null_checks_only() -> Result<()> {
    let stamps = |offset_days: i64| -> Vec<Value> {
        (0..50)
            .map(|i| {
                if i % 10 == 0 {
                    Value::Null
                } else {
                    json!(format!("2024-01-{:02} 08:00:00", 1 + (i + offset_days) % 28))
                }
            })
            .collect()
    };
    let source =
        MemoryTable::new(TableRef::new("SRC", "MEASURES")).with_column("POSTED_AT", "TIMESTAMP", stamps(0));
    let destination =
        MemoryTable::new(TableRef::new("DST", "MEASURES")).with_column("POSTED_AT", "DATETIME", stamps(0));

    let result = comparator_for(source, destination, ComparisonConfig::default())
        .compare(&mapping())
        .await?;
    let column = &result.columns[0];
    assert!(column.tests.is_empty());
    assert_eq!(column.null_rate.source_pct, 10.0);
    assert_eq!(column.null_rate.check.verdict, Verdict::Pass);
    assert_eq!(column.range.as_ref().map(|r| r.verdict), Some(Verdict::Pass));
    Ok(())
}
