//! Output handling for comparison results and run summaries.
//!
//! Results are written as pretty-printed JSON. Summaries can also be
//! rendered as a plain-text report for terminals.

use std::fmt::Write as _;
use std::path::Path;
use tabledrift_core::Result;
use tabledrift_core::bulk::{RowCountDifference, SummaryReport};
use tabledrift_core::error::DriftError;

/// Serializes a value as pretty-printed JSON.
pub(crate) fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| DriftError::serialization(format!("Failed to serialize {what}"), e))
}

/// Saves JSON data to file.
pub(crate) async fn save_json(json_data: &str, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            DriftError::io(format!("Failed to create {}", parent.display()), e)
        })?;
    }
    tokio::fs::write(output_path, json_data)
        .await
        .map_err(|e| DriftError::io(format!("Failed to write to {}", output_path.display()), e))?;
    Ok(())
}

/// Writes JSON to a file when a path is given, otherwise to stdout.
pub(crate) async fn emit_json(json_data: &str, output_path: Option<&Path>) -> Result<()> {
    match output_path {
        Some(path) => {
            save_json(json_data, path).await?;
            tracing::info!("Output written to {}", path.display());
        }
        None => println!("{json_data}"),
    }
    Ok(())
}

fn difference_line(out: &mut String, rank: usize, diff: &RowCountDifference) {
    let _ = writeln!(
        out,
        "  {:>3}. {} -> {}  {} vs {}  ({:+}, {:.2}%)  {}",
        rank,
        diff.source,
        diff.destination,
        diff.source_rows,
        diff.destination_rows,
        diff.delta,
        diff.delta_pct,
        diff.status
    );
}

/// Renders a summary report as plain text.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn render_report(report: &SummaryReport) -> String {
    let totals = &report.totals;
    let mut out = String::new();
    let _ = writeln!(out, "Jobs:        {}", totals.total);
    let _ = writeln!(out, "  passed:    {}", totals.passed);
    let _ = writeln!(out, "  failed:    {}", totals.failed);
    let _ = writeln!(
        out,
        "  errored:   {} ({} timed out)",
        totals.errored, totals.timed_out
    );
    let _ = writeln!(out, "Duration:    {:.1}s", totals.total_duration_ms as f64 / 1000.0);
    let _ = writeln!(out);
    let _ = writeln!(out, "Compared tables:       {}", report.compared_tables);
    let _ = writeln!(out, "  perfect matches:     {}", report.perfect_matches);
    let _ = writeln!(out, "  with differences:    {}", report.with_differences);
    let _ = writeln!(out, "  destination has more: {}", report.destination_has_more);
    let _ = writeln!(out, "  source has more:     {}", report.source_has_more);
    let _ = writeln!(out, "Source rows:           {}", report.total_source_rows);
    let _ = writeln!(out, "Destination rows:      {}", report.total_destination_rows);
    let _ = writeln!(out, "Absolute difference:   {}", report.total_abs_difference);
    match report.match_rate_pct {
        Some(rate) => {
            let _ = writeln!(out, "Match rate:            {rate:.4}%");
        }
        None => {
            let _ = writeln!(out, "Match rate:            n/a");
        }
    }

    if !report.top_by_absolute.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Largest differences (rows):");
        for (rank, diff) in report.top_by_absolute.iter().enumerate() {
            difference_line(&mut out, rank.saturating_add(1), diff);
        }
    }
    if !report.top_by_percentage.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Largest differences (%):");
        for (rank, diff) in report.top_by_percentage.iter().enumerate() {
            difference_line(&mut out, rank.saturating_add(1), diff);
        }
    }
    out
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
    use tabledrift_core::bulk::{JobStatus, Totals};
    use tabledrift_core::TableRef;

    fn report() -> SummaryReport {
        let diff = RowCountDifference {
            index: 1,
            source: TableRef::new("SAPISU", "EABL"),
            destination: TableRef::new("replica", "eabl"),
            source_rows: 1000,
            destination_rows: 1100,
            delta: 100,
            delta_pct: 10.0,
            status: JobStatus::Fail,
        };
        SummaryReport {
            totals: Totals {
                total: 2,
                passed: 1,
                failed: 1,
                errored: 0,
                timed_out: 0,
                total_duration_ms: 1500,
            },
            compared_tables: 2,
            perfect_matches: 1,
            with_differences: 1,
            destination_has_more: 1,
            source_has_more: 0,
            total_source_rows: 2000,
            total_destination_rows: 2100,
            total_abs_difference: 100,
            match_rate_pct: Some(95.0),
            top_by_absolute: vec![diff.clone()],
            top_by_percentage: vec![diff],
        }
    }

    #[test]
    fn test_render_report() {
        let text = render_report(&report());
        assert!(text.contains("Jobs:        2"));
        assert!(text.contains("Match rate:            95.0000%"));
        assert!(text.contains("SAPISU.EABL -> replica.eabl  1000 vs 1100  (+100, 10.00%)  FAIL"));
    }

    #[tokio::test]
    async fn test_save_json_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("summary.json");
        let json = to_json(&report(), "report").unwrap();
        save_json(&json, &path).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"match_rate_pct\": 95.0"));
    }
}
