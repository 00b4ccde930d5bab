//! Building retry job lists from a previous run.

use super::job::{JobRecord, JobSpec, JobStatus};
use super::summary::{RunFilter, RunSummary};

/// Default retry predicate: every job that did not pass.
pub fn needs_retry(record: &JobRecord) -> bool {
    record.status != JobStatus::Pass
}

/// Jobs from `summary` selected by `predicate`, in submission order.
pub fn retry_jobs<F>(summary: &RunSummary, predicate: F) -> Vec<JobSpec>
where
    F: Fn(&JobRecord) -> bool,
{
    let jobs: Vec<JobSpec> = summary
        .records
        .iter()
        .filter(|record| predicate(record))
        .map(|record| JobSpec::from_mapping(record.mapping()))
        .collect();
    tracing::info!(
        "Selected {} of {} jobs from run {} for retry",
        jobs.len(),
        summary.records.len(),
        summary.run_id
    );
    jobs
}

/// Filter for a run that retries `summary`.
pub fn retry_filter(summary: &RunSummary) -> RunFilter {
    RunFilter {
        filter_date: summary.filter.filter_date.clone(),
        job_source: summary.filter.job_source.clone(),
        retry_of: Some(summary.run_id),
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
    use crate::bulk::job::JobOutcome;
    use crate::bulk::summary::RunSummaryBuilder;
    use crate::compare::TableMapping;
    use crate::error::ErrorCategory;
    use crate::models::TableRef;
    use chrono::Utc;
    use std::time::Duration;

    fn summary() -> RunSummary {
        let jobs: Vec<_> = (0..3)
            .map(|i| {
                JobSpec::from_mapping(
                    TableMapping::new(
                        TableRef::new("s", format!("t{i}")),
                        TableRef::new("d", format!("t{i}")),
                    )
                    .with_columns([format!("C{i}")]),
                )
            })
            .collect();
        let now = Utc::now();
        let mut builder = RunSummaryBuilder::new(
            RunFilter {
                filter_date: Some("2024-06-30".into()),
                ..RunFilter::default()
            },
            &jobs,
            now,
        );
        for i in 0..3 {
            builder.started(i, now, None).unwrap();
        }
        builder
            .finished(
                0,
                JobOutcome::Failed {
                    message: "refused".into(),
                    category: ErrorCategory::Connectivity,
                },
                now,
            )
            .unwrap();
        builder
            .finished(2, JobOutcome::TimedOut { after: Duration::from_secs(60) }, now)
            .unwrap();
        // job 1 is left running and becomes ERROR on finish
        builder.finish(now)
    }

    #[test]
    fn test_default_predicate_selects_non_passing() {
        let summary = summary();
        let jobs = retry_jobs(&summary, needs_retry);
        let tables: Vec<_> = jobs.iter().map(|j| j.mapping.source.table.as_str()).collect();
        assert_eq!(tables, vec!["t0", "t1", "t2"]);
        assert_eq!(jobs[2].mapping.columns, vec!["C2"]);
    }

    #[test]
    fn test_custom_predicate() {
        let summary = summary();
        let jobs = retry_jobs(&summary, |r| r.status == JobStatus::Timeout);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].mapping.source.table, "t2");
    }

    #[test]
    fn test_retry_filter_links_runs() {
        let summary = summary();
        let filter = retry_filter(&summary);
        assert_eq!(filter.retry_of, Some(summary.run_id));
        assert_eq!(filter.filter_date.as_deref(), Some("2024-06-30"));
    }
}
