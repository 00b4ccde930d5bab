//! Threshold evaluation.
//!
//! Turns computed metrics into verdicts with a signed margin. A positive
//! margin is headroom left before the threshold; a negative margin is how
//! far past it the metric landed. SKIPPED and ERROR outcomes never count
//! towards the overall status.

use crate::config::ThresholdConfig;
use crate::models::{CheckResult, NullRateComparison, TestKind, TestResult, Verdict};
use crate::stats::{TestOutcome, TestRun};

/// Compares metrics against a threshold configuration.
#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    thresholds: ThresholdConfig,
}

impl ThresholdEvaluator {
    /// Creates an evaluator for the given thresholds.
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self { thresholds }
    }

    /// Thresholds in use.
    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Row-count check.
    ///
    /// The difference is taken as a percentage of the source count. An
    /// empty source counts as 0% against an empty destination and 100%
    /// otherwise.
    #[allow(clippy::cast_precision_loss)]
    pub fn row_count(&self, source_rows: u64, destination_rows: u64) -> CheckResult {
        let delta_pct = row_count_delta_pct(source_rows, destination_rows);
        at_most(delta_pct, self.thresholds.row_count_tolerance_pct)
    }

    /// Null-rate check from null percentages on each side.
    pub fn null_rate(&self, source_pct: f64, destination_pct: f64) -> NullRateComparison {
        let delta_pct = (destination_pct - source_pct).abs();
        NullRateComparison {
            source_pct,
            destination_pct,
            delta_pct,
            check: at_most(delta_pct, self.thresholds.null_rate_tolerance_pct),
        }
    }

    /// Threshold a test kind is evaluated against.
    pub fn threshold_for(&self, kind: TestKind) -> f64 {
        match kind {
            TestKind::Ks => self.thresholds.ks_test_pvalue,
            TestKind::TTest => self.thresholds.t_test_pvalue,
            TestKind::ChiSquare => self.thresholds.chi_square_pvalue,
            TestKind::Psi => self.thresholds.psi_threshold,
        }
    }

    /// Converts one test run into a reported result.
    ///
    /// p-value tests pass when `p >= threshold`. PSI passes when
    /// `psi <= threshold`; an infinite PSI fails.
    pub fn evaluate_test(&self, run: &TestRun) -> TestResult {
        let threshold = self.threshold_for(run.kind);
        let mut result = TestResult {
            kind: run.kind,
            statistic: None,
            value: None,
            degrees_of_freedom: None,
            verdict: Verdict::Skipped,
            threshold,
            margin: None,
            source_size: run.source_size,
            destination_size: run.destination_size,
            detail: None,
        };
        match &run.outcome {
            TestOutcome::Computed(stat) => {
                let check = match run.kind {
                    TestKind::Psi => at_most(stat.value, threshold),
                    TestKind::Ks | TestKind::TTest | TestKind::ChiSquare => {
                        at_least(stat.value, threshold)
                    }
                };
                result.statistic = Some(stat.statistic);
                result.value = Some(stat.value);
                result.degrees_of_freedom = stat.degrees_of_freedom;
                result.verdict = check.verdict;
                result.margin = Some(check.margin);
            }
            TestOutcome::Skipped { reason } => {
                result.detail = Some(reason.clone());
            }
            TestOutcome::Errored { message } => {
                result.verdict = Verdict::Error;
                result.detail = Some(message.clone());
            }
        }
        result
    }
}

/// Percentage difference between row counts relative to the source.
#[allow(clippy::cast_precision_loss)]
pub fn row_count_delta_pct(source_rows: u64, destination_rows: u64) -> f64 {
    if source_rows == 0 {
        return if destination_rows == 0 { 0.0 } else { 100.0 };
    }
    let delta = source_rows.abs_diff(destination_rows) as f64;
    delta / source_rows as f64 * 100.0
}

/// PASS when `actual <= threshold`.
pub fn at_most(actual: f64, threshold: f64) -> CheckResult {
    let verdict = if actual <= threshold {
        Verdict::Pass
    } else {
        Verdict::Fail
    };
    CheckResult {
        verdict,
        actual,
        threshold,
        margin: threshold - actual,
    }
}

/// PASS when `actual >= threshold`.
pub fn at_least(actual: f64, threshold: f64) -> CheckResult {
    let verdict = if actual >= threshold {
        Verdict::Pass
    } else {
        Verdict::Fail
    };
    CheckResult {
        verdict,
        actual,
        threshold,
        margin: actual - threshold,
    }
}

/// FAIL iff at least one executed check failed.
pub fn overall<I>(verdicts: I) -> Verdict
where
    I: IntoIterator<Item = Verdict>,
{
    if verdicts.into_iter().any(|v| v == Verdict::Fail) {
        Verdict::Fail
    } else {
        Verdict::Pass
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
    use crate::stats::TestStatistic;

    fn evaluator() -> ThresholdEvaluator {
        ThresholdEvaluator::new(ThresholdConfig::default())
    }

    #[test]
    fn test_row_count_within_tolerance() {
        let check = evaluator().row_count(100_000, 100_050);
        assert_eq!(check.verdict, Verdict::Pass);
        assert!((check.actual - 0.05).abs() < 1e-9);
        assert!((check.margin - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_row_count_over_tolerance() {
        let check = evaluator().row_count(100_000, 100_200);
        assert_eq!(check.verdict, Verdict::Fail);
        assert!((check.actual - 0.2).abs() < 1e-9);
        assert!(check.margin < 0.0);
    }

    #[test]
    fn test_row_count_empty_source() {
        assert_eq!(row_count_delta_pct(0, 0), 0.0);
        assert_eq!(row_count_delta_pct(0, 10), 100.0);
        assert_eq!(evaluator().row_count(0, 0).verdict, Verdict::Pass);
    }

    #[test]
    fn test_null_rate_check() {
        let comparison = evaluator().null_rate(1.0, 2.5);
        assert_eq!(comparison.check.verdict, Verdict::Pass);
        assert!((comparison.delta_pct - 1.5).abs() < 1e-12);
        assert_eq!(evaluator().null_rate(0.0, 5.0).check.verdict, Verdict::Fail);
    }

    #[test]
    fn test_evaluate_pvalue_boundary() {
        let run = TestRun {
            kind: TestKind::Ks,
            outcome: TestOutcome::Computed(TestStatistic {
                statistic: 0.1,
                value: 0.05,
                degrees_of_freedom: None,
            }),
            source_size: 100,
            destination_size: 100,
        };
        let result = evaluator().evaluate_test(&run);
        assert_eq!(result.verdict, Verdict::Pass);
        assert_eq!(result.margin, Some(0.0));
    }

    #[test]
    fn test_evaluate_infinite_psi_fails() {
        let run = TestRun {
            kind: TestKind::Psi,
            outcome: TestOutcome::Computed(TestStatistic {
                statistic: f64::INFINITY,
                value: f64::INFINITY,
                degrees_of_freedom: None,
            }),
            source_size: 10,
            destination_size: 0,
        };
        let result = evaluator().evaluate_test(&run);
        assert_eq!(result.verdict, Verdict::Fail);
        assert_eq!(result.threshold, 0.1);
    }

    #[test]
    fn test_evaluate_skipped_and_errored() {
        let skipped = TestRun {
            kind: TestKind::ChiSquare,
            outcome: TestOutcome::Skipped {
                reason: "cardinality 200 exceeds cap 100".to_string(),
            },
            source_size: 500,
            destination_size: 500,
        };
        let result = evaluator().evaluate_test(&skipped);
        assert_eq!(result.verdict, Verdict::Skipped);
        assert!(result.value.is_none());

        let errored = TestRun {
            outcome: TestOutcome::Errored {
                message: "3 non-null values are not numeric".to_string(),
            },
            ..skipped
        };
        assert_eq!(evaluator().evaluate_test(&errored).verdict, Verdict::Error);
    }

    #[test]
    fn test_overall_ignores_skipped() {
        assert_eq!(overall([Verdict::Pass, Verdict::Skipped, Verdict::Error]), Verdict::Pass);
        assert_eq!(overall([Verdict::Skipped, Verdict::Fail]), Verdict::Fail);
        assert_eq!(overall(std::iter::empty()), Verdict::Pass);
    }
}
