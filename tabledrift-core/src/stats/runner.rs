//! Test selection per column classification.

use super::{
    StatError, TestStatistic, chi_square, ks_two_sample, population_stability_index, t_test,
};
use crate::classify::Classification;
use crate::config::ComparisonConfig;
use crate::models::{Sample, TestKind};

/// Outcome of running one test.
#[derive(Debug, Clone, PartialEq)]
pub enum TestOutcome {
    Computed(TestStatistic),
    /// Not applicable to these samples
    Skipped { reason: String },
    /// The samples could not be processed
    Errored { message: String },
}

impl From<Result<TestStatistic, StatError>> for TestOutcome {
    fn from(result: Result<TestStatistic, StatError>) -> Self {
        match result {
            Ok(statistic) => TestOutcome::Computed(statistic),
            Err(e) if e.is_skip() => TestOutcome::Skipped {
                reason: e.to_string(),
            },
            Err(e) => TestOutcome::Errored {
                message: e.to_string(),
            },
        }
    }
}

/// One test applied to one column.
#[derive(Debug, Clone, PartialEq)]
pub struct TestRun {
    pub kind: TestKind,
    pub outcome: TestOutcome,
    /// Non-null values on the source side
    pub source_size: usize,
    /// Non-null values on the destination side
    pub destination_size: usize,
}

/// Runs the tests that apply to a column's classification.
///
/// Numerical columns get KS and t-test, categorical columns get PSI and,
/// below the cardinality cap, chi-square. Temporal and unsupported columns
/// get no statistical test. Each test is computed independently, so a
/// failure in one never prevents the others from reporting.
#[derive(Debug, Clone)]
pub struct StatisticalTestRunner {
    min_sample_size: usize,
    max_cardinality_for_chi_square: usize,
}

impl StatisticalTestRunner {
    /// Creates a runner from comparison settings.
    pub fn new(config: &ComparisonConfig) -> Self {
        Self {
            min_sample_size: config.sampling.min_sample_size.max(2),
            max_cardinality_for_chi_square: config.thresholds.max_cardinality_for_chi_square,
        }
    }

    /// Runs every applicable test for a column.
    pub fn run(
        &self,
        classification: Classification,
        source: &Sample,
        destination: &Sample,
    ) -> Vec<TestRun> {
        match classification {
            Classification::Numerical => self.run_numerical(source, destination),
            Classification::Categorical => self.run_categorical(source, destination),
            Classification::Temporal | Classification::Unsupported => Vec::new(),
        }
    }

    fn run_numerical(&self, source: &Sample, destination: &Sample) -> Vec<TestRun> {
        let source_size = source.non_null_count();
        let destination_size = destination.non_null_count();
        let run = |kind: TestKind, outcome: TestOutcome| TestRun {
            kind,
            outcome,
            source_size,
            destination_size,
        };

        let values = source
            .numeric_values()
            .and_then(|s| destination.numeric_values().map(|d| (s, d)));
        let (left, right) = match values {
            Ok(pair) => pair,
            Err(e) => {
                let outcome = TestOutcome::from(Err::<TestStatistic, _>(e));
                return vec![run(TestKind::Ks, outcome.clone()), run(TestKind::TTest, outcome)];
            }
        };

        if let Err(e) = self.require_min(source_size, destination_size) {
            let outcome = TestOutcome::from(Err::<TestStatistic, _>(e));
            return vec![run(TestKind::Ks, outcome.clone()), run(TestKind::TTest, outcome)];
        }

        vec![
            run(TestKind::Ks, ks_two_sample(&left, &right).into()),
            run(TestKind::TTest, t_test(&left, &right).into()),
        ]
    }

    fn run_categorical(&self, source: &Sample, destination: &Sample) -> Vec<TestRun> {
        let source_freq = source.frequencies();
        let destination_freq = destination.frequencies();
        let source_size = source.non_null_count();
        let destination_size = destination.non_null_count();

        let psi = TestRun {
            kind: TestKind::Psi,
            outcome: TestOutcome::Computed(population_stability_index(
                &source_freq,
                &destination_freq,
            )),
            source_size,
            destination_size,
        };

        let cardinality = source_freq.union_categories(&destination_freq).len();
        let chi = if cardinality > self.max_cardinality_for_chi_square {
            Err(StatError::CardinalityAboveCap {
                cardinality,
                cap: self.max_cardinality_for_chi_square,
            })
        } else {
            self.require_min(source_size, destination_size)
                .and_then(|()| chi_square(&source_freq, &destination_freq))
        };
        let chi = TestRun {
            kind: TestKind::ChiSquare,
            outcome: chi.into(),
            source_size,
            destination_size,
        };

        vec![psi, chi]
    }

    fn require_min(&self, source_size: usize, destination_size: usize) -> Result<(), StatError> {
        if source_size < self.min_sample_size || destination_size < self.min_sample_size {
            return Err(StatError::InsufficientData {
                required: self.min_sample_size,
                source_size,
                destination_size,
            });
        }
        Ok(())
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
    use crate::models::Value;

    fn numbers(values: &[f64]) -> Sample {
        Sample::new(values.iter().copied().map(Value::Number).collect())
    }

    fn texts(values: &[&str]) -> Sample {
        Sample::new(values.iter().map(|v| Value::Text((*v).to_string())).collect())
    }

    fn runner() -> StatisticalTestRunner {
        StatisticalTestRunner::new(&ComparisonConfig::default())
    }

    #[test]
    fn test_numerical_runs_ks_and_t_test() {
        let sample = numbers(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let runs = runner().run(Classification::Numerical, &sample, &sample);
        let kinds: Vec<_> = runs.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![TestKind::Ks, TestKind::TTest]);
        assert!(runs.iter().all(|r| matches!(r.outcome, TestOutcome::Computed(_))));
    }

    #[test]
    fn test_single_value_is_skipped() {
        let runs = runner().run(
            Classification::Numerical,
            &Sample::new(vec![Value::Number(1.0), Value::Null]),
            &numbers(&[1.0, 2.0, 3.0]),
        );
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| matches!(r.outcome, TestOutcome::Skipped { .. })));
    }

    #[test]
    fn test_non_numeric_values_error() {
        let runs = runner().run(
            Classification::Numerical,
            &texts(&["1", "two", "3"]),
            &numbers(&[1.0, 2.0, 3.0]),
        );
        assert!(runs.iter().all(|r| matches!(r.outcome, TestOutcome::Errored { .. })));
    }

    #[test]
    fn test_degenerate_t_test_does_not_block_ks() {
        let constant = numbers(&[7.0, 7.0, 7.0, 7.0]);
        let runs = runner().run(Classification::Numerical, &constant, &constant);
        assert!(matches!(runs[0].outcome, TestOutcome::Computed(_)));
        assert!(matches!(runs[1].outcome, TestOutcome::Skipped { .. }));
    }

    #[test]
    fn test_categorical_high_cardinality_skips_chi_square() {
        let labels: Vec<String> = (0..200).map(|i| format!("cat-{i}")).collect();
        let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        let sample = texts(&refs);
        let runs = runner().run(Classification::Categorical, &sample, &sample);

        assert_eq!(runs[0].kind, TestKind::Psi);
        match &runs[0].outcome {
            TestOutcome::Computed(stat) => assert_eq!(stat.value, 0.0),
            other => panic!("PSI not computed: {other:?}"),
        }
        assert_eq!(runs[1].kind, TestKind::ChiSquare);
        match &runs[1].outcome {
            TestOutcome::Skipped { reason } => assert!(reason.contains("200")),
            other => panic!("chi-square not skipped: {other:?}"),
        }
    }

    #[test]
    fn test_temporal_runs_no_tests() {
        let sample = texts(&["2024-01-01", "2024-01-02"]);
        assert!(runner().run(Classification::Temporal, &sample, &sample).is_empty());
        assert!(runner().run(Classification::Unsupported, &sample, &sample).is_empty());
    }

    #[test]
    fn test_runs_are_deterministic() {
        let source = numbers(&[0.3, 1.7, 2.2, 5.9, 3.1, 0.8]);
        let destination = numbers(&[0.4, 1.1, 2.9, 4.4, 3.3]);
        let first = runner().run(Classification::Numerical, &source, &destination);
        let second = runner().run(Classification::Numerical, &source, &destination);
        assert_eq!(first, second);
    }
}
