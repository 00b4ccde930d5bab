//! Statistical tests over column samples.
//!
//! This module provides:
//! - Two-sample Kolmogorov-Smirnov and Student t tests for numerical columns
//! - Population Stability Index and chi-square homogeneity tests for
//!   categorical columns
//! - [`StatisticalTestRunner`], which picks the tests for a classification
//!   and reports each one as computed, skipped or errored
//!
//! Every computation is deterministic for a given pair of samples.

mod frequency;
mod hypothesis;
mod runner;
pub mod special;

pub use frequency::FrequencyTable;
pub use hypothesis::{
    PSI_EMPTY_BUCKET_SHARE, TestStatistic, chi_square, ks_two_sample, population_stability_index,
    t_test,
};
pub use runner::{StatisticalTestRunner, TestOutcome, TestRun};

use thiserror::Error;

/// Reasons a single statistical test could not produce a statistic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatError {
    #[error("insufficient data: need {required} non-null values per side, got {source_size} and {destination_size}")]
    InsufficientData {
        required: usize,
        source_size: usize,
        destination_size: usize,
    },

    #[error("cardinality {cardinality} exceeds cap {cap}")]
    CardinalityAboveCap { cardinality: usize, cap: usize },

    #[error("degenerate distribution: {0}")]
    DegenerateDistribution(String),

    #[error("{count} non-null values are not numeric")]
    NonNumeric { count: usize },

    #[error("sample contains NaN or infinite values")]
    NonFinite,
}

impl StatError {
    /// True when the test should be reported as SKIPPED rather than ERROR.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            StatError::InsufficientData { .. }
                | StatError::CardinalityAboveCap { .. }
                | StatError::DegenerateDistribution(_)
        )
    }
}
