//! Comparison and scheduling configuration.
//!
//! Thresholds, sampling bounds and scheduler settings all carry defaults and
//! can be loaded from YAML or JSON files. A handful of environment variables
//! override file values so a single run can be tightened without editing the
//! shared configuration.

use crate::error::{DriftError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variables recognized by [`ComparisonConfig::apply_env_overrides`].
pub const ENV_OVERRIDES: [&str; 6] = [
    "ROW_COUNT_THRESHOLD_PCT",
    "KS_TEST_PVALUE",
    "PSI_THRESHOLD",
    "NULL_RATE_THRESHOLD_PCT",
    "SAMPLE_SIZE",
    "CHI_SQUARE_MAX_CARDINALITY",
];

/// Lowest accepted significance level.
pub const PVALUE_MIN: f64 = 0.0001;
/// Highest accepted significance level.
pub const PVALUE_MAX: f64 = 0.5;

/// Validation errors for comparison and scheduler configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigValidationError {
    #[error("{field} must be a finite, non-negative percentage, got {value}")]
    InvalidPercentage { field: &'static str, value: f64 },
    #[error("{field} must be between 0.0001 and 0.5, got {value}")]
    InvalidPValue { field: &'static str, value: f64 },
    #[error("psi_threshold must be finite and non-negative, got {0}")]
    InvalidPsiThreshold(f64),
    #[error("max_cardinality_for_chi_square must be at least 1")]
    InvalidCardinalityCap,
    #[error("min_sample_size ({min}) must be at least 2 and not above max_sample_size ({max})")]
    InvalidSampleBounds { min: usize, max: usize },
    #[error("range_tolerance_secs must be non-negative, got {0}")]
    InvalidRangeTolerance(i64),
    #[error("profile {field} must be at least 1")]
    InvalidProfileSetting { field: &'static str },
    #[error("job timeout must be greater than zero")]
    InvalidTimeout,
    #[error("environment variable {key} has invalid value '{value}'")]
    InvalidOverride { key: String, value: String },
}

impl From<ConfigValidationError> for DriftError {
    fn from(error: ConfigValidationError) -> Self {
        DriftError::configuration(error.to_string())
    }
}

/// Pass/fail thresholds for every check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Maximum row-count difference as a percentage of the source count
    pub row_count_tolerance_pct: f64,
    /// Minimum KS p-value
    pub ks_test_pvalue: f64,
    /// Minimum t-test p-value
    pub t_test_pvalue: f64,
    /// Minimum chi-square p-value
    pub chi_square_pvalue: f64,
    /// Maximum PSI
    pub psi_threshold: f64,
    /// Maximum absolute difference in null percentage
    pub null_rate_tolerance_pct: f64,
    /// Chi-square runs only up to this many distinct categories
    #[serde(alias = "max_cardinality_for_psi")]
    pub max_cardinality_for_chi_square: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            row_count_tolerance_pct: 0.1,
            ks_test_pvalue: 0.05,
            t_test_pvalue: 0.05,
            chi_square_pvalue: 0.05,
            psi_threshold: 0.1,
            null_rate_tolerance_pct: 2.0,
            max_cardinality_for_chi_square: 100,
        }
    }
}

impl ThresholdConfig {
    /// Creates thresholds with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the row-count tolerance.
    pub fn with_row_count_tolerance_pct(mut self, tolerance: f64) -> Self {
        if tolerance < 0.0 {
            tracing::warn!("row_count_tolerance_pct {} clamped to 0.0", tolerance);
        }
        self.row_count_tolerance_pct = tolerance.max(0.0);
        self
    }

    /// Builder method to set the KS significance level.
    pub fn with_ks_test_pvalue(mut self, pvalue: f64) -> Self {
        self.ks_test_pvalue = clamp_pvalue("ks_test_pvalue", pvalue);
        self
    }

    /// Builder method to set the t-test significance level.
    pub fn with_t_test_pvalue(mut self, pvalue: f64) -> Self {
        self.t_test_pvalue = clamp_pvalue("t_test_pvalue", pvalue);
        self
    }

    /// Builder method to set the chi-square significance level.
    pub fn with_chi_square_pvalue(mut self, pvalue: f64) -> Self {
        self.chi_square_pvalue = clamp_pvalue("chi_square_pvalue", pvalue);
        self
    }

    /// Builder method to set the PSI threshold.
    pub fn with_psi_threshold(mut self, threshold: f64) -> Self {
        if threshold < 0.0 {
            tracing::warn!("psi_threshold {} clamped to 0.0", threshold);
        }
        self.psi_threshold = threshold.max(0.0);
        self
    }

    /// Builder method to set the null-rate tolerance.
    pub fn with_null_rate_tolerance_pct(mut self, tolerance: f64) -> Self {
        if !(0.0..=100.0).contains(&tolerance) {
            tracing::warn!(
                "null_rate_tolerance_pct {} clamped to valid range [0.0, 100.0]",
                tolerance
            );
        }
        self.null_rate_tolerance_pct = tolerance.clamp(0.0, 100.0);
        self
    }

    /// Builder method to set the chi-square cardinality cap.
    pub fn with_max_cardinality_for_chi_square(mut self, cap: usize) -> Self {
        self.max_cardinality_for_chi_square = cap.max(1);
        self
    }

    /// Validates every threshold.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        for (field, value) in [
            ("row_count_tolerance_pct", self.row_count_tolerance_pct),
            ("null_rate_tolerance_pct", self.null_rate_tolerance_pct),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigValidationError::InvalidPercentage { field, value });
            }
        }
        for (field, value) in [
            ("ks_test_pvalue", self.ks_test_pvalue),
            ("t_test_pvalue", self.t_test_pvalue),
            ("chi_square_pvalue", self.chi_square_pvalue),
        ] {
            if !(PVALUE_MIN..=PVALUE_MAX).contains(&value) {
                return Err(ConfigValidationError::InvalidPValue { field, value });
            }
        }
        if !self.psi_threshold.is_finite() || self.psi_threshold < 0.0 {
            return Err(ConfigValidationError::InvalidPsiThreshold(self.psi_threshold));
        }
        if self.max_cardinality_for_chi_square == 0 {
            return Err(ConfigValidationError::InvalidCardinalityCap);
        }
        Ok(())
    }
}

fn clamp_pvalue(field: &str, pvalue: f64) -> f64 {
    if !(PVALUE_MIN..=PVALUE_MAX).contains(&pvalue) {
        tracing::warn!(
            "{} {} clamped to valid range [{}, {}]",
            field,
            pvalue,
            PVALUE_MIN,
            PVALUE_MAX
        );
    }
    if pvalue.is_nan() {
        return PVALUE_MAX;
    }
    pvalue.clamp(PVALUE_MIN, PVALUE_MAX)
}

/// Bounds on the samples drawn from each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Upper bound on rows drawn from either side
    pub max_sample_size: usize,
    /// Non-null values needed per side before KS, t-test or chi-square run
    pub min_sample_size: usize,
    /// Seed for sources that support reproducible sampling
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_sample_size: 50_000,
            min_sample_size: 2,
            seed: None,
        }
    }
}

impl SamplingConfig {
    /// Creates sampling bounds with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the sample cap.
    pub fn with_max_sample_size(mut self, max: usize) -> Self {
        self.max_sample_size = max.max(self.min_sample_size);
        self
    }

    /// Builder method to set the minimum sample size (at least 2).
    pub fn with_min_sample_size(mut self, min: usize) -> Self {
        if min < 2 {
            tracing::warn!("min_sample_size {} raised to 2", min);
        }
        self.min_sample_size = min.max(2);
        self
    }

    /// Builder method to set the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the sample bounds.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if self.min_sample_size < 2 || self.max_sample_size < self.min_sample_size {
            return Err(ConfigValidationError::InvalidSampleBounds {
                min: self.min_sample_size,
                max: self.max_sample_size,
            });
        }
        Ok(())
    }

    /// Rows to draw from each side.
    ///
    /// Both sides are sampled at the same fraction of their row counts, so
    /// a table twice the size contributes twice the rows, and neither side
    /// exceeds the cap.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn plan(&self, source_rows: u64, destination_rows: u64) -> (usize, usize) {
        let largest = source_rows.max(destination_rows);
        if largest == 0 {
            return (0, 0);
        }
        let cap = self.max_sample_size as f64;
        let fraction = (cap / largest as f64).min(1.0);
        let size = |rows: u64| ((rows as f64 * fraction).ceil() as usize).min(self.max_sample_size);
        (size(source_rows), size(destination_rows))
    }
}

/// Settings for temporal column range checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    /// Allowed shift of the min and max timestamps, in seconds
    pub range_tolerance_secs: i64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            range_tolerance_secs: 86_400,
        }
    }
}

/// Settings for single-table profiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Rows sampled per profiled table
    pub sample_size: usize,
    /// Most frequent values reported per column
    pub top_k: usize,
    /// Frequency detail (top values, entropy, rare values) is skipped above
    /// this many distinct values
    pub max_cardinality: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            sample_size: 50_000,
            top_k: 10,
            max_cardinality: 10_000,
        }
    }
}

impl ProfileConfig {
    /// Creates profiling settings with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the rows sampled per table.
    pub fn with_sample_size(mut self, rows: usize) -> Self {
        self.sample_size = rows;
        self
    }

    /// Builder method to set how many frequent values are reported.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Builder method to set the frequency-detail cardinality cap.
    pub fn with_max_cardinality(mut self, cap: usize) -> Self {
        self.max_cardinality = cap;
        self
    }

    /// Validates the profiling settings.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        for (field, value) in [
            ("sample_size", self.sample_size),
            ("top_k", self.top_k),
            ("max_cardinality", self.max_cardinality),
        ] {
            if value == 0 {
                return Err(ConfigValidationError::InvalidProfileSetting { field });
            }
        }
        Ok(())
    }
}

/// Complete configuration of a single table comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    pub thresholds: ThresholdConfig,
    pub sampling: SamplingConfig,
    pub temporal: TemporalConfig,
    /// Settings used by the `profile` operation
    pub profile: ProfileConfig,
    /// Added, removed or incompatibly retyped columns fail the table
    pub fail_on_schema_drift: bool,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdConfig::default(),
            sampling: SamplingConfig::default(),
            temporal: TemporalConfig::default(),
            profile: ProfileConfig::default(),
            fail_on_schema_drift: true,
        }
    }
}

impl ComparisonConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to replace the thresholds.
    pub fn with_thresholds(mut self, thresholds: ThresholdConfig) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Builder method to replace the sampling bounds.
    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    /// Builder method to set the temporal range tolerance.
    pub fn with_range_tolerance_secs(mut self, seconds: i64) -> Self {
        self.temporal.range_tolerance_secs = seconds.max(0);
        self
    }

    /// Builder method to toggle schema drift failures.
    pub fn with_fail_on_schema_drift(mut self, fail: bool) -> Self {
        self.fail_on_schema_drift = fail;
        self
    }

    /// Validates the complete configuration.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        self.thresholds.validate()?;
        self.sampling.validate()?;
        self.profile.validate()?;
        if self.temporal.range_tolerance_secs < 0 {
            return Err(ConfigValidationError::InvalidRangeTolerance(
                self.temporal.range_tolerance_secs,
            ));
        }
        Ok(())
    }

    /// Parses configuration from YAML.
    ///
    /// # Errors
    /// Returns a configuration error for malformed YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| DriftError::configuration(format!("Invalid YAML configuration: {e}")))
    }

    /// Loads configuration from a `.json`, `.yaml` or `.yml` file.
    ///
    /// The file is parsed but not validated; validation happens per job.
    ///
    /// # Errors
    /// Returns an I/O error when the file cannot be read and a configuration
    /// or serialization error when it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DriftError::io(format!("Failed to read config {}", path.display()), e))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&content).map_err(|e| {
                DriftError::serialization(format!("Failed to parse config {}", path.display()), e)
            })
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    /// Returns an error naming the variable when a value does not parse.
    pub fn apply_env_overrides(&mut self) -> std::result::Result<(), ConfigValidationError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns an error naming the key when a value does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> std::result::Result<(), ConfigValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in ENV_OVERRIDES {
            let Some(raw) = lookup(key) else {
                continue;
            };
            let invalid = || ConfigValidationError::InvalidOverride {
                key: key.to_string(),
                value: raw.clone(),
            };
            let trimmed = raw.trim();
            match key {
                "SAMPLE_SIZE" => {
                    self.sampling.max_sample_size = trimmed.parse().map_err(|_| invalid())?;
                }
                "CHI_SQUARE_MAX_CARDINALITY" => {
                    self.thresholds.max_cardinality_for_chi_square =
                        trimmed.parse().map_err(|_| invalid())?;
                }
                _ => {
                    let value: f64 = trimmed.parse().map_err(|_| invalid())?;
                    let slot = match key {
                        "ROW_COUNT_THRESHOLD_PCT" => &mut self.thresholds.row_count_tolerance_pct,
                        "KS_TEST_PVALUE" => &mut self.thresholds.ks_test_pvalue,
                        "PSI_THRESHOLD" => &mut self.thresholds.psi_threshold,
                        _ => &mut self.thresholds.null_rate_tolerance_pct,
                    };
                    *slot = value;
                }
            }
            tracing::debug!("Configuration override {}={}", key, trimmed);
        }
        Ok(())
    }
}

/// Bulk scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Jobs running at once. 1 runs strictly in submission order.
    pub concurrency: usize,
    /// Wall-clock limit for one job, in seconds
    pub job_timeout_secs: u64,
    /// Directory for per-job logs; no job logs when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            job_timeout_secs: 3600,
            log_dir: None,
        }
    }
}

impl SchedulerConfig {
    /// Creates scheduler settings with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of concurrent jobs.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1); // Ensure at least 1
        self
    }

    /// Sets the per-job timeout.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Sets the per-job log directory.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Per-job timeout as a duration.
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    /// Validates the scheduler settings.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if self.job_timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidTimeout);
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
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ComparisonConfig::default();
        assert_eq!(config.thresholds.row_count_tolerance_pct, 0.1);
        assert_eq!(config.thresholds.ks_test_pvalue, 0.05);
        assert_eq!(config.thresholds.psi_threshold, 0.1);
        assert_eq!(config.thresholds.null_rate_tolerance_pct, 2.0);
        assert_eq!(config.thresholds.max_cardinality_for_chi_square, 100);
        assert_eq!(config.sampling.max_sample_size, 50_000);
        assert!(config.validate().is_ok());

        let scheduler = SchedulerConfig::default();
        assert_eq!(scheduler.concurrency, 1);
        assert_eq!(scheduler.job_timeout(), Duration::from_secs(3600));
    }

    #[test]
    fn test_builder_clamping() {
        let thresholds = ThresholdConfig::new()
            .with_ks_test_pvalue(2.0)
            .with_null_rate_tolerance_pct(-5.0)
            .with_max_cardinality_for_chi_square(0);
        assert_eq!(thresholds.ks_test_pvalue, 0.5);
        assert_eq!(thresholds.null_rate_tolerance_pct, 0.0);
        assert_eq!(thresholds.max_cardinality_for_chi_square, 1);

        assert_eq!(SchedulerConfig::new().with_concurrency(0).concurrency, 1);
        assert_eq!(SamplingConfig::new().with_min_sample_size(0).min_sample_size, 2);
    }

    #[test]
    fn test_validation_rejects_bad_thresholds() {
        let mut config = ComparisonConfig::default();
        config.thresholds.ks_test_pvalue = 1.5;
        assert_eq!(
            config.validate(),
            Err(ConfigValidationError::InvalidPValue {
                field: "ks_test_pvalue",
                value: 1.5
            })
        );

        // Values the builders would clamp are rejected when set directly.
        let mut config = ComparisonConfig::default();
        config.thresholds.t_test_pvalue = 0.8;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidPValue { field: "t_test_pvalue", .. })
        ));
        let clamped = ThresholdConfig::new().with_t_test_pvalue(0.8);
        assert_eq!(clamped.t_test_pvalue, PVALUE_MAX);
        assert!(clamped.validate().is_ok());

        let config = ComparisonConfig::from_yaml("thresholds:\n  chi_square_pvalue: 0.8\n").unwrap();
        assert!(config.validate().is_err());

        let mut config = ComparisonConfig::default();
        config.thresholds.row_count_tolerance_pct = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = ComparisonConfig::default();
        config.sampling.min_sample_size = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidSampleBounds { .. })
        ));
    }

    #[test]
    fn test_from_yaml_partial() {
        let yaml = r"
thresholds:
  row_count_tolerance_pct: 0.5
  max_cardinality_for_psi: 40
sampling:
  max_sample_size: 1000
fail_on_schema_drift: false
";
        let config = ComparisonConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.thresholds.row_count_tolerance_pct, 0.5);
        assert_eq!(config.thresholds.max_cardinality_for_chi_square, 40);
        assert_eq!(config.thresholds.psi_threshold, 0.1);
        assert_eq!(config.sampling.max_sample_size, 1000);
        assert!(!config.fail_on_schema_drift);
    }

    #[test]
    fn test_profile_settings_from_yaml() {
        let yaml = r"
profile:
  top_k: 5
";
        let config = ComparisonConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.profile.top_k, 5);
        assert_eq!(config.profile.sample_size, 50_000);
        assert!(config.validate().is_ok());

        let config = ComparisonConfig::from_yaml("profile:\n  sample_size: 0\n").unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigValidationError::InvalidProfileSetting {
                field: "sample_size"
            })
        );
    }

    #[test]
    fn test_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.json");
        std::fs::write(&path, r#"{"thresholds": {"psi_threshold": 0.25}}"#).unwrap();
        let config = ComparisonConfig::load(&path).unwrap();
        assert_eq!(config.thresholds.psi_threshold, 0.25);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ROW_COUNT_THRESHOLD_PCT", "1.5"),
            ("SAMPLE_SIZE", "2000"),
            ("PSI_THRESHOLD", " 0.2 "),
        ]
        .into_iter()
        .collect();
        let mut config = ComparisonConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| (*v).to_string()))
            .unwrap();
        assert_eq!(config.thresholds.row_count_tolerance_pct, 1.5);
        assert_eq!(config.sampling.max_sample_size, 2000);
        assert_eq!(config.thresholds.psi_threshold, 0.2);
        assert_eq!(config.thresholds.ks_test_pvalue, 0.05);
    }

    #[test]
    fn test_invalid_override_names_key() {
        let mut config = ComparisonConfig::default();
        let err = config
            .apply_overrides(|key| (key == "KS_TEST_PVALUE").then(|| "abc".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("KS_TEST_PVALUE"));
    }

    #[test]
    fn test_sample_plan_is_proportional() {
        let sampling = SamplingConfig::default();
        assert_eq!(sampling.plan(100_000, 100_050), (49_976, 50_000));
        assert_eq!(sampling.plan(1_000, 2_000), (1_000, 2_000));
        assert_eq!(sampling.plan(200_000, 100_000), (50_000, 25_000));
        assert_eq!(sampling.plan(0, 0), (0, 0));
    }

    proptest! {
        #[test]
        fn prop_sample_plan_respects_cap(
            source in 0_u64..10_000_000,
            destination in 0_u64..10_000_000,
            cap in 2_usize..100_000,
        ) {
            let sampling = SamplingConfig { max_sample_size: cap, min_sample_size: 2, seed: None };
            let (s, d) = sampling.plan(source, destination);
            prop_assert!(s <= cap && d <= cap);
            prop_assert!(u64::try_from(s).unwrap() <= source);
            prop_assert!(u64::try_from(d).unwrap() <= destination);
        }

        #[test]
        fn prop_valid_pvalues_validate(p in 0.0001_f64..0.5) {
            let config = ComparisonConfig::new()
                .with_thresholds(ThresholdConfig::new().with_ks_test_pvalue(p));
            prop_assert!(config.validate().is_ok());
        }

        #[test]
        fn prop_clamped_pvalues_always_validate(p in -10.0_f64..10.0) {
            let thresholds = ThresholdConfig::new()
                .with_ks_test_pvalue(p)
                .with_t_test_pvalue(p)
                .with_chi_square_pvalue(p);
            prop_assert!(thresholds.validate().is_ok());
        }
    }
}
