//! Column metrics computed from one sample.
//!
//! Every column gets [`BasicStats`] and, below the cardinality cap, its most
//! frequent values. Class-specific metrics are added on top:
//! - numerical columns: moments, quartiles and IQR outliers
//! - categorical columns: mode, entropy, rare values and string lengths
//! - temporal columns: range, weekday and hour histograms, date gaps
//! - boolean columns: true/false counts and ratio

use crate::classify::{Classification, normalize_type};
use crate::config::ProfileConfig;
use crate::models::{ColumnSchema, Sample};
use crate::stats::FrequencyTable;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Values beyond `OUTLIER_FENCE` IQRs outside the quartiles are outliers.
const OUTLIER_FENCE: f64 = 1.5;

/// Date gap detection runs only up to this many distinct dates.
const GAP_SCAN_LIMIT: usize = 5_000;

/// At most this many date gaps are reported.
const MAX_GAPS: usize = 10;

/// Counts shared by every column class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicStats {
    /// Sampled rows
    pub count: usize,
    pub null_count: usize,
    /// Null percentage in `[0, 100]`
    pub null_rate_pct: f64,
    pub distinct_count: usize,
    /// Distinct values per non-null value
    pub uniqueness: f64,
    /// Every sampled row holds a different non-null value
    pub is_unique: bool,
}

impl BasicStats {
    /// Computes the counts for a sample with a known distinct count.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_sample(sample: &Sample, distinct_count: usize) -> Self {
        let count = sample.len();
        let null_count = sample.null_count();
        let non_null = sample.non_null_count();
        let uniqueness = if non_null == 0 {
            0.0
        } else {
            distinct_count as f64 / non_null as f64
        };
        Self {
            count,
            null_count,
            null_rate_pct: sample.null_rate_pct(),
            distinct_count,
            uniqueness,
            is_unique: count > 0 && null_count == 0 && distinct_count == count,
        }
    }
}

/// One entry of a top-values list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueFrequency {
    pub value: String,
    pub count: u64,
    /// Share of non-null values, in percent
    pub pct: f64,
}

/// Summary statistics of a numerical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; needs two values
    pub std_dev: Option<f64>,
    pub variance: Option<f64>,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub sum: f64,
    pub zero_count: usize,
    pub negative_count: usize,
    pub outlier_count: usize,
    pub outlier_pct: f64,
    /// Biased sample skewness; needs three values and nonzero spread
    pub skewness: Option<f64>,
    /// Biased excess kurtosis; needs three values and nonzero spread
    pub kurtosis: Option<f64>,
}

impl NumericStats {
    /// Summarizes finite values; `None` for an empty slice.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len() as f64;
        let sum: f64 = sorted.iter().sum();
        let mean = sum / n;
        let central = |power: i32| sorted.iter().map(|v| (v - mean).powi(power)).sum::<f64>() / n;

        let variance = (sorted.len() > 1).then(|| {
            sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
        });
        let m2 = central(2);
        let (skewness, kurtosis) = if sorted.len() > 2 && m2 > 0.0 {
            (
                Some(central(3) / m2.powf(1.5)),
                Some(central(4) / (m2 * m2) - 3.0),
            )
        } else {
            (None, None)
        };

        let q1 = quantile(&sorted, 0.25)?;
        let median = quantile(&sorted, 0.5)?;
        let q3 = quantile(&sorted, 0.75)?;
        let iqr = q3 - q1;
        let outlier_count = if iqr > 0.0 {
            let lower = q1 - OUTLIER_FENCE * iqr;
            let upper = q3 + OUTLIER_FENCE * iqr;
            sorted.iter().filter(|v| **v < lower || **v > upper).count()
        } else {
            0
        };

        Some(Self {
            min: *sorted.first()?,
            max: *sorted.last()?,
            mean,
            median,
            std_dev: variance.map(|v| v.max(0.0).sqrt()),
            variance,
            q1,
            q3,
            iqr,
            sum,
            zero_count: sorted.iter().filter(|v| **v == 0.0).count(),
            negative_count: sorted.iter().filter(|v| **v < 0.0).count(),
            outlier_count,
            outlier_pct: outlier_count as f64 / n * 100.0,
            skewness,
            kurtosis,
        })
    }
}

/// Linear-interpolated quantile of sorted values.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let position = p.clamp(0.0, 1.0) * last as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let low = *sorted.get(lower)?;
    let high = *sorted.get(upper)?;
    Some(low + (high - low) * (position - position.floor()))
}

/// Summary of a categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalStats {
    pub mode: Option<String>,
    pub mode_frequency: u64,
    pub mode_pct: f64,
    /// Shannon entropy in bits; `None` above the cardinality cap
    pub entropy: Option<f64>,
    /// Values seen at most `rare_threshold` times; `None` above the cap
    pub rare_value_count: Option<usize>,
    pub rare_threshold: u64,
    pub min_length: usize,
    pub max_length: usize,
    pub avg_length: f64,
    pub empty_count: usize,
    pub whitespace_only_count: usize,
}

impl CategoricalStats {
    /// Summarizes a frequency table of non-null values.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_frequencies(frequencies: &FrequencyTable, max_cardinality: usize) -> Self {
        let total = frequencies.total();
        let within_cap = frequencies.cardinality() <= max_cardinality;
        let (mode, mode_frequency) = frequencies
            .most_common(1)
            .first()
            .map_or((None, 0), |(value, count)| (Some((*value).to_string()), *count));
        let pct = |count: u64| {
            if total == 0 {
                0.0
            } else {
                count as f64 / total as f64 * 100.0
            }
        };

        let entropy = (within_cap && total > 0).then(|| {
            -frequencies
                .iter()
                .map(|(_, count)| {
                    let p = count as f64 / total as f64;
                    p * p.log2()
                })
                .sum::<f64>()
        });

        // 0.1% of the non-null values, at least one occurrence
        let rare_threshold = total.checked_div(1_000).unwrap_or(0).max(1);
        let rare_value_count = within_cap.then(|| {
            frequencies
                .iter()
                .filter(|(_, count)| *count <= rare_threshold)
                .count()
        });

        let mut min_length = usize::MAX;
        let mut max_length = 0_usize;
        let mut length_sum = 0.0_f64;
        let mut empty_count = 0_u64;
        let mut whitespace_only_count = 0_u64;
        for (value, count) in frequencies.iter() {
            let length = value.chars().count();
            min_length = min_length.min(length);
            max_length = max_length.max(length);
            length_sum += length as f64 * count as f64;
            if value.is_empty() {
                empty_count = empty_count.saturating_add(count);
            }
            if value.trim().is_empty() {
                whitespace_only_count = whitespace_only_count.saturating_add(count);
            }
        }

        Self {
            mode,
            mode_frequency,
            mode_pct: pct(mode_frequency),
            entropy,
            rare_value_count,
            rare_threshold,
            min_length: if total == 0 { 0 } else { min_length },
            max_length,
            avg_length: if total == 0 { 0.0 } else { length_sum / total as f64 },
            empty_count: usize::try_from(empty_count).unwrap_or(usize::MAX),
            whitespace_only_count: usize::try_from(whitespace_only_count).unwrap_or(usize::MAX),
        }
    }
}

/// Rows falling on one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayCount {
    pub day: String,
    pub count: usize,
}

/// A run of calendar days with no values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateGap {
    /// Last date with data before the gap
    pub from: NaiveDate,
    /// First date with data after the gap
    pub to: NaiveDate,
    pub days: i64,
}

/// Summary of a temporal column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalStats {
    pub min: NaiveDateTime,
    pub max: NaiveDateTime,
    /// Lower median
    pub median: NaiveDateTime,
    pub span_days: i64,
    pub span_secs: i64,
    /// Values dated after the day the profile ran
    pub future_count: usize,
    /// Non-null values that did not parse as timestamps
    pub unparsed_count: usize,
    /// Monday first; days without values are omitted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weekday_counts: Vec<WeekdayCount>,
    /// Present only when values fall on more than one hour of the day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour_counts: Option<BTreeMap<u32, usize>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gaps: Vec<DateGap>,
}

impl TemporalStats {
    /// Summarizes a temporal sample; `None` when nothing parses.
    pub fn from_sample(sample: &Sample, max_cardinality: usize, now: NaiveDateTime) -> Option<Self> {
        let mut timestamps = sample.timestamps();
        if timestamps.is_empty() {
            return None;
        }
        timestamps.sort_unstable();
        let min = *timestamps.first()?;
        let max = *timestamps.last()?;
        let median = *timestamps.get(timestamps.len().saturating_sub(1) / 2)?;
        let span = max.signed_duration_since(min);
        let today = now.date();

        let distinct: BTreeSet<NaiveDateTime> = timestamps.iter().copied().collect();
        let weekday_counts = if distinct.len() <= max_cardinality {
            weekday_counts(&timestamps)
        } else {
            Vec::new()
        };

        let mut hours: BTreeMap<u32, usize> = BTreeMap::new();
        for ts in &timestamps {
            let count = hours.entry(ts.hour()).or_insert(0);
            *count = count.saturating_add(1);
        }

        let dates: BTreeSet<NaiveDate> = timestamps.iter().map(NaiveDateTime::date).collect();
        let gaps = if (2..=GAP_SCAN_LIMIT).contains(&dates.len()) {
            date_gaps(&dates)
        } else {
            Vec::new()
        };

        Some(Self {
            min,
            max,
            median,
            span_days: span.num_days(),
            span_secs: span.num_seconds(),
            future_count: timestamps.iter().filter(|ts| ts.date() > today).count(),
            unparsed_count: sample.non_null_count().saturating_sub(timestamps.len()),
            weekday_counts,
            hour_counts: (hours.len() > 1).then_some(hours),
            gaps,
        })
    }
}

fn weekday_counts(timestamps: &[NaiveDateTime]) -> Vec<WeekdayCount> {
    let mut counts = [0_usize; 7];
    for ts in timestamps {
        let index = ts.weekday().num_days_from_monday() as usize;
        if let Some(slot) = counts.get_mut(index) {
            *slot = slot.saturating_add(1);
        }
    }
    let days = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];
    days.iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(day, count)| WeekdayCount {
            day: day.to_string(),
            count,
        })
        .collect()
}

fn date_gaps(dates: &BTreeSet<NaiveDate>) -> Vec<DateGap> {
    let ordered: Vec<NaiveDate> = dates.iter().copied().collect();
    ordered
        .windows(2)
        .filter_map(|pair| match pair {
            [from, to] => {
                let days = to.signed_duration_since(*from).num_days();
                (days > 1).then_some(DateGap {
                    from: *from,
                    to: *to,
                    days,
                })
            }
            _ => None,
        })
        .take(MAX_GAPS)
        .collect()
}

/// True/false counts of a boolean column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanStats {
    pub true_count: usize,
    pub false_count: usize,
    /// Non-null values that are neither true nor false
    pub other_count: usize,
    /// Share of true among true and false values
    pub true_ratio: f64,
}

impl BooleanStats {
    /// Counts boolean spellings in a frequency table.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_frequencies(frequencies: &FrequencyTable) -> Self {
        let (mut true_count, mut false_count, mut other_count) = (0_u64, 0_u64, 0_u64);
        for (value, count) in frequencies.iter() {
            let slot = match value.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "y" | "yes" => &mut true_count,
                "false" | "f" | "0" | "n" | "no" => &mut false_count,
                _ => &mut other_count,
            };
            *slot = slot.saturating_add(count);
        }
        let decided = true_count.saturating_add(false_count);
        let as_usize = |count: u64| usize::try_from(count).unwrap_or(usize::MAX);
        Self {
            true_count: as_usize(true_count),
            false_count: as_usize(false_count),
            other_count: as_usize(other_count),
            true_ratio: if decided == 0 {
                0.0
            } else {
                true_count as f64 / decided as f64
            },
        }
    }
}

/// True for declared boolean types.
pub fn is_boolean_type(declared_type: &str) -> bool {
    matches!(normalize_type(declared_type).as_str(), "BOOL" | "BOOLEAN" | "BIT")
}

/// Profile of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub data_type: String,
    pub classification: Classification,
    pub basic: BasicStats,
    /// Most frequent non-null values; empty above the cardinality cap
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_values: Vec<ValueFrequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorical: Option<CategoricalStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<TemporalStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean: Option<BooleanStats>,
    /// Why class-specific metrics are missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Profiles one column sample.
///
/// `now` decides which temporal values count as future-dated.
#[allow(clippy::cast_precision_loss)]
pub fn profile_column(
    column: &ColumnSchema,
    sample: &Sample,
    config: &ProfileConfig,
    now: NaiveDateTime,
) -> ColumnProfile {
    let classification = column.classification();
    let frequencies = sample.frequencies();
    let basic = BasicStats::from_sample(sample, frequencies.cardinality());

    let top_values = if frequencies.cardinality() <= config.max_cardinality {
        let total = frequencies.total();
        frequencies
            .most_common(config.top_k)
            .into_iter()
            .map(|(value, count)| ValueFrequency {
                value: value.to_string(),
                count,
                pct: count as f64 / total as f64 * 100.0,
            })
            .collect()
    } else {
        Vec::new()
    };

    let mut profile = ColumnProfile {
        name: column.name.clone(),
        data_type: column.data_type.clone(),
        classification,
        basic,
        top_values,
        numeric: None,
        categorical: None,
        temporal: None,
        boolean: None,
        error: None,
    };

    match classification {
        Classification::Numerical => match sample.numeric_values() {
            Ok(values) => profile.numeric = NumericStats::from_values(&values),
            Err(e) => profile.error = Some(e.to_string()),
        },
        Classification::Categorical => {
            profile.categorical = Some(CategoricalStats::from_frequencies(
                &frequencies,
                config.max_cardinality,
            ));
        }
        Classification::Temporal => {
            profile.temporal = TemporalStats::from_sample(sample, config.max_cardinality, now);
        }
        Classification::Unsupported if is_boolean_type(&column.data_type) => {
            profile.boolean = Some(BooleanStats::from_frequencies(&frequencies));
        }
        Classification::Unsupported => {}
    }
    profile
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

    fn texts(values: &[Option<&str>]) -> Sample {
        Sample::new(
            values
                .iter()
                .map(|v| v.map_or(Value::Null, |s| Value::Text(s.to_string())))
                .collect(),
        )
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.0), Some(1.0));
        assert_eq!(quantile(&sorted, 0.5), Some(2.5));
        assert_eq!(quantile(&sorted, 1.0), Some(4.0));
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&[7.0], 0.25), Some(7.0));
    }

    #[test]
    fn test_numeric_stats() {
        let stats = NumericStats::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.median, 4.5);
        assert_eq!(stats.sum, 40.0);
        assert!((stats.variance.unwrap() - 32.0 / 7.0).abs() < 1e-12);
        assert_eq!(stats.zero_count, 0);
        // q1 = 4, q3 = 5.5, so only 9 sits beyond the upper fence
        assert_eq!(stats.outlier_count, 1);

        let single = NumericStats::from_values(&[3.0]).unwrap();
        assert_eq!(single.std_dev, None);
        assert_eq!(single.skewness, None);
        assert!(NumericStats::from_values(&[]).is_none());
    }

    #[test]
    fn test_numeric_outliers_and_signs() {
        let mut values: Vec<f64> = (1..=20).map(f64::from).collect();
        values.extend([0.0, -50.0, 500.0]);
        let stats = NumericStats::from_values(&values).unwrap();
        assert_eq!(stats.zero_count, 1);
        assert_eq!(stats.negative_count, 1);
        assert_eq!(stats.q1, 4.5);
        assert_eq!(stats.q3, 15.5);
        assert_eq!(stats.outlier_count, 2);
        assert!(stats.skewness.unwrap() > 0.0);
    }

    #[test]
    fn test_categorical_stats() {
        let frequencies = texts(&[Some("a"), Some("a"), Some("bb"), Some(""), Some(" "), None])
            .frequencies();
        let stats = CategoricalStats::from_frequencies(&frequencies, 100);
        assert_eq!(stats.mode.as_deref(), Some("a"));
        assert_eq!(stats.mode_frequency, 2);
        assert_eq!(stats.mode_pct, 40.0);
        assert_eq!(stats.min_length, 0);
        assert_eq!(stats.max_length, 2);
        assert_eq!(stats.empty_count, 1);
        assert_eq!(stats.whitespace_only_count, 2);
        assert_eq!(stats.rare_threshold, 1);
        assert_eq!(stats.rare_value_count, Some(3));
        assert!(stats.entropy.unwrap() > 0.0);

        let capped = CategoricalStats::from_frequencies(&frequencies, 2);
        assert_eq!(capped.entropy, None);
        assert_eq!(capped.rare_value_count, None);
    }

    #[test]
    fn test_uniform_entropy_is_log2_of_cardinality() {
        let frequencies = texts(&[Some("a"), Some("b"), Some("c"), Some("d")]).frequencies();
        let stats = CategoricalStats::from_frequencies(&frequencies, 100);
        assert!((stats.entropy.unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_temporal_stats() {
        let sample = texts(&[
            Some("2024-01-01 08:00:00"),
            Some("2024-01-02 09:30:00"),
            Some("2024-01-10 08:00:00"),
            Some("2024-07-04"),
            Some("not a date"),
            None,
        ]);
        let stats = TemporalStats::from_sample(&sample, 100, now()).unwrap();
        assert_eq!(stats.min.to_string(), "2024-01-01 08:00:00");
        assert_eq!(stats.max.to_string(), "2024-07-04 00:00:00");
        assert_eq!(stats.span_days, 184);
        assert_eq!(stats.future_count, 1);
        assert_eq!(stats.unparsed_count, 1);
        assert_eq!(stats.gaps.len(), 2);
        assert_eq!(stats.gaps[0].days, 8);
        assert_eq!(stats.weekday_counts[0].day, "Mon");
        assert_eq!(stats.weekday_counts[0].count, 1);
        assert_eq!(stats.hour_counts.as_ref().map(BTreeMap::len), Some(3));
    }

    #[test]
    fn test_temporal_stats_need_a_parseable_value() {
        let sample = texts(&[Some("soon"), None]);
        assert!(TemporalStats::from_sample(&sample, 100, now()).is_none());
    }

    #[test]
    fn test_boolean_stats() {
        let frequencies = texts(&[Some("1"), Some("true"), Some("0"), Some("maybe")]).frequencies();
        let stats = BooleanStats::from_frequencies(&frequencies);
        assert_eq!(stats.true_count, 2);
        assert_eq!(stats.false_count, 1);
        assert_eq!(stats.other_count, 1);
        assert!((stats.true_ratio - 2.0 / 3.0).abs() < 1e-12);
        assert!(is_boolean_type("boolean"));
        assert!(!is_boolean_type("BLOB"));
    }

    #[test]
    fn test_profile_column_reports_non_numeric_text() {
        let column = ColumnSchema::new("amount", "NUMERIC", 1);
        let sample = Sample::new(vec![
            Value::Number(1.0),
            Value::Text("n/a".to_string()),
            Value::Null,
        ]);
        let profile = profile_column(&column, &sample, &ProfileConfig::default(), now());
        assert_eq!(profile.basic.null_count, 1);
        assert_eq!(profile.basic.distinct_count, 2);
        assert!(profile.numeric.is_none());
        assert!(profile.error.unwrap().contains("not numeric"));
    }

    #[test]
    fn test_profile_column_top_values() {
        let column = ColumnSchema::new("region", "VARCHAR(10)", 1);
        let sample = texts(&[Some("EU"), Some("US"), Some("EU"), Some("APAC"), None]);
        let config = ProfileConfig::default().with_top_k(2);
        let profile = profile_column(&column, &sample, &config, now());
        assert_eq!(profile.top_values.len(), 2);
        assert_eq!(profile.top_values[0].value, "EU");
        assert_eq!(profile.top_values[0].count, 2);
        assert_eq!(profile.top_values[0].pct, 50.0);
        assert!(profile.categorical.is_some());
        assert!(!profile.basic.is_unique);

        let profile = profile_column(&column, &sample, &config.with_max_cardinality(2), now());
        assert!(profile.top_values.is_empty());
    }

    #[test]
    fn test_profile_column_json_skips_absent_sections() {
        let column = ColumnSchema::new("id", "INTEGER", 1);
        let profile = profile_column(&column, &numbers(&[1.0, 2.0, 3.0]), &ProfileConfig::default(), now());
        assert!(profile.basic.is_unique);
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("numeric").is_some());
        assert!(json.get("temporal").is_none());
        assert!(json.get("error").is_none());
        assert_eq!(json["classification"], "NUMERICAL");
    }
}
