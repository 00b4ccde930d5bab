//! Data structures shared by the comparator, the scheduler and reporting.
//!
//! Identifiers, schemas and samples are read from a data source. Comparison
//! results are assembled once per table pair and never mutated afterwards.

use crate::classify::{Classification, classify};
use crate::stats::{FrequencyTable, StatError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Schema-qualified table identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema (or attached database) name
    pub schema: String,
    /// Table name
    pub table: String,
}

impl TableRef {
    /// Creates a new table reference.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Parses `schema.table`. A bare name is placed in the `main` schema.
    pub fn parse(qualified: &str) -> Self {
        match qualified.split_once('.') {
            Some((schema, table)) => Self::new(schema.trim(), table.trim()),
            None => Self::new("main", qualified.trim()),
        }
    }

    /// Returns true when both parts are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.schema.trim().is_empty() && !self.table.trim().is_empty()
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Column definition as reported by a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name as stored on its side
    pub name: String,
    /// Declared type string, unnormalized
    pub data_type: String,
    /// 1-based position within the table
    pub ordinal_position: u32,
}

impl ColumnSchema {
    /// Creates a column definition.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, ordinal_position: u32) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            ordinal_position,
        }
    }

    /// Classification derived from the declared type.
    pub fn classification(&self) -> Classification {
        classify(&self.data_type)
    }

    /// Key used for case-insensitive matching across sides.
    pub fn match_key(&self) -> String {
        self.name.to_uppercase()
    }
}

/// Full column list for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: TableRef,
    pub columns: Vec<ColumnSchema>,
}

/// A single sampled value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Returns true for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Stable textual form used as a frequency-table key.
    pub fn category_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Number(n) => Some(n.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Timestamp(ts) => Some(ts.to_string()),
        }
    }

    /// Converts a JSON scalar into a value for a column of the given class.
    pub fn from_json(value: &serde_json::Value, classification: Classification) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            serde_json::Value::String(s) => Self::from_text(s, classification),
            serde_json::Value::Bool(b) => Value::Text(b.to_string()),
            other => Value::Text(other.to_string()),
        }
    }

    /// Interprets raw text according to a column classification.
    pub fn from_text(text: &str, classification: Classification) -> Self {
        match classification {
            Classification::Numerical => text
                .trim()
                .parse::<f64>()
                .map_or_else(|_| Value::Text(text.to_string()), Value::Number),
            Classification::Temporal => parse_timestamp(text)
                .map_or_else(|| Value::Text(text.to_string()), Value::Timestamp),
            Classification::Categorical | Classification::Unsupported => {
                Value::Text(text.to_string())
            }
        }
    }
}

/// Parses the timestamp layouts commonly produced by SQL engines.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for layout in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y%m%d%H%M%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(ts);
        }
    }
    for layout in ["%Y-%m-%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, layout) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Ordered values of one column, drawn from one side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub values: Vec<Value>,
}

impl Sample {
    /// Wraps a value list.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    pub fn non_null_count(&self) -> usize {
        self.len().saturating_sub(self.null_count())
    }

    /// Null percentage in `[0, 100]`; an empty sample has no nulls.
    #[allow(clippy::cast_precision_loss)]
    pub fn null_rate_pct(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.null_count() as f64 / self.len() as f64 * 100.0
    }

    /// Non-null values as finite floats.
    ///
    /// # Errors
    /// Returns [`StatError::NonNumeric`] when a non-null value cannot be read
    /// as a number and [`StatError::NonFinite`] for NaN or infinite values.
    pub fn numeric_values(&self) -> Result<Vec<f64>, StatError> {
        let mut numbers = Vec::with_capacity(self.values.len());
        let mut rejected = 0_usize;
        for value in &self.values {
            let number = match value {
                Value::Null => continue,
                Value::Number(n) => *n,
                Value::Text(s) => match s.trim().parse::<f64>() {
                    Ok(n) => n,
                    Err(_) => {
                        rejected = rejected.saturating_add(1);
                        continue;
                    }
                },
                Value::Timestamp(_) => {
                    rejected = rejected.saturating_add(1);
                    continue;
                }
            };
            if !number.is_finite() {
                return Err(StatError::NonFinite);
            }
            numbers.push(number);
        }
        if rejected > 0 {
            return Err(StatError::NonNumeric { count: rejected });
        }
        Ok(numbers)
    }

    /// Non-null values as timestamps, skipping anything unparseable.
    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.values
            .iter()
            .filter_map(|value| match value {
                Value::Timestamp(ts) => Some(*ts),
                Value::Text(s) => parse_timestamp(s),
                Value::Null | Value::Number(_) => None,
            })
            .collect()
    }

    /// Frequency table over non-null values.
    pub fn frequencies(&self) -> FrequencyTable {
        self.values.iter().filter_map(Value::category_key).collect()
    }

    /// Number of distinct non-null values.
    pub fn distinct_count(&self) -> usize {
        self.frequencies().cardinality()
    }
}

/// Samples for a set of columns of one table, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSample {
    /// Rows requested from the source
    pub requested: usize,
    pub columns: BTreeMap<String, Sample>,
}

impl TableSample {
    /// Sample for a column, falling back to an empty one.
    pub fn column(&self, name: &str) -> Sample {
        self.columns.get(name).cloned().unwrap_or_default()
    }
}

/// Outcome of one evaluated check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    /// Not executed; contributes nothing to the overall status
    Skipped,
    /// Computation failed; contributes nothing to the overall status
    Error,
}

impl Verdict {
    /// True for PASS and FAIL.
    pub fn is_executed(self) -> bool {
        matches!(self, Verdict::Pass | Verdict::Fail)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Skipped => "SKIPPED",
            Verdict::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// A metric compared against one threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub verdict: Verdict,
    /// Observed metric value
    pub actual: f64,
    /// Threshold the metric was compared against
    pub threshold: f64,
    /// Signed headroom; negative values mean the threshold was crossed
    pub margin: f64,
}

/// Statistical test kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Ks,
    TTest,
    ChiSquare,
    Psi,
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TestKind::Ks => "KS",
            TestKind::TTest => "T-TEST",
            TestKind::ChiSquare => "CHI-SQUARE",
            TestKind::Psi => "PSI",
        };
        f.write_str(label)
    }
}

/// Optional floats that keep infinities and NaN through JSON.
///
/// JSON has no representation for non-finite numbers and `serde_json`
/// writes them as `null`, which reads back as "not computed". They are
/// written as the strings `"inf"`, `"-inf"` and `"nan"` instead.
mod non_finite {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub(super) fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            None => serializer.serialize_none(),
            Some(v) if v.is_nan() => serializer.serialize_some("nan"),
            Some(v) if v.is_infinite() && v.is_sign_positive() => serializer.serialize_some("inf"),
            Some(v) if v.is_infinite() => serializer.serialize_some("-inf"),
            Some(v) => serializer.serialize_some(v),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Repr::Number(v)) => Ok(Some(v)),
            Some(Repr::Text(text)) => match text.as_str() {
                "inf" => Ok(Some(f64::INFINITY)),
                "-inf" => Ok(Some(f64::NEG_INFINITY)),
                "nan" => Ok(Some(f64::NAN)),
                other => Err(D::Error::custom(format!("invalid number '{other}'"))),
            },
        }
    }
}

/// Result of one statistical test on one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub kind: TestKind,
    /// Test statistic (D, t, chi-square or PSI)
    #[serde(default, with = "non_finite")]
    pub statistic: Option<f64>,
    /// p-value, or the PSI index for [`TestKind::Psi`]
    #[serde(default, with = "non_finite")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degrees_of_freedom: Option<f64>,
    pub verdict: Verdict,
    pub threshold: f64,
    #[serde(default, with = "non_finite")]
    pub margin: Option<f64>,
    pub source_size: usize,
    pub destination_size: usize,
    /// Skip reason or error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Null-rate comparison for one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NullRateComparison {
    pub source_pct: f64,
    pub destination_pct: f64,
    pub delta_pct: f64,
    pub check: CheckResult,
}

/// Min/max comparison for a temporal column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeComparison {
    pub source_min: Option<NaiveDateTime>,
    pub source_max: Option<NaiveDateTime>,
    pub destination_min: Option<NaiveDateTime>,
    pub destination_max: Option<NaiveDateTime>,
    /// Largest endpoint difference in seconds
    pub max_shift_secs: Option<i64>,
    pub verdict: Verdict,
    pub tolerance_secs: i64,
}

/// Comparison of one column present on both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnComparisonResult {
    pub name: String,
    pub classification: Classification,
    pub tests: Vec<TestResult>,
    pub null_rate: NullRateComparison,
    pub source_distinct: usize,
    pub destination_distinct: usize,
    /// destination minus source
    pub distinct_count_delta: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeComparison>,
    pub verdict: Verdict,
}

/// One schema difference between the two sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum SchemaChange {
    /// Present only in the destination
    Added { column: String, data_type: String },
    /// Present only in the source
    Removed { column: String, data_type: String },
    /// Present on both sides with different declared types
    TypeChanged {
        column: String,
        source_type: String,
        destination_type: String,
        /// Same classification on both sides, still compared
        compatible: bool,
    },
}

impl SchemaChange {
    /// Column name this change refers to.
    pub fn column(&self) -> &str {
        match self {
            SchemaChange::Added { column, .. }
            | SchemaChange::Removed { column, .. }
            | SchemaChange::TypeChanged { column, .. } => column,
        }
    }

    /// True when the change prevents the column from being compared.
    pub fn is_drift(&self) -> bool {
        match self {
            SchemaChange::Added { .. } | SchemaChange::Removed { .. } => true,
            SchemaChange::TypeChanged { compatible, .. } => !compatible,
        }
    }
}

/// Overall status of a table comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComparisonStatus {
    Pass,
    Fail,
}

/// Check counts across a whole table comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckTally {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl CheckTally {
    /// Adds one verdict to the tally.
    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Pass => self.passed = self.passed.saturating_add(1),
            Verdict::Fail => self.failed = self.failed.saturating_add(1),
            Verdict::Skipped => self.skipped = self.skipped.saturating_add(1),
            Verdict::Error => self.errored = self.errored.saturating_add(1),
        }
    }
}

/// Structured result of comparing one table pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableComparisonResult {
    pub source: TableRef,
    pub destination: TableRef,
    pub source_row_count: u64,
    pub destination_row_count: u64,
    /// destination minus source
    pub row_count_delta: i64,
    pub row_count_delta_pct: f64,
    pub row_count_check: CheckResult,
    pub schema_diff: Vec<SchemaChange>,
    pub schema_check: Verdict,
    pub source_sample_size: usize,
    pub destination_sample_size: usize,
    pub columns: Vec<ColumnComparisonResult>,
    pub checks: CheckTally,
    pub status: ComparisonStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl TableComparisonResult {
    /// Names of columns that failed at least one check.
    pub fn failed_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.verdict == Verdict::Fail)
            .map(|c| c.name.as_str())
            .collect()
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

    #[test]
    fn test_table_ref_parse() {
        assert_eq!(TableRef::parse("SAPISU.EABL"), TableRef::new("SAPISU", "EABL"));
        assert_eq!(TableRef::parse("orders"), TableRef::new("main", "orders"));
        assert!(!TableRef::new("", "orders").is_valid());
        assert_eq!(TableRef::new("s", "t").to_string(), "s.t");
    }

    #[test]
    fn test_sample_null_rate() {
        let sample = Sample::new(vec![Value::Number(1.0), Value::Null, Value::Null, Value::Number(4.0)]);
        assert_eq!(sample.null_count(), 2);
        assert_eq!(sample.non_null_count(), 2);
        assert!((sample.null_rate_pct() - 50.0).abs() < f64::EPSILON);
        assert_eq!(Sample::default().null_rate_pct(), 0.0);
    }

    #[test]
    fn test_numeric_values_reads_numeric_text() {
        let sample = Sample::new(vec![
            Value::Text("1.5".to_string()),
            Value::Number(2.0),
            Value::Null,
        ]);
        assert_eq!(sample.numeric_values().unwrap(), vec![1.5, 2.0]);
    }

    #[test]
    fn test_numeric_values_rejects_text() {
        let sample = Sample::new(vec![Value::Text("abc".to_string()), Value::Number(2.0)]);
        assert!(matches!(
            sample.numeric_values(),
            Err(StatError::NonNumeric { count: 1 })
        ));
    }

    #[test]
    fn test_numeric_values_rejects_nan() {
        let sample = Sample::new(vec![Value::Number(f64::NAN)]);
        assert!(matches!(sample.numeric_values(), Err(StatError::NonFinite)));
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(12, 30, 0))
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-01 12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T12:30:00Z"), Some(expected));
        assert_eq!(
            parse_timestamp("20240301"),
            NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn test_value_from_json() {
        let json = serde_json::json!("42");
        assert_eq!(
            Value::from_json(&json, Classification::Numerical),
            Value::Number(42.0)
        );
        assert_eq!(
            Value::from_json(&json, Classification::Categorical),
            Value::Text("42".to_string())
        );
        assert_eq!(
            Value::from_json(&serde_json::Value::Null, Classification::Numerical),
            Value::Null
        );
    }

    #[test]
    fn test_schema_change_drift() {
        let compatible = SchemaChange::TypeChanged {
            column: "AMOUNT".to_string(),
            source_type: "DECIMAL(10,2)".to_string(),
            destination_type: "DOUBLE".to_string(),
            compatible: true,
        };
        assert!(!compatible.is_drift());
        let added = SchemaChange::Added {
            column: "NEW_COL".to_string(),
            data_type: "TEXT".to_string(),
        };
        assert!(added.is_drift());
        assert_eq!(added.column(), "NEW_COL");
    }

    #[test]
    fn test_verdict_serialization() {
        assert_eq!(serde_json::to_string(&Verdict::Skipped).unwrap(), "\"SKIPPED\"");
        assert!(Verdict::Fail.is_executed());
        assert!(!Verdict::Error.is_executed());
    }

    #[test]
    fn test_check_tally_saturates() {
        let mut tally = CheckTally {
            passed: usize::MAX,
            ..CheckTally::default()
        };
        tally.record(Verdict::Pass);
        tally.record(Verdict::Error);
        assert_eq!(tally.passed, usize::MAX);
        assert_eq!(tally.errored, 1);
    }

    #[test]
    fn test_infinite_psi_survives_json() {
        let psi = TestResult {
            kind: TestKind::Psi,
            statistic: Some(f64::INFINITY),
            value: Some(f64::INFINITY),
            degrees_of_freedom: None,
            verdict: Verdict::Fail,
            threshold: 0.1,
            margin: Some(f64::NEG_INFINITY),
            source_size: 40,
            destination_size: 0,
            detail: None,
        };
        let json = serde_json::to_string(&psi).unwrap();
        assert!(json.contains("\"value\":\"inf\""));
        assert!(json.contains("\"margin\":\"-inf\""));

        let back: TestResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, psi);

        let skipped = TestResult {
            statistic: None,
            value: None,
            margin: None,
            verdict: Verdict::Skipped,
            ..psi
        };
        let back: TestResult = serde_json::from_str(&serde_json::to_string(&skipped).unwrap()).unwrap();
        assert_eq!(back.value, None);

        let bad = r#"{"kind":"psi","value":"huge","verdict":"FAIL","threshold":0.1,"source_size":1,"destination_size":1}"#;
        assert!(serde_json::from_str::<TestResult>(bad).is_err());
    }
}
