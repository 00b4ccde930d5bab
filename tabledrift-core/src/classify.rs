//! Declared column type to comparison class mapping.
//!
//! Type strings arrive in whatever dialect the data source speaks: SAP HANA
//! (`NVARCHAR(40)`, `SECONDDATE`), PostgreSQL (`character varying`,
//! `timestamp(6) with time zone`), SQLite affinity names, or Arrow-style
//! names from file snapshots (`timestamp[us]`, `decimal128(18, 2)`).
//!
//! Normalization uppercases the string, strips every parenthesized or
//! bracketed parameter list and the `UNSIGNED`/`SIGNED` modifiers, and
//! collapses whitespace. The normalized base name is then looked up in a
//! fixed table. Anything not in the table is [`Classification::Unsupported`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    /// Integers, floating point and fixed-point decimals
    Numerical,
    /// Fixed or variable length text
    Categorical,
    /// Dates and timestamps
    Temporal,
    /// Binary, nested, boolean and unknown types
    Unsupported,
}

impl Classification {
    /// True for classes that take part in column comparison.
    pub fn is_comparable(self) -> bool {
        !matches!(self, Classification::Unsupported)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Classification::Numerical => "NUMERICAL",
            Classification::Categorical => "CATEGORICAL",
            Classification::Temporal => "TEMPORAL",
            Classification::Unsupported => "UNSUPPORTED",
        };
        f.write_str(label)
    }
}

/// Classifies a declared type string.
///
/// # Arguments
/// * `declared_type` - Type as reported by the data source (case-insensitive)
///
/// # Example
/// ```rust
/// use tabledrift_core::classify::{Classification, classify};
///
/// assert_eq!(classify("DECIMAL(15,2)"), Classification::Numerical);
/// assert_eq!(classify("nvarchar(40)"), Classification::Categorical);
/// assert_eq!(classify("TIMESTAMP(6) WITH TIME ZONE"), Classification::Temporal);
/// assert_eq!(classify("VARBINARY"), Classification::Unsupported);
/// ```
pub fn classify(declared_type: &str) -> Classification {
    match normalize_type(declared_type).as_str() {
        // Integers
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" | "INT2" | "INT4"
        | "INT8" | "INT16" | "INT32" | "INT64" | "UINT8" | "UINT16" | "UINT32" | "UINT64"
        | "SMALLSERIAL" | "SERIAL" | "BIGSERIAL" | "SERIAL4" | "SERIAL8" | "LONG" | "SHORT" => {
            Classification::Numerical
        }
        // Floating point
        "REAL" | "FLOAT" | "FLOAT4" | "FLOAT8" | "FLOAT16" | "FLOAT32" | "FLOAT64" | "DOUBLE"
        | "DOUBLE PRECISION" | "BINARY_FLOAT" | "BINARY_DOUBLE" | "HALF_FLOAT" => {
            Classification::Numerical
        }
        // Fixed point
        "DECIMAL" | "DEC" | "NUMERIC" | "NUMBER" | "SMALLDECIMAL" | "DECIMAL128" | "DECIMAL256"
        | "MONEY" | "SMALLMONEY" => Classification::Numerical,

        "CHAR" | "CHARACTER" | "NCHAR" | "BPCHAR" | "VARCHAR" | "VARCHAR2" | "NVARCHAR"
        | "NVARCHAR2" | "CHARACTER VARYING" | "NATIONAL CHARACTER VARYING" | "ALPHANUM"
        | "SHORTTEXT" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "NTEXT" | "CLOB"
        | "NCLOB" | "STRING" | "LARGE_STRING" | "UTF8" | "LARGE_UTF8" | "CITEXT" => {
            Classification::Categorical
        }

        "DATE" | "DATE32" | "DATE64" | "DATETIME" | "DATETIME2" | "SMALLDATETIME"
        | "DATETIMEOFFSET" | "SECONDDATE" | "TIMESTAMP" | "TIMESTAMPTZ" | "TIMESTAMP_NTZ"
        | "TIMESTAMP_LTZ" | "TIMESTAMP_TZ" | "TIMESTAMP WITH TIME ZONE"
        | "TIMESTAMP WITHOUT TIME ZONE" | "TIMESTAMP WITH LOCAL TIME ZONE" => {
            Classification::Temporal
        }

        _ => Classification::Unsupported,
    }
}

/// Reduces a declared type to its base name.
pub fn normalize_type(declared_type: &str) -> String {
    let mut base = String::with_capacity(declared_type.len());
    let mut depth = 0_usize;
    for ch in declared_type.chars() {
        match ch {
            '(' | '[' | '<' => depth = depth.saturating_add(1),
            ')' | ']' | '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => base.push(ch),
            _ => {}
        }
    }

    base.to_uppercase()
        .split_whitespace()
        .filter(|word| !matches!(*word, "UNSIGNED" | "SIGNED" | "ZEROFILL"))
        .collect::<Vec<_>>()
        .join(" ")
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
    fn test_normalize_type() {
        assert_eq!(normalize_type("decimal(10, 2)"), "DECIMAL");
        assert_eq!(normalize_type("timestamp(6) with time zone"), "TIMESTAMP WITH TIME ZONE");
        assert_eq!(normalize_type("timestamp[us, tz=UTC]"), "TIMESTAMP");
        assert_eq!(normalize_type("  INT  UNSIGNED "), "INT");
        assert_eq!(normalize_type("list<item: int64>"), "LIST");
    }

    #[test]
    fn test_numerical_types() {
        for declared in ["INTEGER", "bigint", "DECIMAL(15,2)", "double precision", "FLOAT8", "NUMBER", "int64", "smalldecimal"] {
            assert_eq!(classify(declared), Classification::Numerical, "{declared}");
        }
    }

    #[test]
    fn test_categorical_types() {
        for declared in ["VARCHAR(255)", "nvarchar(40)", "character varying", "TEXT", "ALPHANUM(10)", "string", "CLOB"] {
            assert_eq!(classify(declared), Classification::Categorical, "{declared}");
        }
    }

    #[test]
    fn test_temporal_types() {
        for declared in ["DATE", "timestamp", "TIMESTAMP(6) WITH TIME ZONE", "SECONDDATE", "datetime2(7)", "timestamp[ns]", "date32[day]"] {
            assert_eq!(classify(declared), Classification::Temporal, "{declared}");
        }
    }

    #[test]
    fn test_unsupported_types() {
        for declared in ["BLOB", "VARBINARY(16)", "BOOLEAN", "JSON", "struct<a: int>", "TIME", "", "GEOMETRY"] {
            assert_eq!(classify(declared), Classification::Unsupported, "{declared}");
        }
        assert!(!Classification::Unsupported.is_comparable());
    }

    #[test]
    fn test_classification_is_pure() {
        assert_eq!(classify("Varchar(10)"), classify("VARCHAR(10)"));
    }
}
