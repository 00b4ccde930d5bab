//! Schema differences between two sides of a table pair.

use crate::classify::Classification;
use crate::models::{ColumnSchema, SchemaChange, TableSchema};
use std::collections::HashMap;

/// A column present on both sides whose classes agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPair {
    pub source: ColumnSchema,
    pub destination: ColumnSchema,
    pub classification: Classification,
}

/// Schema changes plus the columns left to compare.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    /// Removed and retyped columns in source order, then added columns in
    /// destination order
    pub changes: Vec<SchemaChange>,
    /// Columns eligible for statistical comparison, in source order
    pub comparable: Vec<ColumnPair>,
}

impl SchemaDiff {
    /// True when a column was added, removed or retyped across classes.
    pub fn has_drift(&self) -> bool {
        self.changes.iter().any(SchemaChange::is_drift)
    }

    /// Keeps only comparable columns whose names appear in `columns`
    /// (case-insensitive). An empty filter keeps everything.
    ///
    /// Returns the filter entries that matched no comparable column.
    pub fn retain_columns(&mut self, columns: &[String]) -> Vec<String> {
        if columns.is_empty() {
            return Vec::new();
        }
        let wanted: Vec<String> = columns.iter().map(|c| c.trim().to_uppercase()).collect();
        let unmatched: Vec<String> = columns
            .iter()
            .zip(&wanted)
            .filter(|(_, key)| !self.comparable.iter().any(|p| p.source.match_key() == **key))
            .map(|(name, _)| name.clone())
            .collect();
        for name in &unmatched {
            tracing::warn!("Column filter entry '{}' matches no comparable column", name);
        }
        self.comparable
            .retain(|pair| wanted.contains(&pair.source.match_key()));
        unmatched
    }
}

/// Computes the schema diff between two tables.
///
/// Column names match case-insensitively. A column whose declared type
/// differs between sides is reported as `TypeChanged`; it stays comparable
/// when both types fall into the same class. Unsupported columns are
/// diffed like any other but never become comparable.
pub fn diff_schemas(source: &TableSchema, destination: &TableSchema) -> SchemaDiff {
    let destination_by_key: HashMap<String, &ColumnSchema> = destination
        .columns
        .iter()
        .map(|c| (c.match_key(), c))
        .collect();
    let source_keys: Vec<String> = source.columns.iter().map(ColumnSchema::match_key).collect();

    let mut diff = SchemaDiff::default();
    for (column, key) in source.columns.iter().zip(&source_keys) {
        let Some(other) = destination_by_key.get(key) else {
            diff.changes.push(SchemaChange::Removed {
                column: column.name.clone(),
                data_type: column.data_type.clone(),
            });
            continue;
        };

        let source_class = column.classification();
        let compatible = source_class == other.classification();
        if !column.data_type.trim().eq_ignore_ascii_case(other.data_type.trim()) {
            diff.changes.push(SchemaChange::TypeChanged {
                column: column.name.clone(),
                source_type: column.data_type.clone(),
                destination_type: other.data_type.clone(),
                compatible,
            });
        }
        if compatible && source_class.is_comparable() {
            diff.comparable.push(ColumnPair {
                source: column.clone(),
                destination: (*other).clone(),
                classification: source_class,
            });
        }
    }

    for column in &destination.columns {
        if !source_keys.contains(&column.match_key()) {
            diff.changes.push(SchemaChange::Added {
                column: column.name.clone(),
                data_type: column.data_type.clone(),
            });
        }
    }

    diff
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
    use crate::models::TableRef;

    fn schema(columns: &[(&str, &str)]) -> TableSchema {
        TableSchema {
            table: TableRef::new("main", "t"),
            columns: columns
                .iter()
                .zip(1..)
                .map(|((name, ty), pos)| ColumnSchema::new(*name, *ty, pos))
                .collect(),
        }
    }

    #[test]
    fn test_identical_schemas() {
        let s = schema(&[("ID", "INTEGER"), ("NAME", "TEXT")]);
        let diff = diff_schemas(&s, &s);
        assert!(diff.changes.is_empty());
        assert_eq!(diff.comparable.len(), 2);
        assert!(!diff.has_drift());
    }

    #[test]
    fn test_case_insensitive_matching() {
        let source = schema(&[("Customer_Id", "INTEGER")]);
        let destination = schema(&[("CUSTOMER_ID", "integer")]);
        let diff = diff_schemas(&source, &destination);
        assert!(diff.changes.is_empty());
        assert_eq!(diff.comparable[0].source.name, "Customer_Id");
        assert_eq!(diff.comparable[0].destination.name, "CUSTOMER_ID");
    }

    #[test]
    fn test_added_and_removed_columns() {
        let source = schema(&[("ID", "INTEGER"), ("LEGACY", "TEXT")]);
        let destination = schema(&[("ID", "INTEGER"), ("LOADED_AT", "TIMESTAMP")]);
        let diff = diff_schemas(&source, &destination);

        assert_eq!(
            diff.changes,
            vec![
                SchemaChange::Removed {
                    column: "LEGACY".to_string(),
                    data_type: "TEXT".to_string()
                },
                SchemaChange::Added {
                    column: "LOADED_AT".to_string(),
                    data_type: "TIMESTAMP".to_string()
                },
            ]
        );
        let compared: Vec<_> = diff.comparable.iter().map(|p| p.source.name.as_str()).collect();
        assert_eq!(compared, vec!["ID"]);
        assert!(diff.has_drift());
    }

    #[test]
    fn test_compatible_type_change_still_compared() {
        let source = schema(&[("AMOUNT", "DECIMAL(15,2)")]);
        let destination = schema(&[("AMOUNT", "DOUBLE")]);
        let diff = diff_schemas(&source, &destination);
        assert!(matches!(
            diff.changes[0],
            SchemaChange::TypeChanged { compatible: true, .. }
        ));
        assert_eq!(diff.comparable.len(), 1);
        assert!(!diff.has_drift());
    }

    #[test]
    fn test_incompatible_type_change_excluded() {
        let source = schema(&[("POSTED", "DATE")]);
        let destination = schema(&[("POSTED", "VARCHAR(10)")]);
        let diff = diff_schemas(&source, &destination);
        assert!(matches!(
            diff.changes[0],
            SchemaChange::TypeChanged { compatible: false, .. }
        ));
        assert!(diff.comparable.is_empty());
        assert!(diff.has_drift());
    }

    #[test]
    fn test_unsupported_columns_not_compared() {
        let s = schema(&[("PAYLOAD", "BLOB")]);
        let diff = diff_schemas(&s, &s);
        assert!(diff.changes.is_empty());
        assert!(diff.comparable.is_empty());
    }

    #[test]
    fn test_column_filter() {
        let s = schema(&[("ID", "INTEGER"), ("NAME", "TEXT"), ("CITY", "TEXT")]);
        let mut diff = diff_schemas(&s, &s);
        let unmatched = diff.retain_columns(&["name".to_string()]);
        assert!(unmatched.is_empty());
        assert_eq!(diff.comparable.len(), 1);
        assert_eq!(diff.comparable[0].source.name, "NAME");
    }

    #[test]
    fn test_column_filter_reports_unknown_names() {
        let s = schema(&[("ID", "INTEGER"), ("NAME", "TEXT"), ("BLOB_DATA", "BLOB")]);
        let mut diff = diff_schemas(&s, &s);
        let unmatched = diff.retain_columns(&[
            "id".to_string(),
            "missing".to_string(),
            "blob_data".to_string(),
        ]);
        assert_eq!(unmatched, vec!["missing".to_string(), "blob_data".to_string()]);
        assert_eq!(diff.comparable.len(), 1);
        assert_eq!(diff.comparable[0].source.name, "ID");
    }
}
