//! Category frequency tables.

use std::collections::{BTreeMap, BTreeSet};

/// Counts of each distinct category, kept in sorted key order so every
/// computation over a table visits buckets in the same sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: BTreeMap<String, u64>,
    total: u64,
}

impl FrequencyTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one observation.
    pub fn add(&mut self, category: impl Into<String>) {
        let count = self.counts.entry(category.into()).or_insert(0);
        *count = count.saturating_add(1);
        self.total = self.total.saturating_add(1);
    }

    /// Total observations.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of distinct categories.
    pub fn cardinality(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Count for a category, zero when absent.
    pub fn count(&self, category: &str) -> u64 {
        self.counts.get(category).copied().unwrap_or(0)
    }

    /// Share of observations in a category, `None` when absent.
    #[allow(clippy::cast_precision_loss)]
    pub fn proportion(&self, category: &str) -> Option<f64> {
        self.counts
            .get(category)
            .map(|count| *count as f64 / self.total as f64)
    }

    /// Categories and counts in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(key, count)| (key.as_str(), *count))
    }

    /// The `k` most frequent categories, highest count first.
    ///
    /// Ties are broken by key so the ranking is stable.
    pub fn most_common(&self, k: usize) -> Vec<(&str, u64)> {
        let mut items: Vec<(&str, u64)> = self.iter().collect();
        items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        items.truncate(k);
        items
    }

    /// Sorted union of categories from both tables.
    pub fn union_categories<'a>(&'a self, other: &'a Self) -> BTreeSet<&'a str> {
        self.counts
            .keys()
            .chain(other.counts.keys())
            .map(String::as_str)
            .collect()
    }
}

impl FromIterator<String> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut table = Self::new();
        for category in iter {
            table.add(category);
        }
        table
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

    fn table(values: &[&str]) -> FrequencyTable {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn test_counts_and_proportions() {
        let t = table(&["A", "B", "A", "C"]);
        assert_eq!(t.total(), 4);
        assert_eq!(t.cardinality(), 3);
        assert_eq!(t.count("A"), 2);
        assert_eq!(t.count("Z"), 0);
        assert_eq!(t.proportion("A"), Some(0.5));
        assert_eq!(t.proportion("Z"), None);
    }

    #[test]
    fn test_union_categories_sorted() {
        let left = table(&["B", "A"]);
        let right = table(&["C", "A"]);
        let union: Vec<_> = left.union_categories(&right).into_iter().collect();
        assert_eq!(union, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_most_common_breaks_ties_by_key() {
        let t = table(&["B", "C", "A", "C", "B", "D"]);
        assert_eq!(t.most_common(3), vec![("B", 2), ("C", 2), ("A", 1)]);
        assert_eq!(t.most_common(0), Vec::<(&str, u64)>::new());
        assert_eq!(t.most_common(10).len(), 4);
    }
}
