//! Test statistics and p-values.

use super::special::{chi_square_sf, kolmogorov_sf, student_t_two_tailed};
use super::{FrequencyTable, StatError};
use serde::{Deserialize, Serialize};

/// Share substituted for a category observed on only one side.
pub const PSI_EMPTY_BUCKET_SHARE: f64 = 0.0001;

/// Raw output of one statistical test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestStatistic {
    /// D, t, chi-square or PSI
    pub statistic: f64,
    /// p-value, or the PSI index itself
    pub value: f64,
    pub degrees_of_freedom: Option<f64>,
}

fn require_pair(source: usize, destination: usize) -> Result<(), StatError> {
    if source < 2 || destination < 2 {
        return Err(StatError::InsufficientData {
            required: 2,
            source_size: source,
            destination_size: destination,
        });
    }
    Ok(())
}

/// Two-sample Kolmogorov-Smirnov test.
///
/// The p-value uses the asymptotic Kolmogorov distribution with Stephens'
/// small-sample correction on the effective sample size.
///
/// # Errors
/// Returns [`StatError::InsufficientData`] when either side has fewer than
/// two values.
#[allow(clippy::cast_precision_loss)]
pub fn ks_two_sample(source: &[f64], destination: &[f64]) -> Result<TestStatistic, StatError> {
    require_pair(source.len(), destination.len())?;

    let mut left = source.to_vec();
    let mut right = destination.to_vec();
    left.sort_by(f64::total_cmp);
    right.sort_by(f64::total_cmp);

    let n1 = left.len() as f64;
    let n2 = right.len() as f64;
    let (mut i, mut j) = (0_usize, 0_usize);
    let mut d = 0.0_f64;
    while i < left.len() && j < right.len() {
        let step = left[i].min(right[j]);
        while i < left.len() && left[i] <= step {
            i = i.saturating_add(1);
        }
        while j < right.len() && right[j] <= step {
            j = j.saturating_add(1);
        }
        d = d.max((i as f64 / n1 - j as f64 / n2).abs());
    }

    let effective = (n1 * n2 / (n1 + n2)).sqrt();
    let p_value = kolmogorov_sf((effective + 0.12 + 0.11 / effective) * d);
    Ok(TestStatistic {
        statistic: d,
        value: p_value,
        degrees_of_freedom: None,
    })
}

/// Student two-sample t test with pooled variance.
///
/// # Errors
/// Returns [`StatError::InsufficientData`] for fewer than two values per
/// side and [`StatError::DegenerateDistribution`] when both sides are
/// constant.
#[allow(clippy::cast_precision_loss)]
pub fn t_test(source: &[f64], destination: &[f64]) -> Result<TestStatistic, StatError> {
    require_pair(source.len(), destination.len())?;

    let (mean1, var1) = mean_and_variance(source);
    let (mean2, var2) = mean_and_variance(destination);
    let n1 = source.len() as f64;
    let n2 = destination.len() as f64;
    let dof = n1 + n2 - 2.0;

    let pooled = ((n1 - 1.0) * var1 + (n2 - 1.0) * var2) / dof;
    let standard_error = (pooled * (1.0 / n1 + 1.0 / n2)).sqrt();
    if standard_error <= 0.0 || !standard_error.is_finite() {
        return Err(StatError::DegenerateDistribution(
            "both samples have zero variance".to_string(),
        ));
    }

    let t = (mean1 - mean2) / standard_error;
    Ok(TestStatistic {
        statistic: t,
        value: student_t_two_tailed(t, dof),
        degrees_of_freedom: Some(dof),
    })
}

#[allow(clippy::cast_precision_loss)]
fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (mean, squares / (n - 1.0))
}

/// Chi-square homogeneity test on the 2 x k contingency table of both
/// frequency tables. Yates' continuity correction applies when there is
/// one degree of freedom.
///
/// # Errors
/// Returns [`StatError::InsufficientData`] when either side has fewer than
/// two observations.
#[allow(clippy::cast_precision_loss)]
pub fn chi_square(
    source: &FrequencyTable,
    destination: &FrequencyTable,
) -> Result<TestStatistic, StatError> {
    let source_total = usize::try_from(source.total()).unwrap_or(usize::MAX);
    let destination_total = usize::try_from(destination.total()).unwrap_or(usize::MAX);
    require_pair(source_total, destination_total)?;

    let categories = source.union_categories(destination);
    let dof = categories.len().saturating_sub(1) as f64;
    if dof == 0.0 {
        return Ok(TestStatistic {
            statistic: 0.0,
            value: 1.0,
            degrees_of_freedom: Some(0.0),
        });
    }

    let row_totals = [source.total() as f64, destination.total() as f64];
    let grand_total = row_totals[0] + row_totals[1];
    let mut statistic = 0.0;
    for category in categories {
        let observed = [
            source.count(category) as f64,
            destination.count(category) as f64,
        ];
        let column_total = observed[0] + observed[1];
        for (row, observed) in observed.iter().enumerate() {
            let expected = row_totals[row] * column_total / grand_total;
            let mut deviation = (observed - expected).abs();
            if dof == 1.0 {
                deviation -= deviation.min(0.5);
            }
            statistic += deviation * deviation / expected;
        }
    }

    Ok(TestStatistic {
        statistic,
        value: chi_square_sf(statistic, dof),
        degrees_of_freedom: Some(dof),
    })
}

/// Population Stability Index between two frequency tables.
///
/// `PSI = sum((dst% - src%) * ln(dst% / src%))` over the union of buckets.
/// A bucket missing on one side takes [`PSI_EMPTY_BUCKET_SHARE`]. An empty
/// side yields positive infinity. Identical tables yield exactly zero.
pub fn population_stability_index(
    source: &FrequencyTable,
    destination: &FrequencyTable,
) -> TestStatistic {
    let index = if source.is_empty() || destination.is_empty() {
        f64::INFINITY
    } else {
        source
            .union_categories(destination)
            .into_iter()
            .map(|category| {
                let expected = source.proportion(category).unwrap_or(PSI_EMPTY_BUCKET_SHARE);
                let actual = destination
                    .proportion(category)
                    .unwrap_or(PSI_EMPTY_BUCKET_SHARE);
                (actual - expected) * (actual / expected).ln()
            })
            .sum()
    };
    TestStatistic {
        statistic: index,
        value: index,
        degrees_of_freedom: None,
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

    fn table(pairs: &[(&str, usize)]) -> FrequencyTable {
        pairs
            .iter()
            .flat_map(|(k, n)| std::iter::repeat_n((*k).to_string(), *n))
            .collect()
    }

    #[test]
    fn test_ks_identical_samples() {
        let values: Vec<f64> = (0..100).map(f64::from).collect();
        let result = ks_two_sample(&values, &values).unwrap();
        assert_eq!(result.statistic, 0.0);
        assert_eq!(result.value, 1.0);
    }

    #[test]
    fn test_ks_disjoint_samples() {
        let left: Vec<f64> = (0..200).map(f64::from).collect();
        let right: Vec<f64> = (1000..1200).map(f64::from).collect();
        let result = ks_two_sample(&left, &right).unwrap();
        assert_eq!(result.statistic, 1.0);
        assert!(result.value < 1e-10);
    }

    #[test]
    fn test_ks_handles_ties() {
        let left = [1.0, 1.0, 2.0, 2.0];
        let right = [1.0, 2.0, 2.0, 2.0];
        let result = ks_two_sample(&left, &right).unwrap();
        assert!((result.statistic - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_ks_insufficient_data() {
        assert!(matches!(
            ks_two_sample(&[1.0], &[1.0, 2.0]),
            Err(StatError::InsufficientData { source_size: 1, .. })
        ));
    }

    #[test]
    fn test_t_test_known_value() {
        // scipy.stats.ttest_ind([1,2,3,4,5], [2,3,4,5,6]) -> t=-1.0, p=0.3466
        let result = t_test(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert!((result.statistic + 1.0).abs() < 1e-12);
        assert!((result.value - 0.346_593_507_087_4).abs() < 1e-8);
        assert_eq!(result.degrees_of_freedom, Some(8.0));
    }

    #[test]
    fn test_t_test_constant_samples_degenerate() {
        let err = t_test(&[3.0, 3.0, 3.0], &[3.0, 3.0]).unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn test_chi_square_known_value() {
        // scipy.stats.chi2_contingency([[10,20,30],[20,20,20]]) -> chi2=5.3333, p=0.0695
        let source = table(&[("a", 10), ("b", 20), ("c", 30)]);
        let destination = table(&[("a", 20), ("b", 20), ("c", 20)]);
        let result = chi_square(&source, &destination).unwrap();
        assert!((result.statistic - 16.0 / 3.0).abs() < 1e-9);
        assert!((result.value - 0.069_483_451_222_6).abs() < 1e-8);
        assert_eq!(result.degrees_of_freedom, Some(2.0));
    }

    #[test]
    fn test_chi_square_yates_correction() {
        // scipy.stats.chi2_contingency([[10,20],[20,10]]) -> chi2=5.4, p=0.0201
        let source = table(&[("x", 10), ("y", 20)]);
        let destination = table(&[("x", 20), ("y", 10)]);
        let result = chi_square(&source, &destination).unwrap();
        assert!((result.statistic - 5.4).abs() < 1e-9);
        assert!((result.value - 0.020_136_752_250_3).abs() < 1e-8);
    }

    #[test]
    fn test_chi_square_single_category() {
        let source = table(&[("only", 5)]);
        let destination = table(&[("only", 7)]);
        let result = chi_square(&source, &destination).unwrap();
        assert_eq!(result.value, 1.0);
    }

    #[test]
    fn test_psi_identical_tables_is_zero() {
        let source = table(&[("A", 3), ("B", 5), ("C", 7)]);
        let destination = table(&[("A", 6), ("B", 10), ("C", 14)]);
        assert_eq!(population_stability_index(&source, &destination).value, 0.0);
    }

    #[test]
    fn test_psi_missing_bucket_uses_floor() {
        let source = table(&[("A", 1), ("B", 1)]);
        let destination = table(&[("A", 1)]);
        let psi = population_stability_index(&source, &destination).value;
        let expected = (1.0 - 0.5) * (1.0_f64 / 0.5).ln()
            + (PSI_EMPTY_BUCKET_SHARE - 0.5) * (PSI_EMPTY_BUCKET_SHARE / 0.5).ln();
        assert!((psi - expected).abs() < 1e-12);
    }

    #[test]
    fn test_psi_empty_side_is_infinite() {
        let source = table(&[("A", 4)]);
        let psi = population_stability_index(&source, &FrequencyTable::new());
        assert!(psi.value.is_infinite());
    }
}
