//! Outlier-resistant statistics for per-cycle SIMS data.
//!
//! Cycles are pruned with a skew-adjusted boxplot (Hubert & Vandervieren 2008): the
//! fences are widened on the long tail of the distribution according to the medcouple,
//! a robust measure of skewness. How many cycles may be pruned at most is decided by
//! [`outliers_to_remove`] from the number of cycles in the spot.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Binomial, DiscreteCDF};
use statrs::statistics::Statistics;

use crate::chemistry::constants::{FENCE_EXPONENTS_NEGATIVE_SKEW, FENCE_EXPONENTS_POSITIVE_SKEW, FENCE_SCALE};
use crate::error::{Result, SimsError};

/// Outcome of [`resistant_mean_and_error`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResistantEstimate {
    pub mean: f64,
    /// Population standard deviation of the retained values.
    pub std_dev: f64,
    pub n_used: usize,
    pub removed_values: Vec<f64>,
    /// Positions of the removed values in the input series.
    pub removed_indices: Vec<usize>,
    /// (lower, upper) fence used for pruning.
    pub fences: (f64, f64),
}

impl ResistantEstimate {
    pub fn std_error(&self) -> f64 {
        self.std_dev / (self.n_used as f64).sqrt()
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// median of an ascending, non-empty slice
pub(crate) fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Percentile of an ascending, non-empty slice, interpolated as the midpoint of the
/// two neighbouring order statistics.
pub(crate) fn percentile_midpoint(sorted: &[f64], q: f64) -> f64 {
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    (sorted[position.floor() as usize] + sorted[position.ceil() as usize]) / 2.0
}

/// Kernel value for a pair tied at the median.
///
/// `row` indexes the tied upper half, `col` the tied lower half, both counted from zero
/// within the block of `ties` tied values.
fn tie_kernel(row: usize, col: usize, ties: usize) -> f64 {
    let flipped = ties - 1 - col;
    match flipped.cmp(&row) {
        std::cmp::Ordering::Equal => 0.0,
        std::cmp::Ordering::Greater => -1.0,
        std::cmp::Ordering::Less => 1.0,
    }
}

fn medcouple_sorted(sorted: &[f64]) -> f64 {
    let median = median_sorted(sorted);
    let centred: Vec<f64> = sorted.iter().map(|v| v - median).collect();

    // both halves ascending; values equal to the median sit in both
    let lower: Vec<f64> = centred.iter().copied().filter(|&v| v <= 0.0).collect();
    let upper: Vec<f64> = centred.iter().copied().filter(|&v| v >= 0.0).collect();
    let ties = lower.iter().filter(|&&v| v == 0.0).count();
    let first_tied_col = lower.len() - ties;

    let mut kernel = Vec::with_capacity(lower.len() * upper.len());
    for (i, &u) in upper.iter().enumerate() {
        for (j, &l) in lower.iter().enumerate() {
            let h = if u == 0.0 && l == 0.0 {
                tie_kernel(i, j - first_tied_col, ties)
            } else {
                (u + l) / (u - l)
            };
            kernel.push(h);
        }
    }

    kernel.sort_by(f64::total_cmp);
    median_sorted(&kernel)
}

/// Computes the medcouple of a sample, a robust skewness statistic in [-1, 1].
///
/// # Examples
///
/// ```
/// use simscore::algorithm::robust::medcouple;
///
/// let mc = medcouple(&[0.0, 1.0, 2.0, 5.0, 9.0, 20.0]).unwrap();
/// assert!((mc - 0.375).abs() < 1e-12);
/// ```
pub fn medcouple(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(SimsError::input("no data"));
    }
    Ok(medcouple_sorted(&sorted(values)))
}

/// Computes the outlier-resistant mean and spread of a series.
///
/// Values outside the skew-adjusted fences are dropped, but only if at most
/// `max_outliers` of them fall outside; otherwise the full series is used and nothing is
/// reported as removed.
///
/// Arguments:
///
/// * `values` - per-cycle values
/// * `max_outliers` - largest number of values the caller allows to be dropped
///
/// Returns:
///
/// * `ResistantEstimate` - mean, population standard deviation, number of values used,
///   the dropped values and their positions, and the fences
pub fn resistant_mean_and_error(values: &[f64], max_outliers: usize) -> Result<ResistantEstimate> {
    if values.is_empty() {
        return Err(SimsError::input("no data"));
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(SimsError::input(format!("non-finite value {bad} in series")));
    }

    if values.len() == 1 {
        return Ok(ResistantEstimate {
            mean: values[0],
            std_dev: 0.0,
            n_used: 1,
            removed_values: Vec::new(),
            removed_indices: Vec::new(),
            fences: (values[0], values[0]),
        });
    }

    let ascending = sorted(values);
    let mc = medcouple_sorted(&ascending);
    let q1 = percentile_midpoint(&ascending, 0.25);
    let q3 = percentile_midpoint(&ascending, 0.75);
    let iqr = q3 - q1;

    let (lower_exp, upper_exp) = if mc > 0.0 {
        FENCE_EXPONENTS_POSITIVE_SKEW
    } else {
        FENCE_EXPONENTS_NEGATIVE_SKEW
    };
    let lower_fence = q1 - FENCE_SCALE * (lower_exp * mc).exp() * iqr;
    let upper_fence = q3 + FENCE_SCALE * (upper_exp * mc).exp() * iqr;

    let mut removed_indices: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v < lower_fence || v > upper_fence)
        .map(|(i, _)| i)
        .collect();

    if removed_indices.len() > max_outliers {
        warn!(
            "{} of {} values outside fences ({lower_fence:.6e}, {upper_fence:.6e}), more than the {max_outliers} allowed; keeping all",
            removed_indices.len(),
            values.len()
        );
        removed_indices.clear();
    }

    let kept: Vec<f64> = values
        .iter()
        .enumerate()
        .filter(|(i, _)| removed_indices.binary_search(i).is_err())
        .map(|(_, &v)| v)
        .collect();
    let removed_values = removed_indices.iter().map(|&i| values[i]).collect();

    debug!("medcouple {mc:.4}, fences ({lower_fence:.6e}, {upper_fence:.6e}), removed {:?}", removed_indices);

    Ok(ResistantEstimate {
        mean: kept.iter().mean(),
        std_dev: kept.iter().population_std_dev(),
        n_used: kept.len(),
        removed_values,
        removed_indices,
        fences: (lower_fence, upper_fence),
    })
}

/// Number of outliers that may be removed from `n_tests` values.
///
/// Walks k = 1, 2, ... while the probability of seeing at least k outliers among
/// `n_tests` values, each an outlier with `single_outlier_probability`, exceeds
/// `cutoff_probability`, and returns k - 1. Never returns more than `n_tests - 1`.
///
/// # Examples
///
/// ```
/// use simscore::algorithm::robust::outliers_to_remove;
///
/// assert_eq!(outliers_to_remove(30, 0.01, 0.01).unwrap(), 2);
/// assert_eq!(outliers_to_remove(1, 0.01, 0.01).unwrap(), 0);
/// ```
pub fn outliers_to_remove(n_tests: usize, cutoff_probability: f64, single_outlier_probability: f64) -> Result<usize> {
    if n_tests == 0 {
        return Err(SimsError::input("number of tests must be a positive integer"));
    }
    for (name, p) in [("cutoff", cutoff_probability), ("single outlier", single_outlier_probability)] {
        if !(p > 0.0 && p < 1.0) {
            return Err(SimsError::input(format!("{name} probability {p} outside (0, 1)")));
        }
    }

    let binomial = Binomial::new(single_outlier_probability, n_tests as u64)
        .map_err(|e| SimsError::input(format!("binomial model: {e}")))?;

    let mut k = 1;
    // sf(k - 1) = P(X >= k)
    while k < n_tests && binomial.sf((k - 1) as u64) > cutoff_probability {
        k += 1;
    }

    Ok(k - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_identical_values() {
        let result = resistant_mean_and_error(&[4.2; 8], 3).unwrap();
        assert_eq!(result.mean, 4.2);
        assert_eq!(result.std_dev, 0.0);
        assert_eq!(result.n_used, 8);
        assert!(result.removed_values.is_empty());
    }

    #[test]
    fn test_empty_is_input_error() {
        for k in [0, 1, 5] {
            let err = resistant_mean_and_error(&[], k).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InputValidation);
        }
    }

    #[test]
    fn test_single_value() {
        let result = resistant_mean_and_error(&[7.0], 2).unwrap();
        assert_eq!(result.mean, 7.0);
        assert_eq!(result.std_dev, 0.0);
        assert!(result.removed_values.is_empty());
    }

    #[test]
    fn test_far_outlier_removed() {
        let values = vec![10.0, 10.0, 100.0, 10.0, 10.0, 10.0];
        let result = resistant_mean_and_error(&values, 1).unwrap();
        assert_eq!(result.mean, 10.0);
        assert_eq!(result.std_dev, 0.0);
        assert_eq!(result.n_used, 5);
        assert_eq!(result.removed_values, vec![100.0]);
        assert_eq!(result.removed_indices, vec![2]);
    }

    #[test]
    fn test_outlier_kept_when_not_sanctioned() {
        let values = vec![10.0, 10.0, 100.0, 10.0, 10.0, 10.0];
        let result = resistant_mean_and_error(&values, 0).unwrap();
        assert_eq!(result.n_used, 6);
        assert!(result.removed_values.is_empty());
        assert!((result.mean - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_symmetric_fences() {
        let result = resistant_mean_and_error(&[1.0, 2.0, 3.0, 4.0, 100.0], 1).unwrap();
        assert!((result.fences.0 + 1.0).abs() < 1e-12);
        assert!((result.fences.1 - 7.0).abs() < 1e-12);
        assert_eq!(result.removed_values, vec![100.0]);
        assert!((result.mean - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_skewed_fences() {
        let result = resistant_mean_and_error(&[0.0, 1.0, 2.0, 5.0, 9.0, 20.0], 2).unwrap();
        assert!((result.fences.0 + 0.340823821224546).abs() < 1e-9);
        assert!((result.fences.1 - 32.41178900357376).abs() < 1e-9);
        assert!(result.removed_values.is_empty());
    }

    #[test]
    fn test_medcouple() {
        assert_eq!(medcouple(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap(), 0.0);
        assert_eq!(medcouple(&[1.0; 6]).unwrap(), 0.0);
        assert!((medcouple(&[10.0, 10.0, 10.0, 10.0, 10.0, 100.0]).unwrap() - 0.5).abs() < 1e-12);
        assert!(medcouple(&[]).is_err());
    }

    #[test]
    fn test_percentile_midpoint() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_midpoint(&values, 0.25), 2.0);
        assert_eq!(percentile_midpoint(&values, 0.75), 4.0);
        assert_eq!(percentile_midpoint(&values, 1.0), 5.0);

        let even = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(percentile_midpoint(&even, 0.25), 2.5);
        assert_eq!(percentile_midpoint(&even, 0.5), 3.5);
        assert_eq!(median_sorted(&even), 3.5);
    }

    #[test]
    fn test_outlier_policy_monotonic() {
        let mut previous = 0;
        for n in 1..=300 {
            let k = outliers_to_remove(n, 0.01, 0.01).unwrap();
            assert!(k >= previous, "n = {n}: {k} < {previous}");
            assert!(k < n);
            previous = k;
        }
    }

    #[test]
    fn test_outlier_policy_rejects_bad_parameters() {
        assert!(outliers_to_remove(0, 0.01, 0.01).is_err());
        for p in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert_eq!(outliers_to_remove(10, p, 0.01).unwrap_err().kind(), ErrorKind::InputValidation);
            assert_eq!(outliers_to_remove(10, 0.01, p).unwrap_err().kind(), ErrorKind::InputValidation);
        }
    }
}
