use nalgebra::DMatrix;

use crate::error::{Result, SimsError};

/// Least-squares polynomial fit of several series sharing one predictor.
#[derive(Clone, Debug, PartialEq)]
pub struct PolynomialFit {
    /// `coefficients[p][c]` is the coefficient of t^p for series (column) `c`.
    pub coefficients: Vec<Vec<f64>>,
    /// Coefficient of determination pooled over all series.
    pub r_squared: f64,
}

impl PolynomialFit {
    pub fn intercept(&self) -> &[f64] {
        &self.coefficients[0]
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }
}

/// Fits `values = b0 + b1 t + ... + bd t^d` by the normal equations.
///
/// Arguments:
///
/// * `times` - predictor, one entry per row of `values`
/// * `values` - response matrix, one column per series
/// * `degree` - polynomial degree, 1 for a straight line
///
/// Returns:
///
/// * `PolynomialFit` - coefficients for every column and the pooled R²; R² is defined as
///   0 when the response has no variance at all
///
/// # Examples
///
/// ```
/// use nalgebra::DMatrix;
/// use simscore::algorithm::regression::fit_polynomial;
///
/// let times = vec![0.0, 1.0, 2.0];
/// let values = DMatrix::from_column_slice(3, 1, &[1.0, 3.0, 5.0]);
/// let fit = fit_polynomial(&times, &values, 1).unwrap();
/// assert!((fit.coefficients[1][0] - 2.0).abs() < 1e-9);
/// ```
pub fn fit_polynomial(times: &[f64], values: &DMatrix<f64>, degree: usize) -> Result<PolynomialFit> {
    let n = times.len();
    if values.nrows() != n {
        return Err(SimsError::input(format!("{n} times but {} rows of values", values.nrows())));
    }
    if values.ncols() == 0 {
        return Err(SimsError::input("no series to fit"));
    }
    if n <= degree {
        return Err(SimsError::precondition(format!("{n} points cannot determine a degree {degree} fit")));
    }
    let (min, max) = times.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| (lo.min(t), hi.max(t)));
    if max - min == 0.0 {
        return Err(SimsError::precondition("all points share one time, drift is undetermined"));
    }

    let design = DMatrix::from_fn(n, degree + 1, |r, c| times[r].powi(c as i32));
    let design_t = design.transpose();
    let inverse = (&design_t * &design)
        .try_inverse()
        .ok_or_else(|| SimsError::precondition("normal equations are singular"))?;
    let beta = inverse * &design_t * values;

    let residuals = values - &design * &beta;
    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    let ss_tot: f64 = values
        .column_iter()
        .map(|column| {
            let mean = column.mean();
            column.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        })
        .sum();
    let r_squared = if ss_tot == 0.0 { 0.0 } else { 1.0 - ss_res / ss_tot };

    let coefficients = beta.row_iter().map(|row| row.iter().copied().collect()).collect();

    Ok(PolynomialFit { coefficients, r_squared })
}
