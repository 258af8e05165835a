use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::{debug, info, warn};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::algorithm::regression::{fit_polynomial, PolynomialFit};
use crate::algorithm::robust::median_sorted;
use crate::chemistry::isotope::{Method, Ratio};
use crate::config::ReductionConfig;
use crate::data::ensemble::Ensemble;
use crate::data::sample::{primary_reference, Sample};
use crate::error::{Result, SimsError};

/// How time-dependent instrumental drift is removed from a ratio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftMode {
    None,
    #[default]
    Linear,
    Quadratic,
}

impl fmt::Display for DriftMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriftMode::None => "none",
            DriftMode::Linear => "linear",
            DriftMode::Quadratic => "quadratic",
        };
        write!(f, "{name}")
    }
}

impl FromStr for DriftMode {
    type Err = SimsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(DriftMode::None),
            "linear" => Ok(DriftMode::Linear),
            "quadratic" => Ok(DriftMode::Quadratic),
            other => Err(SimsError::precondition(format!("unknown drift correction mode '{other}'"))),
        }
    }
}

/// Diagnostic fit of `value = b0 + b1 t + b2 t²`, never used for correction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurvilinearFit {
    pub intercept: Ensemble,
    pub linear: Ensemble,
    pub quadratic: Ensemble,
    pub r_squared: f64,
}

/// Drift characterisation of one ratio, one coefficient per Monte-Carlo draw.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatioResults {
    pub ratio: Ratio,
    /// Times of the reference spots relative to t-zero, in seconds.
    pub relative_times: Vec<f64>,
    pub slope: Ensemble,
    pub intercept: Ensemble,
    pub r_squared: f64,
    pub curvilinear: Option<CurvilinearFit>,
}

/// Median acquisition time of the unflagged primary reference spots, in epoch seconds.
pub fn t_zero(samples: &[Sample]) -> Result<f64> {
    let primary = primary_reference(samples)?;
    let mut times: Vec<f64> = primary.active_spots().map(|s| s.epoch_seconds()).collect();
    if times.is_empty() {
        return Err(SimsError::precondition(format!("{} has no unflagged spots", primary.name)));
    }
    times.sort_by(|a, b| a.total_cmp(b));
    Ok(median_sorted(&times))
}

fn coefficient(fit: &PolynomialFit, power: usize) -> Result<Ensemble> {
    Ensemble::from_draws(fit.coefficients[power].clone())
}

/// Fits the drift of one ratio through its reference points.
///
/// Arguments:
///
/// * `ratio` - the ratio, decides whether the curvilinear diagnostic is fitted too
/// * `points` - relative time and value ensemble of every usable reference spot
///
/// Returns:
///
/// * `RatioResults` - slope and intercept per draw and the pooled R²
pub fn characterise(ratio: &Ratio, points: &[(f64, &Ensemble)]) -> Result<RatioResults> {
    if points.len() < 2 {
        return Err(SimsError::precondition(format!(
            "{ratio}: drift cannot be characterised from {} reference spot(s)",
            points.len()
        )));
    }
    let size = points[0].1.len();
    if let Some((_, other)) = points.iter().find(|(_, e)| e.len() != size) {
        return Err(SimsError::EnsembleSizeMismatch { left: size, right: other.len() });
    }

    let times: Vec<f64> = points.iter().map(|(t, _)| *t).collect();
    let values = DMatrix::from_fn(points.len(), size, |r, c| points[r].1.draws()[c]);

    let fit = fit_polynomial(&times, &values, 1)?;
    if fit.r_squared == 0.0 {
        warn!("{ratio}: reference values show no variance, R² is 0");
    }
    let slope = coefficient(&fit, 1)?;
    debug!("{ratio}: drift slope {} per s, R² {:.4}", slope.estimate(), fit.r_squared);

    let curvilinear = if ratio.has_curvilinear_diagnostic() {
        match fit_polynomial(&times, &values, 2) {
            Ok(curve) => Some(CurvilinearFit {
                intercept: coefficient(&curve, 0)?,
                linear: coefficient(&curve, 1)?,
                quadratic: coefficient(&curve, 2)?,
                r_squared: curve.r_squared,
            }),
            Err(e) => {
                warn!("{ratio}: no curvilinear fit, {e}");
                None
            }
        }
    } else {
        None
    };

    Ok(RatioResults {
        ratio: *ratio,
        relative_times: times,
        slope,
        intercept: coefficient(&fit, 0)?,
        r_squared: fit.r_squared,
        curvilinear,
    })
}

/// Removes drift from one value ensemble.
///
/// # Examples
///
/// ```
/// use simscore::{DriftMode, Ensemble};
/// use simscore::reduction::drift::correct;
///
/// let value = Ensemble::constant(10.0, 3).unwrap();
/// let slope = Ensemble::constant(0.5, 3).unwrap();
/// let corrected = correct(&value, &slope, 4.0, DriftMode::Linear).unwrap();
/// assert_eq!(corrected.mean(), 8.0);
/// ```
pub fn correct(value: &Ensemble, slope: &Ensemble, relative_time: f64, mode: DriftMode) -> Result<Ensemble> {
    match mode {
        DriftMode::None => Ok(value.clone()),
        DriftMode::Linear => value.zip_with(slope, |v, s| v - s * relative_time),
        DriftMode::Quadratic => Err(SimsError::UnsupportedOperation(
            "quadratic drift correction is not implemented".to_string(),
        )),
    }
}

/// Characterises drift on the primary reference material and corrects every spot.
///
/// Flagged spots are corrected but never used for t-zero or the fits. Returns t-zero and
/// the drift characterisation of every ratio.
pub fn run(samples: &mut [Sample], method: &Method, config: &ReductionConfig) -> Result<(f64, BTreeMap<Ratio, RatioResults>)> {
    let t0 = t_zero(samples)?;
    let primary = primary_reference(samples)?;

    let mut results = BTreeMap::new();
    for ratio in method.ratios() {
        if config.drift_mode(ratio) == DriftMode::Quadratic {
            return Err(SimsError::UnsupportedOperation(format!("{ratio}: quadratic drift correction is not implemented")));
        }
        let points = primary
            .active_spots()
            .map(|spot| {
                spot.ratio_data(ratio)
                    .and_then(|d| d.drift_input(ratio))
                    .map(|e| (spot.epoch_seconds() - t0, e))
                    .ok_or_else(|| SimsError::precondition(format!("spot {}/{}: no {ratio} values, delta stage has not run", spot.sample, spot.id)))
            })
            .collect::<Result<Vec<_>>>()?;
        results.insert(*ratio, characterise(ratio, &points)?);
    }
    info!("drift characterised on {} with t-zero {t0:.1}", primary.name);

    let mut staged = Vec::new();
    for (i, sample) in samples.iter().enumerate() {
        for (j, spot) in sample.spots.iter().enumerate() {
            let relative_time = spot.epoch_seconds() - t0;
            for ratio in method.ratios() {
                let value = spot
                    .ratio_data(ratio)
                    .and_then(|d| d.drift_input(ratio))
                    .ok_or_else(|| SimsError::precondition(format!("spot {}/{}: no {ratio} values, delta stage has not run", sample.name, spot.id)))?;
                let slope = &results[ratio].slope;
                staged.push((i, j, *ratio, correct(value, slope, relative_time, config.drift_mode(ratio))?));
            }
        }
    }

    for (i, j, ratio, corrected) in staged {
        if let Some(data) = samples[i].spots[j].ratio_data_mut(&ratio) {
            data.drift_corrected = Some(corrected);
        }
    }

    Ok((t0, results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn linear_points() -> (Vec<f64>, Vec<Ensemble>) {
        let times = vec![-2.0, -1.0, 0.0, 1.0, 2.0];
        let values = times
            .iter()
            .map(|&t| Ensemble::from_draws(vec![2.0 * t + 3.0, -t + 1.0]).unwrap())
            .collect();
        (times, values)
    }

    #[test]
    fn test_recovers_linear_drift() {
        let (times, values) = linear_points();
        let points: Vec<(f64, &Ensemble)> = times.iter().copied().zip(values.iter()).collect();
        let ratio = Ratio::parse("34S/32S").unwrap();
        let results = characterise(&ratio, &points).unwrap();

        assert!((results.slope.draws()[0] - 2.0).abs() < 1e-9);
        assert!((results.intercept.draws()[0] - 3.0).abs() < 1e-9);
        assert!((results.slope.draws()[1] + 1.0).abs() < 1e-9);
        assert!((results.intercept.draws()[1] - 1.0).abs() < 1e-9);
        assert!((results.r_squared - 1.0).abs() < 1e-9);
        assert!(results.curvilinear.is_none());
    }

    #[test]
    fn test_corrected_series_has_no_slope() {
        let (times, values) = linear_points();
        let points: Vec<(f64, &Ensemble)> = times.iter().copied().zip(values.iter()).collect();
        let ratio = Ratio::parse("34S/32S").unwrap();
        let results = characterise(&ratio, &points).unwrap();

        let corrected: Vec<Ensemble> = points
            .iter()
            .map(|(t, v)| correct(v, &results.slope, *t, DriftMode::Linear).unwrap())
            .collect();
        let refit_points: Vec<(f64, &Ensemble)> = times.iter().copied().zip(corrected.iter()).collect();
        let refit = characterise(&ratio, &refit_points).unwrap();
        assert!(refit.slope.draws().iter().all(|s| s.abs() < 1e-9));
        assert!((refit.intercept.draws()[0] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_curvilinear_diagnostic() {
        let times = vec![0.0, 1.0, 2.0, 3.0];
        let values: Vec<Ensemble> = times.iter().map(|&t| Ensemble::constant(t * t + 1.0, 2).unwrap()).collect();
        let points: Vec<(f64, &Ensemble)> = times.iter().copied().zip(values.iter()).collect();
        let ratio = Ratio::parse("33S/32S").unwrap();
        let results = characterise(&ratio, &points).unwrap();
        let curve = results.curvilinear.unwrap();
        assert!((curve.quadratic.mean() - 1.0).abs() < 1e-9);
        assert!((curve.r_squared - 1.0).abs() < 1e-9);
        assert!(results.r_squared < 1.0);
    }

    #[test]
    fn test_needs_two_reference_spots() {
        let value = Ensemble::constant(1.0, 4).unwrap();
        let ratio = Ratio::parse("34S/32S").unwrap();
        let err = characterise(&ratio, &[(0.0, &value)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn test_t_zero_of_unflagged_spots() {
        use crate::data::spot::Spot;
        use chrono::{TimeZone, Utc};

        let mut reference = Sample { is_primary_reference: true, ..Sample::new("Ref") };
        for (id, seconds) in [("1", 0), ("2", 100), ("3", 400)] {
            reference.push_spot(Spot::new("Ref", id, Utc.timestamp_opt(seconds, 0).unwrap(), 1.0));
        }
        let mut samples = vec![reference];
        assert_eq!(t_zero(&samples).unwrap(), 100.0);

        samples[0].spot_mut("3").unwrap().set_flagged(true);
        assert_eq!(t_zero(&samples).unwrap(), 50.0);

        for spot in samples[0].spots.iter_mut() {
            spot.set_flagged(true);
        }
        assert_eq!(t_zero(&samples).unwrap_err().kind(), ErrorKind::Precondition);
    }

    #[test]
    fn test_modes() {
        let value = Ensemble::constant(5.0, 2).unwrap();
        let slope = Ensemble::constant(1.0, 2).unwrap();
        assert_eq!(correct(&value, &slope, 3.0, DriftMode::None).unwrap(), value);
        let err = correct(&value, &slope, 3.0, DriftMode::Quadratic).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);

        assert_eq!("Linear".parse::<DriftMode>().unwrap(), DriftMode::Linear);
        assert_eq!("cubic".parse::<DriftMode>().unwrap_err().kind(), ErrorKind::Precondition);
    }
}
