use log::{debug, info};

use crate::algorithm::robust::resistant_mean_and_error;
use crate::chemistry::constants::DEAD_TIME_SCALE;
use crate::chemistry::isotope::Method;
use crate::data::ensemble::Estimate;
use crate::data::sample::Sample;
use crate::data::spot::{DetectorParameters, MassPeak};
use crate::error::{Result, SimsError};

/// Corrects a count rate for detector dead time.
///
/// Arguments:
///
/// * `value` - measured count rate in counts per second
/// * `dead_time` - detector dead time in ns
///
/// Returns:
///
/// * `f64` - count rate the detector would have recorded without saturation
///
/// # Examples
///
/// ```
/// use simscore::reduction::detector::dead_time_correct;
///
/// assert_eq!(dead_time_correct(1.0e5, 0.0), 1.0e5);
/// assert!(dead_time_correct(1.0e5, 44.0) > 1.0e5);
/// ```
pub fn dead_time_correct(value: f64, dead_time: f64) -> f64 {
    if dead_time == 0.0 {
        value
    } else {
        value / (1.0 - value * dead_time * DEAD_TIME_SCALE)
    }
}

/// Parses instrument count rates written in scientific notation.
pub fn parse_counts(raw: &[String]) -> Result<Vec<f64>> {
    raw.iter()
        .map(|s| {
            s.trim()
                .parse::<f64>()
                .map_err(|e| SimsError::input(format!("count rate '{s}' is not a number: {e}")))
        })
        .collect()
}

/// Applies dead time, background and yield corrections to a count-rate series.
pub fn correct_counts(counts: &[f64], detector: &DetectorParameters) -> Result<Vec<f64>> {
    if counts.is_empty() {
        return Err(SimsError::input("no data"));
    }
    if !(detector.detector_yield > 0.0) {
        return Err(SimsError::input(format!("detector yield {} must be positive", detector.detector_yield)));
    }
    if detector.dead_time < 0.0 {
        return Err(SimsError::input(format!("negative dead time {}", detector.dead_time)));
    }

    counts
        .iter()
        .map(|&v| {
            if v * detector.dead_time * DEAD_TIME_SCALE >= 1.0 {
                return Err(SimsError::input(format!("count rate {v:e} saturates a detector with {} ns dead time", detector.dead_time)));
            }
            Ok((dead_time_correct(v, detector.dead_time) - detector.background) / detector.detector_yield)
        })
        .collect()
}

/// Corrects one mass peak and summarises it.
///
/// Returns the corrected per-cycle count rates and their outlier-resistant mean and
/// standard error.
pub fn correct_peak(peak: &MassPeak, max_outliers: usize) -> Result<(Vec<f64>, Estimate)> {
    let counts = parse_counts(&peak.raw_counts)?;
    let corrected = correct_counts(&counts, &peak.detector)?;
    let estimate = resistant_mean_and_error(&corrected, max_outliers)?;
    Ok((corrected, Estimate::new(estimate.mean, estimate.std_error())))
}

/// Detector-corrects every peak of the method on every spot.
///
/// Nothing is written unless every peak of every spot could be corrected.
pub fn run(samples: &mut [Sample], method: &Method, max_outliers: usize) -> Result<()> {
    let mut staged = Vec::new();
    for (i, sample) in samples.iter().enumerate() {
        for (j, spot) in sample.spots.iter().enumerate() {
            for isotope in method.isotopes() {
                let peak = spot.peaks.get(isotope).ok_or_else(|| {
                    SimsError::input(format!("spot {}/{} has no {isotope} peak", sample.name, spot.id))
                })?;
                let (corrected, estimate) = correct_peak(peak, max_outliers)
                    .map_err(|e| SimsError::input(format!("spot {}/{} {isotope}: {e}", sample.name, spot.id)))?;
                debug!("{}/{} {isotope}: {:.4e} cps", sample.name, spot.id, estimate.mean);
                staged.push((i, j, *isotope, corrected, estimate));
            }
        }
    }

    let n_peaks = staged.len();
    for (i, j, isotope, corrected, estimate) in staged {
        if let Some(peak) = samples[i].spots[j].peaks.get_mut(&isotope) {
            peak.detector_corrected_cps = Some(corrected);
            peak.cps = Some(estimate);
        }
    }
    info!("detector correction applied to {n_peaks} mass peaks");

    Ok(())
}
