use log::{debug, info, warn};

use crate::algorithm::robust::{outliers_to_remove, resistant_mean_and_error};
use crate::chemistry::constants::SECONDARY_ION_YIELD_FACTOR;
use crate::chemistry::isotope::{Isotope, Method, Ratio};
use crate::config::ReductionConfig;
use crate::data::sample::Sample;
use crate::data::spot::{RatioData, RatioStatistics, Spot};
use crate::error::{Result, SimsError};

/// Cycle-by-cycle ratio of two corrected count-rate series.
///
/// # Examples
///
/// ```
/// use simscore::reduction::ratios::raw_ratios;
///
/// let ratios = raw_ratios(&[1.0, 3.0], &[2.0, 4.0]).unwrap();
/// assert_eq!(ratios, vec![0.5, 0.75]);
/// ```
pub fn raw_ratios(numerator: &[f64], denominator: &[f64]) -> Result<Vec<f64>> {
    if numerator.len() != denominator.len() {
        return Err(SimsError::input(format!(
            "numerator has {} cycles but denominator has {}",
            numerator.len(),
            denominator.len()
        )));
    }
    if numerator.is_empty() {
        return Err(SimsError::input("no data"));
    }

    numerator
        .iter()
        .zip(denominator.iter())
        .enumerate()
        .map(|(cycle, (n, d))| {
            let ratio = n / d;
            if ratio.is_finite() {
                Ok(ratio)
            } else {
                Err(SimsError::input(format!("cycle {cycle}: ratio {n}/{d} is not finite")))
            }
        })
        .collect()
}

/// Outlier-resistant statistics of a ratio series with automatic cycle pruning.
///
/// Returns the statistics and the per-cycle exclusion mask, built from the positions of
/// the pruned cycles.
pub fn automatic_statistics(raw: &[f64], cutoff_probability: f64, single_outlier_probability: f64) -> Result<(RatioStatistics, Vec<bool>)> {
    let max_outliers = outliers_to_remove(raw.len(), cutoff_probability, single_outlier_probability)?;
    let estimate = resistant_mean_and_error(raw, max_outliers)?;
    debug!("{} cycles, up to {max_outliers} outliers, removed {:?}", raw.len(), estimate.removed_indices);

    let mut excluded = vec![false; raw.len()];
    for &i in &estimate.removed_indices {
        excluded[i] = true;
    }
    Ok((RatioStatistics::from(&estimate), excluded))
}

/// Statistics of exactly the cycles not excluded by the user, without further pruning.
pub fn selected_statistics(raw: &[f64], excluded: &[bool]) -> Result<RatioStatistics> {
    if excluded.len() != raw.len() {
        return Err(SimsError::input(format!(
            "cycle selection has {} entries for {} cycles",
            excluded.len(),
            raw.len()
        )));
    }
    let retained: Vec<f64> = raw
        .iter()
        .zip(excluded.iter())
        .filter(|&(_, &out)| !out)
        .map(|(&v, _)| v)
        .collect();
    let estimate = resistant_mean_and_error(&retained, 0)?;
    Ok(RatioStatistics::from(&estimate))
}

/// Secondary ions per primary ion, summed over the species that count towards the yield.
pub fn secondary_ion_yield(spot: &Spot) -> Result<f64> {
    if !(spot.primary_current > 0.0) {
        return Err(SimsError::input(format!(
            "spot {}/{} has primary current {}",
            spot.sample, spot.id, spot.primary_current
        )));
    }
    let counted: Vec<f64> = spot
        .peaks
        .values()
        .filter(|p| p.isotope.in_yield_sum())
        .filter_map(|p| p.cps.map(|e| e.mean))
        .collect();
    if counted.is_empty() {
        return Err(SimsError::precondition(format!("spot {}/{} has no corrected count rates", spot.sample, spot.id)));
    }
    Ok(SECONDARY_ION_YIELD_FACTOR * counted.iter().sum::<f64>() / spot.primary_current)
}

fn corrected_cps(spot: &Spot, isotope: Isotope) -> Result<&[f64]> {
    spot.peaks
        .get(&isotope)
        .and_then(|p| p.detector_corrected_cps.as_deref())
        .ok_or_else(|| {
            SimsError::precondition(format!("spot {}/{}: {isotope} has not been detector corrected", spot.sample, spot.id))
        })
}

struct StagedRatio {
    ratio: Ratio,
    raw: Vec<f64>,
    statistics: RatioStatistics,
    excluded: Vec<bool>,
}

fn compute_spot(spot: &Spot, method: &Method, config: &ReductionConfig) -> Result<(Vec<StagedRatio>, Option<f64>)> {
    let mut staged = Vec::with_capacity(method.ratios().len());
    for ratio in method.ratios() {
        let raw = raw_ratios(corrected_cps(spot, ratio.numerator())?, corrected_cps(spot, ratio.denominator())?)?;

        let user_exclusions = spot.ratio_data(ratio).and_then(|d| d.user_exclusions.as_ref());
        let (statistics, excluded) = match user_exclusions {
            Some(mask) => (selected_statistics(&raw, mask)?, mask.clone()),
            None => automatic_statistics(&raw, config.cutoff_probability, config.single_outlier_probability)?,
        };
        staged.push(StagedRatio { ratio: *ratio, raw, statistics, excluded });
    }
    let ion_yield = match secondary_ion_yield(spot) {
        Ok(ion_yield) => Some(ion_yield),
        Err(e) => {
            warn!("spot {}/{}: no secondary-ion yield, {e}", spot.sample, spot.id);
            None
        }
    };
    Ok((staged, ion_yield))
}

/// Computes cycle ratios, their statistics and the secondary-ion yield of every spot.
///
/// User cycle selections stored on a spot are honoured. Nothing is written unless every
/// spot succeeds. A spot whose yield cannot be computed keeps no yield rather than failing
/// the stage.
pub fn run(samples: &mut [Sample], method: &Method, config: &ReductionConfig) -> Result<()> {
    let mut staged = Vec::new();
    for (i, sample) in samples.iter().enumerate() {
        for (j, spot) in sample.spots.iter().enumerate() {
            let (ratios, ion_yield) = compute_spot(spot, method, config)
                .map_err(|e| with_spot_context(e, &sample.name, &spot.id))?;
            staged.push((i, j, ratios, ion_yield));
        }
    }

    let n_spots = staged.len();
    for (i, j, ratios, ion_yield) in staged {
        let spot = &mut samples[i].spots[j];
        spot.secondary_ion_yield = ion_yield;
        for StagedRatio { ratio, raw, statistics, excluded } in ratios {
            match spot.ratio_data_mut(&ratio) {
                Some(data) => {
                    data.raw = raw;
                    data.statistics = statistics;
                    data.excluded = excluded;
                }
                None => {
                    spot.ratios.insert(ratio, RatioData::new(raw, statistics, excluded));
                }
            }
        }
    }
    info!("ratios computed for {n_spots} spots");

    Ok(())
}

fn with_spot_context(error: SimsError, sample: &str, spot: &str) -> SimsError {
    match error {
        SimsError::InputValidation(msg) => SimsError::InputValidation(format!("spot {sample}/{spot}: {msg}")),
        other => other,
    }
}

/// Replaces the automatic cycle pruning of one ratio on one spot by a user selection.
///
/// `excluded` holds one entry per cycle, `true` for cycles to leave out. The ensembles
/// derived from the old statistics are dropped, together with every CAP value of the
/// spot; they come back when the pipeline is re-run from the delta stage.
pub fn apply_cycle_selection(spot: &mut Spot, ratio: &Ratio, excluded: Vec<bool>) -> Result<()> {
    let data = spot
        .ratio_data_mut(ratio)
        .ok_or_else(|| SimsError::precondition(format!("no {ratio} ratios on this spot yet")))?;
    data.statistics = selected_statistics(&data.raw, &excluded)?;
    data.excluded = excluded.clone();
    data.user_exclusions = Some(excluded);
    invalidate_derived(spot, ratio);
    Ok(())
}

/// Drops a user cycle selection and restores automatic pruning.
pub fn clear_cycle_selection(spot: &mut Spot, ratio: &Ratio, config: &ReductionConfig) -> Result<()> {
    let data = spot
        .ratio_data_mut(ratio)
        .ok_or_else(|| SimsError::precondition(format!("no {ratio} ratios on this spot yet")))?;
    let (statistics, excluded) = automatic_statistics(&data.raw, config.cutoff_probability, config.single_outlier_probability)?;
    data.statistics = statistics;
    data.excluded = excluded;
    data.user_exclusions = None;
    invalidate_derived(spot, ratio);
    Ok(())
}

// CAP combines several ratios of the spot, so it goes stale with any of them
fn invalidate_derived(spot: &mut Spot, ratio: &Ratio) {
    if let Some(data) = spot.ratio_data_mut(ratio) {
        data.clear_derived();
    }
    for data in spot.ratios.values_mut() {
        data.cap = None;
    }
    debug!("spot {}/{}: {ratio} selection changed, derived results dropped", spot.sample, spot.id);
}
