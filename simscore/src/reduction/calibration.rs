use std::collections::BTreeMap;

use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::chemistry::constants::PER_MIL;
use crate::chemistry::isotope::{Method, Ratio};
use crate::chemistry::reference::{ReferenceTables, ReferenceValue};
use crate::config::ReductionConfig;
use crate::data::ensemble::{Ensemble, Estimate};
use crate::data::sample::{primary_reference, secondary_reference, Sample};
use crate::error::{Result, SimsError};

/// Instrumental mass fractionation factor of a reference material (Kita et al. 2009).
///
/// Arguments:
///
/// * `internal` - drift-corrected delta measured on the reference material, ‰
/// * `external` - certified delta of the reference material, ‰
///
/// # Examples
///
/// ```
/// use simscore::reduction::calibration::alpha;
///
/// assert_eq!(alpha(2.0, 2.0), 1.0);
/// assert!(alpha(3.0, 2.0) > 1.0);
/// ```
pub fn alpha(internal: f64, external: f64) -> f64 {
    (1.0 + internal / PER_MIL) / (1.0 + external / PER_MIL)
}

/// Moves a drift-corrected delta onto the certified scale.
pub fn apply_alpha(value: f64, alpha: f64) -> f64 {
    ((1.0 + value / PER_MIL) / alpha - 1.0) * PER_MIL
}

fn drift_corrected<'a>(sample: &'a Sample, ratio: &Ratio) -> Result<Vec<&'a Ensemble>> {
    let members = sample
        .active_spots()
        .map(|spot| {
            spot.ratio_data(ratio)
                .and_then(|d| d.drift_corrected.as_ref())
                .ok_or_else(|| SimsError::precondition(format!("spot {}/{}: {ratio} is not drift corrected", spot.sample, spot.id)))
        })
        .collect::<Result<Vec<_>>>()?;
    if members.is_empty() {
        return Err(SimsError::precondition(format!("{} has no unflagged spots", sample.name)));
    }
    Ok(members)
}

/// Alpha ensemble of every delta ratio, from the primary reference material.
pub fn alphas<R: Rng + ?Sized>(
    samples: &[Sample],
    method: &Method,
    config: &ReductionConfig,
    tables: &ReferenceTables,
    rng: &mut R,
) -> Result<BTreeMap<Ratio, Ensemble>> {
    let primary = primary_reference(samples)?;
    let element = method.element();

    let mut alphas = BTreeMap::new();
    for ratio in method.ratios().iter().filter(|r| r.has_delta()) {
        let internal = Ensemble::elementwise_mean(&drift_corrected(primary, ratio)?)?;
        let certified = tables.calibration(element, &config.material, &config.primary_reference_material, ratio)?;
        if certified.uncertainty == 0.0 {
            warn!("{} {ratio} has no certified uncertainty, using a constant ensemble", config.primary_reference_material);
        }
        let external = Ensemble::normal(certified.mean, certified.uncertainty, internal.len(), rng)?;
        let factor = internal.zip_with(&external, alpha)?;
        debug!("{ratio}: alpha {}", factor.estimate());
        alphas.insert(*ratio, factor);
    }
    Ok(alphas)
}

/// Applies the SIMS calibration to every spot, flagged ones included.
///
/// Ratios without a delta value are passed through in ratio space. Returns the alpha
/// ensemble of every delta ratio.
pub fn run<R: Rng + ?Sized>(
    samples: &mut [Sample],
    method: &Method,
    config: &ReductionConfig,
    tables: &ReferenceTables,
    rng: &mut R,
) -> Result<BTreeMap<Ratio, Ensemble>> {
    let factors = alphas(samples, method, config, tables, rng)?;

    let mut staged = Vec::new();
    for (i, sample) in samples.iter().enumerate() {
        for (j, spot) in sample.spots.iter().enumerate() {
            for ratio in method.ratios() {
                let value = spot
                    .ratio_data(ratio)
                    .and_then(|d| d.drift_corrected.as_ref())
                    .ok_or_else(|| SimsError::precondition(format!("spot {}/{}: {ratio} is not drift corrected", sample.name, spot.id)))?;
                let corrected = match factors.get(ratio) {
                    Some(factor) => value.zip_with(factor, apply_alpha)?,
                    None => value.clone(),
                };
                staged.push((i, j, *ratio, corrected));
            }
        }
    }

    for (i, j, ratio, corrected) in staged {
        if let Some(data) = samples[i].spots[j].ratio_data_mut(&ratio) {
            data.alpha_corrected = Some(corrected);
        }
    }
    info!("calibrated against {} in {}", config.primary_reference_material, config.material);

    Ok(factors)
}

/// Calibrated value of the secondary reference material next to its certified value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecondaryCheck {
    pub measured: Estimate,
    pub certified: ReferenceValue,
    /// `measured.mean - certified.mean`, ‰
    pub offset: f64,
}

/// Compares the calibrated secondary reference material with its certified values.
///
/// Returns an empty map when no secondary reference material is configured.
pub fn secondary_check(
    samples: &[Sample],
    method: &Method,
    config: &ReductionConfig,
    tables: &ReferenceTables,
) -> Result<BTreeMap<Ratio, SecondaryCheck>> {
    let mut checks = BTreeMap::new();
    let Some(reference_material) = config.secondary_reference_material.as_deref() else {
        return Ok(checks);
    };
    let secondary = secondary_reference(samples)?;

    for ratio in method.ratios().iter().filter(|r| r.has_delta()) {
        let members = secondary
            .active_spots()
            .map(|spot| {
                spot.ratio_data(ratio)
                    .and_then(|d| d.alpha_corrected.as_ref())
                    .ok_or_else(|| SimsError::precondition(format!("spot {}/{}: {ratio} is not calibrated", spot.sample, spot.id)))
            })
            .collect::<Result<Vec<_>>>()?;
        if members.is_empty() {
            return Err(SimsError::precondition(format!("{} has no unflagged spots", secondary.name)));
        }
        let measured = Ensemble::elementwise_mean(&members)?.estimate();
        let certified = tables.calibration(method.element(), &config.material, reference_material, ratio)?;
        let offset = measured.mean - certified.mean;
        if offset.abs() > 2.0 * measured.error.hypot(certified.uncertainty) {
            warn!("{reference_material} {ratio}: measured {measured} is {offset:.3}‰ off the certified value");
        }
        checks.insert(*ratio, SecondaryCheck { measured, certified, offset });
    }
    Ok(checks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_round_trip() {
        let a = alpha(4.5, 2.17);
        assert!((apply_alpha(4.5, a) - 2.17).abs() < 1e-12);
        assert!((apply_alpha(-3.0, 1.0) + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_alpha_of_reference_is_unity_when_certified() {
        let internal = Ensemble::constant(7.0, 5).unwrap();
        let external = Ensemble::constant(7.0, 5).unwrap();
        let factor = internal.zip_with(&external, alpha).unwrap();
        assert!(factor.draws().iter().all(|&a| a == 1.0));
    }
}
