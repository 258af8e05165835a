use std::collections::BTreeMap;

use log::{info, warn};
use rand::Rng;

use crate::chemistry::constants::PER_MIL;
use crate::chemistry::isotope::{Method, Ratio};
use crate::chemistry::reference::ReferenceTables;
use crate::config::ReductionConfig;
use crate::data::ensemble::Ensemble;
use crate::data::sample::Sample;
use crate::error::{Result, SimsError};

/// Delta value in ‰ of a measured ratio against a standard ratio.
///
/// # Examples
///
/// ```
/// use simscore::reduction::delta::delta;
///
/// assert_eq!(delta(1000.0, 1000.0), 0.0);
/// assert!((delta(0.0442, 0.0441626) - 0.8469).abs() < 1e-3);
/// ```
pub fn delta(measured: f64, standard: f64) -> f64 {
    (measured / standard - 1.0) * PER_MIL
}

/// Draw-wise delta of a measured-ratio ensemble against a standard-ratio ensemble.
pub fn delta_ensemble(measured: &Ensemble, standard: &Ensemble) -> Result<Ensemble> {
    measured.zip_with(standard, delta)
}

/// Draws the standard-ratio ensembles of every delta ratio of the method.
///
/// One ensemble per ratio is shared by all spots of the run.
pub fn standard_ensembles<R: Rng + ?Sized>(
    method: &Method,
    standard: &str,
    tables: &ReferenceTables,
    size: usize,
    rng: &mut R,
) -> Result<BTreeMap<Ratio, Ensemble>> {
    let element = method.element();
    let mut standards = BTreeMap::new();
    for ratio in method.ratios().iter().filter(|r| r.has_delta()) {
        let value = tables.standard_ratio(element, standard, ratio)?;
        if value.uncertainty == 0.0 {
            warn!("{standard} {ratio} has no uncertainty, using a constant ensemble");
        }
        standards.insert(*ratio, Ensemble::normal(value.mean, value.uncertainty, size, rng)?);
    }
    Ok(standards)
}

/// Draws the measured-ratio ensemble of every ratio on every spot and converts delta
/// ratios to delta values.
///
/// Nothing is written unless every spot succeeds.
pub fn run<R: Rng + ?Sized>(
    samples: &mut [Sample],
    method: &Method,
    config: &ReductionConfig,
    tables: &ReferenceTables,
    rng: &mut R,
) -> Result<()> {
    let size = config.ensemble_size;
    let standard = config.delta_standard(method.element());
    let standards = standard_ensembles(method, standard, tables, size, rng)?;

    let mut staged = Vec::new();
    for (i, sample) in samples.iter().enumerate() {
        for (j, spot) in sample.spots.iter().enumerate() {
            for ratio in method.ratios() {
                let data = spot.ratio_data(ratio).ok_or_else(|| {
                    SimsError::precondition(format!("spot {}/{}: no {ratio} statistics, ratio stage has not run", sample.name, spot.id))
                })?;
                let measured = Ensemble::normal(data.statistics.mean, data.statistics.std_error, size, rng)?;
                let delta = match standards.get(ratio) {
                    Some(standard) => Some(delta_ensemble(&measured, standard)?),
                    None => None,
                };
                staged.push((i, j, *ratio, measured, delta));
            }
        }
    }

    for (i, j, ratio, measured, delta) in staged {
        if let Some(data) = samples[i].spots[j].ratio_data_mut(&ratio) {
            data.ratio_ensemble = Some(measured);
            data.delta = delta;
        }
    }
    info!("delta values against {standard} computed with {size} draws");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chemistry::isotope::Element;
    use crate::chemistry::reference::ReferenceValue;
    use crate::error::ErrorKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_exact_standard_gives_zero_delta() {
        let mut rng = StdRng::seed_from_u64(3);
        let measured = Ensemble::normal(1000.0, 0.0, 500, &mut rng).unwrap();
        let standard = Ensemble::normal(1000.0, 0.0, 500, &mut rng).unwrap();
        let result = delta_ensemble(&measured, &standard).unwrap();
        assert_eq!(result.std_dev(), 0.0);
        assert!(result.draws().iter().all(|&d| d == 0.0));
    }

    #[test]
    fn test_constant_delta_value() {
        let measured = Ensemble::constant(0.045, 10).unwrap();
        let standard = Ensemble::constant(0.0441626, 10).unwrap();
        let result = delta_ensemble(&measured, &standard).unwrap();
        let expected = (0.045 / 0.0441626 - 1.0) * 1000.0;
        assert!((result.mean() - expected).abs() < 1e-9);
        assert_eq!(result.std_dev(), 0.0);
    }

    #[test]
    fn test_standard_lookup_failure() {
        let mut rng = StdRng::seed_from_u64(3);
        let method = Method::from_labels(&["13C/12C"]).unwrap();
        let err = standard_ensembles(&method, "VSMOW", &ReferenceTables::builtin(), 10, &mut rng).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn test_hydride_has_no_standard() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut tables = ReferenceTables::empty();
        let ratio = Ratio::parse("34S/32S").unwrap();
        tables.insert_delta_standard(Element::Sulphur, "VCDT", ratio, ReferenceValue::new(0.0441626, 0.0));
        let method = Method::from_labels(&["34S/32S", "32S1H/32S"]).unwrap();
        let standards = standard_ensembles(&method, "VCDT", &tables, 10, &mut rng).unwrap();
        assert_eq!(standards.len(), 1);
        assert!(standards[&ratio].draws().iter().all(|&v| v == 0.0441626));
    }
}
