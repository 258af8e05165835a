use log::info;

use crate::chemistry::constants::{MDF_17O, MDF_33S, MDF_36S, PER_MIL};
use crate::chemistry::isotope::{Element, Isotope, Method, Ratio};
use crate::data::ensemble::Ensemble;
use crate::data::sample::Sample;
use crate::data::spot::Spot;
use crate::error::{Result, SimsError};

/// A minor-isotope ratio, the ratio it is compared with and their mass-dependent exponent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CapDefinition {
    pub ratio: Ratio,
    pub relative: Ratio,
    pub mdf: f64,
}

/// CAP definitions of an element; empty for elements with fewer than three isotopes.
pub fn definitions(element: Element) -> Vec<CapDefinition> {
    match element {
        Element::Sulphur => vec![
            CapDefinition { ratio: Ratio::of(Isotope::S33, Isotope::S32), relative: Ratio::of(Isotope::S34, Isotope::S32), mdf: MDF_33S },
            CapDefinition { ratio: Ratio::of(Isotope::S36, Isotope::S32), relative: Ratio::of(Isotope::S34, Isotope::S32), mdf: MDF_36S },
        ],
        Element::Oxygen => vec![CapDefinition {
            ratio: Ratio::of(Isotope::O17, Isotope::O16),
            relative: Ratio::of(Isotope::O18, Isotope::O16),
            mdf: MDF_17O,
        }],
        Element::Carbon | Element::Chlorine => Vec::new(),
    }
}

/// Mass-independent residual of `delta_x` against `delta_relative`, ‰.
///
/// # Examples
///
/// ```
/// use simscore::reduction::cap::cap_value;
///
/// assert_eq!(cap_value(9.0, 0.0, 1.0), 9.0);
/// ```
pub fn cap_value(delta_x: f64, delta_relative: f64, mdf: f64) -> f64 {
    delta_x - PER_MIL * ((delta_relative / PER_MIL + 1.0).powf(mdf) - 1.0)
}

pub fn cap(delta_x: &Ensemble, delta_relative: &Ensemble, mdf: f64) -> Result<Ensemble> {
    delta_x.zip_with(delta_relative, |x, r| cap_value(x, r, mdf))
}

fn calibrated<'a>(spot: &'a Spot, ratio: &Ratio) -> Result<&'a Ensemble> {
    spot.ratio_data(ratio)
        .and_then(|d| d.alpha_corrected.as_ref())
        .ok_or_else(|| SimsError::precondition(format!("spot {}/{}: {ratio} is not calibrated", spot.sample, spot.id)))
}

/// Computes CAP values from the calibrated deltas of every spot.
///
/// Only definitions whose two ratios are both part of the method are evaluated. The
/// result is stored on the minor-isotope ratio.
pub fn run(samples: &mut [Sample], method: &Method) -> Result<()> {
    let active: Vec<CapDefinition> = definitions(method.element())
        .into_iter()
        .filter(|d| method.contains(&d.ratio) && method.contains(&d.relative))
        .collect();
    if active.is_empty() {
        return Ok(());
    }

    let mut staged = Vec::new();
    for (i, sample) in samples.iter().enumerate() {
        for (j, spot) in sample.spots.iter().enumerate() {
            for definition in &active {
                let value = cap(calibrated(spot, &definition.ratio)?, calibrated(spot, &definition.relative)?, definition.mdf)?;
                staged.push((i, j, definition.ratio, value));
            }
        }
    }

    for (i, j, ratio, value) in staged {
        if let Some(data) = samples[i].spots[j].ratio_data_mut(&ratio) {
            data.cap = Some(value);
        }
    }
    info!("CAP computed for {} ratio(s)", active.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_reduces_to_delta() {
        let x = Ensemble::constant(9.0, 4).unwrap();
        let rel = Ensemble::constant(0.0, 4).unwrap();
        let result = cap(&x, &rel, 1.0).unwrap();
        assert!(result.draws().iter().all(|&v| v == 9.0));
    }

    #[test]
    fn test_mass_dependent_gives_zero_cap() {
        let d34: f64 = 10.0;
        let d33 = PER_MIL * ((d34 / PER_MIL + 1.0).powf(MDF_33S) - 1.0);
        assert!(cap_value(d33, d34, MDF_33S).abs() < 1e-12);
    }

    #[test]
    fn test_definitions() {
        assert_eq!(definitions(Element::Sulphur).len(), 2);
        assert_eq!(definitions(Element::Oxygen)[0].mdf, 0.52);
        assert!(definitions(Element::Carbon).is_empty());
    }
}
