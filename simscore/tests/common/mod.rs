#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use simscore::{
    DetectorParameters, Element, Isotope, MassPeak, Method, Ratio, ReductionConfig, ReferenceTables, ReferenceValue, Sample, Spot,
};

pub const S32_CPS: f64 = 1.0e6;
pub const S34_CPS: f64 = 44_162.6;
pub const S33_CPS: f64 = 7_877.2;
pub const S36_CPS: f64 = 153.3;

pub fn method() -> Method {
    Method::from_labels(&["34S/32S", "32S1H/32S"]).unwrap()
}

pub fn s34() -> Ratio {
    Ratio::parse("34S/32S").unwrap()
}

pub fn hydride() -> Ratio {
    Ratio::parse("32S1H/32S").unwrap()
}

pub fn sulphur_method() -> Method {
    Method::from_labels(&["34S/32S", "33S/32S", "36S/32S"]).unwrap()
}

pub fn s33() -> Ratio {
    Ratio::parse("33S/32S").unwrap()
}

pub fn s36() -> Ratio {
    Ratio::parse("36S/32S").unwrap()
}

/// VCDT and a pyrite reference material "Ref" certified at 0‰.
pub fn tables(standard_uncertainty: f64, certified_uncertainty: f64) -> ReferenceTables {
    let mut tables = ReferenceTables::empty();
    tables.insert_delta_standard(Element::Sulphur, "VCDT", s34(), ReferenceValue::new(0.0441626, standard_uncertainty));
    tables.insert_calibration(Element::Sulphur, "Pyrite", "Ref", s34(), ReferenceValue::new(0.0, certified_uncertainty));
    tables.insert_calibration(Element::Sulphur, "Pyrite", "Check", s34(), ReferenceValue::new(0.0, certified_uncertainty));
    tables
}

/// VCDT for all three sulphur ratios and "Ref" certified at 0‰, without uncertainties.
pub fn sulphur_tables() -> ReferenceTables {
    let mut tables = ReferenceTables::empty();
    for (ratio, value) in [(s34(), 0.0441626), (s33(), 0.0078772), (s36(), 0.0001533)] {
        tables.insert_delta_standard(Element::Sulphur, "VCDT", ratio, ReferenceValue::new(value, 0.0));
        tables.insert_calibration(Element::Sulphur, "Pyrite", "Ref", ratio, ReferenceValue::new(0.0, 0.0));
    }
    tables
}

pub fn config(ensemble_size: usize) -> ReductionConfig {
    ReductionConfig {
        ensemble_size,
        material: "Pyrite".to_string(),
        primary_reference_material: "Ref".to_string(),
        ..Default::default()
    }
}

/// A spot acquired `minutes` after the session start, with one count rate per cycle and
/// species.
pub fn spot(id: &str, minutes: i64, s32: &[f64], s34: &[f64], s32h: &[f64]) -> Spot {
    let start = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();
    Spot::new("", id, start + Duration::minutes(minutes), 2.5)
        .with_peak(MassPeak::from_counts(Isotope::S32, s32, DetectorParameters::default()))
        .with_peak(MassPeak::from_counts(Isotope::S34, s34, DetectorParameters::default()))
        .with_peak(MassPeak::from_counts(Isotope::S32H1, s32h, DetectorParameters::default()))
}

/// A steady spot fractionated from VCDT by `delta34` ‰ along the mass-dependent line.
pub fn fractionated_spot(id: &str, minutes: i64, delta34: f64, cycles: usize) -> Spot {
    let start = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();
    let factor = 1.0 + delta34 / 1000.0;
    let peak = |isotope, cps: f64| MassPeak::from_counts(isotope, &vec![cps; cycles], DetectorParameters::default());
    Spot::new("", id, start + Duration::minutes(minutes), 2.5)
        .with_peak(peak(Isotope::S32, S32_CPS))
        .with_peak(peak(Isotope::S33, S33_CPS * factor.powf(0.515)))
        .with_peak(peak(Isotope::S34, S34_CPS * factor))
        .with_peak(peak(Isotope::S36, S36_CPS * factor.powf(1.90)))
}

/// A spot whose every cycle has the same count rates.
pub fn steady_spot(id: &str, minutes: i64, hydride_cps: f64, cycles: usize) -> Spot {
    spot(id, minutes, &vec![S32_CPS; cycles], &vec![S34_CPS; cycles], &vec![hydride_cps; cycles])
}

pub fn sample(name: &str, spots: Vec<Spot>) -> Sample {
    let mut sample = Sample::new(name);
    for spot in spots {
        sample.push_spot(spot);
    }
    sample
}

pub fn primary(name: &str, spots: Vec<Spot>) -> Sample {
    Sample { is_primary_reference: true, ..sample(name, spots) }
}
