use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::chemistry::isotope::{Element, Isotope, Ratio};
use crate::error::{Result, SimsError};

/// An accepted value and its 1σ uncertainty.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceValue {
    pub mean: f64,
    pub uncertainty: f64,
}

impl ReferenceValue {
    pub fn new(mean: f64, uncertainty: f64) -> Self {
        ReferenceValue { mean, uncertainty }
    }
}

type StandardKey = (Element, String);
type CalibrationKey = (Element, String, String);

/// Reference-material data consumed by the delta and SIMS calibration stages.
///
/// * delta standards: (element, standard name) -> ratio -> absolute isotope ratio
/// * SIMS calibration: (element, matrix, reference material) -> ratio -> certified delta (‰)
#[derive(Clone, Debug, Default)]
pub struct ReferenceTables {
    delta_standards: HashMap<StandardKey, HashMap<Ratio, ReferenceValue>>,
    calibrations: HashMap<CalibrationKey, HashMap<Ratio, ReferenceValue>>,
}

impl ReferenceTables {
    pub fn empty() -> Self {
        ReferenceTables::default()
    }

    /// Tables with the international delta standards and commonly used SIMS reference materials.
    pub fn builtin() -> Self {
        let mut tables = ReferenceTables::empty();

        // Baertschi (1976), Li et al. (1988)
        tables.insert_delta_standard(Element::Oxygen, "VSMOW", Ratio::of(Isotope::O18, Isotope::O16), ReferenceValue::new(0.0020052, 0.00000045));
        tables.insert_delta_standard(Element::Oxygen, "VSMOW", Ratio::of(Isotope::O17, Isotope::O16), ReferenceValue::new(0.0003799, 0.0000008));
        // Ding et al. (2001)
        tables.insert_delta_standard(Element::Sulphur, "VCDT", Ratio::of(Isotope::S34, Isotope::S32), ReferenceValue::new(0.0441626, 0.0000078));
        tables.insert_delta_standard(Element::Sulphur, "VCDT", Ratio::of(Isotope::S33, Isotope::S32), ReferenceValue::new(0.0078772, 0.0000015));
        tables.insert_delta_standard(Element::Sulphur, "VCDT", Ratio::of(Isotope::S36, Isotope::S32), ReferenceValue::new(0.0001533, 0.0000009));
        // Werner & Brand (2001)
        tables.insert_delta_standard(Element::Carbon, "VPDB", Ratio::of(Isotope::C13, Isotope::C12), ReferenceValue::new(0.0111802, 0.0000028));
        tables.insert_delta_standard(Element::Chlorine, "SMOC", Ratio::of(Isotope::Cl37, Isotope::Cl35), ReferenceValue::new(0.319627, 0.000010));

        let s34 = Ratio::of(Isotope::S34, Isotope::S32);
        let s33 = Ratio::of(Isotope::S33, Isotope::S32);
        let s36 = Ratio::of(Isotope::S36, Isotope::S32);
        for (material, reference, d34, d33, d36) in [
            ("Pyrite", "Sierra", (2.17, 0.28), (1.12, 0.15), (4.12, 0.55)),
            ("Pyrite", "Balmat", (15.1, 0.2), (7.77, 0.11), (28.7, 0.4)),
            ("Pyrite", "Ruttan", (1.2, 0.1), (0.62, 0.05), (2.28, 0.2)),
            ("Chalcopyrite", "Nifty-b", (-3.58, 0.23), (-1.84, 0.12), (-6.8, 0.45)),
        ] {
            tables.insert_calibration(Element::Sulphur, material, reference, s34, ReferenceValue::new(d34.0, d34.1));
            tables.insert_calibration(Element::Sulphur, material, reference, s33, ReferenceValue::new(d33.0, d33.1));
            tables.insert_calibration(Element::Sulphur, material, reference, s36, ReferenceValue::new(d36.0, d36.1));
        }

        let o18 = Ratio::of(Isotope::O18, Isotope::O16);
        let o17 = Ratio::of(Isotope::O17, Isotope::O16);
        for (material, reference, d18, d17) in [
            ("Zircon", "Temora 2", (8.20, 0.05), (4.26, 0.05)),
            ("Zircon", "91500", (9.86, 0.11), (5.13, 0.06)),
            ("Quartz", "UWQ-1", (12.33, 0.07), (6.41, 0.04)),
        ] {
            tables.insert_calibration(Element::Oxygen, material, reference, o18, ReferenceValue::new(d18.0, d18.1));
            tables.insert_calibration(Element::Oxygen, material, reference, o17, ReferenceValue::new(d17.0, d17.1));
        }

        tables.insert_calibration(Element::Carbon, "Calcite", "UWC-3", Ratio::of(Isotope::C13, Isotope::C12), ReferenceValue::new(-0.91, 0.04));
        tables.insert_calibration(Element::Chlorine, "Apatite", "Durango", Ratio::of(Isotope::Cl37, Isotope::Cl35), ReferenceValue::new(0.4, 0.2));

        tables
    }

    pub fn insert_delta_standard(&mut self, element: Element, standard: &str, ratio: Ratio, value: ReferenceValue) {
        self.delta_standards
            .entry((element, standard.to_string()))
            .or_default()
            .insert(ratio, value);
    }

    pub fn insert_calibration(&mut self, element: Element, material: &str, reference_material: &str, ratio: Ratio, value: ReferenceValue) {
        self.calibrations
            .entry((element, material.to_string(), reference_material.to_string()))
            .or_default()
            .insert(ratio, value);
    }

    /// Accepted absolute ratio of a delta standard.
    pub fn standard_ratio(&self, element: Element, standard: &str, ratio: &Ratio) -> Result<ReferenceValue> {
        let table = self
            .delta_standards
            .get(&(element, standard.to_string()))
            .ok_or_else(|| SimsError::precondition(format!("no delta standard '{standard}' for {element}")))?;

        table
            .get(ratio)
            .copied()
            .ok_or_else(|| SimsError::precondition(format!("delta standard '{standard}' has no value for {ratio}")))
    }

    /// Certified delta value of a reference material analysed in a given matrix.
    pub fn calibration(&self, element: Element, material: &str, reference_material: &str, ratio: &Ratio) -> Result<ReferenceValue> {
        self.calibrations
            .get(&(element, material.to_string(), reference_material.to_string()))
            .and_then(|table| table.get(ratio))
            .copied()
            .ok_or_else(|| {
                SimsError::precondition(format!(
                    "no primary reference material data available for {reference_material} ({material}, {element}, {ratio})"
                ))
            })
    }

    /// Names of the reference materials certified for a matrix, sorted.
    pub fn reference_materials(&self, element: Element, material: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .calibrations
            .keys()
            .filter(|(e, m, _)| *e == element && m == material)
            .map(|(_, _, name)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}
