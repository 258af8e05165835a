use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chemistry::constants::DEFAULT_ENSEMBLE_SIZE;
use crate::chemistry::isotope::{Element, Ratio};
use crate::error::{Result, SimsError};
use crate::reduction::drift::DriftMode;

/// Parameters of one reduction run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Number of Monte-Carlo draws of every ensemble in the run (default: 10000)
    pub ensemble_size: usize,
    /// Seed of the run random number generator (default: 42)
    pub seed: u64,
    /// Probability below which further cycle outliers are not expected (default: 0.01)
    pub cutoff_probability: f64,
    /// Probability of a single cycle being an outlier (default: 0.01)
    pub single_outlier_probability: f64,
    /// Outliers that may be removed from a mass peak's count-rate series (default: 1)
    pub detector_max_outliers: usize,
    /// Delta standard, `None` for the element's international standard
    pub delta_standard: Option<String>,
    /// Matrix of the analysed material, e.g. "Pyrite"
    pub material: String,
    /// Name of the primary reference material
    pub primary_reference_material: String,
    /// Name of the secondary reference material, if one is checked
    pub secondary_reference_material: Option<String>,
    /// Drift correction per ratio
    pub drift_modes: BTreeMap<Ratio, DriftMode>,
    /// Drift correction of ratios missing from `drift_modes` (default: linear)
    pub default_drift_mode: DriftMode,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        ReductionConfig {
            ensemble_size: DEFAULT_ENSEMBLE_SIZE,
            seed: 42,
            cutoff_probability: 0.01,
            single_outlier_probability: 0.01,
            detector_max_outliers: 1,
            delta_standard: None,
            material: String::new(),
            primary_reference_material: String::new(),
            secondary_reference_material: None,
            drift_modes: BTreeMap::new(),
            default_drift_mode: DriftMode::Linear,
        }
    }
}

impl ReductionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ensemble_size == 0 {
            return Err(SimsError::input("ensemble size must be positive"));
        }
        for (name, p) in [
            ("cutoff", self.cutoff_probability),
            ("single outlier", self.single_outlier_probability),
        ] {
            if !(p > 0.0 && p < 1.0) {
                return Err(SimsError::input(format!("{name} probability {p} outside (0, 1)")));
            }
        }
        Ok(())
    }

    pub fn drift_mode(&self, ratio: &Ratio) -> DriftMode {
        self.drift_modes.get(ratio).copied().unwrap_or(self.default_drift_mode)
    }

    pub fn delta_standard(&self, element: Element) -> &str {
        self.delta_standard.as_deref().unwrap_or(element.default_delta_standard())
    }
}
