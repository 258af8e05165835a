use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::algorithm::robust::ResistantEstimate;
use crate::chemistry::isotope::{Isotope, Ratio};
use crate::data::ensemble::{Ensemble, Estimate};

/// Detector parameters reported by the instrument for one mass peak.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorParameters {
    /// Detector yield, fraction of ions counted.
    #[serde(rename = "yield")]
    pub detector_yield: f64,
    /// Background count rate in counts per second.
    pub background: f64,
    /// Dead time in ns, 0 for detectors without dead time.
    pub dead_time: f64,
}

impl Default for DetectorParameters {
    fn default() -> Self {
        DetectorParameters { detector_yield: 1.0, background: 0.0, dead_time: 0.0 }
    }
}

/// Count-rate series of one isotope within one spot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MassPeak {
    pub isotope: Isotope,
    /// Per-cycle count rates as written by the instrument, e.g. `"1.234E+05"`.
    pub raw_counts: Vec<String>,
    #[serde(default)]
    pub detector: DetectorParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detector_corrected_cps: Option<Vec<f64>>,
    /// Outlier-resistant mean and standard error of the corrected count rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cps: Option<Estimate>,
}

impl MassPeak {
    pub fn new(isotope: Isotope, raw_counts: Vec<String>, detector: DetectorParameters) -> Self {
        MassPeak { isotope, raw_counts, detector, detector_corrected_cps: None, cps: None }
    }

    /// Convenience constructor for count rates already held as numbers.
    pub fn from_counts(isotope: Isotope, counts: &[f64], detector: DetectorParameters) -> Self {
        MassPeak::new(isotope, counts.iter().map(|c| format!("{c:E}")).collect(), detector)
    }

    pub fn n_cycles(&self) -> usize {
        self.raw_counts.len()
    }
}

/// Stage coordinates and beam deflection of a spot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StagePosition {
    pub x: f64,
    pub y: f64,
    pub deflection_x: f64,
    pub deflection_y: f64,
}

/// Per-ratio statistics of one spot, automatic or from a user cycle selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatioStatistics {
    pub mean: f64,
    pub std_error: f64,
    pub n_used: usize,
    pub removed_values: Vec<f64>,
    pub fences: (f64, f64),
}

impl From<&ResistantEstimate> for RatioStatistics {
    fn from(estimate: &ResistantEstimate) -> Self {
        RatioStatistics {
            mean: estimate.mean,
            std_error: estimate.std_error(),
            n_used: estimate.n_used,
            removed_values: estimate.removed_values.clone(),
            fences: estimate.fences,
        }
    }
}

/// Everything derived for one ratio on one spot, filled stage by stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatioData {
    /// One ratio per analytical cycle.
    pub raw: Vec<f64>,
    pub statistics: RatioStatistics,
    /// `true` for cycles left out of `statistics`.
    pub excluded: Vec<bool>,
    /// Cycle exclusions chosen by the user; when set, no automatic pruning happens.
    #[serde(default)]
    pub user_exclusions: Option<Vec<bool>>,
    #[serde(default)]
    pub ratio_ensemble: Option<Ensemble>,
    #[serde(default)]
    pub delta: Option<Ensemble>,
    #[serde(default)]
    pub drift_corrected: Option<Ensemble>,
    #[serde(default)]
    pub alpha_corrected: Option<Ensemble>,
    #[serde(default)]
    pub cap: Option<Ensemble>,
}

impl RatioData {
    pub fn new(raw: Vec<f64>, statistics: RatioStatistics, excluded: Vec<bool>) -> Self {
        RatioData {
            raw,
            statistics,
            excluded,
            user_exclusions: None,
            ratio_ensemble: None,
            delta: None,
            drift_corrected: None,
            alpha_corrected: None,
            cap: None,
        }
    }

    /// Drops everything computed from `statistics` by later stages.
    pub(crate) fn clear_derived(&mut self) {
        self.ratio_ensemble = None;
        self.delta = None;
        self.drift_corrected = None;
        self.alpha_corrected = None;
        self.cap = None;
    }

    /// Ensemble the drift stage works on: the delta if the ratio has one, else the ratio itself.
    pub fn drift_input(&self, ratio: &Ratio) -> Option<&Ensemble> {
        if ratio.has_delta() {
            self.delta.as_ref()
        } else {
            self.ratio_ensemble.as_ref()
        }
    }
}

/// Read-only summary of a ratio on a spot at every stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatioSummary {
    pub ratio: Ratio,
    /// Outlier-resistant mean and standard error of the cycle ratios.
    pub measured: Estimate,
    pub n_used: usize,
    pub n_cycles: usize,
    pub delta: Option<Estimate>,
    pub drift_corrected: Option<Estimate>,
    pub alpha_corrected: Option<Estimate>,
    pub cap: Option<Estimate>,
}

/// One analysis location within a sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub sample: String,
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Primary beam current in nA.
    pub primary_current: f64,
    #[serde(default)]
    pub position: StagePosition,
    pub peaks: BTreeMap<Isotope, MassPeak>,
    #[serde(default)]
    pub is_flagged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_ion_yield: Option<f64>,
    #[serde(default)]
    pub ratios: BTreeMap<Ratio, RatioData>,
}

impl Spot {
    pub fn new(sample: &str, id: &str, timestamp: DateTime<Utc>, primary_current: f64) -> Self {
        Spot {
            sample: sample.to_string(),
            id: id.to_string(),
            timestamp,
            primary_current,
            position: StagePosition::default(),
            peaks: BTreeMap::new(),
            is_flagged: false,
            secondary_ion_yield: None,
            ratios: BTreeMap::new(),
        }
    }

    pub fn with_position(mut self, position: StagePosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_peak(mut self, peak: MassPeak) -> Self {
        self.add_peak(peak);
        self
    }

    pub fn add_peak(&mut self, peak: MassPeak) {
        self.peaks.insert(peak.isotope, peak);
    }

    /// Seconds since the Unix epoch, with sub-second precision.
    pub fn epoch_seconds(&self) -> f64 {
        self.timestamp.timestamp() as f64 + f64::from(self.timestamp.timestamp_subsec_nanos()) * 1e-9
    }

    pub fn set_flagged(&mut self, flagged: bool) {
        self.is_flagged = flagged;
    }

    pub fn ratio_data(&self, ratio: &Ratio) -> Option<&RatioData> {
        self.ratios.get(ratio)
    }

    pub(crate) fn ratio_data_mut(&mut self, ratio: &Ratio) -> Option<&mut RatioData> {
        self.ratios.get_mut(ratio)
    }

    /// Mean and standard error of a ratio at every stage that has run.
    pub fn summary(&self, ratio: &Ratio) -> Option<RatioSummary> {
        let data = self.ratios.get(ratio)?;
        Some(RatioSummary {
            ratio: *ratio,
            measured: Estimate::new(data.statistics.mean, data.statistics.std_error),
            n_used: data.statistics.n_used,
            n_cycles: data.raw.len(),
            delta: data.delta.as_ref().map(Ensemble::estimate),
            drift_corrected: data.drift_corrected.as_ref().map(Ensemble::estimate),
            alpha_corrected: data.alpha_corrected.as_ref().map(Ensemble::estimate),
            cap: data.cap.as_ref().map(Ensemble::estimate),
        })
    }

    pub fn cap(&self, ratio: &Ratio) -> Option<Estimate> {
        self.ratios.get(ratio)?.cap.as_ref().map(Ensemble::estimate)
    }
}
