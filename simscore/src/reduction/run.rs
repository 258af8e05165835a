use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::chemistry::isotope::{Method, Ratio};
use crate::chemistry::reference::ReferenceTables;
use crate::config::ReductionConfig;
use crate::data::ensemble::{Ensemble, Estimate};
use crate::data::sample::Sample;
use crate::data::spot::RatioSummary;
use crate::error::Result;
use crate::reduction::calibration::{self, SecondaryCheck};
use crate::reduction::drift::{self, DriftMode, RatioResults};
use crate::reduction::{cap, delta, detector, ratios};

/// Pipeline stages in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Detector,
    Ratios,
    Delta,
    Drift,
    Calibration,
    Cap,
}

impl Stage {
    pub const ALL: [Stage; 6] = [Stage::Detector, Stage::Ratios, Stage::Delta, Stage::Drift, Stage::Calibration, Stage::Cap];

    fn index(self) -> u64 {
        self as u64
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Detector => "detector",
            Stage::Ratios => "ratios",
            Stage::Delta => "delta",
            Stage::Drift => "drift",
            Stage::Calibration => "calibration",
            Stage::Cap => "cap",
        };
        write!(f, "{name}")
    }
}

/// Drift characterisation of one ratio as reported to callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriftSummary {
    pub ratio: Ratio,
    pub mode: DriftMode,
    /// Per second of relative time.
    pub slope: Estimate,
    pub intercept: Estimate,
    pub r_squared: f64,
    pub curvilinear_r_squared: Option<f64>,
    pub n_reference_spots: usize,
}

/// Run-wide results, rebuilt from scratch by every pipeline execution.
#[derive(Clone, Debug, PartialEq)]
pub struct RunContext {
    t_zero: f64,
    ensemble_size: usize,
    /// Method order.
    ratios: Vec<Ratio>,
    drift_modes: BTreeMap<Ratio, DriftMode>,
    drift: BTreeMap<Ratio, RatioResults>,
    alpha: BTreeMap<Ratio, Ensemble>,
    secondary: BTreeMap<Ratio, SecondaryCheck>,
}

impl RunContext {
    /// Median acquisition time of the unflagged primary reference spots, epoch seconds.
    pub fn t_zero(&self) -> f64 {
        self.t_zero
    }

    pub fn ensemble_size(&self) -> usize {
        self.ensemble_size
    }

    pub fn drift(&self, ratio: &Ratio) -> Option<DriftSummary> {
        let results = self.drift.get(ratio)?;
        Some(DriftSummary {
            ratio: *ratio,
            mode: self.drift_modes.get(ratio).copied().unwrap_or_default(),
            slope: results.slope.estimate(),
            intercept: results.intercept.estimate(),
            r_squared: results.r_squared,
            curvilinear_r_squared: results.curvilinear.as_ref().map(|c| c.r_squared),
            n_reference_spots: results.relative_times.len(),
        })
    }

    /// Full per-draw drift characterisation.
    pub fn drift_results(&self, ratio: &Ratio) -> Option<&RatioResults> {
        self.drift.get(ratio)
    }

    pub fn alpha(&self, ratio: &Ratio) -> Option<Estimate> {
        self.alpha.get(ratio).map(Ensemble::estimate)
    }

    pub fn secondary_check(&self, ratio: &Ratio) -> Option<&SecondaryCheck> {
        self.secondary.get(ratio)
    }

    /// Everything the run produced, as plain estimates, ratios in method order.
    pub fn summary(&self, samples: &[Sample]) -> RunSummary {
        let ratios = &self.ratios;
        let spots = samples
            .iter()
            .flat_map(|sample| sample.spots.iter())
            .map(|spot| SpotSummary {
                sample: spot.sample.clone(),
                spot: spot.id.clone(),
                timestamp: spot.timestamp,
                is_flagged: spot.is_flagged,
                secondary_ion_yield: spot.secondary_ion_yield,
                ratios: ratios.iter().filter_map(|r| spot.summary(r)).collect(),
            })
            .collect();

        RunSummary {
            t_zero: self.t_zero,
            ensemble_size: self.ensemble_size,
            drift: ratios.iter().filter_map(|r| self.drift(r)).collect(),
            alpha: self.alpha.iter().map(|(r, a)| (*r, a.estimate())).collect(),
            secondary: self.secondary.clone(),
            spots,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpotSummary {
    pub sample: String,
    pub spot: String,
    pub timestamp: DateTime<Utc>,
    pub is_flagged: bool,
    pub secondary_ion_yield: Option<f64>,
    pub ratios: Vec<RatioSummary>,
}

/// Read-only export of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub t_zero: f64,
    pub ensemble_size: usize,
    pub drift: Vec<DriftSummary>,
    pub alpha: BTreeMap<Ratio, Estimate>,
    pub secondary: BTreeMap<Ratio, SecondaryCheck>,
    pub spots: Vec<SpotSummary>,
}

/// Runs the reduction pipeline for one method over a set of samples.
#[derive(Clone, Debug)]
pub struct Reducer {
    config: ReductionConfig,
    tables: ReferenceTables,
    method: Method,
}

impl Reducer {
    pub fn new(config: ReductionConfig, tables: ReferenceTables, method: Method) -> Result<Self> {
        config.validate()?;
        Ok(Reducer { config, tables, method })
    }

    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn tables(&self) -> &ReferenceTables {
        &self.tables
    }

    /// Runs every stage.
    pub fn reduce(&self, samples: &mut [Sample]) -> Result<RunContext> {
        self.reduce_from(Stage::Detector, samples)
    }

    /// Re-runs the pipeline from `stage` onwards, keeping the results of earlier stages.
    ///
    /// The drift and calibration stages aggregate over all samples, so a re-run always
    /// starts at the drift stage at the latest. The stages work on a copy of the samples
    /// that replaces them only once every stage and the secondary check have succeeded; a
    /// failing invocation leaves `samples` exactly as they were.
    pub fn reduce_from(&self, stage: Stage, samples: &mut [Sample]) -> Result<RunContext> {
        let from = stage.min(Stage::Drift);
        if from != stage {
            debug!("re-running from {from} instead of {stage}, run-wide results are rebuilt");
        }
        let config = &self.config;
        let method = &self.method;
        info!("reducing {} sample(s) from the {from} stage", samples.len());

        let mut work = samples.to_vec();
        if from <= Stage::Detector {
            detector::run(&mut work, method, config.detector_max_outliers)?;
        }
        if from <= Stage::Ratios {
            ratios::run(&mut work, method, config)?;
        }
        if from <= Stage::Delta {
            delta::run(&mut work, method, config, &self.tables, &mut self.rng(Stage::Delta))?;
        }
        let (t_zero, drift) = drift::run(&mut work, method, config)?;
        let alpha = calibration::run(&mut work, method, config, &self.tables, &mut self.rng(Stage::Calibration))?;
        cap::run(&mut work, method)?;
        let secondary = calibration::secondary_check(&work, method, config, &self.tables)?;
        samples.swap_with_slice(&mut work);

        let drift_modes = method.ratios().iter().map(|r| (*r, config.drift_mode(r))).collect();
        info!("run complete, t-zero {t_zero:.1}");
        Ok(RunContext {
            t_zero,
            ensemble_size: config.ensemble_size,
            ratios: method.ratios().to_vec(),
            drift_modes,
            drift,
            alpha,
            secondary,
        })
    }

    // one seeded stream per stage
    fn rng(&self, stage: Stage) -> StdRng {
        StdRng::seed_from_u64(self.config.seed.wrapping_add(stage.index()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(Stage::Detector < Stage::Ratios);
        assert!(Stage::Calibration < Stage::Cap);
        assert_eq!(Stage::Cap.min(Stage::Drift), Stage::Drift);
        assert_eq!(Stage::ALL.iter().map(|s| s.index()).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(Stage::Delta.to_string(), "delta");
    }

    #[test]
    fn test_reducer_validates_config() {
        let config = ReductionConfig { ensemble_size: 0, ..Default::default() };
        let method = Method::from_labels(&["34S/32S"]).unwrap();
        assert!(Reducer::new(config, ReferenceTables::builtin(), method).is_err());
    }
}
