use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use simscore::{Element, Method, Ratio, Reducer, ReductionConfig, ReferenceTables, ReferenceValue, RunSummary, Sample};

/// A delta standard value added to or replacing a built-in one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardEntry {
    pub element: Element,
    pub standard: String,
    pub ratio: Ratio,
    pub value: ReferenceValue,
}

/// A certified reference material value added to or replacing a built-in one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEntry {
    pub element: Element,
    pub material: String,
    pub reference_material: String,
    pub ratio: Ratio,
    pub value: ReferenceValue,
}

/// A parsed SIMS session as written by the import step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunFile {
    #[serde(default)]
    pub config: ReductionConfig,
    pub method: Method,
    pub samples: Vec<Sample>,
    #[serde(default)]
    pub delta_standards: Vec<StandardEntry>,
    #[serde(default)]
    pub calibrations: Vec<CalibrationEntry>,
}

impl RunFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("{} is not a valid run file", path.display()))
    }

    /// Built-in reference tables with the run file's own entries on top.
    pub fn tables(&self) -> ReferenceTables {
        let mut tables = ReferenceTables::builtin();
        for entry in &self.delta_standards {
            tables.insert_delta_standard(entry.element, &entry.standard, entry.ratio, entry.value);
        }
        for entry in &self.calibrations {
            tables.insert_calibration(entry.element, &entry.material, &entry.reference_material, entry.ratio, entry.value);
        }
        tables
    }

    /// Runs the whole pipeline over the samples and summarises the result.
    pub fn reduce(&mut self) -> Result<RunSummary> {
        let reducer = Reducer::new(self.config.clone(), self.tables(), self.method.clone()).context("invalid reduction settings")?;
        let context = reducer.reduce(&mut self.samples).context("reduction failed")?;
        Ok(context.summary(&self.samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUN: &str = r#"{
        "config": { "ensemble_size": 50, "material": "Pyrite", "primary_reference_material": "Lab-1" },
        "method": ["34S/32S"],
        "calibrations": [
            { "element": "Sulphur", "material": "Pyrite", "reference_material": "Lab-1", "ratio": "34S/32S",
              "value": { "mean": 3.1, "uncertainty": 0.0 } }
        ],
        "samples": [
            { "name": "Lab-1", "is_primary_reference": true, "spots": [
                { "sample": "Lab-1", "id": "1", "timestamp": "2024-05-02T09:00:00Z", "primary_current": 2.0,
                  "peaks": {
                    "32S": { "isotope": "32S", "raw_counts": ["1E6", "1E6", "1E6"] },
                    "34S": { "isotope": "34S", "raw_counts": ["4.4E4", "4.4E4", "4.4E4"] } } },
                { "sample": "Lab-1", "id": "2", "timestamp": "2024-05-02T09:20:00Z", "primary_current": 2.0,
                  "peaks": {
                    "32S": { "isotope": "32S", "raw_counts": ["1E6", "1E6", "1E6"] },
                    "34S": { "isotope": "34S", "raw_counts": ["4.4E4", "4.4E4", "4.4E4"] } } }
            ] }
        ]
    }"#;

    #[test]
    fn test_parse_and_reduce() {
        let mut run: RunFile = serde_json::from_str(RUN).unwrap();
        assert_eq!(run.config.ensemble_size, 50);
        assert_eq!(run.config.seed, 42);
        assert!(run.tables().calibration(Element::Sulphur, "Pyrite", "Lab-1", &"34S/32S".parse().unwrap()).is_ok());

        let summary = run.reduce().unwrap();
        assert_eq!(summary.spots.len(), 2);
        let calibrated = summary.spots[0].ratios[0].alpha_corrected.unwrap();
        assert!((calibrated.mean - 3.1).abs() < 1e-9);
    }

    #[test]
    fn test_reduction_error_has_context() {
        let mut run: RunFile = serde_json::from_str(RUN).unwrap();
        run.config.primary_reference_material = "Missing".to_string();
        let err = run.reduce().unwrap_err();
        assert!(format!("{err:#}").contains("no primary reference material data available"));
    }
}
