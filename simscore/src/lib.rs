// error and configuration
pub mod error;
pub mod config;

// chemistry module
pub mod chemistry {
    pub mod constants;
    pub mod isotope;
    pub mod reference;
}

// algorithm module
pub mod algorithm {
    pub mod robust;
    pub mod regression;
}

// data module
pub mod data {
    pub mod ensemble;
    pub mod spot;
    pub mod sample;
}

// reduction pipeline, in execution order
pub mod reduction {
    pub mod detector;
    pub mod ratios;
    pub mod delta;
    pub mod drift;
    pub mod calibration;
    pub mod cap;
    pub mod run;
}

pub use chemistry::isotope::{Element, Isotope, Method, Ratio};
pub use chemistry::reference::{ReferenceTables, ReferenceValue};
pub use config::ReductionConfig;
pub use data::ensemble::{Ensemble, Estimate};
pub use data::sample::Sample;
pub use data::spot::{DetectorParameters, MassPeak, Spot, StagePosition};
pub use error::{ErrorKind, Result, SimsError};
pub use reduction::drift::DriftMode;
pub use reduction::run::{Reducer, RunContext, RunSummary, Stage};
