use serde::{Deserialize, Serialize};

use crate::data::spot::Spot;
use crate::error::{Result, SimsError};

/// A named collection of spots.
///
/// Spots are only ever appended; excluding one from the reduction is done by flagging it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub name: String,
    #[serde(default)]
    pub spots: Vec<Spot>,
    #[serde(default)]
    pub is_primary_reference: bool,
    #[serde(default)]
    pub is_secondary_reference: bool,
}

impl Sample {
    pub fn new(name: &str) -> Self {
        Sample {
            name: name.to_string(),
            spots: Vec::new(),
            is_primary_reference: false,
            is_secondary_reference: false,
        }
    }

    pub fn primary_reference(name: &str) -> Self {
        Sample { is_primary_reference: true, ..Sample::new(name) }
    }

    pub fn secondary_reference(name: &str) -> Self {
        Sample { is_secondary_reference: true, ..Sample::new(name) }
    }

    pub fn push_spot(&mut self, mut spot: Spot) {
        spot.sample = self.name.clone();
        self.spots.push(spot);
    }

    /// Spots that are not flagged.
    pub fn active_spots(&self) -> impl Iterator<Item = &Spot> {
        self.spots.iter().filter(|s| !s.is_flagged)
    }

    pub fn spot(&self, id: &str) -> Option<&Spot> {
        self.spots.iter().find(|s| s.id == id)
    }

    pub fn spot_mut(&mut self, id: &str) -> Option<&mut Spot> {
        self.spots.iter_mut().find(|s| s.id == id)
    }
}

fn single<'a, F>(samples: &'a [Sample], role: &str, is_role: F) -> Result<&'a Sample>
where
    F: Fn(&Sample) -> bool,
{
    let mut marked = samples.iter().filter(|s| is_role(*s));
    match (marked.next(), marked.next()) {
        (Some(sample), None) => Ok(sample),
        (None, _) => Err(SimsError::precondition(format!("no sample is marked as {role} reference material"))),
        (Some(_), Some(_)) => Err(SimsError::precondition(format!(
            "more than one sample is marked as {role} reference material"
        ))),
    }
}

/// The one sample marked as primary reference material.
pub fn primary_reference(samples: &[Sample]) -> Result<&Sample> {
    single(samples, "primary", |s| s.is_primary_reference)
}

/// The one sample marked as secondary reference material.
pub fn secondary_reference(samples: &[Sample]) -> Result<&Sample> {
    single(samples, "secondary", |s| s.is_secondary_reference)
}
