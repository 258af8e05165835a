use std::fmt;
use std::fmt::{Display, Formatter};

use rand::distributions::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use statrs::statistics::Statistics;

use crate::error::{Result, SimsError};

/// A reported value: mean with its standard error or standard deviation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub mean: f64,
    pub error: f64,
}

impl Estimate {
    pub fn new(mean: f64, error: f64) -> Self {
        Estimate { mean, error }
    }
}

impl Display for Estimate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} ± {:.4}", self.mean, self.error)
    }
}

/// A Monte-Carlo ensemble: a fixed number of simulated draws standing in for a value
/// and its uncertainty.
///
/// Arithmetic between ensembles is element-wise and requires equal draw counts; the
/// scalar mean and standard deviation are only ever derived on demand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Ensemble {
    draws: Vec<f64>,
}

impl TryFrom<Vec<f64>> for Ensemble {
    type Error = SimsError;

    fn try_from(draws: Vec<f64>) -> Result<Self> {
        Ensemble::from_draws(draws)
    }
}

impl From<Ensemble> for Vec<f64> {
    fn from(ensemble: Ensemble) -> Self {
        ensemble.draws
    }
}

impl Ensemble {
    pub fn from_draws(draws: Vec<f64>) -> Result<Self> {
        if draws.is_empty() {
            return Err(SimsError::input("ensemble without draws"));
        }
        Ok(Ensemble { draws })
    }

    pub fn constant(value: f64, size: usize) -> Result<Self> {
        Ensemble::from_draws(vec![value; size])
    }

    /// Draws `size` values from Normal(mean, std_dev).
    ///
    /// A zero standard deviation gives a constant ensemble.
    pub fn normal<R: Rng + ?Sized>(mean: f64, std_dev: f64, size: usize, rng: &mut R) -> Result<Self> {
        if !mean.is_finite() || !std_dev.is_finite() || std_dev < 0.0 {
            return Err(SimsError::input(format!("cannot sample Normal({mean}, {std_dev})")));
        }
        if std_dev == 0.0 {
            return Ensemble::constant(mean, size);
        }
        let normal = Normal::new(mean, std_dev).map_err(|e| SimsError::input(format!("normal distribution: {e}")))?;
        Ensemble::from_draws(normal.sample_iter(rng).take(size).collect())
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub fn draws(&self) -> &[f64] {
        &self.draws
    }

    pub fn mean(&self) -> f64 {
        self.draws.iter().mean()
    }

    /// Population standard deviation of the draws.
    pub fn std_dev(&self) -> f64 {
        self.draws.iter().population_std_dev()
    }

    pub fn estimate(&self) -> Estimate {
        Estimate::new(self.mean(), self.std_dev())
    }

    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> Ensemble {
        Ensemble { draws: self.draws.iter().map(|&v| f(v)).collect() }
    }

    fn check_size(&self, other: &Ensemble) -> Result<()> {
        if self.len() != other.len() {
            return Err(SimsError::EnsembleSizeMismatch { left: self.len(), right: other.len() });
        }
        Ok(())
    }

    /// Combines two ensembles draw by draw.
    pub fn zip_with<F: Fn(f64, f64) -> f64>(&self, other: &Ensemble, f: F) -> Result<Ensemble> {
        self.check_size(other)?;
        Ok(Ensemble {
            draws: self.draws.iter().zip(other.draws.iter()).map(|(&a, &b)| f(a, b)).collect(),
        })
    }

    /// Draw-wise mean over several ensembles.
    pub fn elementwise_mean(members: &[&Ensemble]) -> Result<Ensemble> {
        let first = members.first().ok_or_else(|| SimsError::input("no ensembles to average"))?;
        let mut sums = vec![0.0; first.len()];
        for member in members {
            first.check_size(member)?;
            for (sum, v) in sums.iter_mut().zip(member.draws.iter()) {
                *sum += v;
            }
        }
        let count = members.len() as f64;
        Ok(Ensemble { draws: sums.into_iter().map(|s| s / count).collect() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_constant_has_no_spread() {
        let ensemble = Ensemble::constant(1.5, 100).unwrap();
        assert_eq!(ensemble.len(), 100);
        assert_eq!(ensemble.mean(), 1.5);
        assert_eq!(ensemble.std_dev(), 0.0);
    }

    #[test]
    fn test_normal_zero_sigma_is_constant() {
        let mut rng = StdRng::seed_from_u64(1);
        let ensemble = Ensemble::normal(3.0, 0.0, 50, &mut rng).unwrap();
        assert!(ensemble.draws().iter().all(|&v| v == 3.0));
    }

    #[test]
    fn test_normal_moments() {
        let mut rng = StdRng::seed_from_u64(7);
        let ensemble = Ensemble::normal(10.0, 2.0, 20_000, &mut rng).unwrap();
        assert!((ensemble.mean() - 10.0).abs() < 0.1);
        assert!((ensemble.std_dev() - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_normal_rejects_negative_sigma() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(Ensemble::normal(1.0, -1.0, 10, &mut rng).is_err());
        assert!(Ensemble::normal(f64::NAN, 1.0, 10, &mut rng).is_err());
        assert!(Ensemble::normal(1.0, 1.0, 0, &mut rng).is_err());
    }

    #[test]
    fn test_size_mismatch() {
        let a = Ensemble::constant(1.0, 3).unwrap();
        let b = Ensemble::constant(1.0, 4).unwrap();
        let err = a.zip_with(&b, |x, y| x + y).unwrap_err();
        assert_eq!(err, SimsError::EnsembleSizeMismatch { left: 3, right: 4 });
        assert_eq!(err.kind(), ErrorKind::InputValidation);
        assert!(Ensemble::elementwise_mean(&[&a, &b]).is_err());
    }

    #[test]
    fn test_elementwise_mean() {
        let a = Ensemble::from_draws(vec![1.0, 2.0]).unwrap();
        let b = Ensemble::from_draws(vec![3.0, 6.0]).unwrap();
        let mean = Ensemble::elementwise_mean(&[&a, &b]).unwrap();
        assert_eq!(mean.draws(), &[2.0, 4.0]);
    }

    #[test]
    fn test_deserialize_needs_draws() {
        let ensemble: Ensemble = serde_json::from_str("[1.5, 2.5]").unwrap();
        assert_eq!(ensemble.draws(), &[1.5, 2.5]);
        assert_eq!(serde_json::to_string(&ensemble).unwrap(), "[1.5,2.5]");

        let err = serde_json::from_str::<Ensemble>("[]").unwrap_err();
        assert!(err.to_string().contains("ensemble without draws"));
    }
}
