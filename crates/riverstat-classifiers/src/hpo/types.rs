//! Search-space and trial types shared by the sampler and the study.
use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EnsembleError, Result};

/// One sampled hyper-parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Float(f64),
    Int(i64),
    Categorical(String),
}

impl ParameterValue {
    /// Get as float (ints are widened)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            ParameterValue::Categorical(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) => Some(*v as i64),
            ParameterValue::Categorical(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::Categorical(s) => Some(s),
            _ => None,
        }
    }
}

/// Parameter name to sampled value. Ordered so that iteration, and therefore
/// the sampler's consumption of random numbers, is reproducible.
pub type ParameterSet = BTreeMap<String, ParameterValue>;

/// Range a single hyper-parameter is drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterDomain {
    /// Continuous range [low, high], optionally log-scaled
    Continuous { low: f64, high: f64, log_scale: bool },
    /// Integer range [low, high], inclusive
    Discrete { low: i64, high: i64 },
    Categorical { choices: Vec<String> },
}

impl ParameterDomain {
    fn validate(&self, name: &str) -> Result<()> {
        let ok = match self {
            ParameterDomain::Continuous {
                low,
                high,
                log_scale,
            } => low.is_finite() && high.is_finite() && low <= high && (!log_scale || *low > 0.0),
            ParameterDomain::Discrete { low, high } => low <= high,
            ParameterDomain::Categorical { choices } => !choices.is_empty(),
        };
        if ok {
            Ok(())
        } else {
            Err(EnsembleError::InvalidConfig(format!(
                "parameter {} has an empty or malformed domain: {:?}",
                name, self
            )))
        }
    }

    /// Draw a value uniformly (log-uniformly for log-scaled ranges).
    pub fn sample<R: Rng>(&self, rng: &mut R) -> ParameterValue {
        match self {
            ParameterDomain::Continuous {
                low,
                high,
                log_scale,
            } => {
                let value = if *log_scale {
                    let (log_low, log_high) = (low.ln(), high.ln());
                    (log_low + rng.gen::<f64>() * (log_high - log_low)).exp()
                } else {
                    low + rng.gen::<f64>() * (high - low)
                };
                ParameterValue::Float(value.clamp(*low, *high))
            }
            ParameterDomain::Discrete { low, high } => {
                ParameterValue::Int(rng.gen_range(*low..=*high))
            }
            ParameterDomain::Categorical { choices } => {
                let idx = rng.gen_range(0..choices.len());
                ParameterValue::Categorical(choices[idx].clone())
            }
        }
    }

    pub fn contains(&self, value: &ParameterValue) -> bool {
        match (self, value) {
            (ParameterDomain::Continuous { low, high, .. }, ParameterValue::Float(v)) => {
                *v >= *low && *v <= *high
            }
            (ParameterDomain::Discrete { low, high }, ParameterValue::Int(v)) => {
                *v >= *low && *v <= *high
            }
            (ParameterDomain::Categorical { choices }, ParameterValue::Categorical(s)) => {
                choices.contains(s)
            }
            _ => false,
        }
    }
}

/// Named parameter domains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    params: BTreeMap<String, ParameterDomain>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, rejecting empty or malformed domains.
    pub fn add(&mut self, name: &str, domain: ParameterDomain) -> Result<()> {
        domain.validate(name)?;
        self.params.insert(name.to_string(), domain);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParameterDomain> {
        self.params.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterDomain)> {
        self.params.iter()
    }

    pub fn sample_random<R: Rng>(&self, rng: &mut R) -> ParameterSet {
        self.params
            .iter()
            .map(|(name, domain)| (name.clone(), domain.sample(rng)))
            .collect()
    }

    /// True if every parameter is present and inside its domain.
    pub fn contains(&self, params: &ParameterSet) -> bool {
        self.params.iter().all(|(name, domain)| {
            params
                .get(name)
                .map_or(false, |value| domain.contains(value))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    Pending,
    Completed,
    Failed,
}

/// A sampled configuration and, once evaluated, its objective value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub id: usize,
    pub params: ParameterSet,
    /// Objective value; higher is better. `None` unless completed.
    pub value: Option<f64>,
    pub status: TrialStatus,
}

impl Trial {
    pub fn new(id: usize, params: ParameterSet) -> Self {
        Trial {
            id,
            params,
            value: None,
            status: TrialStatus::Pending,
        }
    }

    pub fn complete(&mut self, value: f64) {
        self.value = Some(value);
        self.status = TrialStatus::Completed;
    }

    pub fn fail(&mut self) {
        self.value = None;
        self.status = TrialStatus::Failed;
    }

    pub fn is_completed(&self) -> bool {
        self.status == TrialStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn samples_stay_in_domain() {
        let mut space = SearchSpace::new();
        space
            .add(
                "alpha",
                ParameterDomain::Continuous {
                    low: 1e-4,
                    high: 10.0,
                    log_scale: true,
                },
            )
            .unwrap();
        space
            .add("depth", ParameterDomain::Discrete { low: 2, high: 4 })
            .unwrap();
        space
            .add(
                "loss",
                ParameterDomain::Categorical {
                    choices: vec!["a".into(), "b".into()],
                },
            )
            .unwrap();

        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let params = space.sample_random(&mut rng);
            assert!(space.contains(&params));
        }
    }

    #[test]
    fn malformed_domains_are_rejected() {
        let mut space = SearchSpace::new();
        assert!(space
            .add("x", ParameterDomain::Discrete { low: 5, high: 1 })
            .is_err());
        assert!(space
            .add(
                "y",
                ParameterDomain::Continuous {
                    low: 0.0,
                    high: 1.0,
                    log_scale: true
                }
            )
            .is_err());
        assert!(space
            .add("z", ParameterDomain::Categorical { choices: vec![] })
            .is_err());
        assert!(space.is_empty());
    }

    #[test]
    fn value_conversions() {
        assert_eq!(ParameterValue::Int(3).as_float(), Some(3.0));
        assert_eq!(ParameterValue::Float(2.7).as_int(), Some(2));
        assert_eq!(ParameterValue::Categorical("a".into()).as_str(), Some("a"));
        assert_eq!(ParameterValue::Categorical("a".into()).as_float(), None);
    }
}
