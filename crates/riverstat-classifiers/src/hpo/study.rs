use crate::error::{EnsembleError, Result};
use crate::hpo::tpe::TpeSampler;
use crate::hpo::types::{ParameterSet, Trial, TrialStatus};

/// Sequential maximization driven by a `TpeSampler`.
///
/// Each trial is evaluated before the next one is proposed, so the sampler
/// always sees the full history.
#[derive(Debug, Clone)]
pub struct Study {
    sampler: TpeSampler,
    trials: Vec<Trial>,
}

impl Study {
    pub fn new(sampler: TpeSampler) -> Self {
        Study {
            sampler,
            trials: Vec::new(),
        }
    }

    /// Run `n_trials` evaluations of `objective`.
    ///
    /// A recoverable objective error (see `EnsembleError::is_trial_recoverable`)
    /// or a non-finite value marks the trial failed and the study continues.
    /// Any other error aborts the study. Returns `NoCompletedTrials` if nothing
    /// succeeded.
    pub fn optimize<F>(&mut self, n_trials: usize, mut objective: F) -> Result<()>
    where
        F: FnMut(&ParameterSet) -> Result<f64>,
    {
        for _ in 0..n_trials {
            let mut trial = self.sampler.suggest(&self.trials)?;
            match objective(&trial.params) {
                Ok(value) if value.is_finite() => {
                    trial.complete(value);
                    self.log_progress(&trial);
                }
                Ok(value) => {
                    log::warn!("Trial {} returned non-finite value {}", trial.id, value);
                    trial.fail();
                }
                Err(e) if e.is_trial_recoverable() => {
                    log::warn!("Trial {} failed: {}", trial.id, e);
                    trial.fail();
                }
                Err(e) => return Err(e),
            }
            self.trials.push(trial);
        }

        if self.best_trial().is_none() {
            return Err(EnsembleError::NoCompletedTrials);
        }
        Ok(())
    }

    fn log_progress(&self, trial: &Trial) {
        let value = trial.value.unwrap_or(f64::NAN);
        match self.best_value() {
            Some(best) if value <= best => log::info!(
                "Trial {} finished with value {:.4} (best {:.4})",
                trial.id,
                value,
                best
            ),
            _ => log::info!("Trial {} finished with value {:.4} (new best)", trial.id, value),
        }
    }

    /// Completed trial with the highest value; the earliest wins ties.
    pub fn best_trial(&self) -> Option<&Trial> {
        self.trials
            .iter()
            .filter(|t| t.is_completed())
            .fold(None, |best: Option<&Trial>, t| match best {
                Some(b) if b.value >= t.value => Some(b),
                _ => Some(t),
            })
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().and_then(|t| t.value)
    }

    /// All trials in the order they were run.
    pub fn history(&self) -> &[Trial] {
        &self.trials
    }

    pub fn n_failed(&self) -> usize {
        self.trials
            .iter()
            .filter(|t| t.status == TrialStatus::Failed)
            .count()
    }

    pub fn into_trials(self) -> Vec<Trial> {
        self.trials
    }
}
