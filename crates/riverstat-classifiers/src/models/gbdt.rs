use std::fmt;

use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::GbdtParams;
use crate::error::{EnsembleError, Result};
use crate::models::classifier_trait::{normalize_rows, ClassifierModel};

const LOSS_TYPE: &str = "LogLikelyhood";
/// Floor applied to per-class scores before normalization.
const MIN_SCORE: f64 = 1e-7;

/// Per-class scorer. Boosters cannot be fitted when the sampled rows hold
/// only one side of the one-vs-rest split, so a constant stands in.
#[derive(Serialize, Deserialize)]
enum ClassScorer {
    Boosted(GBDT),
    Constant(f64),
}

/// Gradient Boosting Decision Tree (GBDT) classifier.
///
/// Multi-class support is one-vs-rest: one log-likelihood booster per class,
/// whose probabilities are renormalized across classes.
#[derive(Serialize, Deserialize)]
pub struct GBDTClassifier {
    params: GbdtParams,
    seed: u64,
    n_features: usize,
    scorers: Vec<ClassScorer>,
}

impl GBDTClassifier {
    pub fn new(params: GbdtParams, seed: u64) -> Self {
        GBDTClassifier {
            params,
            seed,
            n_features: 0,
            scorers: Vec::new(),
        }
    }

    pub fn params(&self) -> &GbdtParams {
        &self.params
    }

    fn booster_config(&self, feature_size: usize) -> Config {
        let mut config = Config::new();
        config.set_feature_size(feature_size);
        config.set_shrinkage(self.params.learning_rate);
        config.set_max_depth(self.params.max_depth);
        config.set_iterations(self.params.num_boost_round as usize);
        config.set_debug(false);
        config.set_training_optimization_level(self.params.training_optimization_level);
        config.set_loss(LOSS_TYPE);
        config
    }
}

fn to_rows(x: &Array2<f64>) -> Vec<Vec<f32>> {
    x.rows()
        .into_iter()
        .map(|row| row.iter().map(|&v| v as f32).collect())
        .collect()
}

impl ClassifierModel for GBDTClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
        if x.nrows() != y.len() || x.nrows() == 0 {
            return Err(EnsembleError::model(
                self.name(),
                format!("{} rows but {} labels", x.nrows(), y.len()),
            ));
        }

        let n_samples = x.nrows();
        let rows = to_rows(x);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let n_keep = ((n_samples as f64) * self.params.subsample.clamp(0.0, 1.0)).ceil() as usize;
        let n_keep = n_keep.clamp(1, n_samples);

        let mut scorers = Vec::with_capacity(n_classes);
        for class in 0..n_classes {
            let mut indices: Vec<usize> = (0..n_samples).collect();
            if n_keep < n_samples {
                indices.shuffle(&mut rng);
                indices.truncate(n_keep);
                indices.sort_unstable();
            }

            let positives = indices.iter().filter(|&&i| y[i] == class).count();
            if positives == 0 || positives == indices.len() {
                let constant = positives as f64 / indices.len() as f64;
                log::trace!("GBDT class {}: constant scorer {}", class, constant);
                scorers.push(ClassScorer::Constant(constant));
                continue;
            }

            let mut train_x: DataVec = indices
                .iter()
                .map(|&i| {
                    let label = if y[i] == class { 1.0 } else { -1.0 };
                    Data::new_training_data(rows[i].clone(), 1.0, label, None)
                })
                .collect();

            let mut booster = GBDT::new(&self.booster_config(x.ncols()));
            booster.fit(&mut train_x);
            scorers.push(ClassScorer::Boosted(booster));
        }

        self.n_features = x.ncols();
        self.scorers = scorers;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.scorers.is_empty() {
            return Err(EnsembleError::model(self.name(), "model has not been fitted"));
        }
        if x.ncols() != self.n_features {
            return Err(EnsembleError::Shape {
                expected: self.n_features,
                found: x.ncols(),
            });
        }

        let test_x: DataVec = to_rows(x)
            .into_iter()
            .map(|row| Data::new_training_data(row, 1.0, 0.0, None))
            .collect();

        let mut probs = Array2::zeros((x.nrows(), self.scorers.len()));
        for (class, scorer) in self.scorers.iter().enumerate() {
            match scorer {
                ClassScorer::Boosted(booster) => {
                    let predictions = booster.predict(&test_x);
                    for (row, p) in predictions.iter().enumerate() {
                        let p = *p as f64;
                        probs[(row, class)] = if p.is_finite() {
                            p.clamp(MIN_SCORE, 1.0)
                        } else {
                            MIN_SCORE
                        };
                    }
                }
                ClassScorer::Constant(c) => {
                    probs.column_mut(class).fill(c.max(0.0));
                }
            }
        }
        normalize_rows(&mut probs);
        Ok(probs)
    }

    fn fitted_dims(&self) -> Result<(usize, usize)> {
        if self.scorers.is_empty() || self.n_features == 0 {
            return Err(EnsembleError::model(self.name(), "model has not been fitted"));
        }
        let bad_constant = self.scorers.iter().any(|scorer| {
            matches!(scorer, ClassScorer::Constant(c) if !(0.0..=1.0).contains(c))
        });
        if bad_constant {
            return Err(EnsembleError::model(
                self.name(),
                "constant class score outside [0, 1]",
            ));
        }
        Ok((self.n_features, self.scorers.len()))
    }

    fn name(&self) -> &str {
        "gbdt"
    }
}

impl fmt::Debug for GBDTClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GBDTClassifier")
            .field("params", &self.params)
            .field("seed", &self.seed)
            .field("n_features", &self.n_features)
            .field("n_classes", &self.scorers.len())
            .finish()
    }
}
