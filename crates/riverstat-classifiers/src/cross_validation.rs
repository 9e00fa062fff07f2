//! Cross-validated scoring of a trial configuration.
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;

use crate::balancing::{select_rows, Smote};
use crate::data_handling::{derive_seed, stratified_kfold, Fold};
use crate::ensemble::{argmax_rows, predict_ensemble};
use crate::error::Result;
use crate::models::fit_members;
use crate::stats::accuracy;
use crate::tuning::TrialConfig;

const BALANCE_STREAM: u64 = 0;
const MEMBER_STREAM: u64 = 1;

/// Scores a `TrialConfig` by mean validation accuracy over stratified folds.
///
/// The folds are fixed at construction so every trial sees the same
/// partition. Oversampling touches only each fold's training rows.
#[derive(Debug, Clone)]
pub struct FoldEvaluator<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<usize>,
    n_classes: usize,
    folds: Vec<Fold>,
    k_neighbors: usize,
    parallel: bool,
    class_names: Vec<String>,
}

impl<'a> FoldEvaluator<'a> {
    /// # Arguments
    ///
    /// * `x` - Expanded feature matrix
    /// * `y` - Encoded labels
    /// * `n_classes` - Number of classes known to the label encoder
    /// * `n_folds` - Number of stratified folds
    /// * `fold_seed` - Seed for shuffling rows into folds
    /// * `k_neighbors` - Oversampling neighbourhood size
    pub fn new(
        x: &'a Array2<f64>,
        y: &'a Array1<usize>,
        n_classes: usize,
        n_folds: usize,
        fold_seed: u64,
        k_neighbors: usize,
    ) -> Result<Self> {
        let folds = stratified_kfold(y, n_classes, n_folds, fold_seed)?;
        Ok(FoldEvaluator {
            x,
            y,
            n_classes,
            folds,
            k_neighbors,
            parallel: true,
            class_names: Vec::new(),
        })
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Class names used when a fold cannot be oversampled.
    pub fn with_class_names<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.class_names = names.iter().map(|n| n.as_ref().to_string()).collect();
        self
    }

    pub fn n_folds(&self) -> usize {
        self.folds.len()
    }

    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }

    /// Mean accuracy over all folds. Each fold's randomness is seeded from
    /// `(seed, fold_index)`, so the result does not depend on scheduling.
    pub fn evaluate(&self, config: &TrialConfig, seed: u64) -> Result<f64> {
        let scores: Vec<f64> = if self.parallel {
            self.folds
                .par_iter()
                .enumerate()
                .map(|(i, fold)| self.evaluate_fold(i, fold, config, seed))
                .collect::<Result<Vec<_>>>()?
        } else {
            self.folds
                .iter()
                .enumerate()
                .map(|(i, fold)| self.evaluate_fold(i, fold, config, seed))
                .collect::<Result<Vec<_>>>()?
        };
        Ok(scores.iter().sum::<f64>() / scores.len() as f64)
    }

    fn evaluate_fold(
        &self,
        index: usize,
        fold: &Fold,
        config: &TrialConfig,
        seed: u64,
    ) -> Result<f64> {
        let fold_seed = derive_seed(seed, index as u64);
        let (train_x, train_y) = self.balanced_training(fold, fold_seed)?;

        let members = fit_members(
            &config.member_params(),
            &train_x,
            &train_y,
            self.n_classes,
            derive_seed(fold_seed, MEMBER_STREAM),
        )?;

        let valid_x = self.x.select(Axis(0), &fold.validation);
        let valid_y = self.y.select(Axis(0), &fold.validation);
        let probs = predict_ensemble(&members, &config.weights, &valid_x)?;
        let score = accuracy(&valid_y, &argmax_rows(&probs));

        log::debug!(
            "Fold {}: {} balanced training rows, {} validation rows, accuracy {:.4}",
            index,
            train_x.nrows(),
            valid_x.nrows(),
            score
        );
        Ok(score)
    }

    /// The fold's training rows, oversampled. Validation rows never enter.
    fn balanced_training(
        &self,
        fold: &Fold,
        fold_seed: u64,
    ) -> Result<(Array2<f64>, Array1<usize>)> {
        let (train_x, train_y) = select_rows(self.x, self.y, &fold.train);
        Smote::new(self.k_neighbors, derive_seed(fold_seed, BALANCE_STREAM))
            .with_class_names(&self.class_names)
            .fit_resample(&train_x, &train_y, self.n_classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ForestParams, GbdtParams, LogisticParams};
    use crate::ensemble::EnsembleWeights;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn blobs(per_class: usize) -> (Array2<f64>, Array1<usize>) {
        let centers = [(0.0, 0.0), (5.0, 0.0), (0.0, 5.0)];
        let mut rng = StdRng::seed_from_u64(0);
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for (class, (cx, cy)) in centers.iter().enumerate() {
            for _ in 0..per_class {
                rows.push(cx + rng.gen_range(-0.5..0.5));
                rows.push(cy + rng.gen_range(-0.5..0.5));
                labels.push(class);
            }
        }
        let x = Array2::from_shape_vec((labels.len(), 2), rows).unwrap();
        (x, Array1::from_vec(labels))
    }

    fn small_config() -> TrialConfig {
        TrialConfig {
            gbdt: GbdtParams {
                num_boost_round: 10,
                max_depth: 3,
                ..GbdtParams::default()
            },
            random_forest: ForestParams {
                n_trees: 10,
                max_depth: 4,
                ..ForestParams::default()
            },
            logistic: LogisticParams::default(),
            weights: EnsembleWeights::new(1.0, 2.0, 0.5).unwrap(),
        }
    }

    #[test]
    fn separable_data_scores_high() {
        let (x, y) = blobs(10);
        let evaluator = FoldEvaluator::new(&x, &y, 3, 5, 42, 3).unwrap();
        let score = evaluator.evaluate(&small_config(), 7).unwrap();
        assert!(score > 0.9, "accuracy {}", score);
    }

    #[test]
    fn parallel_matches_sequential() {
        let (x, y) = blobs(8);
        let evaluator = FoldEvaluator::new(&x, &y, 3, 4, 42, 3).unwrap();
        let parallel = evaluator.evaluate(&small_config(), 3).unwrap();
        let sequential = evaluator
            .clone()
            .with_parallel(false)
            .evaluate(&small_config(), 3)
            .unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn validation_rows_stay_out_of_training() {
        let (x, y) = blobs(6);
        let evaluator = FoldEvaluator::new(&x, &y, 3, 3, 1, 3).unwrap();
        for fold in evaluator.folds() {
            assert!(fold.validation.iter().all(|i| !fold.train.contains(i)));
            assert_eq!(fold.train.len() + fold.validation.len(), y.len());
        }
    }

    #[test]
    fn balanced_fold_holds_only_training_rows() {
        // Uneven class sizes so every fold needs synthetic rows.
        let (x, y) = blobs(9);
        let keep: Vec<usize> = (0..y.len()).filter(|&i| y[i] != 2 || i % 9 < 5).collect();
        let (x, y) = select_rows(&x, &y, &keep);
        let evaluator = FoldEvaluator::new(&x, &y, 3, 3, 5, 3).unwrap();

        for (index, fold) in evaluator.folds().iter().enumerate() {
            let (bx, by) = evaluator.balanced_training(fold, index as u64).unwrap();
            assert!(bx.nrows() > fold.train.len());

            // Originals come first, in fold order.
            let originals = x.select(Axis(0), &fold.train);
            assert_eq!(bx.slice(ndarray::s![..fold.train.len(), ..]), originals);
            assert_eq!(
                by.slice(ndarray::s![..fold.train.len()]),
                y.select(Axis(0), &fold.train)
            );

            for &v in &fold.validation {
                assert!(bx.rows().into_iter().all(|row| row != x.row(v)));
            }
        }
    }

    #[test]
    fn fold_errors_name_the_class() {
        let x = Array2::from_shape_vec((5, 1), vec![0.0, 0.1, 0.2, 0.3, 9.0]).unwrap();
        let y = Array1::from_vec(vec![0, 0, 0, 0, 1]);
        let evaluator = FoldEvaluator::new(&x, &y, 2, 2, 0, 3)
            .unwrap()
            .with_class_names(&["Clean", "Polluted"])
            .with_parallel(false);
        let err = evaluator.evaluate(&small_config(), 0).unwrap_err();
        assert!(err.to_string().contains("Polluted"), "{}", err);
    }
}
