use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::ForestParams;
use crate::error::{EnsembleError, Result};
use crate::models::classifier_trait::{normalize_rows, ClassifierModel};

#[derive(Debug, Serialize, Deserialize)]
struct BaggedTree {
    /// Columns this tree was trained on, ascending.
    features: Vec<usize>,
    tree: DecisionTree<f64, usize>,
}

/// Random forest: Gini trees on bootstrap samples and random column subsets.
/// Class probabilities are the fraction of trees voting for each class.
#[derive(Debug, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    params: ForestParams,
    seed: u64,
    n_features: usize,
    n_classes: usize,
    trees: Vec<BaggedTree>,
}

impl RandomForestClassifier {
    pub fn new(params: ForestParams, seed: u64) -> Self {
        RandomForestClassifier {
            params,
            seed,
            n_features: 0,
            n_classes: 0,
            trees: Vec::new(),
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl ClassifierModel for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
        if x.nrows() != y.len() || x.nrows() == 0 {
            return Err(EnsembleError::model(
                self.name(),
                format!("{} rows but {} labels", x.nrows(), y.len()),
            ));
        }

        let n_samples = x.nrows();
        let n_columns = x.ncols();
        let n_sub_features = ((n_columns as f64) * self.params.feature_fraction.clamp(0.0, 1.0))
            .ceil()
            .clamp(1.0, n_columns as f64) as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut all_columns: Vec<usize> = (0..n_columns).collect();

        let mut trees = Vec::with_capacity(self.params.n_trees);
        for _ in 0..self.params.n_trees.max(1) {
            let rows: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
            all_columns.shuffle(&mut rng);
            let mut features = all_columns[..n_sub_features].to_vec();
            features.sort_unstable();

            let records = x.select(Axis(0), &rows).select(Axis(1), &features);
            let targets = y.select(Axis(0), &rows);
            let dataset = Dataset::new(records, targets);

            let tree = DecisionTree::params()
                .split_quality(SplitQuality::Gini)
                .max_depth(Some(self.params.max_depth.max(1)))
                .min_weight_split(self.params.min_samples_split.max(2) as f32)
                .min_weight_leaf(1.0)
                .fit(&dataset)
                .map_err(|e| EnsembleError::model("random_forest", e))?;
            trees.push(BaggedTree { features, tree });
        }

        self.n_features = n_columns;
        self.n_classes = n_classes;
        self.trees = trees;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(EnsembleError::model(self.name(), "model has not been fitted"));
        }
        if x.ncols() != self.n_features {
            return Err(EnsembleError::Shape {
                expected: self.n_features,
                found: x.ncols(),
            });
        }

        let mut votes = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for bagged in &self.trees {
            let records = x.select(Axis(1), &bagged.features);
            let predictions: Array1<usize> = bagged.tree.predict(&records);
            for (row, &class) in predictions.iter().enumerate() {
                if class < self.n_classes {
                    votes[(row, class)] += 1.0;
                }
            }
        }
        normalize_rows(&mut votes);
        Ok(votes)
    }

    fn fitted_dims(&self) -> Result<(usize, usize)> {
        if self.trees.is_empty() || self.n_classes == 0 {
            return Err(EnsembleError::model(self.name(), "model has not been fitted"));
        }
        let n_features = self.n_features;
        let bad_tree = self.trees.iter().any(|bagged| {
            bagged.features.is_empty() || bagged.features.iter().any(|&f| f >= n_features)
        });
        if bad_tree {
            return Err(EnsembleError::model(
                self.name(),
                format!("tree columns out of range for {} features", n_features),
            ));
        }
        Ok((n_features, self.n_classes))
    }

    fn name(&self) -> &str {
        "random_forest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params() -> ForestParams {
        ForestParams {
            n_trees: 15,
            max_depth: 4,
            min_samples_split: 2,
            feature_fraction: 1.0,
        }
    }

    fn two_blobs() -> (Array2<f64>, Array1<usize>) {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.2],
            [0.2, 0.1],
            [0.3, 0.0],
            [4.0, 4.0],
            [4.2, 4.1],
            [4.1, 3.9],
            [3.9, 4.2],
        ];
        let y = Array1::from_vec(vec![0, 0, 0, 0, 1, 1, 1, 1]);
        (x, y)
    }

    #[test]
    fn votes_form_probabilities() {
        let (x, y) = two_blobs();
        let mut forest = RandomForestClassifier::new(params(), 3);
        forest.fit(&x, &y, 2).unwrap();
        assert_eq!(forest.n_trees(), 15);

        let probs = forest.predict_proba(&array![[0.05, 0.05], [4.05, 4.05]]).unwrap();
        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert!(probs[(0, 0)] > 0.5);
        assert!(probs[(1, 1)] > 0.5);
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let (x, y) = two_blobs();
        let mut a = RandomForestClassifier::new(params(), 11);
        let mut b = RandomForestClassifier::new(params(), 11);
        a.fit(&x, &y, 2).unwrap();
        b.fit(&x, &y, 2).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn fitted_dims_follow_training_data() {
        let (x, y) = two_blobs();
        let mut forest = RandomForestClassifier::new(params(), 3);
        assert!(forest.fitted_dims().is_err());
        forest.fit(&x, &y, 3).unwrap();
        assert_eq!(forest.fitted_dims().unwrap(), (2, 3));
    }

    #[test]
    fn wrong_width_is_a_shape_error() {
        let (x, y) = two_blobs();
        let mut forest = RandomForestClassifier::new(params(), 3);
        forest.fit(&x, &y, 2).unwrap();
        let err = forest.predict_proba(&array![[1.0, 2.0, 3.0]]).unwrap_err();
        assert!(matches!(err, EnsembleError::Shape { expected: 2, found: 3 }));
    }
}
