use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EnsembleError, Result};

/// The three ensemble members, in the order used everywhere weights and
/// probability matrices are paired.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Gbdt,
    RandomForest,
    Logistic,
}

impl MemberKind {
    pub const ALL: [MemberKind; 3] = [
        MemberKind::Gbdt,
        MemberKind::RandomForest,
        MemberKind::Logistic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MemberKind::Gbdt => "gbdt",
            MemberKind::RandomForest => "random_forest",
            MemberKind::Logistic => "logistic",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Gradient boosted trees, trained one-vs-rest.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct GbdtParams {
    pub learning_rate: f32,
    pub num_boost_round: u32,
    pub max_depth: u32,
    /// Fraction of rows drawn (without replacement) for each per-class booster.
    pub subsample: f64,
    pub training_optimization_level: u8,
}

impl Default for GbdtParams {
    fn default() -> Self {
        GbdtParams {
            learning_rate: 0.1,
            num_boost_round: 50,
            max_depth: 6,
            subsample: 1.0,
            training_optimization_level: 2,
        }
    }
}

/// Bagged decision trees.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Fraction of columns each tree sees.
    pub feature_fraction: f64,
}

impl Default for ForestParams {
    fn default() -> Self {
        ForestParams {
            n_trees: 100,
            max_depth: 12,
            min_samples_split: 2,
            feature_fraction: 0.7,
        }
    }
}

/// Multinomial logistic regression on standardized features.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LogisticParams {
    /// L2 penalty.
    pub alpha: f64,
    pub max_iterations: u64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        LogisticParams {
            alpha: 1.0,
            max_iterations: 100,
        }
    }
}

/// Hyper-parameters for a single member.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum MemberParams {
    GBDT(GbdtParams),
    RandomForest(ForestParams),
    Logistic(LogisticParams),
}

impl MemberParams {
    pub fn kind(&self) -> MemberKind {
        match self {
            MemberParams::GBDT(_) => MemberKind::Gbdt,
            MemberParams::RandomForest(_) => MemberKind::RandomForest,
            MemberParams::Logistic(_) => MemberKind::Logistic,
        }
    }
}

impl From<MemberKind> for MemberParams {
    fn from(kind: MemberKind) -> Self {
        match kind {
            MemberKind::Gbdt => MemberParams::GBDT(GbdtParams::default()),
            MemberKind::RandomForest => MemberParams::RandomForest(ForestParams::default()),
            MemberKind::Logistic => MemberParams::Logistic(LogisticParams::default()),
        }
    }
}

/// Settings for the sequential hyper-parameter search.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub n_trials: usize,
    /// Drives the sampler, fold shuffling, oversampling and model randomness.
    pub seed: u64,
    pub n_folds: usize,
    /// Trials sampled uniformly before the Parzen estimator takes over.
    pub n_startup_trials: usize,
    /// Quantile separating good from bad trials.
    pub gamma: f64,
    pub parallel_folds: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            n_trials: 500,
            seed: 42,
            n_folds: 5,
            n_startup_trials: 10,
            gamma: 0.25,
            parallel_folds: true,
        }
    }
}

/// Ranges searched for each hyper-parameter. Integer ranges are inclusive.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SearchSpaceConfig {
    pub gbdt_learning_rate: (f64, f64),
    pub gbdt_num_boost_round: (i64, i64),
    pub gbdt_max_depth: (i64, i64),
    pub gbdt_subsample: (f64, f64),
    pub forest_n_trees: (i64, i64),
    pub forest_max_depth: (i64, i64),
    pub forest_min_samples_split: (i64, i64),
    pub forest_feature_fraction: (f64, f64),
    /// Searched on a log scale.
    pub logistic_alpha: (f64, f64),
    pub logistic_max_iterations: (i64, i64),
    /// Shared range for the three combination weights.
    pub weight: (f64, f64),
}

impl Default for SearchSpaceConfig {
    fn default() -> Self {
        SearchSpaceConfig {
            gbdt_learning_rate: (0.01, 0.3),
            gbdt_num_boost_round: (20, 200),
            gbdt_max_depth: (2, 8),
            gbdt_subsample: (0.5, 1.0),
            forest_n_trees: (20, 150),
            forest_max_depth: (2, 20),
            forest_min_samples_split: (2, 10),
            forest_feature_fraction: (0.5, 1.0),
            logistic_alpha: (1e-4, 10.0),
            logistic_max_iterations: (50, 300),
            weight: (0.1, 5.0),
        }
    }
}

impl SearchSpaceConfig {
    pub fn validate(&self) -> Result<()> {
        let float_ranges = [
            ("gbdt_learning_rate", self.gbdt_learning_rate),
            ("gbdt_subsample", self.gbdt_subsample),
            ("forest_feature_fraction", self.forest_feature_fraction),
            ("logistic_alpha", self.logistic_alpha),
            ("weight", self.weight),
        ];
        for (name, (low, high)) in float_ranges {
            if !(low.is_finite() && high.is_finite() && low > 0.0 && low <= high) {
                return Err(EnsembleError::InvalidConfig(format!(
                    "{} range ({}, {}) must be positive and ordered",
                    name, low, high
                )));
            }
        }
        if self.gbdt_subsample.1 > 1.0 || self.forest_feature_fraction.1 > 1.0 {
            return Err(EnsembleError::InvalidConfig(
                "fractions must not exceed 1.0".to_string(),
            ));
        }

        let int_ranges = [
            ("gbdt_num_boost_round", self.gbdt_num_boost_round),
            ("gbdt_max_depth", self.gbdt_max_depth),
            ("forest_n_trees", self.forest_n_trees),
            ("forest_max_depth", self.forest_max_depth),
            ("forest_min_samples_split", self.forest_min_samples_split),
            ("logistic_max_iterations", self.logistic_max_iterations),
        ];
        for (name, (low, high)) in int_ranges {
            if low < 1 || low > high {
                return Err(EnsembleError::InvalidConfig(format!(
                    "{} range ({}, {}) must be at least 1 and ordered",
                    name, low, high
                )));
            }
        }
        Ok(())
    }
}

/// Everything the training pipeline needs besides the data itself.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    pub search: SearchConfig,
    pub space: SearchSpaceConfig,
    /// Neighbourhood size for oversampling.
    pub k_neighbors: usize,
    /// Fraction of rows held out for the final evaluation.
    pub test_size: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            search: SearchConfig::default(),
            space: SearchSpaceConfig::default(),
            k_neighbors: crate::balancing::DEFAULT_K_NEIGHBORS,
            test_size: 0.2,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.search.n_trials == 0 {
            return Err(EnsembleError::InvalidConfig(
                "n_trials must be at least 1".to_string(),
            ));
        }
        if self.search.n_folds < 2 {
            return Err(EnsembleError::InvalidConfig(
                "n_folds must be at least 2".to_string(),
            ));
        }
        if self.k_neighbors == 0 {
            return Err(EnsembleError::InvalidConfig(
                "k_neighbors must be at least 1".to_string(),
            ));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(EnsembleError::InvalidConfig(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        self.space.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        TrainingConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"search": {"n_trials": 5, "seed": 7}}"#).unwrap();
        assert_eq!(config.search.n_trials, 5);
        assert_eq!(config.search.seed, 7);
        assert_eq!(config.search.n_folds, 5);
        assert_eq!(config.space.weight, (0.1, 5.0));
        assert_eq!(config.test_size, 0.2);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut config = TrainingConfig::default();
        config.space.forest_max_depth = (10, 2);
        assert!(matches!(
            config.validate(),
            Err(EnsembleError::InvalidConfig(_))
        ));
    }
}
