//! Joint search over the three members' hyper-parameters and the ensemble
//! weights, scored by cross-validated accuracy.
use serde::{Deserialize, Serialize};

use crate::config::{
    ForestParams, GbdtParams, LogisticParams, MemberParams, SearchSpaceConfig, TrainingConfig,
};
use crate::cross_validation::FoldEvaluator;
use crate::data_handling::derive_seed;
use crate::ensemble::EnsembleWeights;
use crate::error::{EnsembleError, Result};
use crate::hpo::{
    ParameterDomain, ParameterSet, SearchSpace, Study, TpeSampler, Trial, TrialStatus,
};

pub const GBDT_LEARNING_RATE: &str = "gbdt_learning_rate";
pub const GBDT_NUM_BOOST_ROUND: &str = "gbdt_num_boost_round";
pub const GBDT_MAX_DEPTH: &str = "gbdt_max_depth";
pub const GBDT_SUBSAMPLE: &str = "gbdt_subsample";
pub const FOREST_N_TREES: &str = "forest_n_trees";
pub const FOREST_MAX_DEPTH: &str = "forest_max_depth";
pub const FOREST_MIN_SAMPLES_SPLIT: &str = "forest_min_samples_split";
pub const FOREST_FEATURE_FRACTION: &str = "forest_feature_fraction";
pub const LOGISTIC_ALPHA: &str = "logistic_alpha";
pub const LOGISTIC_MAX_ITERATIONS: &str = "logistic_max_iterations";
pub const W_GBDT: &str = "w_gbdt";
pub const W_FOREST: &str = "w_forest";
pub const W_LOGISTIC: &str = "w_logistic";

/// Stream id for the seed shared by every trial's fold evaluation.
const EVALUATION_STREAM: u64 = 1;

/// Member parameters and combination weights evaluated by one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialConfig {
    pub gbdt: GbdtParams,
    pub random_forest: ForestParams,
    pub logistic: LogisticParams,
    pub weights: EnsembleWeights,
}

impl Default for TrialConfig {
    fn default() -> Self {
        TrialConfig {
            gbdt: GbdtParams::default(),
            random_forest: ForestParams::default(),
            logistic: LogisticParams::default(),
            weights: EnsembleWeights::default(),
        }
    }
}

fn float_param(params: &ParameterSet, name: &str) -> Result<f64> {
    params
        .get(name)
        .and_then(|v| v.as_float())
        .ok_or_else(|| EnsembleError::InvalidConfig(format!("missing parameter {}", name)))
}

fn int_param(params: &ParameterSet, name: &str) -> Result<i64> {
    params
        .get(name)
        .and_then(|v| v.as_int())
        .filter(|v| *v >= 0)
        .ok_or_else(|| {
            EnsembleError::InvalidConfig(format!("missing or negative parameter {}", name))
        })
}

impl TrialConfig {
    /// Decode a sampled parameter set.
    pub fn from_params(params: &ParameterSet) -> Result<Self> {
        let gbdt = GbdtParams {
            learning_rate: float_param(params, GBDT_LEARNING_RATE)? as f32,
            num_boost_round: int_param(params, GBDT_NUM_BOOST_ROUND)? as u32,
            max_depth: int_param(params, GBDT_MAX_DEPTH)? as u32,
            subsample: float_param(params, GBDT_SUBSAMPLE)?,
            ..GbdtParams::default()
        };
        let random_forest = ForestParams {
            n_trees: int_param(params, FOREST_N_TREES)? as usize,
            max_depth: int_param(params, FOREST_MAX_DEPTH)? as usize,
            min_samples_split: int_param(params, FOREST_MIN_SAMPLES_SPLIT)? as usize,
            feature_fraction: float_param(params, FOREST_FEATURE_FRACTION)?,
        };
        let logistic = LogisticParams {
            alpha: float_param(params, LOGISTIC_ALPHA)?,
            max_iterations: int_param(params, LOGISTIC_MAX_ITERATIONS)? as u64,
        };
        let weights = EnsembleWeights::new(
            float_param(params, W_GBDT)?,
            float_param(params, W_FOREST)?,
            float_param(params, W_LOGISTIC)?,
        )?;
        Ok(TrialConfig {
            gbdt,
            random_forest,
            logistic,
            weights,
        })
    }

    /// Member parameters in `MemberKind::ALL` order.
    pub fn member_params(&self) -> [MemberParams; 3] {
        [
            MemberParams::GBDT(self.gbdt.clone()),
            MemberParams::RandomForest(self.random_forest.clone()),
            MemberParams::Logistic(self.logistic.clone()),
        ]
    }
}

/// Build the joint search space from the configured ranges.
pub fn build_search_space(ranges: &SearchSpaceConfig) -> Result<SearchSpace> {
    ranges.validate()?;

    let continuous = |(low, high): (f64, f64)| ParameterDomain::Continuous {
        low,
        high,
        log_scale: false,
    };
    let discrete = |(low, high): (i64, i64)| ParameterDomain::Discrete { low, high };

    let mut space = SearchSpace::new();
    space.add(GBDT_LEARNING_RATE, continuous(ranges.gbdt_learning_rate))?;
    space.add(GBDT_NUM_BOOST_ROUND, discrete(ranges.gbdt_num_boost_round))?;
    space.add(GBDT_MAX_DEPTH, discrete(ranges.gbdt_max_depth))?;
    space.add(GBDT_SUBSAMPLE, continuous(ranges.gbdt_subsample))?;
    space.add(FOREST_N_TREES, discrete(ranges.forest_n_trees))?;
    space.add(FOREST_MAX_DEPTH, discrete(ranges.forest_max_depth))?;
    space.add(
        FOREST_MIN_SAMPLES_SPLIT,
        discrete(ranges.forest_min_samples_split),
    )?;
    space.add(
        FOREST_FEATURE_FRACTION,
        continuous(ranges.forest_feature_fraction),
    )?;
    space.add(
        LOGISTIC_ALPHA,
        ParameterDomain::Continuous {
            low: ranges.logistic_alpha.0,
            high: ranges.logistic_alpha.1,
            log_scale: true,
        },
    )?;
    space.add(
        LOGISTIC_MAX_ITERATIONS,
        discrete(ranges.logistic_max_iterations),
    )?;
    for name in [W_GBDT, W_FOREST, W_LOGISTIC] {
        space.add(name, continuous(ranges.weight))?;
    }
    Ok(space)
}

/// One entry of the search history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub id: usize,
    pub params: ParameterSet,
    pub config: TrialConfig,
    /// Mean CV accuracy, absent for failed trials.
    pub value: Option<f64>,
    pub status: TrialStatus,
}

impl TrialRecord {
    fn from_trial(trial: Trial) -> Result<Self> {
        let config = TrialConfig::from_params(&trial.params)?;
        Ok(TrialRecord {
            id: trial.id,
            params: trial.params,
            config,
            value: trial.value,
            status: trial.status,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: TrialConfig,
    pub best_trial_id: usize,
    /// Mean CV accuracy of the best trial.
    pub best_value: f64,
    pub history: Vec<TrialRecord>,
}

/// Run the TPE search, maximizing the evaluator's mean fold accuracy.
pub fn run_search(evaluator: &FoldEvaluator, config: &TrainingConfig) -> Result<SearchOutcome> {
    let space = build_search_space(&config.space)?;
    let sampler = TpeSampler::new(space, config.search.seed)
        .with_gamma(config.search.gamma)
        .with_startup(config.search.n_startup_trials);
    let mut study = Study::new(sampler);

    log::info!(
        "Starting search: {} trials over {} folds (seed {})",
        config.search.n_trials,
        evaluator.n_folds(),
        config.search.seed
    );

    let eval_seed = derive_seed(config.search.seed, EVALUATION_STREAM);
    study.optimize(config.search.n_trials, |params| {
        let trial_config = TrialConfig::from_params(params)?;
        evaluator.evaluate(&trial_config, eval_seed)
    })?;

    let best_trial = study.best_trial().ok_or(EnsembleError::NoCompletedTrials)?;
    let best_trial_id = best_trial.id;
    let best_value = best_trial.value.ok_or(EnsembleError::NoCompletedTrials)?;
    let best = TrialConfig::from_params(&best_trial.params)?;
    if study.n_failed() > 0 {
        log::warn!(
            "{} of {} trials failed",
            study.n_failed(),
            study.history().len()
        );
    }
    log::info!(
        "Best trial {}: mean CV accuracy {:.4}",
        best_trial_id,
        best_value
    );

    let history = study
        .into_trials()
        .into_iter()
        .map(TrialRecord::from_trial)
        .collect::<Result<Vec<_>>>()?;

    Ok(SearchOutcome {
        best,
        best_trial_id,
        best_value,
        history,
    })
}
