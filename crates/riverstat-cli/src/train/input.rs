use anyhow::{Context, Result};
use clap::ArgMatches;
use riverstat_classifiers::config::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::util::validate_tsv_or_csv_file;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TrainConfig {
    pub data_file: String,
    pub label_column: String,
    pub artifact_file: String,
    pub report_file: String,
    pub training: TrainingConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            data_file: String::new(),
            label_column: String::from("RIVER STATUS"),
            artifact_file: String::from("riverstat_ensemble.json"),
            report_file: String::from("riverstat_evaluation.txt"),
            training: TrainingConfig::default(),
        }
    }
}

impl TrainConfig {
    pub fn from_arguments(config_path: &PathBuf, matches: &ArgMatches) -> Result<Self> {
        let config_json = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let mut config: TrainConfig = serde_json::from_str(&config_json)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        // Apply CLI overrides
        if let Some(data_file) = matches.get_one::<String>("data_file") {
            config.data_file = data_file.clone();
        }
        validate_tsv_or_csv_file(&config.data_file)?;

        if let Some(artifact_file) = matches.get_one::<String>("artifact_file") {
            config.artifact_file = artifact_file.clone();
        }

        if let Some(report_file) = matches.get_one::<String>("report_file") {
            config.report_file = report_file.clone();
        }

        if let Some(n_trials) = matches.get_one::<usize>("trials") {
            config.training.search.n_trials = *n_trials;
        }

        if let Some(seed) = matches.get_one::<u64>("seed") {
            config.training.search.seed = *seed;
        }

        config
            .training
            .validate()
            .context("Invalid training configuration")?;
        Ok(config)
    }
}
