use anyhow::{Context, Result};
use riverstat_classifiers::io::{read_river_csv_with_config, RiverCsvConfig};

use crate::train::input::TrainConfig;
use crate::util::delimiter_for;

pub fn run_training(config: &TrainConfig) -> Result<()> {
    let csv_config = RiverCsvConfig {
        label_column: config.label_column.clone(),
        delimiter: delimiter_for(&config.data_file),
        ..RiverCsvConfig::default()
    };
    let data = read_river_csv_with_config(&config.data_file, &csv_config)
        .with_context(|| format!("Failed to load training data: {}", config.data_file))?;

    let outcome = riverstat_classifiers::run_training(&data, &config.training)
        .context("Training failed")?;

    outcome
        .artifact
        .save(&config.artifact_file)
        .with_context(|| format!("Failed to write model artifact: {}", config.artifact_file))?;
    outcome
        .evaluation
        .write(&config.report_file)
        .with_context(|| format!("Failed to write report: {}", config.report_file))?;

    log::info!(
        "Best parameters (mean CV accuracy {:.4}):\n{}",
        outcome.search.best_value,
        serde_json::to_string_pretty(&outcome.search.best)?
    );
    log::info!(
        "Held-out accuracy {:.4}; model written to {}",
        outcome.evaluation.accuracy,
        config.artifact_file
    );
    Ok(())
}
