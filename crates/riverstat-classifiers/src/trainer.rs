//! End-to-end training: search, final fit, held-out evaluation, packaging.
use ndarray::{Array1, Array2};

use crate::artifact::ModelArtifact;
use crate::balancing::{class_counts, select_rows, Smote};
use crate::config::TrainingConfig;
use crate::cross_validation::FoldEvaluator;
use crate::data_handling::{
    derive_seed, samples_to_array, stratified_train_test_split, LabelEncoder, LabeledSamples,
    FEATURE_NAMES,
};
use crate::ensemble::{argmax_rows, predict_ensemble};
use crate::error::{EnsembleError, Result};
use crate::models::fit_members;
use crate::preprocessing::FeatureTransformer;
use crate::report::EvaluationReport;
use crate::tuning::{run_search, SearchOutcome};

const FOLD_STREAM: u64 = 2;
const FINAL_BALANCE_STREAM: u64 = 3;
const FINAL_MEMBER_STREAM: u64 = 4;

/// Everything produced by a training run.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub evaluation: EvaluationReport,
    pub search: SearchOutcome,
}

/// Train the tuned ensemble on labelled samples.
///
/// The search scores candidates by stratified cross-validation on the whole
/// data set. The winning configuration is then refitted on a stratified
/// training split, oversampled on its own, and evaluated on the held-out
/// split.
pub fn run_training(data: &LabeledSamples, config: &TrainingConfig) -> Result<TrainingOutcome> {
    config.validate()?;
    if data.is_empty() {
        return Err(EnsembleError::InvalidConfig(
            "no samples to train on".to_string(),
        ));
    }
    data.log_summary();

    let seed = config.search.seed;
    let encoder = LabelEncoder::fit(&data.labels);
    let n_classes = encoder.n_classes();
    if n_classes < 2 {
        return Err(EnsembleError::InvalidConfig(format!(
            "need at least two classes, found {:?}",
            encoder.classes()
        )));
    }
    let y = encoder.encode_all(&data.labels)?;

    let transformer = FeatureTransformer::new(&FEATURE_NAMES)?;
    let x = transformer.transform(&samples_to_array(&data.samples))?;
    log::info!(
        "Expanded {} base features to {}",
        transformer.n_input_features(),
        transformer.output_dim()
    );

    let evaluator = FoldEvaluator::new(
        &x,
        &y,
        n_classes,
        config.search.n_folds,
        derive_seed(seed, FOLD_STREAM),
        config.k_neighbors,
    )?
    .with_parallel(config.search.parallel_folds)
    .with_class_names(encoder.classes());
    let search = run_search(&evaluator, config)?;

    let split = final_split(&x, &y, &encoder, config)?;
    log::info!(
        "Fitting final ensemble on {} balanced rows ({} held out), per class {:?}",
        split.train_x.nrows(),
        split.test_y.len(),
        class_counts(&split.train_y, n_classes)
    );

    let members = fit_members(
        &search.best.member_params(),
        &split.train_x,
        &split.train_y,
        n_classes,
        derive_seed(seed, FINAL_MEMBER_STREAM),
    )?;

    let probs = predict_ensemble(&members, &search.best.weights, &split.test_x)?;
    let y_pred = argmax_rows(&probs);
    let evaluation = EvaluationReport::new(&split.test_y, &y_pred, encoder.classes())
        .with_search(search.best_value, search.best.clone());
    log::info!("Final ensemble accuracy: {:.4}", evaluation.accuracy);

    let artifact = ModelArtifact::new(
        members,
        search.best.weights,
        transformer,
        encoder,
        search.best.clone(),
    )?;

    Ok(TrainingOutcome {
        artifact,
        evaluation,
        search,
    })
}

/// Held-out rows plus the oversampled training rows of the final fit.
#[derive(Debug)]
struct FinalSplit {
    train_x: Array2<f64>,
    train_y: Array1<usize>,
    test_x: Array2<f64>,
    test_y: Array1<usize>,
}

/// Stratified hold-out split. Only the training part is oversampled.
fn final_split(
    x: &Array2<f64>,
    y: &Array1<usize>,
    encoder: &LabelEncoder,
    config: &TrainingConfig,
) -> Result<FinalSplit> {
    let seed = config.search.seed;
    let n_classes = encoder.n_classes();
    let (train, test) = stratified_train_test_split(y, n_classes, config.test_size, seed)?;

    let (train_x, train_y) = select_rows(x, y, &train);
    let (train_x, train_y) =
        Smote::new(config.k_neighbors, derive_seed(seed, FINAL_BALANCE_STREAM))
            .with_class_names(encoder.classes())
            .fit_resample(&train_x, &train_y, n_classes)?;
    let (test_x, test_y) = select_rows(x, y, &test);

    Ok(FinalSplit {
        train_x,
        train_y,
        test_x,
        test_y,
    })
}
