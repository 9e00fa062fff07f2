//! riverstat-classifiers: river water-quality status classification.
//!
//! A weighted soft-voting ensemble of gradient boosted trees, a random forest
//! and multinomial logistic regression, trained on pairwise-interaction
//! features with SMOTE oversampling. Member hyper-parameters and ensemble
//! weights are tuned jointly by a seeded TPE search over stratified
//! cross-validation. The fitted ensemble is persisted as a `ModelArtifact`
//! and served through `InferenceService`.
pub mod artifact;
pub mod balancing;
pub mod config;
pub mod cross_validation;
pub mod data_handling;
pub mod ensemble;
pub mod error;
pub mod hpo;
pub mod inference;
pub mod io;
pub mod models;
pub mod preprocessing;
pub mod report;
pub mod stats;
pub mod trainer;
pub mod tuning;

pub use artifact::ModelArtifact;
pub use error::{EnsembleError, Result};
pub use inference::{InferenceService, Prediction, ServiceResponse};
pub use trainer::{run_training, TrainingOutcome};
