use thiserror::Error;

/// Errors raised while training, persisting or querying the ensemble.
#[derive(Debug, Error)]
pub enum EnsembleError {
    #[error("shape mismatch: expected {expected} features, got {found}")]
    Shape { expected: usize, found: usize },

    #[error("class {class} has {count} sample(s); at least 2 are needed to synthesize neighbours")]
    InsufficientSamples { class: String, count: usize },

    #[error("invalid ensemble weights: {0}")]
    InvalidWeights(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("invalid value for field {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("failed to load model artifact from {path}: {reason}")]
    ArtifactLoad { path: String, reason: String },

    #[error("unknown class label: {0}")]
    UnknownLabel(String),

    #[error("{model} model error: {reason}")]
    Model { model: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("search space is empty")]
    EmptySearchSpace,

    #[error("no trial completed successfully")]
    NoCompletedTrials,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EnsembleError {
    pub fn model(model: &str, reason: impl ToString) -> Self {
        EnsembleError::Model {
            model: model.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the search may record the trial as failed and move on.
    ///
    /// Only member fitting failures qualify. Balancing, shape and weight
    /// errors point at the data or configuration and abort the run.
    pub fn is_trial_recoverable(&self) -> bool {
        matches!(self, EnsembleError::Model { .. })
    }

    /// True for errors caused by a malformed prediction request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EnsembleError::Shape { .. }
                | EnsembleError::MissingField(_)
                | EnsembleError::InvalidValue { .. }
                | EnsembleError::InvalidWeights(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EnsembleError>;
