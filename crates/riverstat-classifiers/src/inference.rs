//! Request handling for a loaded model artifact.
//!
//! `InferenceService` owns the artifact behind an `Arc` that readers clone,
//! so predictions never block each other and a reload swaps the model in one
//! step.
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use ndarray::Array2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::artifact::ModelArtifact;
use crate::data_handling::{WaterSample, N_BASE_FEATURES};
use crate::ensemble::argmax_rows;
use crate::error::{EnsembleError, Result};

/// One classified sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(rename = "prediction")]
    pub label: String,
    /// Highest class probability as a percentage, rounded to two decimals.
    pub confidence: f64,
    /// Class name to probability, in the label encoder's class order.
    pub probabilities: BTreeMap<String, f64>,
}

/// Status code and JSON body returned for a prediction request.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: Value,
}

impl ServiceResponse {
    fn error(status: u16, message: impl Into<String>) -> Self {
        ServiceResponse {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct InferenceService {
    artifact: RwLock<Arc<ModelArtifact>>,
}

impl InferenceService {
    pub fn new(artifact: ModelArtifact) -> Self {
        InferenceService {
            artifact: RwLock::new(Arc::new(artifact)),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(ModelArtifact::load(path)?))
    }

    /// The artifact serving requests right now.
    pub fn current(&self) -> Arc<ModelArtifact> {
        Arc::clone(&self.artifact.read())
    }

    /// Swap in a new artifact. Requests already running keep the old one.
    pub fn replace(&self, artifact: ModelArtifact) {
        *self.artifact.write() = Arc::new(artifact);
        log::info!("Model artifact replaced");
    }

    /// Load an artifact from disk and swap it in. On failure the current
    /// artifact stays in place.
    pub fn reload<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        match ModelArtifact::load(path.as_ref()) {
            Ok(artifact) => {
                self.replace(artifact);
                Ok(())
            }
            Err(e) => {
                log::warn!("Keeping current model, reload failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn predict(&self, sample: &WaterSample) -> Result<Prediction> {
        let artifact = self.current();
        let raw = Array2::from_shape_vec((1, N_BASE_FEATURES), sample.to_array().to_vec())
            .map_err(|e| EnsembleError::InvalidValue {
                field: "request".to_string(),
                reason: e.to_string(),
            })?;
        let probs = artifact.predict_proba(&raw)?;
        let best = argmax_rows(&probs)[0];
        let row = probs.row(0);
        let label = artifact
            .label_encoder()
            .decode(best)
            .ok_or_else(|| EnsembleError::UnknownLabel(best.to_string()))?
            .to_string();
        let probabilities = artifact
            .class_names()
            .iter()
            .cloned()
            .zip(row.iter().copied())
            .collect();

        Ok(Prediction {
            label,
            confidence: round2(row[best] * 100.0),
            probabilities,
        })
    }

    /// Parse a raw request body and classify it. A body that is not JSON is
    /// a 400 like any other bad input.
    pub fn handle_body(&self, body: &str) -> ServiceResponse {
        match serde_json::from_str::<Value>(body) {
            Ok(payload) => self.handle_request(&payload),
            Err(e) => {
                log::debug!("Rejected request body: {}", e);
                ServiceResponse::error(400, format!("invalid JSON: {}", e))
            }
        }
    }

    /// Validate a JSON request and classify it.
    ///
    /// Returns 200 with the prediction, 400 with the error message for bad
    /// input, and 500 with a generic message for anything else, including
    /// panics inside the models.
    pub fn handle_request(&self, payload: &Value) -> ServiceResponse {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let sample = WaterSample::from_json(payload)?;
            self.predict(&sample)
        }));

        match outcome {
            Ok(Ok(prediction)) => match serde_json::to_value(&prediction) {
                Ok(body) => ServiceResponse { status: 200, body },
                Err(e) => {
                    log::error!("Failed to serialize prediction: {}", e);
                    ServiceResponse::error(500, "internal error")
                }
            },
            Ok(Err(e)) if e.is_client_error() => {
                log::debug!("Rejected request: {}", e);
                ServiceResponse::error(400, e.to_string())
            }
            Ok(Err(e)) => {
                log::error!("Prediction failed: {}", e);
                ServiceResponse::error(500, "internal error")
            }
            Err(_) => {
                log::error!("Prediction panicked");
                ServiceResponse::error(500, "internal error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_keeps_two_decimals() {
        assert_eq!(round2(87.654_321), 87.65);
        assert_eq!(round2(12.346), 12.35);
        assert_eq!(round2(100.0), 100.0);
    }

    #[test]
    fn error_body_has_message() {
        let response = ServiceResponse::error(400, "missing field: TEMP");
        assert_eq!(response.body["error"], "missing field: TEMP");
        assert!(!response.is_success());
    }
}
