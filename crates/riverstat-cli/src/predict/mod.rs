use anyhow::{Context, Result};
use riverstat_classifiers::{InferenceService, ServiceResponse};
use std::path::Path;

use crate::util::read_request_body;

/// Classify one JSON request with the model stored at `model_path`.
pub fn run_predict(model_path: &Path, request_path: Option<&Path>) -> Result<ServiceResponse> {
    let service = InferenceService::load(model_path)
        .with_context(|| format!("Failed to load model: {:?}", model_path))?;
    let body = read_request_body(request_path)?;
    Ok(service.handle_body(&body))
}
