//! The persisted, read-only bundle used for serving.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::MemberKind;
use crate::data_handling::{LabelEncoder, N_BASE_FEATURES};
use crate::ensemble::{predict_ensemble, EnsembleWeights};
use crate::error::{EnsembleError, Result};
use crate::models::{ClassifierModel, Member};
use crate::preprocessing::FeatureTransformer;
use crate::tuning::TrialConfig;

/// Bumped whenever the serialized layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// Fitted members in `MemberKind::ALL` order, together with everything
/// needed to turn raw measurements into a labelled prediction.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    format_version: u32,
    members: Vec<Member>,
    weights: EnsembleWeights,
    transformer: FeatureTransformer,
    label_encoder: LabelEncoder,
    best_config: TrialConfig,
    created_at: String,
}

impl ModelArtifact {
    pub fn new(
        members: Vec<Member>,
        weights: EnsembleWeights,
        transformer: FeatureTransformer,
        label_encoder: LabelEncoder,
        best_config: TrialConfig,
    ) -> Result<Self> {
        let artifact = ModelArtifact {
            format_version: FORMAT_VERSION,
            members,
            weights,
            transformer,
            label_encoder,
            best_config,
            created_at: chrono::Local::now().to_rfc3339(),
        };
        artifact.check().map_err(EnsembleError::InvalidConfig)?;
        Ok(artifact)
    }

    /// Structural checks shared by construction and loading.
    fn check(&self) -> std::result::Result<(), String> {
        if self.format_version != FORMAT_VERSION {
            return Err(format!(
                "format version {} is not supported (expected {})",
                self.format_version, FORMAT_VERSION
            ));
        }
        let kinds: Vec<MemberKind> = self.members.iter().map(Member::kind).collect();
        if kinds != MemberKind::ALL {
            return Err(format!(
                "members must be {:?}, found {:?}",
                MemberKind::ALL,
                kinds
            ));
        }
        if self.transformer.n_input_features() != N_BASE_FEATURES {
            return Err(format!(
                "transformer expects {} inputs, samples have {}",
                self.transformer.n_input_features(),
                N_BASE_FEATURES
            ));
        }
        if self.label_encoder.n_classes() < 2 {
            return Err("label encoder holds fewer than two classes".to_string());
        }
        self.weights.normalized().map_err(|e| e.to_string())?;

        let expected = (
            self.transformer.output_dim(),
            self.label_encoder.n_classes(),
        );
        for member in &self.members {
            let dims = member.fitted_dims().map_err(|e| e.to_string())?;
            if dims != expected {
                return Err(format!(
                    "{} member was fitted on {} features and {} classes, \
                     the bundle expects {} features and {} classes",
                    member.name(),
                    dims.0,
                    dims.1,
                    expected.0,
                    expected.1
                ));
            }
        }
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer(writer, self)?;
        log::info!("Saved model artifact to {}", path.as_ref().display());
        Ok(())
    }

    /// Load and validate an artifact. Every failure is reported as
    /// `ArtifactLoad` naming the path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let load_error = |reason: String| EnsembleError::ArtifactLoad {
            path: path.display().to_string(),
            reason,
        };

        let file = File::open(path).map_err(|e| load_error(e.to_string()))?;
        let artifact: ModelArtifact = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| load_error(e.to_string()))?;
        artifact.check().map_err(load_error)?;

        log::info!(
            "Loaded model artifact from {} (created {}, classes {:?})",
            path.display(),
            artifact.created_at,
            artifact.label_encoder.classes()
        );
        Ok(artifact)
    }

    /// Class probabilities for raw (unexpanded) measurement rows.
    pub fn predict_proba(&self, raw: &Array2<f64>) -> Result<Array2<f64>> {
        let expanded = self.transformer.transform(raw)?;
        predict_ensemble(&self.members, &self.weights, &expanded)
    }

    pub fn class_names(&self) -> &[String] {
        self.label_encoder.classes()
    }

    pub fn label_encoder(&self) -> &LabelEncoder {
        &self.label_encoder
    }

    pub fn weights(&self) -> &EnsembleWeights {
        &self.weights
    }

    pub fn best_config(&self) -> &TrialConfig {
        &self.best_config
    }

    pub fn transformer(&self) -> &FeatureTransformer {
        &self.transformer
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }
}
