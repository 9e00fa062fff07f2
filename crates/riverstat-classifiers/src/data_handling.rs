//! Data structures and helpers for loading and partitioning water-quality samples.
//!
//! This module defines `WaterSample`, the fitted `LabelEncoder`, and the
//! stratified fold / hold-out splitting used by the cross-validated search
//! and the final fit.
use std::collections::BTreeSet;

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EnsembleError, Result};

/// Base measurement names in the order the models are trained on.
pub const FEATURE_NAMES: [&str; 8] = ["DO", "DO_SAT", "BOD", "COD", "SS", "pH", "NH3N", "TEMP"];

/// Number of base measurements per sample.
pub const N_BASE_FEATURES: usize = FEATURE_NAMES.len();

/// One river sample: eight water-chemistry measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterSample {
    /// Dissolved oxygen (mg/l)
    #[serde(rename = "DO")]
    pub dissolved_oxygen: f64,
    /// Dissolved oxygen (% saturation)
    #[serde(rename = "DO_SAT")]
    pub do_saturation: f64,
    #[serde(rename = "BOD")]
    pub bod: f64,
    #[serde(rename = "COD")]
    pub cod: f64,
    /// Suspended solids (mg/l)
    #[serde(rename = "SS")]
    pub suspended_solids: f64,
    #[serde(rename = "pH")]
    pub ph: f64,
    /// Ammoniacal nitrogen (mg/l)
    #[serde(rename = "NH3N")]
    pub ammoniacal_nitrogen: f64,
    /// Water temperature (°C)
    #[serde(rename = "TEMP")]
    pub temperature: f64,
}

impl WaterSample {
    /// Build a sample from values in `FEATURE_NAMES` order.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        if values.len() != N_BASE_FEATURES {
            return Err(EnsembleError::Shape {
                expected: N_BASE_FEATURES,
                found: values.len(),
            });
        }
        for (name, value) in FEATURE_NAMES.iter().zip(values) {
            if !value.is_finite() {
                return Err(EnsembleError::InvalidValue {
                    field: name.to_string(),
                    reason: format!("{} is not finite", value),
                });
            }
        }
        Ok(WaterSample {
            dissolved_oxygen: values[0],
            do_saturation: values[1],
            bod: values[2],
            cod: values[3],
            suspended_solids: values[4],
            ph: values[5],
            ammoniacal_nitrogen: values[6],
            temperature: values[7],
        })
    }

    /// Validate a JSON request object and reconstruct the sample.
    ///
    /// Fields are looked up by name, so the key order in the request does not
    /// matter. Every name in `FEATURE_NAMES` must be present and numeric.
    pub fn from_json(payload: &Value) -> Result<Self> {
        let object = payload.as_object().ok_or_else(|| EnsembleError::InvalidValue {
            field: "request".to_string(),
            reason: "expected a JSON object".to_string(),
        })?;

        let mut values = [0.0f64; N_BASE_FEATURES];
        for (slot, name) in values.iter_mut().zip(FEATURE_NAMES) {
            let value = object
                .get(name)
                .ok_or_else(|| EnsembleError::MissingField(name.to_string()))?;
            *slot = value.as_f64().ok_or_else(|| EnsembleError::InvalidValue {
                field: name.to_string(),
                reason: format!("expected a number, got {}", value),
            })?;
        }
        Self::from_slice(&values)
    }

    pub fn to_array(&self) -> [f64; N_BASE_FEATURES] {
        [
            self.dissolved_oxygen,
            self.do_saturation,
            self.bod,
            self.cod,
            self.suspended_solids,
            self.ph,
            self.ammoniacal_nitrogen,
            self.temperature,
        ]
    }
}

/// Stack samples into an `(n_samples, 8)` matrix.
pub fn samples_to_array(samples: &[WaterSample]) -> Array2<f64> {
    let mut x = Array2::zeros((samples.len(), N_BASE_FEATURES));
    for (mut row, sample) in x.rows_mut().into_iter().zip(samples) {
        for (cell, value) in row.iter_mut().zip(sample.to_array()) {
            *cell = value;
        }
    }
    x
}

/// Cleaned samples with their raw string labels, as produced by the CSV loader.
#[derive(Debug, Clone, Default)]
pub struct LabeledSamples {
    pub samples: Vec<WaterSample>,
    pub labels: Vec<String>,
}

impl LabeledSamples {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn push(&mut self, sample: WaterSample, label: impl Into<String>) {
        self.samples.push(sample);
        self.labels.push(label.into());
    }

    pub fn log_summary(&self) {
        let encoder = LabelEncoder::fit(&self.labels);
        log::info!("----- Input Data Summary -----");
        log::info!("{} samples, {} measurements each", self.len(), N_BASE_FEATURES);
        for class in encoder.classes() {
            let count = self.labels.iter().filter(|l| *l == class).count();
            log::info!("  {}: {}", class, count);
        }
    }
}

/// Bijective mapping between class names and dense integer codes.
///
/// Classes are sorted when fitted; the order never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Self {
        let classes: BTreeSet<&str> = labels.iter().map(|l| l.as_ref()).collect();
        LabelEncoder {
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| EnsembleError::UnknownLabel(label.to_string()))
    }

    pub fn encode_all<S: AsRef<str>>(&self, labels: &[S]) -> Result<Array1<usize>> {
        labels
            .iter()
            .map(|l| self.encode(l.as_ref()))
            .collect::<Result<Vec<_>>>()
            .map(Array1::from_vec)
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

/// One train/validation split of row indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Group row indices by encoded class.
fn indices_by_class(y: &Array1<usize>, n_classes: usize) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(); n_classes];
    for (i, &label) in y.iter().enumerate() {
        if let Some(group) = groups.get_mut(label) {
            group.push(i);
        }
    }
    groups
}

/// Stratified k-fold partition.
///
/// Each class's indices are shuffled with `seed` and dealt round-robin over
/// the folds, so every fold keeps the overall class proportions. Within each
/// fold the indices are sorted.
///
/// # Arguments
///
/// * `y` - Encoded labels
/// * `n_classes` - Number of classes known to the encoder
/// * `n_folds` - Number of folds, at least 2
/// * `seed` - Shuffle seed
pub fn stratified_kfold(
    y: &Array1<usize>,
    n_classes: usize,
    n_folds: usize,
    seed: u64,
) -> Result<Vec<Fold>> {
    if n_folds < 2 {
        return Err(EnsembleError::InvalidConfig(format!(
            "n_folds must be at least 2, got {}",
            n_folds
        )));
    }
    if y.len() < n_folds {
        return Err(EnsembleError::InvalidConfig(format!(
            "cannot split {} samples into {} folds",
            y.len(),
            n_folds
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![0usize; y.len()];
    // Continue the round-robin across classes so small classes do not all
    // land in fold 0.
    let mut next_fold = 0;
    for mut group in indices_by_class(y, n_classes) {
        group.shuffle(&mut rng);
        for idx in group {
            assignment[idx] = next_fold;
            next_fold = (next_fold + 1) % n_folds;
        }
    }

    let folds = (0..n_folds)
        .map(|k| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..y.len()).partition(|&i| assignment[i] == k);
            log::trace!(
                "Fold {}: {} training rows, {} validation rows",
                k,
                train.len(),
                validation.len()
            );
            Fold { train, validation }
        })
        .collect();
    Ok(folds)
}

/// Stratified hold-out split, returning `(train, test)` index lists.
///
/// Each class contributes `round(count * test_size)` rows to the test split,
/// but always keeps at least one row for training.
pub fn stratified_train_test_split(
    y: &Array1<usize>,
    n_classes: usize,
    test_size: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(EnsembleError::InvalidConfig(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(y.len());
    let mut test = Vec::new();
    for mut group in indices_by_class(y, n_classes) {
        group.shuffle(&mut rng);
        let n_test = ((group.len() as f64) * test_size).round() as usize;
        let n_test = n_test.min(group.len().saturating_sub(1));
        test.extend_from_slice(&group[..n_test]);
        train.extend_from_slice(&group[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

/// Derive an independent seed for a sub-step from a base seed and a stream id.
///
/// SplitMix64 finalizer; distinct streams give well separated seeds.
pub fn derive_seed(base: u64, stream: u64) -> u64 {
    let mut z = base.wrapping_add(stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
