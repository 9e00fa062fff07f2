use ndarray::{Array1, Array2};

use crate::error::Result;

/// Capability shared by every ensemble member.
///
/// `y` holds dense class codes in `0..n_classes`. `predict_proba` must return
/// an `(n_samples, n_classes)` matrix whose rows sum to one, with columns in
/// class-code order even when a class was missing from the training rows.
pub trait ClassifierModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()>;

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// `(n_features, n_classes)` of the fitted model. Fails when the model is
    /// unfitted or its fitted state disagrees with itself.
    fn fitted_dims(&self) -> Result<(usize, usize)>;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Normalize each row to sum to one. Rows with no mass become uniform.
pub(crate) fn normalize_rows(probs: &mut Array2<f64>) {
    let n_classes = probs.ncols();
    for mut row in probs.rows_mut() {
        let total: f64 = row.sum();
        if total > 0.0 && total.is_finite() {
            row.mapv_inplace(|p| p / total);
        } else {
            row.fill(1.0 / n_classes as f64);
        }
    }
}
