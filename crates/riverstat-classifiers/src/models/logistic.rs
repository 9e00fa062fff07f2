use linfa::traits::Fit;
use linfa::Dataset;
use linfa_logistic::MultiLogisticRegression;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::LogisticParams;
use crate::error::{EnsembleError, Result};
use crate::models::classifier_trait::{normalize_rows, ClassifierModel};
use crate::preprocessing::Scaler;

/// Coefficients of a fitted softmax model, kept in plain arrays so the
/// artifact does not depend on the optimizer's types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SoftmaxWeights {
    scaler: Scaler,
    /// Shape `(n_features, n_seen_classes)`.
    coefficients: Array2<f64>,
    intercept: Array1<f64>,
    /// Class code of each coefficient column, ascending.
    seen_classes: Vec<usize>,
}

/// Multinomial logistic regression with L2 penalty, fitted by L-BFGS on
/// standardized features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticClassifier {
    params: LogisticParams,
    n_classes: usize,
    weights: Option<SoftmaxWeights>,
}

impl LogisticClassifier {
    pub fn new(params: LogisticParams) -> Self {
        LogisticClassifier {
            params,
            n_classes: 0,
            weights: None,
        }
    }

    pub fn params(&self) -> &LogisticParams {
        &self.params
    }
}

impl ClassifierModel for LogisticClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
        if x.nrows() != y.len() || x.nrows() == 0 {
            return Err(EnsembleError::model(
                self.name(),
                format!("{} rows but {} labels", x.nrows(), y.len()),
            ));
        }

        let mut seen_classes = y.to_vec();
        seen_classes.sort_unstable();
        seen_classes.dedup();
        if seen_classes.len() < 2 {
            return Err(EnsembleError::model(
                self.name(),
                "at least two classes are required",
            ));
        }

        let scaler = Scaler::fit(x)?;
        let records = scaler.transform(x)?;
        let dataset = Dataset::new(records, y.clone());

        let model = MultiLogisticRegression::default()
            .alpha(self.params.alpha)
            .max_iterations(self.params.max_iterations)
            .fit(&dataset)
            .map_err(|e| EnsembleError::model("logistic", e))?;

        let coefficients = model.params().to_owned();
        let intercept = model.intercept().to_owned();
        if coefficients.ncols() != seen_classes.len() || intercept.len() != seen_classes.len() {
            return Err(EnsembleError::model(
                self.name(),
                format!(
                    "fitted {} coefficient columns for {} classes",
                    coefficients.ncols(),
                    seen_classes.len()
                ),
            ));
        }

        self.n_classes = n_classes;
        self.weights = Some(SoftmaxWeights {
            scaler,
            coefficients,
            intercept,
            seen_classes,
        });
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let weights = self
            .weights
            .as_ref()
            .ok_or_else(|| EnsembleError::model(self.name(), "model has not been fitted"))?;
        let records = weights.scaler.transform(x)?;

        let mut logits = records.dot(&weights.coefficients) + &weights.intercept;
        // Stable softmax.
        for mut row in logits.axis_iter_mut(Axis(0)) {
            let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
        }

        let mut probs = Array2::zeros((x.nrows(), self.n_classes));
        for (column, &class) in weights.seen_classes.iter().enumerate() {
            if class < self.n_classes {
                probs.column_mut(class).assign(&logits.column(column));
            }
        }
        normalize_rows(&mut probs);
        Ok(probs)
    }

    fn fitted_dims(&self) -> Result<(usize, usize)> {
        let weights = self
            .weights
            .as_ref()
            .ok_or_else(|| EnsembleError::model(self.name(), "model has not been fitted"))?;
        let n_features = weights.coefficients.nrows();
        let n_seen = weights.seen_classes.len();
        if weights.scaler.mean.len() != n_features || weights.scaler.std.len() != n_features {
            return Err(EnsembleError::model(
                self.name(),
                format!(
                    "scaler has {} columns, coefficients have {} rows",
                    weights.scaler.mean.len(),
                    n_features
                ),
            ));
        }
        if weights.coefficients.ncols() != n_seen || weights.intercept.len() != n_seen {
            return Err(EnsembleError::model(
                self.name(),
                format!(
                    "{} coefficient columns and {} intercepts for {} classes",
                    weights.coefficients.ncols(),
                    weights.intercept.len(),
                    n_seen
                ),
            ));
        }
        if weights.seen_classes.iter().any(|&c| c >= self.n_classes) {
            return Err(EnsembleError::model(
                self.name(),
                format!("class codes out of range for {} classes", self.n_classes),
            ));
        }
        Ok((n_features, self.n_classes))
    }

    fn name(&self) -> &str {
        "logistic"
    }
}
