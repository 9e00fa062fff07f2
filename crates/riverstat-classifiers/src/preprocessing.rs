//! Feature preprocessing shared by training and inference.
//!
//! `FeatureTransformer` expands the base measurements with every pairwise
//! interaction product. `Scaler` is a per-column standardizer used by
//! members that are sensitive to feature magnitude.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{EnsembleError, Result};

/// Degree-2, interaction-only polynomial expansion (no squares, no bias).
///
/// Output layout: the `n` input columns, then `x_i * x_j` for every `i < j`
/// in lexicographic order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureTransformer {
    input_names: Vec<String>,
}

impl FeatureTransformer {
    pub fn new<S: AsRef<str>>(input_names: &[S]) -> Result<Self> {
        if input_names.is_empty() {
            return Err(EnsembleError::Shape {
                expected: 1,
                found: 0,
            });
        }
        Ok(FeatureTransformer {
            input_names: input_names.iter().map(|s| s.as_ref().to_string()).collect(),
        })
    }

    /// Fit on training rows. Only the column count is learned; columns are
    /// named `x0..x{n-1}`.
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let names: Vec<String> = (0..x.ncols()).map(|i| format!("x{}", i)).collect();
        Self::new(&names)
    }

    pub fn n_input_features(&self) -> usize {
        self.input_names.len()
    }

    pub fn output_dim(&self) -> usize {
        let n = self.n_input_features();
        n + n * (n - 1) / 2
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    /// Names of the expanded columns, e.g. `"DO BOD"` for an interaction.
    pub fn feature_names_out(&self) -> Vec<String> {
        let n = self.n_input_features();
        let mut names = self.input_names.clone();
        for i in 0..n {
            for j in (i + 1)..n {
                names.push(format!("{} {}", self.input_names[i], self.input_names[j]));
            }
        }
        names
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        self.check_arity(row.len())?;
        let mut out = Vec::with_capacity(self.output_dim());
        out.extend_from_slice(row);
        push_interactions(row, &mut out);
        Ok(out)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_arity(x.ncols())?;
        let n_out = self.output_dim();
        let mut data = Vec::with_capacity(x.nrows() * n_out);
        for row in x.axis_iter(Axis(0)) {
            let row = row.to_vec();
            data.extend_from_slice(&row);
            push_interactions(&row, &mut data);
        }
        Array2::from_shape_vec((x.nrows(), n_out), data).map_err(|_| EnsembleError::Shape {
            expected: n_out,
            found: x.ncols(),
        })
    }

    fn check_arity(&self, found: usize) -> Result<()> {
        if found != self.n_input_features() {
            return Err(EnsembleError::Shape {
                expected: self.n_input_features(),
                found,
            });
        }
        Ok(())
    }
}

fn push_interactions(row: &[f64], out: &mut Vec<f64>) {
    for (i, &a) in row.iter().enumerate() {
        for &b in &row[i + 1..] {
            out.push(a * b);
        }
    }
}

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl Scaler {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f64 = 1e-9;

    /// Fit from rows = samples, columns = features.
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let mean = x.mean_axis(Axis(0)).ok_or(EnsembleError::Shape {
            expected: 1,
            found: 0,
        })?;
        let std = x.std_axis(Axis(0), 0.0).mapv(|s| s.max(Self::MIN_STD));
        Ok(Scaler { mean, std })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(EnsembleError::Shape {
                expected: self.mean.len(),
                found: x.ncols(),
            });
        }
        Ok((x - &self.mean) / &self.std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::FEATURE_NAMES;
    use ndarray::array;

    #[test]
    fn expands_eight_measurements_to_thirty_six() {
        let transformer = FeatureTransformer::new(&FEATURE_NAMES).unwrap();
        assert_eq!(transformer.output_dim(), 36);
        let row = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let out = transformer.transform_row(&row).unwrap();
        assert_eq!(out.len(), 36);
        assert_eq!(&out[..8], &row);
        // DO*DO_SAT, DO*BOD, ... then the last pair NH3N*TEMP.
        assert_eq!(out[8], 2.0);
        assert_eq!(out[9], 3.0);
        assert_eq!(out[35], 56.0);
        assert_eq!(transformer.feature_names_out()[8], "DO DO_SAT");
    }

    #[test]
    fn transform_is_deterministic_and_matches_row_path() {
        let transformer = FeatureTransformer::new(&["a", "b", "c"]).unwrap();
        let x = array![[0.1, -2.5, 3.0], [1e3, 0.0, -7.25]];
        let first = transformer.transform(&x).unwrap();
        let second = transformer.transform(&x).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.ncols(), 3 + 3);
        for (i, row) in x.rows().into_iter().enumerate() {
            let single = transformer.transform_row(row.as_slice().unwrap()).unwrap();
            assert_eq!(first.row(i).to_vec(), single);
        }
    }

    #[test]
    fn wrong_arity_is_a_shape_error() {
        let transformer = FeatureTransformer::new(&FEATURE_NAMES).unwrap();
        let err = transformer.transform_row(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            EnsembleError::Shape {
                expected: 8,
                found: 2
            }
        ));
    }

    #[test]
    fn fit_records_column_count() {
        let x = Array2::<f64>::zeros((4, 5));
        let transformer = FeatureTransformer::fit(&x).unwrap();
        assert_eq!(transformer.n_input_features(), 5);
        assert_eq!(transformer.output_dim(), 15);
    }

    #[test]
    fn scaler_standardizes_columns() {
        let x = array![[1.0, 10.0], [3.0, 10.0]];
        let scaler = Scaler::fit(&x).unwrap();
        let z = scaler.transform(&x).unwrap();
        assert!((z[(0, 0)] + 1.0).abs() < 1e-12);
        assert!((z[(1, 0)] - 1.0).abs() < 1e-12);
        assert_eq!(z[(0, 1)], 0.0);
    }
}
