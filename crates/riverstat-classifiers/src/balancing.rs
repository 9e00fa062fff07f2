//! Synthetic minority oversampling (SMOTE).
//!
//! Only ever applied to the training part of a split; validation and test
//! rows are never resampled.
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::{EnsembleError, Result};

/// Default neighbourhood size.
pub const DEFAULT_K_NEIGHBORS: usize = 5;

/// Oversamples every class up to the majority class count.
#[derive(Debug, Clone)]
pub struct Smote {
    k_neighbors: usize,
    seed: u64,
    class_names: Vec<String>,
}

impl Smote {
    pub fn new(k_neighbors: usize, seed: u64) -> Self {
        Smote {
            k_neighbors: k_neighbors.max(1),
            seed,
            class_names: Vec::new(),
        }
    }

    /// Names reported in errors, indexed by class code.
    pub fn with_class_names<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.class_names = names.iter().map(|n| n.as_ref().to_string()).collect();
        self
    }

    fn class_label(&self, class: usize) -> String {
        self.class_names
            .get(class)
            .cloned()
            .unwrap_or_else(|| class.to_string())
    }

    /// Balance `(x, y)` so that every one of `n_classes` classes reaches the
    /// majority count.
    ///
    /// The original rows come first, synthetic rows are appended class by
    /// class. Each synthetic row lies on the segment between a class member
    /// and one of its `k` nearest same-class neighbours, with `k` reduced to
    /// `count - 1` for small classes.
    ///
    /// # Errors
    ///
    /// `InsufficientSamples` if any class has fewer than two rows.
    pub fn fit_resample(
        &self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        n_classes: usize,
    ) -> Result<(Array2<f64>, Array1<usize>)> {
        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
        for (i, &label) in y.iter().enumerate() {
            let group = groups.get_mut(label).ok_or_else(|| {
                EnsembleError::InvalidConfig(format!(
                    "label {} out of range for {} classes",
                    label, n_classes
                ))
            })?;
            group.push(i);
        }

        for (class, group) in groups.iter().enumerate() {
            if group.len() < 2 {
                return Err(EnsembleError::InsufficientSamples {
                    class: self.class_label(class),
                    count: group.len(),
                });
            }
        }

        let majority = groups.iter().map(Vec::len).max().unwrap_or(0);
        let n_synthetic: usize = groups.iter().map(|g| majority - g.len()).sum();
        let n_features = x.ncols();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut data = Vec::with_capacity((x.nrows() + n_synthetic) * n_features);
        data.extend(x.iter().copied());
        let mut labels = y.to_vec();
        labels.reserve(n_synthetic);

        for (class, group) in groups.iter().enumerate() {
            let needed = majority - group.len();
            if needed == 0 {
                continue;
            }
            let k = self.k_neighbors.min(group.len() - 1);
            let neighbours = nearest_neighbours(x, group, k);

            let mut order: Vec<usize> = (0..group.len()).collect();
            order.shuffle(&mut rng);
            for step in 0..needed {
                let member = order[step % order.len()];
                let neighbour = neighbours[member][rng.gen_range(0..k)];
                let gap: f64 = rng.gen();
                let base = x.row(group[member]);
                let other = x.row(neighbour);
                data.extend(
                    base.iter()
                        .zip(other.iter())
                        .map(|(&a, &b)| a + gap * (b - a)),
                );
                labels.push(class);
            }
            log::debug!(
                "Class {}: {} original rows, {} synthetic rows (k = {})",
                class,
                group.len(),
                needed,
                k
            );
        }

        let n_rows = labels.len();
        let x_out = Array2::from_shape_vec((n_rows, n_features), data).map_err(|_| {
            EnsembleError::Shape {
                expected: n_features,
                found: x.ncols(),
            }
        })?;
        Ok((x_out, Array1::from_vec(labels)))
    }
}

impl Default for Smote {
    fn default() -> Self {
        Smote::new(DEFAULT_K_NEIGHBORS, 42)
    }
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(p, q)| (p - q) * (p - q)).sum()
}

/// For each member of `group` (by position), the row indices of its `k`
/// nearest other members. Ties keep the lower row index first.
fn nearest_neighbours(x: &Array2<f64>, group: &[usize], k: usize) -> Vec<Vec<usize>> {
    group
        .iter()
        .map(|&i| {
            let mut distances: Vec<(f64, usize)> = group
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| (squared_distance(x.row(i), x.row(j)), j))
                .collect();
            distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            distances.into_iter().take(k).map(|(_, j)| j).collect()
        })
        .collect()
}

/// Per-class row counts, useful for logging and assertions.
pub fn class_counts(y: &Array1<usize>, n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for &label in y.iter() {
        if label < n_classes {
            counts[label] += 1;
        }
    }
    counts
}

/// Select rows of a labelled set.
pub fn select_rows(
    x: &Array2<f64>,
    y: &Array1<usize>,
    indices: &[usize],
) -> (Array2<f64>, Array1<usize>) {
    (x.select(Axis(0), indices), y.select(Axis(0), indices))
}
