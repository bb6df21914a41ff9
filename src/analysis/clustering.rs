//! Deterministic seeded K-means over the canonical numeric matrix

use crate::error::{DeckError, Result};
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::Array2;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

/// Result of one clustering run
#[derive(Debug, Clone)]
pub struct ClusterOutcome {
    /// Cluster assignment per sample, values in `[0, k)`
    pub labels: Vec<usize>,
    /// Sum of squared distances to assigned centroids
    pub inertia: f64,
    /// Samples per cluster
    pub sizes: Vec<usize>,
}

/// Run K-means with an explicit, request-local random stream.
///
/// Identical `(matrix, k, seed, max_iter)` always yields identical labels and
/// inertia; the seed never touches process-wide RNG state.
///
/// # Errors
/// Returns `Computation` if `k` is 0, exceeds the sample count, or the matrix
/// contains non-finite values
pub fn cluster(matrix: &Array2<f64>, k: usize, seed: u64, max_iter: usize) -> Result<ClusterOutcome> {
    let n_samples = matrix.nrows();

    if k == 0 {
        return Err(DeckError::Computation("k must be at least 1".into()));
    }
    if k > n_samples {
        return Err(DeckError::Computation(format!(
            "cannot form {k} clusters from {n_samples} samples"
        )));
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(DeckError::Computation(
            "matrix contains non-finite values".into(),
        ));
    }

    let rng = Xoshiro256Plus::seed_from_u64(seed);
    let dataset = DatasetBase::from(matrix.clone());

    let model = KMeans::params_with(k, rng, L2Dist)
        .max_n_iterations(max_iter as u64)
        .tolerance(1e-4)
        .fit(&dataset)
        .map_err(|e| DeckError::Computation(format!("K-means failed: {e}")))?;

    let labels: Vec<usize> = model.predict(&dataset).iter().copied().collect();
    let centroids = model.centroids();

    let mut inertia = 0.0;
    let mut sizes = vec![0usize; k];
    for (sample, &label) in matrix.outer_iter().zip(&labels) {
        sizes[label] += 1;
        inertia += sample
            .iter()
            .zip(centroids.row(label).iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>();
    }

    Ok(ClusterOutcome {
        labels,
        inertia,
        sizes,
    })
}
