//! 2-D projection of the feature matrix for visualization

use crate::error::{DeckError, Result};
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_reduction::Pca;
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

/// Supported projection methods. Names outside this set fall back to
/// [`ProjectionMethod::NeighborManifold`], the documented default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMethod {
    /// Deterministic linear projection (PCA)
    Linear,
    /// Stochastic neighbor embedding (t-SNE style), seeded
    NeighborStochastic,
    /// Manifold neighbor embedding (UMAP style), seeded
    NeighborManifold,
}

impl ProjectionMethod {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(Self::Linear),
            "neighbor-stochastic" => Some(Self::NeighborStochastic),
            "neighbor-manifold" => Some(Self::NeighborManifold),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::NeighborStochastic => "neighbor-stochastic",
            Self::NeighborManifold => "neighbor-manifold",
        }
    }
}

/// Project each sample to an `(x, y)` pair, preserving the sample order.
///
/// The linear method is deterministic for fixed input; the neighbor methods
/// are deterministic for a fixed seed within this implementation but make no
/// bitwise-stability promise across library versions.
///
/// # Errors
/// Returns `Computation` if the matrix contains non-finite values or the
/// linear fit fails
pub fn project(
    matrix: &Array2<f64>,
    method: ProjectionMethod,
    seed: u64,
) -> Result<Vec<(f64, f64)>> {
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(DeckError::Computation(
            "matrix contains non-finite values".into(),
        ));
    }

    match method {
        ProjectionMethod::Linear => linear(matrix),
        ProjectionMethod::NeighborStochastic => stochastic(matrix, seed),
        ProjectionMethod::NeighborManifold => manifold(matrix, seed),
    }
}

/// PCA down to two components; degenerate shapes project directly
fn linear(matrix: &Array2<f64>) -> Result<Vec<(f64, f64)>> {
    let n = matrix.nrows();
    let d = matrix.ncols();

    // PCA needs at least 2 samples and 2 features; smaller shapes are
    // already at most 2-dimensional and project by column
    if n < 2 || d < 2 {
        return Ok((0..n)
            .map(|i| {
                let x = if d > 0 { matrix[[i, 0]] } else { 0.0 };
                let y = if d > 1 { matrix[[i, 1]] } else { 0.0 };
                (x, y)
            })
            .collect());
    }

    let embed = 2.min(d).min(n - 1).max(1);
    let dataset = DatasetBase::from(matrix.clone());
    let pca = Pca::params(embed)
        .fit(&dataset)
        .map_err(|e| DeckError::Computation(format!("PCA failed: {e}")))?;
    let embedded: Array2<f64> = pca.predict(matrix);

    Ok((0..n)
        .map(|i| {
            let x = embedded[[i, 0]];
            let y = if embedded.ncols() > 1 {
                embedded[[i, 1]]
            } else {
                0.0
            };
            (x, y)
        })
        .collect())
}

fn pairwise_distances(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    let n = matrix.nrows();
    let mut distances = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = matrix
                .row(i)
                .iter()
                .zip(matrix.row(j).iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            distances[i][j] = d;
            distances[j][i] = d;
        }
    }
    distances
}

/// Simplified t-SNE: Gaussian input affinities, Student-t output affinities,
/// plain gradient descent from a seeded random start
#[allow(clippy::cast_precision_loss)]
fn stochastic(matrix: &Array2<f64>, seed: u64) -> Result<Vec<(f64, f64)>> {
    let n = matrix.nrows();
    if n < 3 {
        return linear(matrix);
    }

    let distances = pairwise_distances(matrix);
    let mut rng = Xoshiro256Plus::seed_from_u64(seed);

    // Per-point bandwidth from the mean positive distance
    let sigmas: Vec<f64> = distances
        .iter()
        .map(|row| {
            let sum: f64 = row.iter().sum();
            (sum / (n - 1) as f64).max(1e-12)
        })
        .collect();

    // Symmetrized, globally normalized input affinities
    let mut p = vec![vec![0.0; n]; n];
    let mut p_total = 0.0;
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let a = (-distances[i][j].powi(2) / (2.0 * sigmas[i].powi(2))).exp();
            let b = (-distances[i][j].powi(2) / (2.0 * sigmas[j].powi(2))).exp();
            p[i][j] = (a + b) / 2.0;
            p_total += p[i][j];
        }
    }
    for row in &mut p {
        for v in row.iter_mut() {
            *v = (*v / p_total).max(1e-12);
        }
    }

    let mut ys: Vec<(f64, f64)> = (0..n)
        .map(|_| {
            (
                (rng.gen::<f64>() - 0.5) * 1e-2,
                (rng.gen::<f64>() - 0.5) * 1e-2,
            )
        })
        .collect();

    let iterations = 300;
    let learning_rate = 10.0;
    for _ in 0..iterations {
        // Student-t output affinities
        let mut q_unnorm = vec![vec![0.0; n]; n];
        let mut q_total = 0.0;
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let dx = ys[i].0 - ys[j].0;
                let dy = ys[i].1 - ys[j].1;
                let w = 1.0 / (1.0 + dx * dx + dy * dy);
                q_unnorm[i][j] = w;
                q_total += w;
            }
        }

        let mut grads = vec![(0.0, 0.0); n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let q = (q_unnorm[i][j] / q_total).max(1e-12);
                let coeff = 4.0 * (p[i][j] - q) * q_unnorm[i][j];
                grads[i].0 += coeff * (ys[i].0 - ys[j].0);
                grads[i].1 += coeff * (ys[i].1 - ys[j].1);
            }
        }
        for (y, g) in ys.iter_mut().zip(&grads) {
            y.0 -= learning_rate * g.0;
            y.1 -= learning_rate * g.1;
        }
    }

    Ok(ys)
}

/// Simplified UMAP-style embedding: kNN bandwidths, PCA initialization with
/// seeded jitter, decaying attract/repel gradient steps
#[allow(clippy::cast_precision_loss)]
fn manifold(matrix: &Array2<f64>, seed: u64) -> Result<Vec<(f64, f64)>> {
    let n = matrix.nrows();
    if n < 3 {
        return linear(matrix);
    }

    let distances = pairwise_distances(matrix);
    let mut rng = Xoshiro256Plus::seed_from_u64(seed);

    // Bandwidth per point: distance to its k-th nearest neighbor
    let k = 15.min(n - 1).max(1);
    let sigmas: Vec<f64> = (0..n)
        .map(|i| {
            let mut row: Vec<f64> = (0..n).filter(|&j| j != i).map(|j| distances[i][j]).collect();
            row.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            row[k - 1].max(1e-10)
        })
        .collect();

    let init = linear(matrix)?;
    let mut y1: Vec<f64> = init
        .iter()
        .map(|(x, _)| x + (rng.gen::<f64>() - 0.5) * 1e-3)
        .collect();
    let mut y2: Vec<f64> = init
        .iter()
        .map(|(_, y)| y + (rng.gen::<f64>() - 0.5) * 1e-3)
        .collect();

    let learning_rate = 0.1;
    let iterations = 200;
    let min_dist = 0.1;

    for iter in 0..iterations {
        let mut y1_new = y1.clone();
        let mut y2_new = y2.clone();

        for i in 0..n {
            let mut grad1 = 0.0;
            let mut grad2 = 0.0;

            for j in 0..n {
                if i == j {
                    continue;
                }
                let low_dist = ((y1[i] - y1[j]).powi(2) + (y2[i] - y2[j]).powi(2))
                    .sqrt()
                    .max(1e-10);
                let high_prob = (-distances[i][j] / sigmas[i]).exp().min(1.0);
                let low_prob = 1.0 / (1.0 + (low_dist - min_dist) / 0.1);

                let coeff = 2.0 * (high_prob - low_prob) / low_dist;
                grad1 += coeff * (y1[i] - y1[j]);
                grad2 += coeff * (y2[i] - y2[j]);
            }

            y1_new[i] += learning_rate * grad1;
            y2_new[i] += learning_rate * grad2;
        }

        let current_lr = learning_rate * (1.0 - f64::from(iter) / f64::from(iterations));
        for i in 0..n {
            y1[i] += current_lr * (y1_new[i] - y1[i]);
            y2[i] += current_lr * (y2_new[i] - y2[i]);
        }
    }

    Ok(y1.into_iter().zip(y2).collect())
}
