//! Internal cluster-quality scores

use crate::error::{DeckError, Result};
use ndarray::{Array2, ArrayView1};
use serde::Serialize;

/// Sentinel emitted for every score when fewer than 2 distinct labels exist,
/// and for the separation index alone when every sample is its own cluster
/// (its within-cluster dispersion vanishes at `n == k`), keeping the result
/// shape fixed for downstream consumers
pub const UNDEFINED_SCORE: f64 = -1.0;

/// Fixed-shape clustering quality scores
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Scores {
    /// Mean silhouette coefficient, in [-1, 1], higher is better
    pub silhouette: f64,
    /// Calinski-Harabasz-style index, in [0, inf), higher is better
    pub separation_index: f64,
    /// Davies-Bouldin-style index, in [0, inf), lower is better
    pub compactness_index: f64,
}

impl Scores {
    #[must_use]
    pub const fn undefined() -> Self {
        Self {
            silhouette: UNDEFINED_SCORE,
            separation_index: UNDEFINED_SCORE,
            compactness_index: UNDEFINED_SCORE,
        }
    }
}

/// Score a labeling of the matrix rows.
///
/// With fewer than 2 distinct labels all three scores are the `-1` sentinel
/// rather than an error, so the payload shape never changes.
///
/// # Errors
/// Returns `Computation` if `labels` and the matrix disagree on sample count
pub fn score(matrix: &Array2<f64>, labels: &[usize]) -> Result<Scores> {
    let n = matrix.nrows();
    if labels.len() != n {
        return Err(DeckError::Computation(format!(
            "{} labels for {n} samples",
            labels.len()
        )));
    }

    let mut distinct: Vec<usize> = labels.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    let k = distinct.len();
    if k < 2 {
        return Ok(Scores::undefined());
    }

    // Compact labels to 0..k
    let compact: Vec<usize> = labels
        .iter()
        .map(|l| distinct.binary_search(l).unwrap_or(0))
        .collect();

    let members: Vec<Vec<usize>> = (0..k)
        .map(|c| {
            compact
                .iter()
                .enumerate()
                .filter(|(_, l)| **l == c)
                .map(|(i, _)| i)
                .collect()
        })
        .collect();

    let centroids: Vec<Vec<f64>> = members.iter().map(|m| centroid(matrix, m)).collect();

    Ok(Scores {
        silhouette: silhouette(matrix, &compact, &members),
        separation_index: separation(matrix, &members, &centroids),
        compactness_index: compactness(matrix, &members, &centroids),
    })
}

fn distance(a: ArrayView1<'_, f64>, b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn pair_distance(matrix: &Array2<f64>, i: usize, j: usize) -> f64 {
    matrix
        .row(i)
        .iter()
        .zip(matrix.row(j).iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[allow(clippy::cast_precision_loss)]
fn centroid(matrix: &Array2<f64>, members: &[usize]) -> Vec<f64> {
    let d = matrix.ncols();
    let mut c = vec![0.0; d];
    for &i in members {
        for (j, v) in matrix.row(i).iter().enumerate() {
            c[j] += v;
        }
    }
    for v in &mut c {
        *v /= members.len().max(1) as f64;
    }
    c
}

/// Mean per-sample silhouette: cohesion vs. separation. Singleton-cluster
/// samples contribute 0, the sklearn convention.
#[allow(clippy::cast_precision_loss)]
fn silhouette(matrix: &Array2<f64>, labels: &[usize], members: &[Vec<usize>]) -> f64 {
    let n = matrix.nrows();
    let mut total = 0.0;

    for i in 0..n {
        let own = labels[i];
        if members[own].len() < 2 {
            continue;
        }

        let a = members[own]
            .iter()
            .filter(|&&j| j != i)
            .map(|&j| pair_distance(matrix, i, j))
            .sum::<f64>()
            / (members[own].len() - 1) as f64;

        let b = members
            .iter()
            .enumerate()
            .filter(|(c, m)| *c != own && !m.is_empty())
            .map(|(_, m)| {
                m.iter().map(|&j| pair_distance(matrix, i, j)).sum::<f64>() / m.len() as f64
            })
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    total / n as f64
}

/// Between-cluster over within-cluster dispersion (Calinski-Harabasz form);
/// `n == k` yields the [`UNDEFINED_SCORE`] sentinel
#[allow(clippy::cast_precision_loss)]
fn separation(matrix: &Array2<f64>, members: &[Vec<usize>], centroids: &[Vec<f64>]) -> f64 {
    let n = matrix.nrows();
    let k = members.len();
    let overall: Vec<f64> = centroid(matrix, &(0..n).collect::<Vec<_>>());

    let between: f64 = members
        .iter()
        .zip(centroids)
        .map(|(m, c)| {
            let d2: f64 = c.iter().zip(&overall).map(|(a, b)| (a - b).powi(2)).sum();
            m.len() as f64 * d2
        })
        .sum();

    let within: f64 = members
        .iter()
        .zip(centroids)
        .map(|(m, c)| {
            m.iter()
                .map(|&i| distance(matrix.row(i), c).powi(2))
                .sum::<f64>()
        })
        .sum();

    if n <= k {
        // Every sample its own cluster; dispersion ratio is degenerate
        return UNDEFINED_SCORE;
    }
    let numerator = between / (k - 1) as f64;
    let denominator = (within / (n - k) as f64).max(f64::MIN_POSITIVE);
    numerator / denominator
}

/// Average worst-case cluster-pair overlap (Davies-Bouldin form)
#[allow(clippy::cast_precision_loss)]
fn compactness(matrix: &Array2<f64>, members: &[Vec<usize>], centroids: &[Vec<f64>]) -> f64 {
    let k = members.len();
    let spreads: Vec<f64> = members
        .iter()
        .zip(centroids)
        .map(|(m, c)| {
            m.iter().map(|&i| distance(matrix.row(i), c)).sum::<f64>() / m.len().max(1) as f64
        })
        .collect();

    let mut total = 0.0;
    for i in 0..k {
        let mut worst = 0.0f64;
        for j in 0..k {
            if i == j {
                continue;
            }
            let d: f64 = centroids[i]
                .iter()
                .zip(&centroids[j])
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt()
                .max(f64::MIN_POSITIVE);
            worst = worst.max((spreads[i] + spreads[j]) / d);
        }
        total += worst;
    }
    total / k as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Vec<usize>) {
        let matrix = array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [10.0, 10.0],
            [10.1, 10.0],
            [10.0, 10.1],
        ];
        (matrix, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn test_well_separated_blobs_score_high() {
        let (matrix, labels) = blobs();
        let scores = score(&matrix, &labels).expect("score");

        assert!(scores.silhouette > 0.9 && scores.silhouette <= 1.0);
        assert!(scores.separation_index > 100.0);
        assert!(scores.compactness_index < 0.1);
    }

    #[test]
    fn test_single_label_yields_sentinels() {
        let (matrix, _) = blobs();
        let scores = score(&matrix, &[0; 6]).expect("score");
        assert_eq!(scores.silhouette, UNDEFINED_SCORE);
        assert_eq!(scores.separation_index, UNDEFINED_SCORE);
        assert_eq!(scores.compactness_index, UNDEFINED_SCORE);
    }

    #[test]
    fn test_shuffled_labels_score_worse() {
        let (matrix, good) = blobs();
        let bad = vec![0, 1, 0, 1, 0, 1];
        let good_scores = score(&matrix, &good).expect("good");
        let bad_scores = score(&matrix, &bad).expect("bad");

        assert!(good_scores.silhouette > bad_scores.silhouette);
        assert!(good_scores.separation_index > bad_scores.separation_index);
        assert!(good_scores.compactness_index < bad_scores.compactness_index);
    }

    #[test]
    fn test_all_singleton_clusters() {
        let (matrix, _) = blobs();
        let scores = score(&matrix, &[0, 1, 2, 3, 4, 5]).expect("score");
        // Dispersion ratio is undefined when every sample is its own cluster;
        // silhouette and compactness stay defined (singletons contribute 0)
        assert_eq!(scores.separation_index, UNDEFINED_SCORE);
        assert_eq!(scores.silhouette, 0.0);
        assert!(scores.compactness_index >= 0.0);
    }

    #[test]
    fn test_label_length_mismatch_fails() {
        let (matrix, _) = blobs();
        assert!(score(&matrix, &[0, 1]).is_err());
    }

    #[test]
    fn test_non_contiguous_labels_accepted() {
        let (matrix, _) = blobs();
        let labels = vec![3, 3, 3, 7, 7, 7];
        let scores = score(&matrix, &labels).expect("score");
        assert!(scores.silhouette > 0.9);
    }
}
