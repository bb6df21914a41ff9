//! The three logical operations: upload, run, survival-analysis
//!
//! Transport-agnostic orchestration over the pipeline modules; every function
//! returns a serializable response the CLI (or any other surface) can emit.

use crate::analysis::clustering;
use crate::analysis::metrics::{self, Scores};
use crate::analysis::projection::{self, ProjectionMethod};
use crate::analysis::survival::{self, SurvivalCurve};
use crate::error::{DeckError, Result};
use crate::normalize;
use crate::orientation::Orientation;
use crate::store::DatasetStore;
use crate::validate::{self, FileKind};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub dataset_id: String,
    pub file_type: FileKind,
    pub n_samples: usize,
    pub n_features: usize,
    /// `[n_samples, n_features]` of each input after orientation, before the
    /// inner join narrowed the sample set
    pub original_shapes: Vec<[usize; 2]>,
    pub n_files: usize,
}

/// Normalize, validate, and persist an upload batch.
///
/// Validation runs before anything touches the store, so a rejected batch
/// never leaves an artifact behind.
///
/// # Errors
/// Returns `Parse`/`EmptyResult` from normalization or `Validation` with the
/// specific failure reason
pub fn upload(
    store: &DatasetStore,
    raw_files: &[Vec<u8>],
    orientation: Orientation,
    kind: FileKind,
) -> Result<UploadResponse> {
    let normalized = normalize::normalize(raw_files, orientation)?;
    validate::validate(&normalized.dataset, kind)?;

    let dataset_id = store.put(&normalized.dataset, kind)?;
    Ok(UploadResponse {
        dataset_id,
        file_type: kind,
        n_samples: normalized.dataset.n_samples(),
        n_features: normalized.dataset.n_features(),
        original_shapes: normalized.original_shapes,
        n_files: raw_files.len(),
    })
}

#[derive(Debug, Clone)]
pub struct RunParams {
    /// Requested subtyping algorithm, echoed into the payload. The deep
    /// learning and matrix factorization subtypers referenced by the UI are
    /// placeholders; every run executes the K-means pipeline.
    pub algorithm: String,
    pub k: usize,
    pub seed: u64,
    pub max_iter: usize,
    /// Projection method name; unrecognized names fall back to the manifold
    /// embedding (documented default)
    pub projection: String,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub dataset_id: String,
    pub algorithm: String,
    pub k: usize,
    pub projection: &'static str,
    pub sample_ids: Vec<String>,
    pub labels: Vec<usize>,
    pub inertia: f64,
    pub metrics: Scores,
    /// One (x, y) pair per sample, ordered like `sample_ids`
    pub coordinates: Vec<[f64; 2]>,
    pub cluster_sizes: Vec<usize>,
}

/// Cluster, score, and project a stored dataset.
///
/// The stored artifact is left intact on computation failure; a retry with
/// different parameters needs no re-upload.
///
/// # Errors
/// Returns `NotFound` for unknown ids and `Computation` for parameter or
/// numeric failures
pub fn run(store: &DatasetStore, dataset_id: &str, params: &RunParams) -> Result<RunResponse> {
    let dataset = store.get(dataset_id)?;
    let matrix = dataset.numeric()?;

    let outcome = clustering::cluster(&matrix, params.k, params.seed, params.max_iter)?;
    let scores = metrics::score(&matrix, &outcome.labels)?;

    let method = ProjectionMethod::from_name(&params.projection).unwrap_or_else(|| {
        eprintln!(
            "Unknown projection method '{}', falling back to neighbor-manifold",
            params.projection
        );
        ProjectionMethod::NeighborManifold
    });
    let coordinates = projection::project(&matrix, method, params.seed)?
        .into_iter()
        .map(|(x, y)| [x, y])
        .collect();

    Ok(RunResponse {
        dataset_id: dataset_id.to_string(),
        algorithm: params.algorithm.clone(),
        k: params.k,
        projection: method.as_str(),
        sample_ids: dataset.sample_ids,
        labels: outcome.labels,
        inertia: outcome.inertia,
        metrics: scores,
        coordinates,
        cluster_sizes: outcome.sizes,
    })
}

#[derive(Debug, Serialize)]
pub struct SurvivalResponse {
    pub dataset_id: String,
    pub p_value: f64,
    pub n_joined: usize,
    pub curves: Vec<SurvivalCurve>,
}

/// Join client-supplied cluster labels to a stored clinical dataset and
/// compute the survival association.
///
/// # Errors
/// Returns `NotFound` for unknown ids, `Computation` for non-clinical ids or
/// mismatched parallel arrays, `Join` when no sample overlaps
pub fn survival(
    store: &DatasetStore,
    dataset_id: &str,
    sample_ids: &[String],
    labels: &[usize],
) -> Result<SurvivalResponse> {
    if DatasetStore::kind_of(dataset_id)? != FileKind::Clinical {
        return Err(DeckError::Computation(format!(
            "dataset '{dataset_id}' was not uploaded as clinical data"
        )));
    }

    let clinical = store.get(dataset_id)?;
    let outcome = survival::analyze(&clinical, sample_ids, labels)?;

    Ok(SurvivalResponse {
        dataset_id: dataset_id.to_string(),
        p_value: outcome.p_value,
        n_joined: outcome.n_joined,
        curves: outcome.curves,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> DatasetStore {
        DatasetStore::open(dir.path()).expect("open store")
    }

    fn run_params(k: usize, seed: u64, projection: &str) -> RunParams {
        RunParams {
            algorithm: "kmeans".into(),
            k,
            seed,
            max_iter: 300,
            projection: projection.into(),
        }
    }

    #[test]
    fn test_upload_run_round_trip() {
        let dir = TempDir::new().expect("temp dir");
        let store = open_store(&dir);

        let raw = b"id,g1,g2\n\
            a,1.0,1.0\nb,1.1,0.9\nc,0.9,1.1\n\
            d,9.0,9.0\ne,9.1,8.9\nf,8.9,9.1\n"
            .to_vec();
        let uploaded = upload(
            &store,
            &[raw],
            Orientation::SampleRowsBoth,
            FileKind::Omics,
        )
        .expect("upload");
        assert_eq!(uploaded.n_samples, 6);
        assert_eq!(uploaded.n_features, 2);

        let result = run(&store, &uploaded.dataset_id, &run_params(2, 42, "linear"))
            .expect("run");
        assert_eq!(result.labels.len(), 6);
        assert_eq!(result.coordinates.len(), 6);
        assert_eq!(result.cluster_sizes.iter().sum::<usize>(), 6);
        assert!(result.metrics.silhouette > 0.5);

        // Same parameters, same outcome
        let again = run(&store, &uploaded.dataset_id, &run_params(2, 42, "linear"))
            .expect("run again");
        assert_eq!(result.labels, again.labels);
        assert!((result.inertia - again.inertia).abs() < 1e-12);
    }

    #[test]
    fn test_multi_file_upload_inner_joins() {
        let dir = TempDir::new().expect("temp dir");
        let store = open_store(&dir);

        let a = b"id,g1\nA,1\nB,2\nC,3\n".to_vec();
        let b = b"id,g2\nA,4\nB,5\nD,6\n".to_vec();
        let uploaded = upload(
            &store,
            &[a, b],
            Orientation::SampleRowsBoth,
            FileKind::Omics,
        )
        .expect("upload");

        assert_eq!(uploaded.n_samples, 2);
        assert_eq!(uploaded.n_features, 2);
        assert_eq!(uploaded.n_files, 2);
        // Pre-merge shapes survive the join in file order
        assert_eq!(uploaded.original_shapes, vec![[3, 1], [3, 1]]);

        let stored = store.get(&uploaded.dataset_id).expect("get");
        assert_eq!(stored.sample_ids, vec!["A", "B"]);
    }

    #[test]
    fn test_rejected_upload_leaves_no_artifact() {
        let dir = TempDir::new().expect("temp dir");
        let store = open_store(&dir);

        let raw = b"id,g1\nA,1\nA,2\n".to_vec();
        let err = upload(
            &store,
            &[raw],
            Orientation::SampleRowsBoth,
            FileKind::Omics,
        )
        .unwrap_err();
        assert!(matches!(err, DeckError::Validation(_)));

        let leftovers = std::fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_run_unknown_dataset_is_not_found() {
        let dir = TempDir::new().expect("temp dir");
        let store = open_store(&dir);
        let err = run(&store, "omics-deadbeef00000000", &run_params(2, 0, "linear"))
            .unwrap_err();
        assert!(matches!(err, DeckError::NotFound(_)));
    }

    #[test]
    fn test_run_failure_keeps_dataset() {
        let dir = TempDir::new().expect("temp dir");
        let store = open_store(&dir);

        let raw = b"id,g1\nA,1\nB,2\n".to_vec();
        let uploaded = upload(
            &store,
            &[raw],
            Orientation::SampleRowsBoth,
            FileKind::Omics,
        )
        .expect("upload");

        // k exceeds sample count
        let err = run(&store, &uploaded.dataset_id, &run_params(5, 0, "linear")).unwrap_err();
        assert!(matches!(err, DeckError::Computation(_)));

        // The artifact survives for a retry
        assert!(store.get(&uploaded.dataset_id).is_ok());
        assert!(run(&store, &uploaded.dataset_id, &run_params(2, 0, "linear")).is_ok());
    }

    #[test]
    fn test_unknown_projection_falls_back() {
        let dir = TempDir::new().expect("temp dir");
        let store = open_store(&dir);

        let raw = b"id,g1,g2\nA,1,2\nB,3,4\nC,5,6\n".to_vec();
        let uploaded = upload(
            &store,
            &[raw],
            Orientation::SampleRowsBoth,
            FileKind::Omics,
        )
        .expect("upload");

        let result = run(&store, &uploaded.dataset_id, &run_params(1, 0, "mystery"))
            .expect("run");
        assert_eq!(result.projection, "neighbor-manifold");
        // k = 1: metrics are the fixed-shape sentinels
        assert_eq!(result.metrics.silhouette, -1.0);
    }

    #[test]
    fn test_survival_end_to_end() {
        let dir = TempDir::new().expect("temp dir");
        let store = open_store(&dir);

        let raw = b"id,event,time\nA,1,10\nB,0,20\nC,1,5\nD,0,30\n".to_vec();
        let uploaded = upload(
            &store,
            &[raw],
            Orientation::SampleRowsBoth,
            FileKind::Clinical,
        )
        .expect("upload");

        let ids: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        let result = survival(&store, &uploaded.dataset_id, &ids, &[0, 0, 1, 1])
            .expect("survival");

        assert_eq!(result.n_joined, 4);
        assert_eq!(result.curves.len(), 2);
        assert!(result.p_value > 0.0 && result.p_value <= 1.0);
    }

    #[test]
    fn test_survival_rejects_omics_dataset() {
        let dir = TempDir::new().expect("temp dir");
        let store = open_store(&dir);

        let raw = b"id,g1\nA,1\nB,2\n".to_vec();
        let uploaded = upload(
            &store,
            &[raw],
            Orientation::SampleRowsBoth,
            FileKind::Omics,
        )
        .expect("upload");

        let ids = vec!["A".to_string()];
        let err = survival(&store, &uploaded.dataset_id, &ids, &[0]).unwrap_err();
        assert!(matches!(err, DeckError::Computation(_)));
    }
}
