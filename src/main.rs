#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::uninlined_format_args)]

mod analysis;
mod dataset;
mod error;
mod normalize;
mod ops;
mod orientation;
mod store;
mod validate;

use clap::{Parser, Subcommand};
use error::Result;
use ops::RunParams;
use orientation::Orientation;
use std::path::{Path, PathBuf};
use store::DatasetStore;
use validate::FileKind;

/// inferdeck - multi-omics subtyping backend: normalize tabular uploads,
/// cluster samples, and test cluster/survival association
#[derive(Parser, Debug)]
#[command(name = "inferdeck")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Normalize and validate raw tabular files into a stored canonical dataset
    Upload {
        /// Raw input file(s); several files inner-join on sample identifier
        #[arg(short, long, required = true)]
        file: Vec<PathBuf>,

        /// Layout of the raw table(s)
        #[arg(short, long, value_enum)]
        orientation: Orientation,

        /// What the upload contains
        #[arg(short = 't', long, value_enum)]
        file_type: FileKind,

        /// Dataset store directory
        #[arg(short, long, default_value = "./datasets")]
        store: PathBuf,
    },

    /// Cluster a stored dataset, score the clustering, and project to 2-D
    Run {
        /// Dataset identifier returned by upload
        #[arg(short, long)]
        dataset: String,

        /// Dataset store directory
        #[arg(short, long, default_value = "./datasets")]
        store: PathBuf,

        /// Subtyping algorithm name (echoed; the K-means pipeline always runs)
        #[arg(short, long, default_value = "kmeans")]
        algorithm: String,

        /// Number of clusters
        #[arg(short = 'k', long, default_value = "3")]
        clusters: usize,

        /// Seed for the request-local random stream
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Maximum K-means iterations
        #[arg(long, default_value = "300")]
        max_iter: usize,

        /// Projection method: linear, neighbor-stochastic, or neighbor-manifold
        /// (unknown names fall back to neighbor-manifold)
        #[arg(short, long, default_value = "neighbor-manifold")]
        projection: String,
    },

    /// Test whether cluster labels are associated with survival outcome
    Survival {
        /// Clinical dataset identifier returned by upload
        #[arg(short, long)]
        dataset: String,

        /// Dataset store directory
        #[arg(short, long, default_value = "./datasets")]
        store: PathBuf,

        /// Comma-separated sample identifiers, parallel to --labels
        #[arg(long, value_delimiter = ',', required = true)]
        samples: Vec<String>,

        /// Comma-separated cluster labels, parallel to --samples
        #[arg(long, value_delimiter = ',', required = true)]
        labels: Vec<usize>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Upload {
            file,
            orientation,
            file_type,
            store,
        } => run_upload(&file, orientation, file_type, &store),

        Commands::Run {
            dataset,
            store,
            algorithm,
            clusters,
            seed,
            max_iter,
            projection,
        } => run_analysis(
            &dataset,
            &store,
            &RunParams {
                algorithm,
                k: clusters,
                seed,
                max_iter,
                projection,
            },
        ),

        Commands::Survival {
            dataset,
            store,
            samples,
            labels,
        } => run_survival(&dataset, &store, &samples, &labels),
    }
}

fn run_upload(
    files: &[PathBuf],
    orientation: Orientation,
    file_type: FileKind,
    store_dir: &Path,
) -> Result<()> {
    let mut raw_files = Vec::with_capacity(files.len());
    for path in files {
        eprintln!("Reading: {}", path.display());
        raw_files.push(std::fs::read(path)?);
    }

    let store = DatasetStore::open(store_dir)?;
    let response = ops::upload(&store, &raw_files, orientation, file_type)?;
    eprintln!(
        "Stored {} dataset: {} samples x {} features",
        response.file_type.as_str(),
        response.n_samples,
        response.n_features
    );

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn run_analysis(dataset_id: &str, store_dir: &Path, params: &RunParams) -> Result<()> {
    let store = DatasetStore::open(store_dir)?;

    eprintln!(
        "Running {} with k={}, seed={} on {}",
        params.algorithm, params.k, params.seed, dataset_id
    );
    let response = ops::run(&store, dataset_id, params)?;
    eprintln!(
        "Clustered {} samples, inertia {:.4}",
        response.labels.len(),
        response.inertia
    );

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn run_survival(
    dataset_id: &str,
    store_dir: &Path,
    samples: &[String],
    labels: &[usize],
) -> Result<()> {
    let store = DatasetStore::open(store_dir)?;

    let response = ops::survival(&store, dataset_id, samples, labels)?;
    eprintln!(
        "Joined {} samples across {} clusters, log-rank p = {:.4}",
        response.n_joined,
        response.curves.len(),
        response.p_value
    );

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
