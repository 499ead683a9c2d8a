use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use graph_spectral_clusters::config::{DEFAULT_INPUT, DEFAULT_OUTPUT};
use graph_spectral_clusters::{Config, EigenSolver, Pipeline, SpectralConfig};

#[derive(Parser, Debug)]
#[clap(
    name = "graph-spectral-clusters",
    about = "Spectral clustering of JSON node-link graphs"
)]
struct Cli {
    /// Path to input graph JSON
    #[clap(long, default_value = DEFAULT_INPUT)]
    input: PathBuf,

    /// Path to write the annotated graph JSON
    #[clap(long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Optional path for a cluster summary JSON
    #[clap(long)]
    summary: Option<PathBuf>,

    /// Number of clusters
    #[clap(long, default_value = "8")]
    clusters: usize,

    /// Number of k-means restarts
    #[clap(long, default_value = "10")]
    n_init: usize,

    /// Maximum k-means iterations per restart
    #[clap(long, default_value = "300")]
    max_iter: usize,

    /// Eigen solver for the spectral embedding
    #[clap(long, value_enum, default_value = "auto")]
    eigen_solver: EigenSolver,

    /// Random seed for reproducible runs
    #[clap(long)]
    seed: Option<u64>,

    /// Number of worker threads (0 = use all available cores)
    #[clap(long, default_value = "0")]
    threads: usize,

    /// Verbose logging
    #[clap(long, short)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        Config {
            input: self.input,
            output: self.output,
            summary: self.summary,
            spectral: SpectralConfig {
                n_clusters: self.clusters,
                n_init: self.n_init,
                max_iter: self.max_iter,
                eigen_solver: self.eigen_solver,
                seed: self.seed,
                ..SpectralConfig::default()
            },
        }
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Cli::parse();

    // Configure logging
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    // Set number of threads
    let num_threads = if args.threads > 0 {
        args.threads
    } else {
        num_cpus::get()
    };

    log::info!("Using {} worker threads", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    let config = args.into_config();
    log::info!("Input: {}", config.input.display());
    log::info!("Output: {}", config.output.display());

    let input = config.input.clone();
    let report = Pipeline::new(config)
        .run()
        .with_context(|| format!("clustering {} failed", input.display()))?;

    log::info!(
        "Processed {} nodes and {} edges into {} clusters",
        report.node_count,
        report.edge_count,
        report.cluster_count
    );

    Ok(())
}
