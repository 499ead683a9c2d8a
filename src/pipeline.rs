//! End-to-end clustering pipeline: load, build, cluster, annotate, save

use ndarray::Array2;

use crate::cluster::{metrics, Clusterer, SpectralClustering};
use crate::config::Config;
use crate::data;
use crate::error::Result;
use crate::graph::{algorithms, build_adjacency, Graph};
use crate::storage;

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub node_count: usize,
    pub edge_count: usize,
    pub cluster_count: usize,
}

pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run with the spectral clustering oracle from the configuration
    pub fn run(&self) -> Result<RunReport> {
        let clusterer = SpectralClustering::new(self.config.spectral.clone());
        self.run_with(&clusterer)
    }

    /// Run with any clustering oracle
    ///
    /// The output file is only written once every earlier stage succeeded,
    /// including staging the summary. It is committed last.
    pub fn run_with<C: Clusterer>(&self, clusterer: &C) -> Result<RunReport> {
        self.config.validate()?;

        // 1. Load data
        let mut graph = data::load_graph_file(&self.config.input)?;

        // 2-4. Build matrix, cluster, annotate
        let (assignment, matrix) = cluster_graph(&mut graph, clusterer)?;

        // 5. Save results
        let clusters = metrics::summarize(&assignment, &matrix);
        let output = storage::stage_graph(&graph, &self.config.output)?;
        if let Some(summary) = &self.config.summary {
            storage::stage_summary(&clusters, &graph, &matrix, summary)?.commit()?;
        }
        output.commit()?;

        for cluster in clusters.iter().take(10) {
            log::debug!(
                "Cluster {}: {} members, density {:.3}",
                cluster.id,
                cluster.size,
                cluster.density
            );
        }

        log::info!(
            "Clustering complete: {} nodes in {} clusters. Results saved to {}",
            graph.node_count(),
            clusters.len(),
            self.config.output.display()
        );

        Ok(RunReport {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            cluster_count: clusters.len(),
        })
    }
}

/// Cluster an in-memory graph and annotate its nodes
///
/// Returns the assignment and the adjacency matrix it was computed from.
pub fn cluster_graph<C: Clusterer>(
    graph: &mut Graph,
    clusterer: &C,
) -> Result<(Vec<usize>, Array2<f64>)> {
    let matrix = build_adjacency(graph)?;
    log::info!(
        "Adjacency matrix has {} undirected edges",
        algorithms::undirected_edge_count(&matrix)
    );

    let assignment = clusterer.fit_predict(&matrix)?;
    storage::annotate(graph, &assignment)?;

    Ok((assignment, matrix))
}
