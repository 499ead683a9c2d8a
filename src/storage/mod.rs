//! Results persistence module

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde_json::json;
use tempfile::NamedTempFile;

use crate::cluster::Cluster;
use crate::error::{PipelineError, Result};
use crate::graph::{algorithms, Graph};

/// Attach a cluster label to every node by position
///
/// Nothing is modified when the assignment length differs from the node count.
pub fn annotate(graph: &mut Graph, assignment: &[usize]) -> Result<()> {
    if assignment.len() != graph.node_count() {
        return Err(PipelineError::LengthMismatch {
            nodes: graph.node_count(),
            labels: assignment.len(),
        });
    }

    for (node, &label) in graph.nodes.iter_mut().zip(assignment) {
        node.set_cluster(label);
    }

    Ok(())
}

/// Serialize a graph as compact JSON
pub fn write_graph<W: Write>(graph: &Graph, writer: W) -> Result<()> {
    serde_json::to_writer(writer, graph).map_err(PipelineError::Serialize)
}

/// Fully written file waiting in the destination directory
///
/// `commit` renames it over the destination. Dropping it uncommitted removes
/// the temporary file and leaves the destination untouched.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    path: PathBuf,
}

impl StagedFile {
    /// Destination the file is renamed to on commit
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replace the destination with the staged contents
    pub fn commit(self) -> Result<()> {
        let path = self.path;
        self.file
            .persist(&path)
            .map_err(|e| PipelineError::Write {
                path: path.clone(),
                source: e.error,
            })?;
        log::debug!("Committed {}", path.display());
        Ok(())
    }
}

/// Write a graph to `path`, replacing it atomically
pub fn save_graph(graph: &Graph, path: impl AsRef<Path>) -> Result<()> {
    stage_graph(graph, path)?.commit()
}

/// Write a graph next to `path` without replacing it yet
pub fn stage_graph(graph: &Graph, path: impl AsRef<Path>) -> Result<StagedFile> {
    let path = path.as_ref();
    log::info!("Writing annotated graph to {}", path.display());

    stage(path, |writer| write_graph(graph, writer))
}

/// Save the cluster summary as pretty JSON
pub fn save_summary(
    clusters: &[Cluster],
    graph: &Graph,
    matrix: &Array2<f64>,
    path: impl AsRef<Path>,
) -> Result<()> {
    stage_summary(clusters, graph, matrix, path)?.commit()
}

/// Write the cluster summary next to `path` without replacing it yet
pub fn stage_summary(
    clusters: &[Cluster],
    graph: &Graph,
    matrix: &Array2<f64>,
    path: impl AsRef<Path>,
) -> Result<StagedFile> {
    let path = path.as_ref();
    log::info!("Saving summary of {} clusters to {}", clusters.len(), path.display());

    let node_count = graph.node_count();
    let edge_count = algorithms::undirected_edge_count(matrix);

    let summary = json!({
        "graph_stats": {
            "node_count": node_count,
            "edge_count": edge_count,
            "input_edge_records": graph.edge_count(),
            "component_count": algorithms::component_count(matrix),
            "avg_degree": if node_count == 0 { 0.0 } else {
                algorithms::degrees(matrix).sum() / node_count as f64
            },
        },
        "cluster_stats": {
            "cluster_count": clusters.len(),
            "largest_cluster_size": clusters.first().map_or(0, |c| c.size),
            "smallest_cluster_size": clusters.last().map_or(0, |c| c.size),
            "avg_density": clusters.iter().map(|c| c.density).sum::<f64>() /
                           if clusters.is_empty() { 1.0 } else { clusters.len() as f64 },
        },
        "clusters": clusters,
    });

    stage(path, |writer| {
        serde_json::to_writer_pretty(writer, &summary).map_err(PipelineError::Serialize)
    })
}

/// Write through a temporary file in the destination directory. A failed
/// write leaves no partial file behind.
fn stage<F>(path: &Path, write: F) -> Result<StagedFile>
where
    F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<()>,
{
    let write_error = |source| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_error)?;

    let mut file = NamedTempFile::new_in(dir).map_err(write_error)?;
    {
        let mut writer = BufWriter::new(&mut file);
        write(&mut writer)?;
        writer.flush().map_err(write_error)?;
    }

    Ok(StagedFile {
        file,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_graph;
    use crate::graph::build_adjacency;
    use serde_json::Value;

    fn sample_graph() -> Graph {
        parse_graph(br#"{"nodes":[{"id":"a"},{"id":"b"},{"id":"c"}],"edges":[{"source":0,"target":1}]}"#)
            .unwrap()
    }

    #[test]
    fn test_annotate_and_write() {
        let mut graph = sample_graph();
        annotate(&mut graph, &[0, 0, 1]).unwrap();

        let mut out = Vec::new();
        write_graph(&graph, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"{"nodes":[{"id":"a","cluster":0},{"id":"b","cluster":0},{"id":"c","cluster":1}],"edges":[{"source":0,"target":1}]}"#
        );
    }

    #[test]
    fn test_length_mismatch_leaves_graph_untouched() {
        let mut graph = sample_graph();
        let before = graph.clone();

        let err = annotate(&mut graph, &[0, 1]).unwrap_err();
        assert!(matches!(err, PipelineError::LengthMismatch { nodes: 3, labels: 2 }));
        assert_eq!(graph, before);
    }

    #[test]
    fn test_save_graph_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");

        let mut graph = sample_graph();
        annotate(&mut graph, &[2, 1, 0]).unwrap();
        save_graph(&graph, &path).unwrap();

        let written: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["nodes"][0]["cluster"], 2);
        assert_eq!(written["nodes"][2]["id"], "c");

        // Only the destination remains in the directory
        let entries = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_staged_file_appears_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        fs::write(&path, b"previous").unwrap();

        let staged = stage_graph(&sample_graph(), &path).unwrap();
        assert_eq!(staged.path(), path.as_path());
        assert_eq!(fs::read(&path).unwrap(), b"previous");

        staged.commit().unwrap();
        let written: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["nodes"][1]["id"], "b");
    }

    #[test]
    fn test_dropped_stage_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        drop(stage_graph(&sample_graph(), &path).unwrap());

        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stage_under_regular_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();

        let err = stage_graph(&sample_graph(), blocker.join("out.json")).unwrap_err();
        assert!(matches!(err, PipelineError::Write { .. }));
    }

    #[test]
    fn test_save_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");

        let graph = sample_graph();
        let matrix = build_adjacency(&graph).unwrap();
        let clusters = crate::cluster::metrics::summarize(&[0, 0, 1], &matrix);
        save_summary(&clusters, &graph, &matrix, &path).unwrap();

        let summary: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(summary["graph_stats"]["node_count"], 3);
        assert_eq!(summary["graph_stats"]["edge_count"], 1);
        assert_eq!(summary["graph_stats"]["component_count"], 2);
        assert_eq!(summary["cluster_stats"]["cluster_count"], 2);
        assert_eq!(summary["clusters"][0]["members"], serde_json::json!([0, 1]));
    }
}
