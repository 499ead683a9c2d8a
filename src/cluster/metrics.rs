//! Cluster statistics and metrics

use std::collections::BTreeMap;

use ndarray::Array2;

use crate::cluster::Cluster;

/// Number of central nodes reported per cluster
const TOP_CENTRAL: usize = 5;

/// Group an assignment into clusters, largest first
pub fn summarize(assignment: &[usize], matrix: &Array2<f64>) -> Vec<Cluster> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (node, &label) in assignment.iter().enumerate() {
        groups.entry(label).or_default().push(node);
    }

    let mut clusters: Vec<Cluster> = groups
        .into_iter()
        .map(|(id, members)| Cluster {
            id,
            size: members.len(),
            density: calculate_density(matrix, &members),
            central_nodes: central_nodes(matrix, &members),
            members,
        })
        .collect();

    // Sort clusters by size (largest first), label breaks ties
    clusters.sort_by(|a, b| b.size.cmp(&a.size).then(a.id.cmp(&b.id)));
    clusters
}

/// Calculate density (internal edges / potential undirected edges)
pub fn calculate_density(matrix: &Array2<f64>, members: &[usize]) -> f64 {
    let n = members.len();
    if n <= 1 {
        return 1.0; // By convention, singleton clusters have density 1
    }

    let potential_edges = n * (n - 1) / 2;

    let mut actual_edges = 0;
    for (i, &a) in members.iter().enumerate() {
        for &b in &members[i + 1..] {
            if matrix[[a, b]] != 0.0 {
                actual_edges += 1;
            }
        }
    }

    actual_edges as f64 / potential_edges as f64
}

/// Members with the highest degree inside the cluster
pub fn central_nodes(matrix: &Array2<f64>, members: &[usize]) -> Vec<usize> {
    let mut degrees: Vec<(usize, usize)> = members
        .iter()
        .map(|&node| {
            let degree = members
                .iter()
                .filter(|&&other| other != node && matrix[[node, other]] != 0.0)
                .count();
            (node, degree)
        })
        .collect();

    // Highest degree first, lower index breaks ties
    degrees.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    degrees.into_iter().take(TOP_CENTRAL).map(|(node, _)| node).collect()
}
