//! Structural metrics of the swarm graph.

use serde::{Deserialize, Serialize};

use swarm_core::Node;
use swarm_state::Arena;

/// Snapshot of the graph shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyMetrics {
    /// Deepest hierarchy level in use.
    pub depth: u32,
    /// Mean children per node.
    pub fanout: f64,
    /// Undirected edges over the edges of a complete graph; 1.0 below two nodes.
    pub connectivity: f64,
    /// Mean alternate paths per node, `max(degree - 1, 0)`.
    pub redundancy: f64,
    pub nodes: usize,
    pub edges: usize,
}

impl TopologyMetrics {
    pub fn compute(nodes: &Arena<Node>) -> Self {
        let n = nodes.len();
        if n == 0 {
            return Self {
                connectivity: 1.0,
                ..Self::default()
            };
        }

        let degree_sum: usize = nodes.iter().map(|node| node.connections.len()).sum();
        let edges = degree_sum / 2;
        let connectivity = if n < 2 {
            1.0
        } else {
            edges as f64 / (n * (n - 1) / 2) as f64
        };
        let depth = nodes.iter().map(|node| node.hierarchy.level).max().unwrap_or(0);
        let fanout =
            nodes.iter().map(|node| node.hierarchy.children.len()).sum::<usize>() as f64 / n as f64;
        let redundancy = nodes
            .iter()
            .map(|node| node.connections.len().saturating_sub(1))
            .sum::<usize>() as f64
            / n as f64;

        Self {
            depth,
            fanout,
            connectivity,
            redundancy,
            nodes: n,
            edges,
        }
    }

    /// Complete-graph edge count for `n` nodes.
    pub fn max_edges(n: usize) -> usize {
        n * n.saturating_sub(1) / 2
    }
}
