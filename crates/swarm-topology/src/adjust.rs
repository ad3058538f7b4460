//! Topology adjustment pass, run by the optimizer when efficiency drops.
//!
//! Mesh and hybrid graphs gain edges between their least-connected
//! non-adjacent pairs; hierarchies shed children from overloaded parents
//! onto lighter parents on the same level.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use swarm_core::{Node, NodeId, TopologyKind};
use swarm_state::Arena;

use crate::TopologyManager;
use crate::manager::{connect, is_linkable};
use crate::metrics::TopologyMetrics;

/// Changes made by one adjustment pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub added_edges: Vec<(NodeId, NodeId)>,
    /// `(child, old parent, new parent)`.
    pub moved: Vec<(NodeId, NodeId, NodeId)>,
}

impl Adjustment {
    pub fn is_empty(&self) -> bool {
        self.added_edges.is_empty() && self.moved.is_empty()
    }
}

impl TopologyManager {
    pub fn adjust(&self, nodes: &mut Arena<Node>, target_connectivity: f64) -> Adjustment {
        let mut adjustment = Adjustment::default();
        if matches!(self.kind(), TopologyKind::Hierarchical | TopologyKind::Hybrid) {
            adjustment.moved = self.spread_children(nodes);
        }
        if matches!(self.kind(), TopologyKind::Mesh | TopologyKind::Hybrid) {
            adjustment.added_edges = self.densify(nodes, target_connectivity);
        }
        if !adjustment.is_empty() {
            info!(
                added_edges = adjustment.added_edges.len(),
                moved = adjustment.moved.len(),
                "topology adjusted"
            );
        }
        adjustment
    }

    /// Add edges until `target` connectivity or one edge per node.
    fn densify(&self, nodes: &mut Arena<Node>, target: f64) -> Vec<(NodeId, NodeId)> {
        let max_edges = TopologyMetrics::max_edges(nodes.len());
        if max_edges == 0 {
            return Vec::new();
        }
        let budget = nodes.len();
        let mut edges = TopologyMetrics::compute(nodes).edges;
        let mut added = Vec::new();

        while added.len() < budget && (edges as f64 / max_edges as f64) < target {
            let Some((a, b)) = least_connected_pair(nodes) else {
                break;
            };
            connect(nodes, &a, &b);
            debug!(%a, %b, "edge added");
            edges += 1;
            added.push((a, b));
        }
        added
    }

    /// Move children off parents whose fanout exceeds the mean by more than one.
    fn spread_children(&self, nodes: &mut Arena<Node>) -> Vec<(NodeId, NodeId, NodeId)> {
        let max_level = self.max_depth().saturating_sub(1);
        let parents: Vec<&Node> = nodes
            .iter()
            .filter(|n| n.hierarchy.level < max_level)
            .collect();
        if parents.is_empty() {
            return Vec::new();
        }
        let mean = parents.iter().map(|n| n.hierarchy.children.len()).sum::<usize>() as f64
            / parents.len() as f64;
        let overloaded: Vec<NodeId> = parents
            .iter()
            .filter(|n| n.hierarchy.children.len() as f64 > mean + 1.0)
            .map(|n| n.id.clone())
            .collect();

        let mut moved = Vec::new();
        for parent in overloaded {
            loop {
                let Some(from) = nodes.get(&parent) else { break };
                let count = from.hierarchy.children.len();
                if count as f64 <= mean + 1.0 {
                    break;
                }
                let Some(child) = from.hierarchy.children.last().cloned() else {
                    break;
                };
                let level = from.hierarchy.level;
                let target = nodes
                    .iter()
                    .filter(|n| n.id != parent && n.hierarchy.level == level && is_linkable(n))
                    .filter(|n| (n.hierarchy.children.len() as u32) < self.max_fanout())
                    .filter(|n| n.hierarchy.children.len() + 1 < count)
                    .min_by_key(|n| n.hierarchy.children.len())
                    .map(|n| n.id.clone());
                let Some(target) = target else { break };

                self.set_parent(nodes, &child, Some(target.clone()));
                debug!(%child, from = %parent, to = %target, "child moved");
                moved.push((child, parent.clone(), target));
            }
        }
        moved
    }
}

/// First non-adjacent pair when nodes are ordered by degree, then insertion.
fn least_connected_pair(nodes: &Arena<Node>) -> Option<(NodeId, NodeId)> {
    let mut ordered: Vec<&Node> = nodes.iter().filter(|n| is_linkable(n)).collect();
    ordered.sort_by_key(|n| (n.connections.len(), nodes.rank(&n.id)));

    for (i, a) in ordered.iter().enumerate() {
        for b in &ordered[i + 1..] {
            if !a.connections.contains(&b.id) {
                return Some((a.id.clone(), b.id.clone()));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::tests::node;
    use swarm_core::NodeKind;

    #[test]
    fn mesh_gains_edges_until_target() {
        let manager = TopologyManager::new(TopologyKind::Mesh).with_mesh_degree(1);
        let mut nodes = Arena::new();
        for id in ["a", "b", "c", "d"] {
            manager.add_node(&mut nodes, node(id, NodeKind::Worker)).unwrap();
        }
        assert_eq!(TopologyMetrics::compute(&nodes).connectivity, 0.5);

        let adjustment = manager.adjust(&mut nodes, 0.8);
        assert_eq!(
            adjustment.added_edges,
            vec![
                ("c".to_string(), "d".to_string()),
                ("a".to_string(), "d".to_string())
            ]
        );
        assert!(TopologyMetrics::compute(&nodes).connectivity >= 0.8);
    }

    #[test]
    fn densify_respects_budget() {
        let manager = TopologyManager::new(TopologyKind::Mesh).with_mesh_degree(0);
        let mut nodes = Arena::new();
        for i in 0..6 {
            manager
                .add_node(&mut nodes, node(&format!("n{i}"), NodeKind::Worker))
                .unwrap();
        }
        let adjustment = manager.adjust(&mut nodes, 1.0);
        assert_eq!(adjustment.added_edges.len(), 6);
        assert_eq!(TopologyMetrics::compute(&nodes).edges, 6);
    }

    #[test]
    fn hierarchy_spreads_overloaded_parent() {
        let manager = TopologyManager::new(TopologyKind::Hierarchical);
        let mut nodes = Arena::new();
        for id in ["r1", "r2", "w1", "w2", "w3", "w4"] {
            nodes.insert(node(id, NodeKind::Worker)).unwrap();
        }
        for w in ["w1", "w2", "w3", "w4"] {
            manager.set_parent(&mut nodes, w, Some("r1".to_string()));
        }

        let adjustment = manager.adjust(&mut nodes, 0.8);

        assert_eq!(
            adjustment.moved,
            vec![
                ("w4".to_string(), "r1".to_string(), "r2".to_string()),
                ("w3".to_string(), "r1".to_string(), "r2".to_string()),
            ]
        );
        assert_eq!(nodes.get("r1").unwrap().hierarchy.children, vec!["w1", "w2"]);
        let w4 = nodes.get("w4").unwrap();
        assert_eq!(w4.hierarchy.level, 1);
        assert!(w4.connections.contains("r2"));
        assert!(!w4.connections.contains("r1"));
    }

    #[test]
    fn balanced_hierarchy_is_left_alone() {
        let manager = TopologyManager::new(TopologyKind::Hierarchical);
        let mut nodes = Arena::new();
        manager.add_node(&mut nodes, node("c", NodeKind::Coordinator)).unwrap();
        manager.add_node(&mut nodes, node("w", NodeKind::Worker)).unwrap();
        assert!(manager.adjust(&mut nodes, 0.8).is_empty());
    }
}
