//! Topology manager: placement on add, rewiring on remove.
//!
//! Hierarchical placement picks, among nodes that still have room
//! (`children < max_fanout`) and depth to spare, the one with the lowest
//! `children + active_tasks`; coordinator-capable nodes are preferred and
//! insertion order breaks ties. Mesh placement links a node to its
//! least-connected peers. Hybrid does hierarchical placement and then adds
//! a few mesh edges for redundancy.

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, info};

use swarm_core::{Node, NodeId, NodeStatus, SwarmConfig, TopologyKind};
use swarm_state::{Arena, StateError, StateResult};

/// Where a newly added node ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub parent: Option<NodeId>,
    pub level: u32,
    pub connections: Vec<NodeId>,
}

/// What removing a node changed.
#[derive(Debug, Clone)]
pub struct Removal {
    /// The removed node, with its pre-removal hierarchy and connections.
    pub node: Node,
    /// Former children and their new parent (`None` = promoted to root).
    pub reparented: Vec<(NodeId, Option<NodeId>)>,
    /// Former peers left isolated and the node they were reconnected to.
    pub healed: Vec<(NodeId, NodeId)>,
}

/// Owns the rules for wiring nodes together. Holds no graph state itself;
/// the graph lives on the nodes in the arena.
#[derive(Debug, Clone)]
pub struct TopologyManager {
    kind: TopologyKind,
    max_depth: u32,
    max_fanout: u32,
    mesh_degree: usize,
    hybrid_extra_links: usize,
}

impl TopologyManager {
    pub fn new(kind: TopologyKind) -> Self {
        Self {
            kind,
            max_depth: 3,
            max_fanout: 8,
            mesh_degree: 3,
            hybrid_extra_links: 2,
        }
    }

    pub fn from_config(config: &SwarmConfig) -> Self {
        Self {
            kind: config.topology,
            max_depth: config.max_depth,
            max_fanout: config.max_fanout,
            mesh_degree: config.mesh_degree,
            hybrid_extra_links: config.hybrid_extra_links,
        }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_fanout(mut self, max_fanout: u32) -> Self {
        self.max_fanout = max_fanout;
        self
    }

    pub fn with_mesh_degree(mut self, degree: usize) -> Self {
        self.mesh_degree = degree;
        self
    }

    pub fn kind(&self) -> TopologyKind {
        self.kind
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn max_fanout(&self) -> u32 {
        self.max_fanout
    }

    fn is_hierarchical(&self) -> bool {
        matches!(self.kind, TopologyKind::Hierarchical | TopologyKind::Hybrid)
    }

    /// Insert `node` into the arena and wire it into the graph.
    pub fn add_node(&self, nodes: &mut Arena<Node>, node: Node) -> StateResult<Placement> {
        let id = node.id.clone();
        nodes.insert(node)?;

        let mut connections = Vec::new();
        let mut parent = None;
        match self.kind {
            TopologyKind::Hierarchical => {
                parent = self.select_parent(nodes, &id);
                self.set_parent(nodes, &id, parent.clone());
                connections.extend(parent.clone());
            }
            TopologyKind::Mesh => {
                connections = self.link_least_connected(nodes, &id, self.mesh_degree);
            }
            TopologyKind::Hybrid => {
                parent = self.select_parent(nodes, &id);
                self.set_parent(nodes, &id, parent.clone());
                connections.extend(parent.clone());
                connections.extend(self.link_least_connected(nodes, &id, self.hybrid_extra_links));
            }
        }

        let level = nodes.get(&id).map(|n| n.hierarchy.level).unwrap_or(0);
        info!(
            node_id = %id,
            topology = %self.kind,
            parent = ?parent,
            level,
            peers = connections.len(),
            "node placed"
        );
        Ok(Placement {
            parent,
            level,
            connections,
        })
    }

    /// Remove a node from the arena, re-parenting its children and tearing
    /// down its connections.
    pub fn remove_node(&self, nodes: &mut Arena<Node>, id: &str) -> StateResult<Removal> {
        let node = nodes
            .remove(id)
            .ok_or_else(|| StateError::NodeNotFound(id.to_string()))?;

        for peer in &node.connections {
            if let Some(p) = nodes.get_mut(peer) {
                p.connections.remove(id);
            }
        }
        if let Some(parent) = &node.hierarchy.parent
            && let Some(p) = nodes.get_mut(parent)
        {
            p.hierarchy.remove_child(id);
        }

        let mut reparented = Vec::new();
        for child in &node.hierarchy.children {
            let Some(c) = nodes.get_mut(child) else { continue };
            c.hierarchy.parent = None;
            let parent = if self.is_hierarchical() {
                self.select_parent(nodes, child)
            } else {
                None
            };
            self.set_parent(nodes, child, parent.clone());
            debug!(%child, new_parent = ?parent, "child re-parented");
            reparented.push((child.clone(), parent));
        }

        let healed = if self.kind == TopologyKind::Hierarchical {
            Vec::new()
        } else {
            self.heal_isolated(nodes, &node.connections)
        };

        info!(
            node_id = %id,
            reparented = reparented.len(),
            healed = healed.len(),
            "node removed from topology"
        );
        Ok(Removal {
            node,
            reparented,
            healed,
        })
    }

    pub fn connections(&self, nodes: &Arena<Node>, id: &str) -> StateResult<BTreeSet<NodeId>> {
        nodes
            .get(id)
            .map(|n| n.connections.clone())
            .ok_or_else(|| StateError::NodeNotFound(id.to_string()))
    }

    /// Choose a parent for `id` under the fanout and depth limits: leaders
    /// first, then the least loaded (children plus active tasks), then
    /// insertion order. Level is not a criterion.
    pub fn select_parent(&self, nodes: &Arena<Node>, id: &str) -> Option<NodeId> {
        let subtree = subtree(nodes, id);
        let height = subtree_height(nodes, id);
        let max_level = self.max_depth.saturating_sub(1);

        let eligible: Vec<&Node> = nodes
            .iter()
            .filter(|n| !subtree.contains(n.id.as_str()))
            .filter(|n| is_linkable(n))
            .filter(|n| (n.hierarchy.children.len() as u32) < self.max_fanout)
            .filter(|n| n.hierarchy.level + 1 + height <= max_level)
            .collect();

        let load = |n: &Node| n.hierarchy.children.len() + n.active_task_count();
        eligible
            .iter()
            .filter(|n| n.kind.can_lead())
            .min_by_key(|n| load(n))
            .or_else(|| eligible.iter().min_by_key(|n| load(n)))
            .map(|n| n.id.clone())
    }

    /// Attach `id` under `parent` (or make it a root) and fix the levels of
    /// its whole subtree.
    pub(crate) fn set_parent(&self, nodes: &mut Arena<Node>, id: &str, parent: Option<NodeId>) {
        let old = nodes.get(id).and_then(|n| n.hierarchy.parent.clone());
        if let Some(old) = old.filter(|o| Some(o) != parent.as_ref()) {
            if let Some(p) = nodes.get_mut(&old) {
                p.hierarchy.remove_child(id);
                p.connections.remove(id);
            }
            if let Some(n) = nodes.get_mut(id) {
                n.connections.remove(&old);
            }
        }

        let level = match parent.as_deref().and_then(|p| nodes.get_mut(p)) {
            Some(p) => {
                p.hierarchy.add_child(id);
                p.connections.insert(id.to_string());
                p.hierarchy.level + 1
            }
            None => 0,
        };

        if let Some(n) = nodes.get_mut(id) {
            if let Some(p) = &parent {
                n.connections.insert(p.clone());
            }
            n.hierarchy.parent = parent;
        }
        relevel(nodes, id, level);
    }

    /// Link `id` to up to `count` peers it is not yet connected to, least
    /// connected first.
    fn link_least_connected(&self, nodes: &mut Arena<Node>, id: &str, count: usize) -> Vec<NodeId> {
        let Some(node) = nodes.get(id) else {
            return Vec::new();
        };
        let mut candidates: Vec<(usize, usize, NodeId)> = nodes
            .iter()
            .filter(|n| n.id != id && !node.connections.contains(&n.id) && is_linkable(n))
            .map(|n| (n.connections.len(), nodes.rank(&n.id).unwrap_or(usize::MAX), n.id.clone()))
            .collect();
        candidates.sort();

        let picked: Vec<NodeId> = candidates.into_iter().take(count).map(|(_, _, id)| id).collect();
        for peer in &picked {
            connect(nodes, id, peer);
        }
        picked
    }

    /// Reconnect any of `peers` that were left without connections.
    fn heal_isolated(&self, nodes: &mut Arena<Node>, peers: &BTreeSet<NodeId>) -> Vec<(NodeId, NodeId)> {
        let mut healed = Vec::new();
        for peer in peers {
            let isolated = nodes.get(peer).is_some_and(|n| n.connections.is_empty());
            if !isolated || nodes.len() < 2 {
                continue;
            }
            if let Some(target) = self.link_least_connected(nodes, peer, 1).pop() {
                debug!(node_id = %peer, %target, "isolated node reconnected");
                healed.push((peer.clone(), target));
            }
        }
        healed
    }
}

/// Nodes that may receive new links.
pub(crate) fn is_linkable(node: &Node) -> bool {
    !matches!(node.status.state, NodeStatus::Failed | NodeStatus::Maintenance)
}

pub(crate) fn connect(nodes: &mut Arena<Node>, a: &str, b: &str) {
    if a == b {
        return;
    }
    if let Some(n) = nodes.get_mut(a) {
        n.connections.insert(b.to_string());
    }
    if let Some(n) = nodes.get_mut(b) {
        n.connections.insert(a.to_string());
    }
}

/// `id` and all of its descendants.
pub(crate) fn subtree(nodes: &Arena<Node>, id: &str) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut stack = vec![id.to_string()];
    while let Some(current) = stack.pop() {
        if !seen.insert(current.clone()) {
            continue;
        }
        if let Some(n) = nodes.get(&current) {
            stack.extend(n.hierarchy.children.iter().cloned());
        }
    }
    seen
}

/// Levels below `id` in its subtree; a leaf has height 0.
pub(crate) fn subtree_height(nodes: &Arena<Node>, id: &str) -> u32 {
    let mut height = 0;
    let mut seen = HashSet::new();
    let mut stack = vec![(id.to_string(), 0u32)];
    while let Some((current, depth)) = stack.pop() {
        if !seen.insert(current.clone()) {
            continue;
        }
        height = height.max(depth);
        if let Some(n) = nodes.get(&current) {
            stack.extend(n.hierarchy.children.iter().map(|c| (c.clone(), depth + 1)));
        }
    }
    height
}

/// Set `id` to `level` and every descendant to its parent's level + 1.
fn relevel(nodes: &mut Arena<Node>, id: &str, level: u32) {
    let mut seen = HashSet::new();
    let mut stack = vec![(id.to_string(), level)];
    while let Some((current, level)) = stack.pop() {
        if !seen.insert(current.clone()) {
            continue;
        }
        if let Some(n) = nodes.get_mut(&current) {
            n.hierarchy.level = level;
            stack.extend(n.hierarchy.children.iter().map(|c| (c.clone(), level + 1)));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use swarm_core::{NodeKind, NodeSpec};

    pub(crate) fn node(id: &str, kind: NodeKind) -> Node {
        let mut node = Node::from_spec(id.to_string(), NodeSpec::new(kind), 3, 0);
        node.status.state = NodeStatus::Active;
        node
    }

    fn level(nodes: &Arena<Node>, id: &str) -> u32 {
        nodes.get(id).unwrap().hierarchy.level
    }

    fn parent(nodes: &Arena<Node>, id: &str) -> Option<String> {
        nodes.get(id).unwrap().hierarchy.parent.clone()
    }

    fn assert_levels_consistent(nodes: &Arena<Node>) {
        for n in nodes.iter() {
            match &n.hierarchy.parent {
                Some(p) => {
                    let parent = nodes.get(p).expect("parent must exist");
                    assert_eq!(n.hierarchy.level, parent.hierarchy.level + 1, "level of {}", n.id);
                    assert!(parent.hierarchy.children.contains(&n.id));
                    assert!(!subtree(nodes, &n.id).contains(p.as_str()), "cycle at {}", n.id);
                }
                None => assert_eq!(n.hierarchy.level, 0),
            }
        }
    }

    #[test]
    fn workers_attach_to_coordinator() {
        let manager = TopologyManager::new(TopologyKind::Hierarchical);
        let mut nodes = Arena::new();
        manager.add_node(&mut nodes, node("c", NodeKind::Coordinator)).unwrap();
        for i in 1..=5 {
            let placement = manager
                .add_node(&mut nodes, node(&format!("w{i}"), NodeKind::Worker))
                .unwrap();
            assert_eq!(placement.parent.as_deref(), Some("c"));
            assert_eq!(placement.level, 1);
        }

        assert_eq!(nodes.get("c").unwrap().hierarchy.children.len(), 5);
        assert_levels_consistent(&nodes);
    }

    #[test]
    fn fanout_limit_spills_to_next_level() {
        let manager = TopologyManager::new(TopologyKind::Hierarchical).with_max_fanout(2);
        let mut nodes = Arena::new();
        manager.add_node(&mut nodes, node("c", NodeKind::Coordinator)).unwrap();
        manager.add_node(&mut nodes, node("w1", NodeKind::Worker)).unwrap();
        manager.add_node(&mut nodes, node("w2", NodeKind::Worker)).unwrap();
        let placement = manager.add_node(&mut nodes, node("w3", NodeKind::Worker)).unwrap();

        // c is full; w1 is the first least-loaded worker.
        assert_eq!(placement.parent.as_deref(), Some("w1"));
        assert_eq!(placement.level, 2);
        assert_levels_consistent(&nodes);
    }

    #[test]
    fn depth_limit_makes_new_roots() {
        let manager = TopologyManager::new(TopologyKind::Hierarchical)
            .with_max_depth(2)
            .with_max_fanout(1);
        let mut nodes = Arena::new();
        manager.add_node(&mut nodes, node("a", NodeKind::Coordinator)).unwrap();
        manager.add_node(&mut nodes, node("b", NodeKind::Worker)).unwrap();
        let placement = manager.add_node(&mut nodes, node("c", NodeKind::Worker)).unwrap();

        // a is full and b sits at the deepest allowed level.
        assert_eq!(placement.parent, None);
        assert_eq!(level(&nodes, "c"), 0);
    }

    #[test]
    fn lowest_load_parent_wins() {
        let manager = TopologyManager::new(TopologyKind::Hierarchical);
        let mut nodes = Arena::new();
        let mut busy = node("c1", NodeKind::Coordinator);
        busy.status.active_tasks = vec!["t1".into(), "t2".into()];
        manager.add_node(&mut nodes, busy).unwrap();
        manager.add_node(&mut nodes, node("c2", NodeKind::Coordinator)).unwrap();

        // c2 became a child of c1; it is still less loaded.
        assert_eq!(parent(&nodes, "c2").as_deref(), Some("c1"));
        let placement = manager.add_node(&mut nodes, node("w", NodeKind::Worker)).unwrap();
        assert_eq!(placement.parent.as_deref(), Some("c2"));
    }

    #[test]
    fn removing_parent_reparents_children() {
        let manager = TopologyManager::new(TopologyKind::Hierarchical).with_max_fanout(2);
        let mut nodes = Arena::new();
        manager.add_node(&mut nodes, node("root", NodeKind::Coordinator)).unwrap();
        manager.add_node(&mut nodes, node("mid", NodeKind::Coordinator)).unwrap();
        manager.add_node(&mut nodes, node("leaf1", NodeKind::Worker)).unwrap();
        manager.add_node(&mut nodes, node("leaf2", NodeKind::Worker)).unwrap();
        // root: [mid, leaf2]; mid: [leaf1]
        assert_eq!(parent(&nodes, "leaf1").as_deref(), Some("mid"));
        assert_eq!(parent(&nodes, "leaf2").as_deref(), Some("root"));

        let removal = manager.remove_node(&mut nodes, "mid").unwrap();
        assert_eq!(removal.reparented, vec![("leaf1".to_string(), Some("root".to_string()))]);
        assert_eq!(level(&nodes, "leaf1"), 1);
        for n in nodes.iter() {
            assert_ne!(n.hierarchy.parent.as_deref(), Some("mid"));
            assert!(!n.connections.contains("mid"));
        }
        assert_levels_consistent(&nodes);
    }

    #[test]
    fn removing_root_promotes_or_reparents() {
        let manager = TopologyManager::new(TopologyKind::Hierarchical);
        let mut nodes = Arena::new();
        manager.add_node(&mut nodes, node("c", NodeKind::Coordinator)).unwrap();
        manager.add_node(&mut nodes, node("w1", NodeKind::Worker)).unwrap();
        manager.add_node(&mut nodes, node("w2", NodeKind::Worker)).unwrap();

        manager.remove_node(&mut nodes, "c").unwrap();

        // w1 is re-parented first and lands under its sibling; w2 then has
        // nowhere to go but up.
        assert_eq!(parent(&nodes, "w2"), None);
        assert_eq!(parent(&nodes, "w1").as_deref(), Some("w2"));
        assert_eq!(level(&nodes, "w1"), 1);
        assert_levels_consistent(&nodes);
    }

    #[test]
    fn reparenting_moves_whole_subtree_levels() {
        let manager = TopologyManager::new(TopologyKind::Hierarchical)
            .with_max_depth(4)
            .with_max_fanout(1);
        let mut nodes = Arena::new();
        for id in ["a", "b", "c", "d"] {
            manager.add_node(&mut nodes, node(id, NodeKind::Worker)).unwrap();
        }
        // Chain a → b → c → d.
        assert_eq!(level(&nodes, "d"), 3);

        manager.remove_node(&mut nodes, "b").unwrap();
        assert_eq!(parent(&nodes, "c").as_deref(), Some("a"));
        assert_eq!(level(&nodes, "c"), 1);
        assert_eq!(level(&nodes, "d"), 2);
        assert_levels_consistent(&nodes);
    }

    #[test]
    fn remove_unknown_node_is_not_found() {
        let manager = TopologyManager::new(TopologyKind::Mesh);
        let mut nodes: Arena<Node> = Arena::new();
        assert!(matches!(
            manager.remove_node(&mut nodes, "ghost"),
            Err(StateError::NodeNotFound(_))
        ));
    }

    #[test]
    fn mesh_links_least_connected_peers() {
        let manager = TopologyManager::new(TopologyKind::Mesh).with_mesh_degree(2);
        let mut nodes = Arena::new();
        for id in ["a", "b", "c", "d"] {
            manager.add_node(&mut nodes, node(id, NodeKind::Worker)).unwrap();
        }
        // a, b and c end up with two edges each; d takes the two oldest.
        let d = manager.connections(&nodes, "d").unwrap();
        assert_eq!(d.into_iter().collect::<Vec<_>>(), vec!["a".to_string(), "b".to_string()]);
        for n in nodes.iter() {
            for peer in &n.connections {
                assert!(nodes.get(peer).unwrap().connections.contains(&n.id), "asymmetric edge");
            }
        }
    }

    #[test]
    fn mesh_removal_heals_isolated_nodes() {
        let manager = TopologyManager::new(TopologyKind::Mesh).with_mesh_degree(1);
        let mut nodes = Arena::new();
        manager.add_node(&mut nodes, node("hub", NodeKind::Worker)).unwrap();
        manager.add_node(&mut nodes, node("a", NodeKind::Worker)).unwrap();
        manager.add_node(&mut nodes, node("b", NodeKind::Worker)).unwrap();
        // b links to the least connected of {hub, a}: both have 1, hub first.
        assert!(nodes.get("b").unwrap().connections.contains("hub"));

        let removal = manager.remove_node(&mut nodes, "hub").unwrap();
        // Linking a to b heals both.
        assert_eq!(removal.healed, vec![("a".to_string(), "b".to_string())]);
        assert!(nodes.get("a").unwrap().connections.contains("b"));
    }

    #[test]
    fn hybrid_adds_extra_links() {
        let manager = TopologyManager::new(TopologyKind::Hybrid);
        let mut nodes = Arena::new();
        manager.add_node(&mut nodes, node("c", NodeKind::Coordinator)).unwrap();
        manager.add_node(&mut nodes, node("w1", NodeKind::Worker)).unwrap();
        manager.add_node(&mut nodes, node("w2", NodeKind::Worker)).unwrap();
        let placement = manager.add_node(&mut nodes, node("w3", NodeKind::Worker)).unwrap();

        assert_eq!(placement.parent.as_deref(), Some("c"));
        // Parent link plus up to two mesh edges to otherwise unconnected nodes.
        assert_eq!(placement.connections.len(), 3);
        assert!(placement.connections.contains(&"w1".to_string()));
        assert!(placement.connections.contains(&"w2".to_string()));
    }

    #[test]
    fn failed_nodes_are_not_parents() {
        let manager = TopologyManager::new(TopologyKind::Hierarchical);
        let mut nodes = Arena::new();
        let mut down = node("c", NodeKind::Coordinator);
        down.status.state = NodeStatus::Failed;
        manager.add_node(&mut nodes, down).unwrap();
        let placement = manager.add_node(&mut nodes, node("w", NodeKind::Worker)).unwrap();
        assert_eq!(placement.parent, None);
    }
}
