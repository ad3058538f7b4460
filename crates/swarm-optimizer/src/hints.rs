//! Per-node allocation hints.

use serde::{Deserialize, Serialize};

use swarm_core::{Node, NodeId};
use swarm_state::SwarmState;

/// Suggested workload for a node, derived from its track record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationHint {
    pub node_id: NodeId,
    /// Concurrency the node has earned: its limit scaled by reliability and
    /// success ratio, never below one.
    pub recommended_concurrency: u32,
    pub current_load: f64,
    /// Free CPU cores.
    pub cpu_headroom: f64,
    /// Free memory in MiB.
    pub memory_headroom: f64,
}

pub fn hint_for(node: &Node) -> AllocationHint {
    let perf = &node.status.performance;
    let earned = node.capabilities.max_concurrent_tasks as f64
        * perf.reliability
        * (1.0 - perf.error_rate);
    AllocationHint {
        node_id: node.id.clone(),
        recommended_concurrency: (earned.round() as u32).max(1),
        current_load: node.load(),
        cpu_headroom: node.resources.cpu.available(),
        memory_headroom: node.resources.memory.available(),
    }
}

/// Hints for every active node, in insertion order.
pub fn allocation_hints(state: &SwarmState) -> Vec<AllocationHint> {
    state.active_nodes().map(hint_for).collect()
}
