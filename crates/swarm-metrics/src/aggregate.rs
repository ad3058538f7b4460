//! Snapshot aggregation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use swarm_consensus::ConsensusStats;
use swarm_core::{Node, NodeStatus, TaskStatus};
use swarm_state::SwarmState;
use swarm_topology::TopologyMetrics;

/// Spread of one utilization figure across nodes in service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UtilizationStats {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
}

impl UtilizationStats {
    /// All zeros when `values` is empty.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut max = f64::MIN;
        let mut min = f64::MAX;
        for v in values {
            count += 1;
            sum += v;
            max = max.max(v);
            min = min.min(v);
        }
        if count == 0 {
            return Self::default();
        }
        Self {
            avg: sum / count as f64,
            max,
            min,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUtilization {
    pub cpu: UtilizationStats,
    pub memory: UtilizationStats,
    pub storage: UtilizationStats,
    pub network: UtilizationStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologySummary {
    pub depth: u32,
    pub fanout: f64,
    pub connectivity: f64,
    pub redundancy: f64,
    /// Connectivity, the figure the optimizer steers toward its threshold.
    pub efficiency: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsensusSummary {
    /// Mean milliseconds from activation to resolution.
    pub consensus_time: f64,
    pub consensus_rounds: u64,
    pub success_rate: f64,
    pub participation_rate: f64,
}

impl From<&ConsensusStats> for ConsensusSummary {
    fn from(stats: &ConsensusStats) -> Self {
        Self {
            consensus_time: stats.mean_time_ms(),
            consensus_rounds: stats.rounds,
            success_rate: stats.success_rate(),
            participation_rate: stats.participation_rate(),
        }
    }
}

/// Swarm-wide statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SwarmMetrics {
    pub total_nodes: usize,
    pub active_nodes: usize,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    /// Mean milliseconds from submission to completion of completed tasks.
    pub average_response_time: f64,
    /// Completed tasks per second, summed over nodes.
    pub throughput: f64,
    pub resource_utilization: ResourceUtilization,
    pub topology: TopologySummary,
    pub consensus: ConsensusSummary,
}

/// Nodes whose resources count toward utilization.
fn in_service(node: &Node) -> bool {
    matches!(node.status.state, NodeStatus::Active | NodeStatus::Degraded)
}

pub fn aggregate(state: &SwarmState, consensus: &ConsensusStats) -> SwarmMetrics {
    let serving: Vec<&Node> = state.nodes.iter().filter(|n| in_service(n)).collect();

    let response_times: Vec<u64> = state
        .tasks_with_status(TaskStatus::Completed)
        .filter_map(|t| t.finished_at_ms.map(|done| done.saturating_sub(t.submitted_at_ms)))
        .collect();
    let average_response_time = if response_times.is_empty() {
        0.0
    } else {
        response_times.iter().sum::<u64>() as f64 / response_times.len() as f64
    };

    let resource_utilization = ResourceUtilization {
        cpu: UtilizationStats::from_values(serving.iter().map(|n| n.resources.cpu.utilization())),
        memory: UtilizationStats::from_values(
            serving.iter().map(|n| n.resources.memory.utilization()),
        ),
        storage: UtilizationStats::from_values(
            serving.iter().map(|n| n.resources.storage.utilization()),
        ),
        network: UtilizationStats::from_values(
            serving.iter().map(|n| n.resources.network.utilization()),
        ),
    };

    let shape = TopologyMetrics::compute(&state.nodes);
    let metrics = SwarmMetrics {
        total_nodes: state.nodes.len(),
        active_nodes: state.active_nodes().count(),
        total_tasks: state.tasks.len(),
        completed_tasks: state.tasks_with_status(TaskStatus::Completed).count(),
        failed_tasks: state.tasks_with_status(TaskStatus::Failed).count(),
        average_response_time,
        throughput: state.nodes.iter().map(|n| n.status.performance.throughput).sum(),
        resource_utilization,
        topology: TopologySummary {
            depth: shape.depth,
            fanout: shape.fanout,
            connectivity: shape.connectivity,
            redundancy: shape.redundancy,
            efficiency: shape.connectivity,
        },
        consensus: consensus.into(),
    };

    debug!(
        nodes = metrics.total_nodes,
        active = metrics.active_nodes,
        tasks = metrics.total_tasks,
        "swarm metrics aggregated"
    );
    metrics
}
