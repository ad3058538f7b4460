//! Typed event stream.
//!
//! Subscribers receive every event published after they subscribed, in
//! publication order, through a `tokio::sync::broadcast` channel. A slow
//! subscriber that falls more than the channel capacity behind sees
//! `RecvError::Lagged` and skips ahead; publishing never blocks the engine.

use serde::{Deserialize, Serialize};

use swarm_consensus::Proposal;
use swarm_core::{ConsensusAlgorithm, Node, NodeId, Task, TaskId, TopologyKind};
use swarm_optimizer::OptimizationReport;

/// Events buffered per subscriber before it starts lagging.
pub const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SwarmEvent {
    Initialized {
        topology: TopologyKind,
        consensus: ConsensusAlgorithm,
        at_ms: u64,
    },
    NodeAdded {
        node: Node,
    },
    NodeRemoved {
        node_id: NodeId,
        /// Tasks that lost their last node and went back to pending.
        reassigned: Vec<TaskId>,
    },
    NodeFailure {
        node_id: NodeId,
        node: Node,
        reassigned: Vec<TaskId>,
    },
    NodeRecovery {
        node_id: NodeId,
        node: Node,
    },
    TaskSubmitted {
        task: Task,
    },
    TaskScheduled {
        task: Task,
    },
    ConsensusProposed {
        proposal: Proposal,
    },
    SwarmOptimized {
        report: OptimizationReport,
    },
    Shutdown {
        cancelled_tasks: Vec<TaskId>,
        at_ms: u64,
    },
}

impl SwarmEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            SwarmEvent::Initialized { .. } => "initialized",
            SwarmEvent::NodeAdded { .. } => "nodeAdded",
            SwarmEvent::NodeRemoved { .. } => "nodeRemoved",
            SwarmEvent::NodeFailure { .. } => "nodeFailure",
            SwarmEvent::NodeRecovery { .. } => "nodeRecovery",
            SwarmEvent::TaskSubmitted { .. } => "taskSubmitted",
            SwarmEvent::TaskScheduled { .. } => "taskScheduled",
            SwarmEvent::ConsensusProposed { .. } => "consensusProposed",
            SwarmEvent::SwarmOptimized { .. } => "swarmOptimized",
            SwarmEvent::Shutdown { .. } => "shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::{NodeSpec, TaskSpec};

    #[test]
    fn serialized_tag_matches_name() {
        let node = Node::from_spec("n1".into(), NodeSpec::default(), 3, 0);
        let task = Task::from_spec("t1".into(), TaskSpec::new("build"), 0);
        let events = [
            SwarmEvent::NodeAdded { node: node.clone() },
            SwarmEvent::NodeFailure {
                node_id: "n1".into(),
                node,
                reassigned: vec!["t1".into()],
            },
            SwarmEvent::TaskScheduled { task },
            SwarmEvent::Shutdown {
                cancelled_tasks: Vec::new(),
                at_ms: 5,
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["event"], event.name());
        }
    }

    #[test]
    fn round_trips_through_json() {
        let event = SwarmEvent::NodeRemoved {
            node_id: "n2".into(),
            reassigned: vec!["t9".into()],
        };
        let text = serde_json::to_string(&event).unwrap();
        assert!(text.contains("\"event\":\"nodeRemoved\""));
        let back: SwarmEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back, event);
    }
}
