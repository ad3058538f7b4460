//! Heartbeat-driven health scoring and state transitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use swarm_core::{ConfigResult, Node, NodeId, NodeStatus, SwarmConfig};
use swarm_state::Arena;

/// A node state change made by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub node_id: NodeId,
    pub from: NodeStatus,
    pub to: NodeStatus,
    pub health: f64,
}

impl Transition {
    pub fn is_failure(&self) -> bool {
        self.to == NodeStatus::Failed
    }

    pub fn is_recovery(&self) -> bool {
        self.from == NodeStatus::Failed && self.to == NodeStatus::Active
    }
}

/// Applies heartbeat timeouts and health thresholds to nodes.
#[derive(Debug, Clone)]
pub struct FaultDetector {
    interval_ms: u64,
    timeout_ms: u64,
    degraded_threshold: f64,
}

impl FaultDetector {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            timeout_ms: timeout.as_millis() as u64,
            degraded_threshold: 0.5,
        }
    }

    pub fn from_config(config: &SwarmConfig) -> ConfigResult<Self> {
        Ok(Self::new(config.heartbeat_interval()?, config.heartbeat_timeout()?)
            .with_degraded_threshold(config.fault_tolerance.degraded_threshold))
    }

    pub fn with_degraded_threshold(mut self, threshold: f64) -> Self {
        self.degraded_threshold = threshold;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// 1.0 for the first heartbeat interval, then linear decay to 0.0 at the timeout.
    pub fn freshness(&self, silent_ms: u64) -> f64 {
        if silent_ms <= self.interval_ms {
            return 1.0;
        }
        let window = self.timeout_ms.saturating_sub(self.interval_ms).max(1);
        let decayed = (silent_ms - self.interval_ms) as f64 / window as f64;
        (1.0 - decayed).clamp(0.0, 1.0)
    }

    /// Re-score one node and apply any resulting transition.
    pub fn assess(&self, node: &mut Node, now_ms: u64) -> Option<Transition> {
        let from = node.status.state;
        if matches!(from, NodeStatus::Maintenance | NodeStatus::Failed) {
            return None;
        }

        let silent_ms = now_ms.saturating_sub(node.status.last_heartbeat_ms);
        if silent_ms > self.timeout_ms {
            node.status.state = NodeStatus::Failed;
            node.status.health = 0.0;
            warn!(node_id = %node.id, silent_ms, timeout_ms = self.timeout_ms, "node failed heartbeat timeout");
            return Some(transition(node, from));
        }

        let health = self
            .freshness(silent_ms)
            .min(1.0 - node.status.performance.error_rate)
            .clamp(0.0, 1.0);
        node.status.health = health;

        let to = match from {
            NodeStatus::Active if health < self.degraded_threshold => NodeStatus::Degraded,
            NodeStatus::Degraded if health >= self.degraded_threshold => NodeStatus::Active,
            _ => return None,
        };
        node.status.state = to;
        info!(node_id = %node.id, ?from, ?to, health, "node health changed");
        Some(transition(node, from))
    }

    /// Check every node; returns the transitions in node insertion order.
    pub fn sweep(&self, nodes: &mut Arena<Node>, now_ms: u64) -> Vec<Transition> {
        let transitions: Vec<Transition> = nodes
            .iter_mut()
            .filter_map(|node| self.assess(node, now_ms))
            .collect();
        debug!(nodes = nodes.len(), transitions = transitions.len(), "heartbeat sweep done");
        transitions
    }

    /// Record a heartbeat. Returns the transition back to active, if any.
    pub fn record_heartbeat(&self, node: &mut Node, now_ms: u64) -> Option<Transition> {
        node.status.last_heartbeat_ms = now_ms;
        let from = node.status.state;
        if from == NodeStatus::Maintenance {
            return None;
        }
        node.status.health = 1.0;
        if from == NodeStatus::Active {
            return None;
        }

        node.status.state = NodeStatus::Active;
        if from == NodeStatus::Failed {
            info!(node_id = %node.id, "node recovered");
        } else {
            debug!(node_id = %node.id, ?from, "node active");
        }
        Some(transition(node, from))
    }
}

fn transition(node: &Node, from: NodeStatus) -> Transition {
    Transition {
        node_id: node.id.clone(),
        from,
        to: node.status.state,
        health: node.status.health,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::NodeSpec;

    fn detector() -> FaultDetector {
        FaultDetector::new(Duration::from_millis(100), Duration::from_millis(300))
    }

    fn active_node(id: &str, last_heartbeat_ms: u64) -> Node {
        let mut node = Node::from_spec(id.to_string(), NodeSpec::default(), 3, last_heartbeat_ms);
        node.status.state = NodeStatus::Active;
        node
    }

    #[test]
    fn freshness_decays_linearly_after_interval() {
        let d = detector();
        assert_eq!(d.freshness(0), 1.0);
        assert_eq!(d.freshness(100), 1.0);
        assert_eq!(d.freshness(200), 0.5);
        assert_eq!(d.freshness(300), 0.0);
        assert_eq!(d.freshness(1_000), 0.0);
    }

    #[test]
    fn timeout_fails_node_once() {
        let d = detector();
        let mut nodes = Arena::new();
        nodes.insert(active_node("n1", 0)).unwrap();

        let first = d.sweep(&mut nodes, 301);
        assert_eq!(first.len(), 1);
        assert!(first[0].is_failure());
        assert_eq!(nodes.get("n1").unwrap().status.health, 0.0);

        // Already failed: no new transition.
        assert!(d.sweep(&mut nodes, 400).is_empty());
        assert!(d.sweep(&mut nodes, 10_000).is_empty());
    }

    #[test]
    fn exactly_at_timeout_is_not_failed() {
        let d = detector();
        let mut node = active_node("n1", 0);
        d.assess(&mut node, 300);
        assert_ne!(node.state(), NodeStatus::Failed);
    }

    #[test]
    fn stale_heartbeat_degrades_then_restores() {
        let d = detector();
        let mut node = active_node("n1", 0);

        let t = d.assess(&mut node, 250).unwrap();
        assert_eq!((t.from, t.to), (NodeStatus::Active, NodeStatus::Degraded));
        assert_eq!(node.status.health, 0.25);

        let t = d.record_heartbeat(&mut node, 260).unwrap();
        assert_eq!((t.from, t.to), (NodeStatus::Degraded, NodeStatus::Active));
        assert!(!t.is_recovery());
        assert_eq!(node.status.health, 1.0);
    }

    #[test]
    fn error_rate_caps_health() {
        let d = detector();
        let mut node = active_node("n1", 0);
        node.status.performance.error_rate = 0.6;

        let t = d.assess(&mut node, 50).unwrap();
        assert_eq!(t.to, NodeStatus::Degraded);
        assert!((node.status.health - 0.4).abs() < 1e-9);
    }

    #[test]
    fn heartbeat_recovers_failed_node() {
        let d = detector();
        let mut nodes = Arena::new();
        nodes.insert(active_node("n1", 0)).unwrap();
        d.sweep(&mut nodes, 500);

        let node = nodes.get_mut("n1").unwrap();
        let t = d.record_heartbeat(node, 510).unwrap();
        assert!(t.is_recovery());
        assert_eq!(node.status.last_heartbeat_ms, 510);
        // A second heartbeat is not another recovery.
        assert!(d.record_heartbeat(node, 520).is_none());
    }

    #[test]
    fn maintenance_nodes_are_never_transitioned() {
        let d = detector();
        let mut node = active_node("n1", 0);
        node.status.state = NodeStatus::Maintenance;

        assert!(d.assess(&mut node, 10_000).is_none());
        assert!(d.record_heartbeat(&mut node, 10_001).is_none());
        assert_eq!(node.state(), NodeStatus::Maintenance);
    }

    #[test]
    fn first_heartbeat_activates_initializing_node() {
        let d = detector();
        let mut node = Node::from_spec("n1".to_string(), NodeSpec::default(), 3, 0);
        let t = d.record_heartbeat(&mut node, 10).unwrap();
        assert_eq!((t.from, t.to), (NodeStatus::Initializing, NodeStatus::Active));
    }

    #[test]
    fn from_config_reads_durations() {
        let d = FaultDetector::from_config(&SwarmConfig::default()).unwrap();
        assert_eq!(d.interval(), Duration::from_secs(5));
    }
}
