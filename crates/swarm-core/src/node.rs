//! Node data model.
//!
//! A `Node` is created from a partial `NodeSpec` when it joins the swarm and
//! is mutated afterwards only by its owners: the fault detector (status and
//! health), the scheduler (active tasks, reservations, performance) and the
//! topology manager (hierarchy and connections).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};
use crate::resources::{Capabilities, Resources};

/// Unique identifier for a node in the swarm.
pub type NodeId = String;

/// Role of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Coordinator,
    #[default]
    Worker,
    Specialist,
    Hybrid,
}

impl NodeKind {
    /// Coordinators and hybrids are preferred as hierarchical parents.
    pub fn can_lead(self) -> bool {
        matches!(self, NodeKind::Coordinator | NodeKind::Hybrid)
    }
}

/// Node health state machine.
///
/// ```text
/// initializing ──▶ active ◀──▶ failed
///                    │ ▲
///                    ▼ │
///                  degraded          any ──▶ maintenance
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Initializing,
    Active,
    Degraded,
    Failed,
    Maintenance,
}

/// Where a node runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub region: Option<String>,
    pub zone: Option<String>,
}

/// Rolling performance figures, updated as tasks complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub completed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Running mean of task duration in milliseconds.
    pub average_task_ms: f64,
    /// Completed tasks per second since the node joined.
    pub throughput: f64,
    pub error_rate: f64,
    /// Exponentially weighted success ratio in `0.0..=1.0`.
    pub reliability: f64,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            completed: 0,
            succeeded: 0,
            failed: 0,
            average_task_ms: 0.0,
            throughput: 0.0,
            error_rate: 0.0,
            reliability: 1.0,
        }
    }
}

impl PerformanceMetrics {
    const RELIABILITY_SMOOTHING: f64 = 0.1;

    /// Fold one finished task into the figures.
    pub fn record(&mut self, success: bool, duration_ms: u64, uptime_ms: u64) {
        self.completed += 1;
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        let n = self.completed as f64;
        self.average_task_ms += (duration_ms as f64 - self.average_task_ms) / n;
        self.error_rate = self.failed as f64 / n;
        let outcome = if success { 1.0 } else { 0.0 };
        self.reliability = (1.0 - Self::RELIABILITY_SMOOTHING) * self.reliability
            + Self::RELIABILITY_SMOOTHING * outcome;
        self.throughput = if uptime_ms > 0 {
            self.completed as f64 / (uptime_ms as f64 / 1000.0)
        } else {
            0.0
        };
    }
}

/// Liveness and workload of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeHealth {
    pub state: NodeStatus,
    /// Health score in `0.0..=1.0`.
    pub health: f64,
    pub active_tasks: Vec<String>,
    /// Clock milliseconds of the last heartbeat.
    pub last_heartbeat_ms: u64,
    pub performance: PerformanceMetrics,
}

/// Position of a node in a hierarchical topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hierarchy {
    pub level: u32,
    pub parent: Option<NodeId>,
    /// Children in the order they were attached.
    pub children: Vec<NodeId>,
    pub max_depth: u32,
}

impl Hierarchy {
    pub fn add_child(&mut self, child: &str) {
        if !self.children.iter().any(|c| c == child) {
            self.children.push(child.to_string());
        }
    }

    pub fn remove_child(&mut self, child: &str) {
        self.children.retain(|c| c != child);
    }
}

/// A worker unit in the swarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub capabilities: Capabilities,
    pub resources: Resources,
    pub location: Location,
    pub status: NodeHealth,
    pub hierarchy: Hierarchy,
    /// Peer ids; parent/child links in hierarchical mode, mesh edges otherwise.
    pub connections: BTreeSet<NodeId>,
    pub joined_at_ms: u64,
}

impl Node {
    /// Build a node from a validated spec. The node starts `initializing`.
    pub fn from_spec(id: NodeId, spec: NodeSpec, max_depth: u32, now_ms: u64) -> Self {
        let name = spec.name.unwrap_or_else(|| id.clone());
        Self {
            id,
            name,
            kind: spec.kind,
            capabilities: spec.capabilities,
            resources: spec.resources,
            location: spec.location,
            status: NodeHealth {
                state: NodeStatus::Initializing,
                health: 1.0,
                active_tasks: Vec::new(),
                last_heartbeat_ms: now_ms,
                performance: PerformanceMetrics::default(),
            },
            hierarchy: Hierarchy {
                max_depth,
                ..Hierarchy::default()
            },
            connections: BTreeSet::new(),
            joined_at_ms: now_ms,
        }
    }

    pub fn state(&self) -> NodeStatus {
        self.status.state
    }

    pub fn is_active(&self) -> bool {
        self.status.state == NodeStatus::Active
    }

    pub fn active_task_count(&self) -> usize {
        self.status.active_tasks.len()
    }

    pub fn has_free_slot(&self) -> bool {
        self.active_task_count() < self.capabilities.max_concurrent_tasks as usize
    }

    /// Active tasks as a fraction of the concurrency limit.
    pub fn load(&self) -> f64 {
        let max = self.capabilities.max_concurrent_tasks.max(1) as f64;
        self.active_task_count() as f64 / max
    }
}

/// Partial node description accepted by `AddNode`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
    pub name: Option<String>,
    pub kind: NodeKind,
    pub capabilities: Capabilities,
    pub resources: Resources,
    pub location: Location,
}

impl NodeSpec {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_max_tasks(mut self, max: u32) -> Self {
        self.capabilities.max_concurrent_tasks = max;
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.capabilities.domains.insert(domain.into());
        self
    }

    pub fn in_region(mut self, region: impl Into<String>) -> Self {
        self.location.region = Some(region.into());
        self
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err(ValidationError::new("name", "must not be blank"));
        }
        self.capabilities.validate()?;
        self.resources.validate()
    }
}
