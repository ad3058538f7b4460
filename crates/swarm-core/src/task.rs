//! Task data model.

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};
use crate::node::NodeId;
use crate::resources::{ExperienceTier, ResourceRequest, SecurityLevel};

/// Unique identifier for a task.
pub type TaskId = String;

/// Task state machine.
///
/// ```text
/// pending ──▶ scheduled ──▶ running ──▶ completed | failed
///    ▲            │
///    └────────────┘  (all assignees lost, reschedule)
/// pending | scheduled | running ──▶ cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    /// States in which a task holds node assignments.
    pub fn holds_assignment(self) -> bool {
        matches!(self, TaskStatus::Scheduled | TaskStatus::Running)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityRequirement {
    pub min_quality_rating: f64,
    pub min_experience: ExperienceTier,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingBounds {
    pub estimated_duration_ms: Option<u64>,
    pub max_duration_ms: Option<u64>,
}

/// What a node must offer to run the task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRequirements {
    /// Capability tags that must all be covered by the node.
    pub capabilities: Vec<String>,
    pub resources: ResourceRequest,
    pub quality: QualityRequirement,
    pub timing: TimingBounds,
    /// Number of nodes the task runs on.
    pub replicas: u32,
}

impl Default for TaskRequirements {
    fn default() -> Self {
        Self {
            capabilities: Vec::new(),
            resources: ResourceRequest::default(),
            quality: QualityRequirement::default(),
            timing: TimingBounds::default(),
            replicas: 1,
        }
    }
}

/// Placement constraints on top of requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConstraints {
    pub regions: Vec<String>,
    pub excluded_regions: Vec<String>,
    pub zones: Vec<String>,
    pub excluded_zones: Vec<String>,
    pub preferred_nodes: Vec<NodeId>,
    pub excluded_nodes: Vec<NodeId>,
    /// Prefer nodes already running tasks with these tags.
    pub affinity: Vec<String>,
    /// Never share a node with a task carrying any of these tags.
    pub anti_affinity: Vec<String>,
    pub security: SecurityLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    pub reached_at_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub percentage: f64,
    pub phase: String,
    pub milestones: Vec<Milestone>,
}

/// A unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: String,
    pub description: String,
    pub requirements: TaskRequirements,
    pub constraints: TaskConstraints,
    pub dependencies: Vec<TaskId>,
    /// Higher is scheduled first.
    pub priority: i32,
    pub deadline_ms: Option<u64>,
    pub assigned_nodes: Vec<NodeId>,
    /// Runner-up candidates from the last placement, preferred on reschedule.
    pub backup_nodes: Vec<NodeId>,
    pub status: TaskStatus,
    pub progress: TaskProgress,
    /// Why the task failed, or why the last scheduling attempt did not place it.
    pub reason: Option<String>,
    /// Scheduling attempts since the task last lost its assignees.
    pub attempts: u32,
    /// Set once a task has lost its nodes and is waiting to be placed again.
    pub rescheduling: bool,
    /// Whether the assignment reached the nodes over the delivery channel.
    pub delivered: bool,
    pub submitted_at_ms: u64,
    pub scheduled_at_ms: Option<u64>,
    pub started_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,
}

impl Task {
    /// Build a pending task from a validated spec.
    pub fn from_spec(id: TaskId, spec: TaskSpec, now_ms: u64) -> Self {
        Self {
            id,
            kind: spec.kind,
            description: spec.description,
            requirements: spec.requirements,
            constraints: spec.constraints,
            dependencies: spec.dependencies,
            priority: spec.priority,
            deadline_ms: spec.deadline_ms,
            assigned_nodes: Vec::new(),
            backup_nodes: Vec::new(),
            status: TaskStatus::Pending,
            progress: TaskProgress::default(),
            reason: None,
            attempts: 0,
            rescheduling: false,
            delivered: false,
            submitted_at_ms: now_ms,
            scheduled_at_ms: None,
            started_at_ms: None,
            finished_at_ms: None,
        }
    }

    pub fn is_assigned_to(&self, node_id: &str) -> bool {
        self.assigned_nodes.iter().any(|n| n == node_id)
    }
}

/// Partial task description accepted by `SubmitTask`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSpec {
    pub kind: String,
    pub description: String,
    pub requirements: TaskRequirements,
    pub constraints: TaskConstraints,
    pub dependencies: Vec<TaskId>,
    pub priority: i32,
    pub deadline_ms: Option<u64>,
}

impl TaskSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn requiring(mut self, capability: impl Into<String>) -> Self {
        self.requirements.capabilities.push(capability.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if self.kind.trim().is_empty() {
            return Err(ValidationError::new("type", "must not be blank"));
        }
        if self.requirements.replicas == 0 {
            return Err(ValidationError::new("requirements.replicas", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.requirements.quality.min_quality_rating) {
            return Err(ValidationError::new(
                "requirements.quality.min_quality_rating",
                "must be within 0.0..=1.0",
            ));
        }
        self.requirements.resources.validate()
    }
}
