//! Handing assignments to node processes.
//!
//! The engine decides what to send and to whom; a `DeliveryChannel` does
//! the sending. Failures are transient: the task stays scheduled, is marked
//! undelivered, and the next optimization pass sends it again.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use swarm_core::{NodeId, Task, TaskId, TaskRequirements};

pub type DeliveryFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delivery to {node_id} failed: {reason}")]
pub struct DeliveryError {
    pub node_id: NodeId,
    pub reason: String,
}

impl DeliveryError {
    pub fn new(node_id: impl Into<NodeId>, reason: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }
}

/// Transport from the engine to node processes.
pub trait DeliveryChannel: Send + Sync {
    fn send<'a>(&'a self, node_id: &'a str, payload: &'a serde_json::Value) -> DeliveryFuture<'a>;
}

/// Accepts every payload and logs it. Used when no transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDelivery;

impl DeliveryChannel for LogDelivery {
    fn send<'a>(&'a self, node_id: &'a str, payload: &'a serde_json::Value) -> DeliveryFuture<'a> {
        Box::pin(async move {
            debug!(node_id, task_id = ?payload.get("task_id"), "assignment delivered");
            Ok(())
        })
    }
}

/// What a node receives when a task is assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentPayload {
    pub task_id: TaskId,
    pub kind: String,
    pub description: String,
    /// Every node the task runs on, the receiver included.
    pub nodes: Vec<NodeId>,
    pub requirements: TaskRequirements,
    pub priority: i32,
    pub deadline_ms: Option<u64>,
}

impl From<&Task> for AssignmentPayload {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            kind: task.kind.clone(),
            description: task.description.clone(),
            nodes: task.assigned_nodes.clone(),
            requirements: task.requirements.clone(),
            priority: task.priority,
            deadline_ms: task.deadline_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::TaskSpec;

    #[test]
    fn payload_carries_assignment() {
        let mut task = Task::from_spec("t1".into(), TaskSpec::new("build").with_priority(3), 0);
        task.assigned_nodes = vec!["a".into(), "b".into()];

        let json = serde_json::to_value(AssignmentPayload::from(&task)).unwrap();
        assert_eq!(json["task_id"], "t1");
        assert_eq!(json["nodes"], serde_json::json!(["a", "b"]));
        assert_eq!(json["priority"], 3);
    }

    #[tokio::test]
    async fn log_delivery_accepts_everything() {
        let payload = serde_json::json!({ "task_id": "t1" });
        assert!(LogDelivery.send("a", &payload).await.is_ok());
    }
}
