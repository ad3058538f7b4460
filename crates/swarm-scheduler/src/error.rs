//! Scheduler error types.

use thiserror::Error;

use swarm_core::{TaskStatus, ValidationError};
use swarm_state::StateError;

/// Errors that can occur during scheduling operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchedulerError {
    #[error("invalid task: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("task {task_id} is {status:?}; cannot {action}")]
    InvalidTransition {
        task_id: String,
        status: TaskStatus,
        action: &'static str,
    },
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
