//! Error types for the swarm state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading or mutating the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("duplicate id: {0}")]
    Duplicate(String),
}
