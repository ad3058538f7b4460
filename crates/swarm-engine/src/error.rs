//! Engine error types.

use thiserror::Error;

use swarm_consensus::{ConsensusError, ProposalKind};
use swarm_core::{ConfigError, ValidationError};
use swarm_scheduler::SchedulerError;
use swarm_state::StateError;

/// Result type alias for engine operations.
pub type SwarmResult<T> = Result<T, SwarmError>;

/// Everything a caller of the engine API can get back.
#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    #[error("swarm is full ({max} nodes)")]
    CapacityExceeded { max: usize },

    #[error("{kind:?} rejected: proposal {proposal_id} aborted (timed out: {timed_out})")]
    Rejected {
        kind: ProposalKind,
        proposal_id: String,
        timed_out: bool,
    },

    #[error("engine is shut down")]
    ShutDown,
}

impl SwarmError {
    /// Unknown node or task id.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SwarmError::State(StateError::NodeNotFound(_) | StateError::TaskNotFound(_))
                | SwarmError::Scheduler(SchedulerError::State(
                    StateError::NodeNotFound(_) | StateError::TaskNotFound(_)
                ))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_through_either_wrapper() {
        let direct = SwarmError::from(StateError::NodeNotFound("n".into()));
        let nested = SwarmError::from(SchedulerError::State(StateError::TaskNotFound("t".into())));
        assert!(direct.is_not_found());
        assert!(nested.is_not_found());
        assert!(!SwarmError::ShutDown.is_not_found());
    }

    #[test]
    fn rejection_message_reports_timeout() {
        let err = SwarmError::Rejected {
            kind: ProposalKind::NodeAddition,
            proposal_id: "proposal-1".into(),
            timed_out: true,
        };
        assert_eq!(err.to_string(), "NodeAddition rejected: proposal proposal-1 aborted (timed out: true)");
    }
}
