//! Consensus error types.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("proposal not found: {0}")]
    ProposalNotFound(String),

    #[error("proposal {0} is queued, not active")]
    NotActive(String),

    #[error("{voter} is not a member of proposal {proposal_id}")]
    NotAMember { proposal_id: String, voter: String },

    #[error("{voter} already voted on proposal {proposal_id}")]
    AlreadyVoted { proposal_id: String, voter: String },
}

pub type ConsensusResult<T> = Result<T, ConsensusError>;
