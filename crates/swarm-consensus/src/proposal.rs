//! Proposal data model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use swarm_core::{ConsensusAlgorithm, NodeId};

/// What a proposal would change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    NodeAddition,
    NodeRemoval,
    TaskAssignment,
    TopologyChange,
    ConfigUpdate,
}

impl ProposalKind {
    /// Whether `algorithm` requires a quorum for this kind of change.
    pub fn gated_by(self, algorithm: ConsensusAlgorithm) -> bool {
        match algorithm {
            ConsensusAlgorithm::None | ConsensusAlgorithm::Gossip => false,
            ConsensusAlgorithm::Raft => self != ProposalKind::TaskAssignment,
            ConsensusAlgorithm::Pbft => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Queued,
    Active,
    Committed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub kind: ProposalKind,
    pub payload: serde_json::Value,
    pub proposer: String,
    /// Eligible voters, fixed when the proposal is raised.
    pub members: Vec<NodeId>,
    pub required_votes: usize,
    pub votes: BTreeMap<NodeId, bool>,
    pub status: ProposalStatus,
    /// Term the proposal was activated in; 0 while queued.
    pub term: u64,
    pub created_at_ms: u64,
    pub activated_at_ms: Option<u64>,
    pub deadline_ms: Option<u64>,
    pub resolved_at_ms: Option<u64>,
}

impl Proposal {
    pub fn new(
        id: String,
        kind: ProposalKind,
        payload: serde_json::Value,
        proposer: String,
        members: Vec<NodeId>,
        now_ms: u64,
    ) -> Self {
        let required_votes = members.len() / 2 + 1;
        Self {
            id,
            kind,
            payload,
            proposer,
            members,
            required_votes,
            votes: BTreeMap::new(),
            status: ProposalStatus::Queued,
            term: 0,
            created_at_ms: now_ms,
            activated_at_ms: None,
            deadline_ms: None,
            resolved_at_ms: None,
        }
    }

    pub fn approvals(&self) -> usize {
        self.votes.values().filter(|v| **v).count()
    }

    pub fn rejections(&self) -> usize {
        self.votes.values().filter(|v| !**v).count()
    }

    pub fn is_member(&self, voter: &str) -> bool {
        self.members.iter().any(|m| m == voter)
    }

    pub fn has_quorum(&self) -> bool {
        self.approvals() >= self.required_votes
    }

    /// Too many rejections for the remaining voters to reach quorum.
    pub fn quorum_unreachable(&self) -> bool {
        self.members.len() - self.rejections().min(self.members.len()) < self.required_votes
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.deadline_ms.is_some_and(|deadline| now_ms > deadline)
    }
}

/// Final outcome of a proposal, sent to whoever raised it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub proposal_id: String,
    pub kind: ProposalKind,
    pub status: ProposalStatus,
    pub approvals: usize,
    pub rejections: usize,
    pub term: u64,
    pub timed_out: bool,
}

impl Resolution {
    pub fn committed(&self) -> bool {
        self.status == ProposalStatus::Committed
    }
}
