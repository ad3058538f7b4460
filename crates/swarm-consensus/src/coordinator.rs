//! Consensus coordinator: one active proposal, a FIFO queue behind it.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use swarm_core::{ConsensusAlgorithm, IdGenerator, NodeId};

use crate::ballot::{BallotBox, UnanimousBallot};
use crate::error::{ConsensusError, ConsensusResult};
use crate::proposal::{Proposal, ProposalKind, ProposalStatus, Resolution};

/// Below this many members a change is applied without a vote.
pub const MIN_QUORUM_MEMBERS: usize = 3;

const HISTORY_LIMIT: usize = 64;

/// What `propose` hands back to the caller.
#[derive(Debug)]
pub enum Ticket {
    /// Too few members to vote; the change goes through as is.
    Unilateral,
    /// A proposal was raised. `outcome` fires once it resolves.
    Pending {
        proposal: Proposal,
        outcome: oneshot::Receiver<Resolution>,
    },
}

/// Running totals over every resolved proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsensusStats {
    pub rounds: u64,
    pub committed: u64,
    pub aborted: u64,
    pub timed_out: u64,
    pub total_time_ms: u64,
    pub votes_cast: u64,
    pub eligible_votes: u64,
}

impl ConsensusStats {
    /// Mean time from activation to resolution.
    pub fn mean_time_ms(&self) -> f64 {
        if self.rounds == 0 {
            0.0
        } else {
            self.total_time_ms as f64 / self.rounds as f64
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.rounds == 0 {
            1.0
        } else {
            self.committed as f64 / self.rounds as f64
        }
    }

    /// Votes cast over votes that could have been cast.
    pub fn participation_rate(&self) -> f64 {
        if self.eligible_votes == 0 {
            1.0
        } else {
            self.votes_cast as f64 / self.eligible_votes as f64
        }
    }
}

/// Read-only view of the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusState {
    pub algorithm: ConsensusAlgorithm,
    pub term: u64,
    pub leader: Option<String>,
    /// Members of the active proposal.
    pub members: Vec<NodeId>,
    /// Votes on the active proposal.
    pub votes: BTreeMap<NodeId, bool>,
    pub active: Option<Proposal>,
    pub queued: usize,
    /// Status of the active proposal, or of the last resolved one.
    pub status: Option<ProposalStatus>,
    pub stats: ConsensusStats,
}

pub struct ConsensusCoordinator {
    algorithm: ConsensusAlgorithm,
    timeout_ms: u64,
    ballot: Arc<dyn BallotBox>,
    term: u64,
    leader: Option<String>,
    active: Option<Proposal>,
    queue: VecDeque<Proposal>,
    history: VecDeque<Proposal>,
    waiters: HashMap<String, oneshot::Sender<Resolution>>,
    stats: ConsensusStats,
    ids: IdGenerator,
}

impl ConsensusCoordinator {
    pub fn new(algorithm: ConsensusAlgorithm, timeout: Duration) -> Self {
        Self {
            algorithm,
            timeout_ms: timeout.as_millis() as u64,
            ballot: Arc::new(UnanimousBallot),
            term: 0,
            leader: None,
            active: None,
            queue: VecDeque::new(),
            history: VecDeque::new(),
            waiters: HashMap::new(),
            stats: ConsensusStats::default(),
            ids: IdGenerator::new(),
        }
    }

    pub fn with_ballot(mut self, ballot: Arc<dyn BallotBox>) -> Self {
        self.ballot = ballot;
        self
    }

    pub fn algorithm(&self) -> ConsensusAlgorithm {
        self.algorithm
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether changes of `kind` must be ratified.
    pub fn requires_quorum(&self, kind: ProposalKind) -> bool {
        kind.gated_by(self.algorithm)
    }

    pub fn stats(&self) -> ConsensusStats {
        self.stats
    }

    /// Raise a proposal. It becomes active right away when nothing else is,
    /// and may even resolve before this returns if the ballot decides it.
    pub fn propose(
        &mut self,
        kind: ProposalKind,
        payload: serde_json::Value,
        proposer: &str,
        members: Vec<NodeId>,
        now_ms: u64,
    ) -> Ticket {
        if members.len() < MIN_QUORUM_MEMBERS {
            debug!(?kind, members = members.len(), "too few members; applying unilaterally");
            return Ticket::Unilateral;
        }

        let id = self.ids.next("proposal", now_ms);
        let proposal = Proposal::new(id.clone(), kind, payload, proposer.to_string(), members, now_ms);
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id.clone(), tx);
        info!(
            proposal_id = %id,
            ?kind,
            members = proposal.members.len(),
            required = proposal.required_votes,
            queued = self.queue.len(),
            "proposal raised"
        );

        let snapshot = proposal.clone();
        self.queue.push_back(proposal);
        self.advance(now_ms);

        Ticket::Pending {
            proposal: snapshot,
            outcome: rx,
        }
    }

    /// Record a vote on the active proposal.
    pub fn vote(
        &mut self,
        proposal_id: &str,
        voter: &str,
        approve: bool,
        now_ms: u64,
    ) -> ConsensusResult<Vec<Resolution>> {
        let Some(active) = self.active.as_mut().filter(|p| p.id == proposal_id) else {
            if self.queue.iter().any(|p| p.id == proposal_id) {
                return Err(ConsensusError::NotActive(proposal_id.to_string()));
            }
            return Err(ConsensusError::ProposalNotFound(proposal_id.to_string()));
        };
        if !active.is_member(voter) {
            return Err(ConsensusError::NotAMember {
                proposal_id: proposal_id.to_string(),
                voter: voter.to_string(),
            });
        }
        if active.votes.contains_key(voter) {
            return Err(ConsensusError::AlreadyVoted {
                proposal_id: proposal_id.to_string(),
                voter: voter.to_string(),
            });
        }
        active.votes.insert(voter.to_string(), approve);
        debug!(proposal_id, voter, approve, "vote recorded");
        Ok(self.advance(now_ms))
    }

    /// Resolve the active proposal on quorum or deadline, then activate the
    /// next in line. Returns everything that resolved.
    pub fn resolve(&mut self, now_ms: u64) -> Vec<Resolution> {
        self.advance(now_ms)
    }

    /// Abort the active proposal and everything queued.
    pub fn abort_all(&mut self, now_ms: u64) -> Vec<Resolution> {
        let mut resolutions = Vec::new();
        if self.active.is_some() {
            resolutions.extend(self.finish(ProposalStatus::Aborted, false, now_ms));
        }
        while let Some(mut proposal) = self.queue.pop_front() {
            proposal.status = ProposalStatus::Aborted;
            proposal.resolved_at_ms = Some(now_ms);
            let resolution = resolution_of(&proposal, false);
            if let Some(tx) = self.waiters.remove(&proposal.id) {
                let _ = tx.send(resolution.clone());
            }
            self.remember(proposal);
            resolutions.push(resolution);
        }
        if !resolutions.is_empty() {
            info!(aborted = resolutions.len(), "open proposals aborted");
        }
        resolutions
    }

    pub fn state(&self) -> ConsensusState {
        let status = self
            .active
            .as_ref()
            .or_else(|| self.history.back())
            .map(|p| p.status);
        ConsensusState {
            algorithm: self.algorithm,
            term: self.term,
            leader: self.leader.clone(),
            members: self.active.as_ref().map(|p| p.members.clone()).unwrap_or_default(),
            votes: self.active.as_ref().map(|p| p.votes.clone()).unwrap_or_default(),
            active: self.active.clone(),
            queued: self.queue.len(),
            status,
            stats: self.stats,
        }
    }

    /// Recently resolved proposals, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Proposal> {
        self.history.iter()
    }

    fn advance(&mut self, now_ms: u64) -> Vec<Resolution> {
        let mut resolutions = Vec::new();
        loop {
            if self.active.is_none() {
                let Some(next) = self.queue.pop_front() else { break };
                self.activate(next, now_ms);
            }
            let Some(active) = &self.active else { break };
            let (status, timed_out) = if active.has_quorum() {
                (ProposalStatus::Committed, false)
            } else if active.quorum_unreachable() {
                (ProposalStatus::Aborted, false)
            } else if active.is_expired(now_ms) {
                (ProposalStatus::Aborted, true)
            } else {
                break;
            };
            resolutions.extend(self.finish(status, timed_out, now_ms));
        }
        resolutions
    }

    fn activate(&mut self, mut proposal: Proposal, now_ms: u64) {
        self.term += 1;
        self.leader = Some(proposal.proposer.clone());
        proposal.status = ProposalStatus::Active;
        proposal.term = self.term;
        proposal.activated_at_ms = Some(now_ms);
        proposal.deadline_ms = Some(now_ms + self.timeout_ms);

        for member in proposal.members.clone() {
            if let Some(approve) = self.ballot.cast(&proposal, &member) {
                proposal.votes.insert(member, approve);
            }
        }
        debug!(
            proposal_id = %proposal.id,
            term = self.term,
            votes = proposal.votes.len(),
            "proposal active"
        );
        self.active = Some(proposal);
    }

    fn finish(&mut self, status: ProposalStatus, timed_out: bool, now_ms: u64) -> Option<Resolution> {
        let mut proposal = self.active.take()?;
        proposal.status = status;
        proposal.resolved_at_ms = Some(now_ms);

        let stats = &mut self.stats;
        stats.rounds += 1;
        match status {
            ProposalStatus::Committed => stats.committed += 1,
            _ => stats.aborted += 1,
        }
        if timed_out {
            stats.timed_out += 1;
        }
        let started = proposal.activated_at_ms.unwrap_or(now_ms);
        stats.total_time_ms += now_ms.saturating_sub(started);
        stats.votes_cast += proposal.votes.len() as u64;
        stats.eligible_votes += proposal.members.len() as u64;

        let resolution = resolution_of(&proposal, timed_out);
        if resolution.committed() {
            info!(proposal_id = %proposal.id, term = proposal.term, approvals = resolution.approvals, "proposal committed");
        } else {
            warn!(
                proposal_id = %proposal.id,
                term = proposal.term,
                rejections = resolution.rejections,
                timed_out,
                "proposal aborted"
            );
        }
        if let Some(tx) = self.waiters.remove(&proposal.id) {
            // The proposer may have stopped waiting.
            let _ = tx.send(resolution.clone());
        }
        self.remember(proposal);
        Some(resolution)
    }

    fn remember(&mut self, proposal: Proposal) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(proposal);
    }
}

fn resolution_of(proposal: &Proposal, timed_out: bool) -> Resolution {
    Resolution {
        proposal_id: proposal.id.clone(),
        kind: proposal.kind,
        status: proposal.status,
        approvals: proposal.approvals(),
        rejections: proposal.rejections(),
        term: proposal.term,
        timed_out,
    }
}
