//! swarm-consensus: quorum ratification of swarm changes.
//!
//! Changes that the configured algorithm gates (membership, topology,
//! config, and under `pbft` task assignment too) are raised as proposals.
//! One proposal is active at a time; the rest wait in FIFO order. An
//! active proposal commits once approvals reach `⌊members/2⌋ + 1`, and
//! aborts when enough members reject that quorum is out of reach or when
//! its deadline passes.
//!
//! # Architecture
//!
//! ```text
//! propose(kind, payload, members)
//!   ├── < 3 members        → Ticket::Unilateral
//!   └── otherwise          → queue ──▶ active ──▶ committed | aborted
//!                                        │             │
//!                       BallotBox::cast ─┘             └── oneshot to the proposer
//! vote(id, voter, approve) / resolve(now)
//! ```
//!
//! Every activation starts a new term led by the proposer.

pub mod ballot;
pub mod coordinator;
pub mod error;
pub mod proposal;

pub use ballot::{BallotBox, UnanimousBallot};
pub use coordinator::{ConsensusCoordinator, ConsensusState, ConsensusStats, Ticket};
pub use error::{ConsensusError, ConsensusResult};
pub use proposal::{Proposal, ProposalKind, ProposalStatus, Resolution};
