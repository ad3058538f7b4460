//! Where member votes come from.

use crate::proposal::Proposal;

/// Supplies a member's vote when a proposal becomes active.
///
/// Returning `None` abstains for now; the member can still vote later
/// through `ConsensusCoordinator::vote` until the proposal resolves.
pub trait BallotBox: Send + Sync {
    fn cast(&self, proposal: &Proposal, voter: &str) -> Option<bool>;
}

/// Every member approves every proposal.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnanimousBallot;

impl BallotBox for UnanimousBallot {
    fn cast(&self, _proposal: &Proposal, _voter: &str) -> Option<bool> {
        Some(true)
    }
}
