//! Node scoring for task placement.
//!
//! Evaluates candidate nodes using a weighted combination of:
//! - **Reliability**: success history of the node
//! - **Error rate**: inverse of the failure ratio
//! - **Load**: free task slots
//! - **Resources**: mean free cpu and memory ratio

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use swarm_core::Node;

/// Weights for the scoring components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub reliability: f64,
    pub error_rate: f64,
    pub load: f64,
    pub resources: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            reliability: 0.3,
            error_rate: 0.2,
            load: 0.3,
            resources: 0.2,
        }
    }
}

/// Individual score components, each in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub reliability: f64,
    pub error_rate: f64,
    pub load: f64,
    pub resources: f64,
}

/// Scored candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeScore {
    pub node_id: String,
    /// Composite score (higher = better). Range: 0.0..=1.0.
    pub score: f64,
    pub preferred: bool,
    pub affinity: bool,
    /// Insertion rank of the node, the last tie-breaker.
    pub rank: usize,
    pub breakdown: ScoreBreakdown,
}

pub fn breakdown(node: &Node) -> ScoreBreakdown {
    let perf = &node.status.performance;
    let resources = &node.resources;
    ScoreBreakdown {
        reliability: perf.reliability,
        error_rate: 1.0 - perf.error_rate,
        load: (1.0 - node.load()).max(0.0),
        resources: (resources.cpu.available_ratio() + resources.memory.available_ratio()) / 2.0,
    }
}

/// Weighted score of a single node.
pub fn score_node(node: &Node, weights: &ScoringWeights) -> (f64, ScoreBreakdown) {
    let b = breakdown(node);
    let score = weights.reliability * b.reliability
        + weights.error_rate * b.error_rate
        + weights.load * b.load
        + weights.resources * b.resources;
    (score, b)
}

/// Sort candidates best first: score, then preferred, then affinity, then
/// insertion order.
pub fn rank(scores: &mut [NodeScore]) {
    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(b.preferred.cmp(&a.preferred))
            .then(b.affinity.cmp(&a.affinity))
            .then(a.rank.cmp(&b.rank))
    });
}
