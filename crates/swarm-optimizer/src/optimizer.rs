//! The optimization pass over swarm state.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use swarm_core::{ConfigResult, SwarmConfig, TaskId};
use swarm_scheduler::{Move, TaskScheduler, load_deviation};
use swarm_state::SwarmState;
use swarm_topology::{Adjustment, TopologyManager, TopologyMetrics};

use crate::hints::{AllocationHint, allocation_hints};

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub interval: Duration,
    pub load_balancing: bool,
    pub load_variance_threshold: f64,
    pub topology_efficiency_threshold: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            load_balancing: true,
            load_variance_threshold: 0.3,
            topology_efficiency_threshold: 0.8,
        }
    }
}

impl OptimizerConfig {
    pub fn from_config(config: &SwarmConfig) -> ConfigResult<Self> {
        Ok(Self {
            interval: config.optimization_interval()?,
            load_balancing: config.performance.load_balancing,
            load_variance_threshold: config.performance.load_variance_threshold,
            topology_efficiency_threshold: config.performance.topology_efficiency_threshold,
        })
    }
}

/// What a pass measured before acting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Standard deviation of active node load.
    pub load_variance: f64,
    /// Graph connectivity.
    pub topology_efficiency: f64,
    pub rebalance_needed: bool,
    pub adjust_needed: bool,
}

/// Everything one pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub at_ms: u64,
    pub load_variance_before: f64,
    pub load_variance_after: f64,
    pub topology_efficiency_before: f64,
    pub topology_efficiency_after: f64,
    pub moves: Vec<Move>,
    pub adjustment: Adjustment,
    pub hints: Vec<AllocationHint>,
    /// Pending tasks that were offered to the scheduler again.
    pub rescheduled: Vec<TaskId>,
    /// Undelivered assignments, moved tasks included, that reached their
    /// nodes during the pass.
    pub redelivered: Vec<TaskId>,
}

impl OptimizationReport {
    pub fn changed_anything(&self) -> bool {
        !self.moves.is_empty()
            || !self.adjustment.is_empty()
            || !self.rescheduled.is_empty()
            || !self.redelivered.is_empty()
    }
}

pub struct SwarmOptimizer {
    config: OptimizerConfig,
}

impl SwarmOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn analyze(&self, state: &SwarmState) -> Analysis {
        let load_variance = load_deviation(state);
        let topology_efficiency = TopologyMetrics::compute(&state.nodes).connectivity;
        Analysis {
            load_variance,
            topology_efficiency,
            rebalance_needed: self.config.load_balancing
                && load_variance > self.config.load_variance_threshold,
            adjust_needed: topology_efficiency < self.config.topology_efficiency_threshold,
        }
    }

    /// Measure, fix what crossed a threshold, and refresh hints.
    pub fn optimize(
        &self,
        state: &mut SwarmState,
        topology: &TopologyManager,
        scheduler: &TaskScheduler,
        now_ms: u64,
    ) -> OptimizationReport {
        let analysis = self.analyze(state);
        debug!(
            load_variance = analysis.load_variance,
            topology_efficiency = analysis.topology_efficiency,
            "optimization analysis"
        );

        let mut report = OptimizationReport {
            at_ms: now_ms,
            load_variance_before: analysis.load_variance,
            topology_efficiency_before: analysis.topology_efficiency,
            ..OptimizationReport::default()
        };

        if analysis.adjust_needed {
            report.adjustment =
                topology.adjust(&mut state.nodes, self.config.topology_efficiency_threshold);
        }
        if analysis.rebalance_needed {
            report.moves = scheduler.rebalance(state, now_ms);
        }
        report.hints = allocation_hints(state);

        let after = self.analyze(state);
        report.load_variance_after = after.load_variance;
        report.topology_efficiency_after = after.topology_efficiency;

        if !report.moves.is_empty() || !report.adjustment.is_empty() {
            info!(
                moves = report.moves.len(),
                load_variance = report.load_variance_after,
                topology_efficiency = report.topology_efficiency_after,
                "swarm optimized"
            );
        }
        report
    }
}
