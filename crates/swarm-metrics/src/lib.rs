//! swarm-metrics: swarm-wide statistics derived on demand.
//!
//! Aggregation is a pure read of one consistent snapshot: the node and task
//! arenas plus the consensus coordinator's running totals. Nothing here reads
//! the clock, so two calls without an intervening mutation agree exactly.
//!
//! # Architecture
//!
//! ```text
//! aggregate(state, consensus_stats) → SwarmMetrics
//!   ├── counts            nodes, active nodes, tasks by outcome
//!   ├── timing            mean response time, summed throughput
//!   ├── utilization       cpu / memory / storage / network: avg, max, min
//!   ├── topology          TopologyMetrics + efficiency
//!   └── consensus         mean round time, rounds, success, participation
//!
//! Prometheus exposition
//!   └── render_prometheus(&SwarmMetrics) → text/plain
//! ```

pub mod aggregate;
pub mod prometheus;

pub use aggregate::{
    ConsensusSummary, ResourceUtilization, SwarmMetrics, TopologySummary, UtilizationStats,
    aggregate,
};
pub use prometheus::render_prometheus;
