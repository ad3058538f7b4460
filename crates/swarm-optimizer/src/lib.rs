//! swarm-optimizer: periodic tuning of a running swarm.
//!
//! Each pass measures two things: the spread of task load across active
//! nodes (population standard deviation of `active / max`) and topology
//! efficiency (graph connectivity). Either crossing its threshold triggers
//! the matching fix: rebalancing moves from the scheduler, or the topology
//! manager's adjustment pass. Allocation hints are refreshed every pass.
//!
//! # Architecture
//!
//! ```text
//! OptimizationLoop (background)
//!   └── every optimization_interval → PassCallback
//!         └── SwarmOptimizer::optimize(state, topology, scheduler)
//!               ├── analyze          → load_variance, topology_efficiency
//!               ├── adjust topology  (efficiency < threshold)
//!               ├── rebalance        (variance > threshold, load balancing on)
//!               └── allocation hints
//! ```

pub mod hints;
pub mod optimizer;
pub mod runner;

pub use hints::{AllocationHint, allocation_hints};
pub use optimizer::{Analysis, OptimizationReport, OptimizerConfig, SwarmOptimizer};
pub use runner::{OptimizationLoop, PassCallback};
