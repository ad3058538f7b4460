//! swarm-topology: the node graph of a swarm.
//!
//! Decides how nodes relate to each other. Hierarchical swarms form a
//! forest of parent/child links bounded by fanout and depth, mesh swarms
//! connect each node to its least-connected peers, and hybrid swarms do
//! both. Parent/child links are also recorded as symmetric connections so
//! that connectivity is measured the same way for every kind.
//!
//! # Components
//!
//! - **`manager`**: placement on add, rewiring on remove
//! - **`metrics`**: depth, fanout, connectivity, redundancy
//! - **`adjust`**: the optimization pass that improves a degraded graph

pub mod adjust;
pub mod manager;
pub mod metrics;

pub use adjust::Adjustment;
pub use manager::{Placement, Removal, TopologyManager};
pub use metrics::TopologyMetrics;
