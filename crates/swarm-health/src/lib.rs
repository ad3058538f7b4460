//! swarm-health: fault detection for swarm nodes.
//!
//! Nodes prove liveness by heartbeating. The detector turns heartbeat age
//! and error rate into a health score and drives the node state machine;
//! the monitor runs the sweep on a fixed interval until shutdown.
//!
//! # Architecture
//!
//! ```text
//! HeartbeatMonitor (background loop)
//!   └── every heartbeat_interval → SweepCallback
//!         └── FaultDetector::sweep(nodes, now)
//!               ├── silent > timeout      → failed    (one NodeFailure)
//!               ├── health < threshold    → degraded
//!               └── health recovered      → active
//!
//! FaultDetector::record_heartbeat(node, now)
//!   └── failed | degraded | initializing → active (NodeRecovery from failed)
//! ```
//!
//! Failure is level-triggered: a node that is already failed produces no
//! further transition until it heartbeats again.

pub mod detector;
pub mod monitor;

pub use detector::{FaultDetector, Transition};
pub use monitor::{HeartbeatMonitor, SweepCallback};
