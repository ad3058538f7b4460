//! swarm-core: shared value types for the swarm coordination engine.
//!
//! Holds the node and task data model, the resource & capability model,
//! the `swarm.toml` configuration, and the clock abstraction every other
//! crate reads time from. Types here carry data and validation only;
//! behavior lives in the crates that own each concern.

pub mod clock;
pub mod config;
pub mod error;
pub mod node;
pub mod resources;
pub mod task;

pub use clock::{Clock, IdGenerator, ManualClock, SystemClock};
pub use config::{
    AccessControl, ConsensusAlgorithm, ConsensusConfig, FaultToleranceConfig, PerformanceConfig,
    RecoveryStrategy, SecurityConfig, SwarmConfig, TopologyKind, TrustModel, parse_duration,
};
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationResult};
pub use node::*;
pub use resources::*;
pub use task::*;
