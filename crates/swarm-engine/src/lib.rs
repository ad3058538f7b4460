//! swarm-engine: the swarm coordination engine.
//!
//! Wires the topology manager, fault detector, scheduler, consensus
//! coordinator, optimizer and metrics aggregator into one in-process API,
//! publishes a typed event stream, and runs the two background loops.
//!
//! # Architecture
//!
//! ```text
//! SwarmEngine (Arc<Shared>, cheap to clone)
//!   ├── RwLock<SwarmState>           nodes + tasks, single writer
//!   ├── Mutex<ConsensusCoordinator>  taken after state, never before
//!   ├── TopologyManager / FaultDetector / TaskScheduler / SwarmOptimizer
//!   ├── DeliveryChannel              assignments → node processes
//!   ├── broadcast::Sender<SwarmEvent>
//!   └── background loops (watch shutdown)
//!         ├── HeartbeatMonitor   every heartbeat_interval → sweep
//!         └── OptimizationLoop   every optimization_interval → optimize
//!
//! submit_task ─▶ plan (state write) ─▶ ratify (state released) ─▶ apply ─▶ dispatch
//! ```
//!
//! Gated changes are ratified before they are applied. In strict
//! deployments an aborted proposal rejects the change; otherwise the
//! change is applied anyway and the abort is logged.

pub mod delivery;
pub mod engine;
pub mod error;
pub mod events;

pub use delivery::{AssignmentPayload, DeliveryChannel, DeliveryError, DeliveryFuture, LogDelivery};
pub use engine::{EngineBuilder, SwarmEngine};
pub use error::{SwarmError, SwarmResult};
pub use events::{EVENT_CAPACITY, SwarmEvent};
