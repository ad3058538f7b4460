//! swarm-scheduler: assigns tasks to nodes.
//!
//! Every scheduling decision is a two-step affair: `plan` reads the state
//! and picks nodes, `apply` commits the decision. The split lets the engine
//! ratify an assignment through consensus between the two with its state
//! lock released; `apply` re-checks every chosen node before reserving.
//!
//! # Pipeline
//!
//! ```text
//! pending task
//!   → filter::check        (active, capabilities, resources, quality,
//!                            clearance, slots, location, anti-affinity)
//!   → scorer::rank         (0.3 reliability + 0.2 (1 - error rate)
//!                            + 0.3 free slots + 0.2 free cpu/memory)
//!   → top `replicas` nodes → Decision::Assign
//!   → apply                (reserve, mark scheduled)
//! ```
//!
//! The scheduler also owns the task lifecycle after assignment (start,
//! complete, cancel, progress), returns tasks of lost nodes to the queue,
//! and computes the load-rebalancing moves the optimizer asks for.

pub mod error;
pub mod filter;
pub mod rebalance;
pub mod scheduler;
pub mod scorer;

pub use error::{SchedulerError, SchedulerResult};
pub use filter::Rejection;
pub use rebalance::{Move, load_deviation, node_loads};
pub use scheduler::{Decision, SchedulerConfig, TaskScheduler};
pub use scorer::{NodeScore, ScoreBreakdown, ScoringWeights};
