//! swarm-state: in-memory store for swarm nodes and tasks.
//!
//! Nodes and tasks live in arenas (id → slot) owned by a single
//! `SwarmState`. Nothing outside the engine holds a reference into the
//! arenas; readers receive clones.
//!
//! # Architecture
//!
//! ```text
//! SwarmState
//!   ├── Arena<Node>   slot vector + id index, insertion ordered
//!   └── Arena<Task>   slot vector + id index, insertion ordered
//! ```
//!
//! Slot order doubles as insertion order, which the topology manager and
//! scheduler use to break ties deterministically.

pub mod arena;
pub mod error;
pub mod store;

pub use arena::{Arena, Keyed};
pub use error::{StateError, StateResult};
pub use store::SwarmState;
