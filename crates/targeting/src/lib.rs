//! Targeting graph store and history log for OpenSwap
//!
//! This crate owns the directed "listing A wants to exchange with listing B"
//! edges, the append-only history of their lifecycle transitions, and the
//! structural invariants over the graph:
//!
//! - no self-loops
//! - no cycles through active edges (bounded-depth check)
//! - at most one active outgoing edge per source listing
//! - at most one active incoming edge for an exclusive (first-match) target
//!
//! All mutations are transactional; an edge write and its history entry
//! either both land or neither does.

pub mod cycle;
pub mod error;
pub mod store;
pub mod types;

pub use cycle::{path_exists, OutgoingEdges};
pub use error::{Result, TargetingError};
pub use store::traits::{IncomingPolicy, TargetStore};
pub use types::{EdgeStatus, HistoryAction, HistoryEntry, TargetEdge};
