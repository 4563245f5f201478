//! Targeting graph error types

use common::types::{EdgeId, ListingId};
use thiserror::Error;

/// Errors that can occur in the targeting graph store
#[derive(Error, Debug)]
pub enum TargetingError {
    /// A listing tried to target itself
    #[error("Listing {0} cannot target itself")]
    SelfTarget(ListingId),

    /// Creating the edge would close a cycle of active edges
    #[error("Targeting {target} from {origin} would create a cycle")]
    Cycle {
        origin: ListingId,
        target: ListingId,
    },

    /// The target is exclusive and already has an active incoming edge
    #[error("Listing {0} is already targeted by another listing")]
    AlreadyTargeted(ListingId),

    /// Edge not found
    #[error("Target edge not found: {0}")]
    EdgeNotFound(EdgeId),

    /// The edge already left the state the transition requires
    #[error("Stale state: {0}")]
    StaleState(String),

    /// Storage error (transport/transaction failure, retryable by the caller)
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Result type for targeting operations
pub type Result<T> = std::result::Result<T, TargetingError>;
