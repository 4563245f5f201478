//! Listing store error types

use common::types::{ListingId, ReservationId};
use thiserror::Error;

/// Errors that can occur in the listing and reservation stores
#[derive(Error, Debug)]
pub enum ListingError {
    /// Listing not found
    #[error("Listing not found: {0}")]
    NotFound(ListingId),

    /// Reservation not found
    #[error("Reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    /// Invalid state transition
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Storage error (transport/transaction failure, retryable by the caller)
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Result type for listing operations
pub type Result<T> = std::result::Result<T, ListingError>;
