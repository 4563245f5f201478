//! Eligibility resolver error types

use common::types::ListingId;
use thiserror::Error;

/// Errors that can occur while resolving eligibility or compatibility
#[derive(Error, Debug)]
pub enum EligibilityError {
    /// Listing not found
    #[error("Listing not found: {0}")]
    ListingNotFound(ListingId),

    /// Listing store error
    #[error(transparent)]
    Listing(#[from] listings::ListingError),

    /// Targeting store error
    #[error(transparent)]
    Targeting(#[from] targeting::TargetingError),

    /// Storage error (transport failure, retryable by the caller)
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Result type for eligibility operations
pub type Result<T> = std::result::Result<T, EligibilityError>;
