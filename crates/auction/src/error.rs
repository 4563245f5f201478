//! Auction engine error types

use common::types::{AuctionId, ListingId, ProposalId};
use thiserror::Error;

/// Errors that can occur in the auction engine
#[derive(Error, Debug)]
pub enum AuctionError {
    /// The listing cannot carry an auction
    #[error("Listing {listing_id} is not eligible for an auction: {reason}")]
    NotEligible {
        listing_id: ListingId,
        reason: String,
    },

    /// The auction no longer accepts proposals
    #[error("Auction {0} is closed")]
    AuctionClosed(AuctionId),

    /// The auction reached its proposal cap
    #[error("Auction {0} reached its proposal limit")]
    ProposalLimitReached(AuctionId),

    /// A cash payload failed validation
    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    /// Concurrent conflict on a terminal-state transition; re-read and retry
    #[error("Stale state: {0}")]
    StaleState(String),

    /// Auction not found
    #[error("Auction not found: {0}")]
    AuctionNotFound(AuctionId),

    /// Proposal not found
    #[error("Proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    /// Storage error (transport/transaction failure, retryable by the caller)
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Result type for auction operations
pub type Result<T> = std::result::Result<T, AuctionError>;
