//! AuctionStore trait definition

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use common::types::{AuctionId, ListingId, ProposalId};

use crate::error::Result;
use crate::types::{Auction, AuctionProposal};

/// Result of a winner selection
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    /// The ended auction
    pub auction: Auction,
    /// The selected proposal
    pub winner: AuctionProposal,
    /// Every other formerly-pending proposal, now rejected
    pub rejected: Vec<AuctionProposal>,
}

/// AuctionStore trait - transactional interface to the bid ledger
#[async_trait]
pub trait AuctionStore: Send + Sync {
    /// Create an auction
    async fn create(&self, auction: Auction) -> Result<Auction>;

    /// Get an auction by ID
    async fn get(&self, auction_id: AuctionId) -> Result<Option<Auction>>;

    /// Update an existing auction
    async fn update(&self, auction: &Auction) -> Result<()>;

    /// The active auction on a listing, if one exists
    async fn find_active_for_listing(&self, listing_id: ListingId) -> Result<Option<Auction>>;

    /// Insert a proposal
    async fn add_proposal(&self, proposal: AuctionProposal) -> Result<AuctionProposal>;

    /// Get a proposal by ID
    async fn get_proposal(&self, proposal_id: ProposalId) -> Result<Option<AuctionProposal>>;

    /// All proposals on an auction, oldest first
    async fn proposals_for(&self, auction_id: AuctionId) -> Result<Vec<AuctionProposal>>;

    /// Number of still-pending proposals on an auction
    async fn count_pending(&self, auction_id: AuctionId) -> Result<u64>;

    /// End the auction with a winner, in one transaction
    ///
    /// Sets the auction to ended with `winning_proposal_id`, the winner to
    /// selected, and every other still-pending proposal to rejected. All
    /// three succeed or none do. Fails with `StaleState` when the auction
    /// already ended or the proposal already left pending.
    async fn select_winner(
        &self,
        auction_id: AuctionId,
        proposal_id: ProposalId,
        ended_at: DateTime<Utc>,
    ) -> Result<SelectionOutcome>;

    /// End the auction without a winner
    ///
    /// Fails with `StaleState` when the auction already ended, which is what
    /// makes the expiry sweep idempotent.
    async fn end_without_winner(
        &self,
        auction_id: AuctionId,
        ended_at: DateTime<Utc>,
    ) -> Result<Auction>;

    /// Active auctions whose end date has passed as of `as_of`
    async fn find_expired(&self, as_of: DateTime<Utc>, limit: u32) -> Result<Vec<Auction>>;
}
