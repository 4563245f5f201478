//! In-memory auction store
//!
//! One `RwLock` over the whole ledger; winner selection holds the write
//! guard across its read-then-write span, matching the isolation the
//! Postgres backend gets from a database transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

use common::types::{AuctionId, ListingId, ProposalId};

use crate::error::{AuctionError, Result};
use crate::store::traits::{AuctionStore, SelectionOutcome};
use crate::types::{Auction, AuctionProposal, AuctionStatus, ProposalStatus};

#[derive(Default)]
struct LedgerState {
    auctions: HashMap<AuctionId, Auction>,
    proposals: HashMap<ProposalId, AuctionProposal>,
}

/// In-memory auction store for testing and development
pub struct InMemoryAuctionStore {
    state: RwLock<LedgerState>,
}

impl InMemoryAuctionStore {
    /// Create a new in-memory auction store
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
        }
    }
}

impl Default for InMemoryAuctionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuctionStore for InMemoryAuctionStore {
    async fn create(&self, auction: Auction) -> Result<Auction> {
        let mut state = self.state.write().unwrap();
        state.auctions.insert(auction.auction_id, auction.clone());
        Ok(auction)
    }

    async fn get(&self, auction_id: AuctionId) -> Result<Option<Auction>> {
        let state = self.state.read().unwrap();
        Ok(state.auctions.get(&auction_id).cloned())
    }

    async fn update(&self, auction: &Auction) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.auctions.contains_key(&auction.auction_id) {
            state.auctions.insert(auction.auction_id, auction.clone());
            Ok(())
        } else {
            Err(AuctionError::AuctionNotFound(auction.auction_id))
        }
    }

    async fn find_active_for_listing(&self, listing_id: ListingId) -> Result<Option<Auction>> {
        let state = self.state.read().unwrap();
        Ok(state
            .auctions
            .values()
            .find(|a| a.listing_id == listing_id && a.status == AuctionStatus::Active)
            .cloned())
    }

    async fn add_proposal(&self, proposal: AuctionProposal) -> Result<AuctionProposal> {
        let mut state = self.state.write().unwrap();
        if !state.auctions.contains_key(&proposal.auction_id) {
            return Err(AuctionError::AuctionNotFound(proposal.auction_id));
        }
        state.proposals.insert(proposal.proposal_id, proposal.clone());
        Ok(proposal)
    }

    async fn get_proposal(&self, proposal_id: ProposalId) -> Result<Option<AuctionProposal>> {
        let state = self.state.read().unwrap();
        Ok(state.proposals.get(&proposal_id).cloned())
    }

    async fn proposals_for(&self, auction_id: AuctionId) -> Result<Vec<AuctionProposal>> {
        let state = self.state.read().unwrap();
        let mut proposals: Vec<AuctionProposal> = state
            .proposals
            .values()
            .filter(|p| p.auction_id == auction_id)
            .cloned()
            .collect();
        proposals.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(proposals)
    }

    async fn count_pending(&self, auction_id: AuctionId) -> Result<u64> {
        let state = self.state.read().unwrap();
        Ok(state
            .proposals
            .values()
            .filter(|p| p.auction_id == auction_id && p.status == ProposalStatus::Pending)
            .count() as u64)
    }

    async fn select_winner(
        &self,
        auction_id: AuctionId,
        proposal_id: ProposalId,
        ended_at: DateTime<Utc>,
    ) -> Result<SelectionOutcome> {
        // One guard spans the whole selection
        let mut state = self.state.write().unwrap();

        let auction = state
            .auctions
            .get(&auction_id)
            .ok_or(AuctionError::AuctionNotFound(auction_id))?;
        if auction.status == AuctionStatus::Ended {
            return Err(AuctionError::StaleState(format!(
                "auction {} already ended",
                auction_id
            )));
        }

        let proposal = state
            .proposals
            .get(&proposal_id)
            .ok_or(AuctionError::ProposalNotFound(proposal_id))?;
        if proposal.auction_id != auction_id {
            return Err(AuctionError::StaleState(format!(
                "proposal {} does not belong to auction {}",
                proposal_id, auction_id
            )));
        }
        if proposal.status.is_terminal() {
            return Err(AuctionError::StaleState(format!(
                "proposal {} is already {}",
                proposal_id, proposal.status
            )));
        }

        // All checks passed; apply the three-part transition
        let auction = state.auctions.get_mut(&auction_id).expect("checked above");
        auction.status = AuctionStatus::Ended;
        auction.winning_proposal_id = Some(proposal_id);
        auction.ended_at = Some(ended_at);
        auction.updated_at = ended_at;
        let auction = auction.clone();

        let mut rejected = Vec::new();
        for p in state.proposals.values_mut() {
            if p.auction_id != auction_id || p.proposal_id == proposal_id {
                continue;
            }
            if p.status == ProposalStatus::Pending {
                p.status = ProposalStatus::Rejected;
                rejected.push(p.clone());
            }
        }

        let winner = state.proposals.get_mut(&proposal_id).expect("checked above");
        winner.status = ProposalStatus::Selected;
        let winner = winner.clone();

        info!(
            %auction_id,
            winner = %proposal_id,
            rejected = rejected.len(),
            "Auction winner selected"
        );
        Ok(SelectionOutcome {
            auction,
            winner,
            rejected,
        })
    }

    async fn end_without_winner(
        &self,
        auction_id: AuctionId,
        ended_at: DateTime<Utc>,
    ) -> Result<Auction> {
        let mut state = self.state.write().unwrap();

        let auction = state
            .auctions
            .get_mut(&auction_id)
            .ok_or(AuctionError::AuctionNotFound(auction_id))?;
        if auction.status == AuctionStatus::Ended {
            return Err(AuctionError::StaleState(format!(
                "auction {} already ended",
                auction_id
            )));
        }

        auction.status = AuctionStatus::Ended;
        auction.ended_at = Some(ended_at);
        auction.updated_at = ended_at;

        info!(%auction_id, "Auction ended without winner");
        Ok(auction.clone())
    }

    async fn find_expired(&self, as_of: DateTime<Utc>, limit: u32) -> Result<Vec<Auction>> {
        let state = self.state.read().unwrap();
        let mut expired: Vec<Auction> = state
            .auctions
            .values()
            .filter(|a| a.is_expiry_due(as_of))
            .cloned()
            .collect();
        expired.sort_by(|a, b| a.settings.ends_at.cmp(&b.settings.ends_at));
        expired.truncate(limit as usize);
        Ok(expired)
    }
}
