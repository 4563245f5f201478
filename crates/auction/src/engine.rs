//! Core auction engine
//!
//! Validates proposal submission, drives winner selection through the
//! store's transactional API, and closes expired auctions.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use common::types::{AcceptanceStrategy, AuctionId, ListingId, ProposalId, UserId};

use crate::error::{AuctionError, Result};
use crate::ranking::ProposalRanking;
use crate::store::traits::{AuctionStore, SelectionOutcome};
use crate::types::{Auction, AuctionProposal, AuctionSettings, ProposalKind, ProposalStatus};

/// Result of closing one expired auction
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    /// The auction that was closed
    pub auction: Auction,
    /// The winner the ranking picked, when any proposal was pending
    pub winner: Option<AuctionProposal>,
    /// Proposals rejected by the close
    pub rejected: Vec<AuctionProposal>,
}

/// Auction engine
pub struct AuctionEngine {
    store: Arc<dyn AuctionStore>,
    ranking: Arc<dyn ProposalRanking>,
    default_max_proposals: u32,
}

impl AuctionEngine {
    /// Create a new auction engine
    pub fn new(
        store: Arc<dyn AuctionStore>,
        ranking: Arc<dyn ProposalRanking>,
        default_max_proposals: u32,
    ) -> Self {
        Self {
            store,
            ranking,
            default_max_proposals,
        }
    }

    /// Read access to the underlying store
    pub fn store(&self) -> &Arc<dyn AuctionStore> {
        &self.store
    }

    /// Open an auction on a listing
    ///
    /// The listing must be in auction mode and must not already carry an
    /// active auction; the end date must be in the future.
    pub async fn create_auction(
        &self,
        listing_id: ListingId,
        strategy: AcceptanceStrategy,
        settings: AuctionSettings,
    ) -> Result<Auction> {
        if strategy != AcceptanceStrategy::Auction {
            return Err(AuctionError::NotEligible {
                listing_id,
                reason: format!("acceptance strategy is {}", strategy),
            });
        }
        if settings.ends_at <= Utc::now() {
            return Err(AuctionError::NotEligible {
                listing_id,
                reason: "end date is in the past".to_string(),
            });
        }
        if self.store.find_active_for_listing(listing_id).await?.is_some() {
            return Err(AuctionError::NotEligible {
                listing_id,
                reason: "listing already has an active auction".to_string(),
            });
        }

        let auction = self.store.create(Auction::new(listing_id, settings)).await?;
        info!(
            auction_id = %auction.auction_id,
            %listing_id,
            ends_at = %settings.ends_at,
            "Auction created"
        );
        Ok(auction)
    }

    /// Submit a proposal against an auction
    pub async fn submit_proposal(
        &self,
        auction_id: AuctionId,
        proposer_id: UserId,
        kind: ProposalKind,
        message: Option<String>,
        conditions: Option<String>,
    ) -> Result<AuctionProposal> {
        let auction = self
            .store
            .get(auction_id)
            .await?
            .ok_or(AuctionError::AuctionNotFound(auction_id))?;

        let now = Utc::now();
        if !auction.is_open(now) {
            return Err(AuctionError::AuctionClosed(auction_id));
        }

        if let ProposalKind::Cash { offer } = &kind {
            if !offer.is_valid_offer() {
                return Err(AuctionError::InvalidProposal(format!(
                    "cash offer must be positive with a currency, got {}",
                    offer
                )));
            }
        }

        let cap = auction
            .settings
            .max_proposals
            .unwrap_or(self.default_max_proposals);
        if self.store.count_pending(auction_id).await? >= cap as u64 {
            return Err(AuctionError::ProposalLimitReached(auction_id));
        }

        let mut proposal = AuctionProposal::new(auction_id, proposer_id, kind);
        proposal.message = message;
        proposal.conditions = conditions;

        let proposal = self.store.add_proposal(proposal).await?;
        info!(
            %auction_id,
            proposal_id = %proposal.proposal_id,
            proposer = %proposer_id,
            "Proposal submitted"
        );
        Ok(proposal)
    }

    /// Select a winner explicitly
    ///
    /// One transaction: auction ended, winner selected, every other
    /// still-pending proposal rejected. A stale selection (already ended,
    /// proposal no longer pending) raises `StaleState`; callers re-read
    /// and retry.
    pub async fn select_winner(
        &self,
        auction_id: AuctionId,
        proposal_id: ProposalId,
    ) -> Result<SelectionOutcome> {
        self.store
            .select_winner(auction_id, proposal_id, Utc::now())
            .await
    }

    /// End an auction that has no proposals worth selecting
    pub async fn end_without_winner(&self, auction_id: AuctionId) -> Result<Auction> {
        self.store.end_without_winner(auction_id, Utc::now()).await
    }

    /// Active auctions past their end date
    pub async fn find_expired(&self, limit: u32) -> Result<Vec<Auction>> {
        self.store.find_expired(Utc::now(), limit).await
    }

    /// Close every expired auction
    ///
    /// Picks the best-ranked pending proposal per auction, or ends the
    /// auction without a winner when none is pending. Safe to run from
    /// several workers at once: a `StaleState` from a row another worker
    /// already processed is skipped, everything else propagates.
    pub async fn close_expired(&self, limit: u32) -> Result<Vec<SweepOutcome>> {
        let mut outcomes = Vec::new();

        for auction in self.find_expired(limit).await? {
            let proposals = self.store.proposals_for(auction.auction_id).await?;
            let pending: Vec<AuctionProposal> = proposals
                .into_iter()
                .filter(|p| p.status == ProposalStatus::Pending)
                .collect();

            let result = match self.ranking.best(&pending) {
                Some(best) => self
                    .store
                    .select_winner(auction.auction_id, best.proposal_id, Utc::now())
                    .await
                    .map(|outcome| SweepOutcome {
                        auction: outcome.auction,
                        winner: Some(outcome.winner),
                        rejected: outcome.rejected,
                    }),
                None => self
                    .store
                    .end_without_winner(auction.auction_id, Utc::now())
                    .await
                    .map(|auction| SweepOutcome {
                        auction,
                        winner: None,
                        rejected: Vec::new(),
                    }),
            };

            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(AuctionError::StaleState(reason)) => {
                    warn!(auction_id = %auction.auction_id, reason, "Sweep skipped stale auction");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::HighestOfferRanking;
    use crate::store::memory::InMemoryAuctionStore;
    use crate::types::AuctionStatus;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use common::types::Money;

    fn engine() -> (Arc<InMemoryAuctionStore>, AuctionEngine) {
        let store = Arc::new(InMemoryAuctionStore::new());
        let engine = AuctionEngine::new(store.clone(), Arc::new(HighestOfferRanking), 10);
        (store, engine)
    }

    fn settings_ending_in(duration: Duration) -> AuctionSettings {
        AuctionSettings {
            ends_at: Utc::now() + duration,
            max_proposals: Some(5),
        }
    }

    fn cash(amount: i64) -> ProposalKind {
        ProposalKind::Cash {
            offer: Money::new(amount, "EUR"),
        }
    }

    #[tokio::test]
    async fn test_create_auction_requires_auction_strategy() {
        let (_, engine) = engine();
        let err = engine
            .create_auction(
                ListingId::new(),
                AcceptanceStrategy::FirstMatch,
                settings_ending_in(Duration::days(3)),
            )
            .await
            .unwrap_err();
        assert_matches!(err, AuctionError::NotEligible { .. });
    }

    #[tokio::test]
    async fn test_create_auction_rejects_duplicate() {
        let (_, engine) = engine();
        let listing = ListingId::new();

        engine
            .create_auction(
                listing,
                AcceptanceStrategy::Auction,
                settings_ending_in(Duration::days(3)),
            )
            .await
            .unwrap();
        let err = engine
            .create_auction(
                listing,
                AcceptanceStrategy::Auction,
                settings_ending_in(Duration::days(3)),
            )
            .await
            .unwrap_err();
        assert_matches!(err, AuctionError::NotEligible { .. });
    }

    #[tokio::test]
    async fn test_submit_to_expired_auction_is_closed() {
        let (store, engine) = engine();
        // Insert directly; create_auction refuses past end dates
        let auction = store
            .create(Auction::new(
                ListingId::new(),
                AuctionSettings {
                    ends_at: Utc::now() - Duration::hours(1),
                    max_proposals: None,
                },
            ))
            .await
            .unwrap();

        let err = engine
            .submit_proposal(auction.auction_id, UserId::new(), cash(1000), None, None)
            .await
            .unwrap_err();
        assert_matches!(err, AuctionError::AuctionClosed(_));
    }

    #[tokio::test]
    async fn test_cash_validation() {
        let (_, engine) = engine();
        let auction = engine
            .create_auction(
                ListingId::new(),
                AcceptanceStrategy::Auction,
                settings_ending_in(Duration::days(1)),
            )
            .await
            .unwrap();

        let err = engine
            .submit_proposal(auction.auction_id, UserId::new(), cash(0), None, None)
            .await
            .unwrap_err();
        assert_matches!(err, AuctionError::InvalidProposal(_));

        let err = engine
            .submit_proposal(
                auction.auction_id,
                UserId::new(),
                ProposalKind::Cash {
                    offer: Money::new(100, ""),
                },
                None,
                None,
            )
            .await
            .unwrap_err();
        assert_matches!(err, AuctionError::InvalidProposal(_));
    }

    #[tokio::test]
    async fn test_proposal_cap() {
        let (_, engine) = engine();
        let auction = engine
            .create_auction(
                ListingId::new(),
                AcceptanceStrategy::Auction,
                AuctionSettings {
                    ends_at: Utc::now() + Duration::days(1),
                    max_proposals: Some(2),
                },
            )
            .await
            .unwrap();

        for amount in [100, 200] {
            engine
                .submit_proposal(auction.auction_id, UserId::new(), cash(amount), None, None)
                .await
                .unwrap();
        }
        let err = engine
            .submit_proposal(auction.auction_id, UserId::new(), cash(300), None, None)
            .await
            .unwrap_err();
        assert_matches!(err, AuctionError::ProposalLimitReached(_));
    }

    #[tokio::test]
    async fn test_close_expired_selects_best_offer() {
        let (store, engine) = engine();
        let auction = store
            .create(Auction::new(
                ListingId::new(),
                AuctionSettings {
                    ends_at: Utc::now() - Duration::minutes(5),
                    max_proposals: None,
                },
            ))
            .await
            .unwrap();

        for amount in [5000, 20000, 12000] {
            store
                .add_proposal(AuctionProposal::new(
                    auction.auction_id,
                    UserId::new(),
                    cash(amount),
                ))
                .await
                .unwrap();
        }

        let outcomes = engine.close_expired(100).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        let winner = outcomes[0].winner.as_ref().unwrap();
        assert_eq!(winner.kind.cash_amount(), 20000);
        assert_eq!(outcomes[0].rejected.len(), 2);

        // Second sweep pass finds nothing to do
        let outcomes = engine.close_expired(100).await.unwrap();
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_close_expired_without_proposals() {
        let (store, engine) = engine();
        let auction = store
            .create(Auction::new(
                ListingId::new(),
                AuctionSettings {
                    ends_at: Utc::now() - Duration::minutes(5),
                    max_proposals: None,
                },
            ))
            .await
            .unwrap();

        let outcomes = engine.close_expired(100).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].winner.is_none());
        assert_eq!(outcomes[0].auction.status, AuctionStatus::Ended);
        assert_eq!(outcomes[0].auction.auction_id, auction.auction_id);
    }

    #[tokio::test]
    async fn test_explicit_selection_then_reselect_is_stale() {
        let (_, engine) = engine();
        let auction = engine
            .create_auction(
                ListingId::new(),
                AcceptanceStrategy::Auction,
                settings_ending_in(Duration::days(1)),
            )
            .await
            .unwrap();

        let p1 = engine
            .submit_proposal(auction.auction_id, UserId::new(), cash(100), None, None)
            .await
            .unwrap();
        let p2 = engine
            .submit_proposal(auction.auction_id, UserId::new(), cash(200), None, None)
            .await
            .unwrap();

        let outcome = engine
            .select_winner(auction.auction_id, p1.proposal_id)
            .await
            .unwrap();
        assert_eq!(outcome.winner.proposal_id, p1.proposal_id);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].proposal_id, p2.proposal_id);

        let err = engine
            .select_winner(auction.auction_id, p2.proposal_id)
            .await
            .unwrap_err();
        assert_matches!(err, AuctionError::StaleState(_));
    }
}
