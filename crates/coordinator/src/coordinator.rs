//! Matching coordinator - the unit callers interact with
//!
//! Wires the eligibility resolver in front of the targeting graph, keeps
//! the auction bid ledger in sync with the graph for auction-mode targets,
//! and drives the background sweeps.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use auction::{
    Auction, AuctionEngine, AuctionProposal, AuctionSettings, AuctionStore, HighestOfferRanking,
    ProposalKind, ProposalRanking, SelectionOutcome, SweepOutcome,
};
use common::types::{
    AcceptanceStrategy, AuctionId, EdgeId, ListingId, ProposalId, UserId, UserSummary,
};
use config::EngineConfig;
use eligibility::{
    AuctionSchedule, AuctionWindow, Compatibility, CompatibilityCache, CompatibilityScorer,
    DefaultScorer, EligibilityReport, EligibilityResolver, InMemoryCompatibilityCache,
};
use listings::{owner_of, Listing, ListingError, ListingStore, ReservationStore};
use targeting::{IncomingPolicy, TargetEdge, TargetStore, TargetingError};

use crate::error::{EngineError, Result};
use crate::events::{EngineEvent, EventSink, NullEventSink};
use crate::ports::{
    InMemorySettlementLedger, NoopNotifier, NoopUserDirectory, Notifier, SettlementEntity,
    SettlementLedger, UserDirectory,
};

/// External collaborators injected into the coordinator
pub struct Collaborators {
    /// Notification dispatch (fire-and-forget)
    pub notifier: Arc<dyn Notifier>,
    /// External settlement reference writer
    pub settlement: Arc<dyn SettlementLedger>,
    /// User display lookup
    pub users: Arc<dyn UserDirectory>,
    /// Engine event sink
    pub events: Arc<dyn EventSink>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            notifier: Arc::new(NoopNotifier),
            settlement: Arc::new(InMemorySettlementLedger::new()),
            users: Arc::new(NoopUserDirectory),
            events: Arc::new(NullEventSink),
        }
    }
}

/// Result of a propose call
#[derive(Debug, Clone)]
pub struct ProposeOutcome {
    /// The created edge
    pub edge: TargetEdge,
    /// The booking bid mirrored into the auction lane, for auction-mode
    /// targets
    pub proposal: Option<AuctionProposal>,
}

/// Exposes auction end times and caps to the eligibility resolver
struct StoreSchedule {
    auctions: Arc<dyn AuctionStore>,
}

#[async_trait]
impl AuctionSchedule for StoreSchedule {
    async fn window_for(
        &self,
        listing_id: ListingId,
    ) -> eligibility::Result<Option<AuctionWindow>> {
        let auction = self
            .auctions
            .find_active_for_listing(listing_id)
            .await
            .map_err(|e| eligibility::EligibilityError::StorageError(e.to_string()))?;
        Ok(auction.map(|a| AuctionWindow {
            ends_at: a.settings.ends_at,
            max_proposals: a.settings.max_proposals,
        }))
    }
}

/// Matching coordinator
pub struct MatchingCoordinator {
    listings: Arc<dyn ListingStore>,
    reservations: Arc<dyn ReservationStore>,
    targets: Arc<dyn TargetStore>,
    engine: AuctionEngine,
    resolver: EligibilityResolver,
    notifier: Arc<dyn Notifier>,
    settlement: Arc<dyn SettlementLedger>,
    users: Arc<dyn UserDirectory>,
    events: Arc<dyn EventSink>,
    config: EngineConfig,
}

impl MatchingCoordinator {
    /// Create a coordinator with the stock scorer, cache and ranking
    pub fn new(
        listings: Arc<dyn ListingStore>,
        reservations: Arc<dyn ReservationStore>,
        targets: Arc<dyn TargetStore>,
        auctions: Arc<dyn AuctionStore>,
        collaborators: Collaborators,
        config: EngineConfig,
    ) -> Self {
        let cache = Arc::new(InMemoryCompatibilityCache::new(
            config.compatibility.cache_ttl_seconds,
            config.compatibility.cache_max_entries,
        ));
        Self::with_components(
            listings,
            reservations,
            targets,
            auctions,
            collaborators,
            Arc::new(DefaultScorer),
            cache,
            Arc::new(HighestOfferRanking),
            config,
        )
    }

    /// Create a coordinator with custom scorer, cache and ranking
    #[allow(clippy::too_many_arguments)]
    pub fn with_components(
        listings: Arc<dyn ListingStore>,
        reservations: Arc<dyn ReservationStore>,
        targets: Arc<dyn TargetStore>,
        auctions: Arc<dyn AuctionStore>,
        collaborators: Collaborators,
        scorer: Arc<dyn CompatibilityScorer>,
        cache: Arc<dyn CompatibilityCache>,
        ranking: Arc<dyn ProposalRanking>,
        config: EngineConfig,
    ) -> Self {
        let engine = AuctionEngine::new(
            auctions.clone(),
            ranking,
            config.auction.default_max_proposals,
        );
        let resolver = EligibilityResolver::new(
            listings.clone(),
            reservations.clone(),
            targets.clone(),
            Arc::new(StoreSchedule { auctions }),
            scorer,
            cache,
            config.auction.default_max_proposals,
        );
        Self {
            listings,
            reservations,
            targets,
            engine,
            resolver,
            notifier: collaborators.notifier,
            settlement: collaborators.settlement,
            users: collaborators.users,
            events: collaborators.events,
            config,
        }
    }

    // ------------------------------------------------------------------------
    // Targeting
    // ------------------------------------------------------------------------

    /// Target another user's listing with one of your own
    ///
    /// Flow:
    /// 1. Resolve eligibility; blocked requests fail with the reasons
    /// 2. Validate the source listing (existence, ownership, openness)
    /// 3. Create the edge; the store cancels any prior target of the source
    /// 4. Mirror the edge into the auction lane when the target auctions
    /// 5. Notify the target's owner
    pub async fn propose(
        &self,
        user: UserId,
        source_listing_id: ListingId,
        target_listing_id: ListingId,
    ) -> Result<ProposeOutcome> {
        info!(%user, source = %source_listing_id, target = %target_listing_id, "Propose");

        // Step 1: eligibility of the (user, target) pair
        let report = self.eligibility(target_listing_id, user).await?;
        if !report.can_target {
            return Err(EngineError::NotEligible {
                reasons: report.reasons,
            });
        }

        // Step 2: the source must exist, be the user's, and be open
        let source = self.get_listing(source_listing_id).await?;
        self.require_owner(&source, user).await?;
        if !source.is_open_for_targeting(Utc::now()) {
            return Err(EngineError::InvalidSource(format!(
                "listing {} is not open for targeting",
                source_listing_id
            )));
        }

        let target = self.get_listing(target_listing_id).await?;
        let policy = match target.strategy {
            AcceptanceStrategy::FirstMatch => IncomingPolicy::Exclusive,
            AcceptanceStrategy::Auction => IncomingPolicy::Shared,
        };

        // Step 3: transactional edge creation (retargets implicitly)
        let edge = match self
            .targets
            .create_edge(source_listing_id, target_listing_id, policy)
            .await
        {
            Ok(edge) => edge,
            Err(e) => {
                match &e {
                    TargetingError::Cycle { origin: source, target } => {
                        self.events.emit(EngineEvent::CycleRejected {
                            source_listing_id: *source,
                            target_listing_id: *target,
                        });
                    }
                    TargetingError::AlreadyTargeted(target) => {
                        self.events.emit(EngineEvent::ConflictRejected {
                            source_listing_id,
                            target_listing_id: *target,
                        });
                    }
                    _ => {}
                }
                return Err(e.into());
            }
        };

        // Step 4: auction-mode targets also see the edge as a booking bid
        let proposal = if target.strategy == AcceptanceStrategy::Auction {
            let auction = self
                .engine
                .store()
                .find_active_for_listing(target_listing_id)
                .await?;
            match auction {
                Some(auction) => {
                    let submitted = self
                        .engine
                        .submit_proposal(
                            auction.auction_id,
                            user,
                            ProposalKind::Booking {
                                source_listing_id,
                            },
                            None,
                            None,
                        )
                        .await;
                    match submitted {
                        Ok(proposal) => {
                            self.events.emit(EngineEvent::ProposalSubmitted {
                                auction_id: auction.auction_id,
                                proposal_id: proposal.proposal_id,
                            });
                            Some(proposal)
                        }
                        Err(e) => {
                            // Compensate: the edge must not outlive its bid
                            self.targets
                                .cancel_outgoing_edges(source_listing_id, "auction bid failed")
                                .await?;
                            return Err(e.into());
                        }
                    }
                }
                None => None,
            }
        } else {
            None
        };

        self.events.emit(EngineEvent::EdgeCreated {
            edge_id: edge.edge_id,
            source_listing_id,
            target_listing_id,
        });

        let target_owner = self.owner(&target).await?;
        self.dispatch(
            target_owner,
            "listing_targeted",
            json!({
                "listing_id": target_listing_id.to_string(),
                "source_listing_id": source_listing_id.to_string(),
                "edge_id": edge.edge_id.to_string(),
            }),
        )
        .await;

        Ok(ProposeOutcome { edge, proposal })
    }

    /// Withdraw all active targets of a listing
    pub async fn cancel_targets(
        &self,
        user: UserId,
        source_listing_id: ListingId,
        reason: &str,
    ) -> Result<Vec<TargetEdge>> {
        let source = self.get_listing(source_listing_id).await?;
        self.require_owner(&source, user).await?;
        Ok(self
            .targets
            .cancel_outgoing_edges(source_listing_id, reason)
            .await?)
    }

    /// Accept the active proposal on a first-match listing
    ///
    /// Only the target's owner may accept. Auction listings resolve
    /// through [`MatchingCoordinator::select_winner`] instead.
    pub async fn accept_edge(&self, user: UserId, edge_id: EdgeId) -> Result<TargetEdge> {
        let edge = self
            .targets
            .get_edge(edge_id)
            .await?
            .ok_or(TargetingError::EdgeNotFound(edge_id))?;

        let target = self.get_listing(edge.target_listing_id).await?;
        self.require_owner(&target, user).await?;

        if target.strategy == AcceptanceStrategy::Auction {
            return Err(EngineError::Forbidden(
                "auction listings resolve through winner selection".to_string(),
            ));
        }

        let accepted = self.targets.accept_edge(edge_id).await?;

        // Both endpoints move toward settlement
        self.mark_listing_accepted(edge.target_listing_id).await?;
        self.mark_listing_accepted(edge.source_listing_id).await?;

        self.events.emit(EngineEvent::EdgeAccepted {
            edge_id,
            source_listing_id: edge.source_listing_id,
            target_listing_id: edge.target_listing_id,
        });

        let source = self.get_listing(edge.source_listing_id).await?;
        let source_owner = self.owner(&source).await?;
        self.dispatch(
            source_owner,
            "proposal_accepted",
            json!({
                "edge_id": edge_id.to_string(),
                "target_listing_id": edge.target_listing_id.to_string(),
            }),
        )
        .await;

        Ok(accepted)
    }

    // ------------------------------------------------------------------------
    // Auctions
    // ------------------------------------------------------------------------

    /// Open an auction on one of your listings
    pub async fn create_auction(
        &self,
        user: UserId,
        listing_id: ListingId,
        settings: AuctionSettings,
    ) -> Result<Auction> {
        let mut listing = self.get_listing(listing_id).await?;
        self.require_owner(&listing, user).await?;
        if !listing.is_open_for_targeting(Utc::now()) {
            return Err(EngineError::InvalidSource(format!(
                "listing {} is not open",
                listing_id
            )));
        }

        let auction = self
            .engine
            .create_auction(listing_id, listing.strategy, settings)
            .await?;

        listing.auction_id = Some(auction.auction_id);
        listing.updated_at = Utc::now();
        self.listings.update(&listing).await?;

        self.events.emit(EngineEvent::AuctionCreated {
            auction_id: auction.auction_id,
            listing_id,
        });
        Ok(auction)
    }

    /// Submit a proposal against an auction
    ///
    /// Cash bids come through here; booking bids usually arrive via
    /// [`MatchingCoordinator::propose`], which mirrors the edge into the
    /// auction lane itself.
    pub async fn submit_proposal(
        &self,
        user: UserId,
        auction_id: AuctionId,
        kind: ProposalKind,
        message: Option<String>,
        conditions: Option<String>,
    ) -> Result<AuctionProposal> {
        let auction = self
            .engine
            .store()
            .get(auction_id)
            .await?
            .ok_or(auction::AuctionError::AuctionNotFound(auction_id))?;
        let listing = self.get_listing(auction.listing_id).await?;

        let owner = self.owner(&listing).await?;
        if owner == user {
            return Err(EngineError::Forbidden(
                "cannot bid on your own listing".to_string(),
            ));
        }

        match &kind {
            ProposalKind::Cash { .. } if !listing.payment_preference.accepts_cash() => {
                return Err(EngineError::Forbidden(
                    "listing does not accept cash offers".to_string(),
                ));
            }
            ProposalKind::Booking { source_listing_id } => {
                if !listing.payment_preference.accepts_booking() {
                    return Err(EngineError::Forbidden(
                        "listing does not accept booking exchanges".to_string(),
                    ));
                }
                let source = self.get_listing(*source_listing_id).await?;
                self.require_owner(&source, user).await?;
                if !source.is_open_for_targeting(Utc::now()) {
                    return Err(EngineError::InvalidSource(format!(
                        "listing {} is not open for targeting",
                        source_listing_id
                    )));
                }
            }
            _ => {}
        }

        let proposal = self
            .engine
            .submit_proposal(auction_id, user, kind, message, conditions)
            .await?;

        self.events.emit(EngineEvent::ProposalSubmitted {
            auction_id,
            proposal_id: proposal.proposal_id,
        });
        self.dispatch(
            owner,
            "proposal_received",
            json!({
                "auction_id": auction_id.to_string(),
                "proposal_id": proposal.proposal_id.to_string(),
            }),
        )
        .await;

        Ok(proposal)
    }

    /// Select the winning proposal on one of your auctions
    ///
    /// Winner selection is one transaction in the bid ledger; the losers'
    /// graph edges and the listing transitions follow from its outcome.
    pub async fn select_winner(
        &self,
        user: UserId,
        auction_id: AuctionId,
        proposal_id: ProposalId,
    ) -> Result<SelectionOutcome> {
        let auction = self
            .engine
            .store()
            .get(auction_id)
            .await?
            .ok_or(auction::AuctionError::AuctionNotFound(auction_id))?;
        let listing = self.get_listing(auction.listing_id).await?;
        self.require_owner(&listing, user).await?;

        let outcome = self.engine.select_winner(auction_id, proposal_id).await?;
        self.apply_selection(&outcome.auction, Some(&outcome.winner), &outcome.rejected)
            .await?;
        Ok(outcome)
    }

    /// Active auctions past their end date
    pub async fn find_expired_auctions(&self) -> Result<Vec<Auction>> {
        Ok(self.engine.find_expired(self.config.sweep.batch_size).await?)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// May `user` target this listing? Retries the read once on a store
    /// failure when configured; mutations are never retried.
    pub async fn eligibility(
        &self,
        target_listing_id: ListingId,
        user: UserId,
    ) -> Result<EligibilityReport> {
        match self.resolver.eligibility(target_listing_id, user).await {
            Ok(report) => Ok(report),
            Err(e) => {
                let e: EngineError = e.into();
                if self.config.store.retry_reads && e.is_retryable_read() {
                    warn!(
                        target = %target_listing_id,
                        error = %e,
                        "Eligibility read failed, retrying once"
                    );
                    Ok(self.resolver.eligibility(target_listing_id, user).await?)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// The user's own listings free to target `target_listing_id`
    pub async fn eligible_listings_for(
        &self,
        user: UserId,
        target_listing_id: ListingId,
    ) -> Result<Vec<Listing>> {
        Ok(self
            .resolver
            .eligible_listings_for(user, target_listing_id)
            .await?)
    }

    /// Compatibility of two listings
    pub async fn score(
        &self,
        source_listing_id: ListingId,
        target_listing_id: ListingId,
    ) -> Result<Compatibility> {
        match self.resolver.score(source_listing_id, target_listing_id).await {
            Ok(result) => Ok(result),
            Err(e) => {
                let e: EngineError = e.into();
                if self.config.store.retry_reads && e.is_retryable_read() {
                    warn!(error = %e, "Score read failed, retrying once");
                    Ok(self
                        .resolver
                        .score(source_listing_id, target_listing_id)
                        .await?)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Edge history involving a listing, newest first
    pub async fn history_for(
        &self,
        listing_id: ListingId,
    ) -> Result<Vec<targeting::HistoryEntry>> {
        Ok(self.targets.history_for(listing_id).await?)
    }

    /// Display summary for a user (presentation enrichment only)
    pub async fn user_summary(&self, user_id: UserId) -> Result<Option<UserSummary>> {
        match self.users.user_summary(user_id).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                warn!(user = %user_id, error = %e, "User summary lookup failed");
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Settlement references
    // ------------------------------------------------------------------------

    /// Record an opaque settlement reference against an entity (idempotent)
    pub async fn record_reference(
        &self,
        entity: SettlementEntity,
        reference_id: &str,
    ) -> Result<()> {
        match entity {
            SettlementEntity::Listing(listing_id) => {
                let mut listing = self.get_listing(listing_id).await?;
                listing.record_reference(reference_id);
                self.listings.update(&listing).await?;
            }
            SettlementEntity::Auction(auction_id) => {
                let mut auction = self
                    .engine
                    .store()
                    .get(auction_id)
                    .await?
                    .ok_or(auction::AuctionError::AuctionNotFound(auction_id))?;
                auction.record_reference(reference_id);
                self.engine.store().update(&auction).await?;
            }
        }

        if let Err(e) = self.settlement.record_reference(entity, reference_id).await {
            warn!(reference_id, error = %e, "Settlement ledger write failed");
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Background sweeps
    // ------------------------------------------------------------------------

    /// Expire pending listings past their expiry
    ///
    /// Idempotent and safe to run from several workers: a listing that
    /// already left pending is skipped by the terminal-state check.
    pub async fn expire_listings(&self) -> Result<Vec<ListingId>> {
        let due = self
            .listings
            .find_expired(Utc::now(), self.config.sweep.batch_size)
            .await?;

        let mut expired = Vec::new();
        for mut listing in due {
            if !listing.mark_expired() {
                continue;
            }
            self.listings.update(&listing).await?;

            // An expired listing stops targeting anything
            self.targets
                .cancel_outgoing_edges(listing.listing_id, "listing expired")
                .await?;

            self.events.emit(EngineEvent::ListingExpired {
                listing_id: listing.listing_id,
            });
            let owner = self.owner(&listing).await?;
            self.dispatch(
                owner,
                "listing_expired",
                json!({ "listing_id": listing.listing_id.to_string() }),
            )
            .await;

            expired.push(listing.listing_id);
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "Listings expired");
        }
        Ok(expired)
    }

    /// Close auctions past their end date
    ///
    /// Selects the best-ranked pending proposal per auction (pluggable
    /// ranking) or ends the auction without a winner. Re-running on
    /// already-ended rows is a no-op.
    pub async fn close_expired_auctions(&self) -> Result<Vec<SweepOutcome>> {
        let outcomes = self
            .engine
            .close_expired(self.config.sweep.batch_size)
            .await?;

        for outcome in &outcomes {
            self.apply_selection(&outcome.auction, outcome.winner.as_ref(), &outcome.rejected)
                .await?;
        }
        Ok(outcomes)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Post-selection wiring shared by explicit selection and the sweep
    async fn apply_selection(
        &self,
        auction: &Auction,
        winner: Option<&AuctionProposal>,
        rejected: &[AuctionProposal],
    ) -> Result<()> {
        if let Some(winner) = winner {
            self.mark_listing_accepted(auction.listing_id).await?;

            // A winning booking bid carries a graph edge; accept it
            if let ProposalKind::Booking { source_listing_id } = &winner.kind {
                if let Some(edge) = self.targets.active_outgoing(*source_listing_id).await? {
                    if edge.target_listing_id == auction.listing_id {
                        self.targets.accept_edge(edge.edge_id).await?;
                        self.mark_listing_accepted(*source_listing_id).await?;
                        self.events.emit(EngineEvent::EdgeAccepted {
                            edge_id: edge.edge_id,
                            source_listing_id: *source_listing_id,
                            target_listing_id: auction.listing_id,
                        });
                    }
                }
            }

            self.dispatch(
                winner.proposer_id,
                "proposal_selected",
                json!({
                    "auction_id": auction.auction_id.to_string(),
                    "proposal_id": winner.proposal_id.to_string(),
                }),
            )
            .await;
        }

        // Losing booking bids release their edges
        for loser in rejected {
            if let ProposalKind::Booking { source_listing_id } = &loser.kind {
                if let Some(edge) = self.targets.active_outgoing(*source_listing_id).await? {
                    if edge.target_listing_id == auction.listing_id {
                        self.targets.reject_edge(edge.edge_id, "auction lost").await?;
                    }
                }
            }
            self.dispatch(
                loser.proposer_id,
                "proposal_rejected",
                json!({
                    "auction_id": auction.auction_id.to_string(),
                    "proposal_id": loser.proposal_id.to_string(),
                }),
            )
            .await;
        }

        self.events.emit(EngineEvent::AuctionEnded {
            auction_id: auction.auction_id,
            winning_proposal_id: winner.map(|w| w.proposal_id),
        });
        Ok(())
    }

    async fn get_listing(&self, listing_id: ListingId) -> Result<Listing> {
        self.listings
            .get(listing_id)
            .await?
            .ok_or_else(|| ListingError::NotFound(listing_id).into())
    }

    async fn owner(&self, listing: &Listing) -> Result<UserId> {
        Ok(owner_of(self.reservations.as_ref(), listing).await?)
    }

    async fn require_owner(&self, listing: &Listing, user: UserId) -> Result<()> {
        let owner = self.owner(listing).await?;
        if owner != user {
            return Err(EngineError::Forbidden(format!(
                "listing {} is not owned by {}",
                listing.listing_id, user
            )));
        }
        Ok(())
    }

    async fn mark_listing_accepted(&self, listing_id: ListingId) -> Result<()> {
        let mut listing = self.get_listing(listing_id).await?;
        listing.mark_accepted()?;
        self.listings.update(&listing).await?;
        Ok(())
    }

    /// Dispatch a notification; failures are logged, never propagated
    async fn dispatch(&self, user: UserId, event_type: &str, payload: serde_json::Value) {
        if let Err(e) = self.notifier.notify(user, event_type, payload).await {
            warn!(user = %user, event_type, error = %e, "Notification dispatch failed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventSink;
    use crate::ports::RecordingNotifier;
    use assert_matches::assert_matches;
    use auction::store::memory::InMemoryAuctionStore;
    use auction::{AuctionError, AuctionStatus, ProposalStatus};
    use chrono::{Duration, NaiveDate};
    use common::types::{Money, PaymentPreference};
    use listings::store::memory::{InMemoryListingStore, InMemoryReservationStore};
    use listings::{ListingStatus, ListingTerms, Reservation};
    use targeting::store::memory::InMemoryTargetStore;
    use targeting::{EdgeStatus, HistoryAction};

    struct Harness {
        listings: Arc<InMemoryListingStore>,
        reservations: Arc<InMemoryReservationStore>,
        targets: Arc<InMemoryTargetStore>,
        auctions: Arc<InMemoryAuctionStore>,
        notifier: Arc<RecordingNotifier>,
        events: Arc<RecordingEventSink>,
        coordinator: MatchingCoordinator,
    }

    fn harness() -> Harness {
        let listings = Arc::new(InMemoryListingStore::new());
        let reservations = Arc::new(InMemoryReservationStore::new());
        let targets = Arc::new(InMemoryTargetStore::new(10));
        let auctions = Arc::new(InMemoryAuctionStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let events = Arc::new(RecordingEventSink::new());

        let coordinator = MatchingCoordinator::new(
            listings.clone(),
            reservations.clone(),
            targets.clone(),
            auctions.clone(),
            Collaborators {
                notifier: notifier.clone(),
                settlement: Arc::new(InMemorySettlementLedger::new()),
                users: Arc::new(NoopUserDirectory),
                events: events.clone(),
            },
            EngineConfig::default(),
        );

        Harness {
            listings,
            reservations,
            targets,
            auctions,
            notifier,
            events,
            coordinator,
        }
    }

    async fn listing_for(
        h: &Harness,
        owner: UserId,
        strategy: AcceptanceStrategy,
        preference: PaymentPreference,
    ) -> Listing {
        let reservation = Reservation::new(
            owner,
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 9, 8).unwrap(),
            "Lisbon",
            Money::new(50000, "EUR"),
        );
        let reservation = h.reservations.create(reservation).await.unwrap();
        let listing = Listing::new(
            reservation.reservation_id,
            ListingTerms::expiring_at(Utc::now() + Duration::days(30)),
            strategy,
            preference,
        );
        h.listings.create(listing).await.unwrap()
    }

    async fn first_match_listing(h: &Harness, owner: UserId) -> Listing {
        listing_for(h, owner, AcceptanceStrategy::FirstMatch, PaymentPreference::Both).await
    }

    #[tokio::test]
    async fn test_end_to_end_first_match_accept() {
        let h = harness();
        let (u1, u2) = (UserId::new(), UserId::new());
        let a = first_match_listing(&h, u1).await;
        let b = first_match_listing(&h, u2).await;

        // U1 targets B with A
        let outcome = h
            .coordinator
            .propose(u1, a.listing_id, b.listing_id)
            .await
            .unwrap();
        assert!(outcome.proposal.is_none());
        assert_eq!(outcome.edge.status, EdgeStatus::Active);

        // U2 was told
        assert_eq!(h.notifier.events_for(u2), vec!["listing_targeted"]);

        // U2 accepts
        let accepted = h
            .coordinator
            .accept_edge(u2, outcome.edge.edge_id)
            .await
            .unwrap();
        assert_eq!(accepted.status, EdgeStatus::Accepted);

        // Both listings moved toward settlement
        let a = h.listings.get(a.listing_id).await.unwrap().unwrap();
        let b = h.listings.get(b.listing_id).await.unwrap().unwrap();
        assert_eq!(a.status, ListingStatus::Accepted);
        assert_eq!(b.status, ListingStatus::Accepted);

        // The accepted transition is on the audit trail
        let history = h.coordinator.history_for(a.listing_id).await.unwrap();
        assert!(history
            .iter()
            .any(|e| e.action == HistoryAction::Accepted && e.edge_id == outcome.edge.edge_id));

        // And U1 heard about the acceptance
        assert_eq!(h.notifier.events_for(u1), vec!["proposal_accepted"]);
    }

    #[tokio::test]
    async fn test_propose_own_listing_blocked_with_reasons() {
        let h = harness();
        let u1 = UserId::new();
        let a = first_match_listing(&h, u1).await;
        let b = first_match_listing(&h, u1).await;

        let err = h
            .coordinator
            .propose(u1, a.listing_id, b.listing_id)
            .await
            .unwrap_err();
        assert_matches!(err, EngineError::NotEligible { reasons }
            if reasons.contains(&eligibility::IneligibilityReason::OwnListing));
    }

    #[tokio::test]
    async fn test_propose_through_foreign_listing_is_forbidden() {
        let h = harness();
        let (u1, u2, u3) = (UserId::new(), UserId::new(), UserId::new());
        let a = first_match_listing(&h, u1).await;
        let b = first_match_listing(&h, u2).await;

        // U3 cannot spend U1's listing
        let err = h
            .coordinator
            .propose(u3, a.listing_id, b.listing_id)
            .await
            .unwrap_err();
        assert_matches!(err, EngineError::Forbidden(_));
    }

    #[tokio::test]
    async fn test_first_match_conflict_blocked_by_eligibility() {
        let h = harness();
        let (u1, u2, u3) = (UserId::new(), UserId::new(), UserId::new());
        let a = first_match_listing(&h, u1).await;
        let b = first_match_listing(&h, u2).await;
        let target = first_match_listing(&h, u3).await;

        h.coordinator
            .propose(u1, a.listing_id, target.listing_id)
            .await
            .unwrap();
        let err = h
            .coordinator
            .propose(u2, b.listing_id, target.listing_id)
            .await
            .unwrap_err();
        assert_matches!(err, EngineError::NotEligible { .. });

        // The conflict never reached the graph store; eligibility caught it
        assert_eq!(
            h.targets
                .count_active_incoming(target.listing_id)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_auction_flow_with_booking_and_cash() {
        let h = harness();
        let owner = UserId::new();
        let target =
            listing_for(&h, owner, AcceptanceStrategy::Auction, PaymentPreference::Both).await;

        let auction = h
            .coordinator
            .create_auction(
                owner,
                target.listing_id,
                AuctionSettings {
                    ends_at: Utc::now() + Duration::days(3),
                    max_proposals: Some(5),
                },
            )
            .await
            .unwrap();

        // Two booking bidders arrive through the targeting lane
        let (u1, u2) = (UserId::new(), UserId::new());
        let a = first_match_listing(&h, u1).await;
        let b = first_match_listing(&h, u2).await;

        let p1 = h
            .coordinator
            .propose(u1, a.listing_id, target.listing_id)
            .await
            .unwrap();
        let p2 = h
            .coordinator
            .propose(u2, b.listing_id, target.listing_id)
            .await
            .unwrap();
        assert!(p1.proposal.is_some());
        assert!(p2.proposal.is_some());
        assert_eq!(
            h.targets
                .count_active_incoming(target.listing_id)
                .await
                .unwrap(),
            2
        );

        // A cash bidder arrives through the proposal lane
        let u3 = UserId::new();
        let cash = h
            .coordinator
            .submit_proposal(
                u3,
                auction.auction_id,
                ProposalKind::Cash {
                    offer: Money::new(30000, "EUR"),
                },
                Some("happy to settle this week".to_string()),
                None,
            )
            .await
            .unwrap();

        // Owner picks U1's booking bid
        let winner_id = p1.proposal.as_ref().unwrap().proposal_id;
        let outcome = h
            .coordinator
            .select_winner(owner, auction.auction_id, winner_id)
            .await
            .unwrap();
        assert_eq!(outcome.auction.status, AuctionStatus::Ended);
        assert_eq!(outcome.winner.status, ProposalStatus::Selected);
        assert_eq!(outcome.rejected.len(), 2);

        // Winner's edge accepted, loser's rejected
        let edge1 = h.targets.get_edge(p1.edge.edge_id).await.unwrap().unwrap();
        let edge2 = h.targets.get_edge(p2.edge.edge_id).await.unwrap().unwrap();
        assert_eq!(edge1.status, EdgeStatus::Accepted);
        assert_eq!(edge2.status, EdgeStatus::Rejected);

        // Both matched listings moved toward settlement
        let target = h.listings.get(target.listing_id).await.unwrap().unwrap();
        let a = h.listings.get(a.listing_id).await.unwrap().unwrap();
        assert_eq!(target.status, ListingStatus::Accepted);
        assert_eq!(a.status, ListingStatus::Accepted);

        // Everyone heard the verdict
        assert!(h.notifier.events_for(u1).contains(&"proposal_selected".to_string()));
        assert!(h.notifier.events_for(u2).contains(&"proposal_rejected".to_string()));
        assert!(h.notifier.events_for(u3).contains(&"proposal_rejected".to_string()));
        let _ = cash;

        // Re-selecting is a stale-state conflict
        let err = h
            .coordinator
            .select_winner(owner, auction.auction_id, winner_id)
            .await
            .unwrap_err();
        assert_matches!(err, EngineError::Auction(AuctionError::StaleState(_)));
    }

    #[tokio::test]
    async fn test_cash_only_listing_rejects_targeting() {
        let h = harness();
        let owner = UserId::new();
        let target =
            listing_for(&h, owner, AcceptanceStrategy::FirstMatch, PaymentPreference::Cash).await;

        let u1 = UserId::new();
        let a = first_match_listing(&h, u1).await;
        let err = h
            .coordinator
            .propose(u1, a.listing_id, target.listing_id)
            .await
            .unwrap_err();
        assert_matches!(err, EngineError::NotEligible { reasons }
            if reasons.contains(&eligibility::IneligibilityReason::BookingNotAccepted));
    }

    #[tokio::test]
    async fn test_expire_listings_sweep_is_idempotent() {
        let h = harness();
        let u1 = UserId::new();
        let a = first_match_listing(&h, u1).await;
        let b = first_match_listing(&h, UserId::new()).await;

        h.coordinator
            .propose(u1, a.listing_id, b.listing_id)
            .await
            .unwrap();

        // Force A past its expiry
        let mut stale = h.listings.get(a.listing_id).await.unwrap().unwrap();
        stale.terms.expires_at = Utc::now() - Duration::hours(1);
        h.listings.update(&stale).await.unwrap();

        let expired = h.coordinator.expire_listings().await.unwrap();
        assert_eq!(expired, vec![a.listing_id]);

        // The expired listing released its target
        assert!(!h.targets.has_active_outgoing(a.listing_id).await.unwrap());
        let a_after = h.listings.get(a.listing_id).await.unwrap().unwrap();
        assert_eq!(a_after.status, ListingStatus::Expired);

        // Second pass finds nothing
        let expired = h.coordinator.expire_listings().await.unwrap();
        assert!(expired.is_empty());
    }

    #[tokio::test]
    async fn test_auction_sweep_selects_best_cash_offer() {
        let h = harness();
        let owner = UserId::new();
        let target =
            listing_for(&h, owner, AcceptanceStrategy::Auction, PaymentPreference::Cash).await;

        let auction = h
            .coordinator
            .create_auction(
                owner,
                target.listing_id,
                AuctionSettings {
                    ends_at: Utc::now() + Duration::days(1),
                    max_proposals: None,
                },
            )
            .await
            .unwrap();

        for amount in [10000, 25000] {
            h.coordinator
                .submit_proposal(
                    UserId::new(),
                    auction.auction_id,
                    ProposalKind::Cash {
                        offer: Money::new(amount, "EUR"),
                    },
                    None,
                    None,
                )
                .await
                .unwrap();
        }

        // Push the auction past its end and sweep
        let mut stale = h.auctions.get(auction.auction_id).await.unwrap().unwrap();
        stale.settings.ends_at = Utc::now() - Duration::minutes(1);
        h.auctions.update(&stale).await.unwrap();

        let outcomes = h.coordinator.close_expired_auctions().await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(
            outcomes[0].winner.as_ref().unwrap().kind.cash_amount(),
            25000
        );

        // Sweep again: already processed, no-op
        let outcomes = h.coordinator.close_expired_auctions().await.unwrap();
        assert!(outcomes.is_empty());

        let events = h.events.events();
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::AuctionEnded { .. })));
    }

    #[tokio::test]
    async fn test_record_reference_is_idempotent() {
        let h = harness();
        let u1 = UserId::new();
        let a = first_match_listing(&h, u1).await;

        let entity = SettlementEntity::Listing(a.listing_id);
        h.coordinator.record_reference(entity, "chain-tx-9").await.unwrap();
        h.coordinator.record_reference(entity, "chain-tx-9").await.unwrap();

        let listing = h.listings.get(a.listing_id).await.unwrap().unwrap();
        assert_eq!(listing.external_refs, vec!["chain-tx-9"]);
    }

    #[tokio::test]
    async fn test_retarget_through_propose() {
        let h = harness();
        let u1 = UserId::new();
        let a = first_match_listing(&h, u1).await;
        let b = first_match_listing(&h, UserId::new()).await;
        let c = first_match_listing(&h, UserId::new()).await;

        let first = h
            .coordinator
            .propose(u1, a.listing_id, b.listing_id)
            .await
            .unwrap();
        h.coordinator
            .propose(u1, a.listing_id, c.listing_id)
            .await
            .unwrap();

        // Exactly one active outgoing edge, pointing at C
        let active = h.targets.active_outgoing(a.listing_id).await.unwrap().unwrap();
        assert_eq!(active.target_listing_id, c.listing_id);
        let old = h.targets.get_edge(first.edge.edge_id).await.unwrap().unwrap();
        assert_eq!(old.status, EdgeStatus::Cancelled);

        // B is open again for someone else
        let report = h
            .coordinator
            .eligibility(b.listing_id, UserId::new())
            .await
            .unwrap();
        assert!(report.can_target);
    }
}
