//! Eligibility resolver
//!
//! One contract replaces the pile of near-duplicate "find eligible /
//! targetable / compatible" queries that tend to accrete around derived
//! ownership: [`EligibilityResolver::eligibility`] for "may I target this",
//! [`EligibilityResolver::eligible_listings_for`] for "with what", and
//! [`EligibilityResolver::score`] for "how well".

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use common::types::{AcceptanceStrategy, ListingId, UserId};
use listings::{owner_of, Listing, ListingStatus, ListingStore, ReservationStore};
use targeting::TargetStore;

use crate::cache::{CompatibilityCache, PairKey};
use crate::error::{EligibilityError, Result};
use crate::ports::AuctionSchedule;
use crate::score::{Compatibility, CompatibilityScorer};

/// Why targeting is blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibilityReason {
    /// The requesting user owns the target listing
    OwnListing,
    /// The target listing is not pending
    NotPending,
    /// The target listing passed its expiry
    ListingExpired,
    /// The auction on the target has already ended
    AuctionEnded,
    /// The listing is in auction mode but has no active auction
    NoActiveAuction,
    /// A first-match target already has an active proposal
    TargetTaken,
    /// The auction reached its proposal cap
    ProposalLimitReached,
    /// The target only accepts cash offers, not booking exchanges
    BookingNotAccepted,
}

impl std::fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IneligibilityReason::OwnListing => write!(f, "cannot target own listing"),
            IneligibilityReason::NotPending => write!(f, "listing is not open"),
            IneligibilityReason::ListingExpired => write!(f, "listing has expired"),
            IneligibilityReason::AuctionEnded => write!(f, "auction has ended"),
            IneligibilityReason::NoActiveAuction => write!(f, "no active auction"),
            IneligibilityReason::TargetTaken => write!(f, "listing already has a proposal"),
            IneligibilityReason::ProposalLimitReached => write!(f, "proposal limit reached"),
            IneligibilityReason::BookingNotAccepted => {
                write!(f, "listing only accepts cash offers")
            }
        }
    }
}

/// Structured answer to "may this user target this listing"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityReport {
    /// Whether targeting is currently allowed
    pub can_target: bool,
    /// Why not, when blocked; empty when allowed
    pub reasons: Vec<IneligibilityReason>,
    /// The target's acceptance strategy
    pub mode: AcceptanceStrategy,
    /// Active incoming edges on the target right now
    pub current_incoming: u64,
    /// Cap on concurrent incoming edges (1 for first-match)
    pub max_incoming: u32,
    /// The user already targets something else; proposing here retargets.
    /// Informational, never blocking.
    pub retarget_warning: bool,
}

/// Eligibility and compatibility resolver
pub struct EligibilityResolver {
    listings: Arc<dyn ListingStore>,
    reservations: Arc<dyn ReservationStore>,
    targets: Arc<dyn TargetStore>,
    auctions: Arc<dyn AuctionSchedule>,
    scorer: Arc<dyn CompatibilityScorer>,
    cache: Arc<dyn CompatibilityCache>,
    default_max_proposals: u32,
}

impl EligibilityResolver {
    /// Create a new resolver
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        listings: Arc<dyn ListingStore>,
        reservations: Arc<dyn ReservationStore>,
        targets: Arc<dyn TargetStore>,
        auctions: Arc<dyn AuctionSchedule>,
        scorer: Arc<dyn CompatibilityScorer>,
        cache: Arc<dyn CompatibilityCache>,
        default_max_proposals: u32,
    ) -> Self {
        Self {
            listings,
            reservations,
            targets,
            auctions,
            scorer,
            cache,
            default_max_proposals,
        }
    }

    /// May `requesting_user` target `target_listing_id`?
    ///
    /// Blocked outcomes come back as reasons in the report, not as errors;
    /// only missing rows and store failures raise.
    pub async fn eligibility(
        &self,
        target_listing_id: ListingId,
        requesting_user: UserId,
    ) -> Result<EligibilityReport> {
        let target = self
            .listings
            .get(target_listing_id)
            .await?
            .ok_or(EligibilityError::ListingNotFound(target_listing_id))?;

        let now = Utc::now();
        let mut reasons = Vec::new();

        // Ownership is derived through the reservation on every check
        let owner = owner_of(self.reservations.as_ref(), &target).await?;
        if owner == requesting_user {
            reasons.push(IneligibilityReason::OwnListing);
        }

        if target.status != ListingStatus::Pending {
            reasons.push(IneligibilityReason::NotPending);
        } else if target.terms.expires_at <= now {
            reasons.push(IneligibilityReason::ListingExpired);
        }

        // Targeting offers a booking exchange; cash-only listings take
        // their bids through the auction proposal lane instead
        if !target.payment_preference.accepts_booking() {
            reasons.push(IneligibilityReason::BookingNotAccepted);
        }

        let current_incoming = self.targets.count_active_incoming(target_listing_id).await?;

        let max_incoming = match target.strategy {
            AcceptanceStrategy::Auction => {
                match self.auctions.window_for(target_listing_id).await? {
                    Some(window) => {
                        if window.ends_at <= now {
                            reasons.push(IneligibilityReason::AuctionEnded);
                        }
                        let max = window.max_proposals.unwrap_or(self.default_max_proposals);
                        if current_incoming >= max as u64 {
                            reasons.push(IneligibilityReason::ProposalLimitReached);
                        }
                        max
                    }
                    None => {
                        reasons.push(IneligibilityReason::NoActiveAuction);
                        self.default_max_proposals
                    }
                }
            }
            AcceptanceStrategy::FirstMatch => {
                if current_incoming >= 1
                    && !self
                        .user_holds_incoming(target_listing_id, requesting_user)
                        .await?
                {
                    reasons.push(IneligibilityReason::TargetTaken);
                }
                1
            }
        };

        let retarget_warning = self.user_targets_elsewhere(requesting_user).await?;

        let report = EligibilityReport {
            can_target: reasons.is_empty(),
            reasons,
            mode: target.strategy,
            current_incoming,
            max_incoming,
            retarget_warning,
        };

        debug!(
            target = %target_listing_id,
            user = %requesting_user,
            can_target = report.can_target,
            "Eligibility resolved"
        );
        Ok(report)
    }

    /// The user's own listings that are free to target `target_listing_id`
    ///
    /// Pending, unexpired, and not the target itself. A listing leaves
    /// pending the moment one of its edges is accepted, so commitment is
    /// covered by the status filter.
    pub async fn eligible_listings_for(
        &self,
        user_id: UserId,
        target_listing_id: ListingId,
    ) -> Result<Vec<Listing>> {
        let now = Utc::now();
        let mut eligible = Vec::new();

        for reservation in self.reservations.list_for_owner(user_id).await? {
            let Some(listing) = self
                .listings
                .find_by_reservation(reservation.reservation_id)
                .await?
            else {
                continue;
            };

            if listing.listing_id == target_listing_id {
                continue;
            }
            if listing.is_open_for_targeting(now) {
                eligible.push(listing);
            }
        }

        eligible.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(eligible)
    }

    /// Compatibility of two listings, memoized by the unordered pair
    ///
    /// A cache miss or expired entry only changes latency, never the result:
    /// the scorer is deterministic and always available as fallback.
    pub async fn score(
        &self,
        source_listing_id: ListingId,
        target_listing_id: ListingId,
    ) -> Result<Compatibility> {
        let key = PairKey::new(source_listing_id, target_listing_id);
        if let Some(hit) = self.cache.get(key).await {
            debug!(source = %source_listing_id, target = %target_listing_id, "Compatibility cache hit");
            return Ok(hit);
        }

        let source = self.reservation_of(source_listing_id).await?;
        let target = self.reservation_of(target_listing_id).await?;

        let result = self.scorer.score(&source, &target);
        self.cache.put(key, result.clone()).await;
        Ok(result)
    }

    async fn reservation_of(&self, listing_id: ListingId) -> Result<listings::Reservation> {
        let listing = self
            .listings
            .get(listing_id)
            .await?
            .ok_or(EligibilityError::ListingNotFound(listing_id))?;
        let reservation = self
            .reservations
            .get(listing.reservation_id)
            .await?
            .ok_or(listings::ListingError::ReservationNotFound(
                listing.reservation_id,
            ))?;
        Ok(reservation)
    }

    /// Does one of the user's listings hold the active incoming edge on the
    /// target? Makes the first-match check idempotent for the existing
    /// proposer.
    async fn user_holds_incoming(&self, target: ListingId, user: UserId) -> Result<bool> {
        for edge in self.targets.active_incoming(target).await? {
            if let Some(source) = self.listings.get(edge.source_listing_id).await? {
                if owner_of(self.reservations.as_ref(), &source).await? == user {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Does any of the user's listings have an active outgoing edge?
    async fn user_targets_elsewhere(&self, user: UserId) -> Result<bool> {
        for reservation in self.reservations.list_for_owner(user).await? {
            if let Some(listing) = self
                .listings
                .find_by_reservation(reservation.reservation_id)
                .await?
            {
                if self.targets.has_active_outgoing(listing.listing_id).await? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
