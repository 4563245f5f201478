//! Listing and reservation domain types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use common::types::{
    AcceptanceStrategy, AuctionId, ListingId, Money, PaymentPreference, ReservationId, UserId,
};

use crate::error::ListingError;

/// Listing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Listed and open for targeting
    Pending,
    /// A proposal was accepted; settlement is underway
    Accepted,
    /// Exchange settled
    Completed,
    /// Withdrawn by the owner or via retargeting
    Cancelled,
    /// Passed its expiry without being matched
    Expired,
}

impl Default for ListingStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl ListingStatus {
    /// Returns true for statuses that allow no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ListingStatus::Completed | ListingStatus::Cancelled | ListingStatus::Expired
        )
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingStatus::Pending => write!(f, "pending"),
            ListingStatus::Accepted => write!(f, "accepted"),
            ListingStatus::Completed => write!(f, "completed"),
            ListingStatus::Cancelled => write!(f, "cancelled"),
            ListingStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Terms attached to a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingTerms {
    /// Extra payment the owner asks on top of the exchange
    pub extra_payment: Option<Money>,
    /// Free-form conditions shown to proposers
    pub conditions: Option<String>,
    /// When the listing stops accepting proposals
    pub expires_at: DateTime<Utc>,
}

impl ListingTerms {
    /// Terms with no extras, expiring at the given time
    pub fn expiring_at(expires_at: DateTime<Utc>) -> Self {
        Self {
            extra_payment: None,
            conditions: None,
            expires_at,
        }
    }
}

/// A reservation offered for exchange
///
/// The owner is NOT stored here; it is derived through the reservation
/// reference on every read. Caching it on the listing is exactly the
/// staleness bug this schema exists to avoid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Unique listing identifier
    pub listing_id: ListingId,
    /// The reservation this listing is built on (strong, non-null)
    pub reservation_id: ReservationId,
    /// Current status
    pub status: ListingStatus,
    /// Listing terms (extra payment, conditions, expiry)
    pub terms: ListingTerms,
    /// How proposals against this listing are resolved
    pub strategy: AcceptanceStrategy,
    /// Which kinds of proposals the owner welcomes
    pub payment_preference: PaymentPreference,
    /// Auction attached to this listing, when strategy is auction
    pub auction_id: Option<AuctionId>,
    /// Opaque settlement reference ids recorded by external systems
    pub external_refs: Vec<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Create a new pending listing
    pub fn new(
        reservation_id: ReservationId,
        terms: ListingTerms,
        strategy: AcceptanceStrategy,
        payment_preference: PaymentPreference,
    ) -> Self {
        let now = Utc::now();
        Self {
            listing_id: ListingId::new(),
            reservation_id,
            status: ListingStatus::Pending,
            terms,
            strategy,
            payment_preference,
            auction_id: None,
            external_refs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the listing validity rule
    ///
    /// `expires_at` must be in the future while the listing is pending.
    /// Terminal statuses accept any expiry timestamp, so cancelling an
    /// already-expired listing needs no compensating timestamp write.
    pub fn check_valid(&self, now: DateTime<Utc>) -> Result<(), ListingError> {
        if self.status == ListingStatus::Pending && self.terms.expires_at <= now {
            return Err(ListingError::InvalidState(format!(
                "pending listing {} has expiry in the past",
                self.listing_id
            )));
        }
        Ok(())
    }

    /// True while the listing can receive new target edges
    pub fn is_open_for_targeting(&self, now: DateTime<Utc>) -> bool {
        self.status == ListingStatus::Pending && self.terms.expires_at > now
    }

    /// True if the listing has passed its expiry while still pending
    pub fn is_expiry_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ListingStatus::Pending && self.terms.expires_at <= now
    }

    /// Transition to accepted
    pub fn mark_accepted(&mut self) -> Result<(), ListingError> {
        self.transition(ListingStatus::Pending, ListingStatus::Accepted)
    }

    /// Transition to completed after settlement
    pub fn mark_completed(&mut self) -> Result<(), ListingError> {
        self.transition(ListingStatus::Accepted, ListingStatus::Completed)
    }

    /// Cancel the listing (owner action or retargeting)
    ///
    /// Allowed from pending even when the expiry has already passed;
    /// terminal statuses reject the transition.
    pub fn mark_cancelled(&mut self) -> Result<(), ListingError> {
        if self.status.is_terminal() {
            return Err(ListingError::InvalidState(format!(
                "cannot cancel listing in {} status",
                self.status
            )));
        }
        self.status = ListingStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Expire the listing (background sweep)
    ///
    /// A no-op when the listing already left pending, so re-running the
    /// sweep on the same row is safe.
    pub fn mark_expired(&mut self) -> bool {
        if self.status != ListingStatus::Pending {
            return false;
        }
        self.status = ListingStatus::Expired;
        self.updated_at = Utc::now();
        true
    }

    /// Record an external settlement reference (idempotent)
    pub fn record_reference(&mut self, reference: &str) {
        if !self.external_refs.iter().any(|r| r == reference) {
            self.external_refs.push(reference.to_string());
            self.updated_at = Utc::now();
        }
    }

    fn transition(&mut self, from: ListingStatus, to: ListingStatus) -> Result<(), ListingError> {
        if self.status != from {
            return Err(ListingError::InvalidState(format!(
                "cannot move listing from {} to {}",
                self.status, to
            )));
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Reservation status as reported by the booking system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Booking is confirmed and exchangeable
    Confirmed,
    /// Booking was cancelled upstream
    Cancelled,
}

/// The bookable reservation a listing is built on
///
/// Read-mostly from the engine's perspective; this is where the true
/// `owner_id` lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique reservation identifier
    pub reservation_id: ReservationId,
    /// The owning user
    pub owner_id: UserId,
    /// Check-in date
    pub check_in: NaiveDate,
    /// Check-out date
    pub check_out: NaiveDate,
    /// Location label (city or property identifier)
    pub location: String,
    /// Booked price
    pub price: Money,
    /// Upstream status
    pub status: ReservationStatus,
}

impl Reservation {
    /// Create a confirmed reservation
    pub fn new(
        owner_id: UserId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        location: impl Into<String>,
        price: Money,
    ) -> Self {
        Self {
            reservation_id: ReservationId::new(),
            owner_id,
            check_in,
            check_out,
            location: location.into(),
            price,
            status: ReservationStatus::Confirmed,
        }
    }

    /// Number of nights covered by the reservation
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_listing() -> Listing {
        Listing::new(
            ReservationId::new(),
            ListingTerms::expiring_at(Utc::now() + Duration::days(30)),
            AcceptanceStrategy::FirstMatch,
            PaymentPreference::Both,
        )
    }

    #[test]
    fn test_new_listing_is_pending() {
        let listing = create_test_listing();
        assert_eq!(listing.status, ListingStatus::Pending);
        assert!(listing.is_open_for_targeting(Utc::now()));
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let mut listing = create_test_listing();
        listing.mark_accepted().unwrap();
        assert_eq!(listing.status, ListingStatus::Accepted);
        listing.mark_completed().unwrap();
        assert_eq!(listing.status, ListingStatus::Completed);
    }

    #[test]
    fn test_cannot_complete_pending() {
        let mut listing = create_test_listing();
        assert!(listing.mark_completed().is_err());
    }

    #[test]
    fn test_cancel_expired_listing_without_timestamp_write() {
        let mut listing = create_test_listing();
        listing.terms.expires_at = Utc::now() - Duration::days(1);
        let old_expiry = listing.terms.expires_at;

        // Cancelling a past-expiry pending listing succeeds as-is
        listing.mark_cancelled().unwrap();
        assert_eq!(listing.status, ListingStatus::Cancelled);
        assert_eq!(listing.terms.expires_at, old_expiry);

        // And the validity rule accepts the terminal status
        listing.check_valid(Utc::now()).unwrap();
    }

    #[test]
    fn test_check_valid_rejects_expired_pending() {
        let mut listing = create_test_listing();
        listing.terms.expires_at = Utc::now() - Duration::hours(1);
        assert!(listing.check_valid(Utc::now()).is_err());
    }

    #[test]
    fn test_mark_expired_is_idempotent() {
        let mut listing = create_test_listing();
        listing.terms.expires_at = Utc::now() - Duration::hours(1);

        assert!(listing.mark_expired());
        assert_eq!(listing.status, ListingStatus::Expired);
        // Second sweep pass is a no-op
        assert!(!listing.mark_expired());
    }

    #[test]
    fn test_record_reference_idempotent() {
        let mut listing = create_test_listing();
        listing.record_reference("chain-tx-1");
        listing.record_reference("chain-tx-1");
        listing.record_reference("chain-tx-2");
        assert_eq!(listing.external_refs, vec!["chain-tx-1", "chain-tx-2"]);
    }

    #[test]
    fn test_reservation_nights() {
        let reservation = Reservation::new(
            UserId::new(),
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 9, 5).unwrap(),
            "Lisbon",
            Money::new(48000, "EUR"),
        );
        assert_eq!(reservation.nights(), 4);
    }
}
