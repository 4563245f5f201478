//! Common types used across OpenSwap
//!
//! This module provides the fundamental domain types used throughout
//! the exchange system.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListingId(pub Uuid);

impl ListingId {
    /// Create a new random ListingId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a ListingId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ListingId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ListingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for reservations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(pub Uuid);

impl ReservationId {
    /// Create a new random ReservationId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReservationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for target edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub Uuid);

impl EdgeId {
    /// Create a new random EdgeId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for auctions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuctionId(pub Uuid);

impl AuctionId {
    /// Create a new random AuctionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AuctionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for auction proposals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub Uuid);

impl ProposalId {
    /// Create a new random ProposalId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProposalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProposalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for users
///
/// Identity management is external; this is only an opaque reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Create a new random UserId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Acceptance strategy for a listing
///
/// Determines how many concurrent proposals a listing admits and how a
/// winner is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptanceStrategy {
    /// Only one active proposal at a time; the owner accepts it directly
    FirstMatch,
    /// Many concurrent proposals; resolved by explicit winner selection
    /// or expiry
    Auction,
}

impl std::fmt::Display for AcceptanceStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcceptanceStrategy::FirstMatch => write!(f, "first_match"),
            AcceptanceStrategy::Auction => write!(f, "auction"),
        }
    }
}

/// Payment preference for a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPreference {
    /// Booking-for-booking exchange only
    Booking,
    /// Cash offers only
    Cash,
    /// Either kind of proposal is welcome
    Both,
}

impl PaymentPreference {
    /// Returns true if cash proposals are accepted
    pub fn accepts_cash(&self) -> bool {
        matches!(self, PaymentPreference::Cash | PaymentPreference::Both)
    }

    /// Returns true if booking proposals are accepted
    pub fn accepts_booking(&self) -> bool {
        matches!(self, PaymentPreference::Booking | PaymentPreference::Both)
    }
}

impl std::fmt::Display for PaymentPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentPreference::Booking => write!(f, "booking"),
            PaymentPreference::Cash => write!(f, "cash"),
            PaymentPreference::Both => write!(f, "both"),
        }
    }
}

/// Monetary amount in minor units (cents) with an ISO currency code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (e.g. cents)
    pub amount_minor: i64,
    /// ISO 4217 currency code
    pub currency: String,
}

impl Money {
    /// Create a new amount
    pub fn new(amount_minor: i64, currency: impl Into<String>) -> Self {
        Self {
            amount_minor,
            currency: currency.into(),
        }
    }

    /// Returns true if the amount is positive and the currency is present
    pub fn is_valid_offer(&self) -> bool {
        self.amount_minor > 0 && !self.currency.trim().is_empty()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount_minor, self.currency)
    }
}

/// Summary of a user for presentation enrichment
///
/// Never used for authorization decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    /// Display name
    pub display_name: String,
    /// Contact email
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_id_display() {
        let id = ListingId::new();
        assert_eq!(format!("{}", id), format!("{}", id.0));
    }

    #[test]
    fn test_payment_preference_accepts() {
        assert!(PaymentPreference::Both.accepts_cash());
        assert!(PaymentPreference::Both.accepts_booking());
        assert!(PaymentPreference::Cash.accepts_cash());
        assert!(!PaymentPreference::Cash.accepts_booking());
        assert!(!PaymentPreference::Booking.accepts_cash());
    }

    #[test]
    fn test_money_is_valid_offer() {
        assert!(Money::new(100, "EUR").is_valid_offer());
        assert!(!Money::new(0, "EUR").is_valid_offer());
        assert!(!Money::new(-5, "EUR").is_valid_offer());
        assert!(!Money::new(100, "  ").is_valid_offer());
    }

    #[test]
    fn test_acceptance_strategy_serde() {
        let json = serde_json::to_string(&AcceptanceStrategy::FirstMatch).unwrap();
        assert_eq!(json, "\"first_match\"");
        let back: AcceptanceStrategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AcceptanceStrategy::FirstMatch);
    }
}
