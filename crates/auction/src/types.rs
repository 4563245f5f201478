//! Auction and proposal domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::types::{AuctionId, ListingId, Money, ProposalId, UserId};

/// Auction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    /// Accepting proposals
    Active,
    /// Closed, terminal
    Ended,
}

impl std::fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuctionStatus::Active => write!(f, "active"),
            AuctionStatus::Ended => write!(f, "ended"),
        }
    }
}

/// Auction settings fixed at creation
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AuctionSettings {
    /// When the auction stops accepting proposals
    pub ends_at: DateTime<Utc>,
    /// Proposal cap; the engine default applies when unset
    pub max_proposals: Option<u32>,
}

/// An auction attached to a listing in auction mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    /// Unique auction identifier
    pub auction_id: AuctionId,
    /// The listing being auctioned
    pub listing_id: ListingId,
    /// Current status
    pub status: AuctionStatus,
    /// Settings fixed at creation
    pub settings: AuctionSettings,
    /// The winning proposal, once selected
    pub winning_proposal_id: Option<ProposalId>,
    /// When the auction ended
    pub ended_at: Option<DateTime<Utc>>,
    /// Opaque settlement reference ids recorded by external systems
    pub external_refs: Vec<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Auction {
    /// Create a new active auction on a listing
    pub fn new(listing_id: ListingId, settings: AuctionSettings) -> Self {
        let now = Utc::now();
        Self {
            auction_id: AuctionId::new(),
            listing_id,
            status: AuctionStatus::Active,
            settings,
            winning_proposal_id: None,
            ended_at: None,
            external_refs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// True while the auction accepts proposals at `now`
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == AuctionStatus::Active && self.settings.ends_at > now
    }

    /// True when the auction is active but past its end date
    pub fn is_expiry_due(&self, now: DateTime<Utc>) -> bool {
        self.status == AuctionStatus::Active && self.settings.ends_at <= now
    }

    /// Record an external settlement reference (idempotent)
    pub fn record_reference(&mut self, reference: &str) {
        if !self.external_refs.iter().any(|r| r == reference) {
            self.external_refs.push(reference.to_string());
            self.updated_at = Utc::now();
        }
    }
}

/// What a proposal offers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProposalKind {
    /// Booking-for-booking: the proposer offers one of their own listings
    Booking {
        /// The proposer's listing backing the bid
        source_listing_id: ListingId,
    },
    /// Cash offer
    Cash {
        /// The offered amount
        offer: Money,
    },
}

impl ProposalKind {
    /// The cash amount in minor units, zero for booking proposals
    pub fn cash_amount(&self) -> i64 {
        match self {
            ProposalKind::Cash { offer } => offer.amount_minor,
            ProposalKind::Booking { .. } => 0,
        }
    }
}

/// Proposal status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Waiting for the auction to resolve
    Pending,
    /// Chosen as the winner, terminal
    Selected,
    /// Lost, terminal
    Rejected,
}

impl ProposalStatus {
    /// Returns true for statuses that allow no further transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Pending)
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProposalStatus::Pending => write!(f, "pending"),
            ProposalStatus::Selected => write!(f, "selected"),
            ProposalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A bid against an auction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionProposal {
    /// Unique proposal identifier
    pub proposal_id: ProposalId,
    /// The auction this bid belongs to
    pub auction_id: AuctionId,
    /// Who proposed
    pub proposer_id: UserId,
    /// What is offered
    pub kind: ProposalKind,
    /// Message to the listing owner
    pub message: Option<String>,
    /// Conditions attached by the proposer
    pub conditions: Option<String>,
    /// Current status
    pub status: ProposalStatus,
    /// Submission timestamp
    pub submitted_at: DateTime<Utc>,
}

impl AuctionProposal {
    /// Create a new pending proposal
    pub fn new(auction_id: AuctionId, proposer_id: UserId, kind: ProposalKind) -> Self {
        Self {
            proposal_id: ProposalId::new(),
            auction_id,
            proposer_id,
            kind,
            message: None,
            conditions: None,
            status: ProposalStatus::Pending,
            submitted_at: Utc::now(),
        }
    }

    /// Attach a message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach conditions
    pub fn with_conditions(mut self, conditions: impl Into<String>) -> Self {
        self.conditions = Some(conditions.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn auction_ending_in(duration: Duration) -> Auction {
        Auction::new(
            ListingId::new(),
            AuctionSettings {
                ends_at: Utc::now() + duration,
                max_proposals: None,
            },
        )
    }

    #[test]
    fn test_new_auction_is_open() {
        let auction = auction_ending_in(Duration::days(3));
        assert!(auction.is_open(Utc::now()));
        assert!(!auction.is_expiry_due(Utc::now()));
    }

    #[test]
    fn test_past_end_date_is_due() {
        let auction = auction_ending_in(Duration::hours(-1));
        assert!(!auction.is_open(Utc::now()));
        assert!(auction.is_expiry_due(Utc::now()));
    }

    #[test]
    fn test_cash_amount() {
        let cash = ProposalKind::Cash {
            offer: Money::new(12000, "EUR"),
        };
        let booking = ProposalKind::Booking {
            source_listing_id: ListingId::new(),
        };
        assert_eq!(cash.cash_amount(), 12000);
        assert_eq!(booking.cash_amount(), 0);
    }

    #[test]
    fn test_record_reference_idempotent() {
        let mut auction = auction_ending_in(Duration::days(1));
        auction.record_reference("settle-1");
        auction.record_reference("settle-1");
        assert_eq!(auction.external_refs.len(), 1);
    }
}
