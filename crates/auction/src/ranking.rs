//! Proposal ranking for the expiry sweep
//!
//! When an auction expires without an explicit winner selection, the sweep
//! picks the best-ranked still-pending proposal. The policy is a pluggable
//! comparator, not hard-coded into the engine.

use std::cmp::Ordering;

use crate::types::AuctionProposal;

/// Comparator over proposals; `Ordering::Greater` means `a` ranks above `b`
pub trait ProposalRanking: Send + Sync {
    /// Compare two proposals
    fn compare(&self, a: &AuctionProposal, b: &AuctionProposal) -> Ordering;

    /// The best proposal under this ranking, if any
    fn best<'a>(&self, proposals: &'a [AuctionProposal]) -> Option<&'a AuctionProposal> {
        proposals
            .iter()
            .max_by(|a, b| self.compare(a, b))
    }
}

/// Stock policy: highest cash offer wins; ties (including booking-only
/// fields) go to the earliest submission
pub struct HighestOfferRanking;

impl ProposalRanking for HighestOfferRanking {
    fn compare(&self, a: &AuctionProposal, b: &AuctionProposal) -> Ordering {
        a.kind
            .cash_amount()
            .cmp(&b.kind.cash_amount())
            // Later submissions rank lower
            .then_with(|| b.submitted_at.cmp(&a.submitted_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProposalKind;
    use common::types::{AuctionId, ListingId, Money, UserId};

    fn cash_proposal(auction: AuctionId, amount: i64) -> AuctionProposal {
        AuctionProposal::new(
            auction,
            UserId::new(),
            ProposalKind::Cash {
                offer: Money::new(amount, "EUR"),
            },
        )
    }

    fn booking_proposal(auction: AuctionId) -> AuctionProposal {
        AuctionProposal::new(
            auction,
            UserId::new(),
            ProposalKind::Booking {
                source_listing_id: ListingId::new(),
            },
        )
    }

    #[test]
    fn test_highest_cash_wins() {
        let auction = AuctionId::new();
        let proposals = vec![
            cash_proposal(auction, 5000),
            cash_proposal(auction, 20000),
            cash_proposal(auction, 12000),
        ];

        let best = HighestOfferRanking.best(&proposals).unwrap();
        assert_eq!(best.kind.cash_amount(), 20000);
    }

    #[test]
    fn test_booking_ties_resolve_by_age() {
        let auction = AuctionId::new();
        let first = booking_proposal(auction);
        let second = booking_proposal(auction);
        let proposals = vec![second.clone(), first.clone()];

        let best = HighestOfferRanking.best(&proposals).unwrap();
        assert_eq!(best.proposal_id, first.proposal_id);
    }

    #[test]
    fn test_empty_slate_has_no_best() {
        assert!(HighestOfferRanking.best(&[]).is_none());
    }
}
