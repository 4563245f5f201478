//! Read ports consumed by the resolver

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use common::types::ListingId;

use crate::error::Result;

/// End time and proposal cap of the active auction on a listing
#[derive(Debug, Clone, Copy)]
pub struct AuctionWindow {
    /// When the auction stops accepting proposals
    pub ends_at: DateTime<Utc>,
    /// Proposal cap from the auction settings, when set
    pub max_proposals: Option<u32>,
}

/// Read access to auction schedules
///
/// The resolver only needs to know whether an auction-mode listing is still
/// open and how many proposals it admits; the auction engine itself stays
/// behind this port.
#[async_trait]
pub trait AuctionSchedule: Send + Sync {
    /// The active auction window on a listing, if one exists
    async fn window_for(&self, listing_id: ListingId) -> Result<Option<AuctionWindow>>;
}
