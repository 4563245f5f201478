//! ListingStore and ReservationStore trait definitions

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use common::types::{ListingId, ReservationId, UserId};

use crate::error::Result;
use crate::types::{Listing, ListingStatus, Reservation};

/// ListingStore trait - defines the interface for listing storage
///
/// This trait allows different storage implementations (in-memory,
/// PostgreSQL, etc.) to be swapped without changing the business logic.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Create a new listing
    async fn create(&self, listing: Listing) -> Result<Listing>;

    /// Get a listing by ID
    async fn get(&self, listing_id: ListingId) -> Result<Option<Listing>>;

    /// Update an existing listing
    async fn update(&self, listing: &Listing) -> Result<()>;

    /// Find the listing built on a reservation, if any
    async fn find_by_reservation(&self, reservation_id: ReservationId)
        -> Result<Option<Listing>>;

    /// List listings in a given status
    async fn list_by_status(&self, status: ListingStatus, limit: u32) -> Result<Vec<Listing>>;

    /// Pending listings whose expiry has passed as of `as_of`
    ///
    /// Consumed by the expiry sweep; ordering is oldest expiry first.
    async fn find_expired(&self, as_of: DateTime<Utc>, limit: u32) -> Result<Vec<Listing>>;
}

/// ReservationStore trait - read-mostly access to the underlying bookings
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Create a reservation record
    async fn create(&self, reservation: Reservation) -> Result<Reservation>;

    /// Get a reservation by ID
    async fn get(&self, reservation_id: ReservationId) -> Result<Option<Reservation>>;

    /// All reservations owned by a user
    async fn list_for_owner(&self, owner_id: UserId) -> Result<Vec<Reservation>>;
}
