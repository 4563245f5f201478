//! Derived ownership lookup
//!
//! Listings have no owner column. The owner of a listing is
//! `reservation(listing.reservation_id).owner_id`, resolved on every call.

use common::types::UserId;

use crate::error::{ListingError, Result};
use crate::store::traits::ReservationStore;
use crate::types::Listing;

/// Resolve the owner of a listing through its reservation
///
/// Never cached on the listing entity; stale-owner bugs are the reason this
/// indirection exists.
pub async fn owner_of(reservations: &dyn ReservationStore, listing: &Listing) -> Result<UserId> {
    let reservation = reservations
        .get(listing.reservation_id)
        .await?
        .ok_or(ListingError::ReservationNotFound(listing.reservation_id))?;
    Ok(reservation.owner_id)
}
