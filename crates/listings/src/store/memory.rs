//! In-memory listing and reservation stores

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use common::types::{ListingId, ReservationId, UserId};

use crate::error::{ListingError, Result};
use crate::store::traits::{ListingStore, ReservationStore};
use crate::types::{Listing, ListingStatus, Reservation};

/// In-memory listing store for testing and development
pub struct InMemoryListingStore {
    listings: RwLock<HashMap<ListingId, Listing>>,
}

impl InMemoryListingStore {
    /// Create a new in-memory listing store
    pub fn new() -> Self {
        Self {
            listings: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryListingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListingStore for InMemoryListingStore {
    async fn create(&self, listing: Listing) -> Result<Listing> {
        listing.check_valid(Utc::now())?;
        let mut listings = self.listings.write().unwrap();
        listings.insert(listing.listing_id, listing.clone());
        Ok(listing)
    }

    async fn get(&self, listing_id: ListingId) -> Result<Option<Listing>> {
        let listings = self.listings.read().unwrap();
        Ok(listings.get(&listing_id).cloned())
    }

    async fn update(&self, listing: &Listing) -> Result<()> {
        let mut listings = self.listings.write().unwrap();
        if listings.contains_key(&listing.listing_id) {
            listings.insert(listing.listing_id, listing.clone());
            Ok(())
        } else {
            Err(ListingError::NotFound(listing.listing_id))
        }
    }

    async fn find_by_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<Listing>> {
        let listings = self.listings.read().unwrap();
        Ok(listings
            .values()
            .find(|l| l.reservation_id == reservation_id)
            .cloned())
    }

    async fn list_by_status(&self, status: ListingStatus, limit: u32) -> Result<Vec<Listing>> {
        let listings = self.listings.read().unwrap();
        let mut result: Vec<Listing> = listings
            .values()
            .filter(|l| l.status == status)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result.truncate(limit as usize);
        Ok(result)
    }

    async fn find_expired(&self, as_of: DateTime<Utc>, limit: u32) -> Result<Vec<Listing>> {
        let listings = self.listings.read().unwrap();
        let mut result: Vec<Listing> = listings
            .values()
            .filter(|l| l.is_expiry_due(as_of))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.terms.expires_at.cmp(&b.terms.expires_at));
        result.truncate(limit as usize);
        Ok(result)
    }
}

/// In-memory reservation store for testing and development
pub struct InMemoryReservationStore {
    reservations: RwLock<HashMap<ReservationId, Reservation>>,
}

impl InMemoryReservationStore {
    /// Create a new in-memory reservation store
    pub fn new() -> Self {
        Self {
            reservations: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryReservationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn create(&self, reservation: Reservation) -> Result<Reservation> {
        let mut reservations = self.reservations.write().unwrap();
        reservations.insert(reservation.reservation_id, reservation.clone());
        Ok(reservation)
    }

    async fn get(&self, reservation_id: ReservationId) -> Result<Option<Reservation>> {
        let reservations = self.reservations.read().unwrap();
        Ok(reservations.get(&reservation_id).cloned())
    }

    async fn list_for_owner(&self, owner_id: UserId) -> Result<Vec<Reservation>> {
        let reservations = self.reservations.read().unwrap();
        Ok(reservations
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ListingTerms;
    use chrono::Duration;
    use common::types::{AcceptanceStrategy, Money, PaymentPreference};

    fn create_test_listing(expires_in: Duration) -> Listing {
        Listing::new(
            ReservationId::new(),
            ListingTerms::expiring_at(Utc::now() + expires_in),
            AcceptanceStrategy::FirstMatch,
            PaymentPreference::Both,
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryListingStore::new();
        let listing = create_test_listing(Duration::days(7));
        let listing_id = listing.listing_id;

        store.create(listing).await.unwrap();

        let retrieved = store.get(listing_id).await.unwrap();
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().status, ListingStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_rejects_expired_pending() {
        let store = InMemoryListingStore::new();
        let mut listing = create_test_listing(Duration::days(7));
        listing.terms.expires_at = Utc::now() - Duration::hours(1);

        let err = store.create(listing).await.unwrap_err();
        assert!(matches!(err, ListingError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_update_missing_listing() {
        let store = InMemoryListingStore::new();
        let listing = create_test_listing(Duration::days(7));

        let err = store.update(&listing).await.unwrap_err();
        assert!(matches!(err, ListingError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_find_expired_returns_oldest_first() {
        let store = InMemoryListingStore::new();

        let mut first = create_test_listing(Duration::days(7));
        first.terms.expires_at = Utc::now() - Duration::days(3);
        let mut second = create_test_listing(Duration::days(7));
        second.terms.expires_at = Utc::now() - Duration::days(1);

        // Insert directly; create() would reject past expiries
        {
            let mut listings = store.listings.write().unwrap();
            listings.insert(first.listing_id, first.clone());
            listings.insert(second.listing_id, second.clone());
        }

        let expired = store.find_expired(Utc::now(), 10).await.unwrap();
        assert_eq!(expired.len(), 2);
        assert_eq!(expired[0].listing_id, first.listing_id);

        // A second pass without writes returns the same set
        let again = store.find_expired(Utc::now(), 10).await.unwrap();
        assert_eq!(again.len(), 2);
    }

    #[tokio::test]
    async fn test_list_for_owner() {
        let store = InMemoryReservationStore::new();
        let owner = UserId::new();

        for location in ["Lisbon", "Porto"] {
            let reservation = Reservation::new(
                owner,
                chrono::NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                chrono::NaiveDate::from_ymd_opt(2026, 9, 8).unwrap(),
                location,
                Money::new(50000, "EUR"),
            );
            store.create(reservation).await.unwrap();
        }

        let owned = store.list_for_owner(owner).await.unwrap();
        assert_eq!(owned.len(), 2);

        let other = store.list_for_owner(UserId::new()).await.unwrap();
        assert!(other.is_empty());
    }
}
