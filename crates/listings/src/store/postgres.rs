//! PostgreSQL listing and reservation store implementation

#[cfg(feature = "postgres")]
use async_trait::async_trait;
#[cfg(feature = "postgres")]
use chrono::{DateTime, Utc};
#[cfg(feature = "postgres")]
use sqlx::{postgres::PgPool, Row};
#[cfg(feature = "postgres")]
use std::sync::Arc;

#[cfg(feature = "postgres")]
use common::types::{
    AcceptanceStrategy, AuctionId, ListingId, Money, PaymentPreference, ReservationId, UserId,
};

#[cfg(feature = "postgres")]
use crate::error::{ListingError, Result};
#[cfg(feature = "postgres")]
use crate::store::traits::{ListingStore, ReservationStore};
#[cfg(feature = "postgres")]
use crate::types::{Listing, ListingStatus, ListingTerms, Reservation, ReservationStatus};

/// Columns the engine requires on the `listings` table
///
/// Checked once at startup; replaces runtime "does this column exist"
/// fallback queries.
#[cfg(feature = "postgres")]
const REQUIRED_LISTING_COLUMNS: &[&str] = &[
    "listing_id",
    "reservation_id",
    "status",
    "strategy",
    "payment_preference",
    "extra_payment_minor",
    "extra_payment_currency",
    "conditions",
    "expires_at",
    "auction_id",
    "external_refs",
    "created_at",
    "updated_at",
];

/// PostgreSQL listing store
#[cfg(feature = "postgres")]
pub struct PostgresListingStore {
    pool: Arc<PgPool>,
}

#[cfg(feature = "postgres")]
impl PostgresListingStore {
    /// Create a new PostgreSQL listing store
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Validate that the live schema matches what the queries expect
    ///
    /// Call once at startup. Note: the `listings` check constraint is
    /// `expires_at > now() OR status IN ('cancelled', 'completed', 'expired')`,
    /// so terminal transitions never need a compensating expiry write.
    pub async fn validate_schema(&self) -> Result<()> {
        let rows = sqlx::query(
            r#"
            SELECT column_name FROM information_schema.columns
            WHERE table_name = 'listings'
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| ListingError::StorageError(e.to_string()))?;

        let present: Vec<String> = rows
            .iter()
            .map(|row| row.get::<String, _>("column_name"))
            .collect();

        for column in REQUIRED_LISTING_COLUMNS {
            if !present.iter().any(|c| c == column) {
                return Err(ListingError::StorageError(format!(
                    "listings table is missing required column '{}'",
                    column
                )));
            }
        }

        tracing::info!("Listing schema validated");
        Ok(())
    }

    fn row_to_listing(&self, row: &sqlx::postgres::PgRow) -> Result<Listing> {
        let status_str: String = row.get("status");
        let strategy_str: String = row.get("strategy");
        let preference_str: String = row.get("payment_preference");

        let status = match status_str.as_str() {
            "pending" => ListingStatus::Pending,
            "accepted" => ListingStatus::Accepted,
            "completed" => ListingStatus::Completed,
            "cancelled" => ListingStatus::Cancelled,
            "expired" => ListingStatus::Expired,
            other => {
                return Err(ListingError::StorageError(format!(
                    "unknown listing status '{}'",
                    other
                )))
            }
        };

        let strategy = match strategy_str.as_str() {
            "auction" => AcceptanceStrategy::Auction,
            _ => AcceptanceStrategy::FirstMatch,
        };

        let payment_preference = match preference_str.as_str() {
            "booking" => PaymentPreference::Booking,
            "cash" => PaymentPreference::Cash,
            _ => PaymentPreference::Both,
        };

        let extra_payment = match row.get::<Option<i64>, _>("extra_payment_minor") {
            Some(amount) => Some(Money::new(
                amount,
                row.get::<String, _>("extra_payment_currency"),
            )),
            None => None,
        };

        Ok(Listing {
            listing_id: ListingId(row.get("listing_id")),
            reservation_id: ReservationId(row.get("reservation_id")),
            status,
            terms: ListingTerms {
                extra_payment,
                conditions: row.get("conditions"),
                expires_at: row.get("expires_at"),
            },
            strategy,
            payment_preference,
            auction_id: row
                .get::<Option<uuid::Uuid>, _>("auction_id")
                .map(AuctionId),
            external_refs: row.get("external_refs"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[cfg(feature = "postgres")]
#[async_trait]
impl ListingStore for PostgresListingStore {
    async fn create(&self, listing: Listing) -> Result<Listing> {
        listing.check_valid(Utc::now())?;

        sqlx::query(
            r#"
            INSERT INTO listings (
                listing_id, reservation_id, status, strategy, payment_preference,
                extra_payment_minor, extra_payment_currency, conditions, expires_at,
                auction_id, external_refs, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(listing.listing_id.0)
        .bind(listing.reservation_id.0)
        .bind(listing.status.to_string())
        .bind(listing.strategy.to_string())
        .bind(listing.payment_preference.to_string())
        .bind(listing.terms.extra_payment.as_ref().map(|m| m.amount_minor))
        .bind(
            listing
                .terms
                .extra_payment
                .as_ref()
                .map(|m| m.currency.clone())
                .unwrap_or_default(),
        )
        .bind(&listing.terms.conditions)
        .bind(listing.terms.expires_at)
        .bind(listing.auction_id.map(|a| a.0))
        .bind(&listing.external_refs)
        .bind(listing.created_at)
        .bind(listing.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| ListingError::StorageError(e.to_string()))?;

        Ok(listing)
    }

    async fn get(&self, listing_id: ListingId) -> Result<Option<Listing>> {
        let result = sqlx::query("SELECT * FROM listings WHERE listing_id = $1")
            .bind(listing_id.0)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| ListingError::StorageError(e.to_string()))?;

        match result {
            Some(row) => Ok(Some(self.row_to_listing(&row)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, listing: &Listing) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE listings SET
                status = $2, strategy = $3, payment_preference = $4,
                extra_payment_minor = $5, extra_payment_currency = $6,
                conditions = $7, expires_at = $8, auction_id = $9,
                external_refs = $10, updated_at = $11
            WHERE listing_id = $1
            "#,
        )
        .bind(listing.listing_id.0)
        .bind(listing.status.to_string())
        .bind(listing.strategy.to_string())
        .bind(listing.payment_preference.to_string())
        .bind(listing.terms.extra_payment.as_ref().map(|m| m.amount_minor))
        .bind(
            listing
                .terms
                .extra_payment
                .as_ref()
                .map(|m| m.currency.clone())
                .unwrap_or_default(),
        )
        .bind(&listing.terms.conditions)
        .bind(listing.terms.expires_at)
        .bind(listing.auction_id.map(|a| a.0))
        .bind(&listing.external_refs)
        .bind(listing.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| ListingError::StorageError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(ListingError::NotFound(listing.listing_id));
        }
        Ok(())
    }

    async fn find_by_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<Listing>> {
        let result = sqlx::query(
            "SELECT * FROM listings WHERE reservation_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(reservation_id.0)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| ListingError::StorageError(e.to_string()))?;

        match result {
            Some(row) => Ok(Some(self.row_to_listing(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_by_status(&self, status: ListingStatus, limit: u32) -> Result<Vec<Listing>> {
        let rows = sqlx::query(
            "SELECT * FROM listings WHERE status = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(status.to_string())
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| ListingError::StorageError(e.to_string()))?;

        rows.iter().map(|row| self.row_to_listing(row)).collect()
    }

    async fn find_expired(&self, as_of: DateTime<Utc>, limit: u32) -> Result<Vec<Listing>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM listings
            WHERE status = 'pending' AND expires_at <= $1
            ORDER BY expires_at ASC LIMIT $2
            "#,
        )
        .bind(as_of)
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| ListingError::StorageError(e.to_string()))?;

        rows.iter().map(|row| self.row_to_listing(row)).collect()
    }
}

/// PostgreSQL reservation store
#[cfg(feature = "postgres")]
pub struct PostgresReservationStore {
    pool: Arc<PgPool>,
}

#[cfg(feature = "postgres")]
impl PostgresReservationStore {
    /// Create a new PostgreSQL reservation store
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    fn row_to_reservation(&self, row: &sqlx::postgres::PgRow) -> Result<Reservation> {
        let status_str: String = row.get("status");
        let status = match status_str.as_str() {
            "cancelled" => ReservationStatus::Cancelled,
            _ => ReservationStatus::Confirmed,
        };

        Ok(Reservation {
            reservation_id: ReservationId(row.get("reservation_id")),
            owner_id: UserId(row.get("owner_id")),
            check_in: row.get("check_in"),
            check_out: row.get("check_out"),
            location: row.get("location"),
            price: Money::new(
                row.get::<i64, _>("price_minor"),
                row.get::<String, _>("price_currency"),
            ),
            status,
        })
    }
}

#[cfg(feature = "postgres")]
#[async_trait]
impl ReservationStore for PostgresReservationStore {
    async fn create(&self, reservation: Reservation) -> Result<Reservation> {
        sqlx::query(
            r#"
            INSERT INTO reservations (
                reservation_id, owner_id, check_in, check_out, location,
                price_minor, price_currency, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(reservation.reservation_id.0)
        .bind(reservation.owner_id.0)
        .bind(reservation.check_in)
        .bind(reservation.check_out)
        .bind(&reservation.location)
        .bind(reservation.price.amount_minor)
        .bind(&reservation.price.currency)
        .bind(match reservation.status {
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        })
        .execute(&*self.pool)
        .await
        .map_err(|e| ListingError::StorageError(e.to_string()))?;

        Ok(reservation)
    }

    async fn get(&self, reservation_id: ReservationId) -> Result<Option<Reservation>> {
        let result = sqlx::query("SELECT * FROM reservations WHERE reservation_id = $1")
            .bind(reservation_id.0)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| ListingError::StorageError(e.to_string()))?;

        match result {
            Some(row) => Ok(Some(self.row_to_reservation(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_for_owner(&self, owner_id: UserId) -> Result<Vec<Reservation>> {
        let rows = sqlx::query("SELECT * FROM reservations WHERE owner_id = $1")
            .bind(owner_id.0)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| ListingError::StorageError(e.to_string()))?;

        rows.iter().map(|row| self.row_to_reservation(row)).collect()
    }
}
