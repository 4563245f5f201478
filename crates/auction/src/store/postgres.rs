//! PostgreSQL auction store implementation
//!
//! Winner selection is a single database transaction: the auction flips to
//! ended, the winner to selected and the losers to rejected together, or
//! the whole thing rolls back.

#[cfg(feature = "postgres")]
use async_trait::async_trait;
#[cfg(feature = "postgres")]
use chrono::{DateTime, Utc};
#[cfg(feature = "postgres")]
use sqlx::{postgres::PgPool, Row};
#[cfg(feature = "postgres")]
use std::sync::Arc;
#[cfg(feature = "postgres")]
use tracing::info;

#[cfg(feature = "postgres")]
use common::types::{AuctionId, ListingId, Money, ProposalId, UserId};

#[cfg(feature = "postgres")]
use crate::error::{AuctionError, Result};
#[cfg(feature = "postgres")]
use crate::store::traits::{AuctionStore, SelectionOutcome};
#[cfg(feature = "postgres")]
use crate::types::{
    Auction, AuctionProposal, AuctionSettings, AuctionStatus, ProposalKind, ProposalStatus,
};

/// PostgreSQL auction store
#[cfg(feature = "postgres")]
pub struct PostgresAuctionStore {
    pool: Arc<PgPool>,
}

/// Columns the engine requires on the auction tables
#[cfg(feature = "postgres")]
const REQUIRED_AUCTION_COLUMNS: &[&str] = &[
    "auction_id",
    "listing_id",
    "status",
    "ends_at",
    "max_proposals",
    "winning_proposal_id",
    "ended_at",
    "external_refs",
    "created_at",
    "updated_at",
];

#[cfg(feature = "postgres")]
const REQUIRED_PROPOSAL_COLUMNS: &[&str] = &[
    "proposal_id",
    "auction_id",
    "proposer_id",
    "kind",
    "source_listing_id",
    "cash_amount_minor",
    "cash_currency",
    "message",
    "conditions",
    "status",
    "submitted_at",
];

#[cfg(feature = "postgres")]
impl PostgresAuctionStore {
    /// Create a new PostgreSQL auction store
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Validate that the live schema matches what the queries expect
    ///
    /// Call once at startup; replaces runtime "does this column exist"
    /// fallback queries.
    pub async fn validate_schema(&self) -> Result<()> {
        for (table, required) in [
            ("auctions", REQUIRED_AUCTION_COLUMNS),
            ("auction_proposals", REQUIRED_PROPOSAL_COLUMNS),
        ] {
            let rows = sqlx::query(
                "SELECT column_name FROM information_schema.columns WHERE table_name = $1",
            )
            .bind(table)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| AuctionError::StorageError(e.to_string()))?;

            let present: Vec<String> = rows
                .iter()
                .map(|row| row.get::<String, _>("column_name"))
                .collect();

            for column in required {
                if !present.iter().any(|c| c == column) {
                    return Err(AuctionError::StorageError(format!(
                        "{} table is missing required column '{}'",
                        table, column
                    )));
                }
            }
        }

        tracing::info!("Auction schema validated");
        Ok(())
    }

    fn row_to_auction(row: &sqlx::postgres::PgRow) -> Result<Auction> {
        let status_str: String = row.get("status");
        let status = match status_str.as_str() {
            "active" => AuctionStatus::Active,
            "ended" => AuctionStatus::Ended,
            other => {
                return Err(AuctionError::StorageError(format!(
                    "unknown auction status '{}'",
                    other
                )))
            }
        };

        Ok(Auction {
            auction_id: AuctionId(row.get("auction_id")),
            listing_id: ListingId(row.get("listing_id")),
            status,
            settings: AuctionSettings {
                ends_at: row.get("ends_at"),
                max_proposals: row
                    .get::<Option<i32>, _>("max_proposals")
                    .map(|m| m as u32),
            },
            winning_proposal_id: row
                .get::<Option<uuid::Uuid>, _>("winning_proposal_id")
                .map(ProposalId),
            ended_at: row.get("ended_at"),
            external_refs: row.get("external_refs"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn row_to_proposal(row: &sqlx::postgres::PgRow) -> Result<AuctionProposal> {
        let kind_str: String = row.get("kind");
        let kind = match kind_str.as_str() {
            "booking" => ProposalKind::Booking {
                source_listing_id: ListingId(row.get("source_listing_id")),
            },
            "cash" => ProposalKind::Cash {
                offer: Money::new(
                    row.get::<i64, _>("cash_amount_minor"),
                    row.get::<String, _>("cash_currency"),
                ),
            },
            other => {
                return Err(AuctionError::StorageError(format!(
                    "unknown proposal kind '{}'",
                    other
                )))
            }
        };

        let status_str: String = row.get("status");
        let status = match status_str.as_str() {
            "pending" => ProposalStatus::Pending,
            "selected" => ProposalStatus::Selected,
            "rejected" => ProposalStatus::Rejected,
            other => {
                return Err(AuctionError::StorageError(format!(
                    "unknown proposal status '{}'",
                    other
                )))
            }
        };

        Ok(AuctionProposal {
            proposal_id: ProposalId(row.get("proposal_id")),
            auction_id: AuctionId(row.get("auction_id")),
            proposer_id: UserId(row.get("proposer_id")),
            kind,
            message: row.get("message"),
            conditions: row.get("conditions"),
            status,
            submitted_at: row.get("submitted_at"),
        })
    }
}

#[cfg(feature = "postgres")]
#[async_trait]
impl AuctionStore for PostgresAuctionStore {
    async fn create(&self, auction: Auction) -> Result<Auction> {
        sqlx::query(
            r#"
            INSERT INTO auctions (
                auction_id, listing_id, status, ends_at, max_proposals,
                winning_proposal_id, ended_at, external_refs, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(auction.auction_id.0)
        .bind(auction.listing_id.0)
        .bind(auction.status.to_string())
        .bind(auction.settings.ends_at)
        .bind(auction.settings.max_proposals.map(|m| m as i32))
        .bind(auction.winning_proposal_id.map(|p| p.0))
        .bind(auction.ended_at)
        .bind(&auction.external_refs)
        .bind(auction.created_at)
        .bind(auction.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| AuctionError::StorageError(e.to_string()))?;

        Ok(auction)
    }

    async fn get(&self, auction_id: AuctionId) -> Result<Option<Auction>> {
        let row = sqlx::query("SELECT * FROM auctions WHERE auction_id = $1")
            .bind(auction_id.0)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| AuctionError::StorageError(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_auction(&row)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, auction: &Auction) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE auctions SET
                status = $2, ends_at = $3, max_proposals = $4,
                winning_proposal_id = $5, ended_at = $6, external_refs = $7,
                updated_at = $8
            WHERE auction_id = $1
            "#,
        )
        .bind(auction.auction_id.0)
        .bind(auction.status.to_string())
        .bind(auction.settings.ends_at)
        .bind(auction.settings.max_proposals.map(|m| m as i32))
        .bind(auction.winning_proposal_id.map(|p| p.0))
        .bind(auction.ended_at)
        .bind(&auction.external_refs)
        .bind(auction.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| AuctionError::StorageError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AuctionError::AuctionNotFound(auction.auction_id));
        }
        Ok(())
    }

    async fn find_active_for_listing(&self, listing_id: ListingId) -> Result<Option<Auction>> {
        let row = sqlx::query(
            "SELECT * FROM auctions WHERE listing_id = $1 AND status = 'active' LIMIT 1",
        )
        .bind(listing_id.0)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| AuctionError::StorageError(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_auction(&row)?)),
            None => Ok(None),
        }
    }

    async fn add_proposal(&self, proposal: AuctionProposal) -> Result<AuctionProposal> {
        let (kind, source_listing_id, cash_amount, cash_currency) = match &proposal.kind {
            ProposalKind::Booking { source_listing_id } => {
                ("booking", Some(source_listing_id.0), None, None)
            }
            ProposalKind::Cash { offer } => (
                "cash",
                None,
                Some(offer.amount_minor),
                Some(offer.currency.clone()),
            ),
        };

        sqlx::query(
            r#"
            INSERT INTO auction_proposals (
                proposal_id, auction_id, proposer_id, kind, source_listing_id,
                cash_amount_minor, cash_currency, message, conditions, status,
                submitted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(proposal.proposal_id.0)
        .bind(proposal.auction_id.0)
        .bind(proposal.proposer_id.0)
        .bind(kind)
        .bind(source_listing_id)
        .bind(cash_amount)
        .bind(cash_currency)
        .bind(&proposal.message)
        .bind(&proposal.conditions)
        .bind(proposal.status.to_string())
        .bind(proposal.submitted_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| AuctionError::StorageError(e.to_string()))?;

        Ok(proposal)
    }

    async fn get_proposal(&self, proposal_id: ProposalId) -> Result<Option<AuctionProposal>> {
        let row = sqlx::query("SELECT * FROM auction_proposals WHERE proposal_id = $1")
            .bind(proposal_id.0)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| AuctionError::StorageError(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_proposal(&row)?)),
            None => Ok(None),
        }
    }

    async fn proposals_for(&self, auction_id: AuctionId) -> Result<Vec<AuctionProposal>> {
        let rows = sqlx::query(
            "SELECT * FROM auction_proposals WHERE auction_id = $1 ORDER BY submitted_at ASC",
        )
        .bind(auction_id.0)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| AuctionError::StorageError(e.to_string()))?;

        rows.iter().map(Self::row_to_proposal).collect()
    }

    async fn count_pending(&self, auction_id: AuctionId) -> Result<u64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS pending FROM auction_proposals
            WHERE auction_id = $1 AND status = 'pending'
            "#,
        )
        .bind(auction_id.0)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| AuctionError::StorageError(e.to_string()))?;

        Ok(row.get::<i64, _>("pending") as u64)
    }

    async fn select_winner(
        &self,
        auction_id: AuctionId,
        proposal_id: ProposalId,
        ended_at: DateTime<Utc>,
    ) -> Result<SelectionOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AuctionError::StorageError(e.to_string()))?;

        // End the auction; zero rows means it was never active here
        let auction_row = sqlx::query(
            r#"
            UPDATE auctions
            SET status = 'ended', winning_proposal_id = $2, ended_at = $3, updated_at = $3
            WHERE auction_id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(auction_id.0)
        .bind(proposal_id.0)
        .bind(ended_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AuctionError::StorageError(e.to_string()))?;

        let auction = match auction_row {
            Some(row) => Self::row_to_auction(&row)?,
            None => {
                let exists = sqlx::query("SELECT 1 FROM auctions WHERE auction_id = $1")
                    .bind(auction_id.0)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| AuctionError::StorageError(e.to_string()))?;
                return match exists {
                    Some(_) => Err(AuctionError::StaleState(format!(
                        "auction {} already ended",
                        auction_id
                    ))),
                    None => Err(AuctionError::AuctionNotFound(auction_id)),
                };
            }
        };

        // Promote the winner; zero rows aborts the whole transaction
        let winner_row = sqlx::query(
            r#"
            UPDATE auction_proposals
            SET status = 'selected'
            WHERE proposal_id = $1 AND auction_id = $2 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(proposal_id.0)
        .bind(auction_id.0)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AuctionError::StorageError(e.to_string()))?;

        let winner = match winner_row {
            Some(row) => Self::row_to_proposal(&row)?,
            None => {
                // Dropping the transaction rolls back the auction update
                return Err(AuctionError::StaleState(format!(
                    "proposal {} is not pending on auction {}",
                    proposal_id, auction_id
                )));
            }
        };

        // Reject every other still-pending proposal
        let rejected_rows = sqlx::query(
            r#"
            UPDATE auction_proposals
            SET status = 'rejected'
            WHERE auction_id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(auction_id.0)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AuctionError::StorageError(e.to_string()))?;

        let rejected: Vec<AuctionProposal> = rejected_rows
            .iter()
            .map(Self::row_to_proposal)
            .collect::<Result<_>>()?;

        tx.commit()
            .await
            .map_err(|e| AuctionError::StorageError(e.to_string()))?;

        info!(
            %auction_id,
            winner = %proposal_id,
            rejected = rejected.len(),
            "Auction winner selected"
        );
        Ok(SelectionOutcome {
            auction,
            winner,
            rejected,
        })
    }

    async fn end_without_winner(
        &self,
        auction_id: AuctionId,
        ended_at: DateTime<Utc>,
    ) -> Result<Auction> {
        let row = sqlx::query(
            r#"
            UPDATE auctions
            SET status = 'ended', ended_at = $2, updated_at = $2
            WHERE auction_id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(auction_id.0)
        .bind(ended_at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| AuctionError::StorageError(e.to_string()))?;

        match row {
            Some(row) => {
                info!(%auction_id, "Auction ended without winner");
                Self::row_to_auction(&row)
            }
            None => {
                let exists = sqlx::query("SELECT 1 FROM auctions WHERE auction_id = $1")
                    .bind(auction_id.0)
                    .fetch_optional(&*self.pool)
                    .await
                    .map_err(|e| AuctionError::StorageError(e.to_string()))?;
                match exists {
                    Some(_) => Err(AuctionError::StaleState(format!(
                        "auction {} already ended",
                        auction_id
                    ))),
                    None => Err(AuctionError::AuctionNotFound(auction_id)),
                }
            }
        }
    }

    async fn find_expired(&self, as_of: DateTime<Utc>, limit: u32) -> Result<Vec<Auction>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM auctions
            WHERE status = 'active' AND ends_at <= $1
            ORDER BY ends_at ASC LIMIT $2
            "#,
        )
        .bind(as_of)
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| AuctionError::StorageError(e.to_string()))?;

        rows.iter().map(Self::row_to_auction).collect()
    }
}
