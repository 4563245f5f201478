//! PostgreSQL targeting graph store implementation
//!
//! Every mutation runs inside a single database transaction so the edge
//! write and its history entries land together or not at all. A partial
//! unique index on (source_listing_id) WHERE status = 'active' backs the
//! one-active-outgoing invariant at the storage layer, independent of the
//! application-level checks.

#[cfg(feature = "postgres")]
use async_trait::async_trait;
#[cfg(feature = "postgres")]
use chrono::Utc;
#[cfg(feature = "postgres")]
use sqlx::{postgres::PgPool, Postgres, Row, Transaction};
#[cfg(feature = "postgres")]
use std::sync::Arc;
#[cfg(feature = "postgres")]
use tracing::{debug, info};
#[cfg(feature = "postgres")]
use uuid::Uuid;

#[cfg(feature = "postgres")]
use common::types::{EdgeId, ListingId};

#[cfg(feature = "postgres")]
use crate::error::{Result, TargetingError};
#[cfg(feature = "postgres")]
use crate::store::traits::{IncomingPolicy, TargetStore};
#[cfg(feature = "postgres")]
use crate::types::{EdgeStatus, HistoryAction, HistoryEntry, TargetEdge};

/// Columns the engine requires on the targeting tables
#[cfg(feature = "postgres")]
const REQUIRED_EDGE_COLUMNS: &[&str] = &[
    "edge_id",
    "source_listing_id",
    "target_listing_id",
    "status",
    "created_at",
    "updated_at",
];

#[cfg(feature = "postgres")]
const REQUIRED_HISTORY_COLUMNS: &[&str] = &[
    "entry_id",
    "edge_id",
    "source_listing_id",
    "target_listing_id",
    "action",
    "reason",
    "metadata",
    "recorded_at",
];

/// PostgreSQL target store
#[cfg(feature = "postgres")]
pub struct PostgresTargetStore {
    pool: Arc<PgPool>,
    max_cycle_depth: usize,
}

#[cfg(feature = "postgres")]
impl PostgresTargetStore {
    /// Create a new PostgreSQL target store
    pub fn new(pool: PgPool, max_cycle_depth: usize) -> Self {
        Self {
            pool: Arc::new(pool),
            max_cycle_depth,
        }
    }

    /// Validate that the live schema matches what the queries expect
    ///
    /// Call once at startup; replaces runtime "does this column exist"
    /// fallback queries.
    pub async fn validate_schema(&self) -> Result<()> {
        for (table, required) in [
            ("target_edges", REQUIRED_EDGE_COLUMNS),
            ("targeting_history", REQUIRED_HISTORY_COLUMNS),
        ] {
            let rows = sqlx::query(
                "SELECT column_name FROM information_schema.columns WHERE table_name = $1",
            )
            .bind(table)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| TargetingError::StorageError(e.to_string()))?;

            let present: Vec<String> = rows
                .iter()
                .map(|row| row.get::<String, _>("column_name"))
                .collect();

            for column in required {
                if !present.iter().any(|c| c == column) {
                    return Err(TargetingError::StorageError(format!(
                        "{} table is missing required column '{}'",
                        table, column
                    )));
                }
            }
        }

        tracing::info!("Targeting schema validated");
        Ok(())
    }

    /// Level-wise traversal of active edges inside the transaction
    ///
    /// Postgres counterpart of [`crate::cycle::path_exists`]: one query per
    /// frontier level, bounded by the configured depth.
    async fn path_exists_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        from: ListingId,
        to: ListingId,
    ) -> Result<bool> {
        let mut frontier: Vec<Uuid> = vec![from.0];
        let mut visited: Vec<Uuid> = vec![from.0];

        for _ in 0..self.max_cycle_depth {
            if frontier.is_empty() {
                break;
            }
            let rows = sqlx::query(
                r#"
                SELECT DISTINCT target_listing_id FROM target_edges
                WHERE source_listing_id = ANY($1) AND status = 'active'
                "#,
            )
            .bind(&frontier)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| TargetingError::StorageError(e.to_string()))?;

            let mut next = Vec::new();
            for row in rows {
                let target: Uuid = row.get("target_listing_id");
                if target == to.0 {
                    return Ok(true);
                }
                if !visited.contains(&target) {
                    visited.push(target);
                    next.push(target);
                }
            }
            frontier = next;
        }

        Ok(false)
    }

    async fn insert_history(
        tx: &mut Transaction<'_, Postgres>,
        entry: &HistoryEntry,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO targeting_history (
                entry_id, edge_id, source_listing_id, target_listing_id,
                action, reason, metadata, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.entry_id)
        .bind(entry.edge_id.0)
        .bind(entry.source_listing_id.0)
        .bind(entry.target_listing_id.0)
        .bind(entry.action.to_string())
        .bind(&entry.reason)
        .bind(&entry.metadata)
        .bind(entry.recorded_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| TargetingError::StorageError(e.to_string()))?;
        Ok(())
    }

    fn row_to_edge(row: &sqlx::postgres::PgRow) -> Result<TargetEdge> {
        let status_str: String = row.get("status");
        let status = match status_str.as_str() {
            "active" => EdgeStatus::Active,
            "accepted" => EdgeStatus::Accepted,
            "rejected" => EdgeStatus::Rejected,
            "cancelled" => EdgeStatus::Cancelled,
            other => {
                return Err(TargetingError::StorageError(format!(
                    "unknown edge status '{}'",
                    other
                )))
            }
        };

        Ok(TargetEdge {
            edge_id: EdgeId(row.get("edge_id")),
            source_listing_id: ListingId(row.get("source_listing_id")),
            target_listing_id: ListingId(row.get("target_listing_id")),
            status,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn row_to_history(row: &sqlx::postgres::PgRow) -> Result<HistoryEntry> {
        let action_str: String = row.get("action");
        let action = match action_str.as_str() {
            "created" => HistoryAction::Created,
            "cancelled" => HistoryAction::Cancelled,
            "accepted" => HistoryAction::Accepted,
            "rejected" => HistoryAction::Rejected,
            other => {
                return Err(TargetingError::StorageError(format!(
                    "unknown history action '{}'",
                    other
                )))
            }
        };

        Ok(HistoryEntry {
            entry_id: row.get("entry_id"),
            edge_id: EdgeId(row.get("edge_id")),
            source_listing_id: ListingId(row.get("source_listing_id")),
            target_listing_id: ListingId(row.get("target_listing_id")),
            action,
            reason: row.get("reason"),
            metadata: row.get("metadata"),
            recorded_at: row.get("recorded_at"),
        })
    }

    /// Cancel all active outgoing edges of `source` inside `tx`
    async fn cancel_outgoing_tx(
        tx: &mut Transaction<'_, Postgres>,
        source: ListingId,
        reason: &str,
    ) -> Result<Vec<TargetEdge>> {
        let rows = sqlx::query(
            r#"
            UPDATE target_edges
            SET status = 'cancelled', updated_at = $2
            WHERE source_listing_id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(source.0)
        .bind(Utc::now())
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| TargetingError::StorageError(e.to_string()))?;

        let mut cancelled = Vec::with_capacity(rows.len());
        for row in &rows {
            let edge = Self::row_to_edge(row)?;
            let entry = HistoryEntry::for_edge(
                &edge,
                HistoryAction::Cancelled,
                Some(reason.to_string()),
            );
            Self::insert_history(tx, &entry).await?;
            cancelled.push(edge);
        }
        Ok(cancelled)
    }

    async fn transition_edge(
        &self,
        edge_id: EdgeId,
        to: EdgeStatus,
        action: HistoryAction,
        reason: Option<String>,
    ) -> Result<TargetEdge> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TargetingError::StorageError(e.to_string()))?;

        let row = sqlx::query(
            r#"
            UPDATE target_edges
            SET status = $2, updated_at = $3
            WHERE edge_id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(edge_id.0)
        .bind(to.to_string())
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| TargetingError::StorageError(e.to_string()))?;

        let edge = match row {
            Some(row) => Self::row_to_edge(&row)?,
            None => {
                // Fresh read to tell "missing" from "already transitioned"
                let existing = sqlx::query("SELECT status FROM target_edges WHERE edge_id = $1")
                    .bind(edge_id.0)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| TargetingError::StorageError(e.to_string()))?;
                return match existing {
                    Some(row) => Err(TargetingError::StaleState(format!(
                        "edge {} is already {}",
                        edge_id,
                        row.get::<String, _>("status")
                    ))),
                    None => Err(TargetingError::EdgeNotFound(edge_id)),
                };
            }
        };

        let entry = HistoryEntry::for_edge(&edge, action, reason);
        Self::insert_history(&mut tx, &entry).await?;

        tx.commit()
            .await
            .map_err(|e| TargetingError::StorageError(e.to_string()))?;
        Ok(edge)
    }
}

#[cfg(feature = "postgres")]
#[async_trait]
impl TargetStore for PostgresTargetStore {
    async fn create_edge(
        &self,
        source: ListingId,
        target: ListingId,
        policy: IncomingPolicy,
    ) -> Result<TargetEdge> {
        if source == target {
            return Err(TargetingError::SelfTarget(source));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TargetingError::StorageError(e.to_string()))?;

        if self.path_exists_tx(&mut tx, target, source).await? {
            debug!(%source, %target, "Edge rejected: cycle");
            return Err(TargetingError::Cycle { origin: source, target });
        }

        if policy == IncomingPolicy::Exclusive {
            let row = sqlx::query(
                r#"
                SELECT COUNT(*) AS conflicts FROM target_edges
                WHERE target_listing_id = $1 AND status = 'active'
                  AND source_listing_id <> $2
                "#,
            )
            .bind(target.0)
            .bind(source.0)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| TargetingError::StorageError(e.to_string()))?;

            if row.get::<i64, _>("conflicts") > 0 {
                debug!(%source, %target, "Edge rejected: target already taken");
                return Err(TargetingError::AlreadyTargeted(target));
            }
        }

        Self::cancel_outgoing_tx(&mut tx, source, "retargeting").await?;

        let edge = TargetEdge::new(source, target);
        sqlx::query(
            r#"
            INSERT INTO target_edges (
                edge_id, source_listing_id, target_listing_id, status,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(edge.edge_id.0)
        .bind(edge.source_listing_id.0)
        .bind(edge.target_listing_id.0)
        .bind(edge.status.to_string())
        .bind(edge.created_at)
        .bind(edge.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e.as_database_error().and_then(|d| d.code()) {
            // Unique-index abort from a concurrent writer surfaces as the
            // same conflict the in-transaction read would have reported
            Some(code) if code == "23505" => TargetingError::AlreadyTargeted(target),
            _ => TargetingError::StorageError(e.to_string()),
        })?;

        let entry = HistoryEntry::for_edge(&edge, HistoryAction::Created, None);
        Self::insert_history(&mut tx, &entry).await?;

        tx.commit()
            .await
            .map_err(|e| TargetingError::StorageError(e.to_string()))?;

        info!(edge_id = %edge.edge_id, %source, %target, "Target edge created");
        Ok(edge)
    }

    async fn cancel_outgoing_edges(
        &self,
        source: ListingId,
        reason: &str,
    ) -> Result<Vec<TargetEdge>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TargetingError::StorageError(e.to_string()))?;

        let cancelled = Self::cancel_outgoing_tx(&mut tx, source, reason).await?;

        tx.commit()
            .await
            .map_err(|e| TargetingError::StorageError(e.to_string()))?;

        if !cancelled.is_empty() {
            info!(%source, count = cancelled.len(), reason, "Outgoing edges cancelled");
        }
        Ok(cancelled)
    }

    async fn accept_edge(&self, edge_id: EdgeId) -> Result<TargetEdge> {
        let edge = self
            .transition_edge(edge_id, EdgeStatus::Accepted, HistoryAction::Accepted, None)
            .await?;
        info!(%edge_id, "Target edge accepted");
        Ok(edge)
    }

    async fn reject_edge(&self, edge_id: EdgeId, reason: &str) -> Result<TargetEdge> {
        self.transition_edge(
            edge_id,
            EdgeStatus::Rejected,
            HistoryAction::Rejected,
            Some(reason.to_string()),
        )
        .await
    }

    async fn get_edge(&self, edge_id: EdgeId) -> Result<Option<TargetEdge>> {
        let row = sqlx::query("SELECT * FROM target_edges WHERE edge_id = $1")
            .bind(edge_id.0)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| TargetingError::StorageError(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_edge(&row)?)),
            None => Ok(None),
        }
    }

    async fn active_outgoing(&self, source: ListingId) -> Result<Option<TargetEdge>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM target_edges
            WHERE source_listing_id = $1 AND status = 'active'
            LIMIT 1
            "#,
        )
        .bind(source.0)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| TargetingError::StorageError(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_edge(&row)?)),
            None => Ok(None),
        }
    }

    async fn active_incoming(&self, target: ListingId) -> Result<Vec<TargetEdge>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM target_edges
            WHERE target_listing_id = $1 AND status = 'active'
            ORDER BY created_at ASC
            "#,
        )
        .bind(target.0)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| TargetingError::StorageError(e.to_string()))?;

        rows.iter().map(Self::row_to_edge).collect()
    }

    async fn count_active_incoming(&self, target: ListingId) -> Result<u64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS active FROM target_edges
            WHERE target_listing_id = $1 AND status = 'active'
            "#,
        )
        .bind(target.0)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| TargetingError::StorageError(e.to_string()))?;

        Ok(row.get::<i64, _>("active") as u64)
    }

    async fn has_active_outgoing(&self, source: ListingId) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM target_edges
                WHERE source_listing_id = $1 AND status = 'active'
            ) AS present
            "#,
        )
        .bind(source.0)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| TargetingError::StorageError(e.to_string()))?;

        Ok(row.get("present"))
    }

    async fn history_for(&self, listing_id: ListingId) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM targeting_history
            WHERE source_listing_id = $1 OR target_listing_id = $1
            ORDER BY recorded_at DESC
            "#,
        )
        .bind(listing_id.0)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| TargetingError::StorageError(e.to_string()))?;

        rows.iter().map(Self::row_to_history).collect()
    }
}
