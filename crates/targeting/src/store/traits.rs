//! TargetStore trait definition

use async_trait::async_trait;

use common::types::{EdgeId, ListingId};

use crate::error::Result;
use crate::types::{HistoryEntry, TargetEdge};

/// How many active incoming edges the target listing admits
///
/// The target's acceptance strategy decides this; the graph store only
/// enforces the structural consequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomingPolicy {
    /// First-match target: at most one active incoming edge
    Exclusive,
    /// Auction target: any number of active incoming edges until the
    /// auction closes
    Shared,
}

/// TargetStore trait - transactional interface to the targeting graph
///
/// Every mutation is all-or-nothing, including its history writes. A failed
/// call leaves the graph exactly as it was.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Create an active edge source → target
    ///
    /// Fails with `SelfTarget` when source == target, with `Cycle` when a
    /// path target → … → source already exists through active edges, and
    /// with `AlreadyTargeted` when `policy` is exclusive and another source
    /// already holds an active incoming edge.
    ///
    /// On success, any other active outgoing edge of `source` is cancelled
    /// in the same transaction (one `cancelled` history entry each, reason
    /// "retargeting") and the new edge gets a `created` history entry.
    async fn create_edge(
        &self,
        source: ListingId,
        target: ListingId,
        policy: IncomingPolicy,
    ) -> Result<TargetEdge>;

    /// Cancel all active outgoing edges of `source`
    ///
    /// Each cancellation is paired with a history entry carrying the given
    /// reason. Returns the cancelled edges.
    async fn cancel_outgoing_edges(
        &self,
        source: ListingId,
        reason: &str,
    ) -> Result<Vec<TargetEdge>>;

    /// Transition an active edge to accepted
    ///
    /// For auction-mode targets this is invoked by the winner-selection
    /// path rather than directly.
    async fn accept_edge(&self, edge_id: EdgeId) -> Result<TargetEdge>;

    /// Transition an active edge to rejected (auction loser path)
    async fn reject_edge(&self, edge_id: EdgeId, reason: &str) -> Result<TargetEdge>;

    /// Get an edge by ID
    async fn get_edge(&self, edge_id: EdgeId) -> Result<Option<TargetEdge>>;

    /// The active outgoing edge of `source`, if one exists
    ///
    /// The retargeting invariant keeps this at most one.
    async fn active_outgoing(&self, source: ListingId) -> Result<Option<TargetEdge>>;

    /// All active incoming edges of `target`
    async fn active_incoming(&self, target: ListingId) -> Result<Vec<TargetEdge>>;

    /// Number of active incoming edges of `target`
    async fn count_active_incoming(&self, target: ListingId) -> Result<u64>;

    /// Whether `source` currently has an active outgoing edge
    async fn has_active_outgoing(&self, source: ListingId) -> Result<bool>;

    /// History entries where the listing is source or target, newest first
    ///
    /// The log is append-only; there is no update or delete.
    async fn history_for(&self, listing_id: ListingId) -> Result<Vec<HistoryEntry>>;
}
