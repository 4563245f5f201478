//! Target edge and history domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::types::{EdgeId, ListingId};

/// Target edge status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStatus {
    /// The proposal stands
    Active,
    /// The target's owner (or the auction winner path) accepted it
    Accepted,
    /// Rejected, e.g. as an auction loser
    Rejected,
    /// Withdrawn, usually by retargeting
    Cancelled,
}

impl EdgeStatus {
    /// Returns true for statuses that allow no further transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EdgeStatus::Active)
    }
}

impl std::fmt::Display for EdgeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeStatus::Active => write!(f, "active"),
            EdgeStatus::Accepted => write!(f, "accepted"),
            EdgeStatus::Rejected => write!(f, "rejected"),
            EdgeStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A directed edge: "the source listing wants to exchange with the target"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetEdge {
    /// Unique edge identifier
    pub edge_id: EdgeId,
    /// The proposing listing
    pub source_listing_id: ListingId,
    /// The listing being targeted
    pub target_listing_id: ListingId,
    /// Current status
    pub status: EdgeStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last transition timestamp
    pub updated_at: DateTime<Utc>,
}

impl TargetEdge {
    /// Create a new active edge
    pub fn new(source_listing_id: ListingId, target_listing_id: ListingId) -> Self {
        let now = Utc::now();
        Self {
            edge_id: EdgeId::new(),
            source_listing_id,
            target_listing_id,
            status: EdgeStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true while the edge is active
    pub fn is_active(&self) -> bool {
        self.status == EdgeStatus::Active
    }
}

/// History action recorded for an edge transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    Cancelled,
    Accepted,
    Rejected,
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryAction::Created => write!(f, "created"),
            HistoryAction::Cancelled => write!(f, "cancelled"),
            HistoryAction::Accepted => write!(f, "accepted"),
            HistoryAction::Rejected => write!(f, "rejected"),
        }
    }
}

/// Immutable record of an edge transition
///
/// Written in the same transaction as the edge mutation it documents.
/// Never updated or deleted; corrections append new entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique entry identifier
    pub entry_id: uuid::Uuid,
    /// The edge this entry documents
    pub edge_id: EdgeId,
    /// Source listing of that edge
    pub source_listing_id: ListingId,
    /// Target listing of that edge
    pub target_listing_id: ListingId,
    /// What happened
    pub action: HistoryAction,
    /// Why, when the caller supplied a reason (e.g. "retargeting")
    pub reason: Option<String>,
    /// Free-form metadata
    pub metadata: Option<serde_json::Value>,
    /// When it happened
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Create an entry documenting a transition on an edge
    pub fn for_edge(edge: &TargetEdge, action: HistoryAction, reason: Option<String>) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4(),
            edge_id: edge.edge_id,
            source_listing_id: edge.source_listing_id,
            target_listing_id: edge.target_listing_id,
            action,
            reason,
            metadata: None,
            recorded_at: Utc::now(),
        }
    }

    /// Returns true if the entry involves the given listing
    pub fn involves(&self, listing_id: ListingId) -> bool {
        self.source_listing_id == listing_id || self.target_listing_id == listing_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_edge_is_active() {
        let edge = TargetEdge::new(ListingId::new(), ListingId::new());
        assert!(edge.is_active());
        assert!(!edge.status.is_terminal());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(EdgeStatus::Accepted.is_terminal());
        assert!(EdgeStatus::Rejected.is_terminal());
        assert!(EdgeStatus::Cancelled.is_terminal());
        assert!(!EdgeStatus::Active.is_terminal());
    }

    #[test]
    fn test_history_involves_both_endpoints() {
        let edge = TargetEdge::new(ListingId::new(), ListingId::new());
        let entry = HistoryEntry::for_edge(&edge, HistoryAction::Created, None);
        assert!(entry.involves(edge.source_listing_id));
        assert!(entry.involves(edge.target_listing_id));
        assert!(!entry.involves(ListingId::new()));
    }
}
