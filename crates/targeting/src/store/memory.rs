//! In-memory targeting graph store
//!
//! The whole graph lives behind one `RwLock`; each logical transaction
//! holds the write guard for its full read-then-write span, which gives the
//! same isolation the Postgres backend gets from a database transaction.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};

use common::types::{EdgeId, ListingId};

use crate::cycle::{path_exists, OutgoingEdges};
use crate::error::{Result, TargetingError};
use crate::store::traits::{IncomingPolicy, TargetStore};
use crate::types::{EdgeStatus, HistoryAction, HistoryEntry, TargetEdge};

/// Reason recorded when a prior edge is cancelled by a new one
const RETARGETING_REASON: &str = "retargeting";

#[derive(Default)]
struct GraphState {
    edges: HashMap<EdgeId, TargetEdge>,
    history: Vec<HistoryEntry>,
}

impl GraphState {
    fn active_outgoing_of(&self, source: ListingId) -> Vec<&TargetEdge> {
        self.edges
            .values()
            .filter(|e| e.source_listing_id == source && e.is_active())
            .collect()
    }

    fn active_incoming_of(&self, target: ListingId) -> Vec<&TargetEdge> {
        self.edges
            .values()
            .filter(|e| e.target_listing_id == target && e.is_active())
            .collect()
    }
}

impl OutgoingEdges for GraphState {
    fn active_targets(&self, listing: ListingId) -> Vec<ListingId> {
        self.active_outgoing_of(listing)
            .iter()
            .map(|e| e.target_listing_id)
            .collect()
    }
}

/// In-memory target store for testing and development
pub struct InMemoryTargetStore {
    state: RwLock<GraphState>,
    max_cycle_depth: usize,
}

impl InMemoryTargetStore {
    /// Create a store with the given cycle-check depth bound
    pub fn new(max_cycle_depth: usize) -> Self {
        Self {
            state: RwLock::new(GraphState::default()),
            max_cycle_depth,
        }
    }

    fn transition_edge(
        &self,
        edge_id: EdgeId,
        to: EdgeStatus,
        action: HistoryAction,
        reason: Option<String>,
    ) -> Result<TargetEdge> {
        let mut state = self.state.write().unwrap();

        let edge = state
            .edges
            .get_mut(&edge_id)
            .ok_or(TargetingError::EdgeNotFound(edge_id))?;

        if edge.status.is_terminal() {
            return Err(TargetingError::StaleState(format!(
                "edge {} is already {}",
                edge_id, edge.status
            )));
        }

        edge.status = to;
        edge.updated_at = Utc::now();
        let updated = edge.clone();

        let entry = HistoryEntry::for_edge(&updated, action, reason);
        state.history.push(entry);

        Ok(updated)
    }
}

impl Default for InMemoryTargetStore {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl TargetStore for InMemoryTargetStore {
    async fn create_edge(
        &self,
        source: ListingId,
        target: ListingId,
        policy: IncomingPolicy,
    ) -> Result<TargetEdge> {
        if source == target {
            return Err(TargetingError::SelfTarget(source));
        }

        // One write guard spans the whole read-then-write transaction
        let mut state = self.state.write().unwrap();

        // Cycle check: would a path target → … → source close a loop?
        if path_exists(&*state, target, source, self.max_cycle_depth) {
            debug!(%source, %target, "Edge rejected: cycle");
            return Err(TargetingError::Cycle { origin: source, target });
        }

        // Exclusive targets admit one active incoming edge; the existing
        // proposer retargeting onto the same listing is not a conflict.
        if policy == IncomingPolicy::Exclusive {
            let conflicting = state
                .active_incoming_of(target)
                .iter()
                .any(|e| e.source_listing_id != source);
            if conflicting {
                debug!(%source, %target, "Edge rejected: target already taken");
                return Err(TargetingError::AlreadyTargeted(target));
            }
        }

        // Retargeting: cancel whatever the source was targeting before
        let prior: Vec<EdgeId> = state
            .active_outgoing_of(source)
            .iter()
            .map(|e| e.edge_id)
            .collect();
        for edge_id in prior {
            let edge = state.edges.get_mut(&edge_id).expect("edge exists");
            edge.status = EdgeStatus::Cancelled;
            edge.updated_at = Utc::now();
            let entry = HistoryEntry::for_edge(
                &edge.clone(),
                HistoryAction::Cancelled,
                Some(RETARGETING_REASON.to_string()),
            );
            state.history.push(entry);
        }

        let edge = TargetEdge::new(source, target);
        let entry = HistoryEntry::for_edge(&edge, HistoryAction::Created, None);
        state.edges.insert(edge.edge_id, edge.clone());
        state.history.push(entry);

        info!(edge_id = %edge.edge_id, %source, %target, "Target edge created");
        Ok(edge)
    }

    async fn cancel_outgoing_edges(
        &self,
        source: ListingId,
        reason: &str,
    ) -> Result<Vec<TargetEdge>> {
        let mut state = self.state.write().unwrap();

        let active: Vec<EdgeId> = state
            .active_outgoing_of(source)
            .iter()
            .map(|e| e.edge_id)
            .collect();

        let mut cancelled = Vec::with_capacity(active.len());
        for edge_id in active {
            let edge = state.edges.get_mut(&edge_id).expect("edge exists");
            edge.status = EdgeStatus::Cancelled;
            edge.updated_at = Utc::now();
            let updated = edge.clone();
            let entry = HistoryEntry::for_edge(
                &updated,
                HistoryAction::Cancelled,
                Some(reason.to_string()),
            );
            state.history.push(entry);
            cancelled.push(updated);
        }

        if !cancelled.is_empty() {
            info!(%source, count = cancelled.len(), reason, "Outgoing edges cancelled");
        }
        Ok(cancelled)
    }

    async fn accept_edge(&self, edge_id: EdgeId) -> Result<TargetEdge> {
        let edge = self.transition_edge(edge_id, EdgeStatus::Accepted, HistoryAction::Accepted, None)?;
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
    }

    async fn get_edge(&self, edge_id: EdgeId) -> Result<Option<TargetEdge>> {
        let state = self.state.read().unwrap();
        Ok(state.edges.get(&edge_id).cloned())
    }

    async fn active_outgoing(&self, source: ListingId) -> Result<Option<TargetEdge>> {
        let state = self.state.read().unwrap();
        Ok(state.active_outgoing_of(source).first().map(|e| (*e).clone()))
    }

    async fn active_incoming(&self, target: ListingId) -> Result<Vec<TargetEdge>> {
        let state = self.state.read().unwrap();
        let mut edges: Vec<TargetEdge> = state
            .active_incoming_of(target)
            .iter()
            .map(|e| (*e).clone())
            .collect();
        edges.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(edges)
    }

    async fn count_active_incoming(&self, target: ListingId) -> Result<u64> {
        let state = self.state.read().unwrap();
        Ok(state.active_incoming_of(target).len() as u64)
    }

    async fn has_active_outgoing(&self, source: ListingId) -> Result<bool> {
        let state = self.state.read().unwrap();
        Ok(!state.active_outgoing_of(source).is_empty())
    }

    async fn history_for(&self, listing_id: ListingId) -> Result<Vec<HistoryEntry>> {
        let state = self.state.read().unwrap();
        let mut entries: Vec<HistoryEntry> = state
            .history
            .iter()
            .filter(|e| e.involves(listing_id))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn store() -> InMemoryTargetStore {
        InMemoryTargetStore::new(10)
    }

    #[tokio::test]
    async fn test_self_target_rejected() {
        let store = store();
        let a = ListingId::new();

        let err = store
            .create_edge(a, a, IncomingPolicy::Exclusive)
            .await
            .unwrap_err();
        assert_matches!(err, TargetingError::SelfTarget(id) if id == a);
    }

    #[tokio::test]
    async fn test_two_cycle_rejected() {
        let store = store();
        let (a, b) = (ListingId::new(), ListingId::new());

        store.create_edge(a, b, IncomingPolicy::Exclusive).await.unwrap();
        let err = store
            .create_edge(b, a, IncomingPolicy::Exclusive)
            .await
            .unwrap_err();
        assert_matches!(err, TargetingError::Cycle { .. });
    }

    #[tokio::test]
    async fn test_n_cycle_rejected() {
        let store = store();
        let (a, b, c) = (ListingId::new(), ListingId::new(), ListingId::new());

        store.create_edge(a, b, IncomingPolicy::Exclusive).await.unwrap();
        store.create_edge(b, c, IncomingPolicy::Exclusive).await.unwrap();
        let err = store
            .create_edge(c, a, IncomingPolicy::Exclusive)
            .await
            .unwrap_err();
        assert_matches!(err, TargetingError::Cycle { .. });
    }

    #[tokio::test]
    async fn test_retargeting_is_exclusive() {
        let store = store();
        let (a, b, c) = (ListingId::new(), ListingId::new(), ListingId::new());

        let first = store.create_edge(a, b, IncomingPolicy::Exclusive).await.unwrap();
        store.create_edge(a, c, IncomingPolicy::Exclusive).await.unwrap();

        // Exactly one active outgoing edge, pointing at c
        let active = store.active_outgoing(a).await.unwrap().unwrap();
        assert_eq!(active.target_listing_id, c);

        // The old edge is cancelled with exactly one retargeting entry
        let old = store.get_edge(first.edge_id).await.unwrap().unwrap();
        assert_eq!(old.status, EdgeStatus::Cancelled);

        let history = store.history_for(b).await.unwrap();
        let cancelled: Vec<_> = history
            .iter()
            .filter(|e| e.action == HistoryAction::Cancelled && e.edge_id == first.edge_id)
            .collect();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].reason.as_deref(), Some("retargeting"));
    }

    #[tokio::test]
    async fn test_first_match_exclusivity() {
        let store = store();
        let (s1, s2, t) = (ListingId::new(), ListingId::new(), ListingId::new());

        store.create_edge(s1, t, IncomingPolicy::Exclusive).await.unwrap();
        let err = store
            .create_edge(s2, t, IncomingPolicy::Exclusive)
            .await
            .unwrap_err();
        assert_matches!(err, TargetingError::AlreadyTargeted(id) if id == t);
    }

    #[tokio::test]
    async fn test_existing_proposer_may_recreate() {
        let store = store();
        let (s1, t) = (ListingId::new(), ListingId::new());

        store.create_edge(s1, t, IncomingPolicy::Exclusive).await.unwrap();
        // Same source again is not a conflict; it retargets onto itself
        store.create_edge(s1, t, IncomingPolicy::Exclusive).await.unwrap();
        assert_eq!(store.count_active_incoming(t).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_auction_target_admits_many() {
        let store = store();
        let t = ListingId::new();

        for _ in 0..4 {
            let s = ListingId::new();
            store.create_edge(s, t, IncomingPolicy::Shared).await.unwrap();
        }
        assert_eq!(store.count_active_incoming(t).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_accept_edge_writes_history() {
        let store = store();
        let (a, b) = (ListingId::new(), ListingId::new());

        let edge = store.create_edge(a, b, IncomingPolicy::Exclusive).await.unwrap();
        let accepted = store.accept_edge(edge.edge_id).await.unwrap();
        assert_eq!(accepted.status, EdgeStatus::Accepted);

        let history = store.history_for(a).await.unwrap();
        assert!(history
            .iter()
            .any(|e| e.action == HistoryAction::Accepted && e.edge_id == edge.edge_id));
    }

    #[tokio::test]
    async fn test_accept_terminal_edge_is_stale() {
        let store = store();
        let (a, b) = (ListingId::new(), ListingId::new());

        let edge = store.create_edge(a, b, IncomingPolicy::Exclusive).await.unwrap();
        store.accept_edge(edge.edge_id).await.unwrap();

        let err = store.accept_edge(edge.edge_id).await.unwrap_err();
        assert_matches!(err, TargetingError::StaleState(_));
    }

    #[tokio::test]
    async fn test_cancel_outgoing_with_reason() {
        let store = store();
        let (a, b) = (ListingId::new(), ListingId::new());

        store.create_edge(a, b, IncomingPolicy::Exclusive).await.unwrap();
        let cancelled = store.cancel_outgoing_edges(a, "owner withdrew").await.unwrap();
        assert_eq!(cancelled.len(), 1);
        assert!(!store.has_active_outgoing(a).await.unwrap());

        let history = store.history_for(a).await.unwrap();
        assert!(history
            .iter()
            .any(|e| e.reason.as_deref() == Some("owner withdrew")));
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let store = store();
        let (a, b, c) = (ListingId::new(), ListingId::new(), ListingId::new());

        store.create_edge(a, b, IncomingPolicy::Exclusive).await.unwrap();
        store.create_edge(a, c, IncomingPolicy::Exclusive).await.unwrap();

        let history = store.history_for(a).await.unwrap();
        // created(a→b), cancelled(a→b), created(a→c)
        assert_eq!(history.len(), 3);
        for pair in history.windows(2) {
            assert!(pair[0].recorded_at >= pair[1].recorded_at);
        }
    }
}
