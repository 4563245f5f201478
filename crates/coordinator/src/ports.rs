//! External collaborator ports
//!
//! Identity, notification delivery and settlement recording live outside
//! this engine; these narrow traits are everything the coordinator knows
//! about them. No-op and recording implementations ship alongside for
//! wiring and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use common::error::Result;
use common::types::{AuctionId, ListingId, UserId, UserSummary};

/// Settlement references attach to listings or auctions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettlementEntity {
    Listing(ListingId),
    Auction(AuctionId),
}

/// Notification dispatch
///
/// Fire-and-forget: the coordinator logs failures and moves on, a broken
/// notifier never fails a matching operation.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notify a user about an engine event
    async fn notify(&self, user_id: UserId, event_type: &str, payload: serde_json::Value)
        -> Result<()>;
}

/// External settlement reference writer
#[async_trait]
pub trait SettlementLedger: Send + Sync {
    /// Idempotent upsert of an opaque reference against an entity
    async fn record_reference(&self, entity: SettlementEntity, reference_id: &str) -> Result<()>;
}

/// User display lookup
///
/// Presentation enrichment only, never authorization.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Display summary for a user, when known
    async fn user_summary(&self, user_id: UserId) -> Result<Option<UserSummary>>;
}

/// Notifier that drops everything
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(
        &self,
        _user_id: UserId,
        _event_type: &str,
        _payload: serde_json::Value,
    ) -> Result<()> {
        Ok(())
    }
}

/// Notifier that records every dispatch, for tests
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(UserId, String, serde_json::Value)>>,
}

impl RecordingNotifier {
    /// Create an empty recording notifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything dispatched so far
    pub fn sent(&self) -> Vec<(UserId, String, serde_json::Value)> {
        self.sent.lock().unwrap().clone()
    }

    /// Event types dispatched to a user
    pub fn events_for(&self, user_id: UserId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _, _)| *u == user_id)
            .map(|(_, e, _)| e.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        user_id: UserId,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((user_id, event_type.to_string(), payload));
        Ok(())
    }
}

/// In-memory settlement ledger
#[derive(Default)]
pub struct InMemorySettlementLedger {
    references: Mutex<HashMap<SettlementEntity, Vec<String>>>,
}

impl InMemorySettlementLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// References recorded against an entity
    pub fn references_for(&self, entity: SettlementEntity) -> Vec<String> {
        self.references
            .lock()
            .unwrap()
            .get(&entity)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SettlementLedger for InMemorySettlementLedger {
    async fn record_reference(&self, entity: SettlementEntity, reference_id: &str) -> Result<()> {
        let mut references = self.references.lock().unwrap();
        let refs = references.entry(entity).or_default();
        if !refs.iter().any(|r| r == reference_id) {
            refs.push(reference_id.to_string());
        }
        Ok(())
    }
}

/// Directory that knows nobody
pub struct NoopUserDirectory;

#[async_trait]
impl UserDirectory for NoopUserDirectory {
    async fn user_summary(&self, _user_id: UserId) -> Result<Option<UserSummary>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        let user = UserId::new();

        notifier
            .notify(user, "listing_targeted", serde_json::json!({"n": 1}))
            .await
            .unwrap();
        notifier
            .notify(UserId::new(), "proposal_rejected", serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(notifier.sent().len(), 2);
        assert_eq!(notifier.events_for(user), vec!["listing_targeted"]);
    }

    #[tokio::test]
    async fn test_ledger_upsert_is_idempotent() {
        let ledger = InMemorySettlementLedger::new();
        let entity = SettlementEntity::Listing(ListingId::new());

        ledger.record_reference(entity, "tx-1").await.unwrap();
        ledger.record_reference(entity, "tx-1").await.unwrap();
        ledger.record_reference(entity, "tx-2").await.unwrap();

        assert_eq!(ledger.references_for(entity), vec!["tx-1", "tx-2"]);
    }
}
