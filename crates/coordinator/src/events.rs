//! Engine events
//!
//! The engine emits structured events through an injected sink instead of
//! accumulating metrics in process-wide singletons; the caller decides
//! storage and aggregation.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::Mutex;

use common::types::{AuctionId, EdgeId, ListingId, ProposalId};
use observability::EngineMetrics;

/// Structured event emitted by the matching engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A target edge was created
    EdgeCreated {
        edge_id: EdgeId,
        source_listing_id: ListingId,
        target_listing_id: ListingId,
    },

    /// A target edge was accepted
    EdgeAccepted {
        edge_id: EdgeId,
        source_listing_id: ListingId,
        target_listing_id: ListingId,
    },

    /// An edge was refused because it would close a cycle
    CycleRejected {
        source_listing_id: ListingId,
        target_listing_id: ListingId,
    },

    /// An edge was refused because the first-match target was taken
    ConflictRejected {
        source_listing_id: ListingId,
        target_listing_id: ListingId,
    },

    /// An auction was opened on a listing
    AuctionCreated {
        auction_id: AuctionId,
        listing_id: ListingId,
    },

    /// A proposal was submitted against an auction
    ProposalSubmitted {
        auction_id: AuctionId,
        proposal_id: ProposalId,
    },

    /// An auction ended, with or without a winner
    AuctionEnded {
        auction_id: AuctionId,
        winning_proposal_id: Option<ProposalId>,
    },

    /// A pending listing passed its expiry and was swept
    ListingExpired { listing_id: ListingId },
}

/// Sink for engine events
///
/// Emission is fire-and-forget; a sink must never fail the operation that
/// produced the event.
pub trait EventSink: Send + Sync {
    /// Receive one event
    fn emit(&self, event: EngineEvent);
}

/// Sink that drops everything
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Sink that keeps every event, for tests and diagnostics
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingEventSink {
    /// Create an empty recording sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything received so far
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Sink that feeds the engine metric set
pub struct MetricsSink {
    metrics: Arc<EngineMetrics>,
}

impl MetricsSink {
    /// Create a sink recording into the given metric set
    pub fn new(metrics: Arc<EngineMetrics>) -> Self {
        Self { metrics }
    }
}

impl EventSink for MetricsSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::EdgeCreated { .. } => self.metrics.record_edge_created(),
            EngineEvent::EdgeAccepted { .. } => self.metrics.record_edge_accepted(),
            EngineEvent::CycleRejected { .. } => self.metrics.record_cycle_rejection(),
            EngineEvent::ConflictRejected { .. } => self.metrics.record_conflict_rejection(),
            EngineEvent::ProposalSubmitted { .. } => self.metrics.record_proposal_submitted(),
            EngineEvent::AuctionEnded { .. } => self.metrics.record_auction_ended(),
            EngineEvent::ListingExpired { .. } => self.metrics.record_listing_expired(),
            EngineEvent::AuctionCreated { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingEventSink::new();
        sink.emit(EngineEvent::ListingExpired {
            listing_id: ListingId::new(),
        });
        sink.emit(EngineEvent::AuctionEnded {
            auction_id: AuctionId::new(),
            winning_proposal_id: None,
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], EngineEvent::ListingExpired { .. }));
    }

    #[test]
    fn test_metrics_sink_counts() {
        let metrics = Arc::new(EngineMetrics::new());
        let sink = MetricsSink::new(metrics.clone());

        let (a, b) = (ListingId::new(), ListingId::new());
        sink.emit(EngineEvent::CycleRejected {
            source_listing_id: a,
            target_listing_id: b,
        });
        sink.emit(EngineEvent::CycleRejected {
            source_listing_id: b,
            target_listing_id: a,
        });

        assert_eq!(metrics.snapshot().cycle_rejections, 2);
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = EngineEvent::EdgeCreated {
            edge_id: EdgeId::new(),
            source_listing_id: ListingId::new(),
            target_listing_id: ListingId::new(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "edge_created");
    }
}
