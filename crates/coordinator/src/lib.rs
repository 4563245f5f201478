//! Matching coordinator for OpenSwap
//!
//! The unit callers interact with. Composes the listing store, the
//! targeting graph, the eligibility resolver and the auction engine into
//! the propose / retarget / accept / select-winner flows, wires in the
//! external collaborators (notifications, settlement references, user
//! directory), and runs the background sweeps.

pub mod coordinator;
pub mod error;
pub mod events;
pub mod ports;

pub use coordinator::{Collaborators, MatchingCoordinator, ProposeOutcome};
pub use error::{EngineError, Result};
pub use events::{EngineEvent, EventSink, MetricsSink, NullEventSink, RecordingEventSink};
pub use ports::{
    InMemorySettlementLedger, NoopNotifier, NoopUserDirectory, Notifier, RecordingNotifier,
    SettlementEntity, SettlementLedger, UserDirectory,
};
