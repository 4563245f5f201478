//! Eligibility and compatibility resolver for OpenSwap
//!
//! Answers two questions for a (user, target listing) pair:
//!
//! - may the user target this listing at all, and with which of their own
//!   listings ([`EligibilityResolver`])
//! - how well do two listings match ([`CompatibilityScorer`], memoized
//!   through a [`CompatibilityCache`])
//!
//! Eligibility failures come back as structured reasons so a UI can explain
//! *why* targeting is blocked; only genuinely exceptional conditions
//! (missing rows, store failures) surface as errors.

pub mod cache;
pub mod error;
pub mod ports;
pub mod resolver;
pub mod score;

pub use cache::{CompatibilityCache, InMemoryCompatibilityCache, PairKey};
pub use error::{EligibilityError, Result};
pub use ports::{AuctionSchedule, AuctionWindow};
pub use resolver::{EligibilityReport, EligibilityResolver, IneligibilityReason};
pub use score::{Compatibility, CompatibilityScorer, DefaultScorer};
