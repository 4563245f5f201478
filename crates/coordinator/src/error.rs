//! Coordinator error types

use eligibility::IneligibilityReason;
use thiserror::Error;

/// Errors surfaced by the matching coordinator
#[derive(Error, Debug)]
pub enum EngineError {
    /// The eligibility resolver blocked the operation; reasons are
    /// structured so callers can explain the rejection
    #[error("Not eligible: {}", format_reasons(.reasons))]
    NotEligible {
        reasons: Vec<IneligibilityReason>,
    },

    /// The acting user does not own the listing they act through
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The source listing cannot carry this operation
    #[error("Invalid source listing: {0}")]
    InvalidSource(String),

    /// Listing store error
    #[error(transparent)]
    Listing(#[from] listings::ListingError),

    /// Targeting store error
    #[error(transparent)]
    Targeting(#[from] targeting::TargetingError),

    /// Eligibility resolver error
    #[error(transparent)]
    Eligibility(#[from] eligibility::EligibilityError),

    /// Auction engine error
    #[error(transparent)]
    Auction(#[from] auction::AuctionError),
}

fn format_reasons(reasons: &[IneligibilityReason]) -> String {
    reasons
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl EngineError {
    /// True for transport-level store failures, which are safe to retry
    /// for idempotent reads (never for mutations)
    pub fn is_retryable_read(&self) -> bool {
        match self {
            EngineError::Listing(listings::ListingError::StorageError(_)) => true,
            EngineError::Targeting(targeting::TargetingError::StorageError(_)) => true,
            EngineError::Auction(auction::AuctionError::StorageError(_)) => true,
            EngineError::Eligibility(e) => matches!(
                e,
                eligibility::EligibilityError::StorageError(_)
                    | eligibility::EligibilityError::Listing(
                        listings::ListingError::StorageError(_)
                    )
                    | eligibility::EligibilityError::Targeting(
                        targeting::TargetingError::StorageError(_)
                    )
            ),
            _ => false,
        }
    }
}

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_are_retryable_reads() {
        let err: EngineError =
            targeting::TargetingError::StorageError("connection reset".into()).into();
        assert!(err.is_retryable_read());

        let err: EngineError = targeting::TargetingError::SelfTarget(
            common::types::ListingId::new(),
        )
        .into();
        assert!(!err.is_retryable_read());
    }

    #[test]
    fn test_not_eligible_formats_reasons() {
        let err = EngineError::NotEligible {
            reasons: vec![IneligibilityReason::OwnListing],
        };
        assert!(err.to_string().contains("cannot target own listing"));
    }
}
