use crate::EngineConfig;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("targeting.max_cycle_depth must be between 1 and 64, got: {0}")]
    InvalidCycleDepth(usize),

    #[error("auction.default_max_proposals must be a positive integer")]
    InvalidMaxProposals,

    #[error("compatibility.cache_ttl_seconds must be a positive integer")]
    InvalidCacheTtl,

    #[error("compatibility.cache_max_entries must be a positive integer")]
    InvalidCacheCapacity,

    #[error("sweep.batch_size must be a positive integer")]
    InvalidSweepBatchSize,
}

/// Validate a parsed configuration
///
/// Returns all violations, not just the first one, so operators can fix a
/// config file in one pass.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.targeting.max_cycle_depth == 0 || config.targeting.max_cycle_depth > 64 {
        errors.push(ValidationError::InvalidCycleDepth(
            config.targeting.max_cycle_depth,
        ));
    }

    if config.auction.default_max_proposals == 0 {
        errors.push(ValidationError::InvalidMaxProposals);
    }

    if config.compatibility.cache_ttl_seconds == 0 {
        errors.push(ValidationError::InvalidCacheTtl);
    }

    if config.compatibility.cache_max_entries == 0 {
        errors.push(ValidationError::InvalidCacheCapacity);
    }

    if config.sweep.batch_size == 0 {
        errors.push(ValidationError::InvalidSweepBatchSize);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(validate_config(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let mut config = EngineConfig::default();
        config.targeting.max_cycle_depth = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ValidationError::InvalidCycleDepth(0)));
    }

    #[test]
    fn test_all_violations_reported() {
        let mut config = EngineConfig::default();
        config.targeting.max_cycle_depth = 0;
        config.auction.default_max_proposals = 0;
        config.sweep.batch_size = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
