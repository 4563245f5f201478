//! Configuration parsing and validation for OpenSwap
//!
//! The engine is configured from a YAML file with environment-variable
//! substitution. All knobs have defaults, so an empty file is a valid
//! configuration.

use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use parser::{generate_default_config, load_config};
pub use validator::{validate_config, ValidationError};

use defaults::*;

/// Top-level engine configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EngineConfig {
    /// Targeting graph settings
    #[serde(default)]
    pub targeting: TargetingConfig,
    /// Auction settings
    #[serde(default)]
    pub auction: AuctionConfig,
    /// Compatibility scoring cache settings
    #[serde(default)]
    pub compatibility: CompatibilityConfig,
    /// Background sweep settings
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Storage behavior settings
    #[serde(default)]
    pub store: StoreConfig,
}

/// Targeting graph settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetingConfig {
    /// Maximum traversal depth for the cycle check
    #[serde(default = "default_max_cycle_depth")]
    pub max_cycle_depth: usize,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            max_cycle_depth: default_max_cycle_depth(),
        }
    }
}

/// Auction settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuctionConfig {
    /// Maximum concurrent proposals when auction settings leave it unset
    #[serde(default = "default_max_proposals")]
    pub default_max_proposals: u32,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            default_max_proposals: default_max_proposals(),
        }
    }
}

/// Compatibility scoring cache settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompatibilityConfig {
    /// Cache entry time-to-live in seconds
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    /// Maximum number of cached pairs
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: u64,
}

impl Default for CompatibilityConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: default_cache_ttl_seconds(),
            cache_max_entries: default_cache_max_entries(),
        }
    }
}

/// Background sweep settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweepConfig {
    /// Maximum rows processed per sweep pass
    #[serde(default = "default_sweep_batch_size")]
    pub batch_size: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            batch_size: default_sweep_batch_size(),
        }
    }
}

/// Storage behavior settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Retry idempotent reads once on a store error
    #[serde(default = "default_retry_reads")]
    pub retry_reads: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retry_reads: default_retry_reads(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: EngineConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.targeting.max_cycle_depth, 10);
        assert_eq!(config.auction.default_max_proposals, 10);
        assert_eq!(config.compatibility.cache_ttl_seconds, 300);
        assert!(config.store.retry_reads);
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let yaml = r#"
targeting:
  max_cycle_depth: 4
sweep:
  batch_size: 50
"#;
        let config: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.targeting.max_cycle_depth, 4);
        assert_eq!(config.sweep.batch_size, 50);
        // Untouched sections keep defaults
        assert_eq!(config.auction.default_max_proposals, 10);
    }
}
