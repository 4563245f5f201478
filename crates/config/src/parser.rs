use crate::{substitution, EngineConfig};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());

    // Perform environment variable substitution
    let substituted = substitution::substitute_env_vars(&content)?;

    // Parse YAML
    let config: EngineConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    crate::validator::validate_config(&config)
        .map_err(|errors| anyhow::anyhow!("Configuration invalid: {:?}", errors))?;

    info!("Configuration loaded successfully");
    Ok(config)
}

#[instrument]
pub fn generate_default_config() -> EngineConfig {
    EngineConfig::default()
}
