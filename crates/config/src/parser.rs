//! Loading, saving, and generating configuration files

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::defaults::*;
use crate::substitution::substitute_env_vars;
use crate::{EngineConfig, ExchangeConfig, ListenConfig, MasterConfig, ObservabilityConfig};

/// Load a configuration file, applying environment-variable substitution
/// before parsing.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MasterConfig> {
    let path = path.as_ref();
    info!(?path, "Loading configuration");

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    debug!(bytes = content.len(), "Config file read");

    let substituted = substitute_env_vars(&content)?;

    let config: MasterConfig =
        serde_yaml::from_str(&substituted).context("Failed to parse YAML configuration")?;

    info!("Configuration loaded");
    Ok(config)
}

/// Build the configuration `bookd init` writes out
pub fn generate_default_config() -> MasterConfig {
    MasterConfig {
        exchange: ExchangeConfig {
            name: "Bookd".to_string(),
            instrument: "BTC-USD".to_string(),
            version: "1.0.0".to_string(),
        },
        server: ListenConfig {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
        },
        engine: EngineConfig {
            ring_capacity: default_ring_capacity(),
            max_message_len: default_max_message_len(),
            max_bytes_per_read: default_max_bytes_per_read(),
        },
        observability: ObservabilityConfig {
            log_format: default_log_format(),
            metrics_port: None,
        },
    }
}

/// Serialize a configuration to YAML on disk
pub fn save_config<P: AsRef<Path>>(config: &MasterConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!(?path, "Saving configuration");

    let yaml =
        serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;
    fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;

    Ok(())
}
