//! Master configuration for Bookd
//!
//! One YAML document configures the whole server. Loading goes through
//! environment-variable substitution (`${VAR}` placeholders) before parsing,
//! and a separate validation pass produces a report of errors and warnings
//! rather than failing on the first problem.
//!
//! # Example
//!
//! ```yaml
//! exchange:
//!   name: Bookd
//!   instrument: BTC-USD
//!   version: 1.0.0
//! server:
//!   host: 0.0.0.0
//!   port: 8000
//! engine:
//!   ring_capacity: 100000
//!   max_message_len: 4096
//!   max_bytes_per_read: 100000
//! observability:
//!   log_format: pretty
//!   metrics_port: 9090
//! ```

use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::{generate_default_config, load_config, save_config};
pub use substitution::substitute_env_vars;
pub use validator::{validate_config, ValidationError, ValidationReport, ValidationWarning};

/// Top-level configuration document
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MasterConfig {
    /// Exchange identity
    pub exchange: ExchangeConfig,
    /// Listen socket settings
    #[serde(default)]
    pub server: ListenConfig,
    /// Matching engine plumbing
    #[serde(default)]
    pub engine: EngineConfig,
    /// Logging and metrics
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Exchange identity block
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeConfig {
    /// Display name of the deployment
    pub name: String,
    /// The single instrument this book trades
    pub instrument: String,
    /// Config schema version, `X.Y.Z`
    pub version: String,
}

/// Listen socket settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port clients connect to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on simultaneously connected clients
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
        }
    }
}

/// Matching engine plumbing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Capacity of each client's request ring
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,
    /// Largest accepted request frame, in bytes
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
    /// Bytes consumed from a connection per read wakeup
    #[serde(default = "default_max_bytes_per_read")]
    pub max_bytes_per_read: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ring_capacity: default_ring_capacity(),
            max_message_len: default_max_message_len(),
            max_bytes_per_read: default_max_bytes_per_read(),
        }
    }
}

/// Logging and metrics settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log output format: pretty, json, or compact
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Port for the Prometheus exporter; absent disables metrics
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            metrics_port: None,
        }
    }
}
