//! Configuration validation
//!
//! Validation never stops at the first problem: every error and warning is
//! collected into a [`ValidationReport`] so an operator can fix a config in
//! one pass.

use regex::Regex;
use thiserror::Error;

use crate::MasterConfig;

/// A configuration error that prevents startup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Exchange name is required")]
    MissingExchangeName,

    #[error("Instrument symbol is required")]
    MissingInstrument,

    #[error("Invalid version format: {0}. Must be in format X.Y.Z (e.g., 1.0.0)")]
    InvalidVersionFormat(String),

    #[error("Port cannot be 0 (ephemeral port assignment is not supported)")]
    InvalidPort,

    #[error("max_connections must be greater than zero")]
    InvalidMaxConnections,

    #[error("ring_capacity must be greater than zero")]
    InvalidRingCapacity,

    #[error("max_message_len must be between 1 and {max}, got {got}")]
    InvalidMaxMessageLen { got: usize, max: usize },

    #[error("max_bytes_per_read must be greater than zero")]
    InvalidMaxBytesPerRead,

    #[error("Unknown log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("Metrics port cannot be 0")]
    InvalidMetricsPort,
}

/// A suspicious but tolerable configuration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// Config key the warning is about
    pub field: String,
    /// Human-readable explanation
    pub message: String,
}

/// Collected outcome of a validation pass
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Problems that must be fixed before startup
    pub errors: Vec<ValidationError>,
    /// Problems worth flagging but safe to run with
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    /// True when the configuration can be used
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn warn(&mut self, field: &str, message: impl Into<String>) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.into(),
        });
    }
}

/// Largest frame size the wire protocol supports
const MESSAGE_LEN_CEILING: usize = 1 << 20;

/// Validate a configuration, collecting all errors and warnings
pub fn validate_config(config: &MasterConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    if config.exchange.name.trim().is_empty() {
        report.errors.push(ValidationError::MissingExchangeName);
    }
    if config.exchange.instrument.trim().is_empty() {
        report.errors.push(ValidationError::MissingInstrument);
    }

    let version_re = Regex::new(r"^\d+\.\d+\.\d+$").expect("static regex compiles");
    if !version_re.is_match(&config.exchange.version) {
        report.errors.push(ValidationError::InvalidVersionFormat(
            config.exchange.version.clone(),
        ));
    }

    if config.server.port == 0 {
        report.errors.push(ValidationError::InvalidPort);
    } else if config.server.port < 1024 {
        report.warn(
            "server.port",
            format!(
                "port {} is privileged and requires elevated permissions",
                config.server.port
            ),
        );
    }

    if config.server.max_connections == 0 {
        report.errors.push(ValidationError::InvalidMaxConnections);
    }

    if config.engine.ring_capacity == 0 {
        report.errors.push(ValidationError::InvalidRingCapacity);
    } else if config.engine.ring_capacity < 1024 {
        report.warn(
            "engine.ring_capacity",
            "small rings make producers back off under burst load",
        );
    }

    if config.engine.max_message_len == 0 || config.engine.max_message_len > MESSAGE_LEN_CEILING {
        report.errors.push(ValidationError::InvalidMaxMessageLen {
            got: config.engine.max_message_len,
            max: MESSAGE_LEN_CEILING,
        });
    }

    if config.engine.max_bytes_per_read == 0 {
        report.errors.push(ValidationError::InvalidMaxBytesPerRead);
    } else if config.engine.max_bytes_per_read < config.engine.max_message_len {
        report.warn(
            "engine.max_bytes_per_read",
            "reads smaller than the largest frame take several wakeups per message",
        );
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" | "compact" => {}
        other => {
            report
                .errors
                .push(ValidationError::InvalidLogFormat(other.to_string()));
        }
    }

    if config.observability.metrics_port == Some(0) {
        report.errors.push(ValidationError::InvalidMetricsPort);
    }

    report
}
