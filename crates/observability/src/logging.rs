//! Logging setup
//!
//! One tracing subscriber serves the whole process: an `EnvFilter` driven
//! by `RUST_LOG` in front of a single format layer chosen from the
//! configuration's `log_format` key.

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Filter applied when `RUST_LOG` is not set
const DEFAULT_DIRECTIVE: &str = "info";

/// Log output format, as written in the `log_format` config key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output with source locations (default)
    #[default]
    Pretty,
    /// One JSON object per event, for log aggregation
    Json,
    /// Terse single-line output
    Compact,
}

impl LogFormat {
    /// Parse a `log_format` config value (case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }

    /// The subscriber layer this format stands for
    fn layer(self) -> Box<dyn Layer<Registry> + Send + Sync> {
        match self {
            Self::Pretty => fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .boxed(),
            Self::Json => fmt::layer().json().boxed(),
            Self::Compact => fmt::layer().compact().boxed(),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| format!("unknown log format: {}", value))
    }
}

/// Install the process-wide subscriber.
///
/// The filter defaults to `info`; `RUST_LOG` overrides it with the usual
/// directive syntax (e.g. `RUST_LOG=server=debug,info`).
pub fn init_logging(service_name: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    Registry::default()
        .with(format.layer())
        .with(filter)
        .try_init()
        .context("logging was already initialized")?;

    tracing::info!(service = service_name, ?format, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_values() {
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("compact"), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse("yaml"), None);
    }

    #[test]
    fn test_from_str_mirrors_parse() {
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert_eq!("Compact".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_every_format_builds_a_layer() {
        for format in [LogFormat::Pretty, LogFormat::Json, LogFormat::Compact] {
            let _ = format.layer();
        }
    }
}
