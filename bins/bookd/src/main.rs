//! Bookd server binary
//!
//! This is the main entry point for the Bookd application. It provides
//! commands for initializing, validating, and starting the single-instrument
//! order book server.

use anyhow::{Context, Result};
use cli::{Cli, Commands};
use config::{generate_default_config, load_config, save_config, validate_config, MasterConfig};
use observability::{init_logging, LogFormat};
use server::{BookServer, ServerConfig, ServerExt};
use std::path::Path;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Start { config, port } => start_server(config, port).await,
        Commands::Validate { config } => validate_command(config),
        Commands::Init { output } => init_command(output),
    }
}

async fn start_server<P: AsRef<Path>>(config_path: P, port_override: Option<u16>) -> Result<()> {
    let config = load_config(config_path.as_ref())?;

    let format: LogFormat = config
        .observability
        .log_format
        .parse()
        .unwrap_or_default();
    init_logging("bookd", format)?;

    info!(
        exchange = %config.exchange.name,
        instrument = %config.exchange.instrument,
        "Bookd starting..."
    );
    debug!(?config, "Configuration loaded");

    report_validation(&config)?;

    if let Some(metrics_port) = config.observability.metrics_port {
        observability::init_metrics(metrics_port).context("Failed to start metrics exporter")?;
    }

    let port = port_override.unwrap_or(config.server.port);
    server::validate_port_range(port)?;
    server::validate_port_available(&config.server.host, port).await?;

    let mut server_config = ServerConfig::new(config.server.host.clone(), port);
    server_config.max_connections = config.server.max_connections;
    server_config.ring_capacity = config.engine.ring_capacity;
    server_config.max_message_len = config.engine.max_message_len;
    server_config.max_bytes_per_read = config.engine.max_bytes_per_read;

    let server = BookServer::new(server_config);
    server.run_with_ctrl_c().await?;

    info!("Bookd stopped");
    Ok(())
}

fn report_validation(config: &MasterConfig) -> Result<()> {
    let report = validate_config(config);

    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }

    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot start server due to configuration errors");
    }

    Ok(())
}

fn validate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    init_logging("bookd", LogFormat::Pretty)?;

    let config = load_config(config_path.as_ref())?;
    let report = validate_config(&config);

    for warning in &report.warnings {
        println!("warning: {}: {}", warning.field, warning.message);
    }
    for err in &report.errors {
        println!("error: {}", err);
    }

    if report.is_valid() {
        println!("Configuration is valid");
        Ok(())
    } else {
        anyhow::bail!("Configuration has {} error(s)", report.errors.len());
    }
}

fn init_command<P: AsRef<Path>>(output: P) -> Result<()> {
    init_logging("bookd", LogFormat::Pretty)?;

    let output = output.as_ref();
    if output.exists() {
        anyhow::bail!("Refusing to overwrite existing file: {:?}", output);
    }

    let config = generate_default_config();
    save_config(&config, output)?;

    println!("Wrote default configuration to {:?}", output);
    Ok(())
}
