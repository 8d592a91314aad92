//! Listen port validation
//!
//! Checking a port before binding is inherently racy (another process can
//! take it between the check and the bind), so these helpers exist for early
//! operator feedback only; the bind itself is the source of truth.

use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::error::{Result, ServerError};

/// Check that the configured listen port can currently be bound
pub async fn validate_port_available(host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    debug!(%addr, "Checking listen port");

    match TcpListener::bind(&addr).await {
        Ok(listener) => {
            let local_addr = listener
                .local_addr()
                .map_err(|e| ServerError::bind(addr.clone(), e))?;
            drop(listener);

            info!(%local_addr, "Listen port is available");
            Ok(())
        }
        Err(e) => {
            error!(port, %e, "Listen port is NOT available");
            Err(ServerError::port_in_use(port, e.to_string()))
        }
    }
}

/// Check whether a port is currently in use
pub async fn is_port_in_use(host: &str, port: u16) -> bool {
    TcpListener::bind(format!("{}:{}", host, port)).await.is_err()
}

/// Validate the port number itself.
///
/// Port 0 is rejected (the server does not support ephemeral assignment in
/// config); ports below 1024 produce a warning.
pub fn validate_port_range(port: u16) -> Result<()> {
    if port == 0 {
        Err(ServerError::ConfigError(
            "Port cannot be 0 (ephemeral port assignment not supported for explicit binding)"
                .to_string(),
        ))
    } else if port < 1024 {
        warn!(
            "Port {} is a privileged port (requires root/admin privileges)",
            port
        );
        Ok(())
    } else {
        Ok(())
    }
}
