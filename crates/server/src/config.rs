//! Server configuration

use crate::error::{Result, ServerError};
use std::net::SocketAddr;

/// Default listen port for client connections
pub const DEFAULT_PORT: u16 = 8000;

/// Default capacity of each client's request ring
pub const DEFAULT_RING_CAPACITY: usize = 100_000;

/// Default upper bound on a request frame, in bytes
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 4096;

/// Default bytes consumed from a connection per read wakeup
pub const DEFAULT_MAX_BYTES_PER_READ: usize = 100_000;

/// Default limit on simultaneously connected clients
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Configuration for the book server
///
/// # Example
///
/// ```
/// use server::config::ServerConfig;
///
/// let config = ServerConfig::new("127.0.0.1", 8000);
/// assert_eq!(config.ring_capacity, 100_000);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// TCP port clients connect to
    pub port: u16,
    /// Upper bound on simultaneously connected clients
    pub max_connections: usize,
    /// Capacity of each client's request ring
    pub ring_capacity: usize,
    /// Largest accepted request frame, in bytes
    pub max_message_len: usize,
    /// Bytes consumed from a connection per read wakeup
    pub max_bytes_per_read: usize,
}

impl ServerConfig {
    /// Create a config with the given listen address and default plumbing
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            ring_capacity: DEFAULT_RING_CAPACITY,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            max_bytes_per_read: DEFAULT_MAX_BYTES_PER_READ,
        }
    }

    /// Socket address to bind to
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ServerError::InvalidAddress(format!("{}:{}", self.host, self.port)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("0.0.0.0", DEFAULT_PORT)
    }
}
