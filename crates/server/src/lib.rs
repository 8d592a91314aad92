//! TCP server infrastructure for Bookd
//!
//! This crate owns everything between the listen socket and the matching
//! engine: frame decoding, per-client request rings, the matching thread,
//! response writing, and graceful shutdown.
//!
//! # Architecture
//!
//! ```text
//! client TCP ─▶ reader task ─▶ SPSC ring ─▶ matching thread ─▶ response
//!                  (one per client)            (one, owns the book)   │
//! client TCP ◀─ writer task ◀──────────────────────────────────────────┘
//! ```
//!
//! Each connection gets a reader task (decodes length-prefixed frames and
//! pushes them into its own ring) and a writer task (drains an unbounded
//! response channel). A single dedicated OS thread owns the [`OrderBook`]
//! and drains all rings round-robin, so the book itself never needs a lock.
//!
//! Shutdown coordination uses `CancellationToken` from `tokio_util`:
//! cancelling the server token cancels the accept loop, every connection,
//! and the matching thread.
//!
//! # Quick Start
//!
//! ```ignore
//! use server::{BookServer, ServerConfig, ServerExt};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = BookServer::new(ServerConfig::new("0.0.0.0", 8000));
//!     server.run_with_ctrl_c().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`codec`] - Wire framing and the request/response codec
//! - [`config`] - Server configuration and defaults
//! - [`dispatch`] - The matching thread
//! - [`shutdown`] - Graceful shutdown utilities
//! - [`traits`] - `Server` and `ServerExt` traits
//! - [`port_validator`] - Listen port checks

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use observability::ServerMetrics;
use parking_lot::RwLock as SyncRwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod port_validator;
pub mod shutdown;
pub mod traits;

pub use codec::{FrameDecoder, Request, StatusCode};
pub use config::ServerConfig;
pub use dispatch::{Dispatcher, Lane, Outbound};
pub use error::{Result, ServerError};
pub use port_validator::{validate_port_available, validate_port_range};
pub use shutdown::ShutdownController;
pub use traits::{Server, ServerExt};

use common::ConnectionId;

/// Information about an active client connection
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Unique connection identifier
    pub id: ConnectionId,
    /// Remote peer address
    pub peer_addr: SocketAddr,
    /// When the connection was established
    pub connected_at: std::time::Instant,
}

/// The Bookd TCP server.
///
/// Accepts client connections, frames their requests, and feeds them to the
/// matching thread through per-client SPSC rings.
#[derive(Clone)]
pub struct BookServer {
    config: ServerConfig,
    running: Arc<AtomicBool>,
    bound_addr: Arc<SyncRwLock<Option<SocketAddr>>>,
    next_conn_id: Arc<AtomicU64>,
    connections: Arc<RwLock<HashMap<ConnectionId, ConnectionInfo>>>,
    metrics: ServerMetrics,
}

impl BookServer {
    /// Create a server from its configuration
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            bound_addr: Arc::new(SyncRwLock::new(None)),
            next_conn_id: Arc::new(AtomicU64::new(1)),
            connections: Arc::new(RwLock::new(HashMap::new())),
            metrics: ServerMetrics::new(),
        }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of active connections
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Information about all active connections
    pub async fn active_connections(&self) -> Vec<ConnectionInfo> {
        self.connections.read().await.values().cloned().collect()
    }

    fn next_connection_id(&self) -> ConnectionId {
        self.next_conn_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn register_connection(&self, id: ConnectionId, peer_addr: SocketAddr) {
        let info = ConnectionInfo {
            id,
            peer_addr,
            connected_at: std::time::Instant::now(),
        };
        self.connections.write().await.insert(id, info);
        self.metrics.connection_opened();
    }

    async fn unregister_connection(&self, id: ConnectionId) {
        self.connections.write().await.remove(&id);
        self.metrics.connection_closed();
    }

    /// Handle one client for its whole lifetime
    async fn handle_connection(
        &self,
        conn_id: ConnectionId,
        stream: TcpStream,
        peer_addr: SocketAddr,
        registry: std::sync::mpsc::Sender<Lane>,
        conn_token: CancellationToken,
    ) -> Result<()> {
        debug!(conn_id, %peer_addr, "Client connected");

        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();

        let (producer, consumer) = spsc::ring::<Bytes>(self.config.ring_capacity);
        let (response_tx, response_rx) = tokio::sync::mpsc::unbounded_channel();

        registry
            .send(Lane {
                conn_id,
                requests: consumer,
                responses: response_tx.clone(),
            })
            .map_err(|_| ServerError::Internal("matching thread is gone".to_string()))?;

        self.register_connection(conn_id, peer_addr).await;

        let writer = tokio::spawn(write_loop(
            conn_id,
            write_half,
            response_rx,
            conn_token.clone(),
        ));

        let read_result = self
            .read_loop(conn_id, read_half, producer, response_tx, &conn_token)
            .await;

        // Reader is done (client closed, shutdown, or error): stop the
        // writer and drop our end of the lane.
        conn_token.cancel();
        let _ = writer.await;

        self.unregister_connection(conn_id).await;
        debug!(conn_id, "Client disconnected");

        read_result
    }

    /// Read frames off the socket and push them into the connection's ring
    async fn read_loop(
        &self,
        conn_id: ConnectionId,
        mut read_half: OwnedReadHalf,
        mut producer: spsc::Producer<Bytes>,
        responses: tokio::sync::mpsc::UnboundedSender<Outbound>,
        conn_token: &CancellationToken,
    ) -> Result<()> {
        let decoder = FrameDecoder::new(self.config.max_message_len);
        let mut buf = BytesMut::new();
        // One read syscall never consumes more than max_bytes_per_read
        let mut chunk = vec![0u8; self.config.max_bytes_per_read];

        loop {
            tokio::select! {
                _ = conn_token.cancelled() => {
                    debug!(conn_id, "Reader shutting down");
                    return Ok(());
                }

                read = read_half.read(&mut chunk) => {
                    let n = read.map_err(ServerError::Io)?;
                    if n == 0 {
                        debug!(conn_id, "Client closed the connection");
                        return Ok(());
                    }
                    buf.extend_from_slice(&chunk[..n]);

                    loop {
                        match decoder.decode(&mut buf) {
                            Ok(Some(frame)) => {
                                self.metrics.record_frame();
                                if !enqueue(&mut producer, frame, conn_token).await {
                                    return Ok(());
                                }
                            }
                            Ok(None) => break,
                            Err(e) => {
                                // Parser already reset; surface a 400 and
                                // keep the connection.
                                warn!(conn_id, %e, "Rejected frame");
                                self.metrics.record_bad_frame();
                                let response =
                                    codec::encode_response(StatusCode::BadMessageLength, &[]);
                                if responses.send(Outbound::Frame(response)).is_err() {
                                    return Ok(());
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Push one frame into the ring, yielding while it is full. Returns false
/// when the connection is shutting down instead.
async fn enqueue(
    producer: &mut spsc::Producer<Bytes>,
    frame: Bytes,
    conn_token: &CancellationToken,
) -> bool {
    let mut frame = frame;
    loop {
        match producer.try_push(frame) {
            Ok(()) => return true,
            Err(returned) => {
                if conn_token.is_cancelled() {
                    return false;
                }
                // Ring full: let the matching thread drain before retrying
                frame = returned;
                tokio::task::yield_now().await;
            }
        }
    }
}

/// Drain the response channel onto the socket
async fn write_loop(
    conn_id: ConnectionId,
    mut write_half: OwnedWriteHalf,
    mut responses: tokio::sync::mpsc::UnboundedReceiver<Outbound>,
    conn_token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = conn_token.cancelled() => break,

            message = responses.recv() => match message {
                Some(Outbound::Frame(bytes)) => {
                    if let Err(e) = write_half.write_all(&bytes).await {
                        debug!(conn_id, %e, "Write failed");
                        break;
                    }
                }
                Some(Outbound::Close(bytes)) => {
                    let _ = write_half.write_all(&bytes).await;
                    debug!(conn_id, "Dispatcher closed the connection");
                    break;
                }
                None => break,
            }
        }
    }

    // Writer going away means the connection is done; stop the reader too.
    conn_token.cancel();
    let _ = write_half.shutdown().await;
}

#[async_trait]
impl Server for BookServer {
    fn name(&self) -> &str {
        "book"
    }

    fn address(&self) -> Option<SocketAddr> {
        *self.bound_addr.read()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let addr = self.config.addr()?;
        info!(%addr, "Starting book server");

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::bind(addr.to_string(), e))?;
        let local_addr = listener.local_addr().map_err(ServerError::Io)?;
        *self.bound_addr.write() = Some(local_addr);

        info!(%local_addr, "Book server listening");
        self.running.store(true, Ordering::SeqCst);

        let (registry_tx, registry_rx) = std::sync::mpsc::channel();
        let matching = Dispatcher::spawn(registry_rx, shutdown.child_token());

        let mut connection_handles: Vec<tokio::task::JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Book server received shutdown signal");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            if self.connections.read().await.len() >= self.config.max_connections {
                                warn!(%peer_addr, "Connection limit reached, refusing client");
                                drop(stream);
                                continue;
                            }

                            let conn_id = self.next_connection_id();
                            let server = self.clone();
                            let registry = registry_tx.clone();
                            let conn_token = shutdown.child_token();

                            let handle = tokio::spawn(async move {
                                if let Err(e) = server
                                    .handle_connection(conn_id, stream, peer_addr, registry, conn_token)
                                    .await
                                {
                                    error!(conn_id, %e, "Connection error");
                                }
                            });

                            connection_handles.push(handle);
                            connection_handles.retain(|h| !h.is_finished());
                        }
                        Err(e) => {
                            error!(%e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        // Graceful shutdown: wait for connections to finish
        let connection_count = connection_handles.len();
        if connection_count > 0 {
            info!(connection_count, "Waiting for active connections to close...");

            let timeout = tokio::time::timeout(
                std::time::Duration::from_secs(10),
                futures::future::join_all(connection_handles),
            );
            if timeout.await.is_err() {
                warn!("Timed out waiting for connections to close");
            }
        }

        // The matching thread sees the cancelled child token and exits
        drop(registry_tx);
        if tokio::task::spawn_blocking(move || matching.join())
            .await
            .map(|joined| joined.is_err())
            .unwrap_or(true)
        {
            warn!("Matching thread did not shut down cleanly");
        }

        self.running.store(false, Ordering::SeqCst);
        *self.bound_addr.write() = None;

        info!("Book server shutdown complete");
        Ok(())
    }
}
