//! Prometheus metrics infrastructure
//!
//! This module provides utilities for initializing the Prometheus exporter
//! and the metric sets recorded by the matching thread and the TCP server.

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Initialize the Prometheus metrics exporter
///
/// This starts an HTTP server on the specified port that exposes metrics
/// at the `/metrics` endpoint.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Metrics recorded by the matching thread
///
/// # Metrics
///
/// * `engine_requests_total` - Requests popped from client rings
/// * `engine_orders_rejected_total` - Orders that failed admission
/// * `engine_trades_total` - Trades executed
/// * `engine_dispatch_duration_seconds` - Book call duration histogram
#[derive(Clone)]
pub struct EngineMetrics {
    requests_total: Counter,
    orders_rejected: Counter,
    trades_total: Counter,
    dispatch_duration: Histogram,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: counter!("engine_requests_total"),
            orders_rejected: counter!("engine_orders_rejected_total"),
            trades_total: counter!("engine_trades_total"),
            dispatch_duration: histogram!("engine_dispatch_duration_seconds"),
        }
    }

    /// Record one request handled by the book
    pub fn record_request(&self, duration: Duration) {
        self.requests_total.increment(1);
        self.dispatch_duration.record(duration.as_secs_f64());
    }

    /// Record an order that failed its admission pre-check
    pub fn record_rejection(&self) {
        self.orders_rejected.increment(1);
    }

    /// Record executed trades
    pub fn record_trades(&self, count: usize) {
        self.trades_total.increment(count as u64);
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics recorded by the TCP server
///
/// # Metrics
///
/// * `server_active_connections` - Currently connected clients
/// * `server_frames_total` - Frames accepted off the wire
/// * `server_bad_frames_total` - Frames rejected for bad length
#[derive(Clone)]
pub struct ServerMetrics {
    active_connections: Gauge,
    frames_total: Counter,
    bad_frames_total: Counter,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            active_connections: gauge!("server_active_connections"),
            frames_total: counter!("server_frames_total"),
            bad_frames_total: counter!("server_bad_frames_total"),
        }
    }

    /// Increment active connections (call when a connection is opened)
    pub fn connection_opened(&self) {
        self.active_connections.increment(1.0);
    }

    /// Decrement active connections (call when a connection is closed)
    pub fn connection_closed(&self) {
        self.active_connections.decrement(1.0);
    }

    /// Record a well-formed frame
    pub fn record_frame(&self) {
        self.frames_total.increment(1);
    }

    /// Record a frame rejected for a bad length prefix
    pub fn record_bad_frame(&self) {
        self.bad_frames_total.increment(1);
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
