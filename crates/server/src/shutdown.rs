//! Graceful shutdown coordination
//!
//! Built on `tokio_util::sync::CancellationToken`: tokens are cheap to
//! clone, child tokens are cancelled with their parent, and cancellation can
//! be observed without consuming anything. The accept loop, every
//! connection task, and the matching thread each hold a child of one
//! controller.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Coordinates graceful shutdown across the server's components.
///
/// # Example
///
/// ```ignore
/// let shutdown = ShutdownController::with_ctrl_c();
///
/// let server_token = shutdown.child_token();
/// tokio::spawn(async move { server.run(server_token).await });
///
/// shutdown.wait_for_shutdown().await;
/// ```
#[derive(Clone)]
pub struct ShutdownController {
    token: CancellationToken,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    /// Create a new shutdown controller
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Create a controller whose token is cancelled by Ctrl+C (SIGINT)
    pub fn with_ctrl_c() -> Self {
        let controller = Self::new();
        let token = controller.token.clone();

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, initiating graceful shutdown...");
                    token.cancel();
                }
                Err(e) => {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
            }
        });

        controller
    }

    /// A child token, cancelled when this controller shuts down.
    ///
    /// Children can also be cancelled independently without affecting the
    /// parent.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// A clone of the main token
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trigger shutdown manually
    pub fn shutdown(&self) {
        info!("Manual shutdown triggered");
        self.token.cancel();
    }

    /// Whether shutdown has been triggered
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until shutdown is triggered (Ctrl+C or manual)
    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_shutdown_cancels_children() {
        let controller = ShutdownController::new();
        let child = controller.child_token();

        assert!(!controller.is_cancelled());
        controller.shutdown();

        assert!(controller.is_cancelled());
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn test_child_cancellation_does_not_propagate_up() {
        let controller = ShutdownController::new();
        let first = controller.child_token();
        let second = controller.child_token();

        first.cancel();

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!controller.is_cancelled());
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_returns_after_trigger() {
        let controller = ShutdownController::new();
        let waiter = controller.clone();

        let handle = tokio::spawn(async move { waiter.wait_for_shutdown().await });
        controller.shutdown();

        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("waiter completes")
            .unwrap();
    }
}
