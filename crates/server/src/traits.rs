//! The `Server` trait and its convenience extensions

use async_trait::async_trait;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Interface every server implementation exposes.
///
/// A server binds, accepts, and processes until the shutdown token is
/// cancelled, then drains its connections and returns.
#[async_trait]
pub trait Server: Send + Sync + 'static {
    /// Name for logging and identification
    fn name(&self) -> &str;

    /// Address the server is bound to, if running
    fn address(&self) -> Option<SocketAddr>;

    /// Whether the server is currently running
    fn is_running(&self) -> bool;

    /// Run until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to start or hits a fatal error.
    async fn run(&self, shutdown: CancellationToken) -> Result<()>;
}

/// Convenience methods available on every [`Server`]
pub trait ServerExt: Server + Sized {
    /// Spawn the server on a background task, returning the join handle and
    /// the token that shuts it down.
    fn spawn(self) -> (tokio::task::JoinHandle<Result<()>>, CancellationToken) {
        let token = CancellationToken::new();
        let token_clone = token.clone();
        let handle = tokio::spawn(async move { self.run(token_clone).await });
        (handle, token)
    }

    /// Run the server until Ctrl+C triggers a graceful shutdown
    fn run_with_ctrl_c(self) -> impl std::future::Future<Output = Result<()>> + Send {
        async move {
            let shutdown = crate::shutdown::ShutdownController::with_ctrl_c();
            self.run(shutdown.token()).await
        }
    }
}

impl<T: Server + Sized> ServerExt for T {}
