//! yb-server: HTTP surface, resolution cache, coordinator, and playback proxy.
//!
//! - [`cache`] and [`coordinator`]: the per-key resolution store and the
//!   leader/follower deduplication in front of the resolver.
//! - [`proxy`]: the `/play` state machine that relays media bytes and
//!   re-resolves once when a signed link has expired.
//! - [`catalog`]: Invidious/Piped metadata lookup for `/item`.
//! - [`router`] and [`routes`]: the Axum application.
//! - Graceful shutdown via signal handling, and a background sweep of
//!   expired cache entries.

pub mod cache;
pub mod catalog;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod middleware;
pub mod proxy;
pub mod range;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use yb_core::config::Config;
use yb_resolver::{check_tool, Resolver, ToolResolver};

use crate::cache::ResolutionCache;
use crate::context::AppContext;

/// Start the ytbridge server.
///
/// Builds the tool-backed resolver and the [`AppContext`], binds the
/// configured address, and serves until a shutdown signal arrives.
pub async fn start(config: Config) -> yb_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let tool = check_tool(&config.resolver);
    if tool.available {
        tracing::info!(
            "Resolver: {} ({})",
            tool.name,
            tool.version.as_deref().unwrap_or("unknown version")
        );
    } else {
        tracing::warn!("Resolver tool not found: {}", tool.name);
    }

    let resolver: Arc<dyn Resolver> = Arc::new(ToolResolver::from_config(&config.resolver, &config.cache)?);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| yb_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let ctx = AppContext::new(config, resolver)?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| yb_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("Starting server on {addr}");

    run(ctx, listener, CancellationToken::new()).await
}

/// Serve `ctx` on an already-bound listener until `cancel` fires or a
/// shutdown signal arrives.
pub async fn run(ctx: AppContext, listener: TcpListener, cancel: CancellationToken) -> yb_core::Result<()> {
    let purge = spawn_purge_task(
        ctx.cache().clone(),
        Duration::from_secs(ctx.config.cache.purge_interval_secs.max(1)),
        cancel.clone(),
    );

    let app = router::build_router(ctx);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .map_err(|e| yb_core::Error::Internal(format!("Server error: {e}")));

    cancel.cancel();
    let _ = purge.await;

    tracing::info!("Server shutdown complete");
    result
}

/// Periodically drop expired cache entries.
pub fn spawn_purge_task(cache: Arc<ResolutionCache>, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = cache.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, remaining = cache.len(), "purged expired resolutions");
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    })
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
