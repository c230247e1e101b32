//! HTTP server lifecycle.
//!
//! `serve` runs the API in the foreground until Ctrl-C. Both it and the
//! tests go through `serve_with_shutdown`, which takes an already bound
//! listener and any shutdown future.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::api::router::api_router;
use crate::core_state::CoreState;

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve_with_shutdown<F>(
    core: Arc<CoreState>,
    listener: TcpListener,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, api_router(core))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

/// Bind `addr` and serve the API until Ctrl-C.
pub async fn serve(core: Arc<CoreState>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!(%addr, "Failed to bind API server: {e}");
        e
    })?;

    serve_with_shutdown(core, listener, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            return;
        }
        tracing::info!("Ctrl-C received, shutting down");
    })
    .await
}
