//! Process lifecycle: bind, start the prober, serve, shut down.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use codeprobe_core::error::{CodeProbeError, Result};

use crate::app_state::AppState;
use crate::config::ProbeConfig;
use crate::prober::Prober;
use crate::router;
use crate::transport::{ProbeTransport, ReqwestTransport};

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn run(cfg: ProbeConfig, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let listen = cfg.server.listen_addr()?;
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|e| CodeProbeError::Bind(format!("{listen}: {e}")))?;
    let transport = Arc::new(ReqwestTransport::new()?);

    serve(listener, cfg, transport, shutdown).await
}

/// Serve on an already-bound listener with the given transport.
///
/// Exactly one prober is spawned here. Once the HTTP server has drained, the
/// prober is cancelled and joined.
pub async fn serve(
    listener: TcpListener,
    cfg: ProbeConfig,
    transport: Arc<dyn ProbeTransport>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let state = AppState::new(cfg)?;
    let prober = Prober::new(&state.cfg().probe, state.metrics(), transport)?;
    let app = router::build_router(state);

    let cancel = CancellationToken::new();
    let prober_task = prober.spawn(cancel.clone());

    let local: Option<SocketAddr> = listener.local_addr().ok();
    tracing::info!(listen = ?local, "codeprobe-server starting");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| CodeProbeError::Internal(format!("server failed: {e}")));

    cancel.cancel();
    if let Err(e) = prober_task.await {
        tracing::warn!(error = %e, "prober task ended abnormally");
    }
    tracing::info!("codeprobe-server stopped");

    served
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
