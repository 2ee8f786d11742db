pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::HostError;
use crate::host::GrainHost;

#[derive(Clone)]
pub struct HttpState {
    pub host: Arc<GrainHost>,
}

impl HttpState {
    pub fn new(host: Arc<GrainHost>) -> Self {
        Self { host }
    }
}

/// The gateway router with its state attached.
pub fn app(host: Arc<GrainHost>) -> Router {
    api::router().with_state(HttpState::new(host))
}

pub async fn bind(addr: SocketAddr) -> Result<TcpListener, HostError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| HostError::Bind { addr, source })
}

/// Serve the gateway on an already bound listener until `shutdown_tx` fires.
pub fn spawn_http_server(
    listener: TcpListener,
    host: Arc<GrainHost>,
    shutdown_tx: broadcast::Sender<()>,
) -> JoinHandle<Result<(), HostError>> {
    let shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(serve(listener, app(host), shutdown_rx))
}

async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), HostError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("HTTP server listening on http://{}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .map_err(HostError::Serve)?;
    tracing::info!("HTTP server stopped");
    Ok(())
}
