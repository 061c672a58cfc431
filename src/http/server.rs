use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Running HTTP listener with graceful, timeout-bounded close.
pub struct HttpServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Bind the API listener and start serving in the background.
pub async fn serve(router: Router, bind: &str, port: u16) -> Result<HttpServerHandle> {
    let listener = TcpListener::bind((bind, port))
        .await
        .with_context(|| format!("binding API server to {}:{}", bind, port))?;
    let local_addr = listener.local_addr().context("reading local address")?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
        if let Err(e) = result {
            error!("API server error: {}", e);
        }
    });

    info!("API server running on http://{}", local_addr);
    Ok(HttpServerHandle {
        local_addr,
        shutdown_tx,
        task,
    })
}

impl HttpServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal graceful shutdown and wait at most `limit`; a listener that
    /// does not drain in time is abandoned, shutdown proceeds anyway.
    pub async fn close(mut self, limit: Duration) {
        let _ = self.shutdown_tx.send(());
        if timeout(limit, &mut self.task).await.is_err() {
            warn!("API server did not close in time");
            self.task.abort();
        } else {
            info!("API server closed");
        }
    }
}
