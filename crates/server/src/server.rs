//! Listener lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use chunkup_protocol::DEFAULT_CHUNK_SIZE;
use chunkup_store::ChunkStore;

use crate::ServerError;
use crate::handlers::{AppState, router};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (port 0 = OS-assigned).
    pub listen_addr: SocketAddr,
    /// Upper bound on a single request body.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], 3001).into(),
            max_body_bytes: DEFAULT_CHUNK_SIZE + 1024 * 1024,
        }
    }
}

/// The upload HTTP server.
pub struct UploadServer {
    config: ServerConfig,
    state: AppState,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl UploadServer {
    pub fn new(config: ServerConfig, store: ChunkStore) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: AppState::new(store),
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
        })
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available once the listener is bound.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Gracefully shuts down the server. In-flight requests are allowed to
    /// finish.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Binds the configured address and serves until [`shutdown`](Self::shutdown).
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener until [`shutdown`](Self::shutdown).
    pub async fn serve(self: &Arc<Self>, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        {
            let mut slot = self.local_addr.lock().await;
            if slot.is_some() {
                return Err(ServerError::AlreadyRunning);
            }
            *slot = Some(local_addr);
        }
        tracing::info!(
            root = %self.state.store().layout().root().display(),
            "upload server listening on {local_addr}"
        );

        let app = router(self.state.clone(), self.config.max_body_bytes);
        let cancel = self.cancel.clone();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await;

        *self.local_addr.lock().await = None;
        tracing::info!("upload server stopped");
        result.map_err(ServerError::from)
    }
}
