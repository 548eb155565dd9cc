//! HTTP server for resumable chunked uploads.
//!
//! Exposes the verify / chunk / merge / delete endpoints over a
//! [`chunkup_store::ChunkStore`] and manages the listener lifecycle.

mod error;
mod handlers;
mod server;

pub use error::ApiError;
pub use handlers::{AppState, router};
pub use server::{ServerConfig, UploadServer};

/// Errors produced by the upload server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server already running")]
    AlreadyRunning,
}
