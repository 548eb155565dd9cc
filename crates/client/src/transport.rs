//! Transport seam between the controller and the server.
//!
//! The controller only talks to an [`UploadTransport`], which keeps upload
//! logic decoupled from HTTP and testable with mocks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use chunkup_protocol::{
    ChunkReply, DeleteRequest, MergeRequest, StatusResponse, VerifyRequest, VerifyResponse,
};

use crate::error::ClientError;

/// Boxed future returned by transport methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>;

/// Receives the percentage (0..=100) of one chunk body handed to the wire.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// One chunk ready to be sent.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub fingerprint: String,
    pub chunk_id: String,
    pub filename: String,
    pub data: Bytes,
}

/// Abstract connection to an upload server.
pub trait UploadTransport: Send + Sync + 'static {
    /// Asks whether a file still needs uploading.
    fn verify(&self, req: VerifyRequest) -> TransportFuture<'_, VerifyResponse>;

    /// Sends one chunk. Success replies include the benign conflicts.
    fn send_chunk(&self, chunk: ChunkUpload, progress: ProgressFn) -> TransportFuture<'_, ChunkReply>;

    /// Requests assembly of the staged chunks.
    fn merge(&self, req: MergeRequest) -> TransportFuture<'_, StatusResponse>;

    /// Purges one file, or everything when `req` is `None`.
    fn delete(&self, req: Option<DeleteRequest>) -> TransportFuture<'_, StatusResponse>;
}
