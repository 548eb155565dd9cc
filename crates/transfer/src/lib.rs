//! Client-side building blocks for chunked uploads: partitioning a file
//! into fixed-size ranges, fingerprinting it off the async executor, and
//! tracking per-chunk transfer progress.

mod chunker;
mod fingerprint;
mod progress;
mod types;

pub use chunker::{ChunkRange, ChunkReader, expected_chunk_count, partition};
pub use fingerprint::{FingerprintMessage, FingerprintTask, FingerprintWorker, file_fingerprint};
pub use progress::{ChunkProgress, ProgressBoard};
pub use types::SourceFile;

pub use chunkup_protocol::DEFAULT_CHUNK_SIZE;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("chunk {index} lies outside the file")]
    RangeOutOfBounds { index: u64 },

    #[error("fingerprint failed: {0}")]
    Fingerprint(String),

    #[error("fingerprint already assigned")]
    FingerprintAssigned,

    #[error("invalid source file: {0}")]
    InvalidSource(String),
}
