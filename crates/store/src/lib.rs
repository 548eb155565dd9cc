//! Content-addressed staging of uploaded chunks and their assembly into
//! final artifacts.
//!
//! On-disk layout under the upload root:
//!
//! ```text
//! <root>/<prefix>_<fingerprint>/<fingerprint>-<ordinal>   staged chunks
//! <root>/<fingerprint><extension>                         merged artifacts
//! <root>/.incoming/                                       in-progress bodies
//! ```
//!
//! An artifact's presence is the only record that a file is complete.

mod layout;
mod locks;
mod merge;
mod staging;
mod validation;
mod verify;

pub use layout::StorageLayout;
pub use locks::{ExclusiveGuard, FingerprintLocks, SharedGuard};
pub use merge::{MergeEngine, MergeError, MergeOutcome};
pub use staging::{ChunkStore, IncomingChunk, ReceiveOutcome};
pub use validation::validate_component;
pub use verify::{VerificationService, VerifyDecision};

use chunkup_protocol::ErrorKind;

/// Errors produced by the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),
}

impl StoreError {
    /// Classifies the error for the wire.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::InvalidName(_) => ErrorKind::Input,
            Self::Merge(MergeError::Io(_)) => ErrorKind::Io,
            Self::Merge(MergeError::InvalidChunkSize) => ErrorKind::Input,
            Self::Merge(_) => ErrorKind::Merge,
        }
    }
}
