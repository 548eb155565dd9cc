//! Client side of resumable chunked uploads.
//!
//! [`TransferController`] drives verify / upload / merge / reset / delete
//! against any [`UploadTransport`]; [`HttpTransport`] is the reqwest-backed
//! implementation. [`pipeline::upload_file`] strings the steps together for
//! one file on disk.
//!
//! # Pipeline
//!
//! 1. **Partition** the file into fixed-size ranges
//! 2. **Fingerprint** it on a blocking worker
//! 3. **Verify** with the server to learn what is already staged
//! 4. **Upload** the missing chunks, bounded in concurrency
//! 5. **Merge** once every chunk is on the server

pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod transport;
pub mod types;

pub use config::ClientConfig;
pub use controller::TransferController;
pub use error::ClientError;
pub use http::HttpTransport;
pub use pipeline::{PipelineOptions, PipelineOutcome, upload_file};
pub use transport::{ChunkUpload, ProgressFn, TransportFuture, UploadTransport};
pub use types::{
    ChunkOutcome, ChunkStatus, TransferEvent, UploadContext, UploadPlan, UploadReport,
    VerifyOutcome,
};
