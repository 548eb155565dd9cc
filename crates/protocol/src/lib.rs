//! Wire protocol for resumable chunked uploads.
//!
//! JSON over HTTP for control requests (`/verify`, `/merge`, `/delete`) and
//! multipart form data for chunk bodies. Both sides agree on the chunk id
//! format and on [`DEFAULT_CHUNK_SIZE`]; the merge offset arithmetic breaks
//! if they disagree.

pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::{CODE_OK, DEFAULT_CHUNK_SIZE, STAGING_PREFIX, fields, routes};
pub use messages::{
    DELETE_SUCCESS, DeleteRequest, MERGE_SUCCESS, MergeRequest, StatusResponse, VerifyRequest,
    VerifyResponse,
};
pub use types::{
    CHUNK_FAILED, ChunkIdError, ChunkReply, ErrorKind, chunk_id, extract_extension,
    parse_chunk_ordinal,
};
