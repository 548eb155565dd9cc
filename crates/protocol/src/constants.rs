/// Default chunk size: 5 MiB.
///
/// Must match between the client that slices the file and the server that
/// merges it, since merge offsets are `ordinal * chunk_size`.
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Prefix of per-fingerprint staging directories (`strike_<fingerprint>`).
pub const STAGING_PREFIX: &str = "strike";

/// HTTP routes served by the upload server.
pub mod routes {
    pub const UPLOAD_CHUNK: &str = "/";
    pub const VERIFY: &str = "/verify";
    pub const MERGE: &str = "/merge";
    pub const DELETE: &str = "/delete";
    pub const HEALTH: &str = "/health";
}

/// Multipart field names of a chunk upload.
pub mod fields {
    /// Binary chunk body.
    pub const CHUNK: &str = "chunk";
    /// Chunk id (`<fingerprint>-<ordinal>`).
    pub const HASH: &str = "hash";
    pub const FILENAME: &str = "filename";
    pub const FILE_HASH: &str = "fileHash";
    /// Declared chunk length in bytes. Informational only.
    pub const LENGTH: &str = "length";
}

/// Status code used for successful merge/delete responses.
pub const CODE_OK: i32 = 0;
