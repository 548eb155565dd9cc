use std::fmt;

/// Separator between fingerprint and ordinal in a chunk id.
const CHUNK_ID_SEPARATOR: char = '-';

/// Builds the id of chunk `index` of the file with `fingerprint`.
pub fn chunk_id(fingerprint: &str, index: u64) -> String {
    format!("{fingerprint}{CHUNK_ID_SEPARATOR}{index}")
}

/// Error returned when a chunk id has no numeric ordinal suffix.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("chunk id has no numeric ordinal: {0}")]
pub struct ChunkIdError(pub String);

/// Extracts the ordinal from a chunk id: the integer after the last `-`.
///
/// Fingerprints may themselves contain `-`, so only the final segment counts.
pub fn parse_chunk_ordinal(id: &str) -> Result<u64, ChunkIdError> {
    let (_, suffix) = id
        .rsplit_once(CHUNK_ID_SEPARATOR)
        .ok_or_else(|| ChunkIdError(id.to_string()))?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ChunkIdError(id.to_string()));
    }
    suffix.parse().map_err(|_| ChunkIdError(id.to_string()))
}

/// Returns the extension of `filename` including the leading dot.
///
/// Names without a dot have no extension.
pub fn extract_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(pos) => &filename[pos..],
        None => "",
    }
}

/// Plain-text reply to a chunk upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkReply {
    /// The chunk was committed to the staging area.
    Received,
    /// A chunk with this id was already staged.
    ChunkExists,
    /// The whole file was already merged.
    FileExists,
}

impl ChunkReply {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received file chunk",
            Self::ChunkExists => "chunk exist",
            Self::FileExists => "file exist",
        }
    }

    /// Parses a reply body. Returns `None` for anything else (e.g. an error body).
    pub fn parse(body: &str) -> Option<Self> {
        match body.trim() {
            "received file chunk" => Some(Self::Received),
            "chunk exist" => Some(Self::ChunkExists),
            "file exist" => Some(Self::FileExists),
            _ => None,
        }
    }
}

impl fmt::Display for ChunkReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reply body for a chunk that could not be processed.
pub const CHUNK_FAILED: &str = "process file chunk failed";

/// Closed classification of upload failures.
///
/// Codes are what merge/delete responses carry in `code`; 0 is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad request: missing field, malformed JSON, unsafe name.
    Input,
    /// Chunk or file already present. Benign.
    Conflict,
    /// Network failure of a single transfer.
    Transfer,
    /// Structural problem found while merging.
    Merge,
    /// Filesystem failure.
    Io,
}

impl ErrorKind {
    pub fn code(&self) -> i32 {
        match self {
            Self::Input => 1,
            Self::Conflict => 2,
            Self::Transfer => 3,
            Self::Merge => 4,
            Self::Io => 5,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Input),
            2 => Some(Self::Conflict),
            3 => Some(Self::Transfer),
            4 => Some(Self::Merge),
            5 => Some(Self::Io),
            _ => None,
        }
    }
}
