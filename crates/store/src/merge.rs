//! Assembly of staged chunks into the final artifact.

use std::io::{ErrorKind as IoErrorKind, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;

use chunkup_protocol::parse_chunk_ordinal;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::StoreError;
use crate::layout::StorageLayout;
use crate::locks::FingerprintLocks;

/// Gaps listed in an `Incomplete` error; the rest are only counted.
const MISSING_REPORT_LIMIT: usize = 16;

/// Reasons a merge is refused or fails.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("no staged chunks for {fingerprint}")]
    MissingStaging { fingerprint: String },

    #[error("staged entry is not a chunk id: {0}")]
    InvalidChunkId(String),

    #[error("ordinal {0} staged more than once")]
    DuplicateOrdinal(u64),

    #[error(
        "incomplete upload: expected {expected} chunks, {present} staged, first missing {missing:?}"
    )]
    Incomplete {
        expected: u64,
        present: u64,
        /// Lowest missing ordinals, at most 16.
        missing: Vec<u64>,
    },

    #[error("unexpected chunk ordinal {ordinal}")]
    Unexpected { ordinal: u64 },

    #[error("chunk {index} is {actual} bytes, expected {expected}")]
    ChunkSize {
        index: u64,
        expected: u64,
        actual: u64,
    },

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a successful merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub path: PathBuf,
    pub bytes: u64,
    pub chunks: u64,
    /// The artifact existed before this call; nothing was written.
    pub already_merged: bool,
}

#[derive(Debug)]
struct StagedChunk {
    ordinal: u64,
    path: PathBuf,
    len: u64,
}

/// Concatenates staged chunks in ordinal order.
#[derive(Clone)]
pub struct MergeEngine {
    layout: StorageLayout,
    locks: Arc<FingerprintLocks>,
}

impl MergeEngine {
    pub(crate) fn new(layout: StorageLayout, locks: Arc<FingerprintLocks>) -> Self {
        Self { layout, locks }
    }

    /// Merges the chunks staged for `fingerprint` into `<fingerprint><ext>`.
    ///
    /// The staged set is checked for completeness before any byte is
    /// written: ordinals must run `0..n` without gaps, every chunk but the
    /// last must be exactly `chunk_size` bytes, and when `file_size` is known
    /// the chunk count and total length must match it. The artifact appears
    /// atomically and the staging directory is removed afterwards.
    pub async fn merge(
        &self,
        fingerprint: &str,
        filename: &str,
        chunk_size: u64,
        file_size: Option<u64>,
    ) -> Result<MergeOutcome, StoreError> {
        if chunk_size == 0 {
            return Err(MergeError::InvalidChunkSize.into());
        }
        let artifact = self.layout.artifact_path(fingerprint, filename)?;
        let staging_dir = self.layout.staging_dir(fingerprint)?;
        let scratch = self.layout.merge_scratch_path(fingerprint)?;

        let _guard = self.locks.exclusive(fingerprint).await;

        if let Ok(meta) = tokio::fs::metadata(&artifact).await {
            debug!(%fingerprint, "artifact already merged");
            return Ok(MergeOutcome {
                path: artifact,
                bytes: meta.len(),
                chunks: 0,
                already_merged: true,
            });
        }

        let chunks = match self.collect(fingerprint, &staging_dir).await {
            Ok(chunks) => chunks,
            Err(StoreError::Merge(MergeError::MissingStaging { .. })) if file_size == Some(0) => {
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        if chunks.is_empty() && file_size != Some(0) {
            return Err(MergeError::MissingStaging {
                fingerprint: fingerprint.to_string(),
            }
            .into());
        }
        check_complete(&chunks, chunk_size, file_size)?;

        tokio::fs::create_dir_all(self.layout.incoming_dir()).await?;
        let bytes = match write_scratch(&scratch, &chunks, chunk_size).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&scratch).await;
                return Err(e.into());
            }
        };
        tokio::fs::rename(&scratch, &artifact).await?;

        match tokio::fs::remove_dir_all(&staging_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == IoErrorKind::NotFound => {}
            Err(e) => warn!(%fingerprint, "failed to clear staging directory: {e}"),
        }

        info!(
            %fingerprint,
            chunks = chunks.len(),
            bytes,
            artifact = %artifact.display(),
            "merge complete"
        );
        Ok(MergeOutcome {
            path: artifact,
            bytes,
            chunks: chunks.len() as u64,
            already_merged: false,
        })
    }

    async fn collect(
        &self,
        fingerprint: &str,
        staging_dir: &std::path::Path,
    ) -> Result<Vec<StagedChunk>, StoreError> {
        let mut entries = match tokio::fs::read_dir(staging_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(MergeError::MissingStaging {
                    fingerprint: fingerprint.to_string(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        let mut chunks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let ordinal = parse_chunk_ordinal(&name)
                .map_err(|_| MergeError::InvalidChunkId(name.clone()))?;
            chunks.push(StagedChunk {
                ordinal,
                path: entry.path(),
                len: meta.len(),
            });
        }
        chunks.sort_by_key(|c| c.ordinal);
        Ok(chunks)
    }
}

/// Checks that `chunks` (sorted by ordinal) form one whole file.
fn check_complete(
    chunks: &[StagedChunk],
    chunk_size: u64,
    file_size: Option<u64>,
) -> Result<(), MergeError> {
    for pair in chunks.windows(2) {
        if pair[0].ordinal == pair[1].ordinal {
            return Err(MergeError::DuplicateOrdinal(pair[0].ordinal));
        }
    }

    let present = chunks.len() as u64;
    let expected = match (file_size, chunks.last()) {
        (Some(size), _) => size.div_ceil(chunk_size),
        (None, Some(last)) => last
            .ordinal
            .checked_add(1)
            .ok_or(MergeError::Unexpected {
                ordinal: last.ordinal,
            })?,
        (None, None) => 0,
    };

    if let Some(extra) = chunks.iter().find(|c| c.ordinal >= expected) {
        return Err(MergeError::Unexpected {
            ordinal: extra.ordinal,
        });
    }
    if present != expected {
        return Err(MergeError::Incomplete {
            expected,
            present,
            missing: first_missing(chunks, expected, MISSING_REPORT_LIMIT),
        });
    }

    let Some((last, body)) = chunks.split_last() else {
        return Ok(());
    };
    for chunk in body {
        if chunk.len != chunk_size {
            return Err(MergeError::ChunkSize {
                index: chunk.ordinal,
                expected: chunk_size,
                actual: chunk.len,
            });
        }
    }
    let last_expected = match file_size {
        Some(size) => size - last.ordinal * chunk_size,
        None => last.len.clamp(1, chunk_size),
    };
    if last.len != last_expected {
        return Err(MergeError::ChunkSize {
            index: last.ordinal,
            expected: last_expected,
            actual: last.len,
        });
    }
    Ok(())
}

/// Lowest ordinals in `0..expected` absent from `chunks`, walking only the
/// gaps between staged ordinals.
fn first_missing(chunks: &[StagedChunk], expected: u64, limit: usize) -> Vec<u64> {
    let mut missing = Vec::new();
    let mut next = 0u64;
    let bounds = chunks.iter().map(|c| c.ordinal).chain(std::iter::once(expected));
    for bound in bounds {
        while next < bound {
            if missing.len() == limit {
                return missing;
            }
            missing.push(next);
            next += 1;
        }
        next = bound.saturating_add(1);
    }
    missing
}

async fn write_scratch(
    scratch: &std::path::Path,
    chunks: &[StagedChunk],
    chunk_size: u64,
) -> Result<u64, std::io::Error> {
    let mut out = tokio::fs::File::create(scratch).await?;
    let mut bytes = 0;
    for chunk in chunks {
        out.seek(SeekFrom::Start(chunk.ordinal * chunk_size)).await?;
        let mut src = tokio::fs::File::open(&chunk.path).await?;
        bytes += tokio::io::copy(&mut src, &mut out).await?;
    }
    out.flush().await?;
    out.sync_all().await?;
    Ok(bytes)
}
