use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::TransferError;

/// One contiguous byte range of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    /// Zero-based ordinal.
    pub index: u64,
    /// Byte offset within the file.
    pub offset: u64,
    /// Length in bytes.
    pub len: u64,
}

impl ChunkRange {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// Number of chunks a file of `file_size` bytes splits into.
pub fn expected_chunk_count(file_size: u64, chunk_size: u64) -> Result<u64, TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::InvalidChunkSize);
    }
    Ok(file_size.div_ceil(chunk_size))
}

/// Partitions `[0, file_size)` into ordered, contiguous ranges of
/// `chunk_size` bytes. The last range may be shorter.
pub fn partition(file_size: u64, chunk_size: u64) -> Result<Vec<ChunkRange>, TransferError> {
    let count = expected_chunk_count(file_size, chunk_size)?;
    let ranges = (0..count)
        .map(|index| {
            let offset = index * chunk_size;
            ChunkRange {
                index,
                offset,
                len: chunk_size.min(file_size - offset),
            }
        })
        .collect();
    Ok(ranges)
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads the bytes of individual chunk ranges from a file.
pub struct ChunkReader {
    file: File,
    file_size: u64,
}

impl ChunkReader {
    /// Opens `path` for chunk reads.
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        Ok(Self { file, file_size })
    }

    /// Reads exactly the bytes covered by `range`.
    pub fn read_range(&mut self, range: &ChunkRange) -> Result<Vec<u8>, TransferError> {
        if range.end() > self.file_size {
            return Err(TransferError::RangeOutOfBounds { index: range.index });
        }
        self.file.seek(SeekFrom::Start(range.offset))?;
        let mut buf = vec![0u8; range.len as usize];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }
}
