//! Data types for the upload flow.

use std::path::PathBuf;

use chunkup_protocol::ChunkReply;
use chunkup_transfer::ChunkRange;

/// Server answer to a verify request, as the controller consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOutcome {
    pub should_upload: bool,
    /// Chunk ids the server already holds. Empty when nothing is staged.
    pub resumable_chunk_ids: Vec<String>,
}

/// What to send: a file on disk, its identity, and its partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPlan {
    pub path: PathBuf,
    pub filename: String,
    pub fingerprint: String,
    pub ranges: Vec<ChunkRange>,
}

/// File the controller is currently working on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadContext {
    pub fingerprint: String,
    pub filename: String,
}

/// How one chunk transfer ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    /// The server answered with one of its success replies.
    Sent(ChunkReply),
    /// Already staged before this upload; not transferred.
    Skipped,
    Failed(String),
    Cancelled,
}

impl ChunkStatus {
    /// Whether the chunk is known to be on the server.
    pub fn is_on_server(&self) -> bool {
        matches!(self, Self::Sent(_) | Self::Skipped)
    }
}

/// Outcome of one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub chunk_id: String,
    pub index: u64,
    pub status: ChunkStatus,
}

/// Result of an upload call: one outcome per chunk, in ordinal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub outcomes: Vec<ChunkOutcome>,
}

impl UploadReport {
    /// Every chunk is on the server; a merge may proceed.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.status.is_on_server())
    }

    /// Number of chunks that were actually transferred.
    pub fn transferred(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ChunkStatus::Sent(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ChunkStatus::Skipped))
    }

    pub fn failed(&self) -> Vec<&ChunkOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ChunkStatus::Failed(_)))
            .collect()
    }

    pub fn cancelled(&self) -> usize {
        self.count(|s| matches!(s, ChunkStatus::Cancelled))
    }

    fn count(&self, pred: impl Fn(&ChunkStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Event emitted by the controller while it works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// Fingerprinting progress (0..=100).
    Fingerprint { percentage: u8 },
    /// A chunk transfer advanced.
    ChunkProgress { chunk_id: String, percentage: u8 },
    /// A chunk transfer finished.
    ChunkDone { chunk_id: String, reply: ChunkReply },
    /// A chunk transfer failed. Other transfers carry on.
    ChunkFailed { chunk_id: String, error: String },
    /// The server merged the file.
    Merged { fingerprint: String },
    /// In-flight transfers were cancelled and state cleared.
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: u64, status: ChunkStatus) -> ChunkOutcome {
        ChunkOutcome {
            chunk_id: format!("fp-{index}"),
            index,
            status,
        }
    }

    #[test]
    fn report_counts() {
        let report = UploadReport {
            outcomes: vec![
                outcome(0, ChunkStatus::Skipped),
                outcome(1, ChunkStatus::Sent(ChunkReply::Received)),
                outcome(2, ChunkStatus::Sent(ChunkReply::ChunkExists)),
                outcome(3, ChunkStatus::Failed("boom".into())),
            ],
        };
        assert_eq!(report.transferred(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed().len(), 1);
        assert!(!report.is_complete());
    }

    #[test]
    fn benign_conflicts_count_as_complete() {
        let report = UploadReport {
            outcomes: vec![
                outcome(0, ChunkStatus::Sent(ChunkReply::FileExists)),
                outcome(1, ChunkStatus::Sent(ChunkReply::ChunkExists)),
            ],
        };
        assert!(report.is_complete());
        assert!(UploadReport::default().is_complete());
    }
}
