use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::TransferError;
use crate::chunker::{ChunkRange, ChunkReader};

/// Capacity of the worker's message channel.
const MESSAGE_BUFFER: usize = 64;

/// Computes the fingerprint of a whole file in one pass.
///
/// Produces the same value as [`FingerprintWorker`] for the same content.
pub fn file_fingerprint(path: &Path) -> Result<String, TransferError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// FingerprintWorker
// ---------------------------------------------------------------------------

/// Messages emitted by a running fingerprint worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerprintMessage {
    /// Share of chunks hashed so far (0..=100).
    Progress { percentage: u8 },
    /// Terminal: the fingerprint of the whole file.
    Done { fingerprint: String },
    /// Terminal: hashing failed.
    Failed { error: String },
}

/// Hashes a file chunk by chunk on a blocking thread.
///
/// Each invocation gets its own worker; nothing is shared across files.
pub struct FingerprintWorker;

impl FingerprintWorker {
    /// Starts hashing `path` over `ranges` (in ordinal order).
    pub fn start(path: PathBuf, ranges: Vec<ChunkRange>) -> FingerprintTask {
        let (tx, rx) = mpsc::channel(MESSAGE_BUFFER);
        let handle = tokio::task::spawn_blocking(move || {
            let terminal = match hash_ranges(&path, &ranges, &tx) {
                Ok(fingerprint) => FingerprintMessage::Done { fingerprint },
                Err(e) => FingerprintMessage::Failed {
                    error: e.to_string(),
                },
            };
            // The receiver may have been dropped; nothing left to report to.
            let _ = tx.blocking_send(terminal);
        });
        FingerprintTask { rx, handle }
    }
}

fn hash_ranges(
    path: &Path,
    ranges: &[ChunkRange],
    tx: &mpsc::Sender<FingerprintMessage>,
) -> Result<String, TransferError> {
    let mut reader = ChunkReader::open(path)?;
    let mut hasher = Sha256::new();
    let total = ranges.len();

    for (done, range) in ranges.iter().enumerate() {
        let data = reader.read_range(range)?;
        hasher.update(&data);

        let percentage = ((done + 1) * 100 / total) as u8;
        if tx
            .blocking_send(FingerprintMessage::Progress { percentage })
            .is_err()
        {
            return Err(TransferError::Fingerprint("caller went away".into()));
        }
    }

    if total == 0 {
        let _ = tx.blocking_send(FingerprintMessage::Progress { percentage: 100 });
    }

    let fingerprint = hex::encode(hasher.finalize());
    debug!(path = %path.display(), chunks = total, %fingerprint, "fingerprint computed");
    Ok(fingerprint)
}

/// Handle to a running fingerprint worker.
pub struct FingerprintTask {
    rx: mpsc::Receiver<FingerprintMessage>,
    handle: JoinHandle<()>,
}

impl FingerprintTask {
    /// Waits for the fingerprint.
    ///
    /// `on_progress` sees every progress update; only the terminal message
    /// resolves the call.
    pub async fn wait(
        mut self,
        mut on_progress: impl FnMut(u8),
    ) -> Result<String, TransferError> {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                FingerprintMessage::Progress { percentage } => on_progress(percentage),
                FingerprintMessage::Done { fingerprint } => return Ok(fingerprint),
                FingerprintMessage::Failed { error } => {
                    return Err(TransferError::Fingerprint(error));
                }
            }
        }

        // Channel closed without a terminal message: the worker panicked.
        match (&mut self.handle).await {
            Err(e) => Err(TransferError::Fingerprint(format!("worker died: {e}"))),
            Ok(()) => Err(TransferError::Fingerprint(
                "worker exited without a result".into(),
            )),
        }
    }
}
