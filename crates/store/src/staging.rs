//! Chunk staging area.
//!
//! Bodies are spooled into `.incoming/` first and only renamed into the
//! staging directory once complete, so a request aborted mid-body never
//! leaves a partial chunk behind.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::StoreError;
use crate::layout::StorageLayout;
use crate::locks::FingerprintLocks;
use crate::merge::MergeEngine;
use crate::verify::VerificationService;

/// Result of offering a chunk to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Committed to the staging area.
    Received,
    /// A chunk with the same id was already staged.
    ChunkExists,
    /// The final artifact already exists.
    FileExists,
}

// ---------------------------------------------------------------------------
// IncomingChunk
// ---------------------------------------------------------------------------

/// A chunk body being spooled to disk.
///
/// The spool file is deleted on drop unless the store committed it.
pub struct IncomingChunk {
    path: PathBuf,
    file: Option<tokio::fs::File>,
    len: u64,
    committed: bool,
}

impl IncomingChunk {
    /// Creates an empty spool file under the layout's incoming directory.
    pub async fn create(layout: &StorageLayout) -> Result<Self, StoreError> {
        let dir = layout.incoming_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.part", uuid::Uuid::new_v4()));
        let file = tokio::fs::File::create(&path).await?;
        Ok(Self {
            path,
            file: Some(file),
            len: 0,
            committed: false,
        })
    }

    /// Appends body bytes.
    pub async fn write(&mut self, data: &[u8]) -> Result<(), StoreError> {
        let file = self.file.as_mut().ok_or_else(closed)?;
        file.write_all(data).await?;
        self.len += data.len() as u64;
        Ok(())
    }

    /// Flushes and closes the spool file. Idempotent.
    pub async fn finish(&mut self) -> Result<(), StoreError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_data().await?;
        }
        Ok(())
    }

    /// Bytes written so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn closed() -> StoreError {
    StoreError::Io(std::io::Error::other("incoming chunk already finished"))
}

impl Drop for IncomingChunk {
    fn drop(&mut self) {
        if !self.committed {
            drop(self.file.take());
            if let Err(e) = std::fs::remove_file(&self.path)
                && e.kind() != IoErrorKind::NotFound
            {
                warn!(path = %self.path.display(), "failed to discard spool file: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ChunkStore
// ---------------------------------------------------------------------------

/// Staging area keyed by file fingerprint.
#[derive(Clone)]
pub struct ChunkStore {
    layout: StorageLayout,
    locks: Arc<FingerprintLocks>,
}

impl ChunkStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self {
            layout,
            locks: Arc::new(FingerprintLocks::new()),
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Verification service sharing this store's locks.
    pub fn verifier(&self) -> VerificationService {
        VerificationService::new(self.clone())
    }

    /// Merge engine sharing this store's locks.
    pub fn merger(&self) -> MergeEngine {
        MergeEngine::new(self.layout.clone(), Arc::clone(&self.locks))
    }

    /// Starts spooling a new chunk body.
    pub async fn incoming(&self) -> Result<IncomingChunk, StoreError> {
        IncomingChunk::create(&self.layout).await
    }

    /// Commits a spooled chunk under `chunk_id`.
    ///
    /// An existing artifact or an already staged id short-circuits; the chunk
    /// content is never compared against its id.
    pub async fn receive(
        &self,
        fingerprint: &str,
        chunk_id: &str,
        mut incoming: IncomingChunk,
        filename: &str,
    ) -> Result<ReceiveOutcome, StoreError> {
        let artifact = self.layout.artifact_path(fingerprint, filename)?;
        let staging_dir = self.layout.staging_dir(fingerprint)?;
        let chunk_path = self.layout.chunk_path(fingerprint, chunk_id)?;

        incoming.finish().await?;

        let _guard = self.locks.shared(fingerprint).await;

        if tokio::fs::try_exists(&artifact).await? {
            debug!(%fingerprint, %chunk_id, "artifact exists, chunk ignored");
            return Ok(ReceiveOutcome::FileExists);
        }

        if tokio::fs::try_exists(&chunk_path).await? {
            debug!(%fingerprint, %chunk_id, "chunk already staged");
            return Ok(ReceiveOutcome::ChunkExists);
        }

        tokio::fs::create_dir_all(&staging_dir).await?;
        tokio::fs::rename(incoming.path(), &chunk_path).await?;
        incoming.committed = true;

        info!(%fingerprint, %chunk_id, bytes = incoming.len(), "chunk staged");
        Ok(ReceiveOutcome::Received)
    }

    /// Spools `data` and commits it. Convenience for in-process callers.
    pub async fn receive_bytes(
        &self,
        fingerprint: &str,
        chunk_id: &str,
        data: &[u8],
        filename: &str,
    ) -> Result<ReceiveOutcome, StoreError> {
        let mut incoming = self.incoming().await?;
        incoming.write(data).await?;
        self.receive(fingerprint, chunk_id, incoming, filename).await
    }

    /// Ids of the chunks currently staged for `fingerprint`, sorted.
    ///
    /// Empty when no staging directory exists.
    pub async fn list_staged(&self, fingerprint: &str) -> Result<Vec<String>, StoreError> {
        let _guard = self.locks.shared(fingerprint).await;
        self.list_staged_unlocked(fingerprint).await
    }

    pub(crate) async fn list_staged_unlocked(
        &self,
        fingerprint: &str,
    ) -> Result<Vec<String>, StoreError> {
        let dir = self.layout.staging_dir(fingerprint)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                ids.push(name.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Whether the final artifact for this file exists.
    pub(crate) async fn artifact_exists(
        &self,
        fingerprint: &str,
        filename: &str,
    ) -> Result<bool, StoreError> {
        let artifact = self.layout.artifact_path(fingerprint, filename)?;
        Ok(tokio::fs::try_exists(&artifact).await?)
    }

    pub(crate) fn locks(&self) -> &FingerprintLocks {
        &self.locks
    }

    /// Deletes the artifact and the staging area of one file.
    ///
    /// Returns `true` if anything was removed.
    pub async fn purge(&self, fingerprint: &str, filename: &str) -> Result<bool, StoreError> {
        let artifact = self.layout.artifact_path(fingerprint, filename)?;
        let staging_dir = self.layout.staging_dir(fingerprint)?;

        let _guard = self.locks.exclusive(fingerprint).await;

        let mut removed = false;
        match tokio::fs::remove_file(&artifact).await {
            Ok(()) => removed = true,
            Err(e) if e.kind() == IoErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        match tokio::fs::remove_dir_all(&staging_dir).await {
            Ok(()) => removed = true,
            Err(e) if e.kind() == IoErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        info!(%fingerprint, removed, "purged");
        Ok(removed)
    }

    /// Deletes every artifact and staging area under the root.
    ///
    /// Bodies still being spooled are left alone. Returns the number of
    /// top-level entries removed.
    pub async fn purge_all(&self) -> Result<usize, StoreError> {
        let _guard = self.locks.exclusive_all().await;

        let mut entries = match tokio::fs::read_dir(self.layout.root()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_str().is_some_and(StorageLayout::is_internal) {
                continue;
            }
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(entry.path()).await?;
            } else {
                tokio::fs::remove_file(entry.path()).await?;
            }
            removed += 1;
        }

        info!(removed, root = %self.layout.root().display(), "purged all uploads");
        Ok(removed)
    }
}
