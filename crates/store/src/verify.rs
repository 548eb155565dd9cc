use tracing::debug;

use crate::StoreError;
use crate::staging::ChunkStore;

/// What a client should do about a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyDecision {
    /// The artifact already exists; nothing to send.
    Complete,
    /// Upload is needed; `uploaded` lists ids already staged.
    Upload { uploaded: Vec<String> },
}

impl VerifyDecision {
    pub fn should_upload(&self) -> bool {
        matches!(self, Self::Upload { .. })
    }
}

/// Answers resume queries against a [`ChunkStore`].
#[derive(Clone)]
pub struct VerificationService {
    store: ChunkStore,
}

impl VerificationService {
    pub fn new(store: ChunkStore) -> Self {
        Self { store }
    }

    /// Decides whether `filename` with `fingerprint` still has to be uploaded.
    ///
    /// Runs under the fingerprint's shared lock, so it never observes a merge
    /// halfway through.
    pub async fn verify(
        &self,
        fingerprint: &str,
        filename: &str,
    ) -> Result<VerifyDecision, StoreError> {
        let _guard = self.store.locks().shared(fingerprint).await;

        if self.store.artifact_exists(fingerprint, filename).await? {
            debug!(%fingerprint, "artifact present");
            return Ok(VerifyDecision::Complete);
        }

        let uploaded = self.store.list_staged_unlocked(fingerprint).await?;
        debug!(%fingerprint, staged = uploaded.len(), "upload needed");
        Ok(VerifyDecision::Upload { uploaded })
    }
}
