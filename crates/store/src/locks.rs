use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Per-fingerprint reader/writer locks.
///
/// Chunk arrivals and verification share a fingerprint's lock; merge and
/// purge hold it exclusively. A root lock lets a full wipe exclude every
/// fingerprint at once.
#[derive(Default)]
pub struct FingerprintLocks {
    root: Arc<RwLock<()>>,
    entries: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

/// Held while reading or adding chunks of one fingerprint.
pub struct SharedGuard {
    _entry: OwnedRwLockReadGuard<()>,
    _root: OwnedRwLockReadGuard<()>,
}

/// Held while merging or purging one fingerprint.
pub struct ExclusiveGuard {
    _entry: OwnedRwLockWriteGuard<()>,
    _root: OwnedRwLockReadGuard<()>,
}

impl FingerprintLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the fingerprint's lock in shared mode.
    pub async fn shared(&self, fingerprint: &str) -> SharedGuard {
        let root = Arc::clone(&self.root).read_owned().await;
        let entry = self.entry(fingerprint).read_owned().await;
        SharedGuard {
            _entry: entry,
            _root: root,
        }
    }

    /// Acquires the fingerprint's lock in exclusive mode.
    pub async fn exclusive(&self, fingerprint: &str) -> ExclusiveGuard {
        let root = Arc::clone(&self.root).read_owned().await;
        let entry = self.entry(fingerprint).write_owned().await;
        ExclusiveGuard {
            _entry: entry,
            _root: root,
        }
    }

    /// Excludes every fingerprint.
    pub async fn exclusive_all(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.root).write_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    fn entry(&self, fingerprint: &str) -> Arc<RwLock<()>> {
        let mut entries = self.entries.lock().unwrap();
        // Entries nobody holds or waits on can go; guards keep a clone alive.
        entries.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(entries.entry(fingerprint.to_string()).or_default())
    }
}
