use std::sync::RwLock;

use serde::Serialize;

/// Transfer progress of one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkProgress {
    pub chunk_id: String,
    pub index: u64,
    pub size: u64,
    /// 0..=100.
    pub percentage: u8,
}

/// Per-chunk progress records of the current upload (thread-safe).
///
/// Each transfer updates only its own record.
#[derive(Default)]
pub struct ProgressBoard {
    records: RwLock<Vec<ChunkProgress>>,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all records.
    pub fn load(&self, records: Vec<ChunkProgress>) {
        *self.records.write().unwrap() = records;
    }

    /// Sets the percentage of the chunk with `chunk_id`. Values above 100 are clamped.
    pub fn set_percentage(&self, chunk_id: &str, percentage: u8) {
        let mut records = self.records.write().unwrap();
        if let Some(record) = records.iter_mut().find(|r| r.chunk_id == chunk_id) {
            record.percentage = percentage.min(100);
        }
    }

    /// Returns the record of one chunk.
    pub fn get(&self, chunk_id: &str) -> Option<ChunkProgress> {
        let records = self.records.read().unwrap();
        records.iter().find(|r| r.chunk_id == chunk_id).cloned()
    }

    /// Returns a copy of all records.
    pub fn snapshot(&self) -> Vec<ChunkProgress> {
        self.records.read().unwrap().clone()
    }

    /// Size-weighted percentage across all chunks.
    pub fn overall_percentage(&self) -> u8 {
        let records = self.records.read().unwrap();
        let total: u64 = records.iter().map(|r| r.size).sum();
        if total == 0 {
            return if records.is_empty() { 0 } else { 100 };
        }
        let done: u64 = records
            .iter()
            .map(|r| r.size * u64::from(r.percentage) / 100)
            .sum();
        (done * 100 / total) as u8
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    /// Drops all records.
    pub fn clear(&self) {
        self.records.write().unwrap().clear();
    }
}
