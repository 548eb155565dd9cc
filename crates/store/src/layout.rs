use std::path::{Path, PathBuf};

use chunkup_protocol::{STAGING_PREFIX, extract_extension};

use crate::StoreError;
use crate::validation::validate_component;

/// Name of the spool directory for request bodies still in transit.
const INCOMING_DIR: &str = ".incoming";

/// Resolves every path the store touches.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
    staging_prefix: String,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_prefix(root, STAGING_PREFIX)
    }

    pub fn with_prefix(root: impl Into<PathBuf>, staging_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            staging_prefix: staging_prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Spool directory for chunk bodies that are not yet committed.
    pub fn incoming_dir(&self) -> PathBuf {
        self.root.join(INCOMING_DIR)
    }

    /// Staging directory of one file.
    pub fn staging_dir(&self, fingerprint: &str) -> Result<PathBuf, StoreError> {
        validate_component("fingerprint", fingerprint)?;
        Ok(self
            .root
            .join(format!("{}_{fingerprint}", self.staging_prefix)))
    }

    /// Path of one staged chunk.
    pub fn chunk_path(&self, fingerprint: &str, chunk_id: &str) -> Result<PathBuf, StoreError> {
        validate_component("chunk id", chunk_id)?;
        Ok(self.staging_dir(fingerprint)?.join(chunk_id))
    }

    /// Path of the merged artifact: `<fingerprint><extension of filename>`.
    pub fn artifact_path(&self, fingerprint: &str, filename: &str) -> Result<PathBuf, StoreError> {
        validate_component("fingerprint", fingerprint)?;
        let name = format!("{fingerprint}{}", extract_extension(filename));
        validate_component("artifact name", &name)?;
        Ok(self.root.join(name))
    }

    /// Scratch file a merge writes into before it is renamed into place.
    pub fn merge_scratch_path(&self, fingerprint: &str) -> Result<PathBuf, StoreError> {
        validate_component("fingerprint", fingerprint)?;
        Ok(self.incoming_dir().join(format!("{fingerprint}.merging")))
    }

    /// Whether `name` is the spool directory (skipped by bulk operations).
    pub(crate) fn is_internal(name: &str) -> bool {
        name == INCOMING_DIR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_dir_uses_prefix() {
        let layout = StorageLayout::new("/srv/chunks");
        assert_eq!(
            layout.staging_dir("abc").unwrap(),
            PathBuf::from("/srv/chunks/strike_abc")
        );
        let custom = StorageLayout::with_prefix("/srv/chunks", "stage");
        assert_eq!(
            custom.staging_dir("abc").unwrap(),
            PathBuf::from("/srv/chunks/stage_abc")
        );
    }

    #[test]
    fn artifact_keeps_extension() {
        let layout = StorageLayout::new("/srv/chunks");
        assert_eq!(
            layout.artifact_path("abc", "holiday.mov").unwrap(),
            PathBuf::from("/srv/chunks/abc.mov")
        );
        assert_eq!(
            layout.artifact_path("abc", "README").unwrap(),
            PathBuf::from("/srv/chunks/abc")
        );
    }

    #[test]
    fn chunk_path_is_inside_staging_dir() {
        let layout = StorageLayout::new("/srv/chunks");
        assert_eq!(
            layout.chunk_path("abc", "abc-3").unwrap(),
            PathBuf::from("/srv/chunks/strike_abc/abc-3")
        );
    }

    #[test]
    fn traversal_is_rejected() {
        let layout = StorageLayout::new("/srv/chunks");
        assert!(layout.staging_dir("../etc").is_err());
        assert!(layout.chunk_path("abc", "../../x").is_err());
        assert!(layout.artifact_path("abc", "evil./../x").is_err());
    }
}
