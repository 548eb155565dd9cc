use std::path::Path;

use chunkup_protocol::extract_extension;

use crate::TransferError;

/// A local file about to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub size: u64,
    /// Extension including the leading dot, or empty.
    pub extension: String,
    fingerprint: Option<String>,
}

impl SourceFile {
    /// Describes the file at `path` (name and size from the filesystem).
    pub fn from_path(path: &Path) -> Result<Self, TransferError> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(TransferError::InvalidSource(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                TransferError::InvalidSource(format!("unusable file name: {}", path.display()))
            })?
            .to_string();
        Ok(Self::new(name, metadata.len()))
    }

    pub fn new(name: impl Into<String>, size: u64) -> Self {
        let name = name.into();
        let extension = extract_extension(&name).to_string();
        Self {
            name,
            size,
            extension,
            fingerprint: None,
        }
    }

    /// Uses a caller-supplied fingerprint instead of hashing the content.
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Assigns the fingerprint. It can only be set once.
    pub fn assign_fingerprint(&mut self, fingerprint: String) -> Result<(), TransferError> {
        if self.fingerprint.is_some() {
            return Err(TransferError::FingerprintAssigned);
        }
        self.fingerprint = Some(fingerprint);
        Ok(())
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Name of the merged artifact on the server: `<fingerprint><extension>`.
    pub fn artifact_name(&self) -> Option<String> {
        self.fingerprint
            .as_ref()
            .map(|fp| format!("{fp}{}", self.extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_derives_extension() {
        let file = SourceFile::new("movie.mp4", 10);
        assert_eq!(file.extension, ".mp4");
        assert!(file.fingerprint().is_none());
        assert!(file.artifact_name().is_none());
    }

    #[test]
    fn fingerprint_assigned_once() {
        let mut file = SourceFile::new("a.bin", 1);
        file.assign_fingerprint("abc".into()).unwrap();
        assert_eq!(file.fingerprint(), Some("abc"));
        assert!(matches!(
            file.assign_fingerprint("def".into()),
            Err(TransferError::FingerprintAssigned)
        ));
        assert_eq!(file.artifact_name().as_deref(), Some("abc.bin"));
    }

    #[test]
    fn substitute_fingerprint_is_immutable() {
        let mut file = SourceFile::new("a.bin", 1).with_fingerprint("a.bin");
        assert!(file.assign_fingerprint("x".into()).is_err());
    }

    #[test]
    fn from_path_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let file = SourceFile::from_path(&path).unwrap();
        assert_eq!(file.name, "notes.txt");
        assert_eq!(file.size, 5);
        assert_eq!(file.extension, ".txt");
    }

    #[test]
    fn from_path_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SourceFile::from_path(dir.path()),
            Err(TransferError::InvalidSource(_))
        ));
    }
}
