use std::path::{Component, Path};

use crate::StoreError;

/// Validates that `value` is usable as a single file name inside the upload root.
///
/// Rejects:
/// - Empty names
/// - Names containing path separators or NUL
/// - `.`/`..` and any name starting with a dot (reserved for internal use)
/// - Anything that does not parse as exactly one normal path component
pub fn validate_component(what: &str, value: &str) -> Result<(), StoreError> {
    if value.is_empty() {
        return Err(StoreError::InvalidName(format!("empty {what}")));
    }

    if value.contains(['/', '\\', '\0']) {
        return Err(StoreError::InvalidName(format!(
            "{what} contains a path separator: {value}"
        )));
    }

    if value.starts_with('.') {
        return Err(StoreError::InvalidName(format!(
            "{what} may not start with a dot: {value}"
        )));
    }

    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(StoreError::InvalidName(format!(
            "{what} is not a plain file name: {value}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty() {
        assert!(validate_component("fingerprint", "").is_err());
    }

    #[test]
    fn rejects_parent_dir() {
        assert!(validate_component("chunk id", "..").is_err());
    }

    #[test]
    fn rejects_separators() {
        assert!(validate_component("chunk id", "../../etc/passwd").is_err());
        assert!(validate_component("chunk id", "a/b").is_err());
        assert!(validate_component("chunk id", "a\\b").is_err());
    }

    #[test]
    fn rejects_absolute() {
        assert!(validate_component("fingerprint", "/tmp/x").is_err());
    }

    #[test]
    fn rejects_dotfiles() {
        assert!(validate_component("fingerprint", ".incoming").is_err());
        assert!(validate_component("fingerprint", ".").is_err());
    }

    #[test]
    fn rejects_nul() {
        assert!(validate_component("fingerprint", "a\0b").is_err());
    }

    #[test]
    fn accepts_plain_names() {
        assert!(validate_component("fingerprint", "9f86d081884c7d65").is_ok());
        assert!(validate_component("chunk id", "9f86d081884c7d65-12").is_ok());
        assert!(validate_component("artifact", "movie.final.mp4").is_ok());
    }
}
