use serde::{Deserialize, Serialize};

use chunkup_protocol::DEFAULT_CHUNK_SIZE;

/// Default number of chunk transfers in flight at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 6;

/// Upload client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server origin, e.g. `http://localhost:3001`.
    pub base_url: String,
    /// Chunk size in bytes. Must match what the server merges with.
    pub chunk_size: u64,
    pub max_concurrency: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".into(),
            chunk_size: DEFAULT_CHUNK_SIZE as u64,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.chunk_size, 5 * 1024 * 1024);
        assert_eq!(config.max_concurrency, 6);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url":"http://10.0.0.2:3001"}"#).unwrap();
        assert_eq!(config.base_url, "http://10.0.0.2:3001");
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
    }
}
