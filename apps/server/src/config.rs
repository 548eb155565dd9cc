//! Server configuration.
//!
//! Read from a TOML file named by `--config` or `CHUNKUP_CONFIG`; every
//! key is optional. `CHUNKUP_ADDR` and `CHUNKUP_UPLOAD_DIR` override the
//! file. A missing file means defaults and is not created.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use chunkup_protocol::{DEFAULT_CHUNK_SIZE, STAGING_PREFIX};

const CONFIG_ENV: &str = "CHUNKUP_CONFIG";
const ADDR_ENV: &str = "CHUNKUP_ADDR";
const UPLOAD_DIR_ENV: &str = "CHUNKUP_UPLOAD_DIR";

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Address the HTTP server binds.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Root of staged chunks and merged files.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Prefix of per-file staging directories.
    #[serde(default = "default_staging_prefix")]
    pub staging_prefix: String,

    /// Largest accepted request body, in bytes.
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,
}

fn default_listen_addr() -> SocketAddr {
    ([0, 0, 0, 0], 3001).into()
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./chunks")
}

fn default_staging_prefix() -> String {
    STAGING_PREFIX.into()
}

fn default_max_chunk_bytes() -> usize {
    DEFAULT_CHUNK_SIZE + 1024 * 1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            upload_dir: default_upload_dir(),
            staging_prefix: default_staging_prefix(),
            max_chunk_bytes: default_max_chunk_bytes(),
        }
    }
}

impl Config {
    /// Loads the configuration from `path` (or `CHUNKUP_CONFIG`) and
    /// applies environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, falling back to defaults when it does not exist.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Applies `CHUNKUP_ADDR` / `CHUNKUP_UPLOAD_DIR` as seen by `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(addr) = lookup(ADDR_ENV) {
            self.listen_addr = addr
                .parse()
                .with_context(|| format!("{ADDR_ENV} is not a socket address: {addr}"))?;
        }
        if let Some(dir) = lookup(UPLOAD_DIR_ENV) {
            self.upload_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        chunkup_store::validate_component("staging prefix", &self.staging_prefix)?;
        anyhow::ensure!(self.max_chunk_bytes > 0, "max_chunk_bytes must be positive");
        Ok(())
    }
}
