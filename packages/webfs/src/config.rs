//! Mount configuration.
//!
//! The bridge needs to know where the transport is mounted and how it should
//! chunk outbound bodies. Everything has a default, so an empty JSON object
//! is a valid configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default location of the web transport.
pub const DEFAULT_ROOT: &str = "/mnt/web";

/// Default size of each `postdata` write.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

const ROOT_VAR: &str = "WEBFS_ROOT";
const CHUNK_SIZE_VAR: &str = "WEBFS_CHUNK_SIZE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    /// Directory holding the `clone` control file.
    pub root: PathBuf,

    /// Chunk size used when streaming request bodies and reading responses.
    pub chunk_size: usize,

    /// Response headers captured by `HttpClient::fetch`.
    pub response_headers: Vec<String>,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            chunk_size: DEFAULT_CHUNK_SIZE,
            response_headers: vec![
                "content-type".to_string(),
                "content-length".to_string(),
                "location".to_string(),
            ],
        }
    }
}

impl MountConfig {
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_response_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.response_headers = names.into_iter().map(Into::into).collect();
        self
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: MountConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from `WEBFS_ROOT` and `WEBFS_CHUNK_SIZE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(root) = lookup(ROOT_VAR) {
            config.root = PathBuf::from(root);
        }

        if let Some(size) = lookup(CHUNK_SIZE_VAR) {
            config.chunk_size = size.trim().parse().map_err(|e| Error::Config {
                message: format!("{} must be an integer: {}", CHUNK_SIZE_VAR, e),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config {
                message: "chunk_size must be greater than zero".to_string(),
            });
        }
        if self.root.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "root must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
