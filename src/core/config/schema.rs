//! core::config::schema
//!
//! Configuration schema types.
//!
//! The same schema is used for the global file and the repository file.
//! Every value is optional so that a repository file can override a single
//! key without restating the rest.
//!
//! # Example
//!
//! ```toml
//! [stream]
//! chunk_size = 65536
//!
//! [remote]
//! proxy = "auto"
//! prune = false
//! depth = 0
//!
//! [transaction]
//! reflog_message = "gitbridge: update refs"
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Largest chunk the filter pipe will hand over in one piece.
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// One configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Filter pipe settings
    pub stream: Option<StreamSection>,

    /// Fetch/push/clone settings
    pub remote: Option<RemoteSection>,

    /// Reference transaction settings
    pub transaction: Option<TransactionSection>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(stream) = &self.stream {
            stream.validate()?;
        }
        if let Some(remote) = &self.remote {
            remote.validate()?;
        }
        Ok(())
    }
}

/// `[stream]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StreamSection {
    /// Bytes per chunk handed through the filter pipe
    pub chunk_size: Option<usize>,
}

impl StreamSection {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.chunk_size {
            Some(0) => Err(ConfigError::InvalidValue(
                "stream.chunk_size must be at least 1".into(),
            )),
            Some(size) if size > MAX_CHUNK_SIZE => Err(ConfigError::InvalidValue(format!(
                "stream.chunk_size must be at most {} bytes",
                MAX_CHUNK_SIZE
            ))),
            _ => Ok(()),
        }
    }
}

/// `[remote]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteSection {
    /// "none", "auto", or a proxy URL
    pub proxy: Option<String>,

    /// Remove remote-tracking refs that no longer exist on the remote
    pub prune: Option<bool>,

    /// Fetch depth; 0 means full history
    pub depth: Option<u32>,
}

impl RemoteSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(proxy) = &self.proxy {
            let ok = matches!(proxy.as_str(), "none" | "auto") || proxy.contains("://");
            if !ok {
                return Err(ConfigError::InvalidValue(format!(
                    "remote.proxy must be \"none\", \"auto\" or a URL, got '{}'",
                    proxy
                )));
            }
        }
        Ok(())
    }
}

/// `[transaction]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TransactionSection {
    /// Reflog message used when a mutation supplies none
    pub reflog_message: Option<String>,
}
