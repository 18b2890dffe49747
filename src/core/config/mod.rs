//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! gitbridge has two configuration scopes:
//! - **Global**: User-level settings
//! - **Repo**: Repository-level overrides
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$GITBRIDGE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/gitbridge/config.toml`
//! 3. `~/.gitbridge/config.toml`
//!
//! # Repo Config Location
//!
//! `<git dir>/gitbridge/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use gitbridge::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("chunk size: {}", config.chunk_size());
//! ```

pub mod schema;

pub use schema::{FileConfig, RemoteSection, StreamSection, TransactionSection};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::filter::DEFAULT_CHUNK_SIZE;
use crate::options::ProxySetting;

/// Reflog message used when neither the caller nor the config supplies one.
pub const DEFAULT_REFLOG_MESSAGE: &str = "gitbridge: update refs";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence: repo file, then global file, then defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: FileConfig,
    /// Repository configuration (if in a repo and present)
    pub repo: Option<FileConfig>,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Build a configuration from already-parsed files.
    pub fn new(global: FileConfig, repo: Option<FileConfig>) -> Self {
        Config {
            global,
            repo,
            global_path: None,
            repo_path: None,
        }
    }

    /// Load configuration from default locations.
    ///
    /// If `git_dir` is provided, also loads that repository's config.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// holds invalid values. Missing files are not an error.
    pub fn load(git_dir: Option<&Path>) -> Result<Config, ConfigError> {
        Self::load_from(Self::find_global().as_deref(), git_dir)
    }

    /// Load from an explicit global file path instead of searching.
    pub fn load_from(global: Option<&Path>, git_dir: Option<&Path>) -> Result<Config, ConfigError> {
        let (global_config, global_path) = match global {
            Some(path) if path.exists() => (Self::read_file(path)?, Some(path.to_path_buf())),
            _ => (FileConfig::default(), None),
        };

        let (repo, repo_path) = match git_dir.map(Self::repo_config_path) {
            Some(path) if path.exists() => (Some(Self::read_file(&path)?), Some(path)),
            _ => (None, None),
        };

        global_config.validate()?;
        if let Some(r) = &repo {
            r.validate()?;
        }

        Ok(Config {
            global: global_config,
            repo,
            global_path,
            repo_path,
        })
    }

    /// Locate the global config file, if any exists.
    fn find_global() -> Option<PathBuf> {
        // 1. Check $GITBRIDGE_CONFIG
        if let Ok(path) = std::env::var("GITBRIDGE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/gitbridge/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("gitbridge/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.gitbridge/config.toml
        dirs::home_dir()
            .map(|home| home.join(".gitbridge/config.toml"))
            .filter(|path| path.exists())
    }

    /// Read and parse one config file.
    fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Path of the repository config for a git directory.
    pub fn repo_config_path(git_dir: &Path) -> PathBuf {
        git_dir.join("gitbridge/config.toml")
    }

    /// Pick the first value found: repo file, then global file.
    fn pick<T>(&self, get: impl Fn(&FileConfig) -> Option<T>) -> Option<T> {
        self.repo.as_ref().and_then(&get).or_else(|| get(&self.global))
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Bytes per chunk in the filter pipe.
    ///
    /// Defaults to [`DEFAULT_CHUNK_SIZE`].
    pub fn chunk_size(&self) -> usize {
        self.pick(|c| c.stream.as_ref().and_then(|s| s.chunk_size))
            .unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    /// Proxy used for fetch, push and clone.
    ///
    /// Defaults to no proxy.
    pub fn proxy(&self) -> ProxySetting {
        match self.pick(|c| c.remote.as_ref().and_then(|r| r.proxy.clone())) {
            Some(value) if value == "auto" => ProxySetting::Auto,
            Some(value) if value == "none" => ProxySetting::None,
            Some(url) => ProxySetting::Url(url),
            None => ProxySetting::None,
        }
    }

    /// Whether fetch prunes stale remote-tracking refs.
    ///
    /// Defaults to `false`.
    pub fn prune(&self) -> bool {
        self.pick(|c| c.remote.as_ref().and_then(|r| r.prune))
            .unwrap_or(false)
    }

    /// Fetch depth, `None` for full history.
    pub fn depth(&self) -> Option<u32> {
        self.pick(|c| c.remote.as_ref().and_then(|r| r.depth))
            .filter(|depth| *depth > 0)
    }

    /// Default reflog message for transactions.
    pub fn reflog_message(&self) -> String {
        self.pick(|c| c.transaction.as_ref().and_then(|t| t.reflog_message.clone()))
            .unwrap_or_else(|| DEFAULT_REFLOG_MESSAGE.to_string())
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded repo config file.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}
