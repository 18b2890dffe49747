//! options
//!
//! Scoped builders for the native option records of each operation family.
//!
//! # Architecture
//!
//! Each builder takes a [`Payload`](crate::dispatch::Payload), fills a
//! `git2` option record and wires a dispatch shim into every callback slot
//! that should receive one:
//!
//! - inexpensive slots are always wired; an empty handler slot then
//!   resolves to the site's default inside the shim
//! - expensive slots (see [`CallSite::is_expensive`]) are wired only when
//!   the payload carries a handler for them
//!
//! Builders nest. An outer builder fills the records the inner record lives
//! in: clone fills its fetch record, fetch and push fill their proxy record,
//! stash apply fills its checkout record. Every record is owned by the
//! operation's stack frame and none outlives the call.
//!
//! Shims capture only the payload's integer id, never a reference.
//!
//! [`CallSite::is_expensive`]: crate::core::status::CallSite::is_expensive

mod checkout;
mod remote;

pub use checkout::{fill_checkout, fill_stash_apply, preview_checkout};
pub use remote::{clone_builder, fill_fetch, fill_proxy, fill_push, remote_callbacks};

use std::path::PathBuf;

use crate::core::config::Config;

/// Proxy selection for network operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProxySetting {
    /// Connect directly.
    #[default]
    None,
    /// Detect from git config and the environment.
    Auto,
    /// Use this proxy URL.
    Url(String),
}

/// Fetch settings that are not callbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSettings {
    pub proxy: ProxySetting,
    pub prune: bool,
    /// Shallow fetch depth; `None` fetches full history.
    pub depth: Option<u32>,
}

impl FetchSettings {
    /// Settings taken from configuration.
    pub fn from_config(config: &Config) -> Self {
        FetchSettings {
            proxy: config.proxy(),
            prune: config.prune(),
            depth: config.depth(),
        }
    }
}

/// Push settings that are not callbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushSettings {
    pub proxy: ProxySetting,
    /// Pack builder threads; `None` lets libgit2 decide.
    pub parallelism: Option<u32>,
}

impl PushSettings {
    /// Settings taken from configuration.
    pub fn from_config(config: &Config) -> Self {
        PushSettings {
            proxy: config.proxy(),
            parallelism: None,
        }
    }
}

/// Clone settings that are not callbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneSettings {
    pub fetch: FetchSettings,
    pub bare: bool,
    /// Branch to check out instead of the remote's default.
    pub branch: Option<String>,
}

/// How checkout treats local modifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CheckoutStrategy {
    /// Refuse to overwrite modified files.
    #[default]
    Safe,
    /// Overwrite whatever is in the way.
    Force,
    /// Report what would change without touching the worktree.
    DryRun,
}

/// Checkout settings that are not callbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutSettings {
    pub strategy: CheckoutStrategy,
    pub remove_untracked: bool,
    /// Restrict checkout to these paths; empty means everything.
    pub paths: Vec<PathBuf>,
}

/// Stash apply settings that are not callbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StashApplySettings {
    /// Also restore the stashed index state.
    pub reinstate_index: bool,
    pub checkout: CheckoutSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_settings_follow_config() {
        let global = crate::core::config::FileConfig {
            remote: Some(crate::core::config::RemoteSection {
                proxy: Some("auto".into()),
                prune: Some(true),
                depth: Some(3),
            }),
            ..Default::default()
        };
        let config = Config::new(global, None);
        let settings = FetchSettings::from_config(&config);
        assert_eq!(settings.proxy, ProxySetting::Auto);
        assert!(settings.prune);
        assert_eq!(settings.depth, Some(3));
        assert_eq!(PushSettings::from_config(&config).proxy, ProxySetting::Auto);
    }

    #[test]
    fn defaults_are_conservative() {
        assert_eq!(CheckoutSettings::default().strategy, CheckoutStrategy::Safe);
        assert_eq!(FetchSettings::default().proxy, ProxySetting::None);
        assert!(!CloneSettings::default().bare);
    }
}
