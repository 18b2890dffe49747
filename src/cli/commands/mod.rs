//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens the repository and loads configuration
//! 2. Builds handler sets and settings
//! 3. Calls [`Git`] and reports the outcome
//!
//! Handler sets shared between commands live in [`callbacks`].

mod callbacks;
mod cat_filtered;
mod checkout;
mod clone;
mod fetch;
mod push;
mod stash;
mod update_refs;

pub use cat_filtered::cat_filtered;
pub use checkout::checkout;
pub use clone::clone;
pub use fetch::fetch;
pub use push::push;
pub use stash::stash_apply;
pub use update_refs::update_refs;

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::cli::args::Command;
use crate::core::config::Config;
use crate::git::Git;
use crate::ui::output::Verbosity;

/// Execution context derived from global flags.
#[derive(Debug, Clone)]
pub struct Context {
    /// Directory to run in; the process cwd when `None`
    pub cwd: Option<PathBuf>,
    pub verbosity: Verbosity,
    /// Whether prompts may be shown
    pub interactive: bool,
}

impl Context {
    /// Working directory for this invocation.
    pub fn cwd(&self) -> Result<PathBuf> {
        match &self.cwd {
            Some(path) => Ok(path.clone()),
            None => std::env::current_dir().context("Failed to determine current directory"),
        }
    }

    /// Open the repository containing the working directory.
    pub fn open_repo(&self) -> Result<Git> {
        let cwd = self.cwd()?;
        Git::open(&cwd).with_context(|| format!("Not a git repository: {}", cwd.display()))
    }

    /// Load configuration, including the repository file when `git` is given.
    pub fn config(&self, git: Option<&Git>) -> Result<Config> {
        Config::load(git.map(Git::path)).context("Failed to load configuration")
    }
}

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Clone {
            url,
            path,
            bare,
            branch,
            depth,
        } => clone::clone(ctx, &url, &path, bare, branch, depth),
        Command::Fetch {
            remote,
            refspecs,
            prune,
        } => fetch::fetch(ctx, remote.as_deref(), &refspecs, prune),
        Command::Push { remote, refspecs } => push::push(ctx, &remote, &refspecs),
        Command::Checkout {
            rev,
            force,
            dry_run,
        } => checkout::checkout(ctx, &rev, force, dry_run),
        Command::StashApply {
            index,
            reinstate_index,
        } => stash::stash_apply(ctx, index, reinstate_index),
        Command::CatFiltered {
            rev,
            path,
            to_odb,
            no_binary_check,
        } => cat_filtered::cat_filtered(ctx, &rev, &path, to_odb, no_binary_check),
        Command::UpdateRefs { updates, message } => {
            update_refs::update_refs(ctx, &updates, message.as_deref())
        }
    }
}
