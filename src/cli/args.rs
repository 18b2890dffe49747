//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--no-interactive`: Never prompt
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::ui::prompts;

/// gitbridge - git operations with host-side callbacks
#[derive(Parser, Debug)]
#[command(name = "gitbridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if gitbridge was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output; implies --no-interactive
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable interactive prompts
    #[arg(long, global = true)]
    pub no_interactive: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Whether prompts may be shown.
    ///
    /// False with `--no-interactive` or `--quiet`, otherwise true when
    /// attached to a terminal.
    pub fn interactive(&self) -> bool {
        if self.no_interactive || self.quiet {
            false
        } else {
            prompts::is_interactive()
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clone a repository
    Clone {
        /// URL or path of the repository to clone
        url: String,

        /// Destination directory
        path: PathBuf,

        /// Create a bare repository
        #[arg(long)]
        bare: bool,

        /// Check out this branch instead of the remote's default
        #[arg(short, long)]
        branch: Option<String>,

        /// Fetch only this many commits of history
        #[arg(long)]
        depth: Option<u32>,
    },

    /// Download objects and refs from a remote
    Fetch {
        /// Remote name, URL or path (defaults to origin)
        remote: Option<String>,

        /// Refspecs to fetch (defaults to the remote's configured ones)
        refspecs: Vec<String>,

        /// Remove remote-tracking refs that no longer exist on the remote
        #[arg(long)]
        prune: bool,
    },

    /// Update remote refs
    Push {
        /// Remote name, URL or path
        remote: String,

        /// Refspecs to push
        #[arg(required = true)]
        refspecs: Vec<String>,
    },

    /// Check out a revision and move HEAD to it
    Checkout {
        /// Branch, tag or commit
        rev: String,

        /// Overwrite local modifications
        #[arg(short, long)]
        force: bool,

        /// Report what would change without touching the worktree
        #[arg(long, conflicts_with = "force")]
        dry_run: bool,
    },

    /// Apply a stash entry
    #[command(name = "stash-apply")]
    StashApply {
        /// Stash index (0 is the most recent)
        #[arg(default_value_t = 0)]
        index: usize,

        /// Also restore the stashed index
        #[arg(long)]
        reinstate_index: bool,
    },

    /// Print a blob through the end-of-line filter for its path
    #[command(name = "cat-filtered")]
    CatFiltered {
        /// Revision whose tree holds the file
        rev: String,

        /// Path of the file inside the tree
        #[arg(long)]
        path: PathBuf,

        /// Convert toward the object database (CRLF to LF) instead of the worktree
        #[arg(long)]
        to_odb: bool,

        /// Filter content even if it looks binary
        #[arg(long)]
        no_binary_check: bool,
    },

    /// Update several references atomically
    #[command(
        name = "update-refs",
        after_help = "\
UPDATE FORMS:
    refs/heads/a=<rev>          point a at a revision
    refs/heads/a=ref:refs/heads/b   make a symbolic ref to b
    refs/heads/a=               delete a"
    )]
    UpdateRefs {
        /// Updates of the form REF=TARGET
        #[arg(required = true, value_name = "REF=TARGET")]
        updates: Vec<String>,

        /// Reflog message
        #[arg(short, long)]
        message: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_update_refs() {
        let cli = Cli::try_parse_from([
            "gitbridge",
            "update-refs",
            "refs/heads/a=HEAD",
            "refs/heads/b=",
            "-m",
            "bulk",
        ])
        .unwrap();
        match cli.command {
            Command::UpdateRefs { updates, message } => {
                assert_eq!(updates.len(), 2);
                assert_eq!(message.as_deref(), Some("bulk"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn quiet_is_never_interactive() {
        let cli = Cli::try_parse_from(["gitbridge", "-q", "fetch"]).unwrap();
        assert!(!cli.interactive());
    }

    #[test]
    fn dry_run_conflicts_with_force() {
        let result = Cli::try_parse_from(["gitbridge", "checkout", "main", "--force", "--dry-run"]);
        assert!(result.is_err());
    }
}
