//! cli
//!
//! Command-line interface for gitbridge.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install logging
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It builds handler sets and settings, then calls
//! [`crate::git::Git`]. Handler failures come back as the exact error the
//! handler returned.

pub mod args;
pub mod commands;

pub use args::Cli;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::ui::output::Verbosity;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let ctx = commands::Context {
        cwd: cli.cwd.clone(),
        verbosity: Verbosity::from_flags(cli.quiet, cli.debug),
        interactive: cli.interactive(),
    };

    commands::dispatch(cli.command, &ctx)
}

/// Log to stderr. `RUST_LOG` wins; otherwise `--debug` selects debug level.
fn init_tracing(debug: bool) {
    let fallback = if debug { "gitbridge=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
