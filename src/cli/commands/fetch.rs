//! fetch command - Download objects and refs from a remote

use anyhow::{Context as _, Result};

use super::{callbacks, Context};
use crate::options::FetchSettings;
use crate::ui::output;

/// Remote used when none is named.
const DEFAULT_REMOTE: &str = "origin";

/// Fetch from `remote`.
pub fn fetch(ctx: &Context, remote: Option<&str>, refspecs: &[String], prune: bool) -> Result<()> {
    let git = ctx.open_repo()?;
    let config = ctx.config(Some(&git))?;

    let mut settings = FetchSettings::from_config(&config);
    settings.prune |= prune;

    let remote = remote.unwrap_or(DEFAULT_REMOTE);
    let refspecs: Vec<&str> = refspecs.iter().map(String::as_str).collect();
    let show_progress = ctx.verbosity.shows_progress();
    let result = git.fetch(remote, &refspecs, callbacks::remote_handlers(ctx), &settings);
    if show_progress {
        output::progress_done();
    }
    result.with_context(|| format!("Failed to fetch from '{}'", remote))
}
