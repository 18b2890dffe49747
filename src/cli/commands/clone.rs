//! clone command - Clone a repository

use std::path::Path;

use anyhow::{Context as _, Result};

use super::{callbacks, Context};
use crate::git::Git;
use crate::options::{CloneSettings, FetchSettings};
use crate::ui::output;

/// Clone `url` into `path`.
///
/// `path` is taken relative to the working directory.
pub fn clone(
    ctx: &Context,
    url: &str,
    path: &Path,
    bare: bool,
    branch: Option<String>,
    depth: Option<u32>,
) -> Result<()> {
    let config = ctx.config(None)?;
    let mut settings = CloneSettings {
        fetch: FetchSettings::from_config(&config),
        bare,
        branch,
    };
    if depth.is_some() {
        settings.fetch.depth = depth;
    }

    let dest = ctx.cwd()?.join(path);
    let show_progress = ctx.verbosity.shows_progress();
    let result = Git::clone_repository(url, &dest, callbacks::remote_handlers(ctx), &settings);
    if show_progress {
        output::progress_done();
    }
    result.with_context(|| format!("Failed to clone '{}'", url))?;

    output::print(format!("Cloned into {}", dest.display()), ctx.verbosity);
    Ok(())
}
