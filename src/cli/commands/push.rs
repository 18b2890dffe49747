//! push command - Update remote refs

use anyhow::{Context as _, Result};

use super::{callbacks, Context};
use crate::options::PushSettings;
use crate::ui::output;

/// Push `refspecs` to `remote`.
///
/// A reference the remote rejects fails the command.
pub fn push(ctx: &Context, remote: &str, refspecs: &[String]) -> Result<()> {
    let git = ctx.open_repo()?;
    let config = ctx.config(Some(&git))?;
    let settings = PushSettings::from_config(&config);

    let refspecs: Vec<&str> = refspecs.iter().map(String::as_str).collect();
    let show_progress = ctx.verbosity.shows_progress();
    let result = git.push(remote, &refspecs, callbacks::remote_handlers(ctx), &settings);
    if show_progress {
        output::progress_done();
    }
    result.with_context(|| format!("Failed to push to '{}'", remote))?;

    output::print(format!("Pushed to {}", remote), ctx.verbosity);
    Ok(())
}
