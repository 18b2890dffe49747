//! checkout command - Check out a revision

use anyhow::{Context as _, Result};

use super::{callbacks, Context};
use crate::options::{CheckoutSettings, CheckoutStrategy};
use crate::ui::output;

/// Check out `rev`, moving HEAD unless this is a dry run.
pub fn checkout(ctx: &Context, rev: &str, force: bool, dry_run: bool) -> Result<()> {
    let git = ctx.open_repo()?;

    let strategy = if dry_run {
        CheckoutStrategy::DryRun
    } else if force {
        CheckoutStrategy::Force
    } else {
        CheckoutStrategy::Safe
    };
    let settings = CheckoutSettings {
        strategy,
        ..Default::default()
    };

    let handlers = callbacks::checkout_handlers(ctx.verbosity, dry_run);
    let show_progress = ctx.verbosity.shows_progress();
    let result = git.checkout(rev, handlers, &settings);
    if show_progress {
        output::progress_done();
    }
    result.with_context(|| format!("Failed to check out '{}'", rev))?;

    if !dry_run {
        output::print(format!("Checked out {}", rev), ctx.verbosity);
    }
    Ok(())
}
