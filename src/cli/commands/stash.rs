//! stash-apply command - Apply a stash entry

use anyhow::{Context as _, Result};

use super::{callbacks, Context};
use crate::dispatch::handlers::StashApplyHandlers;
use crate::options::StashApplySettings;
use crate::ui::output;

/// Apply stash entry `index`.
pub fn stash_apply(ctx: &Context, index: usize, reinstate_index: bool) -> Result<()> {
    let mut git = ctx.open_repo()?;

    let settings = StashApplySettings {
        reinstate_index,
        ..Default::default()
    };
    let handlers = StashApplyHandlers::new()
        .with_checkout(callbacks::checkout_handlers(ctx.verbosity, false))
        .stash_apply_progress(|stage| {
            tracing::debug!(?stage, "stash apply");
            Ok(())
        });

    git.stash_apply(index, handlers, &settings)
        .with_context(|| format!("Failed to apply stash@{{{}}}", index))?;

    output::print(format!("Applied stash@{{{}}}", index), ctx.verbosity);
    Ok(())
}
