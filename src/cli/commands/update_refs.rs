//! update-refs command - Update several references atomically

use anyhow::{bail, Context as _, Result};

use super::Context;
use crate::txn::Transaction;
use crate::ui::output;

/// One requested change.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RefAction {
    /// Point at the object a revision names.
    Target(String),
    /// Become a symbolic reference.
    Symbolic(String),
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RefChange {
    refname: String,
    action: RefAction,
}

/// Parse `REF=TARGET`, `REF=ref:OTHER` or `REF=`.
fn parse_change(spec: &str) -> Result<RefChange> {
    let Some((refname, target)) = spec.split_once('=') else {
        bail!("Expected REF=TARGET, got '{}'", spec);
    };
    let refname = refname.trim();
    if refname.is_empty() {
        bail!("Missing reference name in '{}'", spec);
    }
    let target = target.trim();
    let action = if target.is_empty() {
        RefAction::Remove
    } else if let Some(symbolic) = target.strip_prefix("ref:") {
        RefAction::Symbolic(symbolic.trim().to_string())
    } else {
        RefAction::Target(target.to_string())
    };
    Ok(RefChange {
        refname: refname.to_string(),
        action,
    })
}

/// Apply every update in one transaction; none apply if any fails.
pub fn update_refs(ctx: &Context, updates: &[String], message: Option<&str>) -> Result<()> {
    let git = ctx.open_repo()?;
    let config = ctx.config(Some(&git))?;
    let changes = updates
        .iter()
        .map(|spec| parse_change(spec))
        .collect::<Result<Vec<_>>>()?;

    let txn = git
        .transaction()
        .context("Failed to open reference transaction")?
        .with_reflog_message(config.reflog_message());

    txn.run(|txn: &mut Transaction| -> Result<()> {
        for change in &changes {
            txn.lock_ref(&change.refname)
                .with_context(|| format!("Failed to lock '{}'", change.refname))?;
        }
        for change in &changes {
            match &change.action {
                RefAction::Target(rev) => {
                    let oid = git
                        .revparse(rev)
                        .with_context(|| format!("Unknown revision '{}'", rev))?;
                    txn.set_target(&change.refname, oid, None, message)?;
                }
                RefAction::Symbolic(target) => {
                    txn.set_symbolic_target(&change.refname, target, None, message)?;
                }
                RefAction::Remove => txn.remove(&change.refname)?,
            }
        }
        Ok(())
    })
    .context("Reference update failed; no references were changed")?;

    output::print(
        format!("Updated {} reference(s)", changes.len()),
        ctx.verbosity,
    );
    Ok(())
}
