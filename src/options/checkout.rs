//! options::checkout
//!
//! Checkout and stash-apply records.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use git2::build::CheckoutBuilder;
use git2::{Delta, Diff, DiffOptions, ErrorCode, Repository, StashApplyOptions, Tree};

use super::{CheckoutSettings, CheckoutStrategy, StashApplySettings};
use crate::core::status::CallSite;
use crate::dispatch::handlers::{
    AsCheckout, CheckoutNotification, CheckoutNotifyKind, StashApplyHandlers,
};
use crate::dispatch::shim::dispatch;
use crate::dispatch::Payload;

/// Fill a checkout record in place.
///
/// The notify slot is always wired; its mask is empty unless a notify
/// handler is installed. The progress slot is wired only when a progress
/// handler is installed.
pub fn fill_checkout<'cb, H: AsCheckout>(
    builder: &mut CheckoutBuilder<'cb>,
    payload: &Payload<H>,
    settings: &CheckoutSettings,
) {
    let id = payload.id();

    match settings.strategy {
        CheckoutStrategy::Safe => {
            builder.safe();
        }
        CheckoutStrategy::Force => {
            builder.force();
        }
        CheckoutStrategy::DryRun => {
            builder.safe().dry_run();
        }
    }
    builder.remove_untracked(settings.remove_untracked);
    for path in &settings.paths {
        builder.path(path.as_path());
    }

    builder.notify_on(payload.with_handlers(|h| h.checkout().notify_mask()));
    builder.notify(move |kind, path, _baseline, _target, _workdir| {
        let Some(kind) = CheckoutNotifyKind::from_native(kind) else {
            return true;
        };
        let notification = CheckoutNotification {
            kind,
            path: path.map(|p| p.to_path_buf()),
        };
        dispatch::<H, _, _>(id, CallSite::CheckoutNotify, |h| {
            h.checkout().notify.as_mut().map(|f| f(&notification))
        })
        .into_continue()
    });

    if payload.has(CallSite::CheckoutProgress) {
        builder.progress(move |path, completed, total| {
            // libgit2 ignores this slot's result; failures stay parked on the payload.
            dispatch::<H, _, _>(id, CallSite::CheckoutProgress, |h| {
                h.checkout()
                    .progress
                    .as_mut()
                    .map(|f| f(path, completed, total))
            });
        });
    }
}

/// Report what checking out `target` would do, without writing anything.
///
/// libgit2 sends no notifications under its dry-run flag, so the report is
/// built from two diffs against HEAD: one to `target` for the paths checkout
/// would write, one to the working directory for local changes. Each path
/// whose kind is in the handler's mask goes through the notify shim in path
/// order; a failing handler stops the walk and its error stays parked on
/// the payload.
pub fn preview_checkout<H: AsCheckout>(
    repo: &Repository,
    target: &Tree<'_>,
    payload: &Payload<H>,
    settings: &CheckoutSettings,
) -> Result<(), git2::Error> {
    let mask = payload.with_handlers(|h| h.checkout().notify_mask());
    if mask.is_empty() {
        return Ok(());
    }

    let head = match repo.head() {
        Ok(reference) => Some(reference.peel_to_tree()?),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
        Err(e) => return Err(e),
    };

    let mut incoming_opts = diff_options(settings);
    let incoming = repo.diff_tree_to_tree(head.as_ref(), Some(target), Some(&mut incoming_opts))?;
    let mut local_opts = diff_options(settings);
    local_opts.include_untracked(true).recurse_untracked_dirs(true);
    let local = repo.diff_tree_to_workdir_with_index(head.as_ref(), Some(&mut local_opts))?;

    let mut dirty = BTreeSet::new();
    let mut untracked = BTreeSet::new();
    for (path, status) in delta_paths(&local) {
        match status {
            Delta::Untracked => untracked.insert(path),
            Delta::Ignored | Delta::Unmodified => false,
            _ => dirty.insert(path),
        };
    }

    let mut report = BTreeMap::new();
    for (path, _) in delta_paths(&incoming) {
        let kind = if dirty.contains(&path) || untracked.contains(&path) {
            CheckoutNotifyKind::Conflict
        } else {
            CheckoutNotifyKind::Updated
        };
        report.insert(path, kind);
    }
    for path in dirty {
        report.entry(path).or_insert(CheckoutNotifyKind::Dirty);
    }
    for path in untracked {
        report.entry(path).or_insert(CheckoutNotifyKind::Untracked);
    }

    let id = payload.id();
    for (path, kind) in report {
        if !mask.contains(kind.to_native()) {
            continue;
        }
        let notification = CheckoutNotification {
            kind,
            path: Some(path),
        };
        let reply = dispatch::<H, _, _>(id, CallSite::CheckoutNotify, |h| {
            h.checkout().notify.as_mut().map(|f| f(&notification))
        });
        if !reply.is_ok() {
            break;
        }
    }
    Ok(())
}

fn diff_options(settings: &CheckoutSettings) -> DiffOptions {
    let mut options = DiffOptions::new();
    for path in &settings.paths {
        options.pathspec(path.as_path());
    }
    options
}

fn delta_paths(diff: &Diff<'_>) -> Vec<(PathBuf, Delta)> {
    diff.deltas()
        .filter_map(|delta| {
            let path = delta.new_file().path().or_else(|| delta.old_file().path())?;
            Some((path.to_path_buf(), delta.status()))
        })
        .collect()
}

/// Fill a stash-apply record in place, including its checkout record.
pub fn fill_stash_apply<'cb>(
    options: &mut StashApplyOptions<'cb>,
    payload: &Payload<StashApplyHandlers>,
    settings: &StashApplySettings,
) {
    let id = payload.id();

    if settings.reinstate_index {
        options.reinstantiate_index();
    }

    let mut checkout = CheckoutBuilder::new();
    fill_checkout(&mut checkout, payload, &settings.checkout);
    options.checkout_options(checkout);

    options.progress_cb(move |stage| {
        let stage = stage.into();
        dispatch::<StashApplyHandlers, _, _>(id, CallSite::StashApplyProgress, |h| {
            h.progress.as_mut().map(|f| f(stage))
        })
        .into_continue()
    });
}
