//! git::interface
//!
//! Operation wrappers around `git2`.
//!
//! Every callback-driven operation follows the same four steps:
//!
//! 1. wrap the caller's handlers in a [`Payload`]
//! 2. fill the operation's option record from the payload and settings
//! 3. run the native call
//! 4. [`Payload::check`] the result, so a handler's own error wins over
//!    whatever status libgit2 reported
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use gitbridge::dispatch::RemoteHandlers;
//! use gitbridge::git::Git;
//! use gitbridge::options::FetchSettings;
//!
//! # fn main() -> Result<(), gitbridge::core::Error> {
//! let git = Git::open(Path::new("."))?;
//! let handlers = RemoteHandlers::new().transfer_progress(|p| {
//!     eprintln!("{}/{}", p.received_objects, p.total_objects);
//!     Ok(())
//! });
//! git.fetch("origin", &[], handlers, &FetchSettings::default())?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{
    ErrorCode, FetchOptions, Oid, PushOptions, Remote, Repository, StashApplyOptions, Tree,
};

use crate::core::error::Error;
use crate::dispatch::handlers::{AsCheckout, AsRemote, StashApplyHandlers};
use crate::dispatch::Payload;
use crate::filter::{open_blob_stream, FilterOptions, FilterStream};
use crate::options::{
    clone_builder, fill_checkout, fill_fetch, fill_push, fill_stash_apply, preview_checkout,
    CheckoutSettings, CheckoutStrategy, CloneSettings, FetchSettings, PushSettings,
    StashApplySettings,
};
use crate::txn::Transaction;

/// A repository and the operations gitbridge runs against it.
pub struct Git {
    repo: Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Opening
    // =========================================================================

    /// Open the repository containing `path`.
    ///
    /// `path` can be any directory inside the repository.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let repo = Repository::discover(path)?;
        Ok(Git { repo })
    }

    /// Clone `url` into `into`.
    ///
    /// # Errors
    ///
    /// A handler's error is returned as [`Error::Callback`] unchanged.
    pub fn clone_repository<H: AsRemote>(
        url: &str,
        into: &Path,
        handlers: H,
        settings: &CloneSettings,
    ) -> Result<Git, Error> {
        let payload = Payload::new(handlers)?;
        let result = clone_builder(&payload, settings).clone(url, into);
        let repo = payload.check(result)?;
        tracing::debug!(url, path = %into.display(), "cloned repository");
        Ok(Git { repo })
    }

    /// The `.git` directory.
    pub fn path(&self) -> &Path {
        self.repo.path()
    }

    /// The working directory, `None` for a bare repository.
    pub fn work_dir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    // =========================================================================
    // Remotes
    // =========================================================================

    /// A configured remote by name, or an anonymous one for a URL or path.
    fn remote(&self, name_or_url: &str) -> Result<Remote<'_>, Error> {
        if !Remote::is_valid_name(name_or_url) {
            return Ok(self.repo.remote_anonymous(name_or_url)?);
        }
        match self.repo.find_remote(name_or_url) {
            Ok(remote) => Ok(remote),
            Err(e) if e.code() == ErrorCode::NotFound => {
                Ok(self.repo.remote_anonymous(name_or_url)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch `refspecs` from `remote`; empty refspecs use the remote's own.
    pub fn fetch<H: AsRemote>(
        &self,
        remote: &str,
        refspecs: &[&str],
        handlers: H,
        settings: &FetchSettings,
    ) -> Result<(), Error> {
        let mut remote = self.remote(remote)?;
        let payload = Payload::new(handlers)?;
        let mut options = FetchOptions::new();
        fill_fetch(&mut options, &payload, settings);
        let result = remote.fetch(refspecs, Some(&mut options), None);
        payload.check(result)
    }

    /// Push `refspecs` to `remote`.
    ///
    /// A reference the server rejects is reported to the
    /// `push_update_reference` handler; the call itself still succeeds
    /// unless that handler fails.
    pub fn push<H: AsRemote>(
        &self,
        remote: &str,
        refspecs: &[&str],
        handlers: H,
        settings: &PushSettings,
    ) -> Result<(), Error> {
        let mut remote = self.remote(remote)?;
        let payload = Payload::new(handlers)?;
        let mut options = PushOptions::new();
        fill_push(&mut options, &payload, settings);
        let result = remote.push(refspecs, Some(&mut options));
        payload.check(result)
    }

    // =========================================================================
    // Checkout and stash
    // =========================================================================

    /// Check out the tree of `rev` into the working directory.
    ///
    /// HEAD is not moved; see [`Git::checkout`].
    pub fn checkout_tree<H: AsCheckout>(
        &self,
        rev: &str,
        handlers: H,
        settings: &CheckoutSettings,
    ) -> Result<(), Error> {
        let object = self.repo.revparse_single(rev)?;
        if settings.strategy == CheckoutStrategy::DryRun {
            return self.preview(&object.peel_to_tree()?, handlers, settings);
        }
        let payload = Payload::new(handlers)?;
        let mut builder = CheckoutBuilder::new();
        fill_checkout(&mut builder, &payload, settings);
        let result = self.repo.checkout_tree(&object, Some(&mut builder));
        payload.check(result)
    }

    /// Check out `rev` and move HEAD to it.
    ///
    /// A local branch becomes the new HEAD; anything else detaches HEAD.
    /// A dry run leaves HEAD alone.
    pub fn checkout<H: AsCheckout>(
        &self,
        rev: &str,
        handlers: H,
        settings: &CheckoutSettings,
    ) -> Result<(), Error> {
        let (object, reference) = self.repo.revparse_ext(rev)?;
        if settings.strategy == CheckoutStrategy::DryRun {
            return self.preview(&object.peel_to_tree()?, handlers, settings);
        }
        let payload = Payload::new(handlers)?;
        let mut builder = CheckoutBuilder::new();
        fill_checkout(&mut builder, &payload, settings);
        let result = self.repo.checkout_tree(&object, Some(&mut builder));
        payload.check(result)?;

        match reference.as_ref().and_then(|r| r.name()) {
            Some(name) if name.starts_with("refs/heads/") => self.repo.set_head(name)?,
            _ => self
                .repo
                .set_head_detached(object.peel_to_commit()?.id())?,
        }
        Ok(())
    }

    /// Make the working directory match HEAD.
    pub fn checkout_head<H: AsCheckout>(
        &self,
        handlers: H,
        settings: &CheckoutSettings,
    ) -> Result<(), Error> {
        if settings.strategy == CheckoutStrategy::DryRun {
            return self.preview(&self.repo.head()?.peel_to_tree()?, handlers, settings);
        }
        let payload = Payload::new(handlers)?;
        let mut builder = CheckoutBuilder::new();
        fill_checkout(&mut builder, &payload, settings);
        let result = self.repo.checkout_head(Some(&mut builder));
        payload.check(result)
    }

    /// Dry run: report through the notify handler, write nothing.
    fn preview<H: AsCheckout>(
        &self,
        target: &Tree<'_>,
        handlers: H,
        settings: &CheckoutSettings,
    ) -> Result<(), Error> {
        let payload = Payload::new(handlers)?;
        let result = preview_checkout(&self.repo, target, &payload, settings);
        payload.check(result)
    }

    /// Apply stash entry `index` (0 is the most recent).
    pub fn stash_apply(
        &mut self,
        index: usize,
        handlers: StashApplyHandlers,
        settings: &StashApplySettings,
    ) -> Result<(), Error> {
        let payload = Payload::new(handlers)?;
        let mut options = StashApplyOptions::new();
        fill_stash_apply(&mut options, &payload, settings);
        let result = self.repo.stash_apply(index, Some(&mut options));
        payload.check(result)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Resolve a reference to the commit it points at.
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, Error> {
        let reference = self.repo.find_reference(refname)?;
        Ok(reference.peel_to_commit()?.id())
    }

    /// Like [`Git::resolve_ref`], with `None` for a missing reference.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, Error> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(e) if e.native_kind() == Some(crate::core::NativeErrorKind::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Direct target of a reference without peeling, following symbolic
    /// references. `None` if it does not exist.
    pub fn reference_target(&self, refname: &str) -> Result<Option<Oid>, Error> {
        match self.repo.find_reference(refname) {
            Ok(reference) => Ok(reference.resolve()?.target()),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Symbolic target of a reference, if it is symbolic.
    pub fn symbolic_target(&self, refname: &str) -> Result<Option<String>, Error> {
        match self.repo.find_reference(refname) {
            Ok(reference) => Ok(reference.symbolic_target().map(str::to_string)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Commit HEAD points at.
    pub fn head_oid(&self) -> Result<Oid, Error> {
        Ok(self.repo.head()?.peel_to_commit()?.id())
    }

    /// Resolve any revision expression to an object id.
    pub fn revparse(&self, rev: &str) -> Result<Oid, Error> {
        Ok(self.repo.revparse_single(rev)?.id())
    }

    /// Blob stored at `path` in the tree of `rev`.
    pub fn blob_at(&self, rev: &str, path: &Path) -> Result<Oid, Error> {
        let tree = self.repo.revparse_single(rev)?.peel_to_tree()?;
        Ok(tree.get_path(path)?.id())
    }

    // =========================================================================
    // Streams and transactions
    // =========================================================================

    /// Stream blob `oid` through the filter selected by `options`.
    pub fn blob_stream(&self, oid: Oid, options: FilterOptions) -> Result<FilterStream, Error> {
        open_blob_stream(self.repo.path(), oid, options)
    }

    /// Open a reference transaction on this repository.
    ///
    /// The transaction holds its own handle, so it may outlive `self`.
    pub fn transaction(&self) -> Result<Transaction, Error> {
        Transaction::open(self.repo.path())
    }
}
