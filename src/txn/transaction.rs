//! txn::transaction
//!
//! Atomic multi-reference updates.
//!
//! # Lifecycle
//!
//! ```text
//! Open -> Committed
//!      -> RolledBack   (explicit rollback, or dropped while open)
//!      -> Failed       (commit returned an error)
//! ```
//!
//! # Invariants
//!
//! - `lock_ref` never blocks; a name held by another live transaction
//!   fails with [`Error::LockConflict`]
//! - Mutations only target names this transaction locked
//! - Every mutating method, `commit` and `rollback` must run on the
//!   thread that opened the transaction
//! - `commit` applies every queued mutation or none. A locked reference
//!   that moved since `lock_ref` fails the commit with
//!   [`Error::RefChanged`] before anything is written
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use gitbridge::txn::Transaction;
//!
//! # fn main() -> Result<(), gitbridge::core::Error> {
//! let target = gitbridge::Oid::from_str("4b825dc642cb6eb9a060e54bf8d69288fbee4904")?;
//! Transaction::scope(Path::new("."), |txn| {
//!     txn.lock_ref("refs/heads/a")?;
//!     txn.set_target("refs/heads/a", target, None, Some("move a"))
//! })?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::thread::{self, ThreadId};

use git2::{ErrorCode, Oid, Repository, Signature, Time};

use super::locks::RefLock;
use crate::core::config::DEFAULT_REFLOG_MESSAGE;
use crate::core::error::Error;
use crate::core::status::Status;

/// Transaction lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
    Failed,
}

/// Value of a reference as seen at lock time.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RefValue {
    Direct(Oid),
    Symbolic(String),
}

/// Reflog author kept as owned data so the transaction stays `Send`.
#[derive(Debug, Clone)]
struct ReflogIdentity {
    name: String,
    email: String,
    seconds: i64,
    offset_minutes: i32,
}

impl ReflogIdentity {
    fn capture(signature: &Signature<'_>) -> Self {
        let when = signature.when();
        ReflogIdentity {
            name: String::from_utf8_lossy(signature.name_bytes()).into_owned(),
            email: String::from_utf8_lossy(signature.email_bytes()).into_owned(),
            seconds: when.seconds(),
            offset_minutes: when.offset_minutes(),
        }
    }

    fn to_signature(&self) -> Result<Signature<'static>, git2::Error> {
        Signature::new(
            &self.name,
            &self.email,
            &Time::new(self.seconds, self.offset_minutes),
        )
    }
}

#[derive(Debug, Clone)]
enum Mutation {
    Target(Oid),
    Symbolic(String),
    Remove,
}

#[derive(Debug, Clone)]
struct Update {
    mutation: Mutation,
    reflog: Option<ReflogIdentity>,
    message: Option<String>,
}

#[derive(Debug)]
struct LockedRef {
    _lock: RefLock,
    observed: Option<RefValue>,
    update: Option<Update>,
}

/// A set of reference updates committed atomically.
pub struct Transaction {
    repo: Repository,
    git_dir: PathBuf,
    owner: ThreadId,
    refs: BTreeMap<String, LockedRef>,
    state: TransactionState,
    default_message: String,
}

fn read_ref(repo: &Repository, name: &str) -> Result<Option<RefValue>, Error> {
    match repo.find_reference(name) {
        Ok(reference) => Ok(match reference.symbolic_target() {
            Some(target) => Some(RefValue::Symbolic(target.to_string())),
            None => reference.target().map(RefValue::Direct),
        }),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn native_lock_error(err: git2::Error, refname: &str) -> Error {
    if err.code() == ErrorCode::Locked {
        tracing::warn!(refname, "reference is locked on disk");
        Error::LockConflict {
            refname: refname.to_string(),
        }
    } else {
        err.into()
    }
}

impl Transaction {
    /// Open a transaction on the repository at `path`.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let repo = Repository::open(path)?;
        let git_dir = repo
            .path()
            .canonicalize()
            .unwrap_or_else(|_| repo.path().to_path_buf());
        Ok(Transaction {
            repo,
            git_dir,
            owner: thread::current().id(),
            refs: BTreeMap::new(),
            state: TransactionState::Open,
            default_message: DEFAULT_REFLOG_MESSAGE.to_string(),
        })
    }

    /// Reflog message for mutations that supply none.
    pub fn with_reflog_message(mut self, message: impl Into<String>) -> Self {
        self.default_message = message.into();
        self
    }

    /// Run `f` in a transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// A rollback failure is logged and never replaces the error from `f`.
    pub fn scope<R, E, F>(path: &Path, f: F) -> Result<R, E>
    where
        E: From<Error>,
        F: FnOnce(&mut Transaction) -> Result<R, E>,
    {
        Transaction::open(path)?.run(f)
    }

    /// Like [`Transaction::scope`], for a transaction already opened.
    pub fn run<R, E, F>(mut self, f: F) -> Result<R, E>
    where
        E: From<Error>,
        F: FnOnce(&mut Transaction) -> Result<R, E>,
    {
        let txn = &mut self;
        match f(txn) {
            Ok(value) => {
                if txn.state == TransactionState::Open {
                    txn.commit()?;
                }
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback() {
                    tracing::warn!(error = %rollback_err, "rollback after failed scope");
                }
                Err(err)
            }
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Thread that opened the transaction.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Names currently locked, sorted.
    pub fn locked_refs(&self) -> impl Iterator<Item = &str> {
        self.refs.keys().map(String::as_str)
    }

    fn check_thread(&self) -> Result<(), Error> {
        let caller = thread::current().id();
        if caller != self.owner {
            tracing::warn!(owner = ?self.owner, caller = ?caller, "transaction used off-thread");
            return Err(Error::ThreadAffinity {
                object: "transaction",
                owner: self.owner,
                caller,
            });
        }
        Ok(())
    }

    fn check_open(&self) -> Result<(), Error> {
        if self.state != TransactionState::Open {
            return Err(Error::TransactionClosed);
        }
        Ok(())
    }

    fn locked_mut(&mut self, name: &str) -> Result<&mut LockedRef, Error> {
        self.check_thread()?;
        self.check_open()?;
        self.refs.get_mut(name).ok_or_else(|| Error::RefNotLocked {
            refname: name.to_string(),
        })
    }

    /// Lock `name` for this transaction.
    ///
    /// Locking a name this transaction already holds is a no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::LockConflict`] if another transaction holds it
    /// - [`Error::Native`] with `InvalidSpec` for a malformed name
    pub fn lock_ref(&mut self, name: &str) -> Result<(), Error> {
        self.check_thread()?;
        self.check_open()?;
        if self.refs.contains_key(name) {
            return Ok(());
        }
        if !git2::Reference::is_valid_name(name) {
            return Err(Error::from_status(
                Status::INVALID_SPEC,
                format!("invalid reference name '{}'", name),
            ));
        }

        let lock = RefLock::try_acquire(&self.git_dir, name)?;
        let observed = read_ref(&self.repo, name)?;
        tracing::debug!(refname = name, ?observed, "locked reference");
        self.refs.insert(
            name.to_string(),
            LockedRef {
                _lock: lock,
                observed,
                update: None,
            },
        );
        Ok(())
    }

    fn queue(
        &mut self,
        name: &str,
        mutation: Mutation,
        signature: Option<&Signature<'_>>,
        message: Option<&str>,
    ) -> Result<(), Error> {
        let locked = self.locked_mut(name)?;
        locked.update = Some(Update {
            mutation,
            reflog: signature.map(ReflogIdentity::capture),
            message: message.map(str::to_string),
        });
        Ok(())
    }

    /// Point `name` at `target` on commit.
    pub fn set_target(
        &mut self,
        name: &str,
        target: Oid,
        signature: Option<&Signature<'_>>,
        message: Option<&str>,
    ) -> Result<(), Error> {
        self.queue(name, Mutation::Target(target), signature, message)
    }

    /// Make `name` a symbolic reference to `target` on commit.
    pub fn set_symbolic_target(
        &mut self,
        name: &str,
        target: &str,
        signature: Option<&Signature<'_>>,
        message: Option<&str>,
    ) -> Result<(), Error> {
        self.queue(
            name,
            Mutation::Symbolic(target.to_string()),
            signature,
            message,
        )
    }

    /// Delete `name` on commit.
    pub fn remove(&mut self, name: &str) -> Result<(), Error> {
        self.queue(name, Mutation::Remove, None, None)
    }

    /// Apply every queued mutation atomically and release the locks.
    ///
    /// # Errors
    ///
    /// - [`Error::RefChanged`] if a locked reference moved since `lock_ref`
    /// - [`Error::LockConflict`] if another process holds a ref lock on disk
    /// - [`Error::Native`] for anything else libgit2 rejects
    ///
    /// On error no reference is modified.
    pub fn commit(&mut self) -> Result<(), Error> {
        self.check_thread()?;
        self.check_open()?;

        let result = self.apply();
        self.state = match result {
            Ok(()) => TransactionState::Committed,
            Err(_) => TransactionState::Failed,
        };
        self.refs.clear();
        tracing::debug!(state = ?self.state, "transaction finished");
        result
    }

    fn apply(&self) -> Result<(), Error> {
        let pending: Vec<(&str, &LockedRef, &Update)> = self
            .refs
            .iter()
            .filter_map(|(name, locked)| {
                let update = locked.update.as_ref()?;
                // Removing something that never existed has nothing to do.
                if matches!(update.mutation, Mutation::Remove) && locked.observed.is_none() {
                    return None;
                }
                Some((name.as_str(), locked, update))
            })
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let mut native = self.repo.transaction()?;
        for (name, _, _) in &pending {
            native
                .lock_ref(name)
                .map_err(|e| native_lock_error(e, name))?;
        }

        for (name, locked, _) in &pending {
            let current = read_ref(&self.repo, name)?;
            if current != locked.observed {
                tracing::warn!(refname = *name, "locked reference changed before commit");
                return Err(Error::RefChanged {
                    refname: name.to_string(),
                });
            }
        }

        for (name, _, update) in &pending {
            let signature = update
                .reflog
                .as_ref()
                .map(ReflogIdentity::to_signature)
                .transpose()?;
            let message = update.message.as_deref().unwrap_or(&self.default_message);
            match &update.mutation {
                Mutation::Target(oid) => {
                    native.set_target(name, *oid, signature.as_ref(), message)?;
                }
                Mutation::Symbolic(target) => {
                    native.set_symbolic_target(name, target, signature.as_ref(), message)?;
                }
                Mutation::Remove => native.remove(name)?,
            }
        }

        native.commit().map_err(|e| match pending.first() {
            Some((name, _, _)) if e.code() == ErrorCode::Locked => native_lock_error(e, name),
            _ => e.into(),
        })
    }

    /// Discard queued mutations and release the locks.
    ///
    /// Rolling back a transaction that is no longer open does nothing.
    pub fn rollback(&mut self) -> Result<(), Error> {
        self.check_thread()?;
        self.discard();
        Ok(())
    }

    fn discard(&mut self) {
        if self.state != TransactionState::Open {
            return;
        }
        let pending = self.refs.values().filter(|r| r.update.is_some()).count();
        if pending > 0 {
            tracing::debug!(pending, "rolling back transaction");
        }
        self.refs.clear();
        self.state = TransactionState::RolledBack;
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.discard();
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("git_dir", &self.git_dir)
            .field("owner", &self.owner)
            .field("state", &self.state)
            .field("locked", &self.refs.keys().collect::<Vec<_>>())
            .finish()
    }
}
