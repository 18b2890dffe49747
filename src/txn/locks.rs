//! txn::locks
//!
//! Process-wide reference locks held by live transactions.
//!
//! # Invariants
//!
//! - Acquisition never blocks: a held name fails immediately
//! - A lock is released when its guard drops
//! - Keys are `(git dir, refname)`, so two handles on the same repository
//!   contend while different repositories never do

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::core::error::Error;

type LockKey = (PathBuf, String);

static HELD: Mutex<BTreeSet<LockKey>> = Mutex::new(BTreeSet::new());

fn held() -> MutexGuard<'static, BTreeSet<LockKey>> {
    HELD.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Guard for one locked reference name.
#[derive(Debug)]
pub struct RefLock {
    key: LockKey,
}

impl RefLock {
    /// Lock `refname` in the repository at `git_dir`.
    ///
    /// # Errors
    ///
    /// [`Error::LockConflict`] if another live guard holds the name.
    pub fn try_acquire(git_dir: &Path, refname: &str) -> Result<Self, Error> {
        let key = (git_dir.to_path_buf(), refname.to_string());
        if !held().insert(key.clone()) {
            tracing::warn!(refname, repo = %git_dir.display(), "reference lock conflict");
            return Err(Error::LockConflict {
                refname: refname.to_string(),
            });
        }
        Ok(RefLock { key })
    }

    pub fn refname(&self) -> &str {
        &self.key.1
    }

    pub fn git_dir(&self) -> &Path {
        &self.key.0
    }
}

impl Drop for RefLock {
    fn drop(&mut self) {
        held().remove(&self.key);
    }
}

/// Whether any live guard holds `refname` in `git_dir`.
pub fn is_locked(git_dir: &Path, refname: &str) -> bool {
    held().contains(&(git_dir.to_path_buf(), refname.to_string()))
}
