//! gitbridge - git operations with host-side callbacks
//!
//! gitbridge runs libgit2 operations (clone, fetch, push, checkout, stash
//! apply) with callbacks written as ordinary Rust closures, streams blobs
//! through content filters on a worker thread, and updates several
//! references in one atomic transaction.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer
//! - [`core`] - Error taxonomy, status codes, configuration
//! - [`dispatch`] - Payload registry and the callback dispatch shim
//! - [`options`] - Fills native option records with dispatch shims
//! - [`git`] - Single interface for repository operations
//! - [`filter`] - Streaming filter pipe and EOL conversion
//! - [`txn`] - Reference transactions
//! - [`ui`] - User interaction utilities
//!
//! # Correctness Invariants
//!
//! 1. A handler's error reaches the caller unchanged, never wrapped
//! 2. Returning `Passthrough` from a handler behaves as if none were installed
//! 3. Payloads and transactions are only used on the thread that made them
//! 4. A filter stream delivers every byte exactly once, in order
//! 5. A transaction commit applies all of its updates or none

pub mod cli;
pub mod core;
pub mod dispatch;
pub mod filter;
pub mod git;
pub mod options;
pub mod txn;
pub mod ui;

pub use git2::Oid;
