//! txn
//!
//! Reference transactions.
//!
//! # Modules
//!
//! - [`locks`]: non-blocking in-process reference locks
//! - [`transaction`]: the transaction object and its scoped helper

pub mod locks;
pub mod transaction;

pub use locks::{is_locked, RefLock};
pub use transaction::{Transaction, TransactionState};
