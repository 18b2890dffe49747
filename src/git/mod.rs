//! git
//!
//! Single interface for repository operations.
//!
//! # Architecture
//!
//! Operations that accept handlers live here and nowhere else. Each one
//! owns its payload and its option records for exactly the duration of the
//! native call, and surfaces handler failures through the payload's
//! deferred error slot.
//!
//! # Responsibilities
//!
//! - Repository discovery and cloning
//! - Fetch and push with remote handlers
//! - Checkout and stash apply with checkout handlers
//! - Reference and revision reads
//! - Filtered blob streams and reference transactions

mod interface;

pub use interface::Git;
