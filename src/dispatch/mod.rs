//! dispatch
//!
//! Running host-defined handlers inside synchronous native call stacks.
//!
//! # Architecture
//!
//! - [`registry`]: process-wide arena from integer ids to payload state
//! - [`handlers`]: the handler sets users fill in
//! - [`payload`]: per-call context with the deferred-error slot
//! - [`shim`]: one handler invocation, translated into a native status
//!
//! An operation wrapper creates a [`Payload`], lets [`crate::options`] wire
//! shims into the native option records, runs the native call, and finally
//! calls [`Payload::check`]. A handler error therefore always reaches the
//! caller, even when libgit2 ignored the callback's return value.

pub mod handlers;
pub mod payload;
pub mod registry;
pub mod shim;

pub use handlers::{
    AllowedCredentials, AsCheckout, AsRemote, CertificateInfo, CertificateKind, CheckoutHandlers,
    CheckoutNotification, CheckoutNotifyKind, Credential, HandlerSet, PushTransferProgress,
    RefUpdate, RemoteHandlers, StashApplyHandlers, StashApplyStage, TransferProgress,
};
pub use payload::Payload;
pub use registry::PayloadId;
pub use shim::{dispatch, Dispatched};
