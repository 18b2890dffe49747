//! core
//!
//! Error taxonomy, native status conventions and configuration.
//!
//! # Modules
//!
//! - [`error`]: the two signaling channels and the crate error type
//! - [`status`]: native status codes and the per-call-site table
//! - [`config`]: TOML configuration with precedence rules

pub mod config;
pub mod error;
pub mod status;

pub use error::{BoxError, Error, HandlerError, HandlerResult, NativeErrorKind, Passthrough};
pub use status::{CallSite, Status};
