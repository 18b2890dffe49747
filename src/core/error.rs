//! core::error
//!
//! Error taxonomy for everything that crosses the native boundary.
//!
//! # Two channels
//!
//! Handlers signal back to the native library through one of two channels:
//!
//! - **Decline**: [`Passthrough`] means "behave as if no handler were
//!   installed". It is not a failure and never reaches the caller.
//! - **Failure**: any other error. It cannot travel through the native
//!   stack, so it is parked on the operation's payload and re-raised once
//!   the native call unwinds. The caller receives it unchanged as
//!   [`Error::Callback`].
//!
//! Failures that originate inside libgit2 itself become [`Error::Native`]
//! with a [`NativeErrorKind`].

use std::error::Error as StdError;
use std::fmt;
use std::thread::ThreadId;

use thiserror::Error;

use crate::core::status::Status;
use crate::dispatch::registry::PayloadId;

/// Boxed error produced by a handler.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Sentinel returned by a handler that declines to act.
///
/// # Example
///
/// ```
/// use gitbridge::core::error::{HandlerError, Passthrough};
///
/// let declined: HandlerError = Passthrough.into();
/// assert!(declined.is_passthrough());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Passthrough;

/// What a handler returns instead of a value.
///
/// Any `std::error::Error + Send + Sync` converts into
/// [`HandlerError::User`], so handlers can use `?` freely.
#[derive(Debug)]
pub enum HandlerError {
    /// Decline; the native default behavior applies.
    Passthrough,
    /// The handler failed; abort the operation and surface this error.
    User(BoxError),
}

impl HandlerError {
    /// Wrap any error-like value as a handler failure.
    pub fn user(err: impl Into<BoxError>) -> Self {
        HandlerError::User(err.into())
    }

    /// Handler failure carrying a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::User(message.into().into())
    }

    /// Whether this is the decline sentinel.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, HandlerError::Passthrough)
    }
}

impl From<Passthrough> for HandlerError {
    fn from(_: Passthrough) -> Self {
        HandlerError::Passthrough
    }
}

impl<E> From<E> for HandlerError
where
    E: StdError + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        HandlerError::User(Box::new(err))
    }
}

/// Result type returned by handlers.
pub type HandlerResult<T = ()> = Result<T, HandlerError>;

/// Category of a native failure with no stored handler error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeErrorKind {
    AlreadyExists,
    InvalidSpec,
    Ambiguous,
    NotFound,
    IterOver,
    Generic,
}

impl NativeErrorKind {
    /// Map a raw libgit2 code onto the closed set of kinds.
    pub fn from_raw(code: i32) -> Self {
        match Status::from_raw(code) {
            Status::EXISTS => NativeErrorKind::AlreadyExists,
            Status::INVALID_SPEC => NativeErrorKind::InvalidSpec,
            Status::AMBIGUOUS => NativeErrorKind::Ambiguous,
            Status::NOT_FOUND => NativeErrorKind::NotFound,
            Status::ITER_OVER => NativeErrorKind::IterOver,
            _ => NativeErrorKind::Generic,
        }
    }

    /// Short description used in messages.
    pub fn description(&self) -> &'static str {
        match self {
            NativeErrorKind::AlreadyExists => "already exists",
            NativeErrorKind::InvalidSpec => "invalid spec",
            NativeErrorKind::Ambiguous => "ambiguous",
            NativeErrorKind::NotFound => "not found",
            NativeErrorKind::IterOver => "iteration over",
            NativeErrorKind::Generic => "git error",
        }
    }
}

impl fmt::Display for NativeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors surfaced by gitbridge operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A handler failed. The boxed value is the handler's own error.
    #[error("{0}")]
    Callback(BoxError),

    /// libgit2 failed without a handler error to blame.
    #[error("{kind}: {message} (code {code})")]
    Native {
        /// Classified failure
        kind: NativeErrorKind,
        /// Raw libgit2 code
        code: i32,
        /// Message reported by libgit2
        message: String,
    },

    /// An object was used from a thread other than the one that created it.
    #[error("{object} belongs to thread {owner:?} but was used from thread {caller:?}")]
    ThreadAffinity {
        /// What was misused
        object: &'static str,
        /// The creating thread
        owner: ThreadId,
        /// The offending thread
        caller: ThreadId,
    },

    /// Another live transaction holds the reference.
    #[error("reference '{refname}' is locked by another transaction")]
    LockConflict {
        /// The contended reference
        refname: String,
    },

    /// A mutation named a reference this transaction never locked.
    #[error("reference '{refname}' is not locked by this transaction")]
    RefNotLocked {
        /// The reference that was not locked
        refname: String,
    },

    /// A locked reference moved before commit.
    #[error("reference '{refname}' changed after it was locked")]
    RefChanged {
        /// The reference that moved
        refname: String,
    },

    /// The transaction was already committed or rolled back.
    #[error("transaction is no longer open")]
    TransactionClosed,

    /// Read from a filter stream after `close()`.
    #[error("filter stream is closed")]
    StreamClosed,

    /// Every payload slot index is taken.
    #[error("payload registry is full")]
    RegistryFull,

    /// A callback fired for a payload that no longer exists.
    #[error("no live payload with id {0}")]
    UnknownPayload(PayloadId),

    /// I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify a libgit2 error.
    pub fn from_native(err: git2::Error) -> Self {
        let code = err.raw_code();
        Error::Native {
            kind: NativeErrorKind::from_raw(code),
            code,
            message: err.message().to_string(),
        }
    }

    /// Build a native error from a bare status code.
    pub fn from_status(status: Status, message: impl Into<String>) -> Self {
        Error::Native {
            kind: status.kind(),
            code: status.raw(),
            message: message.into(),
        }
    }

    /// Whether this error came from a handler.
    pub fn is_callback(&self) -> bool {
        matches!(self, Error::Callback(_))
    }

    /// The handler's error, if this is one.
    pub fn callback_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Error::Callback(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    /// Take back the handler's error, or return `self` unchanged.
    pub fn into_callback(self) -> Result<BoxError, Self> {
        match self {
            Error::Callback(err) => Ok(err),
            other => Err(other),
        }
    }

    /// Native kind, for native failures.
    pub fn native_kind(&self) -> Option<NativeErrorKind> {
        match self {
            Error::Native { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        Error::from_native(err)
    }
}
