//! core::status
//!
//! Native status codes and the per-call-site calling conventions.
//!
//! # Overview
//!
//! libgit2 reports every outcome as an integer. Negative values are
//! failures; a handful are reserved for callbacks:
//!
//! - [`Status::USER`]: a callback asked the operation to abort
//! - [`Status::PASSTHROUGH`]: a callback declined to act; apply the default
//!
//! Not every native entry point understands [`Status::PASSTHROUGH`]. The
//! [`CallSite`] table records, per entry point, whether the pass code is
//! reserved there. Where it is not, a declining handler is reported as
//! [`Status::OK`] instead.
//!
//! # Example
//!
//! ```
//! use gitbridge::core::status::{CallSite, Status};
//!
//! assert_eq!(CallSite::Credentials.decline_status(), Status::PASSTHROUGH);
//! assert_eq!(CallSite::CheckoutNotify.decline_status(), Status::OK);
//! ```

use std::fmt;

use crate::core::error::NativeErrorKind;

/// A native status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(i32);

impl Status {
    /// Success.
    pub const OK: Status = Status(0);
    /// Generic failure.
    pub const ERROR: Status = Status(-1);
    /// Requested object could not be found.
    pub const NOT_FOUND: Status = Status(-3);
    /// Object exists, preventing the operation.
    pub const EXISTS: Status = Status(-4);
    /// More than one object matches.
    pub const AMBIGUOUS: Status = Status(-5);
    /// A user callback failed.
    pub const USER: Status = Status(-7);
    /// Name or spec is malformed.
    pub const INVALID_SPEC: Status = Status(-12);
    /// Lock file prevents the operation.
    pub const LOCKED: Status = Status(-14);
    /// A callback declined to act.
    pub const PASSTHROUGH: Status = Status(-30);
    /// Iteration is exhausted.
    pub const ITER_OVER: Status = Status(-31);

    /// Wrap a raw native code.
    pub const fn from_raw(code: i32) -> Self {
        Status(code)
    }

    /// The raw native code.
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Whether the code reports success.
    ///
    /// libgit2 treats every non-negative value as success.
    pub const fn is_ok(self) -> bool {
        self.0 >= 0
    }

    /// Classify a failing code.
    pub fn kind(self) -> NativeErrorKind {
        NativeErrorKind::from_raw(self.0)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Status::OK => "ok",
            Status::ERROR => "error",
            Status::NOT_FOUND => "not-found",
            Status::EXISTS => "exists",
            Status::AMBIGUOUS => "ambiguous",
            Status::USER => "user",
            Status::INVALID_SPEC => "invalid-spec",
            Status::LOCKED => "locked",
            Status::PASSTHROUGH => "passthrough",
            Status::ITER_OVER => "iter-over",
            _ => return write!(f, "status {}", self.0),
        };
        write!(f, "{} ({})", name, self.0)
    }
}

/// A native callback slot that a dispatch shim can be installed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallSite {
    Credentials,
    CertificateCheck,
    SidebandProgress,
    TransferProgress,
    UpdateTips,
    PushUpdateReference,
    PushNegotiation,
    PushTransferProgress,
    CheckoutNotify,
    CheckoutProgress,
    StashApplyProgress,
}

/// How one native call site treats callback results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteConvention {
    /// The site this row describes.
    pub site: CallSite,
    /// Reserved "decline" code, if the site has one.
    pub pass_code: Option<Status>,
    /// Whether the native side looks at the callback's return value at all.
    pub returns_status: bool,
    /// Whether the callback runs inline with performance-sensitive work.
    ///
    /// Expensive sites are wired only when a handler is present.
    pub expensive: bool,
}

impl SiteConvention {
    /// Status to report when a handler declines (or is absent).
    pub const fn decline_status(&self) -> Status {
        match self.pass_code {
            Some(code) => code,
            None => Status::OK,
        }
    }
}

const fn row(
    site: CallSite,
    pass_code: Option<Status>,
    returns_status: bool,
    expensive: bool,
) -> SiteConvention {
    SiteConvention {
        site,
        pass_code,
        returns_status,
        expensive,
    }
}

/// Indexed by `CallSite as usize`.
static SITE_TABLE: [SiteConvention; 11] = [
    row(CallSite::Credentials, Some(Status::PASSTHROUGH), true, false),
    row(CallSite::CertificateCheck, Some(Status::PASSTHROUGH), true, false),
    row(CallSite::SidebandProgress, None, true, true),
    row(CallSite::TransferProgress, None, true, true),
    row(CallSite::UpdateTips, None, true, false),
    row(CallSite::PushUpdateReference, None, true, false),
    row(CallSite::PushNegotiation, None, true, false),
    row(CallSite::PushTransferProgress, None, false, true),
    row(CallSite::CheckoutNotify, None, true, false),
    row(CallSite::CheckoutProgress, None, false, true),
    row(CallSite::StashApplyProgress, None, true, false),
];

impl CallSite {
    /// Every call site, in table order.
    pub const ALL: [CallSite; 11] = [
        CallSite::Credentials,
        CallSite::CertificateCheck,
        CallSite::SidebandProgress,
        CallSite::TransferProgress,
        CallSite::UpdateTips,
        CallSite::PushUpdateReference,
        CallSite::PushNegotiation,
        CallSite::PushTransferProgress,
        CallSite::CheckoutNotify,
        CallSite::CheckoutProgress,
        CallSite::StashApplyProgress,
    ];

    /// The calling convention of this site.
    pub fn convention(self) -> &'static SiteConvention {
        &SITE_TABLE[self as usize]
    }

    /// Status reported when the handler declines.
    pub fn decline_status(self) -> Status {
        self.convention().decline_status()
    }

    /// Whether the shim is wired only for payloads that carry a handler.
    pub fn is_expensive(self) -> bool {
        self.convention().expensive
    }

    /// Stable name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            CallSite::Credentials => "credentials",
            CallSite::CertificateCheck => "certificate_check",
            CallSite::SidebandProgress => "sideband_progress",
            CallSite::TransferProgress => "transfer_progress",
            CallSite::UpdateTips => "update_tips",
            CallSite::PushUpdateReference => "push_update_reference",
            CallSite::PushNegotiation => "push_negotiation",
            CallSite::PushTransferProgress => "push_transfer_progress",
            CallSite::CheckoutNotify => "checkout_notify",
            CallSite::CheckoutProgress => "checkout_progress",
            CallSite::StashApplyProgress => "stash_apply_progress",
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
