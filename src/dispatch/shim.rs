//! dispatch::shim
//!
//! The dispatch shim: one handler invocation, translated into a status.
//!
//! # Protocol
//!
//! 1. Resolve the [`PayloadId`] through the registry.
//! 2. Reject invocations from any thread but the payload's owner.
//! 3. Invoke the slot; an empty slot counts as a decline.
//! 4. Map the outcome:
//!    - `Ok(value)` → [`Status::OK`] with the value
//!    - decline → the call site's pass code, or [`Status::OK`] where the
//!      site has none
//!    - error → park it on the payload, return [`Status::USER`]
//!
//! The shim runs inside whatever native frame called it, possibly while
//! libgit2 holds internal locks. It never blocks and never does I/O beyond
//! logging.

use std::thread;

use crate::core::error::{Error, HandlerError, HandlerResult};
use crate::core::status::{CallSite, Status};
use crate::dispatch::handlers::HandlerSet;
use crate::dispatch::payload::PayloadState;
use crate::dispatch::registry::{self, PayloadId};

/// Outcome of one shim invocation.
#[derive(Debug)]
pub struct Dispatched<T> {
    /// Status to hand back to the native caller.
    pub status: Status,
    /// Value produced by the handler, when it returned one.
    pub value: Option<T>,
}

impl<T> Dispatched<T> {
    fn status(status: Status) -> Self {
        Dispatched {
            status,
            value: None,
        }
    }

    fn value(value: T) -> Self {
        Dispatched {
            status: Status::OK,
            value: Some(value),
        }
    }

    /// Whether the native side should carry on.
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Reply shape for `bool` slots, where `true` means continue.
    pub(crate) fn into_continue(self) -> bool {
        self.status.is_ok()
    }

    /// Reply shape for `Result<(), git2::Error>` slots.
    pub(crate) fn into_native(self) -> Result<(), git2::Error> {
        if self.status.is_ok() {
            Ok(())
        } else {
            Err(status_error(self.status))
        }
    }
}

/// The native error a failing status is reported as.
pub(crate) fn status_error(status: Status) -> git2::Error {
    match status {
        Status::USER => git2::Error::new(
            git2::ErrorCode::User,
            git2::ErrorClass::Callback,
            "a callback returned an error",
        ),
        Status::PASSTHROUGH => git2::Error::new(
            git2::ErrorCode::GenericError,
            git2::ErrorClass::Callback,
            "a callback declined to act",
        ),
        other => git2::Error::new(
            git2::ErrorCode::GenericError,
            git2::ErrorClass::Callback,
            format!("callback failed with {}", other),
        ),
    }
}

/// Invoke one handler slot through the payload registered as `id`.
///
/// `invoke` receives the handler set and returns `None` when the slot is
/// empty, otherwise the handler's result.
pub fn dispatch<H, T, F>(id: PayloadId, site: CallSite, invoke: F) -> Dispatched<T>
where
    H: HandlerSet,
    F: FnOnce(&mut H) -> Option<HandlerResult<T>>,
{
    let Some(state) = registry::resolve::<PayloadState<H>>(id) else {
        tracing::error!(%id, site = site.name(), "callback fired for an unknown payload");
        return Dispatched::status(Status::USER);
    };

    let caller = thread::current().id();
    if caller != state.owner() {
        tracing::warn!(%id, site = site.name(), "callback fired off the payload's thread");
        let err = Error::ThreadAffinity {
            object: "payload",
            owner: state.owner(),
            caller,
        };
        state.record(Box::new(err), site);
        return Dispatched::status(Status::USER);
    }

    match state.with_handlers(invoke) {
        None => Dispatched::status(site.decline_status()),
        Some(Ok(value)) => Dispatched::value(value),
        Some(Err(HandlerError::Passthrough)) => {
            tracing::trace!(site = site.name(), "handler passed through");
            Dispatched::status(site.decline_status())
        }
        Some(Err(HandlerError::User(err))) => {
            state.record(err, site);
            Dispatched::status(Status::USER)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Passthrough;
    use crate::dispatch::handlers::{
        AllowedCredentials, CheckoutHandlers, CheckoutNotification, CheckoutNotifyKind, Credential,
        RemoteHandlers,
    };
    use crate::dispatch::Payload;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, thiserror::Error)]
    #[error("tips rejected")]
    struct TipsRejected;

    fn fire_update_tips(payload: &Payload<RemoteHandlers>) -> Dispatched<()> {
        dispatch::<RemoteHandlers, _, _>(payload.id(), CallSite::UpdateTips, |h| {
            h.update_tips
                .as_mut()
                .map(|f| f("refs/heads/main", git2::Oid::zero(), git2::Oid::zero()))
        })
    }

    fn fire_credentials(payload: &Payload<RemoteHandlers>) -> Dispatched<Credential> {
        dispatch::<RemoteHandlers, _, _>(payload.id(), CallSite::Credentials, |h| {
            h.credentials
                .as_mut()
                .map(|f| f("https://example.com/r.git", None, AllowedCredentials::default()))
        })
    }

    #[test]
    fn ok_returns_value() {
        let payload = Payload::new(RemoteHandlers::new().credentials(|_, _, _| {
            Ok(Credential::Username("git".into()))
        }))
        .unwrap();
        let out = fire_credentials(&payload);
        assert_eq!(out.status, Status::OK);
        assert_eq!(out.value, Some(Credential::Username("git".into())));
        assert!(!payload.has_error());
    }

    #[test]
    fn missing_slot_declines_without_error() {
        let payload = Payload::new(RemoteHandlers::new()).unwrap();
        let out = fire_credentials(&payload);
        assert_eq!(out.status, Status::PASSTHROUGH);
        assert!(out.value.is_none());

        let out = fire_update_tips(&payload);
        assert_eq!(out.status, Status::OK);
        assert!(!payload.has_error());
    }

    #[test]
    fn passthrough_uses_site_pass_code() {
        let payload = Payload::new(
            RemoteHandlers::new()
                .credentials(|_, _, _| Err(Passthrough.into()))
                .update_tips(|_, _, _| Err(Passthrough.into())),
        )
        .unwrap();
        assert_eq!(fire_credentials(&payload).status, Status::PASSTHROUGH);
        // update_tips has no pass code, so success is synthesized.
        assert_eq!(fire_update_tips(&payload).status, Status::OK);
        assert!(!payload.has_error());
    }

    #[test]
    fn user_error_is_parked_and_reported_as_user_status() {
        let payload =
            Payload::new(RemoteHandlers::new().update_tips(|_, _, _| Err(TipsRejected.into())))
                .unwrap();
        let out = fire_update_tips(&payload);
        assert_eq!(out.status, Status::USER);
        assert!(!out.into_continue());

        let err = payload.check_status(Status::USER).unwrap_err();
        let inner = err.into_callback().expect("callback error");
        assert!(inner.downcast_ref::<TipsRejected>().is_some());
    }

    #[test]
    fn handler_receives_arguments() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let payload = Payload::new(CheckoutHandlers::new().checkout_notify(move |n| {
            sink.lock().unwrap().push(n.clone());
            Ok(())
        }))
        .unwrap();
        let note = CheckoutNotification {
            kind: CheckoutNotifyKind::Updated,
            path: Some("a.txt".into()),
        };
        let out = dispatch::<CheckoutHandlers, _, _>(payload.id(), CallSite::CheckoutNotify, |h| {
            h.notify.as_mut().map(|f| f(&note))
        });
        assert!(out.is_ok());
        assert_eq!(seen.lock().unwrap().as_slice(), &[note]);
    }

    #[test]
    fn unknown_payload_reports_user_status() {
        let payload = Payload::new(RemoteHandlers::new()).unwrap();
        let id = payload.id();
        drop(payload);
        let out = dispatch::<RemoteHandlers, (), _>(id, CallSite::UpdateTips, |_| None);
        assert_eq!(out.status, Status::USER);
    }

    #[test]
    fn off_thread_dispatch_is_rejected_and_recorded() {
        let payload =
            Payload::new(RemoteHandlers::new().update_tips(|_, _, _| Ok(()))).unwrap();
        let id = payload.id();
        let status = std::thread::spawn(move || {
            dispatch::<RemoteHandlers, (), _>(id, CallSite::UpdateTips, |h| {
                h.update_tips
                    .as_mut()
                    .map(|f| f("refs/heads/x", git2::Oid::zero(), git2::Oid::zero()))
            })
            .status
        })
        .join()
        .unwrap();
        assert_eq!(status, Status::USER);

        let err = payload.check_status(Status::OK).unwrap_err();
        let inner = err.into_callback().expect("callback error");
        let affinity = inner.downcast_ref::<Error>().expect("crate error");
        assert!(matches!(affinity, Error::ThreadAffinity { .. }));
    }

    #[test]
    fn status_errors_carry_user_code() {
        assert_eq!(status_error(Status::USER).code(), git2::ErrorCode::User);
        assert_eq!(status_error(Status::USER).raw_code(), -7);
    }
}
