//! dispatch::payload
//!
//! Per-operation context carried across the native boundary.
//!
//! A [`Payload`] is created at the start of one operation call, registered
//! in the process-wide registry, and dropped (unregistered) when that call
//! returns. It owns the handler set and a single deferred-error slot.
//!
//! # Invariants
//!
//! - The first handler error recorded wins; later ones are logged and
//!   discarded, since the operation is already unwinding.
//! - A recorded error always takes precedence over the native status in
//!   [`Payload::check`] and [`Payload::check_status`]. This catches
//!   callbacks whose return value libgit2 ignores.
//! - A payload is bound to its creating thread. It is `!Send`, and the
//!   shim rejects callbacks arriving on any other thread.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use crate::core::error::{BoxError, Error};
use crate::core::status::{CallSite, Status};
use crate::dispatch::handlers::HandlerSet;
use crate::dispatch::registry::{self, PayloadId};

/// State shared between a payload and the registry.
pub(crate) struct PayloadState<H> {
    owner: ThreadId,
    handlers: Mutex<H>,
    deferred: Mutex<Option<BoxError>>,
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A handler that panicked leaves the slot contents intact.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<H: HandlerSet> PayloadState<H> {
    pub(crate) fn owner(&self) -> ThreadId {
        self.owner
    }

    pub(crate) fn with_handlers<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        let mut handlers = relock(&self.handlers);
        f(&mut handlers)
    }

    /// Park a handler error. Returns false if one was already parked.
    pub(crate) fn record(&self, err: BoxError, site: CallSite) -> bool {
        let mut slot = relock(&self.deferred);
        if let Some(first) = slot.as_ref() {
            tracing::warn!(
                site = site.name(),
                first = %first,
                dropped = %err,
                "handler failed again after an earlier failure; keeping the first error"
            );
            return false;
        }
        tracing::debug!(site = site.name(), error = %err, "handler error deferred");
        *slot = Some(err);
        true
    }

    fn take(&self) -> Option<BoxError> {
        relock(&self.deferred).take()
    }

    fn is_set(&self) -> bool {
        relock(&self.deferred).is_some()
    }
}

/// Per-call context: handler slots plus a deferred-error slot.
///
/// # Example
///
/// ```
/// use gitbridge::core::status::{CallSite, Status};
/// use gitbridge::dispatch::handlers::RemoteHandlers;
/// use gitbridge::dispatch::Payload;
///
/// let payload = Payload::new(RemoteHandlers::new().update_tips(|_, _, _| Ok(()))).unwrap();
/// assert!(payload.has(CallSite::UpdateTips));
/// assert!(payload.check_status(Status::OK).is_ok());
/// ```
pub struct Payload<H: HandlerSet> {
    id: PayloadId,
    state: Arc<PayloadState<H>>,
    _thread_bound: PhantomData<*const ()>,
}

impl<H: HandlerSet> Payload<H> {
    /// Register a new payload for the current thread.
    ///
    /// # Errors
    ///
    /// [`Error::RegistryFull`] when no slot index is left.
    pub fn new(handlers: H) -> Result<Self, Error> {
        let state = Arc::new(PayloadState {
            owner: thread::current().id(),
            handlers: Mutex::new(handlers),
            deferred: Mutex::new(None),
        });
        let id = registry::register(Arc::clone(&state))?;
        tracing::trace!(%id, "payload registered");
        Ok(Payload {
            id,
            state,
            _thread_bound: PhantomData,
        })
    }

    /// The opaque handle installed shims carry.
    pub fn id(&self) -> PayloadId {
        self.id
    }

    /// Whether a handler is installed for `site`.
    pub fn has(&self, site: CallSite) -> bool {
        self.state.with_handlers(|h| h.has(site))
    }

    /// Run `f` against the handler set.
    pub(crate) fn with_handlers<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        self.state.with_handlers(f)
    }

    /// Whether a handler error is waiting to be surfaced.
    pub fn has_error(&self) -> bool {
        self.state.is_set()
    }

    /// Take the parked handler error, if any.
    pub fn take_error(&self) -> Option<BoxError> {
        self.state.take()
    }

    /// Turn a native status into a result.
    ///
    /// A parked handler error wins over `status`, even when `status` is
    /// success.
    pub fn check_status(&self, status: Status) -> Result<(), Error> {
        if let Some(err) = self.take_error() {
            return Err(Error::Callback(err));
        }
        if status.is_ok() {
            Ok(())
        } else {
            Err(Error::from_status(status, format!("native call failed: {}", status)))
        }
    }

    /// Turn a native result into a crate result.
    ///
    /// A parked handler error wins over `result`, even when it is `Ok`.
    pub fn check<T>(&self, result: Result<T, git2::Error>) -> Result<T, Error> {
        if let Some(err) = self.take_error() {
            if let Err(native) = &result {
                tracing::debug!(native = %native.message(), "native failure caused by handler error");
            }
            return Err(Error::Callback(err));
        }
        result.map_err(Error::from_native)
    }
}

impl<H: HandlerSet> Drop for Payload<H> {
    fn drop(&mut self) {
        registry::unregister(self.id);
        if let Some(err) = self.state.take() {
            tracing::error!(id = %self.id, error = %err, "payload dropped with an unsurfaced handler error");
        }
    }
}

impl<H: HandlerSet + std::fmt::Debug> std::fmt::Debug for Payload<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("id", &self.id)
            .field("owner", &self.state.owner)
            .field("has_error", &self.has_error())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::NativeErrorKind;
    use crate::dispatch::handlers::RemoteHandlers;

    fn boxed(message: &str) -> BoxError {
        message.to_string().into()
    }

    #[test]
    fn payload_is_registered_while_alive() {
        let payload = Payload::new(RemoteHandlers::new()).unwrap();
        let id = payload.id();
        assert!(registry::resolve::<PayloadState<RemoteHandlers>>(id).is_some());
        drop(payload);
        assert!(registry::resolve::<PayloadState<RemoteHandlers>>(id).is_none());
    }

    #[test]
    fn first_recorded_error_wins() {
        let payload = Payload::new(RemoteHandlers::new()).unwrap();
        assert!(payload.state.record(boxed("first"), CallSite::UpdateTips));
        assert!(!payload.state.record(boxed("second"), CallSite::UpdateTips));
        let err = payload.take_error().expect("error");
        assert_eq!(err.to_string(), "first");
        assert!(payload.take_error().is_none());
    }

    #[test]
    fn deferred_error_beats_success_status() {
        let payload = Payload::new(RemoteHandlers::new()).unwrap();
        payload.state.record(boxed("progress blew up"), CallSite::PushTransferProgress);
        let err = payload.check_status(Status::OK).unwrap_err();
        assert!(err.is_callback());
        assert_eq!(err.to_string(), "progress blew up");
    }

    #[test]
    fn deferred_error_beats_native_failure() {
        let payload = Payload::new(RemoteHandlers::new()).unwrap();
        payload.state.record(boxed("handler"), CallSite::UpdateTips);
        let native: Result<(), git2::Error> = Err(git2::Error::from_str("user callback"));
        let err = payload.check(native).unwrap_err();
        assert_eq!(err.to_string(), "handler");
    }

    #[test]
    fn status_without_deferred_error_maps_to_native_kind() {
        let payload = Payload::new(RemoteHandlers::new()).unwrap();
        let err = payload.check_status(Status::NOT_FOUND).unwrap_err();
        assert_eq!(err.native_kind(), Some(NativeErrorKind::NotFound));
        assert!(payload.check_status(Status::OK).is_ok());
    }

    #[test]
    fn ok_result_passes_through() {
        let payload = Payload::new(RemoteHandlers::new()).unwrap();
        assert_eq!(payload.check(Ok::<_, git2::Error>(5)).unwrap(), 5);
    }
}
