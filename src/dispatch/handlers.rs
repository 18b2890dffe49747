//! dispatch::handlers
//!
//! Host-facing handler sets.
//!
//! A handler set is a bundle of optional, named callables. A missing slot
//! is legal: the shim resolves it to the call site's default behavior
//! without invoking anything. Handlers return [`HandlerResult`]; returning
//! `Err(Passthrough.into())` asks for the native default, any other error
//! aborts the operation and is re-raised to the caller unchanged.
//!
//! # Example
//!
//! ```
//! use gitbridge::dispatch::handlers::{Credential, RemoteHandlers};
//!
//! let handlers = RemoteHandlers::new()
//!     .credentials(|_url, username, _allowed| {
//!         Ok(Credential::UserPass {
//!             username: username.unwrap_or("git").to_string(),
//!             password: "secret".to_string(),
//!         })
//!     })
//!     .transfer_progress(|progress| {
//!         eprintln!("{}/{}", progress.received_objects, progress.total_objects);
//!         Ok(())
//!     });
//! # let _ = handlers;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use git2::Oid;

use crate::core::error::HandlerResult;
use crate::core::status::CallSite;

/// A bundle of handler slots that can back a payload.
pub trait HandlerSet: Send + 'static {
    /// Whether a handler is installed for `site`.
    fn has(&self, site: CallSite) -> bool;
}

/// Handler sets that carry remote callbacks.
pub trait AsRemote: HandlerSet {
    /// The remote slots.
    fn remote(&mut self) -> &mut RemoteHandlers;
}

/// Handler sets that carry checkout callbacks.
pub trait AsCheckout: HandlerSet {
    /// The checkout slots.
    fn checkout(&mut self) -> &mut CheckoutHandlers;
}

// =============================================================================
// Values handed to handlers
// =============================================================================

/// Credential kinds the remote will accept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllowedCredentials {
    pub user_pass: bool,
    pub ssh_key: bool,
    pub ssh_custom: bool,
    pub ssh_interactive: bool,
    pub username: bool,
    pub default: bool,
}

impl From<git2::CredentialType> for AllowedCredentials {
    fn from(allowed: git2::CredentialType) -> Self {
        use git2::CredentialType as T;
        AllowedCredentials {
            user_pass: allowed.contains(T::USER_PASS_PLAINTEXT),
            ssh_key: allowed.contains(T::SSH_KEY),
            ssh_custom: allowed.contains(T::SSH_CUSTOM),
            ssh_interactive: allowed.contains(T::SSH_INTERACTIVE),
            username: allowed.contains(T::USERNAME),
            default: allowed.contains(T::DEFAULT),
        }
    }
}

/// A credential produced by a `credentials` handler.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Plain username and password (HTTPS).
    UserPass { username: String, password: String },
    /// SSH key pair on disk.
    SshKey {
        username: String,
        public_key: Option<PathBuf>,
        private_key: PathBuf,
        passphrase: Option<String>,
    },
    /// Ask the running SSH agent.
    SshAgent { username: String },
    /// Username only, for transports that ask for it first.
    Username(String),
    /// Platform default (NTLM/Negotiate).
    Default,
}

impl Credential {
    pub(crate) fn to_native(&self) -> Result<git2::Cred, git2::Error> {
        match self {
            Credential::UserPass { username, password } => {
                git2::Cred::userpass_plaintext(username, password)
            }
            Credential::SshKey {
                username,
                public_key,
                private_key,
                passphrase,
            } => git2::Cred::ssh_key(
                username,
                public_key.as_deref(),
                private_key,
                passphrase.as_deref(),
            ),
            Credential::SshAgent { username } => git2::Cred::ssh_key_from_agent(username),
            Credential::Username(username) => git2::Cred::username(username),
            Credential::Default => git2::Cred::default(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secrets.
        match self {
            Credential::UserPass { username, .. } => f
                .debug_struct("UserPass")
                .field("username", username)
                .finish_non_exhaustive(),
            Credential::SshKey {
                username,
                private_key,
                ..
            } => f
                .debug_struct("SshKey")
                .field("username", username)
                .field("private_key", private_key)
                .finish_non_exhaustive(),
            Credential::SshAgent { username } => {
                f.debug_struct("SshAgent").field("username", username).finish()
            }
            Credential::Username(username) => f.debug_tuple("Username").field(username).finish(),
            Credential::Default => f.write_str("Default"),
        }
    }
}

/// Kind of certificate presented by the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateKind {
    X509,
    HostKey,
    Other,
}

/// Certificate details handed to `certificate_check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub host: String,
    pub kind: CertificateKind,
}

/// Snapshot of fetch/clone download progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub total_objects: usize,
    pub indexed_objects: usize,
    pub received_objects: usize,
    pub local_objects: usize,
    pub total_deltas: usize,
    pub indexed_deltas: usize,
    pub received_bytes: usize,
}

impl TransferProgress {
    pub(crate) fn from_native(progress: &git2::Progress<'_>) -> Self {
        TransferProgress {
            total_objects: progress.total_objects(),
            indexed_objects: progress.indexed_objects(),
            received_objects: progress.received_objects(),
            local_objects: progress.local_objects(),
            total_deltas: progress.total_deltas(),
            indexed_deltas: progress.indexed_deltas(),
            received_bytes: progress.received_bytes(),
        }
    }
}

/// Snapshot of push upload progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushTransferProgress {
    pub current: usize,
    pub total: usize,
    pub bytes: usize,
}

/// One reference update proposed during push negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub src_refname: Option<String>,
    pub dst_refname: Option<String>,
    pub src: Oid,
    pub dst: Oid,
}

impl RefUpdate {
    pub(crate) fn from_native(update: &git2::PushUpdate<'_>) -> Self {
        RefUpdate {
            src_refname: update.src_refname().map(str::to_owned),
            dst_refname: update.dst_refname().map(str::to_owned),
            src: update.src(),
            dst: update.dst(),
        }
    }
}

/// Why checkout is notifying about a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckoutNotifyKind {
    Conflict,
    Dirty,
    Updated,
    Untracked,
    Ignored,
}

impl CheckoutNotifyKind {
    /// Every notification kind.
    pub const ALL: [CheckoutNotifyKind; 5] = [
        CheckoutNotifyKind::Conflict,
        CheckoutNotifyKind::Dirty,
        CheckoutNotifyKind::Updated,
        CheckoutNotifyKind::Untracked,
        CheckoutNotifyKind::Ignored,
    ];

    pub(crate) fn to_native(self) -> git2::CheckoutNotificationType {
        use git2::CheckoutNotificationType as N;
        match self {
            CheckoutNotifyKind::Conflict => N::CONFLICT,
            CheckoutNotifyKind::Dirty => N::DIRTY,
            CheckoutNotifyKind::Updated => N::UPDATED,
            CheckoutNotifyKind::Untracked => N::UNTRACKED,
            CheckoutNotifyKind::Ignored => N::IGNORED,
        }
    }

    pub(crate) fn from_native(kind: git2::CheckoutNotificationType) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|candidate| kind.contains(candidate.to_native()))
    }
}

/// A checkout notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutNotification {
    pub kind: CheckoutNotifyKind,
    pub path: Option<PathBuf>,
}

/// Stage reported by `stash_apply_progress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StashApplyStage {
    None,
    LoadingStash,
    AnalyzeIndex,
    AnalyzeModified,
    AnalyzeUntracked,
    CheckoutUntracked,
    CheckoutModified,
    Done,
}

impl From<git2::StashApplyProgress> for StashApplyStage {
    fn from(stage: git2::StashApplyProgress) -> Self {
        use git2::StashApplyProgress as P;
        match stage {
            P::LoadingStash => StashApplyStage::LoadingStash,
            P::AnalyzeIndex => StashApplyStage::AnalyzeIndex,
            P::AnalyzeModified => StashApplyStage::AnalyzeModified,
            P::AnalyzeUntracked => StashApplyStage::AnalyzeUntracked,
            P::CheckoutUntracked => StashApplyStage::CheckoutUntracked,
            P::CheckoutModified => StashApplyStage::CheckoutModified,
            P::Done => StashApplyStage::Done,
            _ => StashApplyStage::None,
        }
    }
}

// =============================================================================
// Remote handlers
// =============================================================================

type CredentialsFn =
    Box<dyn FnMut(&str, Option<&str>, AllowedCredentials) -> HandlerResult<Credential> + Send>;
type CertificateFn = Box<dyn FnMut(&CertificateInfo) -> HandlerResult<bool> + Send>;
type SidebandFn = Box<dyn FnMut(&[u8]) -> HandlerResult + Send>;
type TransferFn = Box<dyn FnMut(&TransferProgress) -> HandlerResult + Send>;
type UpdateTipsFn = Box<dyn FnMut(&str, Oid, Oid) -> HandlerResult + Send>;
type PushUpdateReferenceFn = Box<dyn FnMut(&str, Option<&str>) -> HandlerResult + Send>;
type PushNegotiationFn = Box<dyn FnMut(&[RefUpdate]) -> HandlerResult + Send>;
type PushTransferFn = Box<dyn FnMut(&PushTransferProgress) -> HandlerResult + Send>;

/// Callbacks for clone, fetch and push.
///
/// Defaults when a slot is empty:
///
/// - `credentials`, `certificate_check`: pass through to libgit2
/// - everything else: no-op
#[derive(Default)]
pub struct RemoteHandlers {
    pub(crate) credentials: Option<CredentialsFn>,
    pub(crate) certificate_check: Option<CertificateFn>,
    pub(crate) sideband_progress: Option<SidebandFn>,
    pub(crate) transfer_progress: Option<TransferFn>,
    pub(crate) update_tips: Option<UpdateTipsFn>,
    pub(crate) push_update_reference: Option<PushUpdateReferenceFn>,
    pub(crate) push_negotiation: Option<PushNegotiationFn>,
    pub(crate) push_transfer_progress: Option<PushTransferFn>,
}

impl RemoteHandlers {
    /// An empty set: every slot uses its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply credentials when the remote asks for authentication.
    ///
    /// Arguments are the URL, the username embedded in the URL (if any)
    /// and the credential kinds the remote accepts.
    pub fn credentials<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&str, Option<&str>, AllowedCredentials) -> HandlerResult<Credential>
            + Send
            + 'static,
    {
        self.credentials = Some(Box::new(handler));
        self
    }

    /// Decide whether to trust the remote's certificate.
    ///
    /// `Ok(true)` accepts, `Ok(false)` rejects, `Passthrough` defers to
    /// libgit2's own validation.
    pub fn certificate_check<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&CertificateInfo) -> HandlerResult<bool> + Send + 'static,
    {
        self.certificate_check = Some(Box::new(handler));
        self
    }

    /// Receive textual progress sent by the remote.
    pub fn sideband_progress<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&[u8]) -> HandlerResult + Send + 'static,
    {
        self.sideband_progress = Some(Box::new(handler));
        self
    }

    /// Observe download and indexing progress.
    pub fn transfer_progress<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&TransferProgress) -> HandlerResult + Send + 'static,
    {
        self.transfer_progress = Some(Box::new(handler));
        self
    }

    /// Observe each local reference updated by a fetch.
    pub fn update_tips<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&str, Oid, Oid) -> HandlerResult + Send + 'static,
    {
        self.update_tips = Some(Box::new(handler));
        self
    }

    /// Observe the remote's verdict on each pushed reference.
    ///
    /// The second argument is the rejection message, `None` on success.
    pub fn push_update_reference<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&str, Option<&str>) -> HandlerResult + Send + 'static,
    {
        self.push_update_reference = Some(Box::new(handler));
        self
    }

    /// Inspect (and veto) the reference updates a push is about to send.
    pub fn push_negotiation<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&[RefUpdate]) -> HandlerResult + Send + 'static,
    {
        self.push_negotiation = Some(Box::new(handler));
        self
    }

    /// Observe push upload progress.
    ///
    /// libgit2 ignores this callback's result; an error still aborts the
    /// outer push call once it returns.
    pub fn push_transfer_progress<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&PushTransferProgress) -> HandlerResult + Send + 'static,
    {
        self.push_transfer_progress = Some(Box::new(handler));
        self
    }
}

impl HandlerSet for RemoteHandlers {
    fn has(&self, site: CallSite) -> bool {
        match site {
            CallSite::Credentials => self.credentials.is_some(),
            CallSite::CertificateCheck => self.certificate_check.is_some(),
            CallSite::SidebandProgress => self.sideband_progress.is_some(),
            CallSite::TransferProgress => self.transfer_progress.is_some(),
            CallSite::UpdateTips => self.update_tips.is_some(),
            CallSite::PushUpdateReference => self.push_update_reference.is_some(),
            CallSite::PushNegotiation => self.push_negotiation.is_some(),
            CallSite::PushTransferProgress => self.push_transfer_progress.is_some(),
            _ => false,
        }
    }
}

impl AsRemote for RemoteHandlers {
    fn remote(&mut self) -> &mut RemoteHandlers {
        self
    }
}

impl fmt::Debug for RemoteHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_slots(f, "RemoteHandlers", self)
    }
}

// =============================================================================
// Checkout handlers
// =============================================================================

type NotifyFn = Box<dyn FnMut(&CheckoutNotification) -> HandlerResult + Send>;
type CheckoutProgressFn = Box<dyn FnMut(Option<&Path>, usize, usize) -> HandlerResult + Send>;

/// Callbacks for checkout.
///
/// `checkout_notify` fires only for the kinds selected with
/// [`CheckoutHandlers::notify_on`] (conflicts by default). Returning
/// `Passthrough` from it lets the checkout proceed.
pub struct CheckoutHandlers {
    pub(crate) notify: Option<NotifyFn>,
    pub(crate) notify_on: Vec<CheckoutNotifyKind>,
    pub(crate) progress: Option<CheckoutProgressFn>,
}

impl Default for CheckoutHandlers {
    fn default() -> Self {
        CheckoutHandlers {
            notify: None,
            notify_on: vec![CheckoutNotifyKind::Conflict],
            progress: None,
        }
    }
}

impl CheckoutHandlers {
    /// An empty set: every slot uses its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Be told about paths of the selected kinds; an error aborts checkout.
    pub fn checkout_notify<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&CheckoutNotification) -> HandlerResult + Send + 'static,
    {
        self.notify = Some(Box::new(handler));
        self
    }

    /// Select which notification kinds reach `checkout_notify`.
    pub fn notify_on(mut self, kinds: impl IntoIterator<Item = CheckoutNotifyKind>) -> Self {
        self.notify_on = kinds.into_iter().collect();
        self
    }

    /// Observe checkout progress: path, completed steps, total steps.
    ///
    /// libgit2 ignores this callback's result; an error still fails the
    /// outer call once checkout returns.
    pub fn checkout_progress<F>(mut self, handler: F) -> Self
    where
        F: FnMut(Option<&Path>, usize, usize) -> HandlerResult + Send + 'static,
    {
        self.progress = Some(Box::new(handler));
        self
    }

    /// Native notification mask: empty unless a notify handler is installed.
    pub(crate) fn notify_mask(&self) -> git2::CheckoutNotificationType {
        let mut mask = git2::CheckoutNotificationType::empty();
        if self.notify.is_some() {
            for kind in &self.notify_on {
                mask |= kind.to_native();
            }
        }
        mask
    }
}

impl HandlerSet for CheckoutHandlers {
    fn has(&self, site: CallSite) -> bool {
        match site {
            CallSite::CheckoutNotify => self.notify.is_some(),
            CallSite::CheckoutProgress => self.progress.is_some(),
            _ => false,
        }
    }
}

impl AsCheckout for CheckoutHandlers {
    fn checkout(&mut self) -> &mut CheckoutHandlers {
        self
    }
}

impl fmt::Debug for CheckoutHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_slots(f, "CheckoutHandlers", self)
    }
}

// =============================================================================
// Stash-apply handlers
// =============================================================================

type StashProgressFn = Box<dyn FnMut(StashApplyStage) -> HandlerResult + Send>;

/// Callbacks for stash apply: its own progress plus the embedded checkout.
#[derive(Default)]
pub struct StashApplyHandlers {
    pub(crate) checkout: CheckoutHandlers,
    pub(crate) progress: Option<StashProgressFn>,
}

impl StashApplyHandlers {
    /// An empty set: every slot uses its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use these checkout handlers for the checkout stash apply performs.
    pub fn with_checkout(mut self, checkout: CheckoutHandlers) -> Self {
        self.checkout = checkout;
        self
    }

    /// Observe stash apply stages; an error aborts the apply.
    pub fn stash_apply_progress<F>(mut self, handler: F) -> Self
    where
        F: FnMut(StashApplyStage) -> HandlerResult + Send + 'static,
    {
        self.progress = Some(Box::new(handler));
        self
    }
}

impl HandlerSet for StashApplyHandlers {
    fn has(&self, site: CallSite) -> bool {
        match site {
            CallSite::StashApplyProgress => self.progress.is_some(),
            other => self.checkout.has(other),
        }
    }
}

impl AsCheckout for StashApplyHandlers {
    fn checkout(&mut self) -> &mut CheckoutHandlers {
        &mut self.checkout
    }
}

impl fmt::Debug for StashApplyHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_slots(f, "StashApplyHandlers", self)
    }
}

fn debug_slots(f: &mut fmt::Formatter<'_>, name: &str, set: &dyn HandlerSet) -> fmt::Result {
    let installed: Vec<&str> = CallSite::ALL
        .iter()
        .filter(|site| set.has(**site))
        .map(|site| site.name())
        .collect();
    f.debug_struct(name).field("installed", &installed).finish()
}
