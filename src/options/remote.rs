//! options::remote
//!
//! Remote callbacks and the fetch, push, proxy and clone records built
//! around them.

use git2::build::RepoBuilder;
use git2::{
    CertificateCheckStatus, ErrorClass, ErrorCode, FetchOptions, FetchPrune, ProxyOptions,
    PushOptions, RemoteCallbacks,
};

use super::{CloneSettings, FetchSettings, ProxySetting, PushSettings};
use crate::core::status::{CallSite, Status};
use crate::dispatch::handlers::{
    AllowedCredentials, AsRemote, CertificateInfo, CertificateKind, Credential,
    PushTransferProgress, RefUpdate, TransferProgress,
};
use crate::dispatch::shim::{dispatch, status_error, Dispatched};
use crate::dispatch::Payload;

/// Build remote callbacks with a shim in every slot that should have one.
pub fn remote_callbacks<'cb, H: AsRemote>(payload: &Payload<H>) -> RemoteCallbacks<'cb> {
    let id = payload.id();
    let mut callbacks = RemoteCallbacks::new();

    callbacks.credentials(move |url, username_from_url, allowed| {
        let allowed = AllowedCredentials::from(allowed);
        let out = dispatch::<H, _, _>(id, CallSite::Credentials, |h| {
            h.remote()
                .credentials
                .as_mut()
                .map(|f| f(url, username_from_url, allowed))
        });
        credential_reply(out)
    });

    callbacks.certificate_check(move |cert, host| {
        let info = CertificateInfo {
            host: host.to_string(),
            kind: if cert.as_x509().is_some() {
                CertificateKind::X509
            } else if cert.as_hostkey().is_some() {
                CertificateKind::HostKey
            } else {
                CertificateKind::Other
            },
        };
        let out = dispatch::<H, _, _>(id, CallSite::CertificateCheck, |h| {
            h.remote().certificate_check.as_mut().map(|f| f(&info))
        });
        certificate_reply(out)
    });

    callbacks.update_tips(move |refname, old, new| {
        dispatch::<H, _, _>(id, CallSite::UpdateTips, |h| {
            h.remote()
                .update_tips
                .as_mut()
                .map(|f| f(refname, old, new))
        })
        .into_continue()
    });

    callbacks.push_update_reference(move |refname, rejection| {
        dispatch::<H, _, _>(id, CallSite::PushUpdateReference, |h| {
            h.remote()
                .push_update_reference
                .as_mut()
                .map(|f| f(refname, rejection))
        })
        .into_native()
    });

    callbacks.push_negotiation(move |updates| {
        let updates: Vec<RefUpdate> = updates.iter().map(RefUpdate::from_native).collect();
        dispatch::<H, _, _>(id, CallSite::PushNegotiation, |h| {
            h.remote().push_negotiation.as_mut().map(|f| f(&updates))
        })
        .into_native()
    });

    if payload.has(CallSite::SidebandProgress) {
        callbacks.sideband_progress(move |data| {
            dispatch::<H, _, _>(id, CallSite::SidebandProgress, |h| {
                h.remote().sideband_progress.as_mut().map(|f| f(data))
            })
            .into_continue()
        });
    }

    if payload.has(CallSite::TransferProgress) {
        callbacks.transfer_progress(move |progress| {
            let progress = TransferProgress::from_native(&progress);
            dispatch::<H, _, _>(id, CallSite::TransferProgress, |h| {
                h.remote().transfer_progress.as_mut().map(|f| f(&progress))
            })
            .into_continue()
        });
    }

    if payload.has(CallSite::PushTransferProgress) {
        callbacks.push_transfer_progress(move |current, total, bytes| {
            let progress = PushTransferProgress {
                current,
                total,
                bytes,
            };
            // libgit2 ignores this slot's result; failures stay parked on the payload.
            dispatch::<H, _, _>(id, CallSite::PushTransferProgress, |h| {
                h.remote()
                    .push_transfer_progress
                    .as_mut()
                    .map(|f| f(&progress))
            });
        });
    }

    callbacks
}

fn credential_reply(out: Dispatched<Credential>) -> Result<git2::Cred, git2::Error> {
    if let Some(credential) = out.value {
        return credential.to_native();
    }
    match out.status {
        Status::PASSTHROUGH => Err(git2::Error::new(
            ErrorCode::Auth,
            ErrorClass::Callback,
            "authentication required but no credentials were supplied",
        )),
        status => Err(status_error(status)),
    }
}

fn certificate_reply(out: Dispatched<bool>) -> Result<CertificateCheckStatus, git2::Error> {
    match (out.status, out.value) {
        (_, Some(true)) => Ok(CertificateCheckStatus::CertificateOk),
        (_, Some(false)) => Err(git2::Error::new(
            ErrorCode::Certificate,
            ErrorClass::Callback,
            "certificate rejected by handler",
        )),
        (Status::PASSTHROUGH, None) => Ok(CertificateCheckStatus::CertificatePassthrough),
        (status, None) => Err(status_error(status)),
    }
}

/// Fill a proxy record in place.
pub fn fill_proxy(options: &mut ProxyOptions<'_>, setting: &ProxySetting) {
    match setting {
        ProxySetting::None => {}
        ProxySetting::Auto => {
            options.auto();
        }
        ProxySetting::Url(url) => {
            options.url(url);
        }
    }
}

/// Fill a fetch record in place, including its callbacks and proxy.
pub fn fill_fetch<'cb, H: AsRemote>(
    options: &mut FetchOptions<'cb>,
    payload: &Payload<H>,
    settings: &FetchSettings,
) {
    options.remote_callbacks(remote_callbacks(payload));

    let mut proxy = ProxyOptions::new();
    fill_proxy(&mut proxy, &settings.proxy);
    options.proxy_options(proxy);

    if settings.prune {
        options.prune(FetchPrune::On);
    }
    if let Some(depth) = settings.depth {
        options.depth(i32::try_from(depth).unwrap_or(i32::MAX));
    }
}

/// Fill a push record in place, including its callbacks and proxy.
pub fn fill_push<'cb, H: AsRemote>(
    options: &mut PushOptions<'cb>,
    payload: &Payload<H>,
    settings: &PushSettings,
) {
    options.remote_callbacks(remote_callbacks(payload));

    let mut proxy = ProxyOptions::new();
    fill_proxy(&mut proxy, &settings.proxy);
    options.proxy_options(proxy);

    if let Some(threads) = settings.parallelism {
        options.packbuilder_parallelism(threads);
    }
}

/// Build a clone record whose fetch record is filled in place.
pub fn clone_builder<'cb, H: AsRemote>(
    payload: &Payload<H>,
    settings: &CloneSettings,
) -> RepoBuilder<'cb> {
    let mut fetch = FetchOptions::new();
    fill_fetch(&mut fetch, payload, &settings.fetch);

    let mut builder = RepoBuilder::new();
    builder.bare(settings.bare);
    if let Some(branch) = &settings.branch {
        builder.branch(branch);
    }
    builder.fetch_options(fetch);
    builder
}
