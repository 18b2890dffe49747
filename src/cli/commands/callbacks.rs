//! Handler sets shared by the remote and checkout commands.

use crate::core::error::{HandlerError, HandlerResult, Passthrough};
use crate::dispatch::handlers::{
    AllowedCredentials, CheckoutHandlers, CheckoutNotification, CheckoutNotifyKind, Credential,
    RemoteHandlers,
};
use crate::ui::output::{self, Verbosity};
use crate::ui::prompts;

use super::Context;

/// libgit2 asks again after a rejected credential; stop after this many.
const MAX_CREDENTIAL_ATTEMPTS: u32 = 3;

/// Where credentials come from.
#[derive(Debug, Clone, Default)]
pub(crate) struct CredentialSource {
    username: Option<String>,
    password: Option<String>,
    interactive: bool,
    attempts: u32,
}

impl CredentialSource {
    /// `GITBRIDGE_USERNAME` / `GITBRIDGE_PASSWORD`, then prompts if allowed.
    pub(crate) fn from_env(interactive: bool) -> Self {
        CredentialSource {
            username: std::env::var("GITBRIDGE_USERNAME").ok(),
            password: std::env::var("GITBRIDGE_PASSWORD").ok(),
            interactive,
            attempts: 0,
        }
    }

    /// Answer one credential request.
    ///
    /// Declines with `Passthrough` when nothing suitable is available.
    pub(crate) fn next(
        &mut self,
        url: &str,
        username_from_url: Option<&str>,
        allowed: AllowedCredentials,
    ) -> HandlerResult<Credential> {
        self.attempts += 1;
        if self.attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(HandlerError::msg(format!(
                "authentication failed for '{}' after {} attempts",
                url, MAX_CREDENTIAL_ATTEMPTS
            )));
        }

        let username = self
            .username
            .clone()
            .or_else(|| username_from_url.map(str::to_string));

        if allowed.ssh_key && self.attempts == 1 {
            if let Some(username) = &username {
                return Ok(Credential::SshAgent {
                    username: username.clone(),
                });
            }
        }

        if allowed.user_pass {
            if let Some(password) = &self.password {
                return Ok(Credential::UserPass {
                    username: username.unwrap_or_default(),
                    password: password.clone(),
                });
            }
            if self.interactive {
                let username = match username {
                    Some(u) => u,
                    None => prompts::input(&format!("Username for '{}'", url), None, true)?,
                };
                let password = prompts::password(&format!("Password for '{}'", url), true)?;
                return Ok(Credential::UserPass { username, password });
            }
        }

        if allowed.username {
            if let Some(username) = username {
                return Ok(Credential::Username(username));
            }
        }

        Err(Passthrough.into())
    }
}

/// Handlers for clone, fetch and push.
pub(crate) fn remote_handlers(ctx: &Context) -> RemoteHandlers {
    let verbosity = ctx.verbosity;
    let mut source = CredentialSource::from_env(ctx.interactive);

    let mut handlers = RemoteHandlers::new()
        .credentials(move |url, username, allowed| source.next(url, username, allowed))
        .update_tips(move |refname, old, new| {
            let line = if old.is_zero() {
                format!(" * [new] {} -> {:.7}", refname, new)
            } else if new.is_zero() {
                format!(" - [deleted] {}", refname)
            } else {
                format!("   {:.7}..{:.7} {}", old, new, refname)
            };
            output::print(line, verbosity);
            Ok(())
        })
        .push_update_reference(|refname, rejection| match rejection {
            Some(reason) => Err(HandlerError::msg(format!(
                "remote rejected {}: {}",
                refname, reason
            ))),
            None => Ok(()),
        });

    if verbosity.shows_progress() {
        handlers = handlers
            .sideband_progress(|data| {
                for line in String::from_utf8_lossy(data).split(['\r', '\n']) {
                    if !line.trim().is_empty() {
                        output::progress_line(format!("remote: {}", line.trim_end()));
                    }
                }
                Ok(())
            })
            .transfer_progress(|progress| {
                output::progress_line(output::format_transfer(progress));
                Ok(())
            })
            .push_transfer_progress(|progress| {
                output::progress_line(output::format_push_transfer(progress));
                Ok(())
            });
    }
    handlers
}

/// Handlers for checkout.
///
/// A dry run reports every path it would touch; a real checkout reports
/// conflicts only.
pub(crate) fn checkout_handlers(verbosity: Verbosity, dry_run: bool) -> CheckoutHandlers {
    let kinds = if dry_run {
        vec![
            CheckoutNotifyKind::Conflict,
            CheckoutNotifyKind::Dirty,
            CheckoutNotifyKind::Updated,
            CheckoutNotifyKind::Untracked,
        ]
    } else {
        vec![CheckoutNotifyKind::Conflict]
    };

    let mut handlers = CheckoutHandlers::new()
        .notify_on(kinds)
        .checkout_notify(move |notification: &CheckoutNotification| {
            let path = notification
                .path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            match notification.kind {
                CheckoutNotifyKind::Conflict => {
                    output::warn(format!("conflict: {}", path), verbosity)
                }
                kind => output::print(
                    format!("{}: {}", format!("{:?}", kind).to_lowercase(), path),
                    verbosity,
                ),
            }
            Ok(())
        });

    if verbosity.shows_progress() {
        handlers = handlers.checkout_progress(|_, completed, total| {
            output::progress_line(format!("Checking out files {}/{}", completed, total));
            Ok(())
        });
    }
    handlers
}
