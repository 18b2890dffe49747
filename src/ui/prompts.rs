//! ui::prompts
//!
//! Interactive prompts.
//!
//! # Design
//!
//! Prompts are only shown in interactive mode. In non-interactive mode they
//! fail with [`PromptError::NotInteractive`] and the caller falls back to a
//! default. Prompt text goes to stderr so stdout stays usable for data.

use std::io::{self, BufRead, IsTerminal, Write};

use thiserror::Error;

/// Errors from prompts.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt cancelled by user")]
    Cancelled,

    #[error("not in interactive mode")]
    NotInteractive,

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Whether stdin and stderr are both terminals.
pub fn is_interactive() -> bool {
    io::stdin().is_terminal() && io::stderr().is_terminal()
}

/// Prompt for a line of text.
///
/// An empty answer takes `default` when one is given. End of input cancels.
pub fn input(
    message: &str,
    default: Option<&str>,
    interactive: bool,
) -> Result<String, PromptError> {
    if !interactive {
        return Err(PromptError::NotInteractive);
    }

    let mut stderr = io::stderr();
    match default {
        Some(d) => write!(stderr, "{} [{}]: ", message, d)?,
        None => write!(stderr, "{}: ", message)?,
    }
    stderr.flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(PromptError::Cancelled);
    }
    let answer = line.trim_end_matches(['\r', '\n']);
    match (answer.is_empty(), default) {
        (true, Some(d)) => Ok(d.to_string()),
        _ => Ok(answer.to_string()),
    }
}

/// Prompt for masked input such as a password.
///
/// The input is not echoed to the terminal.
pub fn password(message: &str, interactive: bool) -> Result<String, PromptError> {
    if !interactive {
        return Err(PromptError::NotInteractive);
    }
    let secret = rpassword::prompt_password(format!("{}: ", message))?;
    if secret.is_empty() {
        return Err(PromptError::Cancelled);
    }
    Ok(secret)
}
