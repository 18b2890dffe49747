//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Status lines respect the quiet flag. Progress goes to stderr and is
//! only shown on a terminal, overwriting itself in place.

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};

use crate::dispatch::handlers::{PushTransferProgress, TransferProgress};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Whether progress lines should be drawn.
    pub fn shows_progress(self) -> bool {
        self != Verbosity::Quiet && io::stderr().is_terminal()
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Redraw the current progress line on stderr.
pub fn progress_line(message: impl Display) {
    let mut stderr = io::stderr();
    let _ = write!(stderr, "\r{}\x1b[K", message);
    let _ = stderr.flush();
}

/// Finish a progress line so later output starts on a fresh line.
pub fn progress_done() {
    eprintln!();
}

/// Describe fetch progress.
pub fn format_transfer(progress: &TransferProgress) -> String {
    if progress.total_objects > 0 && progress.received_objects == progress.total_objects {
        format!(
            "Resolving deltas {}/{}",
            progress.indexed_deltas, progress.total_deltas
        )
    } else {
        format!(
            "Receiving objects {}/{} ({})",
            progress.received_objects,
            progress.total_objects,
            format_bytes(progress.received_bytes)
        )
    }
}

/// Describe push progress.
pub fn format_push_transfer(progress: &PushTransferProgress) -> String {
    format!(
        "Writing objects {}/{} ({})",
        progress.current,
        progress.total,
        format_bytes(progress.bytes)
    )
}

/// Human-readable byte count.
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_flags() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
        assert!(!Verbosity::Quiet.shows_progress());
    }

    #[test]
    fn bytes_are_scaled() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn transfer_switches_to_deltas_when_received() {
        let mut progress = TransferProgress {
            total_objects: 10,
            received_objects: 4,
            ..Default::default()
        };
        assert!(format_transfer(&progress).starts_with("Receiving objects 4/10"));
        progress.received_objects = 10;
        progress.total_deltas = 3;
        assert_eq!(format_transfer(&progress), "Resolving deltas 0/3");
    }
}
