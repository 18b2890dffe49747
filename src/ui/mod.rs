//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`prompts`] - Interactive prompts
//! - [`output`] - Output formatting and progress display
//!
//! # Design
//!
//! All terminal output and prompts go through this module so that quiet
//! and non-interactive modes are honored in one place.

pub mod output;
pub mod prompts;
