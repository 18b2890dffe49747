//! filter
//!
//! Streaming content filtering on a worker thread.
//!
//! # Modules
//!
//! - [`pipe`]: the bounded pull stream between the worker and the reader
//! - [`eol`]: incremental CRLF/LF conversion
//! - [`blob`]: blob loading and attribute-driven filter selection
//!
//! # Example
//!
//! ```no_run
//! use std::io::Read;
//! use std::path::Path;
//! use gitbridge::filter::{open_blob_stream, FilterOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let oid = gitbridge::Oid::from_str("e69de29bb2d1d6434b8b29ae775ad8c2e48c5391")?;
//! let mut stream = open_blob_stream(Path::new("."), oid, FilterOptions::new("README.md"))?;
//! let mut text = String::new();
//! stream.read_to_string(&mut text)?;
//! stream.close();
//! # Ok(())
//! # }
//! ```

pub mod blob;
pub mod eol;
pub mod pipe;

pub use blob::{open_blob_stream, FilterOptions};
pub use eol::{Direction, EolConverter};
pub use pipe::{ChunkSink, FilterStream, StreamState};

/// Default bytes per chunk handed through the pipe.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
