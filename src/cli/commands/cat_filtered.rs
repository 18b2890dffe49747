//! cat-filtered command - Print a blob through its end-of-line filter

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context as _, Result};

use super::Context;
use crate::filter::{Direction, FilterOptions};

/// Write the filtered content of `path` at `rev` to stdout.
pub fn cat_filtered(
    ctx: &Context,
    rev: &str,
    path: &Path,
    to_odb: bool,
    no_binary_check: bool,
) -> Result<()> {
    let git = ctx.open_repo()?;
    let config = ctx.config(Some(&git))?;

    let oid = git
        .blob_at(rev, path)
        .with_context(|| format!("No file '{}' in '{}'", path.display(), rev))?;
    let direction = if to_odb {
        Direction::ToOdb
    } else {
        Direction::ToWorktree
    };
    let options = FilterOptions::new(path)
        .direction(direction)
        .check_for_binary(!no_binary_check)
        .chunk_size(config.chunk_size());

    let mut stream = git.blob_stream(oid, options)?;
    let mut stdout = io::stdout().lock();
    io::copy(&mut stream, &mut stdout).context("Failed to stream filtered content")?;
    stdout.flush()?;
    stream.close();
    Ok(())
}
