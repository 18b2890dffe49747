//! filter::blob
//!
//! Stream a blob through the EOL filter that applies to a path.
//!
//! The conversion decision follows the inputs libgit2's own CRLF filter
//! reads: the `text` and `eol` attributes of the path and `core.autocrlf`.

use std::io::Write;
use std::path::{Path, PathBuf};

use git2::{AttrCheckFlags, AttrValue, Blob, Oid, Repository};

use super::eol::{Direction, EolConverter};
use super::pipe::FilterStream;
use super::DEFAULT_CHUNK_SIZE;
use crate::core::error::Error;

/// How to filter a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOptions {
    /// Path whose attributes select the filter.
    pub as_path: PathBuf,
    pub direction: Direction,
    /// Leave content libgit2 considers binary untouched.
    pub check_for_binary: bool,
    pub chunk_size: usize,
}

impl FilterOptions {
    /// Smudge for `as_path`, skipping binary content.
    pub fn new(as_path: impl Into<PathBuf>) -> Self {
        FilterOptions {
            as_path: as_path.into(),
            direction: Direction::ToWorktree,
            check_for_binary: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn check_for_binary(mut self, check: bool) -> Self {
        self.check_for_binary = check;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AutoCrlf {
    True,
    Input,
    False,
}

fn autocrlf(repo: &Repository) -> AutoCrlf {
    let value = repo
        .config()
        .and_then(|config| config.get_string("core.autocrlf"))
        .ok();
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("true") | Some("yes") | Some("on") | Some("1") => AutoCrlf::True,
        Some("input") => AutoCrlf::Input,
        _ => AutoCrlf::False,
    }
}

/// Whether the EOL filter applies to `blob` when checked out as `options.as_path`.
fn wants_conversion(
    repo: &Repository,
    blob: &Blob<'_>,
    options: &FilterOptions,
) -> Result<bool, Error> {
    if options.check_for_binary && blob.is_binary() {
        return Ok(false);
    }

    let flags = AttrCheckFlags::FILE_THEN_INDEX;
    let text = AttrValue::from_string(repo.get_attr(&options.as_path, "text", flags)?);
    if matches!(text, AttrValue::False) {
        return Ok(false);
    }
    let eol = repo.get_attr(&options.as_path, "eol", flags)?;
    let explicit_text = !matches!(text, AttrValue::Unspecified) || eol.is_some();
    let autocrlf = autocrlf(repo);

    Ok(match options.direction {
        Direction::ToOdb => explicit_text || autocrlf != AutoCrlf::False,
        Direction::ToWorktree => match eol {
            Some("crlf") => true,
            Some("lf") => false,
            _ => autocrlf == AutoCrlf::True,
        },
    })
}

/// Open a stream of blob `oid` filtered for `options.as_path`.
///
/// The repository is reopened on the worker thread, so the caller keeps
/// no borrow on it.
pub fn open_blob_stream(
    repo_path: &Path,
    oid: Oid,
    options: FilterOptions,
) -> Result<FilterStream, Error> {
    let repo_path = repo_path.to_path_buf();
    FilterStream::spawn(options.chunk_size, move |sink| {
        let repo = Repository::open(&repo_path)?;
        let blob = repo.find_blob(oid)?;

        if !wants_conversion(&repo, &blob, &options)? {
            tracing::debug!(%oid, path = %options.as_path.display(), "streaming blob unfiltered");
            sink.write_all(blob.content())?;
            return Ok(());
        }

        tracing::debug!(
            %oid,
            path = %options.as_path.display(),
            direction = ?options.direction,
            "streaming blob through eol filter"
        );
        let mut converter = EolConverter::new(options.direction);
        let mut out = Vec::with_capacity(sink.chunk_size() + sink.chunk_size() / 8);
        for piece in blob.content().chunks(sink.chunk_size()) {
            out.clear();
            converter.convert(piece, &mut out);
            sink.write_all(&out)?;
        }
        out.clear();
        converter.finish(&mut out);
        sink.write_all(&out)?;
        Ok(())
    })
}
