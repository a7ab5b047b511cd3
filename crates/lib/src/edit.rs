//! Scoped read-modify-write access to a single configuration file.
//!
//! A [`FileEditSession`] holds the open file for the duration of one edit.
//! The new content is always computed in memory first and then written to a
//! temporary file next to the target, which is renamed over the original. A
//! failure at any point before the rename leaves the original file untouched.
//! Symlinks are followed, so the file they point at is the one replaced.
//!
//! Managed files are edited as UTF-8 text. A file containing other bytes is
//! rejected with [`EditError::NotUtf8`] and left as it is.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::block::{self, BlockAction, BlockEdit, BlockError, BlockMarkers};

/// Errors that can occur while editing a file.
#[derive(Debug, Error)]
pub enum EditError {
  #[error("failed to open {}: {source}", path.display())]
  Open { path: PathBuf, source: io::Error },

  #[error("failed to read {}: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },

  #[error("{} is not valid UTF-8 text (invalid byte at offset {offset})", path.display())]
  NotUtf8 { path: PathBuf, offset: usize },

  #[error("failed to write {}: {source}", path.display())]
  Write { path: PathBuf, source: io::Error },

  #[error("managed block in {} is malformed: {source}", path.display())]
  Malformed { path: PathBuf, source: BlockError },
}

/// An open configuration file and the content it had when it was opened.
#[derive(Debug)]
pub struct FileEditSession {
  path: PathBuf,
  /// `path` with symlinks resolved; this is what gets replaced.
  target: PathBuf,
  file: File,
  original: String,
}

impl FileEditSession {
  /// Open `path` for reading and writing and load its full content.
  ///
  /// The file must already exist.
  pub fn open(path: &Path) -> Result<Self, EditError> {
    let open_err = |source| EditError::Open {
      path: path.to_path_buf(),
      source,
    };

    let target = fs::canonicalize(path).map_err(open_err)?;
    let mut file = OpenOptions::new().read(true).write(true).open(&target).map_err(open_err)?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|source| EditError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let original = String::from_utf8(bytes).map_err(|e| EditError::NotUtf8 {
      path: path.to_path_buf(),
      offset: e.utf8_error().valid_up_to(),
    })?;

    if target != path {
      debug!(path = %path.display(), target = %target.display(), "resolved link");
    }
    debug!(path = %path.display(), bytes = original.len(), "opened file for editing");

    Ok(Self {
      path: path.to_path_buf(),
      target,
      file,
      original,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Content of the file as it was read when the session was opened.
  pub fn content(&self) -> &str {
    &self.original
  }

  /// Put `body` into the managed block delimited by `markers` and write the result.
  pub fn apply_block(self, markers: &BlockMarkers, body: &[String]) -> Result<BlockEdit, EditError> {
    let edit = block::apply_block(&self.original, markers, body).map_err(|source| EditError::Malformed {
      path: self.path.clone(),
      source,
    })?;

    info!(path = %self.path.display(), action = %edit.action, "managed block");

    if edit.action != BlockAction::Unchanged {
      self.commit(&edit.content)?;
    }
    Ok(edit)
  }

  /// Rewrite individual lines (see [`block::rewrite_lines`]) and write the result.
  ///
  /// Returns the number of replaced lines.
  pub fn rewrite_lines<F>(self, rewrite: F) -> Result<usize, EditError>
  where
    F: FnMut(&str) -> Option<String>,
  {
    let (content, replaced) = block::rewrite_lines(&self.original, rewrite);
    self.commit(&content)?;
    Ok(replaced)
  }

  /// Replace the file content with `content`.
  ///
  /// Returns `false` without touching the file when the content is unchanged.
  pub fn commit(self, content: &str) -> Result<bool, EditError> {
    if content == self.original {
      debug!(path = %self.path.display(), "content unchanged, not writing");
      return Ok(false);
    }

    let metadata = self.file.metadata().map_err(|source| EditError::Read {
      path: self.path.clone(),
      source,
    })?;

    replace_file(&self.target, content.as_bytes(), Some(&metadata))?;
    Ok(true)
  }
}

/// Write `content` to `path`, creating the file if needed.
///
/// Used for files this tool owns completely (unit files, udev rules). An
/// existing file keeps its permissions; a new one gets `mode` on Unix.
/// Returns `false` when the file already had exactly this content.
pub fn overwrite(path: &Path, content: &str, mode: u32) -> Result<bool, EditError> {
  match FileEditSession::open(path) {
    Ok(session) => session.commit(content),
    Err(EditError::Open { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
      replace_file(path, content.as_bytes(), None)?;
      set_mode(path, mode)?;
      info!(path = %path.display(), "created file");
      Ok(true)
    }
    Err(e) => Err(e),
  }
}

fn replace_file(path: &Path, content: &[u8], metadata: Option<&fs::Metadata>) -> Result<(), EditError> {
  let write_err = |source| EditError::Write {
    path: path.to_path_buf(),
    source,
  };

  let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
  let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;

  temp.write_all(content).map_err(write_err)?;
  temp.flush().map_err(write_err)?;

  if let Some(metadata) = metadata {
    fs::set_permissions(temp.path(), metadata.permissions()).map_err(write_err)?;
    copy_owner(temp.as_file(), metadata).map_err(write_err)?;
  }

  temp.as_file().sync_all().map_err(write_err)?;
  temp.persist(path).map_err(|e| write_err(e.error))?;

  debug!(path = %path.display(), bytes = content.len(), "wrote file");
  Ok(())
}

#[cfg(unix)]
fn copy_owner(file: &File, metadata: &fs::Metadata) -> io::Result<()> {
  use std::os::unix::fs::MetadataExt;

  std::os::unix::fs::fchown(file, Some(metadata.uid()), Some(metadata.gid()))
}

#[cfg(not(unix))]
fn copy_owner(_file: &File, _metadata: &fs::Metadata) -> io::Result<()> {
  Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), EditError> {
  use std::os::unix::fs::PermissionsExt;

  fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|source| EditError::Write {
    path: path.to_path_buf(),
    source,
  })
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), EditError> {
  Ok(())
}
