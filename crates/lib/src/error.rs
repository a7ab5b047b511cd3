//! Error type returned by provisioning steps.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::edit::EditError;
use crate::host::HostError;
use crate::release::ReleaseError;

/// Any failure that aborts a provisioning run.
#[derive(Debug, Error)]
pub enum ProvisionError {
  #[error(transparent)]
  Host(#[from] HostError),

  #[error(transparent)]
  Edit(#[from] EditError),

  #[error(transparent)]
  Release(#[from] ReleaseError),

  #[error("failed to {action} {}: {source}", path.display())]
  Io {
    action: &'static str,
    path: PathBuf,
    source: io::Error,
  },
}

/// Coarse classification of a [`ProvisionError`], for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  OsCommand,
  FileIo,
  MalformedBlock,
  Network,
  VersionParse,
  Archive,
  UnknownGroup,
}

impl ProvisionError {
  pub fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
    ProvisionError::Io {
      action,
      path: path.into(),
      source,
    }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      ProvisionError::Host(HostError::UnknownGroup { .. } | HostError::GroupLookup { .. }) => ErrorKind::UnknownGroup,
      ProvisionError::Host(_) => ErrorKind::OsCommand,
      ProvisionError::Edit(EditError::Malformed { .. }) => ErrorKind::MalformedBlock,
      ProvisionError::Edit(_) | ProvisionError::Io { .. } => ErrorKind::FileIo,
      ProvisionError::Release(e) => e.kind(),
    }
  }
}
