//! Monitor releases: version discovery, download and archive extraction.
//!
//! The newest version is discovered by requesting `<releases>/latest`, which
//! redirects to `<releases>/tag/v<version>`; the version is read from the
//! final URL. Release archives are gzip-compressed tarballs containing the
//! `monitor` binary and the `data/` tree it serves.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use semver::Version;
use tar::Archive;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ReleaseConfig;
use crate::consts::{APP_NAME, MONITOR_ARCHIVE, MONITOR_BINARY, STATIC_ASSETS_DIR};
use crate::error::ErrorKind;
use crate::host::{Host, HostError};

#[derive(Debug, Error)]
pub enum ReleaseError {
  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("request to {url} failed: {source}")]
  Request {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("request to {url} returned HTTP {status}")]
  Status { url: String, status: u16 },

  #[error("could not parse version from '{input}': {reason}")]
  VersionParse { input: String, reason: String },

  #[error(
    "no monitor installation found at {}. Install the Hive testserver first using the 'install' subcommand",
    path.display()
  )]
  NotInstalled { path: PathBuf },

  #[error("failed to query installed monitor version: {0}")]
  Installed(#[source] HostError),

  #[error("failed to extract {}: {source}", path.display())]
  Archive {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl ReleaseError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      ReleaseError::Client(_) | ReleaseError::Request { .. } | ReleaseError::Status { .. } => ErrorKind::Network,
      ReleaseError::VersionParse { .. } => ErrorKind::VersionParse,
      ReleaseError::NotInstalled { .. } | ReleaseError::Installed(_) => ErrorKind::OsCommand,
      ReleaseError::Archive { .. } => ErrorKind::Archive,
      ReleaseError::Write { .. } => ErrorKind::FileIo,
    }
  }
}

/// Which parts of a release archive to unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
  /// Everything in the archive.
  Full,
  /// Only the monitor binary and the static web assets; the old static
  /// assets are replaced once the archive has been unpacked.
  Update,
}

/// Blocking HTTP client for the release feed.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
  client: Client,
  config: ReleaseConfig,
}

impl ReleaseClient {
  pub fn new(config: ReleaseConfig) -> Result<Self, ReleaseError> {
    let client = Client::builder()
      .connect_timeout(config.timeout)
      .user_agent(concat!("hive-setup/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(ReleaseError::Client)?;

    debug!(
      app = APP_NAME,
      base_url = %config.base_url,
      timeout = ?config.timeout,
      download_timeout = ?config.download_timeout,
      "release client ready"
    );
    Ok(Self { client, config })
  }

  pub fn config(&self) -> &ReleaseConfig {
    &self.config
  }

  /// Ask the release feed for the newest published version.
  pub fn latest_version(&self) -> Result<Version, ReleaseError> {
    let url = self.config.latest_url();
    info!(url = %url, "checking latest version");

    let response = self
      .client
      .get(&url)
      .timeout(self.config.timeout)
      .send()
      .map_err(|source| ReleaseError::Request {
        url: url.clone(),
        source,
      })?;

    if !response.status().is_success() {
      return Err(ReleaseError::Status {
        url,
        status: response.status().as_u16(),
      });
    }

    let version = version_from_release_url(response.url().as_str())?;
    info!(version = %version, "latest version");
    Ok(version)
  }

  /// Download the archive for `version` into `dir`, returning the archive path.
  pub fn download(&self, version: &Version, dir: &Path) -> Result<PathBuf, ReleaseError> {
    let url = self.config.download_url(version);
    info!(url = %url, "downloading monitor");

    let request_err = |source| ReleaseError::Request {
      url: url.clone(),
      source,
    };

    let response = self
      .client
      .get(&url)
      .timeout(self.config.download_timeout)
      .send()
      .map_err(request_err)?;
    if !response.status().is_success() {
      return Err(ReleaseError::Status {
        url: url.clone(),
        status: response.status().as_u16(),
      });
    }
    let bytes = response.bytes().map_err(request_err)?;

    let dest = dir.join(MONITOR_ARCHIVE);
    fs::write(&dest, &bytes).map_err(|source| ReleaseError::Write {
      path: dest.clone(),
      source,
    })?;

    info!(path = %dest.display(), size = bytes.len(), "download complete");
    Ok(dest)
  }
}

/// Extract the version from a release tag URL such as `.../releases/tag/v0.3.0`.
pub fn version_from_release_url(url: &str) -> Result<Version, ReleaseError> {
  let segment = url
    .split(['?', '#'])
    .next()
    .unwrap_or(url)
    .trim_end_matches('/')
    .rsplit('/')
    .next()
    .unwrap_or_default();

  let tag = segment.strip_prefix('v').unwrap_or(segment);
  Version::parse(tag).map_err(|e| ReleaseError::VersionParse {
    input: url.to_string(),
    reason: e.to_string(),
  })
}

/// Parse the output of `monitor --version`, which is `<name> <version>`.
pub fn parse_installed_version(output: &str) -> Result<Version, ReleaseError> {
  let parts: Vec<&str> = output.split_whitespace().collect();
  let [_, version] = parts[..] else {
    return Err(ReleaseError::VersionParse {
      input: output.to_string(),
      reason: "expected '<name> <version>'".to_string(),
    });
  };

  let version = version.strip_prefix('v').unwrap_or(version);
  Version::parse(version).map_err(|e| ReleaseError::VersionParse {
    input: output.to_string(),
    reason: e.to_string(),
  })
}

/// Run the installed monitor binary at `binary` (a host path) to learn its version.
pub fn installed_version(host: &dyn Host, binary: &Path) -> Result<Version, ReleaseError> {
  if !binary.exists() {
    return Err(ReleaseError::NotInstalled {
      path: binary.to_path_buf(),
    });
  }

  let output = host
    .run(&binary.to_string_lossy(), &["--version"])
    .map_err(|e| match e {
      HostError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound => ReleaseError::NotInstalled {
        path: binary.to_path_buf(),
      },
      other => ReleaseError::Installed(other),
    })?;

  parse_installed_version(&output)
}

/// Unpack a release archive into `dest`.
///
/// Returns the number of entries written. Entries that would land outside
/// `dest` are skipped. In update mode the archive is unpacked into a staging
/// directory inside `dest` first, so a broken archive leaves the installed
/// binary and static assets in place.
pub fn extract_archive(archive_path: &Path, dest: &Path, mode: ExtractMode) -> Result<usize, ReleaseError> {
  match mode {
    ExtractMode::Full => unpack(archive_path, dest, mode),
    ExtractMode::Update => {
      let archive_err = |source| ReleaseError::Archive {
        path: archive_path.to_path_buf(),
        source,
      };

      let staging = tempfile::Builder::new()
        .prefix(".hive-update")
        .tempdir_in(dest)
        .map_err(archive_err)?;
      let written = unpack(archive_path, staging.path(), mode)?;

      swap_in(staging.path(), dest).map_err(archive_err)?;
      Ok(written)
    }
  }
}

/// Move the staged binary and static assets over the installed ones.
fn swap_in(staging: &Path, dest: &Path) -> io::Result<()> {
  let static_dir = dest.join(STATIC_ASSETS_DIR);
  match fs::remove_dir_all(&static_dir) {
    Ok(()) => debug!(path = %static_dir.display(), "removed old static assets"),
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(e),
  }

  let staged_static = staging.join(STATIC_ASSETS_DIR);
  if staged_static.is_dir() {
    if let Some(parent) = static_dir.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::rename(&staged_static, &static_dir)?;
  }

  let staged_binary = staging.join(MONITOR_BINARY);
  if staged_binary.is_file() {
    fs::rename(&staged_binary, dest.join(MONITOR_BINARY))?;
  }
  Ok(())
}

fn unpack(archive_path: &Path, dest: &Path, mode: ExtractMode) -> Result<usize, ReleaseError> {
  let archive_err = |source| ReleaseError::Archive {
    path: archive_path.to_path_buf(),
    source,
  };

  let file = File::open(archive_path).map_err(archive_err)?;
  let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
  archive.set_preserve_permissions(true);

  let mut written = 0;
  for entry in archive.entries().map_err(archive_err)? {
    let mut entry = entry.map_err(archive_err)?;
    let path = normalize_entry_path(&entry.path().map_err(archive_err)?);

    if path.as_os_str().is_empty() || !wanted(&path, mode) {
      continue;
    }

    if entry.unpack_in(dest).map_err(archive_err)? {
      written += 1;
    } else {
      debug!(entry = %path.display(), "skipped entry outside destination");
    }
  }

  info!(archive = %archive_path.display(), dest = %dest.display(), entries = written, ?mode, "extracted archive");
  Ok(written)
}

/// Drop leading `./` components so `./monitor` and `monitor` compare equal.
fn normalize_entry_path(path: &Path) -> PathBuf {
  path.components().filter(|c| !matches!(c, Component::CurDir)).collect()
}

fn wanted(path: &Path, mode: ExtractMode) -> bool {
  match mode {
    ExtractMode::Full => true,
    ExtractMode::Update => path == Path::new(MONITOR_BINARY) || path.starts_with(STATIC_ASSETS_DIR),
  }
}
