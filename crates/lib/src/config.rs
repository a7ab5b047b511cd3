//! Immutable parameters for a provisioning run.
//!
//! The CLI collects every value (from flags or prompts) into one of these
//! structs before any step runs. Steps only read from them.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::block::BlockMarkers;
use crate::consts::{DOWNLOAD_TIMEOUT, MONITOR_ARCHIVE, NETWORK_TIMEOUT, RELEASE_URL_ENV, RELEASES_URL, SERVICE_NAME};
use crate::platform::paths::SystemPaths;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("invalid {what} name '{name}': {reason}")]
  InvalidName {
    what: &'static str,
    name: String,
    reason: &'static str,
  },

  #[error("{what} path '{}' does not exist", path.display())]
  MissingPath { what: &'static str, path: PathBuf },
}

/// Whether accounts and files are created from scratch or an existing install is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
  Create,
  Update,
}

/// Where releases are fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseConfig {
  /// Base of the releases page, e.g. `https://github.com/<org>/<repo>/releases`.
  pub base_url: String,
  /// Connect timeout, and total timeout for the version lookup.
  pub timeout: Duration,
  /// Total timeout for downloading the release archive.
  pub download_timeout: Duration,
}

impl Default for ReleaseConfig {
  fn default() -> Self {
    Self {
      base_url: RELEASES_URL.to_string(),
      timeout: NETWORK_TIMEOUT,
      download_timeout: DOWNLOAD_TIMEOUT,
    }
  }
}

impl ReleaseConfig {
  /// Defaults, with the base URL taken from `HIVE_SETUP_RELEASE_URL` when set.
  pub fn from_env() -> Self {
    match std::env::var(RELEASE_URL_ENV) {
      Ok(url) if !url.is_empty() => Self {
        base_url: url,
        ..Self::default()
      },
      _ => Self::default(),
    }
  }

  /// URL that redirects to the newest release's tag page.
  pub fn latest_url(&self) -> String {
    format!("{}/latest", self.base_url.trim_end_matches('/'))
  }

  pub fn download_url(&self, version: &semver::Version) -> String {
    format!(
      "{}/download/v{}/{}",
      self.base_url.trim_end_matches('/'),
      version,
      MONITOR_ARCHIVE
    )
  }
}

/// Parameters for `install` and `update`.
#[derive(Debug, Clone)]
pub struct SetupConfig {
  pub hive_user: String,
  pub hive_group: String,
  pub runner_user: String,
  pub mode: InstallMode,
  pub markers: BlockMarkers,
  pub paths: SystemPaths,
  pub release: ReleaseConfig,
}

impl SetupConfig {
  /// Build a config with default markers, paths from the environment and validated names.
  pub fn new(
    hive_user: impl Into<String>,
    hive_group: impl Into<String>,
    runner_user: impl Into<String>,
    mode: InstallMode,
  ) -> Result<Self, ConfigError> {
    let config = Self {
      hive_user: hive_user.into(),
      hive_group: hive_group.into(),
      runner_user: runner_user.into(),
      mode,
      markers: BlockMarkers::hive(),
      paths: SystemPaths::from_env(),
      release: ReleaseConfig::from_env(),
    };

    validate_name("user", &config.hive_user)?;
    validate_name("group", &config.hive_group)?;
    validate_name("runner user", &config.runner_user)?;
    if config.hive_user == config.runner_user {
      return Err(ConfigError::InvalidName {
        what: "runner user",
        name: config.runner_user,
        reason: "must differ from the hive user",
      });
    }

    Ok(config)
  }

  pub fn with_paths(mut self, paths: SystemPaths) -> Self {
    self.paths = paths;
    self
  }

  pub fn with_release(mut self, release: ReleaseConfig) -> Self {
    self.release = release;
    self
  }

  /// Target path of the install directory.
  pub fn install_dir(&self) -> PathBuf {
    self.paths.install_dir(&self.hive_user)
  }
}

/// Parameters for `autostart`.
#[derive(Debug, Clone)]
pub struct AutostartConfig {
  pub hive_user: String,
  pub arm_toolchain: PathBuf,
  pub riscv_toolchain: PathBuf,
  pub service: String,
  pub paths: SystemPaths,
}

impl AutostartConfig {
  /// Toolchain paths must be absolute and exist on the target.
  pub fn new(
    hive_user: impl Into<String>,
    arm_toolchain: impl Into<PathBuf>,
    riscv_toolchain: impl Into<PathBuf>,
    paths: SystemPaths,
  ) -> Result<Self, ConfigError> {
    let config = Self {
      hive_user: hive_user.into(),
      arm_toolchain: arm_toolchain.into(),
      riscv_toolchain: riscv_toolchain.into(),
      service: SERVICE_NAME.to_string(),
      paths,
    };

    validate_name("user", &config.hive_user)?;
    for (what, path) in [
      ("ARM toolchain", &config.arm_toolchain),
      ("RISC-V toolchain", &config.riscv_toolchain),
    ] {
      if !path.is_absolute() || !config.paths.host(path).exists() {
        return Err(ConfigError::MissingPath {
          what,
          path: path.clone(),
        });
      }
    }

    Ok(config)
  }

  pub fn install_dir(&self) -> PathBuf {
    self.paths.install_dir(&self.hive_user)
  }
}

/// Check a user or group name against the rules `adduser` enforces by default.
pub fn validate_name(what: &'static str, name: &str) -> Result<(), ConfigError> {
  let invalid = |reason| ConfigError::InvalidName {
    what,
    name: name.to_string(),
    reason,
  };

  let Some(first) = name.chars().next() else {
    return Err(invalid("must not be empty"));
  };
  if name.len() > 32 {
    return Err(invalid("must be at most 32 characters"));
  }
  if !(first.is_ascii_lowercase() || first == '_') {
    return Err(invalid("must start with a lowercase letter or underscore"));
  }
  if !name
    .chars()
    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
  {
    return Err(invalid("may only contain lowercase letters, digits, '_' and '-'"));
  }
  Ok(())
}
