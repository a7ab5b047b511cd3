//! The provisioning steps and the sequences built from them.
//!
//! Each step function is idempotent: it either converges the system to the
//! desired state or fails without leaving a half-written file behind. The
//! sequence builders only decide order; every decision about what to do
//! comes from the [`SetupConfig`] or [`AutostartConfig`] passed in.

pub mod templates;

use std::fs;
use std::path::Path;

use semver::Version;
use tracing::{debug, info, warn};

use crate::block;
use crate::config::{AutostartConfig, InstallMode, SetupConfig};
use crate::consts::{BOOT_CONFIG_MAX_LINES, HIVE_USER_EXTRA_GROUPS, MONITOR_BINARY};
use crate::edit::{self, FileEditSession};
use crate::error::ProvisionError;
use crate::host::{self, Host};
use crate::release::{self, ExtractMode, ReleaseClient};
use crate::sequence::Sequencer;

use templates::TMPFS_MOUNTS;

/// Replacement for any `Storage=` line in the journald configuration.
pub const JOURNAL_STORAGE: &str = "Storage=volatile";

/// Steps for `install` ([`InstallMode::Create`]) and `update` ([`InstallMode::Update`]).
pub fn setup_sequence<'a>(config: &'a SetupConfig, host: &'a dyn Host, client: &'a ReleaseClient) -> Sequencer<'a> {
  Sequencer::new()
    .step("group", move || setup_group(config, host))
    .step("hive user", move || setup_hive_user(config, host))
    .step("runner user", move || setup_runner_user(config, host))
    .step("monitor", move || setup_monitor(config, host, client))
    .step("hardware", move || setup_hardware(host))
    .step("boot config", move || setup_boot_config(config))
    .step("journald", move || setup_journald(config))
    .step("bubblewrap", move || setup_bubblewrap(host))
    .step("debug probe permissions", move || setup_debug_probe_permissions(config, host))
    .step("storage", move || setup_storage(config, host))
}

/// Steps for `autostart`.
pub fn autostart_sequence<'a>(config: &'a AutostartConfig, host: &'a dyn Host) -> Sequencer<'a> {
  Sequencer::new()
    .step("unit file", move || write_unit_file(config))
    .step("daemon reload", move || Ok(host::systemctl(host, &["daemon-reload"])?))
    .step("enable service", move || Ok(host::systemctl(host, &["enable", &config.service])?))
    .step("start service", move || Ok(host::systemctl(host, &["start", &config.service])?))
}

pub fn setup_group(config: &SetupConfig, host: &dyn Host) -> Result<(), ProvisionError> {
  match config.mode {
    InstallMode::Create => {
      host::create_group(host, &config.hive_group)?;
      info!(group = %config.hive_group, "created group");
    }
    InstallMode::Update => debug!(group = %config.hive_group, "keeping existing group"),
  }
  Ok(())
}

/// Create the hive user (create mode) and put it into the hive, `plugdev` and `i2c` groups.
pub fn setup_hive_user(config: &SetupConfig, host: &dyn Host) -> Result<(), ProvisionError> {
  if config.mode == InstallMode::Create {
    let home = config.install_dir();
    host::create_system_user(host, &config.hive_user, &home.to_string_lossy())?;
    info!(user = %config.hive_user, home = %home.display(), "created hive user");
  }

  let mut groups = vec![config.hive_group.as_str()];
  groups.extend_from_slice(HIVE_USER_EXTRA_GROUPS);
  host::set_supplementary_groups(host, &config.hive_user, &groups)?;
  Ok(())
}

/// Create the unprivileged account test binaries run as.
pub fn setup_runner_user(config: &SetupConfig, host: &dyn Host) -> Result<(), ProvisionError> {
  if config.mode == InstallMode::Create {
    host::create_sandbox_user(host, &config.runner_user)?;
    info!(user = %config.runner_user, "created runner user");
  }
  Ok(())
}

/// Download the newest monitor release and unpack it into the install directory.
pub fn setup_monitor(config: &SetupConfig, host: &dyn Host, client: &ReleaseClient) -> Result<(), ProvisionError> {
  let install_dir = config.paths.host(config.install_dir());
  fs::create_dir_all(&install_dir).map_err(|e| ProvisionError::io("create", &install_dir, e))?;

  let version = client.latest_version()?;
  let archive = client.download(&version, &install_dir)?;

  let mode = match config.mode {
    InstallMode::Create => ExtractMode::Full,
    InstallMode::Update => ExtractMode::Update,
  };
  let extracted = release::extract_archive(&archive, &install_dir, mode);

  if let Err(e) = fs::remove_file(&archive) {
    warn!(path = %archive.display(), error = %e, "failed to remove downloaded archive");
  }
  extracted?;

  host::chown_recursive(
    host,
    &config.hive_user,
    &config.hive_group,
    &install_dir.to_string_lossy(),
  )?;
  info!(version = %version, dir = %install_dir.display(), "monitor installed");
  Ok(())
}

/// Enable the serial hardware (without a login console) and the I2C bus.
pub fn setup_hardware(host: &dyn Host) -> Result<(), ProvisionError> {
  host::raspi_config(host, "do_serial", "2")?;
  host::raspi_config(host, "do_i2c", "0")?;
  Ok(())
}

pub fn setup_boot_config(config: &SetupConfig) -> Result<(), ProvisionError> {
  let path = config.paths.boot_config();
  let edit = FileEditSession::open(&path)?.apply_block(&config.markers, &templates::boot_config_body())?;

  let lines = edit.content.lines().count();
  if lines > BOOT_CONFIG_MAX_LINES {
    warn!(
      path = %path.display(),
      lines,
      limit = BOOT_CONFIG_MAX_LINES,
      "boot config is longer than the firmware reads; settings past the limit may be ignored"
    );
  }
  Ok(())
}

/// Keep the journal in RAM to spare the SD card.
pub fn setup_journald(config: &SetupConfig) -> Result<(), ProvisionError> {
  let path = config.paths.journald_conf();
  let session = FileEditSession::open(&path)?;
  let content = volatile_journal(session.content());
  if session.commit(&content)? {
    info!(path = %path.display(), "journal storage set to volatile");
  }
  Ok(())
}

/// Point every (possibly commented out) `Storage=` setting at volatile storage.
///
/// Without such a line the setting is added right after the `[Journal]`
/// section header, or at the end when there is no header either.
pub fn volatile_journal(content: &str) -> String {
  let (rewritten, replaced) = block::rewrite_lines(content, |line| {
    (line.starts_with("Storage=") || line.starts_with("#Storage=")).then(|| JOURNAL_STORAGE.to_string())
  });
  if replaced > 0 {
    return rewritten;
  }

  let mut out = String::with_capacity(content.len() + JOURNAL_STORAGE.len() + 1);
  let mut inserted = false;
  for line in content.split_inclusive('\n') {
    out.push_str(line);
    if !inserted && line.trim() == "[Journal]" {
      if !line.ends_with('\n') {
        out.push('\n');
      }
      out.push_str(JOURNAL_STORAGE);
      out.push('\n');
      inserted = true;
    }
  }

  if !inserted {
    if !out.is_empty() && !out.ends_with('\n') {
      out.push('\n');
    }
    out.push_str(JOURNAL_STORAGE);
    out.push('\n');
  }
  out
}

/// Install the sandbox the monitor runs test binaries in.
pub fn setup_bubblewrap(host: &dyn Host) -> Result<(), ProvisionError> {
  host::install_package(host, "bubblewrap")?;
  Ok(())
}

pub fn setup_debug_probe_permissions(config: &SetupConfig, host: &dyn Host) -> Result<(), ProvisionError> {
  let path = config.paths.udev_rules();
  ensure_parent(&path)?;
  if edit::overwrite(&path, templates::UDEV_RULES, 0o644)? {
    info!(path = %path.display(), "debug probe rules written");
  }
  host::reload_udev(host)?;
  Ok(())
}

/// Mount the monitor's scratch directories as tmpfs owned by the hive group.
pub fn setup_storage(config: &SetupConfig, host: &dyn Host) -> Result<(), ProvisionError> {
  let gid = host.group_id(&config.hive_group)?;
  let install_dir = config.install_dir();

  for mount in &TMPFS_MOUNTS {
    let dir = config.paths.host(install_dir.join(mount.dir));
    fs::create_dir_all(&dir).map_err(|e| ProvisionError::io("create", &dir, e))?;
  }

  let body = templates::fstab_body(&install_dir, gid);
  FileEditSession::open(&config.paths.fstab())?.apply_block(&config.markers, &body)?;
  Ok(())
}

pub fn write_unit_file(config: &AutostartConfig) -> Result<(), ProvisionError> {
  let path = config.paths.unit_file(&config.service);
  ensure_parent(&path)?;
  if edit::overwrite(&path, &templates::service_unit(config), 0o644)? {
    info!(path = %path.display(), "unit file written");
  }
  Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), ProvisionError> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(|e| ProvisionError::io("create", parent, e))?;
  }
  Ok(())
}

/// Installed and newest available monitor versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheck {
  pub installed: Version,
  pub latest: Version,
}

impl UpdateCheck {
  pub fn is_needed(&self) -> bool {
    self.installed < self.latest
  }
}

/// Compare the installed monitor against the newest release.
pub fn check_for_update(
  config: &SetupConfig,
  host: &dyn Host,
  client: &ReleaseClient,
) -> Result<UpdateCheck, ProvisionError> {
  let binary = config.paths.host(config.install_dir().join(MONITOR_BINARY));
  let installed = release::installed_version(host, &binary)?;
  let latest = client.latest_version()?;

  let check = UpdateCheck { installed, latest };
  info!(installed = %check.installed, latest = %check.latest, needed = check.is_needed(), "update check");
  Ok(check)
}
