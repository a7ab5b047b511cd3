use std::path::{Path, PathBuf};

use crate::consts::{SYSROOT_ENV, UDEV_RULES_FILE};

/// Locations of the system files a Hive install touches.
///
/// Paths come in two flavours. *Target* paths are what the provisioned
/// system sees (`/home/hive`, `/etc/fstab`) and are what gets written into
/// configuration files. *Host* paths are where this process reads and writes,
/// i.e. the target path below the sysroot. With the default sysroot `/` both
/// are the same; pointing `HIVE_SETUP_SYSROOT` at a mounted image or a scratch
/// directory redirects every file edit there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPaths {
  sysroot: PathBuf,
}

impl Default for SystemPaths {
  fn default() -> Self {
    Self::new("/")
  }
}

impl SystemPaths {
  pub fn new(sysroot: impl Into<PathBuf>) -> Self {
    Self {
      sysroot: sysroot.into(),
    }
  }

  /// Use `HIVE_SETUP_SYSROOT` if set and non-empty, `/` otherwise.
  pub fn from_env() -> Self {
    match std::env::var(SYSROOT_ENV) {
      Ok(root) if !root.is_empty() => Self::new(root),
      _ => Self::default(),
    }
  }

  pub fn sysroot(&self) -> &Path {
    &self.sysroot
  }

  /// Map a target path to the path this process should access.
  pub fn host(&self, target: impl AsRef<Path>) -> PathBuf {
    let target = target.as_ref();
    self.sysroot.join(target.strip_prefix("/").unwrap_or(target))
  }

  /// Home directory of `user` on the target, which is also where the monitor is installed.
  pub fn install_dir(&self, user: &str) -> PathBuf {
    PathBuf::from("/home").join(user)
  }

  /// Firmware configuration file.
  ///
  /// Newer Raspberry Pi OS releases keep it in `/boot/firmware`; that
  /// location wins when it exists.
  pub fn boot_config(&self) -> PathBuf {
    let firmware = self.host("/boot/firmware/config.txt");
    if firmware.exists() {
      firmware
    } else {
      self.host("/boot/config.txt")
    }
  }

  pub fn fstab(&self) -> PathBuf {
    self.host("/etc/fstab")
  }

  pub fn journald_conf(&self) -> PathBuf {
    self.host("/etc/systemd/journald.conf")
  }

  pub fn unit_file(&self, service: &str) -> PathBuf {
    self.host(format!("/etc/systemd/system/{service}.service"))
  }

  pub fn udev_rules(&self) -> PathBuf {
    self.host("/etc/udev/rules.d").join(UDEV_RULES_FILE)
  }
}
