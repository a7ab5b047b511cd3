//! Host operating system collaborators.
//!
//! Everything that shells out to system utilities (`groupadd`, `adduser`,
//! `raspi-config`, `udevadm`, `systemctl`, ...) goes through the [`Host`]
//! trait so provisioning steps can be exercised against a recording double.

use std::io;
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

/// Errors from running host commands or querying the group database.
#[derive(Debug, Error)]
pub enum HostError {
  /// The program could not be started at all.
  #[error("failed to run `{cmd}`: {source}")]
  Spawn { cmd: String, source: io::Error },

  /// The program ran and exited unsuccessfully.
  #[error("`{cmd}` failed with exit code {code:?}: {stderr}")]
  CommandFailed {
    cmd: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("group '{group}' does not exist")]
  UnknownGroup { group: String },

  #[error("failed to look up group '{group}': {message}")]
  GroupLookup { group: String, message: String },
}

/// Access to the machine being provisioned.
pub trait Host {
  /// Run `program` with `args` and return its trimmed stdout.
  fn run(&self, program: &str, args: &[&str]) -> Result<String, HostError>;

  /// Resolve a group name to its numeric id.
  fn group_id(&self, group: &str) -> Result<u32, HostError>;
}

/// The real machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl Host for SystemHost {
  fn run(&self, program: &str, args: &[&str]) -> Result<String, HostError> {
    let cmd = command_line(program, args);
    info!(cmd = %cmd, "executing command");

    let output = Command::new(program)
      .args(args)
      .output()
      .map_err(|source| HostError::Spawn { cmd: cmd.clone(), source })?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
      if !stdout.is_empty() {
        debug!(stdout = %stdout, "command stdout");
      }
      return Err(HostError::CommandFailed {
        cmd,
        code: output.status.code(),
        stderr,
      });
    }

    if !stdout.is_empty() {
      debug!(stdout = %stdout, "command output");
    }

    Ok(stdout)
  }

  #[cfg(unix)]
  fn group_id(&self, group: &str) -> Result<u32, HostError> {
    use nix::unistd::Group;

    match Group::from_name(group) {
      Ok(Some(entry)) => Ok(entry.gid.as_raw()),
      Ok(None) => Err(HostError::UnknownGroup {
        group: group.to_string(),
      }),
      Err(e) => Err(HostError::GroupLookup {
        group: group.to_string(),
        message: e.to_string(),
      }),
    }
  }

  #[cfg(not(unix))]
  fn group_id(&self, group: &str) -> Result<u32, HostError> {
    Err(HostError::GroupLookup {
      group: group.to_string(),
      message: "group database is only available on Unix".to_string(),
    })
  }
}

/// Render a command the way a user would type it, for logs and errors.
pub fn command_line(program: &str, args: &[&str]) -> String {
  std::iter::once(program).chain(args.iter().copied()).collect::<Vec<_>>().join(" ")
}

pub fn create_group(host: &dyn Host, group: &str) -> Result<(), HostError> {
  host.run("groupadd", &[group])?;
  Ok(())
}

/// Create a system account whose home directory is `home`.
pub fn create_system_user(host: &dyn Host, user: &str, home: &str) -> Result<(), HostError> {
  host.run("adduser", &["--system", "--home", home, user])?;
  Ok(())
}

/// Create a system account without a home directory.
pub fn create_sandbox_user(host: &dyn Host, user: &str) -> Result<(), HostError> {
  host.run("adduser", &["--system", "--no-create-home", user])?;
  Ok(())
}

/// Replace the supplementary groups of `user` with `groups`.
pub fn set_supplementary_groups(host: &dyn Host, user: &str, groups: &[&str]) -> Result<(), HostError> {
  let list = groups.join(",");
  host.run("usermod", &["-G", &list, user])?;
  Ok(())
}

/// Run a non-interactive `raspi-config` action.
pub fn raspi_config(host: &dyn Host, action: &str, value: &str) -> Result<(), HostError> {
  host.run("raspi-config", &["nonint", action, value])?;
  Ok(())
}

pub fn install_package(host: &dyn Host, package: &str) -> Result<(), HostError> {
  host.run("apt-get", &["install", "-y", package])?;
  Ok(())
}

/// Make udev pick up changed rule files and re-apply them to present devices.
pub fn reload_udev(host: &dyn Host) -> Result<(), HostError> {
  host.run("udevadm", &["control", "--reload"])?;
  host.run("udevadm", &["trigger"])?;
  Ok(())
}

/// Hand `path` and everything below it to `user:group`.
pub fn chown_recursive(host: &dyn Host, user: &str, group: &str, path: &str) -> Result<(), HostError> {
  let owner = format!("{user}:{group}");
  host.run("chown", &["-R", &owner, path])?;
  Ok(())
}

pub fn systemctl(host: &dyn Host, args: &[&str]) -> Result<(), HostError> {
  host.run("systemctl", args)?;
  Ok(())
}

pub fn reboot(host: &dyn Host) -> Result<(), HostError> {
  host.run("reboot", &[])?;
  Ok(())
}
