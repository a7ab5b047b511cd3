use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::Compression;
use flate2::write::GzEncoder;
use hive_setup_lib::config::{InstallMode, ReleaseConfig, SetupConfig};
use hive_setup_lib::host::{Host, HostError, command_line};
use hive_setup_lib::platform::paths::SystemPaths;
use hive_setup_lib::release::ReleaseClient;
use tempfile::TempDir;

pub const BOOT_CONFIG: &str = "# For more options and information see\n\
# http://rpf.io/configtxt\n\
dtparam=audio=on\n\
camera_auto_detect=1\n\
display_auto_detect=1\n\
arm_64bit=1\n";

pub const FSTAB: &str = "proc            /proc           proc    defaults          0       0\n\
PARTUUID=1234-01  /boot/firmware  vfat    defaults          0       2\n\
PARTUUID=1234-02  /               ext4    defaults,noatime  0       1\n";

pub const JOURNALD_CONF: &str = "[Journal]\n#Storage=auto\n#Compress=yes\n#Seal=yes\n";

/// Host double that records commands and answers group lookups from a table.
#[derive(Default)]
pub struct FakeHost {
  commands: RefCell<Vec<String>>,
  groups: HashMap<String, u32>,
  fail_program: Option<String>,
}

impl FakeHost {
  pub fn new() -> Self {
    Self::default().with_group("hive", 990)
  }

  pub fn with_group(mut self, group: &str, gid: u32) -> Self {
    self.groups.insert(group.to_string(), gid);
    self
  }

  pub fn failing(mut self, program: &str) -> Self {
    self.fail_program = Some(program.to_string());
    self
  }

  pub fn commands(&self) -> Vec<String> {
    self.commands.borrow().clone()
  }
}

impl Host for FakeHost {
  fn run(&self, program: &str, args: &[&str]) -> Result<String, HostError> {
    let cmd = command_line(program, args);
    self.commands.borrow_mut().push(cmd.clone());
    if self.fail_program.as_deref() == Some(program) {
      return Err(HostError::CommandFailed {
        cmd,
        code: Some(1),
        stderr: "simulated".to_string(),
      });
    }
    Ok(String::new())
  }

  fn group_id(&self, group: &str) -> Result<u32, HostError> {
    self.groups.get(group).copied().ok_or_else(|| HostError::UnknownGroup {
      group: group.to_string(),
    })
  }
}

/// A scratch sysroot holding the files a fresh Raspberry Pi OS image has.
pub struct Sysroot {
  pub dir: TempDir,
}

impl Sysroot {
  pub fn new() -> Self {
    let sysroot = Self {
      dir: TempDir::new().unwrap(),
    };
    sysroot.write("/boot/config.txt", BOOT_CONFIG);
    sysroot.write("/etc/fstab", FSTAB);
    sysroot.write("/etc/systemd/journald.conf", JOURNALD_CONF);
    sysroot
  }

  pub fn path(&self) -> &Path {
    self.dir.path()
  }

  pub fn paths(&self) -> SystemPaths {
    SystemPaths::new(self.path())
  }

  pub fn host_path(&self, target: &str) -> PathBuf {
    self.path().join(target.trim_start_matches('/'))
  }

  pub fn write(&self, target: &str, content: &str) {
    let path = self.host_path(target);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
  }

  pub fn read(&self, target: &str) -> String {
    fs::read_to_string(self.host_path(target)).unwrap()
  }

  /// Contents of every file the setup sequence edits, for before/after comparisons.
  pub fn managed_files(&self) -> Vec<String> {
    [
      "/boot/config.txt",
      "/etc/fstab",
      "/etc/systemd/journald.conf",
      "/etc/udev/rules.d/69-probe-rs.rules",
    ]
    .iter()
    .map(|target| self.read(target))
    .collect()
  }

  pub fn config(&self, mode: InstallMode, release: &ReleaseServer) -> SetupConfig {
    SetupConfig::new("hive", "hive", "runner", mode)
      .unwrap()
      .with_paths(self.paths())
      .with_release(release.config())
  }
}

/// A local release feed serving one version.
pub struct ReleaseServer {
  pub server: mockito::ServerGuard,
  _mocks: Vec<mockito::Mock>,
}

impl ReleaseServer {
  pub fn start(version: &str, files: &[(&str, &str, u32)]) -> Self {
    Self::serving(version, tarball(files))
  }

  /// Serve `archive` verbatim as the release download.
  pub fn serving(version: &str, archive: Vec<u8>) -> Self {
    let mut server = mockito::Server::new();
    let tag = format!("/releases/tag/v{version}");
    let mocks = vec![
      server
        .mock("GET", "/releases/latest")
        .with_status(302)
        .with_header("location", &tag)
        .create(),
      server.mock("GET", tag.as_str()).with_status(200).create(),
      server
        .mock("GET", format!("/releases/download/v{version}/monitor.tar.gz").as_str())
        .with_status(200)
        .with_body(archive)
        .create(),
    ];
    Self { server, _mocks: mocks }
  }

  pub fn config(&self) -> ReleaseConfig {
    ReleaseConfig {
      base_url: format!("{}/releases", self.server.url()),
      timeout: Duration::from_secs(5),
      ..ReleaseConfig::default()
    }
  }

  pub fn client(&self) -> ReleaseClient {
    ReleaseClient::new(self.config()).unwrap()
  }
}

/// Build a gzip tarball from `(path, content, mode)` triples.
pub fn tarball(files: &[(&str, &str, u32)]) -> Vec<u8> {
  let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
  for (path, content, mode) in files {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(*mode);
    header.set_cksum();
    builder.append_data(&mut header, path, content.as_bytes()).unwrap();
  }
  let mut encoder = builder.into_inner().unwrap();
  encoder.flush().unwrap();
  encoder.finish().unwrap()
}

pub const RELEASE_FILES: &[(&str, &str, u32)] = &[
  ("monitor", "#!/bin/sh\necho monitor 0.3.0\n", 0o755),
  ("data/webserver/static/index.html", "<html></html>", 0o644),
  ("data/config/hive.toml", "# default config\n", 0o644),
];
