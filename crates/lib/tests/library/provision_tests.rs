use hive_setup_lib::config::{AutostartConfig, InstallMode};
use hive_setup_lib::consts::{HIVE_BLOCK_END, HIVE_BLOCK_START};
use hive_setup_lib::error::ErrorKind;
use hive_setup_lib::provision::{autostart_sequence, check_for_update, setup_sequence};
use hive_setup_lib::sequence::{Outcome, StepState};

use super::common::{BOOT_CONFIG, FSTAB, FakeHost, RELEASE_FILES, ReleaseServer, Sysroot};

#[test]
fn install_configures_a_fresh_system() {
  let sysroot = Sysroot::new();
  let release = ReleaseServer::start("0.3.0", RELEASE_FILES);
  let config = sysroot.config(InstallMode::Create, &release);
  let client = release.client();
  let host = FakeHost::new();

  let report = setup_sequence(&config, &host, &client).run();

  assert!(report.outcome.is_success(), "{:?}", report.outcome);
  assert!(report.steps.iter().all(|s| s.state == StepState::Succeeded));

  let home = sysroot.host_path("/home/hive");
  assert_eq!(
    host.commands(),
    vec![
      "groupadd hive".to_string(),
      "adduser --system --home /home/hive hive".to_string(),
      "usermod -G hive,plugdev,i2c hive".to_string(),
      "adduser --system --no-create-home runner".to_string(),
      format!("chown -R hive:hive {}", home.display()),
      "raspi-config nonint do_serial 2".to_string(),
      "raspi-config nonint do_i2c 0".to_string(),
      "apt-get install -y bubblewrap".to_string(),
      "udevadm control --reload".to_string(),
      "udevadm trigger".to_string(),
    ]
  );

  assert!(home.join("monitor").is_file());
  assert!(home.join("data/config/hive.toml").is_file());
  assert!(!home.join("monitor.tar.gz").exists());
  for dir in ["data/logs", "data/runner", "data/assembler_workspace"] {
    assert!(home.join(dir).is_dir(), "{dir} should exist");
  }

  let boot = sysroot.read("/boot/config.txt");
  assert!(boot.starts_with(BOOT_CONFIG));
  assert!(boot.ends_with(&format!("dtoverlay=uart5\n{HIVE_BLOCK_END}\n")));

  let fstab = sysroot.read("/etc/fstab");
  assert!(fstab.starts_with(FSTAB));
  assert!(fstab.contains(
    "tmpfs /home/hive/data/runner tmpfs nodev,nouser,gid=990,mode=774,exec,noatime,rw,size=400M 0 0\n"
  ));

  assert_eq!(
    sysroot.read("/etc/systemd/journald.conf"),
    "[Journal]\nStorage=volatile\n#Compress=yes\n#Seal=yes\n"
  );
  assert!(sysroot.read("/etc/udev/rules.d/69-probe-rs.rules").contains("GROUP=\"plugdev\""));
}

#[test]
fn rerunning_install_changes_nothing() {
  let sysroot = Sysroot::new();
  let release = ReleaseServer::start("0.3.0", RELEASE_FILES);
  let config = sysroot.config(InstallMode::Create, &release);
  let client = release.client();

  assert!(setup_sequence(&config, &FakeHost::new(), &client).run().outcome.is_success());
  let first = sysroot.managed_files();

  assert!(setup_sequence(&config, &FakeHost::new(), &client).run().outcome.is_success());
  let second = sysroot.managed_files();

  assert_eq!(first, second);
  for content in &first[..2] {
    assert_eq!(content.matches(HIVE_BLOCK_START).count(), 1);
  }
}

#[test]
fn outdated_boot_block_is_replaced_in_place() {
  let sysroot = Sysroot::new();
  let old = format!(
    "{BOOT_CONFIG}\n{HIVE_BLOCK_START}\n[all]\ndtparam=i2c_baudrate=100000\ndtoverlay=uart2\n{HIVE_BLOCK_END}\n\n# added later by hand\ngpu_mem=16\n"
  );
  sysroot.write("/boot/config.txt", &old);
  let release = ReleaseServer::start("0.3.0", RELEASE_FILES);
  let config = sysroot.config(InstallMode::Update, &release);
  let client = release.client();

  for _ in 0..3 {
    assert!(setup_sequence(&config, &FakeHost::new(), &client).run().outcome.is_success());
  }

  let boot = sysroot.read("/boot/config.txt");
  assert!(boot.starts_with(&format!("{BOOT_CONFIG}\n{HIVE_BLOCK_START}\n[all]\ndtparam=i2c_baudrate=400000\n")));
  assert!(boot.ends_with(&format!("dtoverlay=uart5\n{HIVE_BLOCK_END}\n\n# added later by hand\ngpu_mem=16\n")));
  assert!(!boot.contains("uart2"));
  assert_eq!(boot.lines().count(), BOOT_CONFIG.lines().count() + 1 + 9 + 3);
}

#[test]
fn failure_stops_the_run_and_keeps_earlier_work() {
  let sysroot = Sysroot::new();
  let release = ReleaseServer::start("0.3.0", RELEASE_FILES);
  let config = sysroot.config(InstallMode::Create, &release);
  let client = release.client();
  let host = FakeHost::new().failing("raspi-config");

  let report = setup_sequence(&config, &host, &client).run();

  match &report.outcome {
    Outcome::FailedAt { step, reason } => {
      assert_eq!(step, "hardware");
      assert_eq!(reason.kind(), ErrorKind::OsCommand);
    }
    Outcome::AllSucceeded => panic!("expected the hardware step to fail"),
  }
  assert!(sysroot.host_path("/home/hive/monitor").is_file());
  assert_eq!(sysroot.read("/boot/config.txt"), BOOT_CONFIG);
  assert_eq!(sysroot.read("/etc/fstab"), FSTAB);
  let states: Vec<_> = report.steps.iter().map(|s| s.state).collect();
  assert_eq!(states[4], StepState::Failed);
  assert!(states[5..].iter().all(|s| *s == StepState::Pending));
}

#[test]
fn malformed_fstab_block_fails_storage() {
  let sysroot = Sysroot::new();
  let broken = format!("{FSTAB}{HIVE_BLOCK_END}\n");
  sysroot.write("/etc/fstab", &broken);
  let release = ReleaseServer::start("0.3.0", RELEASE_FILES);
  let config = sysroot.config(InstallMode::Create, &release);
  let client = release.client();

  let report = setup_sequence(&config, &FakeHost::new(), &client).run();

  match report.outcome {
    Outcome::FailedAt { step, reason } => {
      assert_eq!(step, "storage");
      assert_eq!(reason.kind(), ErrorKind::MalformedBlock);
    }
    Outcome::AllSucceeded => panic!("expected the storage step to fail"),
  }
  assert_eq!(sysroot.read("/etc/fstab"), broken);
}

#[test]
fn update_keeps_local_data() {
  let sysroot = Sysroot::new();
  sysroot.write("/home/hive/monitor", "old binary");
  sysroot.write("/home/hive/data/config/hive.toml", "# tuned locally\n");
  sysroot.write("/home/hive/data/webserver/static/old.js", "stale");
  let release = ReleaseServer::start("0.3.0", RELEASE_FILES);
  let config = sysroot.config(InstallMode::Update, &release);
  let client = release.client();
  let host = FakeHost::new();

  let report = setup_sequence(&config, &host, &client).run();

  assert!(report.outcome.is_success(), "{:?}", report.outcome);
  assert_eq!(sysroot.read("/home/hive/data/config/hive.toml"), "# tuned locally\n");
  assert_eq!(sysroot.read("/home/hive/monitor"), "#!/bin/sh\necho monitor 0.3.0\n");
  assert!(sysroot.host_path("/home/hive/data/webserver/static/index.html").is_file());
  assert!(!sysroot.host_path("/home/hive/data/webserver/static/old.js").exists());
  assert!(!host.commands().iter().any(|c| c.starts_with("adduser") || c.starts_with("groupadd")));
}

#[test]
fn update_with_broken_download_keeps_the_installed_monitor() {
  let sysroot = Sysroot::new();
  sysroot.write("/home/hive/monitor", "old binary");
  sysroot.write("/home/hive/data/webserver/static/index.html", "old index");
  let release = ReleaseServer::serving("0.3.0", b"truncated download".to_vec());
  let config = sysroot.config(InstallMode::Update, &release);
  let client = release.client();

  let report = setup_sequence(&config, &FakeHost::new(), &client).run();

  match &report.outcome {
    Outcome::FailedAt { step, reason } => {
      assert_eq!(step, "monitor");
      assert_eq!(reason.kind(), ErrorKind::Archive);
    }
    Outcome::AllSucceeded => panic!("expected the monitor step to fail"),
  }
  assert_eq!(sysroot.read("/home/hive/monitor"), "old binary");
  assert_eq!(sysroot.read("/home/hive/data/webserver/static/index.html"), "old index");
  assert!(!sysroot.host_path("/home/hive/monitor.tar.gz").exists());
}

#[test]
fn update_check_reports_missing_install() {
  let sysroot = Sysroot::new();
  let release = ReleaseServer::start("0.3.0", RELEASE_FILES);
  let config = sysroot.config(InstallMode::Update, &release);

  let err = check_for_update(&config, &FakeHost::new(), &release.client()).unwrap_err();

  assert_eq!(err.kind(), ErrorKind::OsCommand);
}

#[test]
fn autostart_registers_the_service() {
  let sysroot = Sysroot::new();
  sysroot.write("/opt/arm-gnu/bin/arm-none-eabi-gcc", "");
  sysroot.write("/opt/riscv-gnu/bin/riscv32-unknown-elf-gcc", "");
  let config = AutostartConfig::new("hive", "/opt/arm-gnu/bin", "/opt/riscv-gnu/bin", sysroot.paths()).unwrap();
  let host = FakeHost::new();

  assert!(autostart_sequence(&config, &host).run().outcome.is_success());
  assert!(autostart_sequence(&config, &host).run().outcome.is_success());

  let unit = sysroot.read("/etc/systemd/system/hive.service");
  assert!(unit.contains("Environment=\"PATH=/opt/arm-gnu/bin:/opt/riscv-gnu/bin:/usr/bin\"\n"));
  assert!(unit.contains("ExecStart=runuser -u hive /home/hive/monitor\n"));
  assert_eq!(
    host.commands(),
    [
      "systemctl daemon-reload",
      "systemctl enable hive",
      "systemctl start hive",
    ]
    .repeat(2)
  );
}
