//! Content written into system files.

use std::path::Path;

use crate::config::AutostartConfig;
use crate::consts::MONITOR_BINARY;

/// Body of the managed block in the firmware `config.txt`.
///
/// Sets the I2C bus to 400 kHz, disables Bluetooth (which frees the PL011
/// UART) and enables the additional UARTs the testrack daughterboards use.
pub fn boot_config_body() -> Vec<String> {
  [
    "[all]",
    "dtparam=i2c_baudrate=400000",
    "dtparam=disable-bt",
    "dtoverlay=uart3",
    "dtoverlay=uart0",
    "dtoverlay=uart4",
    "dtoverlay=uart5",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect()
}

/// A RAM disk the monitor needs below its install directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TmpfsMount {
  /// Path relative to the install directory.
  pub dir: &'static str,
  pub mode: &'static str,
  pub exec: bool,
  pub size: &'static str,
}

pub const TMPFS_MOUNTS: [TmpfsMount; 3] = [
  TmpfsMount {
    dir: "data/logs",
    mode: "775",
    exec: false,
    size: "100M",
  },
  TmpfsMount {
    dir: "data/runner",
    mode: "774",
    exec: true,
    size: "400M",
  },
  TmpfsMount {
    dir: "data/assembler_workspace",
    mode: "774",
    exec: false,
    size: "10M",
  },
];

/// Body of the managed block in `/etc/fstab`.
pub fn fstab_body(install_dir: &Path, gid: u32) -> Vec<String> {
  TMPFS_MOUNTS
    .iter()
    .map(|mount| {
      format!(
        "tmpfs {} tmpfs nodev,nouser,gid={},mode={},{},noatime,rw,size={} 0 0",
        install_dir.join(mount.dir).display(),
        gid,
        mount.mode,
        if mount.exec { "exec" } else { "noexec" },
        mount.size
      )
    })
    .collect()
}

/// The systemd unit that starts the monitor as the hive user.
pub fn service_unit(config: &AutostartConfig) -> String {
  let install_dir = config.install_dir();
  format!(
    "[Unit]\n\
     Description=Hive Testserver Service\n\
     \n\
     [Service]\n\
     Type=simple\n\
     Environment=\"PATH={arm}:{riscv}:/usr/bin\"\n\
     WorkingDirectory={dir}/\n\
     ExecStart=runuser -u {user} {binary}\n\
     Restart=on-failure\n\
     RestartSec=30\n\
     KillMode=mixed\n\
     \n\
     [Install]\n\
     WantedBy=multi-user.target\n",
    arm = config.arm_toolchain.display(),
    riscv = config.riscv_toolchain.display(),
    dir = install_dir.display(),
    user = config.hive_user,
    binary = install_dir.join(MONITOR_BINARY).display(),
  )
}

/// udev rules granting the `plugdev` group access to the debug probes probe-rs supports.
pub const UDEV_RULES: &str = r#"# Installed by hive-setup. Grants the plugdev group access to debug probes.
ACTION!="add|change", GOTO="probe_rs_rules_end"

SUBSYSTEM=="gpio", MODE="0660", GROUP="plugdev", TAG+="uaccess"

SUBSYSTEM!="usb|tty|hidraw", GOTO="probe_rs_rules_end"

# STMicroelectronics ST-LINK/V1
ATTRS{idVendor}=="0483", ATTRS{idProduct}=="3744", MODE="660", GROUP="plugdev", TAG+="uaccess"
# STMicroelectronics ST-LINK/V2
ATTRS{idVendor}=="0483", ATTRS{idProduct}=="3748", MODE="660", GROUP="plugdev", TAG+="uaccess"
# STMicroelectronics ST-LINK/V2-1
ATTRS{idVendor}=="0483", ATTRS{idProduct}=="374b", MODE="660", GROUP="plugdev", TAG+="uaccess"
# STMicroelectronics STLINK-V3
ATTRS{idVendor}=="0483", ATTRS{idProduct}=="374e", MODE="660", GROUP="plugdev", TAG+="uaccess"
ATTRS{idVendor}=="0483", ATTRS{idProduct}=="374f", MODE="660", GROUP="plugdev", TAG+="uaccess"
ATTRS{idVendor}=="0483", ATTRS{idProduct}=="3753", MODE="660", GROUP="plugdev", TAG+="uaccess"

# SEGGER J-Link
ATTRS{idVendor}=="1366", MODE="660", GROUP="plugdev", TAG+="uaccess"

# ARM DAPLink / CMSIS-DAP
ATTRS{idVendor}=="0d28", ATTRS{idProduct}=="0204", MODE="660", GROUP="plugdev", TAG+="uaccess"
# Raspberry Pi Debug Probe
ATTRS{idVendor}=="2e8a", ATTRS{idProduct}=="000c", MODE="660", GROUP="plugdev", TAG+="uaccess"

# FTDI FT2232H / FT4232H / FT232H
ATTRS{idVendor}=="0403", ATTRS{idProduct}=="6010", MODE="660", GROUP="plugdev", TAG+="uaccess"
ATTRS{idVendor}=="0403", ATTRS{idProduct}=="6011", MODE="660", GROUP="plugdev", TAG+="uaccess"
ATTRS{idVendor}=="0403", ATTRS{idProduct}=="6014", MODE="660", GROUP="plugdev", TAG+="uaccess"

# Espressif USB JTAG/serial
ATTRS{idVendor}=="303a", ATTRS{idProduct}=="1001", MODE="660", GROUP="plugdev", TAG+="uaccess"

# WCH-Link
ATTRS{idVendor}=="1a86", ATTRS{idProduct}=="8010", MODE="660", GROUP="plugdev", TAG+="uaccess"

LABEL="probe_rs_rules_end"
"#;
