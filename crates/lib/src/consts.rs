//! Default values for a Hive testrack installation.
//!
//! These are only defaults. Everything here is copied into [`SetupConfig`],
//! [`BlockMarkers`] or [`SystemPaths`] before provisioning starts, and the
//! provisioning code reads the values from there.
//!
//! [`SetupConfig`]: crate::config::SetupConfig
//! [`BlockMarkers`]: crate::block::BlockMarkers
//! [`SystemPaths`]: crate::platform::paths::SystemPaths

use std::time::Duration;

pub const APP_NAME: &str = "hive-setup";

pub const DEFAULT_HIVE_USER: &str = "hive";
pub const DEFAULT_HIVE_GROUP: &str = "hive";
pub const DEFAULT_RUNNER_USER: &str = "runner";

/// Start marker of the block this tool owns in `/boot/config.txt` and `/etc/fstab`.
pub const HIVE_BLOCK_START: &str = "# ==============Hive Configuration==============";
/// End marker of the block this tool owns in `/boot/config.txt` and `/etc/fstab`.
pub const HIVE_BLOCK_END: &str = "# ==============End of Hive Configuration==============";

pub const RELEASES_URL: &str = "https://github.com/probe-rs/hive-software/releases";

pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound for downloading a release archive.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Name of the testserver binary inside the install directory and the release archive.
pub const MONITOR_BINARY: &str = "monitor";
pub const MONITOR_ARCHIVE: &str = "monitor.tar.gz";

/// Directory inside the archive that is replaced on update.
pub const STATIC_ASSETS_DIR: &str = "data/webserver/static";

pub const SERVICE_NAME: &str = "hive";

/// The Raspberry Pi firmware ignores `config.txt` content past this line.
pub const BOOT_CONFIG_MAX_LINES: usize = 98;

/// Supplementary groups the hive user needs besides its own group.
pub const HIVE_USER_EXTRA_GROUPS: &[&str] = &["plugdev", "i2c"];

pub const UDEV_RULES_FILE: &str = "69-probe-rs.rules";

/// Environment variable that re-roots every system path.
pub const SYSROOT_ENV: &str = "HIVE_SETUP_SYSROOT";
/// Environment variable that overrides [`RELEASES_URL`].
pub const RELEASE_URL_ENV: &str = "HIVE_SETUP_RELEASE_URL";
