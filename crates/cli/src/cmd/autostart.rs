//! Implementation of the `hive-setup autostart` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use hive_setup_lib::config::AutostartConfig;
use hive_setup_lib::consts::DEFAULT_HIVE_USER;
use hive_setup_lib::host::SystemHost;
use hive_setup_lib::platform::paths::SystemPaths;
use hive_setup_lib::provision::autostart_sequence;

use super::{require_root, run_sequence};
use crate::output::{OutputFormat, print_info, print_notice, print_stat};
use crate::prompts::{confirm, prompt_required, prompt_with_default};

#[derive(Args, Debug)]
pub struct AutostartArgs {
  /// User the testserver runs as (prompted if omitted)
  #[arg(long)]
  pub hive_user: Option<String>,

  /// Directory containing the ARM GNU toolchain binaries (prompted if omitted)
  #[arg(long)]
  pub arm_toolchain: Option<PathBuf>,

  /// Directory containing the RISC-V GNU toolchain binaries (prompted if omitted)
  #[arg(long)]
  pub riscv_toolchain: Option<PathBuf>,

  /// Answer yes to every confirmation and use defaults for omitted values
  #[arg(short, long)]
  pub yes: bool,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  pub output: OutputFormat,
}

/// Execute the autostart command.
///
/// Writes the systemd unit for the testserver, then reloads systemd and
/// enables and starts the service.
pub fn cmd_autostart(args: AutostartArgs) -> Result<()> {
  require_root()?;

  let hive_user = match args.hive_user {
    Some(user) => user,
    None => prompt_with_default("Hive user", DEFAULT_HIVE_USER, "--hive-user", args.yes)?,
  };
  let arm = toolchain_path(args.arm_toolchain, "ARM toolchain bin directory", "--arm-toolchain")?;
  let riscv = toolchain_path(args.riscv_toolchain, "RISC-V toolchain bin directory", "--riscv-toolchain")?;

  let config =
    AutostartConfig::new(hive_user, arm, riscv, SystemPaths::from_env()).context("Invalid autostart parameters")?;

  if !args.output.is_json() {
    print_info("Registering the Hive testserver service");
    print_stat("Hive user", &config.hive_user);
    print_stat("ARM toolchain", &config.arm_toolchain.display().to_string());
    print_stat("RISC-V toolchain", &config.riscv_toolchain.display().to_string());
    print_stat("Service", &config.service);
  }
  if !confirm("Continue?", args.yes)? {
    print_notice(args.output, "Aborted.");
    return Ok(());
  }

  let host = SystemHost;
  run_sequence("autostart", autostart_sequence(&config, &host), args.output)
}

/// Take the flag value or ask for it, and make it absolute.
fn toolchain_path(value: Option<PathBuf>, label: &str, flag: &str) -> Result<PathBuf> {
  let path = match value {
    Some(path) => path,
    None => PathBuf::from(prompt_required(label, flag)?),
  };
  std::path::absolute(&path).with_context(|| format!("Failed to resolve {}", path.display()))
}
