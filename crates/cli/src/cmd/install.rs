//! Implementation of the `hive-setup install` command.

use anyhow::{Context, Result};

use hive_setup_lib::config::InstallMode;
use hive_setup_lib::host::SystemHost;
use hive_setup_lib::provision::setup_sequence;
use hive_setup_lib::release::ReleaseClient;

use super::{AccountArgs, RunArgs, offer_reboot, print_setup_config, require_root, run_sequence, setup_config};
use crate::output::{print_info, print_notice};
use crate::prompts::confirm;

/// Execute the install command.
///
/// Creates the accounts, installs the latest monitor release and applies the
/// system configuration a testrack needs. Safe to run again after a failure.
pub fn cmd_install(accounts: AccountArgs, run: RunArgs) -> Result<()> {
  require_root()?;
  let config = setup_config(accounts, run.yes, InstallMode::Create)?;

  if !run.output.is_json() {
    print_info("Installing the Hive testserver");
    print_setup_config(&config);
  }
  if !confirm("Continue?", run.yes)? {
    print_notice(run.output, "Aborted.");
    return Ok(());
  }

  let host = SystemHost;
  let client = ReleaseClient::new(config.release.clone()).context("Failed to set up release client")?;
  run_sequence("install", setup_sequence(&config, &host, &client), run.output)?;

  offer_reboot(&host, &run)
}
