//! Implementation of the `hive-setup update` command.
//!
//! Compares the installed monitor against the newest release and, when an
//! update is available, re-runs the setup sequence in update mode: accounts
//! are kept, only the binary and static assets are replaced, and every
//! configuration edit is re-applied.

use anyhow::{Context, Result};
use serde::Serialize;

use hive_setup_lib::config::InstallMode;
use hive_setup_lib::host::SystemHost;
use hive_setup_lib::provision::{check_for_update, setup_sequence};
use hive_setup_lib::release::ReleaseClient;

use super::{AccountArgs, RunArgs, offer_reboot, print_setup_config, require_root, run_sequence, setup_config};
use crate::output::{print_info, print_json, print_notice, print_success, symbols};
use crate::prompts::confirm;

#[derive(Debug, Serialize)]
struct UpToDate {
  command: &'static str,
  up_to_date: bool,
  installed: String,
  latest: String,
}

/// Execute the update command.
pub fn cmd_update(accounts: AccountArgs, run: RunArgs) -> Result<()> {
  require_root()?;
  let config = setup_config(accounts, run.yes, InstallMode::Update)?;

  let host = SystemHost;
  let client = ReleaseClient::new(config.release.clone()).context("Failed to set up release client")?;
  let check = check_for_update(&config, &host, &client).context("Failed to check for updates")?;

  if !check.is_needed() {
    if run.output.is_json() {
      print_json(&UpToDate {
        command: "update",
        up_to_date: true,
        installed: check.installed.to_string(),
        latest: check.latest.to_string(),
      })?;
    } else {
      print_success(&format!("Monitor v{} is already the latest release", check.installed));
    }
    return Ok(());
  }

  if !run.output.is_json() {
    print_info(&format!(
      "Updating monitor v{} {} v{}",
      check.installed,
      symbols::ARROW,
      check.latest
    ));
    print_setup_config(&config);
  }
  if !confirm("Continue?", run.yes)? {
    print_notice(run.output, "Aborted.");
    return Ok(());
  }

  run_sequence("update", setup_sequence(&config, &host, &client), run.output)?;

  offer_reboot(&host, &run)
}
