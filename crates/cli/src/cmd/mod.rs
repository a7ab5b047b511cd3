//! Subcommand implementations and the pieces they share.
//!
//! Every subcommand follows the same shape: refuse to run without root,
//! collect all parameters (flags first, prompts for the rest), confirm, then
//! hand a fully built sequence to [`run_sequence`].

mod autostart;
mod install;
mod update;

pub use autostart::{AutostartArgs, cmd_autostart};
pub use install::cmd_install;
pub use update::cmd_update;

use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Serialize;
use tracing::info;

use hive_setup_lib::config::{InstallMode, SetupConfig};
use hive_setup_lib::consts::{DEFAULT_HIVE_GROUP, DEFAULT_HIVE_USER, DEFAULT_RUNNER_USER};
use hive_setup_lib::error::ErrorKind;
use hive_setup_lib::host::{self, Host};
use hive_setup_lib::platform;
use hive_setup_lib::sequence::{Outcome, SequenceEvent, Sequencer, StepStatus};

use crate::output::{
  OutputFormat, format_duration, print_json, print_notice, print_stat, print_step, print_success, print_warning,
};
use crate::prompts::{confirm, is_interactive, prompt_with_default};

/// Accounts used by `install` and `update`.
#[derive(Args, Debug)]
pub struct AccountArgs {
  /// User the testserver runs as (prompted if omitted)
  #[arg(long)]
  pub hive_user: Option<String>,

  /// Group owning the testserver files and mounts (prompted if omitted)
  #[arg(long)]
  pub hive_group: Option<String>,

  /// Unprivileged user test binaries run as (prompted if omitted)
  #[arg(long)]
  pub runner_user: Option<String>,
}

/// Flags controlling an `install` or `update` run.
#[derive(Args, Debug)]
pub struct RunArgs {
  /// Answer yes to every confirmation and use defaults for omitted values
  #[arg(short, long)]
  pub yes: bool,

  /// Do not offer to reboot when done
  #[arg(long)]
  pub no_reboot: bool,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  pub output: OutputFormat,
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
  command: &'a str,
  success: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  failed_step: Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  error_kind: Option<ErrorKind>,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
  steps: &'a [StepStatus],
  duration_ms: u128,
}

fn require_root() -> Result<()> {
  if !platform::is_elevated() {
    bail!("hive-setup must be run as root (try sudo)");
  }
  Ok(())
}

/// Build the setup parameters from flags, prompting for anything missing.
fn setup_config(accounts: AccountArgs, yes: bool, mode: InstallMode) -> Result<SetupConfig> {
  let hive_user = match accounts.hive_user {
    Some(user) => user,
    None => prompt_with_default("Hive user", DEFAULT_HIVE_USER, "--hive-user", yes)?,
  };
  let hive_group = match accounts.hive_group {
    Some(group) => group,
    None => prompt_with_default("Hive group", DEFAULT_HIVE_GROUP, "--hive-group", yes)?,
  };
  let runner_user = match accounts.runner_user {
    Some(user) => user,
    None => prompt_with_default("Runner user", DEFAULT_RUNNER_USER, "--runner-user", yes)?,
  };

  SetupConfig::new(hive_user, hive_group, runner_user, mode).context("Invalid setup parameters")
}

fn print_setup_config(config: &SetupConfig) {
  print_stat("Hive user", &config.hive_user);
  print_stat("Hive group", &config.hive_group);
  print_stat("Runner user", &config.runner_user);
  print_stat("Install dir", &config.install_dir().display().to_string());
  if config.paths.sysroot() != std::path::Path::new("/") {
    print_stat("Sysroot", &config.paths.sysroot().display().to_string());
  }
}

/// Run `sequencer`, printing progress, and turn a failed step into an error.
fn run_sequence(command: &str, sequencer: Sequencer<'_>, output: OutputFormat) -> Result<()> {
  let start = Instant::now();

  let report = sequencer.run_with(|event| {
    if output.is_json() {
      return;
    }
    match event {
      SequenceEvent::Started { index, total, name } => print_step(index, total, name),
      SequenceEvent::Succeeded { name } => print_success(name),
      SequenceEvent::Failed { .. } => {}
    }
  });
  let elapsed = start.elapsed();

  if output.is_json() {
    let (failed_step, error_kind, error) = match &report.outcome {
      Outcome::AllSucceeded => (None, None, None),
      Outcome::FailedAt { step, reason } => (Some(step.as_str()), Some(reason.kind()), Some(reason.to_string())),
    };
    print_json(&RunSummary {
      command,
      success: report.outcome.is_success(),
      failed_step,
      error_kind,
      error,
      steps: &report.steps,
      duration_ms: elapsed.as_millis(),
    })?;
  }

  match report.outcome {
    Outcome::AllSucceeded => {
      info!(command, elapsed_ms = elapsed.as_millis() as u64, "sequence complete");
      if !output.is_json() {
        print_success(&format!("{} complete in {}", command, format_duration(elapsed)));
      }
      Ok(())
    }
    Outcome::FailedAt { step, reason } => {
      Err(anyhow::Error::new(reason).context(format!("Step '{}' failed, fix the cause and run {} again", step, command)))
    }
  }
}

/// Boot config and mounts only take effect after a reboot.
fn offer_reboot(host: &dyn Host, run: &RunArgs) -> Result<()> {
  if run.no_reboot || (!run.yes && !is_interactive()) {
    print_warning("Reboot skipped. Boot config and mount changes take effect after the next reboot.");
    return Ok(());
  }

  print_warning("A reboot is required to apply all changes.");
  if confirm("Reboot now?", run.yes)? {
    host::reboot(host).context("Failed to reboot")?;
  } else {
    print_notice(run.output, "Please reboot before using the testrack.");
  }
  Ok(())
}
