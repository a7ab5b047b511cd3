mod cmd;
mod output;
mod prompts;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{AccountArgs, AutostartArgs, RunArgs};
use crate::output::print_error;

/// hive-setup - Provision a Raspberry Pi as a Hive testrack
#[derive(Parser)]
#[command(name = "hive-setup")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose (debug) logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Install the Hive testserver on a fresh Raspberry Pi OS
  Install {
    #[command(flatten)]
    accounts: AccountArgs,

    #[command(flatten)]
    run: RunArgs,
  },

  /// Start the Hive testserver automatically at boot
  Autostart(AutostartArgs),

  /// Update an existing installation to the latest release
  Update {
    #[command(flatten)]
    accounts: AccountArgs,

    #[command(flatten)]
    run: RunArgs,
  },
}

fn main() {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Install { accounts, run } => cmd::cmd_install(accounts, run),
    Commands::Autostart(args) => cmd::cmd_autostart(args),
    Commands::Update { accounts, run } => cmd::cmd_update(accounts, run),
  };

  if let Err(err) = result {
    print_error(&format!("{err:#}"));
    std::process::exit(1);
  }
}
