mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stackup_lib::consts::DEFAULT_CONFIG;

/// stackup - declarative resource graphs for small cloud stacks
#[derive(Parser)]
#[command(name = "stackup")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Increase log verbosity (-v info, -vv debug)
  #[arg(short, long, global = true, action = ArgAction::Count)]
  verbose: u8,

  #[command(subcommand)]
  command: Commands,
}

/// Flags shared by commands that talk to the backend.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
  /// State file (default: <state dir>/<stack name>.json)
  #[arg(long)]
  pub state: Option<PathBuf>,

  /// Maximum number of operations in flight
  #[arg(long)]
  pub parallelism: Option<usize>,

  /// Attempts per operation before a transient error fails the node
  #[arg(long)]
  pub max_attempts: Option<u32>,

  /// Delay before the first retry (e.g. 200ms, 1s)
  #[arg(long, value_parser = humantime::parse_duration)]
  pub retry_delay: Option<Duration>,

  /// Show the plan without calling the backend
  #[arg(long)]
  pub dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
  /// Expand and order the stack, then show the plan against applied state
  #[command(alias = "plan")]
  Synthesize {
    /// Path to the configuration file
    #[arg(default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// State file (default: <state dir>/<stack name>.json)
    #[arg(long)]
    state: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Create, update and delete resources until the backend matches the config
  Apply {
    /// Path to the configuration file
    #[arg(default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(flatten)]
    run: RunArgs,
  },

  /// Delete every resource recorded in the applied state
  Destroy {
    /// Path to the configuration file (used for the stack name)
    #[arg(default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(flatten)]
    run: RunArgs,
  },

  /// Show the applied state
  Status {
    /// Path to the configuration file (used for the stack name)
    #[arg(default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// State file to read instead of the stack's default
    #[arg(long)]
    state: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Scaffold a stack.lua for the notification service
  Init {
    /// Directory to initialize
    #[arg(default_value = ".")]
    path: PathBuf,
  },
}

fn init_logging(verbose: u8) {
  let default = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  match cli.command {
    Commands::Synthesize { config, state, json } => cmd::cmd_synthesize(&config, state, json),
    Commands::Apply { config, run } => cmd::cmd_apply(&config, &run),
    Commands::Destroy { config, run } => cmd::cmd_destroy(&config, &run),
    Commands::Status { config, state, json } => cmd::cmd_status(&config, state, json),
    Commands::Init { path } => cmd::cmd_init(&path),
  }
}
