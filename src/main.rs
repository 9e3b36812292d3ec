use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use fitdesk::api::{AuthCoordinator, SharedToken};
use fitdesk::commands::{self, Command};
use fitdesk::config::Config;
use fitdesk::logging;
use fitdesk::trainer::{session, TrainerClient};

#[derive(Parser, Debug)]
#[command(name = "fitdesk")]
#[command(about = "Command line client for the fitness trainer API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/fitdesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Print raw JSON instead of tables
  #[arg(long, global = true)]
  json: bool,

  /// Write logs to this file instead of stderr (filter with FITDESK_LOG)
  #[arg(long, global = true)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init(args.log_file.as_deref())?;

  let config = Config::load(args.config.as_deref())?;

  let token = SharedToken::new(config.initial_token());
  let auth = Arc::new(AuthCoordinator::new(token.clone()));
  if let Some(path) = config.token_file() {
    debug!(path = %path.display(), "Watching token file for refreshes");
    session::watch_token_file(&auth, path, token);
  }

  let client = TrainerClient::from_config(&config, auth)?;

  let mut stdout = std::io::stdout().lock();
  commands::run(args.command, &client, args.json, &mut stdout).await
}
