use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

use openblog::app::{App, Command};
use openblog::config::Config;
use openblog::logging;

#[derive(Parser, Debug)]
#[command(name = "openblog")]
#[command(about = "Offline-aware command-line client for the Open API blog")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/openblog/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Treat the network as unreachable
  #[arg(long)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Keep the guard alive until exit so buffered log lines get flushed
  let _log_guard = logging::init_logging(&config.log_dir()?)?;

  let app = App::new(config, args.offline)?;
  app.run(args.command).await?;

  Ok(())
}
