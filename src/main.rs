mod app;
mod backend;
mod commands;
mod config;
mod event;
mod logging;
mod query;
mod reference;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "talentdesk")]
#[command(about = "A terminal UI for browsing the talent pool and staffing requirements")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/talentdesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Start the talent list filtered by this keyword
  #[arg(short, long)]
  keyword: Option<String>,

  /// Log file (default: $XDG_DATA_HOME/talentdesk/talentdesk.log)
  #[arg(long)]
  log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;

  let log_path = match args.log_file {
    Some(path) => path,
    None => logging::default_log_path()?,
  };
  // Flushes the log file on drop
  let _guard = logging::init_logging(&log_path, &config.log_level)?;

  let mut app = app::App::new(config, args.keyword)?;
  app.run().await?;

  Ok(())
}
