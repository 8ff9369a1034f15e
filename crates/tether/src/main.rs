mod cli;
mod commands;
mod config;
mod host;
mod notifier;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle init command early (doesn't need config)
    if let Commands::Init { path } = &cli.command {
        return commands::init::run_init(path);
    }

    let config = config::load_config(cli.config.as_deref())?;
    tether_runtime::init_logging(config.logging.format);

    match cli.command {
        Commands::Init { .. } => unreachable!(),
        Commands::Run { dev, plugin_dir } => {
            commands::run::execute(&config, dev, plugin_dir).await?;
        }
    }

    Ok(())
}
