use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Tether - development host for native plugin cores", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new config file
    Init {
        /// Path for new config file
        #[arg(default_value = "tether.toml")]
        path: PathBuf,
    },
    /// Load the configured native core and host it until Ctrl-C
    Run {
        /// Development mode: reload the core when its library changes on disk
        #[arg(long)]
        dev: bool,
        /// Directory containing the native core (overrides [host] plugin_dir)
        #[arg(long)]
        plugin_dir: Option<PathBuf>,
    },
}
