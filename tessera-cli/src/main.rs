//! Tessera CLI - Command-line interface
//!
//! Checks configuration files, lists map layers and renders single tiles
//! to disk.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::render::RenderArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(version, about = "Render Mapbox Vector Tiles from configured providers", long_about = None)]
struct Cli {
    /// Configuration file (defaults to <config dir>/tessera/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the configuration file and summarize its maps
    Validate,

    /// List the layers of every map, or of one map
    Layers {
        /// Map to list
        map: Option<String>,
    },

    /// Render one tile to a file
    Render(RenderArgs),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = tessera::logging::init_logging(&cli.log_level) {
        CliError::LoggingInit(e.to_string()).exit();
    }

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Validate => commands::validate::run(config),
        Commands::Layers { map } => commands::layers::run(config, map.as_deref()),
        Commands::Render(args) => commands::render::run(config, args),
    };

    if let Err(e) = result {
        e.exit();
    }
}
