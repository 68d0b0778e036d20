//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;
use tessera::config::ConfigError;
use tessera::EncodeError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be loaded or built
    Config(ConfigError),
    /// Invalid command-line arguments
    Usage(String),
    /// Failed to create the async runtime
    Runtime(std::io::Error),
    /// Tile encoding failed
    Encode(EncodeError),
    /// Failed to compress the tile
    Compress(std::io::Error),
    /// Failed to write output file
    FileWrite { path: String, error: std::io::Error },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Config(ConfigError::NotFound(_)) => {
                eprintln!();
                eprintln!("Create a configuration file or pass one with --config <path>.");
            }
            CliError::Config(ConfigError::Provider { .. }) => {
                eprintln!();
                eprintln!("PostGIS providers need a database connector, which this binary");
                eprintln!("does not include. Use the library API to register one.");
            }
            CliError::Encode(EncodeError::Cancelled) => process::exit(130),
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Usage(msg) => write!(f, "{}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::Encode(e) => write!(f, "Failed to encode tile: {}", e),
            CliError::Compress(e) => write!(f, "Failed to compress tile: {}", e),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Encode(e) => Some(e),
            CliError::Compress(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<EncodeError> for CliError {
    fn from(e: EncodeError) -> Self {
        CliError::Encode(e)
    }
}
