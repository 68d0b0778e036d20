//! Common utilities shared across CLI commands.

use std::path::Path;
use tessera::config::ConfigFile;
use tessera::provider::ProviderFactory;
use tessera::Atlas;
use tracing::info;

use crate::error::CliError;

/// Load the configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}

/// Load the configuration and build its atlas.
pub fn load_atlas(path: Option<&Path>) -> Result<Atlas, CliError> {
    let config = load_config(path)?;
    let atlas = config.build_atlas(&ProviderFactory::new())?;
    info!(maps = atlas.maps().len(), "Atlas ready");
    Ok(atlas)
}
