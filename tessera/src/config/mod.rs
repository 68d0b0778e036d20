//! Configuration file support.
//!
//! The configuration file declares providers and maps in INI format. The
//! default location is `<config dir>/tessera/config.ini`.

mod file;
mod parser;

pub use file::{
    config_directory, config_file_path, ConfigError, ConfigFile, MapLayerSection, MapSection,
    ProviderSection,
};
