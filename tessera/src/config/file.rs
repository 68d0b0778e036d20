//! Configuration file handling.
//!
//! Loads the INI configuration describing providers and maps, and builds
//! an [`Atlas`] from it. Parsing lives in [`super::parser`].

use crate::atlas::{Atlas, AtlasError, Layer, Map};
use crate::geometry::GeomType;
use crate::provider::{ProviderConfig, ProviderError, ProviderFactory, Tags, TileProvider};
use ini::{Ini, ParseOption};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file does not exist
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    Read(#[from] ini::Error),

    /// Config text is not valid INI
    #[error("Failed to parse config: {0}")]
    Parse(#[from] ini::ParseError),

    /// Section name does not match any known pattern
    #[error("Unknown section [{0}]")]
    UnknownSection(String),

    /// Key not recognised in its section
    #[error("Unknown key '{key}' in section [{section}]")]
    UnknownKey { section: String, key: String },

    /// Required key absent
    #[error("Missing required key '{key}' in section [{section}]")]
    MissingKey { section: String, key: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// A layer references a provider that is not configured
    #[error("Section [{section}] references unknown provider '{provider}'")]
    UnknownProvider { section: String, provider: String },

    /// Provider configuration rejected
    #[error("Provider '{name}': {source}")]
    Provider {
        name: String,
        #[source]
        source: ProviderError,
    },

    /// Maps could not be assembled into an atlas
    #[error(transparent)]
    Atlas(#[from] AtlasError),
}

/// A configured provider.
#[derive(Debug, Clone)]
pub struct ProviderSection {
    pub name: String,
    pub config: ProviderConfig,
}

/// A configured map layer.
#[derive(Debug, Clone, PartialEq)]
pub struct MapLayerSection {
    /// Display name of the layer
    pub name: String,
    pub provider: String,
    pub provider_layer: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub geom_type: GeomType,
    pub default_tags: Tags,
}

/// A configured map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSection {
    pub name: String,
    pub attribution: String,
    pub bounds: [f64; 4],
    pub center: [f64; 3],
    pub srid: u64,
    pub tile_extent: u32,
    pub tile_buffer: u32,
    pub layers: Vec<MapLayerSection>,
}

impl MapSection {
    /// Map with defaults taken from [`Map::new_web_mercator`].
    pub fn new(name: &str) -> Self {
        let defaults = Map::new_web_mercator(name);
        Self {
            name: defaults.name,
            attribution: defaults.attribution,
            bounds: defaults.bounds,
            center: defaults.center,
            srid: defaults.srid,
            tile_extent: defaults.tile_extent,
            tile_buffer: defaults.tile_buffer,
            layers: Vec::new(),
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    /// Providers in file order
    pub providers: Vec<ProviderSection>,
    /// Maps in file order
    pub maps: Vec<MapSection>,
}

fn parse_option() -> ParseOption {
    // SQL templates may contain backslashes
    ParseOption {
        enabled_escape: false,
        ..ParseOption::default()
    }
}

impl ConfigFile {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let ini = Ini::load_from_file_opt(path, parse_option())?;
        let config = super::parser::parse_ini(&ini)?;
        info!(
            path = %path.display(),
            providers = config.providers.len(),
            maps = config.maps.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str_opt(text, parse_option())?;
        super::parser::parse_ini(&ini)
    }

    /// Create every provider and assemble the maps into a validated atlas.
    pub fn build_atlas(&self, factory: &ProviderFactory) -> Result<Atlas, ConfigError> {
        let mut providers: HashMap<&str, Arc<dyn TileProvider>> = HashMap::new();
        for section in &self.providers {
            let provider = factory
                .create(&section.name, &section.config)
                .map_err(|source| ConfigError::Provider {
                    name: section.name.clone(),
                    source,
                })?;
            debug!(provider = %section.name, kind = section.config.kind(), "Created provider");
            providers.insert(section.name.as_str(), provider);
        }

        let mut atlas = Atlas::new();
        for section in &self.maps {
            let mut map = Map::new_web_mercator(&section.name);
            map.attribution = section.attribution.clone();
            map.bounds = section.bounds;
            map.center = section.center;
            map.srid = section.srid;
            map.tile_extent = section.tile_extent;
            map.tile_buffer = section.tile_buffer;

            for layer in &section.layers {
                let provider = providers.get(layer.provider.as_str()).ok_or_else(|| {
                    ConfigError::UnknownProvider {
                        section: format!("map.{}.layer.{}", section.name, layer.name),
                        provider: layer.provider.clone(),
                    }
                })?;

                let mut built = Layer::new(&layer.provider_layer, provider.clone())
                    .with_name(&layer.name)
                    .with_zoom_range(layer.min_zoom, layer.max_zoom)
                    .with_geom_type(layer.geom_type);
                for (key, value) in &layer.default_tags {
                    built = built.with_default_tag(key.clone(), value.clone());
                }
                map = map.with_layer(built);
            }

            atlas.add_map(map)?;
        }

        atlas.validate()?;
        Ok(atlas)
    }
}

/// Get the path to the config directory.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tessera")
}

/// Get the path to the default config file.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
