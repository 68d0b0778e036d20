//! Maps, layers and tile encoding
//!
//! An [`Atlas`] is the registry of configured [`Map`]s. A tile request picks
//! a map, narrows its layers with [`Map::filter_layers_by_zoom`] and
//! [`Map::filter_layers_by_name`], then calls [`Map::encode`].
//!
//! # Example
//!
//! ```
//! use tessera::atlas::Map;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let map = Map::new_web_mercator("debug").add_debug_layers();
//! let tile = map.tile(3, 2, 1).unwrap();
//! let bytes = map
//!     .filter_layers_by_zoom(tile.zoom())
//!     .encode(&CancellationToken::new(), &tile)
//!     .await
//!     .unwrap();
//! assert!(!bytes.is_empty());
//! # });
//! ```

mod encode;
mod layer;
mod map;

pub use encode::{encode_layers, EncodeError, EncodeReport, EncodedTile};
pub use layer::Layer;
pub use map::Map;

use crate::provider::ProviderError;
use thiserror::Error;

/// Errors raised while building or validating an atlas.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AtlasError {
    #[error("Duplicate map name '{0}'")]
    DuplicateMap(String),

    #[error("Map '{map}': provider '{provider}' has no layer '{layer}'")]
    UnknownProviderLayer {
        map: String,
        provider: String,
        layer: String,
    },

    #[error("Map '{map}': {source}")]
    Provider {
        map: String,
        #[source]
        source: ProviderError,
    },
}

/// Ordered registry of maps.
#[derive(Debug, Clone, Default)]
pub struct Atlas {
    maps: Vec<Map>,
}

impl Atlas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a map. Names must be unique.
    pub fn add_map(&mut self, map: Map) -> Result<(), AtlasError> {
        if self.map(&map.name).is_some() {
            return Err(AtlasError::DuplicateMap(map.name));
        }
        self.maps.push(map);
        Ok(())
    }

    pub fn map(&self, name: &str) -> Option<&Map> {
        self.maps.iter().find(|m| m.name == name)
    }

    pub fn maps(&self) -> &[Map] {
        &self.maps
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Check that every layer names a layer its provider actually serves.
    pub fn validate(&self) -> Result<(), AtlasError> {
        for map in &self.maps {
            for layer in &map.layers {
                let provider = layer.provider();
                let available = provider.layers().map_err(|source| AtlasError::Provider {
                    map: map.name.clone(),
                    source,
                })?;

                if !available
                    .iter()
                    .any(|info| info.name == layer.provider_layer_name())
                {
                    return Err(AtlasError::UnknownProviderLayer {
                        map: map.name.clone(),
                        provider: provider.name().to_string(),
                        layer: layer.provider_layer_name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
