//! Layer configuration entity.

use crate::geometry::GeomType;
use crate::provider::{TagValue, Tags, TileProvider};
use std::fmt;
use std::sync::Arc;

/// A map layer: one provider layer rendered under a display name within a
/// zoom range.
///
/// A zoom bound of 0 means unbounded on that side.
#[derive(Clone)]
pub struct Layer {
    name: String,
    provider_layer_name: String,
    min_zoom: u8,
    max_zoom: u8,
    provider: Arc<dyn TileProvider>,
    geom_type: GeomType,
    default_tags: Tags,
}

impl Layer {
    /// Layer reading `provider_layer_name` from `provider`, active at every
    /// zoom, with no display name.
    pub fn new(provider_layer_name: impl Into<String>, provider: Arc<dyn TileProvider>) -> Self {
        Self {
            name: String::new(),
            provider_layer_name: provider_layer_name.into(),
            min_zoom: 0,
            max_zoom: 0,
            provider,
            geom_type: GeomType::Unknown,
            default_tags: Tags::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_geom_type(mut self, geom_type: GeomType) -> Self {
        self.geom_type = geom_type;
        self
    }

    pub fn with_default_tag(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.default_tags.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider_layer_name(&self) -> &str {
        &self.provider_layer_name
    }

    /// Name written to the tile: the display name, or the provider layer
    /// name when no display name is set.
    pub fn output_name(&self) -> &str {
        if self.name.is_empty() {
            &self.provider_layer_name
        } else {
            &self.name
        }
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub fn provider(&self) -> &Arc<dyn TileProvider> {
        &self.provider
    }

    pub fn geom_type(&self) -> GeomType {
        self.geom_type
    }

    pub fn default_tags(&self) -> &Tags {
        &self.default_tags
    }

    /// Returns true if the layer is rendered at `zoom`.
    pub fn is_active_at(&self, zoom: u8) -> bool {
        (self.min_zoom <= zoom || self.min_zoom == 0) && (self.max_zoom >= zoom || self.max_zoom == 0)
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("name", &self.name)
            .field("provider_layer_name", &self.provider_layer_name)
            .field("min_zoom", &self.min_zoom)
            .field("max_zoom", &self.max_zoom)
            .field("provider", &self.provider.name())
            .field("geom_type", &self.geom_type)
            .field("default_tags", &self.default_tags)
            .finish()
    }
}
