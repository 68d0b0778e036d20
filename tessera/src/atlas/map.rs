//! Map configuration entity and layer registry.

use super::encode::{encode_layers, EncodeError, EncodedTile};
use super::layer::Layer;
use crate::coord::{
    CoordError, TileCoord, DEFAULT_TILE_BUFFER, DEFAULT_TILE_EXTENT, MAX_LAT, MAX_LON, MAX_ZOOM,
    MIN_LAT, MIN_LON, WEB_MERCATOR,
};
use crate::geometry::GeomType;
use crate::provider::{DebugProvider, TileProvider, LAYER_TILE_CENTER, LAYER_TILE_OUTLINE};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A named, ordered collection of layers with its tile parameters.
///
/// A `Map` is shared read-only across requests. The filter and augmentation
/// methods return a new `Map`; the original is never modified.
#[derive(Debug, Clone)]
pub struct Map {
    pub name: String,
    pub attribution: String,
    /// west, south, east, north in degrees
    pub bounds: [f64; 4],
    /// longitude, latitude, zoom
    pub center: [f64; 3],
    pub layers: Vec<Layer>,
    pub srid: u64,
    pub tile_extent: u32,
    /// Buffer in units of `tile_extent`
    pub tile_buffer: u32,
}

impl Map {
    /// Empty Web Mercator map with default extent and buffer.
    pub fn new_web_mercator(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribution: String::new(),
            bounds: [MIN_LON, MIN_LAT, MAX_LON, MAX_LAT],
            center: [0.0, 0.0, 0.0],
            layers: Vec::new(),
            srid: WEB_MERCATOR,
            tile_extent: DEFAULT_TILE_EXTENT,
            tile_buffer: DEFAULT_TILE_BUFFER,
        }
    }

    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    fn with_layers(&self, layers: Vec<Layer>) -> Self {
        Self {
            name: self.name.clone(),
            attribution: self.attribution.clone(),
            bounds: self.bounds,
            center: self.center,
            layers,
            srid: self.srid,
            tile_extent: self.tile_extent,
            tile_buffer: self.tile_buffer,
        }
    }

    /// Copy of the map holding only the layers active at `zoom`.
    pub fn filter_layers_by_zoom(&self, zoom: u8) -> Map {
        self.with_layers(
            self.layers
                .iter()
                .filter(|l| l.is_active_at(zoom))
                .cloned()
                .collect(),
        )
    }

    /// Copy of the map holding only the named layers, in map order.
    ///
    /// A layer matches on its display name, or on its provider layer name
    /// when it has no display name match. Matching is exact.
    pub fn filter_layers_by_name<S: AsRef<str>>(&self, names: &[S]) -> Map {
        let wanted: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();

        self.with_layers(
            self.layers
                .iter()
                .filter(|l| {
                    (!l.name().is_empty() && wanted.contains(l.name()))
                        || (!l.provider_layer_name().is_empty()
                            && wanted.contains(l.provider_layer_name()))
                })
                .cloned()
                .collect(),
        )
    }

    /// Copy of the map with the tile outline and tile center layers
    /// appended.
    pub fn add_debug_layers(&self) -> Map {
        let provider: Arc<dyn TileProvider> = Arc::new(DebugProvider::new());

        let mut layers = self.layers.clone();
        layers.push(
            Layer::new(LAYER_TILE_OUTLINE, provider.clone())
                .with_name(LAYER_TILE_OUTLINE)
                .with_zoom_range(0, MAX_ZOOM)
                .with_geom_type(GeomType::LineString),
        );
        layers.push(
            Layer::new(LAYER_TILE_CENTER, provider)
                .with_name(LAYER_TILE_CENTER)
                .with_zoom_range(0, MAX_ZOOM)
                .with_geom_type(GeomType::Point),
        );
        self.with_layers(layers)
    }

    /// Tile coordinate carrying this map's buffer.
    ///
    /// `tile_buffer` counts units of this map's `tile_extent`; the coordinate
    /// stores it against the 4096-unit default extent.
    pub fn tile(&self, zoom: u8, col: u32, row: u32) -> Result<TileCoord, CoordError> {
        let scale = DEFAULT_TILE_EXTENT as f64 / self.tile_extent.max(1) as f64;
        Ok(TileCoord::new(zoom, col, row)?.with_buffer(self.tile_buffer as f64 * scale))
    }

    /// Encode every layer of this map for `tile`.
    ///
    /// Callers filter the map first; no zoom filtering happens here.
    pub async fn encode(
        &self,
        cancel: &CancellationToken,
        tile: &TileCoord,
    ) -> Result<Vec<u8>, EncodeError> {
        Ok(self.encode_with_report(cancel, tile).await?.bytes)
    }

    /// Like [`Map::encode`], also reporting which layers failed.
    pub async fn encode_with_report(
        &self,
        cancel: &CancellationToken,
        tile: &TileCoord,
    ) -> Result<EncodedTile, EncodeError> {
        encode_layers(cancel, tile, &self.layers, self.tile_extent).await
    }
}
