//! Debug provider.
//!
//! Draws the outline of the buffered tile and a labelled point at its
//! center. Useful for checking tile boundaries in a client.

use crate::coord::{TileCoord, WEB_MERCATOR};
use crate::geometry::GeomType;
use crate::provider::{BoxFuture, Feature, FeatureSink, LayerInfo, ProviderError, TileProvider};
use geo_types::{coord, Geometry, LineString, Point};
use tokio_util::sync::CancellationToken;

pub const DEBUG_PROVIDER_NAME: &str = "debug";
pub const LAYER_TILE_OUTLINE: &str = "debug-tile-outline";
pub const LAYER_TILE_CENTER: &str = "debug-tile-center";

/// Provider serving the debug layers for any tile.
#[derive(Debug, Clone, Default)]
pub struct DebugProvider;

impl DebugProvider {
    pub fn new() -> Self {
        Self
    }

    fn outline(tile: &TileCoord) -> Feature {
        let extent = tile.extent();
        let ring = LineString::new(vec![
            coord! { x: extent.min.x, y: extent.min.y },
            coord! { x: extent.max.x, y: extent.min.y },
            coord! { x: extent.max.x, y: extent.max.y },
            coord! { x: extent.min.x, y: extent.max.y },
            coord! { x: extent.min.x, y: extent.min.y },
        ]);

        Feature::new(Geometry::LineString(ring), WEB_MERCATOR)
            .with_id(0)
            .with_tag("type", "debug_buffer_outline")
    }

    fn center(tile: &TileCoord) -> Feature {
        let center = tile.extent().center();
        let (z, x, y) = tile.zxy();

        Feature::new(Geometry::Point(Point::new(center.x, center.y)), WEB_MERCATOR)
            .with_id(1)
            .with_tag("type", "debug_text")
            .with_tag("zxy", format!("Z{}, X{}, Y{}", z, x, y))
    }
}

impl TileProvider for DebugProvider {
    fn tile_features<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        layer: &'a str,
        tile: &'a TileCoord,
        on_feature: &'a mut FeatureSink<'a>,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }

            let feature = match layer {
                LAYER_TILE_OUTLINE => Self::outline(tile),
                LAYER_TILE_CENTER => Self::center(tile),
                other => {
                    return Err(ProviderError::UnknownLayer {
                        provider: DEBUG_PROVIDER_NAME.to_string(),
                        layer: other.to_string(),
                    })
                }
            };
            on_feature(feature)
        })
    }

    fn layers(&self) -> Result<Vec<LayerInfo>, ProviderError> {
        Ok(vec![
            LayerInfo {
                name: LAYER_TILE_OUTLINE.to_string(),
                geom_type: GeomType::LineString,
                srid: WEB_MERCATOR,
            },
            LayerInfo {
                name: LAYER_TILE_CENTER.to_string(),
                geom_type: GeomType::Point,
                srid: WEB_MERCATOR,
            },
        ])
    }

    fn name(&self) -> &str {
        DEBUG_PROVIDER_NAME
    }
}
