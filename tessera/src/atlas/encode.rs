//! Concurrent tile encoding.
//!
//! One task per layer fetches and converts features from the layer's
//! provider into a private buffer. The task handles are kept in layer order
//! and joined in a single barrier, so the output order never depends on
//! which provider answers first. A failing layer is logged and left out;
//! cancellation observed after the barrier discards the whole tile.

use super::layer::Layer;
use crate::coord::{TileCoord, WEB_MERCATOR};
use crate::geometry::{self, ConversionError};
use crate::provider::{Feature, ProviderError};
use crate::tile::{AssembleError, TileAssembler, TileFeature, TileLayer};
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Errors that abort a tile request.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The request was cancelled before the tile was assembled
    #[error("Tile request cancelled")]
    Cancelled,

    /// Serialisation of the assembled layers failed
    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

impl EncodeError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EncodeError::Cancelled)
    }
}

/// Which layers made it into a tile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EncodeReport {
    /// Number of layers requested
    pub requested: usize,
    /// Output names of layers that were encoded, in order
    pub encoded: Vec<String>,
    /// Output names of layers dropped because their fetch failed
    pub failed: Vec<String>,
}

impl EncodeReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// An encoded tile together with its report.
#[derive(Debug, Clone)]
pub struct EncodedTile {
    pub bytes: Vec<u8>,
    pub report: EncodeReport,
}

/// Encode `layers` for `tile`.
///
/// # Errors
///
/// Returns [`EncodeError::Cancelled`] if `cancel` fired at any point before
/// the barrier completed. Per-layer failures are not errors; see
/// [`EncodeReport::failed`].
pub async fn encode_layers(
    cancel: &CancellationToken,
    tile: &TileCoord,
    layers: &[Layer],
    extent: u32,
) -> Result<EncodedTile, EncodeError> {
    let (z, x, y) = tile.zxy();

    let handles: Vec<JoinHandle<Result<TileLayer, ProviderError>>> = layers
        .iter()
        .map(|layer| {
            let layer = layer.clone();
            let cancel = cancel.clone();
            let tile = *tile;
            tokio::spawn(async move { fetch_layer(&cancel, &tile, &layer).await })
        })
        .collect();

    let results = join_all(handles).await;

    if cancel.is_cancelled() {
        debug!(z, x, y, "Tile request cancelled, discarding layer results");
        return Err(EncodeError::Cancelled);
    }

    let mut report = EncodeReport {
        requested: layers.len(),
        ..Default::default()
    };
    let mut tile_layers = Vec::with_capacity(layers.len());

    for (layer, result) in layers.iter().zip(results) {
        let name = layer.output_name();
        match result {
            Ok(Ok(tile_layer)) => {
                report.encoded.push(name.to_string());
                tile_layers.push(tile_layer);
            }
            Ok(Err(e)) if e.is_cancelled() => {
                debug!(z, x, y, layer = name, "Layer fetch cancelled");
                report.failed.push(name.to_string());
            }
            Ok(Err(e)) => {
                warn!(
                    z, x, y,
                    layer = name,
                    provider = layer.provider().name(),
                    error = %e,
                    "Failed to fetch layer, dropping it from tile"
                );
                report.failed.push(name.to_string());
            }
            Err(e) => {
                warn!(z, x, y, layer = name, error = %e, "Layer task panicked, dropping it from tile");
                report.failed.push(name.to_string());
            }
        }
    }

    let bytes = TileAssembler::new(*tile)
        .with_extent(extent)
        .assemble(&tile_layers)?;

    debug!(
        z, x, y,
        requested = report.requested,
        encoded = report.encoded.len(),
        failed = report.failed.len(),
        bytes = bytes.len(),
        "Encoded tile"
    );

    Ok(EncodedTile { bytes, report })
}

/// Stream one layer's features into its own buffer.
async fn fetch_layer(
    cancel: &CancellationToken,
    tile: &TileCoord,
    layer: &Layer,
) -> Result<TileLayer, ProviderError> {
    let mut tile_layer = TileLayer::new(layer.output_name());
    let defaults = layer.default_tags();

    let mut on_feature = |feature: Feature| -> Result<(), ProviderError> {
        if feature.srid != WEB_MERCATOR {
            return Err(ConversionError::Unsupported(format!(
                "features in SRID {} (expected {})",
                feature.srid, WEB_MERCATOR
            ))
            .into());
        }

        let geometry = geometry::convert(&feature.geometry)?;
        let mut tags = feature.tags;
        for (key, value) in defaults {
            tags.entry(key.clone()).or_insert_with(|| value.clone());
        }

        tile_layer.push(TileFeature {
            id: feature.id,
            geometry,
            tags,
        });
        Ok(())
    };

    layer
        .provider()
        .tile_features(cancel, layer.provider_layer_name(), tile, &mut on_feature)
        .await?;

    Ok(tile_layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockLayer, MockProvider, TagValue, TileProvider};
    use geo_types::{point, Geometry};
    use mvt_reader::Reader;
    use std::sync::Arc;
    use std::time::Duration;

    fn point_feature(tile: &TileCoord, id: u64) -> Feature {
        let c = tile.extent().center();
        Feature::new(Geometry::Point(point!(x: c.x, y: c.y)), WEB_MERCATOR).with_id(id)
    }

    fn layer_names(bytes: Vec<u8>) -> Vec<String> {
        Reader::new(bytes).unwrap().get_layer_names().unwrap()
    }

    #[tokio::test]
    async fn test_default_tags_fill_only_missing() {
        let tile = TileCoord::new(5, 10, 12).unwrap();
        let feature = point_feature(&tile, 1).with_tag("class", "river");
        let provider: Arc<dyn TileProvider> = Arc::new(MockProvider::new("mock").with_layer(
            "water",
            MockLayer {
                features: vec![feature],
                ..Default::default()
            },
        ));
        let layer = Layer::new("water", provider)
            .with_default_tag("class", "lake")
            .with_default_tag("source", "osm");

        let cancel = CancellationToken::new();
        let tile_layer = fetch_layer(&cancel, &tile, &layer).await.unwrap();

        let tags = &tile_layer.features[0].tags;
        assert_eq!(tags.get("class"), Some(&TagValue::from("river")));
        assert_eq!(tags.get("source"), Some(&TagValue::from("osm")));
    }

    #[tokio::test]
    async fn test_conversion_failure_fails_layer() {
        let tile = TileCoord::new(0, 0, 0).unwrap();
        let bad = Feature::new(
            Geometry::GeometryCollection(geo_types::GeometryCollection::default()),
            WEB_MERCATOR,
        );
        let provider: Arc<dyn TileProvider> = Arc::new(MockProvider::new("mock").with_layer(
            "mixed",
            MockLayer {
                features: vec![bad],
                ..Default::default()
            },
        ));
        let layer = Layer::new("mixed", provider);

        let cancel = CancellationToken::new();
        let result = fetch_layer(&cancel, &tile, &layer).await;
        assert!(matches!(result, Err(ProviderError::Conversion(_))));
    }

    #[tokio::test]
    async fn test_foreign_srid_fails_layer() {
        let tile = TileCoord::new(0, 0, 0).unwrap();
        let feature = Feature::new(Geometry::Point(point!(x: 13.4, y: 52.5)), crate::coord::WGS84);
        let provider: Arc<dyn TileProvider> = Arc::new(MockProvider::new("mock").with_layer(
            "cities",
            MockLayer {
                features: vec![feature],
                ..Default::default()
            },
        ));
        let layer = Layer::new("cities", provider);

        let cancel = CancellationToken::new();
        let result = fetch_layer(&cancel, &tile, &layer).await;
        assert!(matches!(result, Err(ProviderError::Conversion(_))));
    }

    #[tokio::test]
    async fn test_failed_layer_reported_and_dropped() {
        let tile = TileCoord::new(3, 4, 2).unwrap();
        let provider: Arc<dyn TileProvider> = Arc::new(
            MockProvider::new("mock")
                .with_layer(
                    "ok",
                    MockLayer {
                        features: vec![point_feature(&tile, 1)],
                        ..Default::default()
                    },
                )
                .with_layer(
                    "broken",
                    MockLayer {
                        error: Some("connection reset".to_string()),
                        ..Default::default()
                    },
                ),
        );
        let layers = vec![
            Layer::new("ok", provider.clone()),
            Layer::new("broken", provider),
        ];

        let cancel = CancellationToken::new();
        let encoded = encode_layers(&cancel, &tile, &layers, 4096).await.unwrap();

        assert_eq!(encoded.report.requested, 2);
        assert_eq!(encoded.report.encoded, vec!["ok"]);
        assert_eq!(encoded.report.failed, vec!["broken"]);
        assert!(!encoded.report.is_complete());
        assert_eq!(layer_names(encoded.bytes), vec!["ok"]);
    }

    #[tokio::test]
    async fn test_cancelled_before_any_provider_completes() {
        let tile = TileCoord::new(3, 4, 2).unwrap();
        let provider: Arc<dyn TileProvider> = Arc::new(MockProvider::new("mock").with_layer(
            "slow",
            MockLayer {
                features: vec![point_feature(&tile, 1)],
                delay: Some(Duration::from_secs(30)),
                ..Default::default()
            },
        ));
        let layers = vec![Layer::new("slow", provider)];

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = encode_layers(&cancel, &tile, &layers, 4096).await;
        assert!(matches!(result, Err(EncodeError::Cancelled)));
    }

    #[tokio::test]
    async fn test_no_layers_gives_empty_tile() {
        let tile = TileCoord::new(1, 0, 0).unwrap();
        let cancel = CancellationToken::new();

        let encoded = encode_layers(&cancel, &tile, &[], 4096).await.unwrap();
        assert_eq!(encoded.report, EncodeReport::default());
        assert!(layer_names(encoded.bytes).is_empty());
    }
}
