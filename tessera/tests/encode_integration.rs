//! Integration tests for tile encoding.
//!
//! These tests drive the public API end to end:
//! - configuration text → atlas → filtered map → MVT bytes
//! - partial failure and cancellation behavior of the encoder
//! - layer ordering under providers that answer out of order
//!
//! Run with: `cargo test --test encode_integration`

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use geo_types::{Geometry, Point};
use mvt_reader::Reader;
use tokio_util::sync::CancellationToken;

use tessera::config::ConfigFile;
use tessera::coord::WEB_MERCATOR;
use tessera::provider::postgis::{ColumnValue, QueryExecutor, Row};
use tessera::provider::{
    BoxFuture, Feature, FeatureSink, LayerInfo, ProviderError, ProviderFactory, TagValue,
    TileProvider,
};
use tessera::{EncodeError, Layer, Map, TileCoord};

// ============================================================================
// Helper Types
// ============================================================================

/// How a scripted layer answers.
#[derive(Clone, Default)]
struct Script {
    delay: Duration,
    features: usize,
    fail: bool,
}

/// Provider whose layers follow a fixed script.
struct ScriptedProvider {
    layers: HashMap<String, Script>,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self {
            layers: HashMap::new(),
        }
    }

    fn layer(mut self, name: &str, script: Script) -> Self {
        self.layers.insert(name.to_string(), script);
        self
    }
}

impl TileProvider for ScriptedProvider {
    fn tile_features<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        layer: &'a str,
        tile: &'a TileCoord,
        on_feature: &'a mut FeatureSink<'a>,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            let script = self
                .layers
                .get(layer)
                .ok_or_else(|| ProviderError::UnknownLayer {
                    provider: "scripted".to_string(),
                    layer: layer.to_string(),
                })?;

            tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(script.delay) => {}
            }

            if script.fail {
                return Err(ProviderError::Backend("relation does not exist".to_string()));
            }

            let center = tile.extent().center();
            for id in 0..script.features {
                let feature = Feature::new(
                    Geometry::Point(Point::new(center.x, center.y)),
                    WEB_MERCATOR,
                )
                .with_id(id as u64)
                .with_tag("layer", layer);
                on_feature(feature)?;
            }
            Ok(())
        })
    }

    fn layers(&self) -> Result<Vec<LayerInfo>, ProviderError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Executor returning one road row and recording every query.
struct RoadExecutor {
    queries: Mutex<Vec<String>>,
}

impl QueryExecutor for RoadExecutor {
    fn query<'a>(
        &'a self,
        _cancel: &'a CancellationToken,
        sql: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Row>, ProviderError>> {
        Box::pin(async move {
            self.queries.lock().unwrap().push(sql.to_string());
            let center = TileCoord::new(2, 1, 1).unwrap().extent().center();
            Ok(vec![vec![
                ("gid".to_string(), ColumnValue::Value(TagValue::Int(42))),
                (
                    "class".to_string(),
                    ColumnValue::Value(TagValue::from("primary")),
                ),
                ("name".to_string(), ColumnValue::Null),
                (
                    "geom".to_string(),
                    ColumnValue::Geometry(Geometry::Point(Point::new(center.x, center.y))),
                ),
            ]])
        })
    }
}

fn scripted_map(scripts: &[(&str, Script)]) -> Map {
    let mut provider = ScriptedProvider::new();
    for (name, script) in scripts {
        provider = provider.layer(name, script.clone());
    }
    let provider: Arc<dyn TileProvider> = Arc::new(provider);

    scripts.iter().fold(Map::new_web_mercator("scripted"), |map, (name, _)| {
        map.with_layer(Layer::new(*name, provider.clone()))
    })
}

fn layer_names(bytes: &[u8]) -> Vec<String> {
    Reader::new(bytes.to_vec())
        .unwrap()
        .get_layer_names()
        .unwrap()
}

fn ok(delay_ms: u64) -> Script {
    Script {
        delay: Duration::from_millis(delay_ms),
        features: 1,
        fail: false,
    }
}

const DEBUG_CONFIG: &str = r#"
[provider.debug]
type = debug

[map.osm]
attribution = Tessera
tile_buffer = 64

[map.osm.layer.outline]
provider = debug.debug-tile-outline
max_zoom = 12

[map.osm.layer.center]
provider = debug.debug-tile-center
default_tags.source = debug
"#;

// ============================================================================
// Integration Tests
// ============================================================================

/// Layers appear in configuration order however long each provider takes.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_layer_order_independent_of_completion_order() {
    let map = scripted_map(&[("first", ok(80)), ("second", ok(0)), ("third", ok(40))]);
    let tile = map.tile(4, 3, 5).unwrap();

    let bytes = map.encode(&CancellationToken::new(), &tile).await.unwrap();

    assert_eq!(layer_names(&bytes), vec!["first", "second", "third"]);
}

/// A failing provider costs only its own layer.
#[tokio::test]
async fn test_failing_layer_is_omitted() {
    let broken = Script {
        fail: true,
        ..ok(0)
    };
    let map = scripted_map(&[("land", ok(0)), ("water", broken), ("roads", ok(10))]);
    let tile = map.tile(6, 10, 20).unwrap();

    let encoded = map
        .encode_with_report(&CancellationToken::new(), &tile)
        .await
        .unwrap();

    assert_eq!(layer_names(&encoded.bytes), vec!["land", "roads"]);
    assert_eq!(encoded.report.failed, vec!["water"]);
    assert_eq!(encoded.report.requested, 3);
}

/// Every layer failing still yields a valid, empty tile.
#[tokio::test]
async fn test_all_layers_failing_gives_empty_tile() {
    let broken = Script {
        fail: true,
        ..ok(0)
    };
    let map = scripted_map(&[("a", broken.clone()), ("b", broken)]);
    let tile = map.tile(1, 0, 1).unwrap();

    let encoded = map
        .encode_with_report(&CancellationToken::new(), &tile)
        .await
        .unwrap();

    assert!(layer_names(&encoded.bytes).is_empty());
    assert!(encoded.report.encoded.is_empty());
}

/// Cancelling while providers are still working fails the request.
#[tokio::test]
async fn test_cancellation_mid_flight() {
    let map = scripted_map(&[("fast", ok(0)), ("slow", ok(10_000))]);
    let tile = map.tile(8, 100, 100).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), map.encode(&cancel, &tile))
        .await
        .expect("encoder should stop promptly after cancellation");

    assert!(matches!(result, Err(EncodeError::Cancelled)));
}

/// Encoding the same tile twice gives identical bytes.
#[tokio::test]
async fn test_encoding_is_deterministic() {
    let map = Map::new_web_mercator("debug").add_debug_layers();
    let tile = map.tile(9, 270, 180).unwrap();
    let cancel = CancellationToken::new();

    let first = map.encode(&cancel, &tile).await.unwrap();
    let second = map.encode(&cancel, &tile).await.unwrap();

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

/// Configuration text through to decoded tile content.
#[tokio::test]
async fn test_config_to_tile() {
    let config = ConfigFile::parse(DEBUG_CONFIG).unwrap();
    let atlas = config.build_atlas(&ProviderFactory::new()).unwrap();
    let map = atlas.map("osm").unwrap();

    let tile = map.tile(2, 1, 1).unwrap();
    let bytes = map
        .filter_layers_by_zoom(tile.zoom())
        .encode(&CancellationToken::new(), &tile)
        .await
        .unwrap();

    let reader = Reader::new(bytes).unwrap();
    assert_eq!(reader.get_layer_names().unwrap(), vec!["outline", "center"]);

    let center = reader.get_features(1).unwrap();
    assert_eq!(center.len(), 1);
    assert_eq!(center[0].id, Some(1));
    let properties = format!("{:?}", center[0].properties);
    assert!(properties.contains("Z2, X1, Y1"));
    assert!(properties.contains("debug"));
}

/// Zoom and name filters compose before encoding.
#[tokio::test]
async fn test_config_filters_compose() {
    let config = ConfigFile::parse(DEBUG_CONFIG).unwrap();
    let atlas = config.build_atlas(&ProviderFactory::new()).unwrap();
    let map = atlas.map("osm").unwrap();

    // outline stops at zoom 12
    let tile = map.tile(14, 8800, 5370).unwrap();
    let bytes = map
        .filter_layers_by_zoom(tile.zoom())
        .encode(&CancellationToken::new(), &tile)
        .await
        .unwrap();
    assert_eq!(layer_names(&bytes), vec!["center"]);

    let tile = map.tile(3, 4, 2).unwrap();
    let bytes = map
        .filter_layers_by_zoom(tile.zoom())
        .filter_layers_by_name(&["outline"])
        .encode(&CancellationToken::new(), &tile)
        .await
        .unwrap();
    assert_eq!(layer_names(&bytes), vec!["outline"]);
}

/// A PostGIS provider built from configuration renders its SQL per tile.
#[tokio::test]
async fn test_postgis_config_to_tile() {
    let config = ConfigFile::parse(
        r#"
[provider.osm]
type = postgis
host = localhost
database = gis
user = tiles

[provider.osm.layer.roads]
tablename = osm_roads
fields = class,name

[map.streets.layer.roads]
provider = osm.roads
"#,
    )
    .unwrap();

    let executor = Arc::new(RoadExecutor {
        queries: Mutex::new(Vec::new()),
    });
    let shared = executor.clone();
    let factory = ProviderFactory::new().with_postgis_connector(move |_config| {
        Ok(shared.clone() as Arc<dyn QueryExecutor>)
    });

    let atlas = config.build_atlas(&factory).unwrap();
    let map = atlas.map("streets").unwrap();
    let tile = map.tile(2, 1, 1).unwrap();
    let bytes = map.encode(&CancellationToken::new(), &tile).await.unwrap();

    let queries = executor.queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains("FROM osm_roads"));
    assert!(queries[0].contains("ST_MakeEnvelope("));
    assert!(!queries[0].contains("!BBOX!"));

    let reader = Reader::new(bytes).unwrap();
    assert_eq!(reader.get_layer_names().unwrap(), vec!["roads"]);
    let features = reader.get_features(0).unwrap();
    assert_eq!(features[0].id, Some(42));
    assert!(format!("{:?}", features[0].properties).contains("primary"));
}
