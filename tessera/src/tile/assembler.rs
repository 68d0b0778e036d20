//! Vector tile assembly.
//!
//! Projects layer geometries from map units into tile units, clips them to
//! the buffered tile and serialises the layers as a Mapbox Vector Tile.

use super::clip::ClipBounds;
use super::layer::{TileFeature, TileLayer};
use crate::coord::{TileCoord, DEFAULT_TILE_EXTENT};
use crate::geometry::TileGeometry;
use crate::provider::TagValue;
use geo_types::{coord, Coord};
use mvt::{GeomData, GeomEncoder, GeomType as MvtGeomType, Tile};
use thiserror::Error;
use tracing::{trace, warn};

/// Errors from tile serialisation.
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("MVT encoding failed: {0}")]
    Mvt(#[from] mvt::Error),
}

/// Builds the MVT payload for one tile.
#[derive(Debug, Clone)]
pub struct TileAssembler {
    tile: TileCoord,
    extent: u32,
}

impl TileAssembler {
    pub fn new(tile: TileCoord) -> Self {
        Self {
            tile,
            extent: DEFAULT_TILE_EXTENT,
        }
    }

    /// Output extent in tile units. Zero is treated as one.
    pub fn with_extent(mut self, extent: u32) -> Self {
        self.extent = extent.max(1);
        self
    }

    /// Serialise `layers` in order.
    ///
    /// Layers without a name or without drawable features are skipped.
    /// Layers sharing a name are merged into the first occurrence. A feature
    /// that cannot be encoded is dropped and logged; the rest of its layer is
    /// kept.
    pub fn assemble(&self, layers: &[TileLayer]) -> Result<Vec<u8>, AssembleError> {
        let mut tile = Tile::new(self.extent);

        for (name, features) in merge_layers(layers) {
            let mut layer = tile.create_layer(name);
            let mut count = 0usize;

            for feature in features {
                let data = match self.encode_geometry(&feature.geometry) {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        trace!(layer = name, id = ?feature.id, "Skipping degenerate feature");
                        continue;
                    }
                    Err(e) => {
                        warn!(layer = name, id = ?feature.id, error = %e, "Dropping feature that failed to encode");
                        continue;
                    }
                };

                let mut encoded = layer.into_feature(data);
                if let Some(id) = feature.id {
                    encoded.set_id(id);
                }
                for (key, value) in &feature.tags {
                    match value {
                        TagValue::String(s) => encoded.add_tag_string(key, s),
                        TagValue::Int(i) => encoded.add_tag_sint(key, *i),
                        TagValue::UInt(u) => encoded.add_tag_uint(key, *u),
                        TagValue::Float(f) => encoded.add_tag_double(key, *f),
                        TagValue::Bool(b) => encoded.add_tag_bool(key, *b),
                    }
                }
                layer = encoded.into_layer();
                count += 1;
            }

            if count == 0 {
                trace!(layer = name, "Skipping empty layer");
                continue;
            }
            tile.add_layer(layer)?;
        }

        Ok(tile.to_bytes()?)
    }

    fn scale(&self) -> f64 {
        self.extent as f64 / DEFAULT_TILE_EXTENT as f64
    }

    /// Map units to (unrounded) tile units.
    fn project(&self, c: Coord<f64>) -> Coord<f64> {
        let scale = self.scale();
        let (px, py) = self.tile.to_pixel(c.x, c.y);
        coord! { x: px * scale, y: py * scale }
    }

    /// The tile square grown by the tile buffer, in tile units.
    fn clip_bounds(&self) -> ClipBounds {
        ClipBounds::new(self.extent as f64, self.tile.buffer() * self.scale())
    }

    /// Encode a geometry, or `None` if nothing drawable is left after
    /// projection and clipping.
    fn encode_geometry(&self, geometry: &TileGeometry) -> Result<Option<GeomData>, mvt::Error> {
        let bounds = self.clip_bounds();
        let projected = geometry.map_coords(|c| self.project(c));

        let (geom_type, parts) = match projected {
            TileGeometry::Point(c) => (
                MvtGeomType::Point,
                vec![bounds.clip_points(vec![round(c)])],
            ),
            TileGeometry::MultiPoint(points) => (
                MvtGeomType::Point,
                vec![bounds.clip_points(points.into_iter().map(round).collect())],
            ),
            TileGeometry::LineString(line) => (
                MvtGeomType::Linestring,
                bounds
                    .clip_line(&line)
                    .into_iter()
                    .filter_map(clean_line)
                    .collect(),
            ),
            TileGeometry::MultiLineString(lines) => (
                MvtGeomType::Linestring,
                lines
                    .iter()
                    .flat_map(|line| bounds.clip_line(line))
                    .filter_map(clean_line)
                    .collect(),
            ),
            TileGeometry::Polygon(rings) => (
                MvtGeomType::Polygon,
                polygon_rings(bounds.clip_polygon(rings)).unwrap_or_default(),
            ),
            TileGeometry::MultiPolygon(polygons) => (
                MvtGeomType::Polygon,
                polygons
                    .into_iter()
                    .filter_map(|rings| polygon_rings(bounds.clip_polygon(rings)))
                    .flatten()
                    .collect(),
            ),
        };

        if parts.iter().all(|p| p.is_empty()) {
            return Ok(None);
        }

        let complete_parts = !matches!(geom_type, MvtGeomType::Point);
        let mut encoder = GeomEncoder::new(geom_type);
        for part in &parts {
            for c in part {
                encoder = encoder.point(c.x, c.y)?;
            }
            if complete_parts {
                encoder = encoder.complete()?;
            }
        }
        Ok(Some(encoder.encode()?))
    }
}

/// Group features by layer name, keeping first-seen order.
fn merge_layers(layers: &[TileLayer]) -> Vec<(&str, Vec<&TileFeature>)> {
    let mut merged: Vec<(&str, Vec<&TileFeature>)> = Vec::with_capacity(layers.len());

    for layer in layers {
        if layer.name.is_empty() {
            warn!(features = layer.len(), "Skipping layer without a name");
            continue;
        }
        match merged.iter_mut().find(|(name, _)| *name == layer.name) {
            Some((_, features)) => features.extend(layer.features.iter()),
            None => merged.push((layer.name.as_str(), layer.features.iter().collect())),
        }
    }
    merged
}

fn round(c: Coord<f64>) -> Coord<f64> {
    coord! { x: c.x.round(), y: c.y.round() }
}

/// Round, then drop repeated points; `None` if fewer than two remain.
fn clean_line(line: Vec<Coord<f64>>) -> Option<Vec<Coord<f64>>> {
    let mut line: Vec<_> = line.into_iter().map(round).collect();
    line.dedup();
    (line.len() >= 2).then_some(line)
}

/// Rounded open ring with repeated points removed; `None` if it encloses no
/// area.
fn clean_ring(ring: Vec<Coord<f64>>) -> Option<Vec<Coord<f64>>> {
    let mut ring: Vec<_> = ring.into_iter().map(round).collect();
    ring.dedup();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() < 3 || signed_area(&ring) == 0.0 {
        return None;
    }
    Some(ring)
}

/// Twice the signed area in tile units (Y down).
fn signed_area(ring: &[Coord<f64>]) -> f64 {
    let mut sum = 0.0;
    for (i, a) in ring.iter().enumerate() {
        let b = ring[(i + 1) % ring.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum
}

/// Clean and orient the rings of one polygon: exterior positive, interiors
/// negative. `None` if the exterior is degenerate.
fn polygon_rings(rings: Vec<Vec<Coord<f64>>>) -> Option<Vec<Vec<Coord<f64>>>> {
    let mut rings = rings.into_iter();
    let mut exterior = clean_ring(rings.next()?)?;
    if signed_area(&exterior) < 0.0 {
        exterior.reverse();
    }

    let mut out = vec![exterior];
    for ring in rings {
        if let Some(mut interior) = clean_ring(ring) {
            if signed_area(&interior) > 0.0 {
                interior.reverse();
            }
            out.push(interior);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Tags;
    use mvt_reader::Reader;

    fn tile() -> TileCoord {
        TileCoord::new(10, 300, 400).unwrap().with_buffer(64.0)
    }

    /// Map-unit coordinate for a tile-unit position.
    fn at(tile: &TileCoord, px: f64, py: f64) -> Coord<f64> {
        let p = tile.from_pixel(px, py);
        coord! { x: p.x, y: p.y }
    }

    fn feature(id: u64, geometry: TileGeometry) -> TileFeature {
        TileFeature {
            id: Some(id),
            geometry,
            tags: Tags::new(),
        }
    }

    #[test]
    fn test_empty_tile_is_valid() {
        let bytes = TileAssembler::new(tile()).assemble(&[]).unwrap();
        let reader = Reader::new(bytes).unwrap();
        assert!(reader.get_layer_names().unwrap().is_empty());
    }

    #[test]
    fn test_layers_in_input_order() {
        let t = tile();
        let mut water = TileLayer::new("water");
        water.push(feature(1, TileGeometry::Point(at(&t, 100.0, 100.0))));
        let mut roads = TileLayer::new("roads");
        roads.push(feature(
            2,
            TileGeometry::LineString(vec![at(&t, 0.0, 0.0), at(&t, 4096.0, 4096.0)]),
        ));

        let bytes = TileAssembler::new(t).assemble(&[water, roads]).unwrap();
        let reader = Reader::new(bytes).unwrap();
        assert_eq!(reader.get_layer_names().unwrap(), vec!["water", "roads"]);
    }

    #[test]
    fn test_same_name_layers_are_merged() {
        let t = tile();
        let mut first = TileLayer::new("pois");
        first.push(feature(1, TileGeometry::Point(at(&t, 10.0, 10.0))));
        let mut other = TileLayer::new("roads");
        other.push(feature(2, TileGeometry::Point(at(&t, 20.0, 20.0))));
        let mut second = TileLayer::new("pois");
        second.push(feature(3, TileGeometry::Point(at(&t, 30.0, 30.0))));

        let bytes = TileAssembler::new(t)
            .assemble(&[first, other, second])
            .unwrap();
        let reader = Reader::new(bytes).unwrap();

        assert_eq!(reader.get_layer_names().unwrap(), vec!["pois", "roads"]);
        let ids: Vec<_> = reader
            .get_features(0)
            .unwrap()
            .iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec![Some(1), Some(3)]);
    }

    #[test]
    fn test_unnamed_and_empty_layers_skipped() {
        let t = tile();
        let mut unnamed = TileLayer::new("");
        unnamed.push(feature(1, TileGeometry::Point(at(&t, 10.0, 10.0))));
        let empty = TileLayer::new("empty");

        let bytes = TileAssembler::new(t).assemble(&[unnamed, empty]).unwrap();
        let reader = Reader::new(bytes).unwrap();
        assert!(reader.get_layer_names().unwrap().is_empty());
    }

    #[test]
    fn test_projection_to_tile_units() {
        let t = tile();
        let assembler = TileAssembler::new(t);
        let projected = round(assembler.project(at(&t, 1024.0, 3072.0)));
        assert_eq!(projected, coord! { x: 1024.0, y: 3072.0 });

        let half = TileAssembler::new(t).with_extent(2048);
        let projected = round(half.project(at(&t, 1024.0, 3072.0)));
        assert_eq!(projected, coord! { x: 512.0, y: 1536.0 });
    }

    #[test]
    fn test_exterior_ring_is_oriented_positive() {
        // Counter-clockwise in tile units, which is negative area with Y down
        let ring = vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 0.0, y: 10.0 },
            coord! { x: 10.0, y: 10.0 },
            coord! { x: 10.0, y: 0.0 },
            coord! { x: 0.0, y: 0.0 },
        ];
        let hole = vec![
            coord! { x: 2.0, y: 2.0 },
            coord! { x: 4.0, y: 2.0 },
            coord! { x: 4.0, y: 4.0 },
            coord! { x: 2.0, y: 4.0 },
            coord! { x: 2.0, y: 2.0 },
        ];

        let rings = polygon_rings(vec![ring, hole]).unwrap();
        assert_eq!(rings[0].len(), 4);
        assert!(signed_area(&rings[0]) > 0.0);
        assert!(signed_area(&rings[1]) < 0.0);
    }

    #[test]
    fn test_collapsed_ring_is_degenerate() {
        let ring = vec![
            coord! { x: 5.0, y: 5.0 },
            coord! { x: 5.0, y: 5.0 },
            coord! { x: 6.0, y: 6.0 },
            coord! { x: 5.0, y: 5.0 },
        ];
        assert!(polygon_rings(vec![ring]).is_none());
    }

    #[test]
    fn test_polygon_roundtrips_through_reader() {
        let t = tile();
        let mut land = TileLayer::new("land");
        land.push(TileFeature {
            id: Some(9),
            geometry: TileGeometry::Polygon(vec![vec![
                at(&t, 100.0, 100.0),
                at(&t, 100.0, 900.0),
                at(&t, 900.0, 900.0),
                at(&t, 900.0, 100.0),
                at(&t, 100.0, 100.0),
            ]]),
            tags: Tags::from([("class".to_string(), TagValue::from("grass"))]),
        });

        let bytes = TileAssembler::new(t).assemble(&[land]).unwrap();
        let reader = Reader::new(bytes).unwrap();
        let features = reader.get_features(0).unwrap();

        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id, Some(9));
        assert!(matches!(
            features[0].get_geometry(),
            geo_types::Geometry::Polygon(_) | geo_types::Geometry::MultiPolygon(_)
        ));
    }

    #[test]
    fn test_degenerate_feature_is_dropped_not_fatal() {
        let t = tile();
        let mut roads = TileLayer::new("roads");
        let p = at(&t, 50.0, 50.0);
        roads.push(feature(1, TileGeometry::LineString(vec![p, p])));
        roads.push(feature(
            2,
            TileGeometry::LineString(vec![at(&t, 0.0, 0.0), at(&t, 10.0, 0.0)]),
        ));

        let bytes = TileAssembler::new(t).assemble(&[roads]).unwrap();
        let reader = Reader::new(bytes).unwrap();
        let features = reader.get_features(0).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id, Some(2));
    }

    #[test]
    fn test_world_polygon_survives_deep_zoom() {
        let t = TileCoord::new(22, 2097152, 2097152).unwrap().with_buffer(64.0);
        let mut ocean = TileLayer::new("ocean");
        ocean.push(feature(
            1,
            TileGeometry::Polygon(vec![vec![
                coord! { x: -20_000_000.0, y: -20_000_000.0 },
                coord! { x: 20_000_000.0, y: -20_000_000.0 },
                coord! { x: 20_000_000.0, y: 20_000_000.0 },
                coord! { x: -20_000_000.0, y: 20_000_000.0 },
                coord! { x: -20_000_000.0, y: -20_000_000.0 },
            ]]),
        ));

        let bytes = TileAssembler::new(t).assemble(&[ocean]).unwrap();
        let reader = Reader::new(bytes).unwrap();
        assert_eq!(reader.get_layer_names().unwrap(), vec!["ocean"]);
        assert_eq!(reader.get_features(0).unwrap().len(), 1);
    }

    #[test]
    fn test_long_line_is_clipped_to_buffer() {
        let t = tile();
        let mut roads = TileLayer::new("roads");
        roads.push(feature(
            1,
            TileGeometry::LineString(vec![at(&t, -1.0e9, 2048.0), at(&t, 1.0e9, 2048.0)]),
        ));
        roads.push(feature(
            2,
            TileGeometry::LineString(vec![at(&t, 5000.0, 5000.0), at(&t, 6000.0, 5000.0)]),
        ));

        let bytes = TileAssembler::new(t).assemble(&[roads]).unwrap();
        let reader = Reader::new(bytes).unwrap();
        let features = reader.get_features(0).unwrap();

        assert_eq!(features.len(), 1);
        let line = match features[0].get_geometry() {
            geo_types::Geometry::LineString(line) => line.clone(),
            geo_types::Geometry::MultiLineString(lines) if lines.0.len() == 1 => lines.0[0].clone(),
            other => panic!("Expected a line, got {:?}", other),
        };
        let xs: Vec<f32> = line.coords().map(|c| c.x).collect();
        assert_eq!(xs, vec![-64.0, 4160.0]);
    }

    #[test]
    fn test_identical_input_identical_bytes() {
        let t = tile();
        let mut layer = TileLayer::new("pois");
        layer.push(TileFeature {
            id: Some(1),
            geometry: TileGeometry::Point(at(&t, 2048.0, 2048.0)),
            tags: Tags::from([
                ("name".to_string(), TagValue::from("fountain")),
                ("height".to_string(), TagValue::Float(2.5)),
                ("visible".to_string(), TagValue::Bool(true)),
            ]),
        });

        let a = TileAssembler::new(t).assemble(std::slice::from_ref(&layer)).unwrap();
        let b = TileAssembler::new(t).assemble(&[layer]).unwrap();
        assert_eq!(a, b);
    }
}
