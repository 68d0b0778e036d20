//! Geometry conversion boundary.
//!
//! Providers hand back `geo_types` geometries in the map's reference
//! system. Before a feature can be assembled into a tile its geometry is
//! converted into a [`TileGeometry`], the subset of shapes a vector tile can
//! carry. Anything else is a [`ConversionError`].

use geo_types::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Polygon};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Geometry type declared for a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GeomType {
    Point,
    LineString,
    Polygon,
    #[default]
    Unknown,
}

impl GeomType {
    pub fn name(&self) -> &'static str {
        match self {
            GeomType::Point => "point",
            GeomType::LineString => "linestring",
            GeomType::Polygon => "polygon",
            GeomType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for GeomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GeomType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "point" | "multipoint" => Ok(GeomType::Point),
            "linestring" | "multilinestring" | "line" => Ok(GeomType::LineString),
            "polygon" | "multipolygon" => Ok(GeomType::Polygon),
            "unknown" | "" => Ok(GeomType::Unknown),
            other => Err(ConversionError::Unsupported(other.to_string())),
        }
    }
}

/// A geometry that can be written into a vector tile.
#[derive(Debug, Clone, PartialEq)]
pub enum TileGeometry {
    Point(Coord<f64>),
    MultiPoint(Vec<Coord<f64>>),
    LineString(Vec<Coord<f64>>),
    MultiLineString(Vec<Vec<Coord<f64>>>),
    /// Exterior ring followed by interior rings, each closed.
    Polygon(Vec<Vec<Coord<f64>>>),
    MultiPolygon(Vec<Vec<Vec<Coord<f64>>>>),
}

impl TileGeometry {
    pub fn geom_type(&self) -> GeomType {
        match self {
            TileGeometry::Point(_) | TileGeometry::MultiPoint(_) => GeomType::Point,
            TileGeometry::LineString(_) | TileGeometry::MultiLineString(_) => GeomType::LineString,
            TileGeometry::Polygon(_) | TileGeometry::MultiPolygon(_) => GeomType::Polygon,
        }
    }

    /// Apply `f` to every coordinate, preserving the structure.
    pub fn map_coords(&self, f: impl Fn(Coord<f64>) -> Coord<f64>) -> TileGeometry {
        let line = |coords: &Vec<Coord<f64>>| coords.iter().map(|c| f(*c)).collect::<Vec<_>>();

        match self {
            TileGeometry::Point(c) => TileGeometry::Point(f(*c)),
            TileGeometry::MultiPoint(points) => TileGeometry::MultiPoint(line(points)),
            TileGeometry::LineString(coords) => TileGeometry::LineString(line(coords)),
            TileGeometry::MultiLineString(lines) => {
                TileGeometry::MultiLineString(lines.iter().map(line).collect())
            }
            TileGeometry::Polygon(rings) => TileGeometry::Polygon(rings.iter().map(line).collect()),
            TileGeometry::MultiPolygon(polygons) => TileGeometry::MultiPolygon(
                polygons
                    .iter()
                    .map(|rings| rings.iter().map(line).collect())
                    .collect(),
            ),
        }
    }
}

/// Errors converting provider geometry into tile geometry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The geometry kind has no vector tile representation
    #[error("Unsupported geometry type: {0}")]
    Unsupported(String),

    /// The geometry has too few coordinates to be drawn
    #[error("Degenerate {kind}: {reason}")]
    Degenerate { kind: &'static str, reason: String },

    /// A coordinate is NaN or infinite
    #[error("Non-finite coordinate ({x}, {y})")]
    NonFinite { x: f64, y: f64 },
}

/// Convert a provider geometry into a tile geometry.
///
/// Lines, rectangles and triangles are widened to line strings and polygons.
/// Geometry collections are not supported.
pub fn convert(geometry: &Geometry<f64>) -> Result<TileGeometry, ConversionError> {
    match geometry {
        Geometry::Point(p) => Ok(TileGeometry::Point(finite(p.0)?)),
        Geometry::MultiPoint(mp) => convert_multi_point(mp),
        Geometry::Line(l) => Ok(TileGeometry::LineString(vec![
            finite(l.start)?,
            finite(l.end)?,
        ])),
        Geometry::LineString(ls) => Ok(TileGeometry::LineString(convert_line(ls)?)),
        Geometry::MultiLineString(mls) => convert_multi_line(mls),
        Geometry::Polygon(p) => Ok(TileGeometry::Polygon(convert_polygon(p)?)),
        Geometry::MultiPolygon(mp) => convert_multi_polygon(mp),
        Geometry::Rect(r) => Ok(TileGeometry::Polygon(convert_polygon(&r.to_polygon())?)),
        Geometry::Triangle(t) => Ok(TileGeometry::Polygon(convert_polygon(&t.to_polygon())?)),
        Geometry::GeometryCollection(_) => {
            Err(ConversionError::Unsupported("GeometryCollection".to_string()))
        }
    }
}

fn finite(c: Coord<f64>) -> Result<Coord<f64>, ConversionError> {
    if c.x.is_finite() && c.y.is_finite() {
        Ok(c)
    } else {
        Err(ConversionError::NonFinite { x: c.x, y: c.y })
    }
}

fn convert_multi_point(mp: &MultiPoint<f64>) -> Result<TileGeometry, ConversionError> {
    if mp.0.is_empty() {
        return Err(ConversionError::Degenerate {
            kind: "multipoint",
            reason: "no points".to_string(),
        });
    }
    let points = mp
        .0
        .iter()
        .map(|p| finite(p.0))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TileGeometry::MultiPoint(points))
}

fn convert_line(ls: &LineString<f64>) -> Result<Vec<Coord<f64>>, ConversionError> {
    if ls.0.len() < 2 {
        return Err(ConversionError::Degenerate {
            kind: "linestring",
            reason: format!("{} coordinate(s)", ls.0.len()),
        });
    }
    ls.0.iter().map(|c| finite(*c)).collect()
}

fn convert_multi_line(mls: &MultiLineString<f64>) -> Result<TileGeometry, ConversionError> {
    if mls.0.is_empty() {
        return Err(ConversionError::Degenerate {
            kind: "multilinestring",
            reason: "no lines".to_string(),
        });
    }
    let lines = mls
        .0
        .iter()
        .map(convert_line)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TileGeometry::MultiLineString(lines))
}

fn convert_ring(ring: &LineString<f64>) -> Result<Vec<Coord<f64>>, ConversionError> {
    // geo_types closes rings on construction, so a triangle has 4 coordinates
    if ring.0.len() < 4 {
        return Err(ConversionError::Degenerate {
            kind: "polygon",
            reason: format!("ring with {} coordinate(s)", ring.0.len()),
        });
    }
    ring.0.iter().map(|c| finite(*c)).collect()
}

fn convert_polygon(p: &Polygon<f64>) -> Result<Vec<Vec<Coord<f64>>>, ConversionError> {
    let mut rings = Vec::with_capacity(1 + p.interiors().len());
    rings.push(convert_ring(p.exterior())?);
    for interior in p.interiors() {
        rings.push(convert_ring(interior)?);
    }
    Ok(rings)
}

fn convert_multi_polygon(mp: &MultiPolygon<f64>) -> Result<TileGeometry, ConversionError> {
    if mp.0.is_empty() {
        return Err(ConversionError::Degenerate {
            kind: "multipolygon",
            reason: "no polygons".to_string(),
        });
    }
    let polygons = mp
        .0
        .iter()
        .map(convert_polygon)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TileGeometry::MultiPolygon(polygons))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{coord, line_string, point, polygon, GeometryCollection, Line, Rect};

    #[test]
    fn test_convert_point() {
        let geom = Geometry::Point(point!(x: 1.0, y: 2.0));
        assert_eq!(
            convert(&geom).unwrap(),
            TileGeometry::Point(coord! { x: 1.0, y: 2.0 })
        );
    }

    #[test]
    fn test_convert_line_widens_to_linestring() {
        let geom = Geometry::Line(Line::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 5.0, y: 5.0 }));
        let converted = convert(&geom).unwrap();
        assert_eq!(converted.geom_type(), GeomType::LineString);
    }

    #[test]
    fn test_convert_rect_widens_to_polygon() {
        let geom = Geometry::Rect(Rect::new(
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 10.0, y: 10.0 },
        ));
        match convert(&geom).unwrap() {
            TileGeometry::Polygon(rings) => {
                assert_eq!(rings.len(), 1);
                assert_eq!(rings[0].first(), rings[0].last());
            }
            other => panic!("Expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_convert_polygon_keeps_interiors() {
        let geom = Geometry::Polygon(polygon!(
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 10.0, y: 0.0),
                (x: 10.0, y: 10.0),
                (x: 0.0, y: 10.0),
            ],
            interiors: [
                [
                    (x: 2.0, y: 2.0),
                    (x: 4.0, y: 2.0),
                    (x: 4.0, y: 4.0),
                ],
            ],
        ));
        match convert(&geom).unwrap() {
            TileGeometry::Polygon(rings) => assert_eq!(rings.len(), 2),
            other => panic!("Expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_geometry_collection_is_unsupported() {
        let geom = Geometry::GeometryCollection(GeometryCollection::default());
        assert!(matches!(
            convert(&geom),
            Err(ConversionError::Unsupported(_))
        ));
    }

    #[test]
    fn test_single_coordinate_linestring_is_degenerate() {
        let geom = Geometry::LineString(line_string![(x: 1.0, y: 1.0)]);
        assert!(matches!(
            convert(&geom),
            Err(ConversionError::Degenerate { kind: "linestring", .. })
        ));
    }

    #[test]
    fn test_nan_coordinate_is_rejected() {
        let geom = Geometry::Point(point!(x: f64::NAN, y: 0.0));
        assert!(matches!(
            convert(&geom),
            Err(ConversionError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_map_coords_preserves_structure() {
        let geom = TileGeometry::MultiLineString(vec![
            vec![coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }],
            vec![coord! { x: 2.0, y: 2.0 }, coord! { x: 3.0, y: 3.0 }],
        ]);
        let doubled = geom.map_coords(|c| coord! { x: c.x * 2.0, y: c.y * 2.0 });
        assert_eq!(
            doubled,
            TileGeometry::MultiLineString(vec![
                vec![coord! { x: 0.0, y: 0.0 }, coord! { x: 2.0, y: 2.0 }],
                vec![coord! { x: 4.0, y: 4.0 }, coord! { x: 6.0, y: 6.0 }],
            ])
        );
    }

    #[test]
    fn test_geom_type_from_str() {
        assert_eq!("Polygon".parse::<GeomType>().unwrap(), GeomType::Polygon);
        assert_eq!("multipoint".parse::<GeomType>().unwrap(), GeomType::Point);
        assert_eq!("".parse::<GeomType>().unwrap(), GeomType::Unknown);
        assert!("circle".parse::<GeomType>().is_err());
    }
}
