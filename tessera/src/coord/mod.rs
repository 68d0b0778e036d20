//! Tile coordinate model
//!
//! Provides the Web Mercator tile grid used by every layer of a tile
//! request: tile extents in metres, pixel conversions for the assembler and
//! conversions from geographic coordinates for configuration checks.

mod types;

pub use types::{
    CoordError, Extent, Point, TileCoord, DEFAULT_TILE_BUFFER, DEFAULT_TILE_EXTENT, MAX_LAT,
    MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM, WEB_MERCATOR, WGS84, WORLD_BOUND,
};

use std::f64::consts::PI;

/// Converts geographic coordinates to the tile containing them.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 22)
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = 2.0_f64.powi(zoom as i32);
    let max_index = (n as u32).saturating_sub(1);

    let col = ((lon + 180.0) / 360.0 * n) as u32;

    let lat_rad = lat * PI / 180.0;
    let row = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n) as u32;

    // lon = 180 and the southern latitude limit land exactly on the far edge
    TileCoord::new(zoom, col.min(max_index), row.min(max_index))
}

/// Converts a tile back to the latitude/longitude of its north-west corner.
#[inline]
pub fn tile_to_lat_lon(tile: &TileCoord) -> (f64, f64) {
    let n = 2.0_f64.powi(tile.zoom() as i32);

    let lon = tile.col() as f64 / n * 360.0 - 180.0;

    let y = tile.row() as f64 / n;
    let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    (lat, lon)
}
