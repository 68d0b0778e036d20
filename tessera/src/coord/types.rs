//! Coordinate type definitions

use thiserror::Error;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Supported zoom levels
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 22;

/// EPSG code of the Web Mercator reference system.
pub const WEB_MERCATOR: u64 = 3857;

/// EPSG code of WGS 84 geographic coordinates.
pub const WGS84: u64 = 4326;

/// Half the width of the Web Mercator world, in metres.
pub const WORLD_BOUND: f64 = 20037508.34;

/// Width and height of a tile in output units.
pub const DEFAULT_TILE_EXTENT: u32 = 4096;

/// Default tile buffer in output units.
pub const DEFAULT_TILE_BUFFER: u32 = 64;

/// Standardized rendering pixel size in metres (OGC WMTS 1.0).
const STANDARD_PIXEL_SIZE: f64 = 0.00028;

/// A position in the Web Mercator reference system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box with `min` at the south-west corner and `max`
/// at the north-east corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min: Point,
    pub max: Point,
}

impl Extent {
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.min.x + self.width() / 2.0,
            self.min.y + self.height() / 2.0,
        )
    }

    /// Returns true if the point lies inside or on the boundary.
    pub fn contains(&self, point: Point) -> bool {
        (self.min.x..=self.max.x).contains(&point.x) && (self.min.y..=self.max.y).contains(&point.y)
    }
}

/// A slippy-map tile in the Web Mercator grid.
///
/// Rows count top-down from the northern edge of the world while the
/// reference system's Y axis grows northward, so every conversion between
/// the two flips the vertical axis.
///
/// # Example
///
/// ```
/// use tessera::coord::TileCoord;
///
/// let tile = TileCoord::new(2, 1, 1).unwrap().with_buffer(64.0);
/// assert_eq!(tile.zxy(), (2, 1, 1));
///
/// let extent = tile.extent();
/// assert!(extent.min.x < extent.max.x);
/// assert!(extent.min.y < extent.max.y);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileCoord {
    zoom: u8,
    col: u32,
    row: u32,
    /// Buffer around the tile in output units (see [`DEFAULT_TILE_EXTENT`])
    buffer: f64,
}

impl TileCoord {
    /// Create a tile, validating the column and row against the zoom level.
    ///
    /// # Errors
    ///
    /// Returns [`CoordError::InvalidCoordinate`] when the zoom exceeds
    /// [`MAX_ZOOM`] or the column/row lies outside `0..2^zoom`.
    pub fn new(zoom: u8, col: u32, row: u32) -> Result<Self, CoordError> {
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidCoordinate { zoom, col, row });
        }

        let tiles_per_side = 1u32 << zoom;
        if col >= tiles_per_side || row >= tiles_per_side {
            return Err(CoordError::InvalidCoordinate { zoom, col, row });
        }

        Ok(Self {
            zoom,
            col,
            row,
            buffer: 0.0,
        })
    }

    /// Set the buffer in units of the 4096 default extent. Negative values
    /// are treated as zero.
    pub fn with_buffer(mut self, buffer: f64) -> Self {
        self.buffer = buffer.max(0.0);
        self
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn col(&self) -> u32 {
        self.col
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn buffer(&self) -> f64 {
        self.buffer
    }

    /// Raw coordinate as `(zoom, column, row)`.
    pub fn zxy(&self) -> (u8, u32, u32) {
        (self.zoom, self.col, self.row)
    }

    /// Width of the tile in metres.
    pub fn resolution(&self) -> f64 {
        (WORLD_BOUND * 2.0) / 2.0_f64.powi(self.zoom as i32)
    }

    /// Size of one output unit in metres.
    pub fn pixel_size(&self) -> f64 {
        self.resolution() / DEFAULT_TILE_EXTENT as f64
    }

    /// Map scale denominator assuming the standard 0.28 mm rendering pixel.
    pub fn scale_denominator(&self) -> f64 {
        self.pixel_size() / STANDARD_PIXEL_SIZE
    }

    /// Tile corners ordered as the grid sees them: west, north, east, south.
    fn corners(&self) -> (f64, f64, f64, f64) {
        let res = self.resolution();
        let west = -WORLD_BOUND + (self.col as f64 * res);
        let north = WORLD_BOUND - (self.row as f64 * res);
        let east = -WORLD_BOUND + (self.col as f64 * res) + res;
        let south = WORLD_BOUND - (self.row as f64 * res) - res;
        (west, north, east, south)
    }

    /// Convert a position in output units (origin at the north-west corner,
    /// Y down) into Web Mercator metres.
    pub fn from_pixel(&self, px: f64, py: f64) -> Point {
        let (west, north, east, south) = self.corners();
        let xspan = east - west;
        let yspan = south - north;
        let extent = DEFAULT_TILE_EXTENT as f64;

        Point::new(px * xspan / extent + west, py * yspan / extent + north)
    }

    /// Convert Web Mercator metres into output units relative to the
    /// tile's north-west corner.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let (west, north, east, south) = self.corners();
        let extent = DEFAULT_TILE_EXTENT as f64;

        (
            (x - west) * extent / (east - west),
            (y - north) * extent / (south - north),
        )
    }

    /// Extent of the tile without its buffer.
    pub fn unbuffered_extent(&self) -> Extent {
        let (west, north, east, south) = self.corners();
        Extent {
            min: Point::new(west, south),
            max: Point::new(east, north),
        }
    }

    /// Buffered extent of the tile in Web Mercator metres.
    ///
    /// Pure function of zoom/column/row and the buffer.
    pub fn extent(&self) -> Extent {
        let extent = DEFAULT_TILE_EXTENT as f64;
        let north_west = self.from_pixel(-self.buffer, -self.buffer);
        let south_east = self.from_pixel(extent + self.buffer, extent + self.buffer);

        Extent {
            min: Point::new(north_west.x, south_east.y),
            max: Point::new(south_east.x, north_west.y),
        }
    }
}

/// Errors that can occur during coordinate construction and conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Tile column/row outside the grid for its zoom, or zoom too deep
    #[error("Invalid tile coordinate: zoom {zoom}, column {col}, row {row}")]
    InvalidCoordinate { zoom: u8, col: u32, row: u32 },

    /// Latitude is outside valid range (-85.05112878 to 85.05112878)
    #[error("Invalid latitude: {0} (must be between -85.05112878 and 85.05112878)")]
    InvalidLatitude(f64),

    /// Longitude is outside valid range (-180.0 to 180.0)
    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    /// Zoom level is outside valid range (0 to 22)
    #[error("Invalid zoom level: {0} (must be between 0 and 22)")]
    InvalidZoom(u8),
}
