//! Tessera - vector tile encoding core
//!
//! This library turns a tile coordinate into a Mapbox Vector Tile by fanning
//! out one fetch per configured layer against pluggable data providers and
//! reassembling the results in layer order.
//!
//! # Architecture
//!
//! ```text
//! config ──► Atlas ──► Map ──► filter by zoom / name ──► encode
//!                                                          │
//!                         ┌────────────────┬───────────────┤
//!                         ▼                ▼               ▼
//!                    TileProvider     TileProvider    TileProvider
//!                         │                │               │
//!                         └────── join ────┴───────────────┘
//!                                          │
//!                                    TileAssembler ──► MVT bytes
//! ```

pub mod atlas;
pub mod config;
pub mod coord;
pub mod geometry;
pub mod logging;
pub mod provider;
pub mod tile;

pub use atlas::{Atlas, EncodeError, EncodeReport, EncodedTile, Layer, Map};
pub use coord::TileCoord;
pub use provider::{Feature, ProviderError, TagValue, TileProvider};
