//! Tile assembly and encoding
//!
//! [`TileAssembler`] turns ordered [`TileLayer`]s into Mapbox Vector Tile
//! bytes; [`compress`] optionally gzips the result for transfer.

mod assembler;
mod clip;
mod compress;
mod layer;

pub use assembler::{AssembleError, TileAssembler};
pub use compress::{compress, TileCompression};
pub use layer::{TileFeature, TileLayer};
