//! `render` command.
//!
//! Encodes one tile of a configured map and writes it to disk. Ctrl-C
//! cancels the request; a cancelled tile is never written.

use clap::Args;
use std::path::{Path, PathBuf};
use tessera::tile::{compress, TileCompression};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::common::load_atlas;
use crate::error::CliError;

/// Arguments for `render`.
#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Map to render from
    pub map: String,

    /// Tile address as z/x/y
    pub tile: String,

    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Only render these layers (comma-separated display or provider layer names)
    #[arg(long, value_delimiter = ',')]
    pub layers: Vec<String>,

    /// Append the tile outline and tile center debug layers
    #[arg(long)]
    pub debug: bool,

    /// Gzip the encoded tile
    #[arg(long)]
    pub gzip: bool,

    /// Print the encode report as JSON on stderr
    #[arg(long)]
    pub report: bool,
}

/// Parse a `z/x/y` tile address.
pub fn parse_tile_address(address: &str) -> Result<(u8, u32, u32), CliError> {
    let invalid = || {
        CliError::Usage(format!(
            "Invalid tile address '{}': expected z/x/y, e.g. 14/8800/5370",
            address
        ))
    };

    let address = address.trim().trim_end_matches(".mvt").trim_end_matches(".pbf");
    let parts: Vec<&str> = address.split('/').collect();
    let [z, x, y] = parts.as_slice() else {
        return Err(invalid());
    };

    Ok((
        z.parse().map_err(|_| invalid())?,
        x.parse().map_err(|_| invalid())?,
        y.parse().map_err(|_| invalid())?,
    ))
}

pub fn run(config: Option<&Path>, args: RenderArgs) -> Result<(), CliError> {
    let (zoom, col, row) = parse_tile_address(&args.tile)?;

    let atlas = load_atlas(config)?;
    let map = atlas
        .map(&args.map)
        .ok_or_else(|| CliError::Usage(format!("Unknown map '{}'", args.map)))?;
    let tile = map
        .tile(zoom, col, row)
        .map_err(|e| CliError::Usage(e.to_string()))?;

    let mut selected = map.filter_layers_by_zoom(zoom);
    if !args.layers.is_empty() {
        selected = selected.filter_layers_by_name(args.layers.as_slice());
    }
    if args.debug {
        selected = selected.add_debug_layers();
    }
    if selected.layers.is_empty() {
        warn!(map = %args.map, zoom, "No layers selected, tile will be empty");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || on_interrupt.cancel()) {
        warn!(error = %e, "Could not install Ctrl-C handler");
    }

    let encoded = runtime.block_on(selected.encode_with_report(&cancel, &tile))?;

    if args.report {
        match serde_json::to_string_pretty(&encoded.report) {
            Ok(json) => eprintln!("{}", json),
            Err(e) => warn!(error = %e, "Failed to serialize encode report"),
        }
    }

    let compression = if args.gzip {
        TileCompression::Gzip
    } else {
        TileCompression::None
    };
    let bytes = compress(&encoded.bytes, compression).map_err(CliError::Compress)?;

    std::fs::write(&args.output, &bytes).map_err(|error| CliError::FileWrite {
        path: args.output.display().to_string(),
        error,
    })?;

    info!(
        map = %args.map,
        z = zoom,
        x = col,
        y = row,
        layers = encoded.report.encoded.len(),
        failed = encoded.report.failed.len(),
        bytes = bytes.len(),
        output = %args.output.display(),
        "Tile written"
    );

    Ok(())
}
