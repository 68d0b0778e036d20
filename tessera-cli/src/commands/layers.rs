//! `layers` command.

use std::path::Path;
use tessera::config::MapLayerSection;

use super::common::load_config;
use crate::error::CliError;

/// List configured layers in output order.
pub fn run(path: Option<&Path>, map_name: Option<&str>) -> Result<(), CliError> {
    let config = load_config(path)?;

    let maps: Vec<_> = config
        .maps
        .iter()
        .filter(|m| map_name.map_or(true, |name| m.name == name))
        .collect();

    if let Some(name) = map_name {
        if maps.is_empty() {
            return Err(CliError::Usage(format!("Unknown map '{}'", name)));
        }
    }

    for (i, map) in maps.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("[{}]", map.name);
        for layer in &map.layers {
            println!("  {}", describe(layer));
        }
    }

    Ok(())
}

fn zoom_label(zoom: u8) -> String {
    if zoom == 0 {
        "*".to_string()
    } else {
        zoom.to_string()
    }
}

fn describe(layer: &MapLayerSection) -> String {
    let mut line = format!(
        "{:<20} {}.{}  zoom {}-{}  {}",
        layer.name,
        layer.provider,
        layer.provider_layer,
        zoom_label(layer.min_zoom),
        zoom_label(layer.max_zoom),
        layer.geom_type
    );

    if !layer.default_tags.is_empty() {
        let tags: Vec<String> = layer
            .default_tags
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        line.push_str(&format!("  [{}]", tags.join(", ")));
    }
    line
}
