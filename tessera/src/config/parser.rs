//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! Section names select what a section configures:
//!
//! ```text
//! [provider.<name>]                  type = debug | postgis, provider keys
//! [provider.<name>.layer.<layer>]    provider layer keys
//! [map.<name>]                       attribution, bounds, center, srid,
//!                                    tile_extent, tile_buffer
//! [map.<name>.layer.<layer>]         provider = <provider>.<layer>, min_zoom,
//!                                    max_zoom, geometry_type,
//!                                    default_tags.<key>
//! ```
//!
//! Sections are processed in file order; map layers keep that order.

use ini::{Ini, Properties};

use super::file::{ConfigError, ConfigFile, MapLayerSection, MapSection, ProviderSection};
use crate::coord::{to_tile_coords, MAX_ZOOM, WEB_MERCATOR};
use crate::geometry::GeomType;
use crate::provider::{ProviderConfig, TagValue, Tags};

const DEFAULT_TAG_PREFIX: &str = "default_tags.";

/// Raw provider sections gathered before validation.
struct RawProvider {
    name: String,
    declared: bool,
    options: Vec<(String, String)>,
    layers: Vec<(String, Vec<(String, String)>)>,
}

/// Parse an `Ini` object into a `ConfigFile`.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigError> {
    let mut providers: Vec<RawProvider> = Vec::new();
    let mut maps: Vec<MapSection> = Vec::new();

    for (section_name, properties) in ini.iter() {
        let Some(section_name) = section_name else {
            // Keys before the first section header
            if let Some((key, _)) = properties.iter().next() {
                return Err(ConfigError::UnknownKey {
                    section: "<general>".to_string(),
                    key: key.to_string(),
                });
            }
            continue;
        };

        let parts: Vec<&str> = section_name.split('.').collect();
        match parts.as_slice() {
            ["provider", name] => {
                let raw = raw_provider(&mut providers, name);
                if raw.declared {
                    return Err(duplicate_section(section_name));
                }
                raw.declared = true;
                raw.options = pairs(properties);
            }
            ["provider", name, "layer", layer] => {
                let raw = raw_provider(&mut providers, name);
                if raw.layers.iter().any(|(l, _)| l == layer) {
                    return Err(duplicate_section(section_name));
                }
                raw.layers.push((layer.to_string(), pairs(properties)));
            }
            ["map", name] => {
                let map = map_section(&mut maps, name);
                parse_map(section_name, properties, map)?;
            }
            ["map", name, "layer", layer] => {
                let parsed = parse_map_layer(section_name, layer, properties)?;
                let map = map_section(&mut maps, name);
                if map.layers.iter().any(|l| l.name == parsed.name) {
                    return Err(duplicate_section(section_name));
                }
                map.layers.push(parsed);
            }
            _ => return Err(ConfigError::UnknownSection(section_name.to_string())),
        }
    }

    let mut config = ConfigFile::default();
    for raw in providers {
        if !raw.declared {
            return Err(ConfigError::UnknownProvider {
                section: format!("provider.{}.layer.{}", raw.name, first_layer(&raw)),
                provider: raw.name,
            });
        }
        let provider_config = ProviderConfig::from_options(&raw.options, &raw.layers)
            .map_err(|source| ConfigError::Provider {
                name: raw.name.clone(),
                source,
            })?;
        config.providers.push(ProviderSection {
            name: raw.name,
            config: provider_config,
        });
    }

    for map in &maps {
        for layer in &map.layers {
            if !config.providers.iter().any(|p| p.name == layer.provider) {
                return Err(ConfigError::UnknownProvider {
                    section: format!("map.{}.layer.{}", map.name, layer.name),
                    provider: layer.provider.clone(),
                });
            }
        }
    }
    config.maps = maps;

    Ok(config)
}

fn raw_provider<'a>(providers: &'a mut Vec<RawProvider>, name: &str) -> &'a mut RawProvider {
    let index = match providers.iter().position(|p| p.name == name) {
        Some(index) => index,
        None => {
            providers.push(RawProvider {
                name: name.to_string(),
                declared: false,
                options: Vec::new(),
                layers: Vec::new(),
            });
            providers.len() - 1
        }
    };
    &mut providers[index]
}

fn map_section<'a>(maps: &'a mut Vec<MapSection>, name: &str) -> &'a mut MapSection {
    let index = match maps.iter().position(|m| m.name == name) {
        Some(index) => index,
        None => {
            maps.push(MapSection::new(name));
            maps.len() - 1
        }
    };
    &mut maps[index]
}

fn first_layer(raw: &RawProvider) -> &str {
    raw.layers.first().map(|(l, _)| l.as_str()).unwrap_or_default()
}

fn duplicate_section(section: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: String::new(),
        value: String::new(),
        reason: "section is defined more than once".to_string(),
    }
}

fn pairs(properties: &Properties) -> Vec<(String, String)> {
    properties
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a comma-separated list of exactly `N` finite numbers.
fn parse_floats<const N: usize>(section: &str, key: &str, value: &str) -> Result<[f64; N], ConfigError> {
    let reason = format!("expected {} comma-separated numbers", N);
    let numbers = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid(section, key, value, &reason))?;

    if numbers.iter().any(|n| !n.is_finite()) {
        return Err(invalid(section, key, value, &reason));
    }
    numbers
        .try_into()
        .map_err(|_| invalid(section, key, value, &reason))
}

fn parse_zoom(section: &str, key: &str, value: &str) -> Result<u8, ConfigError> {
    match value.trim().parse::<u8>() {
        Ok(zoom) if zoom <= MAX_ZOOM => Ok(zoom),
        _ => Err(invalid(
            section,
            key,
            value,
            &format!("must be an integer between 0 and {}", MAX_ZOOM),
        )),
    }
}

fn parse_map(section: &str, properties: &Properties, map: &mut MapSection) -> Result<(), ConfigError> {
    for (key, value) in properties.iter() {
        match key {
            "attribution" => map.attribution = value.trim().to_string(),
            "bounds" => {
                let bounds = parse_floats::<4>(section, key, value)?;
                if bounds[0] >= bounds[2] || bounds[1] >= bounds[3] {
                    return Err(invalid(section, key, value, "expected west,south,east,north"));
                }
                map.bounds = bounds;
            }
            "center" => {
                let center = parse_floats::<3>(section, key, value)?;
                let zoom = center[2];
                if zoom < 0.0 || zoom > MAX_ZOOM as f64 || zoom.fract() != 0.0 {
                    return Err(invalid(section, key, value, "zoom must be an integer between 0 and 22"));
                }
                to_tile_coords(center[1], center[0], zoom as u8)
                    .map_err(|e| invalid(section, key, value, &e.to_string()))?;
                map.center = center;
            }
            "srid" => {
                let srid = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| invalid(section, key, value, "must be an EPSG code"))?;
                if srid != WEB_MERCATOR {
                    return Err(invalid(section, key, value, "only 3857 (Web Mercator) is supported"));
                }
                map.srid = srid;
            }
            "tile_extent" => {
                map.tile_extent = match value.trim().parse::<u32>() {
                    Ok(extent) if extent > 0 => extent,
                    _ => return Err(invalid(section, key, value, "must be a positive integer")),
                };
            }
            "tile_buffer" => {
                map.tile_buffer = value
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| invalid(section, key, value, "must be a non-negative integer"))?;
            }
            _ => {
                return Err(ConfigError::UnknownKey {
                    section: section.to_string(),
                    key: key.to_string(),
                })
            }
        }
    }
    Ok(())
}

fn parse_map_layer(
    section: &str,
    name: &str,
    properties: &Properties,
) -> Result<MapLayerSection, ConfigError> {
    let mut provider = None;
    let mut min_zoom = 0;
    let mut max_zoom = 0;
    let mut geom_type = GeomType::Unknown;
    let mut default_tags = Tags::new();

    for (key, value) in properties.iter() {
        if let Some(tag) = key.strip_prefix(DEFAULT_TAG_PREFIX) {
            if tag.is_empty() {
                return Err(invalid(section, key, value, "tag name must not be empty"));
            }
            default_tags.insert(tag.to_string(), TagValue::parse(value));
            continue;
        }

        match key {
            "provider" => {
                let (provider_name, layer) = value
                    .trim()
                    .split_once('.')
                    .filter(|(p, l)| !p.is_empty() && !l.is_empty())
                    .ok_or_else(|| invalid(section, key, value, "expected <provider>.<layer>"))?;
                provider = Some((provider_name.to_string(), layer.to_string()));
            }
            "min_zoom" => min_zoom = parse_zoom(section, key, value)?,
            "max_zoom" => max_zoom = parse_zoom(section, key, value)?,
            "geometry_type" => {
                geom_type = value
                    .parse()
                    .map_err(|_| invalid(section, key, value, "must be point, linestring or polygon"))?;
            }
            _ => {
                return Err(ConfigError::UnknownKey {
                    section: section.to_string(),
                    key: key.to_string(),
                })
            }
        }
    }

    if min_zoom != 0 && max_zoom != 0 && min_zoom > max_zoom {
        return Err(invalid(
            section,
            "min_zoom",
            &min_zoom.to_string(),
            "must not exceed max_zoom",
        ));
    }

    let (provider, provider_layer) = provider.ok_or_else(|| ConfigError::MissingKey {
        section: section.to_string(),
        key: "provider".to_string(),
    })?;

    Ok(MapLayerSection {
        name: name.to_string(),
        provider,
        provider_layer,
        min_zoom,
        max_zoom,
        geom_type,
        default_tags,
    })
}
