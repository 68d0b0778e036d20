//! `validate` command.
//!
//! Parses the configuration and summarizes it. When every provider can be
//! created without a database connection, the atlas is built as well so
//! that layer references are checked against what the providers serve.

use std::path::Path;
use tessera::config::ConfigFile;
use tessera::provider::{ProviderConfig, ProviderFactory};

use super::common::load_config;
use crate::error::CliError;

pub fn run(path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(path)?;

    print_summary(&config);

    if needs_connector(&config) {
        println!();
        println!("PostGIS providers found: layer references were not checked against a database.");
    } else {
        config.build_atlas(&ProviderFactory::new())?;
        println!();
        println!("All layer references resolved.");
    }

    println!("Configuration OK");
    Ok(())
}

fn needs_connector(config: &ConfigFile) -> bool {
    config
        .providers
        .iter()
        .any(|p| matches!(p.config, ProviderConfig::Postgis(_)))
}

fn print_summary(config: &ConfigFile) {
    println!("Providers");
    println!("=========");
    for provider in &config.providers {
        match &provider.config {
            ProviderConfig::Postgis(pg) => println!(
                "  {:<16} postgis  {}@{}:{}/{} ({} layers)",
                provider.name,
                pg.user,
                pg.host,
                pg.port,
                pg.database,
                pg.layers.len()
            ),
            other => println!("  {:<16} {}", provider.name, other.kind()),
        }
    }

    println!();
    println!("Maps");
    println!("====");
    for map in &config.maps {
        println!(
            "  {:<16} {} layers, extent {}, buffer {}",
            map.name,
            map.layers.len(),
            map.tile_extent,
            map.tile_buffer
        );
    }
}
