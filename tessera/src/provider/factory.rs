//! Provider factory for centralized provider creation.
//!
//! Turns validated provider configuration into shared
//! `Arc<dyn TileProvider>` instances. Database-backed providers need a
//! connector that opens a [`QueryExecutor`] for their configuration.

use super::debug::DebugProvider;
use super::postgis::{PostgisConfig, PostgisLayerConfig, PostgisProvider, QueryExecutor};
use super::types::{ProviderError, TileProvider};
use std::fmt;
use std::sync::Arc;

/// Key selecting the provider kind.
pub const KEY_TYPE: &str = "type";

/// Opens a query executor for a PostGIS configuration.
pub type PostgisConnector =
    Arc<dyn Fn(&PostgisConfig) -> Result<Arc<dyn QueryExecutor>, ProviderError> + Send + Sync>;

/// Configuration for creating a provider.
///
/// # Example
///
/// ```
/// use tessera::provider::ProviderConfig;
///
/// let options = vec![("type".to_string(), "debug".to_string())];
/// let config = ProviderConfig::from_options(&options, &[]).unwrap();
/// assert_eq!(config.kind(), "debug");
/// ```
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    /// Tile outline and center label layers.
    Debug,

    /// Query-templated PostGIS source.
    Postgis(PostgisConfig),
}

impl ProviderConfig {
    /// Build a provider configuration from raw option pairs.
    ///
    /// `layers` holds the per-layer options of the provider, in order.
    pub fn from_options(
        options: &[(String, String)],
        layers: &[(String, Vec<(String, String)>)],
    ) -> Result<Self, ProviderError> {
        let kind = options
            .iter()
            .find(|(k, _)| k == KEY_TYPE)
            .map(|(_, v)| v.trim())
            .ok_or_else(|| ProviderError::Config(format!("missing required key '{}'", KEY_TYPE)))?;

        let rest: Vec<(String, String)> = options
            .iter()
            .filter(|(k, _)| k != KEY_TYPE)
            .cloned()
            .collect();

        match kind {
            "debug" => {
                if let Some((key, _)) = rest.first() {
                    return Err(ProviderError::Config(format!(
                        "debug provider: unknown key '{}'",
                        key
                    )));
                }
                if let Some((layer, _)) = layers.first() {
                    return Err(ProviderError::Config(format!(
                        "debug provider does not take layer configuration (found '{}')",
                        layer
                    )));
                }
                Ok(Self::Debug)
            }
            "postgis" => {
                let mut config = PostgisConfig::from_options(&rest)?;
                for (name, layer_options) in layers {
                    config = config.with_layer(PostgisLayerConfig::from_options(name, layer_options)?);
                }
                Ok(Self::Postgis(config))
            }
            other => Err(ProviderError::Config(format!(
                "unknown provider type '{}'",
                other
            ))),
        }
    }

    /// Provider kind as written in configuration.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Postgis(_) => "postgis",
        }
    }
}

/// Factory for creating provider instances.
#[derive(Clone, Default)]
pub struct ProviderFactory {
    postgis_connector: Option<PostgisConnector>,
}

impl ProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the connector used for PostGIS providers.
    pub fn with_postgis_connector<F>(mut self, connector: F) -> Self
    where
        F: Fn(&PostgisConfig) -> Result<Arc<dyn QueryExecutor>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        self.postgis_connector = Some(Arc::new(connector));
        self
    }

    /// Create a provider from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] when a PostGIS provider is requested
    /// but no connector is registered, or when layer validation fails.
    pub fn create(
        &self,
        name: &str,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn TileProvider>, ProviderError> {
        match config {
            ProviderConfig::Debug => Ok(Arc::new(DebugProvider::new())),
            ProviderConfig::Postgis(postgis) => {
                let connector = self.postgis_connector.as_ref().ok_or_else(|| {
                    ProviderError::Config(format!(
                        "provider '{}': no PostGIS connector is available",
                        name
                    ))
                })?;
                let executor = connector(postgis)?;
                Ok(Arc::new(PostgisProvider::new(name, postgis, executor)?))
            }
        }
    }
}

impl fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("postgis_connector", &self.postgis_connector.is_some())
            .finish()
    }
}
