//! Feature provider abstraction
//!
//! A provider answers "which features of layer L intersect tile T". The
//! encoder only sees the [`TileProvider`] trait; concrete sources are the
//! [`DebugProvider`] and the query-templated [`PostgisProvider`].
//!
//! # Factory Pattern
//!
//! For creation from configuration, use the [`ProviderFactory`]:
//!
//! ```ignore
//! use tessera::provider::{ProviderConfig, ProviderFactory};
//!
//! let factory = ProviderFactory::new().with_postgis_connector(connect);
//! let provider = factory.create("osm", &ProviderConfig::from_options(&options, &layers)?)?;
//! ```

mod debug;
mod factory;
pub mod postgis;
mod types;

pub use debug::{DebugProvider, DEBUG_PROVIDER_NAME, LAYER_TILE_CENTER, LAYER_TILE_OUTLINE};
pub use factory::{PostgisConnector, ProviderConfig, ProviderFactory, KEY_TYPE};
pub use postgis::{PostgisProvider, QueryExecutor};
pub use types::{
    BoxFuture, Feature, FeatureSink, LayerInfo, ProviderError, TagValue, Tags, TileProvider,
};

#[cfg(test)]
pub use types::tests::{MockLayer, MockProvider};
