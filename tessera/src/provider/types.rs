//! Provider types and traits

use crate::coord::TileCoord;
use crate::geometry::{ConversionError, GeomType};
use crate::provider::postgis::TemplateError;
use geo_types::Geometry;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Callback receiving each feature a provider streams.
///
/// Returning an error stops the stream; the provider returns that error.
pub type FeatureSink<'s> = dyn FnMut(Feature) -> Result<(), ProviderError> + Send + 's;

/// Tags attached to a feature, ordered by key.
pub type Tags = BTreeMap<String, TagValue>;

/// A scalar tag value.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    String(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl TagValue {
    /// Infer a tag value from its textual form.
    ///
    /// `true`/`false` become booleans, integers become `Int` (or `UInt` when
    /// they only fit unsigned), decimals become `Float`. Anything else is
    /// kept as a string.
    pub fn parse(raw: &str) -> TagValue {
        let trimmed = raw.trim();
        match trimmed {
            "true" => return TagValue::Bool(true),
            "false" => return TagValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return TagValue::Int(i);
        }
        if let Ok(u) = trimmed.parse::<u64>() {
            return TagValue::UInt(u);
        }
        if trimmed.contains('.') {
            if let Ok(f) = trimmed.parse::<f64>() {
                if f.is_finite() {
                    return TagValue::Float(f);
                }
            }
        }
        TagValue::String(raw.to_string())
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::String(s) => f.write_str(s),
            TagValue::Int(i) => write!(f, "{}", i),
            TagValue::UInt(u) => write!(f, "{}", u),
            TagValue::Float(v) => write!(f, "{}", v),
            TagValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::String(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::String(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::Int(value)
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        TagValue::Float(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Bool(value)
    }
}

/// A geographic feature as returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: Option<u64>,
    /// Geometry in the reference system given by `srid`
    pub geometry: Geometry<f64>,
    pub srid: u64,
    pub tags: Tags,
}

impl Feature {
    pub fn new(geometry: Geometry<f64>, srid: u64) -> Self {
        Self {
            id: None,
            geometry,
            srid,
            tags: Tags::new(),
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Metadata for a layer a provider can serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInfo {
    pub name: String,
    pub geom_type: GeomType,
    pub srid: u64,
}

/// Errors that can occur during provider operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// The caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,

    /// The provider has no layer with this name
    #[error("Unknown layer '{layer}' in provider '{provider}'")]
    UnknownLayer { provider: String, layer: String },

    /// A feature's geometry could not be converted
    #[error("Geometry conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    /// A query template could not be rendered
    #[error("Query template error: {0}")]
    Template(#[from] TemplateError),

    /// The backing data source failed
    #[error("Backend error: {0}")]
    Backend(String),

    /// Invalid provider configuration
    #[error("Invalid provider configuration: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProviderError::Cancelled)
    }
}

/// A source of features for tiles.
///
/// Implementations must be `Send + Sync`; a single provider is shared by
/// every layer that references it and by concurrent requests.
///
/// # Dyn Compatibility
///
/// Async methods return [`BoxFuture`] so providers can be held as
/// `Arc<dyn TileProvider>`.
pub trait TileProvider: Send + Sync {
    /// Stream the features of `layer` that intersect the tile's buffered
    /// extent.
    ///
    /// `on_feature` is invoked once per feature, in order. Implementations
    /// check `cancel` between features and return
    /// [`ProviderError::Cancelled`] promptly once it fires. An error from
    /// `on_feature` stops the stream and is returned as is.
    fn tile_features<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        layer: &'a str,
        tile: &'a TileCoord,
        on_feature: &'a mut FeatureSink<'a>,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    /// Layers served by this provider. Used at configuration time only.
    fn layers(&self) -> Result<Vec<LayerInfo>, ProviderError>;

    /// Provider name for logging and identification.
    fn name(&self) -> &str;
}
