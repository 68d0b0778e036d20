//! PostGIS provider.
//!
//! Each layer is a query template, either generated from a table name or
//! supplied as raw SQL. Per request the template is rendered for the tile
//! and handed to a [`QueryExecutor`]; the returned rows are mapped into
//! features.
//!
//! The executor owns the database connection and decodes geometry columns
//! into `geo_types`; this module never talks to the wire.

mod config;
mod template;

pub use config::{
    LayerSource, PostgisConfig, PostgisLayerConfig, DEFAULT_GEOMETRY_FIELDNAME,
    DEFAULT_ID_FIELDNAME, DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT,
};
pub use template::{
    TemplateError, TemplateRenderer, TokenFn, BBOX_TOKEN, PIXEL_HEIGHT_TOKEN, PIXEL_WIDTH_TOKEN,
    SCALE_DENOMINATOR_TOKEN, ZOOM_TOKEN,
};

use crate::coord::TileCoord;
use crate::geometry::GeomType;
use crate::provider::{
    BoxFuture, Feature, FeatureSink, LayerInfo, ProviderError, TagValue, TileProvider,
};
use geo_types::Geometry;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// A column value in a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Geometry(Geometry<f64>),
    Value(TagValue),
}

/// One result row as `(column name, value)` pairs in select order.
pub type Row = Vec<(String, ColumnValue)>;

/// Executes rendered SQL against the database.
///
/// Implementations should abandon the query when `cancel` fires.
pub trait QueryExecutor: Send + Sync {
    fn query<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        sql: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Row>, ProviderError>>;
}

/// A layer ready to be queried.
#[derive(Debug, Clone)]
struct PostgisLayer {
    name: String,
    template: String,
    geometry_fieldname: String,
    id_fieldname: String,
    srid: u64,
    geom_type: GeomType,
}

impl PostgisLayer {
    fn from_config(layer: &PostgisLayerConfig, default_srid: u64) -> Self {
        let template = match &layer.source {
            LayerSource::Sql(sql) => sql.clone(),
            LayerSource::Table(table) => generate_sql(layer, table),
        };

        Self {
            name: layer.name.clone(),
            template,
            geometry_fieldname: layer.geometry_fieldname.clone(),
            id_fieldname: layer.id_fieldname.clone(),
            srid: layer.srid.unwrap_or(default_srid),
            geom_type: layer.geom_type,
        }
    }

    /// Map a row into a feature. Rows without geometry yield `None`.
    fn feature_from_row(&self, row: Row) -> Result<Option<Feature>, ProviderError> {
        let mut geometry = None;
        let mut id = None;
        let mut tags = crate::provider::Tags::new();

        for (column, value) in row {
            if column == self.geometry_fieldname {
                match value {
                    ColumnValue::Geometry(g) => geometry = Some(g),
                    ColumnValue::Null => {}
                    ColumnValue::Value(v) => {
                        return Err(ProviderError::Backend(format!(
                            "column '{}' is not a geometry: {}",
                            column, v
                        )))
                    }
                }
            } else if column == self.id_fieldname {
                id = match value {
                    ColumnValue::Null => None,
                    ColumnValue::Value(TagValue::UInt(u)) => Some(u),
                    ColumnValue::Value(TagValue::Int(i)) if i >= 0 => Some(i as u64),
                    other => {
                        return Err(ProviderError::Backend(format!(
                            "column '{}' is not a valid feature id: {:?}",
                            column, other
                        )))
                    }
                };
            } else {
                match value {
                    ColumnValue::Value(v) => {
                        tags.insert(column, v);
                    }
                    ColumnValue::Null => {}
                    ColumnValue::Geometry(_) => {
                        return Err(ProviderError::Backend(format!(
                            "unexpected geometry in column '{}'",
                            column
                        )))
                    }
                }
            }
        }

        Ok(geometry.map(|geometry| Feature {
            id,
            geometry,
            srid: self.srid,
            tags,
        }))
    }
}

/// Generated query for a table-backed layer.
fn generate_sql(layer: &PostgisLayerConfig, table: &str) -> String {
    let mut columns = vec![layer.id_fieldname.clone()];
    for field in &layer.fields {
        if field != &layer.id_fieldname && field != &layer.geometry_fieldname {
            columns.push(field.clone());
        }
    }
    columns.push(format!(
        "ST_AsBinary({geom}) AS {geom}",
        geom = layer.geometry_fieldname
    ));

    format!(
        "SELECT {} FROM {} WHERE {} && !BBOX!",
        columns.join(", "),
        table,
        layer.geometry_fieldname
    )
}

/// Query-templated provider backed by PostGIS.
pub struct PostgisProvider {
    name: String,
    layers: Vec<PostgisLayer>,
    renderer: TemplateRenderer,
    executor: Arc<dyn QueryExecutor>,
}

impl PostgisProvider {
    /// Build the provider, validating every layer template.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] for duplicate layer names and
    /// [`ProviderError::Template`] for malformed templates.
    pub fn new(
        name: impl Into<String>,
        config: &PostgisConfig,
        executor: Arc<dyn QueryExecutor>,
    ) -> Result<Self, ProviderError> {
        let name = name.into();
        let renderer = TemplateRenderer::postgis();

        let mut seen = HashSet::new();
        let mut layers = Vec::with_capacity(config.layers.len());
        for layer_config in &config.layers {
            if !seen.insert(layer_config.name.as_str()) {
                return Err(ProviderError::Config(format!(
                    "duplicate layer '{}' in provider '{}'",
                    layer_config.name, name
                )));
            }

            let layer = PostgisLayer::from_config(layer_config, config.srid);
            renderer.validate(&layer.template)?;
            debug!(provider = %name, layer = %layer.name, sql = %layer.template, "Registered layer");
            layers.push(layer);
        }

        Ok(Self {
            name,
            layers,
            renderer,
            executor,
        })
    }

    fn layer(&self, name: &str) -> Result<&PostgisLayer, ProviderError> {
        self.layers
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| ProviderError::UnknownLayer {
                provider: self.name.clone(),
                layer: name.to_string(),
            })
    }

    /// Rendered SQL for a layer and tile.
    pub fn layer_sql(&self, layer: &str, tile: &TileCoord) -> Result<String, ProviderError> {
        let layer = self.layer(layer)?;
        Ok(self.renderer.render(&layer.template, tile, layer.srid)?)
    }
}

impl TileProvider for PostgisProvider {
    fn tile_features<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        layer: &'a str,
        tile: &'a TileCoord,
        on_feature: &'a mut FeatureSink<'a>,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            let layer = self.layer(layer)?;
            let sql = self.renderer.render(&layer.template, tile, layer.srid)?;
            trace!(provider = %self.name, layer = %layer.name, sql = %sql, "Executing layer query");

            let rows = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                rows = self.executor.query(cancel, &sql) => rows?,
            };

            for row in rows {
                if cancel.is_cancelled() {
                    return Err(ProviderError::Cancelled);
                }
                if let Some(feature) = layer.feature_from_row(row)? {
                    on_feature(feature)?;
                }
            }
            Ok(())
        })
    }

    fn layers(&self) -> Result<Vec<LayerInfo>, ProviderError> {
        Ok(self
            .layers
            .iter()
            .map(|l| LayerInfo {
                name: l.name.clone(),
                geom_type: l.geom_type,
                srid: l.srid,
            })
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
