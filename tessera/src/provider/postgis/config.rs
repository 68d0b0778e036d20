//! PostGIS provider configuration.
//!
//! Options arrive as raw key/value pairs from the configuration file and are
//! validated against a fixed set of recognised keys.

use crate::coord::WEB_MERCATOR;
use crate::geometry::GeomType;
use crate::provider::ProviderError;
use std::fmt;

// Provider keys
pub const KEY_HOST: &str = "host";
pub const KEY_PORT: &str = "port";
pub const KEY_DATABASE: &str = "database";
pub const KEY_USER: &str = "user";
pub const KEY_PASSWORD: &str = "password";
pub const KEY_SRID: &str = "srid";
pub const KEY_MAX_CONNECTIONS: &str = "max_connections";

// Layer keys
pub const KEY_TABLENAME: &str = "tablename";
pub const KEY_SQL: &str = "sql";
pub const KEY_GEOMETRY_FIELDNAME: &str = "geometry_fieldname";
pub const KEY_ID_FIELDNAME: &str = "id_fieldname";
pub const KEY_FIELDS: &str = "fields";
pub const KEY_GEOMETRY_TYPE: &str = "geometry_type";

const PROVIDER_KEYS: &[&str] = &[
    KEY_HOST,
    KEY_PORT,
    KEY_DATABASE,
    KEY_USER,
    KEY_PASSWORD,
    KEY_SRID,
    KEY_MAX_CONNECTIONS,
];

const LAYER_KEYS: &[&str] = &[
    KEY_TABLENAME,
    KEY_SQL,
    KEY_GEOMETRY_FIELDNAME,
    KEY_ID_FIELDNAME,
    KEY_FIELDS,
    KEY_SRID,
    KEY_GEOMETRY_TYPE,
];

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 100;
pub const DEFAULT_GEOMETRY_FIELDNAME: &str = "geom";
pub const DEFAULT_ID_FIELDNAME: &str = "gid";

/// Where a layer's rows come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerSource {
    /// A table; the query is generated
    Table(String),
    /// A query template supplied verbatim
    Sql(String),
}

/// Configuration of one PostGIS layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgisLayerConfig {
    pub name: String,
    pub source: LayerSource,
    pub geometry_fieldname: String,
    pub id_fieldname: String,
    pub fields: Vec<String>,
    /// Overrides the provider SRID when set
    pub srid: Option<u64>,
    pub geom_type: GeomType,
}

impl PostgisLayerConfig {
    /// Build a layer from its option pairs.
    pub fn from_options(name: &str, options: &[(String, String)]) -> Result<Self, ProviderError> {
        reject_unknown(options, LAYER_KEYS, &format!("layer '{}'", name))?;

        let tablename = lookup(options, KEY_TABLENAME);
        let sql = lookup(options, KEY_SQL);
        let source = match (tablename, sql) {
            (Some(table), None) => LayerSource::Table(non_empty(KEY_TABLENAME, table)?),
            (None, Some(sql)) => {
                let sql = non_empty(KEY_SQL, sql)?;
                if !sql.contains("!BBOX!") {
                    return Err(ProviderError::Config(format!(
                        "layer '{}': sql must contain the !BBOX! token",
                        name
                    )));
                }
                LayerSource::Sql(sql)
            }
            (Some(_), Some(_)) => {
                return Err(ProviderError::Config(format!(
                    "layer '{}': '{}' and '{}' are mutually exclusive",
                    name, KEY_TABLENAME, KEY_SQL
                )))
            }
            (None, None) => {
                return Err(ProviderError::Config(format!(
                    "layer '{}': one of '{}' or '{}' is required",
                    name, KEY_TABLENAME, KEY_SQL
                )))
            }
        };

        let fields = lookup(options, KEY_FIELDS)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let srid = lookup(options, KEY_SRID)
            .map(|raw| parse_number::<u64>(KEY_SRID, raw))
            .transpose()?;

        let geom_type = match lookup(options, KEY_GEOMETRY_TYPE) {
            Some(raw) => raw.parse::<GeomType>().map_err(|e| {
                ProviderError::Config(format!("layer '{}': {}: {}", name, KEY_GEOMETRY_TYPE, e))
            })?,
            None => GeomType::Unknown,
        };

        Ok(Self {
            name: name.to_string(),
            source,
            geometry_fieldname: lookup(options, KEY_GEOMETRY_FIELDNAME)
                .unwrap_or(DEFAULT_GEOMETRY_FIELDNAME)
                .to_string(),
            id_fieldname: lookup(options, KEY_ID_FIELDNAME)
                .unwrap_or(DEFAULT_ID_FIELDNAME)
                .to_string(),
            fields,
            srid,
            geom_type,
        })
    }
}

/// Configuration of a PostGIS provider and its layers.
#[derive(Clone, PartialEq, Eq)]
pub struct PostgisConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub srid: u64,
    pub max_connections: u32,
    pub layers: Vec<PostgisLayerConfig>,
}

impl PostgisConfig {
    /// Build the provider configuration from its option pairs.
    ///
    /// Layers are added separately with [`PostgisConfig::with_layer`].
    pub fn from_options(options: &[(String, String)]) -> Result<Self, ProviderError> {
        reject_unknown(options, PROVIDER_KEYS, "provider")?;

        Ok(Self {
            host: required(options, KEY_HOST)?,
            port: lookup(options, KEY_PORT)
                .map(|raw| parse_number(KEY_PORT, raw))
                .transpose()?
                .unwrap_or(DEFAULT_PORT),
            database: required(options, KEY_DATABASE)?,
            user: required(options, KEY_USER)?,
            password: lookup(options, KEY_PASSWORD).unwrap_or_default().to_string(),
            srid: lookup(options, KEY_SRID)
                .map(|raw| parse_number(KEY_SRID, raw))
                .transpose()?
                .unwrap_or(WEB_MERCATOR),
            max_connections: lookup(options, KEY_MAX_CONNECTIONS)
                .map(|raw| parse_number(KEY_MAX_CONNECTIONS, raw))
                .transpose()?
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            layers: Vec::new(),
        })
    }

    pub fn with_layer(mut self, layer: PostgisLayerConfig) -> Self {
        self.layers.push(layer);
        self
    }

    /// Connection string in libpq key/value form.
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            self.host, self.port, self.database, self.user, self.password
        )
    }
}

impl fmt::Debug for PostgisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("srid", &self.srid)
            .field("max_connections", &self.max_connections)
            .field("layers", &self.layers)
            .finish()
    }
}

fn lookup<'a>(options: &'a [(String, String)], key: &str) -> Option<&'a str> {
    options
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn required(options: &[(String, String)], key: &str) -> Result<String, ProviderError> {
    match lookup(options, key) {
        Some(value) => non_empty(key, value),
        None => Err(ProviderError::Config(format!("missing required key '{}'", key))),
    }
}

fn non_empty(key: &str, value: &str) -> Result<String, ProviderError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ProviderError::Config(format!("'{}' must not be empty", key)));
    }
    Ok(value.to_string())
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ProviderError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ProviderError::Config(format!("'{}' is not a valid number: '{}'", key, raw)))
}

fn reject_unknown(
    options: &[(String, String)],
    known: &[&str],
    context: &str,
) -> Result<(), ProviderError> {
    for (key, _) in options {
        if !known.contains(&key.as_str()) {
            return Err(ProviderError::Config(format!(
                "{}: unknown key '{}'",
                context, key
            )));
        }
    }
    Ok(())
}
