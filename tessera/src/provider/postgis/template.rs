//! Query templating.
//!
//! Layer queries carry tokens of the form `!NAME!` that are replaced per
//! request with values computed from the tile:
//!
//! | Token                  | Value                                          |
//! |------------------------|------------------------------------------------|
//! | `!ZOOM!`               | zoom level                                     |
//! | `!BBOX!`               | `ST_MakeEnvelope(minX,maxY,maxX,minY,srid)`    |
//! | `!SCALE_DENOMINATOR!`  | map scale denominator (postgis only)           |
//! | `!PIXEL_WIDTH!`        | metres per output unit along X (postgis only)  |
//! | `!PIXEL_HEIGHT!`       | metres per output unit along Y (postgis only)  |
//!
//! Tokens the renderer does not know are left in place. An opening `!` that
//! starts an identifier but never closes is a syntax error, unless the
//! identifier runs on into lowercase text (`'Yahoo!News'`), which is plain
//! text.

use crate::coord::TileCoord;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

pub const ZOOM_TOKEN: &str = "ZOOM";
pub const BBOX_TOKEN: &str = "BBOX";
pub const SCALE_DENOMINATOR_TOKEN: &str = "SCALE_DENOMINATOR";
pub const PIXEL_WIDTH_TOKEN: &str = "PIXEL_WIDTH";
pub const PIXEL_HEIGHT_TOKEN: &str = "PIXEL_HEIGHT";

/// Computes a token's replacement for a tile and SRID.
pub type TokenFn = Arc<dyn Fn(&TileCoord, u64) -> String + Send + Sync>;

/// Errors raised while scanning a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A token was opened but never closed
    #[error("Unterminated token '{fragment}' at byte {position}")]
    Syntax { position: usize, fragment: String },
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!([A-Z][A-Z0-9_]*)(!|[A-Za-z0-9_]?)").unwrap())
}

/// Renders query templates for a tile.
///
/// # Example
///
/// ```
/// use tessera::coord::TileCoord;
/// use tessera::provider::postgis::TemplateRenderer;
///
/// let tile = TileCoord::new(2, 1, 1).unwrap();
/// let sql = TemplateRenderer::new()
///     .render("SELECT * FROM roads WHERE zoom <= !ZOOM!", &tile, 3857)
///     .unwrap();
/// assert_eq!(sql, "SELECT * FROM roads WHERE zoom <= 2");
/// ```
#[derive(Clone)]
pub struct TemplateRenderer {
    tokens: BTreeMap<String, TokenFn>,
}

impl TemplateRenderer {
    /// Renderer with the core `!ZOOM!` and `!BBOX!` tokens.
    pub fn new() -> Self {
        Self {
            tokens: BTreeMap::new(),
        }
        .with_token(ZOOM_TOKEN, |tile, _| tile.zoom().to_string())
        .with_token(BBOX_TOKEN, |tile, srid| {
            let extent = tile.extent();
            // Upper-left then lower-right corner, Y flipped
            format!(
                "ST_MakeEnvelope({},{},{},{},{})",
                extent.min.x, extent.max.y, extent.max.x, extent.min.y, srid
            )
        })
    }

    /// Renderer with the core tokens plus the PostGIS scale tokens.
    pub fn postgis() -> Self {
        Self::new()
            .with_token(SCALE_DENOMINATOR_TOKEN, |tile, _| {
                tile.scale_denominator().to_string()
            })
            .with_token(PIXEL_WIDTH_TOKEN, |tile, _| tile.pixel_size().to_string())
            .with_token(PIXEL_HEIGHT_TOKEN, |tile, _| tile.pixel_size().to_string())
    }

    /// Register (or replace) a token. `name` is given without delimiters.
    pub fn with_token<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&TileCoord, u64) -> String + Send + Sync + 'static,
    {
        self.tokens.insert(name.to_string(), Arc::new(f));
        self
    }

    /// Returns true if `name` is a registered token.
    pub fn knows(&self, name: &str) -> bool {
        self.tokens.contains_key(name)
    }

    /// Check a template for syntax errors without rendering it.
    pub fn validate(&self, template: &str) -> Result<(), TemplateError> {
        for caps in token_regex().captures_iter(template) {
            classify(&caps)?;
        }
        Ok(())
    }

    /// Replace every known token in `template` with its value for `tile`.
    pub fn render(&self, template: &str, tile: &TileCoord, srid: u64) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len() + 64);
        let mut last = 0;

        for caps in token_regex().captures_iter(template) {
            if classify(&caps)? == Match::Text {
                continue;
            }

            let whole = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            let name = &caps[1];

            out.push_str(&template[last..whole.start()]);
            match self.tokens.get(name) {
                Some(f) => out.push_str(&f(tile, srid)),
                None => out.push_str(whole.as_str()),
            }
            last = whole.end();
        }

        out.push_str(&template[last..]);
        Ok(out)
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRenderer")
            .field("tokens", &self.tokens.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Match {
    Token,
    Text,
}

/// A match is a token when closed by `!`, ordinary text when the identifier
/// continues with a lowercase letter, and unterminated otherwise.
fn classify(caps: &regex::Captures<'_>) -> Result<Match, TemplateError> {
    match caps.get(2).map(|m| m.as_str()) {
        Some("!") => Ok(Match::Token),
        Some(tail) if !tail.is_empty() => Ok(Match::Text),
        _ => match caps.get(0) {
            Some(m) => Err(TemplateError::Syntax {
                position: m.start(),
                fragment: m.as_str().to_string(),
            }),
            None => Ok(Match::Text),
        },
    }
}
