//! Assembler input types.

use crate::geometry::TileGeometry;
use crate::provider::Tags;

/// A feature ready for assembly, geometry still in map units.
#[derive(Debug, Clone, PartialEq)]
pub struct TileFeature {
    pub id: Option<u64>,
    pub geometry: TileGeometry,
    pub tags: Tags,
}

/// A named layer of features in tile order.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    pub name: String,
    pub features: Vec<TileFeature>,
}

impl TileLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
        }
    }

    pub fn push(&mut self, feature: TileFeature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
