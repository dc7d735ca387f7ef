//! Compiled layer definitions.

use std::collections::BTreeMap;

use geosink_core::{ConfigDict, ConsumerError, Feature, GeometryKind, LayerInfo, geometry_name};

use crate::PostgisError;
use crate::template::{RenderError, Template};

const KEY_NAME: &str = "name";
const KEY_SQL: &str = "sql";
const KEY_GEOM_TYPE: &str = "geom_type";
const KEY_SRID: &str = "srid";

/// A layer with its shape, reference id and compiled statement template.
///
/// Immutable once built, so concurrent inserts read it without locking.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDefinition {
    name: String,
    kind: GeometryKind,
    srid: u64,
    template: Template,
}

impl LayerDefinition {
    /// Build a layer from parts.
    #[must_use]
    pub const fn new(name: String, kind: GeometryKind, srid: u64, template: Template) -> Self {
        Self {
            name,
            kind,
            srid,
            template,
        }
    }

    /// Read a layer block: `name`, `sql` and `geom_type` are required and an
    /// optional `srid` overrides `default_srid`.
    pub fn from_config(config: &ConfigDict, default_srid: u64) -> Result<Self, PostgisError> {
        let name = config.string(KEY_NAME)?;
        let sql = config.string(KEY_SQL)?;
        let template = Template::compile(sql).map_err(|source| PostgisError::TemplateCompile {
            layer: name.to_owned(),
            source,
        })?;
        let kind: GeometryKind = config.string(KEY_GEOM_TYPE)?.parse()?;
        let srid = config.u64_or(KEY_SRID, default_srid)?;
        Ok(Self::new(name.to_owned(), kind, srid, template))
    }

    /// Layer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared geometry shape.
    #[must_use]
    pub const fn kind(&self) -> GeometryKind {
        self.kind
    }

    /// Coordinate reference id.
    #[must_use]
    pub const fn srid(&self) -> u64 {
        self.srid
    }

    /// Statement template.
    #[must_use]
    pub const fn template(&self) -> &Template {
        &self.template
    }

    /// Outward projection of this layer.
    #[must_use]
    pub fn info(&self) -> LayerInfo {
        LayerInfo {
            name: self.name.clone(),
            kind: self.kind,
            srid: self.srid,
        }
    }

    /// Reject features whose geometry is not exactly the declared shape.
    pub fn check(&self, feature: &Feature) -> Result<(), ConsumerError> {
        if self.kind.matches(&feature.geometry) {
            return Ok(());
        }
        Err(ConsumerError::GeometryTypeMismatch {
            layer: self.name.clone(),
            expected: self.kind,
            got: geometry_name(&feature.geometry),
        })
    }

    /// Render the insertion statement for `feature`.
    pub fn render(&self, feature: &Feature) -> Result<String, RenderError> {
        self.template.render(feature)
    }
}

/// Build every layer in `blocks`, rejecting duplicate names.
pub fn compile_layers(
    blocks: &[ConfigDict],
    default_srid: u64,
) -> Result<BTreeMap<String, LayerDefinition>, PostgisError> {
    let mut layers = BTreeMap::new();
    for block in blocks {
        let layer = LayerDefinition::from_config(block, default_srid)?;
        if layers.contains_key(layer.name()) {
            return Err(PostgisError::DuplicateLayer(layer.name));
        }
        layers.insert(layer.name.clone(), layer);
    }
    Ok(layers)
}
