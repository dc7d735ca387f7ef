//! Features submitted for insertion.

use std::collections::BTreeMap;

use geo::Geometry;
use serde_json::Value;

use crate::GeometryKind;

/// Open set of key/value tags carried by a feature.
pub type Tags = BTreeMap<String, Value>;

/// One geometry plus its coordinate reference id and tags.
///
/// Features are transient: constructed per request, consumed by a single
/// insertion call and never retained by a consumer.
///
/// # Examples
///
/// ```
/// use geo::{Geometry, Point};
/// use geosink_core::{Feature, GeometryKind};
///
/// let feature = Feature::new(Geometry::Point(Point::new(2.0, 4.0)), 4326)
///     .with_tag("name", "fountain");
/// assert_eq!(feature.kind(), Some(GeometryKind::Point));
/// assert_eq!(feature.tags["name"], "fountain");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Geometry to persist.
    pub geometry: Geometry<f64>,
    /// Coordinate reference id the geometry is expressed in.
    pub srid: u64,
    /// Arbitrary attribute values.
    pub tags: Tags,
}

impl Feature {
    /// Build a feature without tags.
    #[must_use]
    pub const fn new(geometry: Geometry<f64>, srid: u64) -> Self {
        Self {
            geometry,
            srid,
            tags: Tags::new(),
        }
    }

    /// Replace the tag set.
    #[must_use]
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Add or replace a single tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Catalogue kind of the geometry, if it has one.
    #[must_use]
    pub const fn kind(&self) -> Option<GeometryKind> {
        GeometryKind::of(&self.geometry)
    }
}
