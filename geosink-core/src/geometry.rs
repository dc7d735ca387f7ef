//! Closed catalogue of the geometry shapes a layer may declare.
//!
//! Each layer fixes exactly one [`GeometryKind`] at construction and every
//! feature written to it must carry a geometry of that exact shape. The
//! check is a plain tag comparison; a `Point` is never accepted where a
//! `MultiPoint` is declared.

use std::fmt;
use std::str::FromStr;

use geo::Geometry;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Geometry shapes supported by layer declarations.
///
/// # Examples
///
/// ```
/// use geo::{Geometry, Point};
/// use geosink_core::GeometryKind;
///
/// let kind: GeometryKind = "point".parse().unwrap();
/// assert!(kind.matches(&Geometry::Point(Point::new(1.0, 1.0))));
/// assert_eq!(kind.to_string(), "point");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryKind {
    /// A single position.
    Point,
    /// A set of positions.
    MultiPoint,
    /// A connected sequence of positions.
    LineString,
    /// A set of line strings.
    MultiLineString,
    /// An exterior ring with optional holes.
    Polygon,
    /// A set of polygons.
    MultiPolygon,
    /// A heterogeneous geometry collection.
    Collection,
}

impl GeometryKind {
    /// Every supported kind in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Point,
        Self::MultiPoint,
        Self::LineString,
        Self::MultiLineString,
        Self::Polygon,
        Self::MultiPolygon,
        Self::Collection,
    ];

    /// Configuration tag for this kind, as accepted by `geom_type`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::MultiPoint => "multipoint",
            Self::LineString => "linestring",
            Self::MultiLineString => "multilinestring",
            Self::Polygon => "polygon",
            Self::MultiPolygon => "multipolygon",
            Self::Collection => "collection",
        }
    }

    /// Classify a geometry, returning `None` for shapes outside the catalogue
    /// (`Line`, `Rect` and `Triangle`).
    #[must_use]
    pub const fn of(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Point(_) => Some(Self::Point),
            Geometry::MultiPoint(_) => Some(Self::MultiPoint),
            Geometry::LineString(_) => Some(Self::LineString),
            Geometry::MultiLineString(_) => Some(Self::MultiLineString),
            Geometry::Polygon(_) => Some(Self::Polygon),
            Geometry::MultiPolygon(_) => Some(Self::MultiPolygon),
            Geometry::GeometryCollection(_) => Some(Self::Collection),
            Geometry::Line(_) | Geometry::Rect(_) | Geometry::Triangle(_) => None,
        }
    }

    /// Whether `geometry` has exactly this shape.
    #[must_use]
    pub fn matches(self, geometry: &Geometry<f64>) -> bool {
        Self::of(geometry) == Some(self)
    }
}

/// Human-readable shape name for any geometry, including those outside the
/// catalogue. Used in mismatch diagnostics.
#[must_use]
pub const fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match GeometryKind::of(geometry) {
        Some(kind) => kind.as_str(),
        None => match geometry {
            Geometry::Line(_) => "line",
            Geometry::Rect(_) => "rect",
            _ => "triangle",
        },
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for GeometryKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Error returned when a `geom_type` string names no known kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for geom_type, {0:?}")]
pub struct InvalidGeometryType(pub String);

impl FromStr for GeometryKind {
    type Err = InvalidGeometryType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| InvalidGeometryType(value.to_owned()))
    }
}
