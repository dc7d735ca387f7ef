//! Little-endian ISO well-known-binary encoding for two-dimensional
//! geometries.

use std::borrow::Cow;

use geo::{Geometry, GeometryCollection, LineString};
use ::wkb::Endianness;
use ::wkb::error::WkbError;
use ::wkb::writer::{WriteOptions, write_geometry};

/// Encode `geometry` as WKB.
///
/// Lines, rectangles and triangles have no WKB type of their own and are
/// written as the line string or polygon they describe.
pub(super) fn to_wkb(geometry: &Geometry<f64>) -> Result<Vec<u8>, WkbError> {
    let mut buf = Vec::new();
    let options = WriteOptions {
        endianness: Endianness::LittleEndian,
    };
    let shape = normalized(geometry);
    write_geometry(&mut buf, &*shape, &options)?;
    Ok(buf)
}

fn normalized(geometry: &Geometry<f64>) -> Cow<'_, Geometry<f64>> {
    match geometry {
        Geometry::Line(line) => Cow::Owned(Geometry::LineString(LineString::new(vec![
            line.start, line.end,
        ]))),
        Geometry::Rect(rect) => Cow::Owned(Geometry::Polygon(rect.to_polygon())),
        Geometry::Triangle(triangle) => Cow::Owned(Geometry::Polygon(triangle.to_polygon())),
        Geometry::GeometryCollection(collection) if collection.iter().any(needs_rewrite) => {
            Cow::Owned(Geometry::GeometryCollection(GeometryCollection::new_from(
                collection
                    .iter()
                    .map(|member| normalized(member).into_owned())
                    .collect(),
            )))
        }
        other => Cow::Borrowed(other),
    }
}

fn needs_rewrite(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::Line(_) | Geometry::Rect(_) | Geometry::Triangle(_) => true,
        Geometry::GeometryCollection(collection) => collection.iter().any(needs_rewrite),
        _ => false,
    }
}
