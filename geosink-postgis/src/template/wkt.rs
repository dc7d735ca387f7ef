//! Well-known-text encoding in the OGC form (`POINT (1 1)`).

use geo::{Coord, Geometry, LineString, Polygon};

const EMPTY: &str = "EMPTY";

/// Encode `geometry` as WKT.
pub(super) fn to_wkt(geometry: &Geometry<f64>) -> String {
    let mut out = String::new();
    write_geometry(&mut out, geometry);
    out
}

fn write_geometry(out: &mut String, geometry: &Geometry<f64>) {
    match geometry {
        Geometry::Point(point) => {
            out.push_str("POINT (");
            write_coord(out, point.0);
            out.push(')');
        }
        Geometry::MultiPoint(points) => {
            out.push_str("MULTIPOINT ");
            write_list(out, &points.0, |out, point| write_coord(out, point.0));
        }
        Geometry::Line(line) => {
            out.push_str("LINESTRING ");
            write_line(out, &LineString::new(vec![line.start, line.end]));
        }
        Geometry::LineString(line) => {
            out.push_str("LINESTRING ");
            write_line(out, line);
        }
        Geometry::MultiLineString(lines) => {
            out.push_str("MULTILINESTRING ");
            write_list(out, &lines.0, write_line);
        }
        Geometry::Polygon(polygon) => {
            out.push_str("POLYGON ");
            write_polygon(out, polygon);
        }
        Geometry::Rect(rect) => {
            out.push_str("POLYGON ");
            write_polygon(out, &rect.to_polygon());
        }
        Geometry::Triangle(triangle) => {
            out.push_str("POLYGON ");
            write_polygon(out, &triangle.to_polygon());
        }
        Geometry::MultiPolygon(polygons) => {
            out.push_str("MULTIPOLYGON ");
            write_list(out, &polygons.0, write_polygon);
        }
        Geometry::GeometryCollection(collection) => {
            out.push_str("GEOMETRYCOLLECTION ");
            write_list(out, &collection.0, write_geometry);
        }
    }
}

/// Write `items` as a parenthesised, comma-separated list, or `EMPTY`.
fn write_list<T>(out: &mut String, items: &[T], mut write: impl FnMut(&mut String, &T)) {
    if items.is_empty() {
        out.push_str(EMPTY);
        return;
    }
    out.push('(');
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        write(out, item);
    }
    out.push(')');
}

fn write_coord(out: &mut String, coord: Coord<f64>) {
    out.push_str(&coord.x.to_string());
    out.push(' ');
    out.push_str(&coord.y.to_string());
}

fn write_line(out: &mut String, line: &LineString<f64>) {
    write_list(out, &line.0, |out, coord| write_coord(out, *coord));
}

fn write_polygon(out: &mut String, polygon: &Polygon<f64>) {
    if polygon.exterior().0.is_empty() {
        out.push_str(EMPTY);
        return;
    }
    out.push('(');
    write_line(out, polygon.exterior());
    for ring in polygon.interiors() {
        out.push_str(", ");
        write_line(out, ring);
    }
    out.push(')');
}
