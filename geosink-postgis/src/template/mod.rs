//! Per-layer SQL statement templates.
//!
//! Templates are literal SQL interleaved with `{{ ... }}` actions that read
//! from the feature being inserted:
//!
//! - `.Geometry` and `.SRID` address the feature's geometry and reference id.
//! - `.Tags.<key>` reads a tag; further `.<key>` segments descend into
//!   object values. A missing tag renders `<no value>`; reading a key
//!   through a missing or null value fails the render.
//! - `AsText` and `AsBinary` encode a geometry as WKT or hex WKB.
//! - `Quote` renders a value as a single-quoted SQL literal, doubling
//!   embedded quotes, and renders missing or null values as `NULL`.
//!
//! Stages of a pipeline are separated by `|`, with the value of one stage
//! passed as the argument of the next. `{{-` and `-}}` trim whitespace
//! around an action. `{{/* ... */}}` is a comment; the comment markers must
//! sit directly against the delimiters, or against a `{{- ` / ` -}}` trim
//! marker.
//!
//! Rendered values are spliced into the statement text verbatim. Tag values
//! are client supplied, so any template interpolating a tag without `Quote`
//! is open to SQL injection.

mod parse;
mod render;
mod wkb;
mod wkt;

use std::str::FromStr;

use geosink_core::Feature;

pub use self::parse::CompileError;
pub use self::render::RenderError;
use self::parse::Node;

/// A compiled statement template.
///
/// # Examples
///
/// ```
/// use geo::{Geometry, Point};
/// use geosink_core::Feature;
/// use geosink_postgis::Template;
///
/// let template = Template::compile(
///     "INSERT INTO wells (geom, name) VALUES \
///      (ST_GeomFromText('{{ AsText .Geometry }}', {{ .SRID }}), {{ .Tags.name | Quote }})",
/// )
/// .unwrap();
/// let feature = Feature::new(Geometry::Point(Point::new(1.0, 1.0)), 4326)
///     .with_tag("name", "St Anne's");
/// assert_eq!(
///     template.render(&feature).unwrap(),
///     "INSERT INTO wells (geom, name) VALUES \
///      (ST_GeomFromText('POINT (1 1)', 4326), 'St Anne''s')",
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Compile `source`, rejecting malformed syntax, unknown functions and
    /// fields that do not exist on a feature.
    pub fn compile(source: &str) -> Result<Self, CompileError> {
        Ok(Self {
            source: source.to_owned(),
            nodes: parse::parse(source)?,
        })
    }

    /// Render the statement for `feature`.
    pub fn render(&self, feature: &Feature) -> Result<String, RenderError> {
        render::render(&self.nodes, feature)
    }

    /// Template text as configured.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl FromStr for Template {
    type Err = CompileError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Self::compile(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, Point};
    use rstest::rstest;

    fn point(x: f64, y: f64) -> Feature {
        Feature::new(Geometry::Point(Point::new(x, y)), 3857)
    }

    #[rstest]
    #[case("{{ AsText .Geometry }}", point(1.0, 1.0), "POINT (1 1)")]
    #[case(
        "{{ AsBinary .Geometry }}",
        point(2.0, 4.0),
        "010100000000000000000000400000000000001040"
    )]
    #[case(
        "{{ .Tags.some_tag }}",
        point(0.0, 0.0).with_tag("some_tag", "some_value"),
        "some_value"
    )]
    fn renders_reference_templates(
        #[case] source: &str,
        #[case] feature: Feature,
        #[case] expected: &str,
    ) {
        let template = Template::compile(source).expect("template compiles");
        assert_eq!(template.render(&feature).expect("template renders"), expected);
    }

    #[rstest]
    fn rendering_is_deterministic() {
        let template: Template = "{{ AsBinary .Geometry }}:{{ .SRID }}"
            .parse()
            .expect("template compiles");
        let feature = point(2.0, 4.0);
        let first = template.render(&feature).expect("first render");
        let second = template.render(&feature).expect("second render");
        assert_eq!(first, second);
        assert_eq!(template.source(), "{{ AsBinary .Geometry }}:{{ .SRID }}");
    }

    #[rstest]
    fn multi_line_statements_keep_their_layout() {
        let template = Template::compile(
            "INSERT INTO roads (geom)\n{{- /* geometry only */}}\nVALUES ({{ AsText .Geometry }});",
        )
        .expect("template compiles");
        assert_eq!(
            template.render(&point(1.0, 2.0)).expect("renders"),
            "INSERT INTO roads (geom)\nVALUES (POINT (1 2));"
        );
    }
}
