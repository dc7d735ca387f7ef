//! Evaluation of parsed templates against a feature.

use geo::Geometry;
use geosink_core::{Feature, Tags};
use serde_json::Value as Json;
use thiserror::Error;

use super::parse::{Command, Field, Function, Node, Operand};
use super::wkb::to_wkb;
use super::wkt::to_wkt;

const NO_VALUE: &str = "<no value>";
const NIL: &str = "<nil>";

/// Errors raised while rendering a compiled template.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A geometry function received something other than a geometry.
    #[error("error calling {function}: expected a geometry, got {got}")]
    ExpectedGeometry {
        /// Called function.
        function: &'static str,
        /// Kind of value received.
        got: &'static str,
    },
    /// A tag chain tried to read a key from a value that is not an object.
    #[error("can't evaluate field {field} in type {got}")]
    FieldOnScalar {
        /// Requested key.
        field: String,
        /// Kind of value holding no keys.
        got: &'static str,
    },
    /// A tag chain tried to read a key through a missing or null value.
    #[error("nil pointer evaluating interface {{}}.{field}")]
    FieldOnNil {
        /// Requested key.
        field: String,
    },
    /// Binary encoding failed.
    #[error("error calling AsBinary: {0}")]
    Wkb(#[from] ::wkb::error::WkbError),
    /// A tag value could not be serialised.
    #[error("could not render tag value: {0}")]
    Json(#[from] serde_json::Error),
}

/// Intermediate value flowing through a pipeline.
enum Value<'a> {
    Geometry(&'a Geometry<f64>),
    Srid(u64),
    Tags(&'a Tags),
    Json(&'a Json),
    Text(String),
    Missing,
}

impl Value<'_> {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Geometry(_) => "geometry",
            Self::Srid(_) => "integer",
            Self::Tags(_) => "tags",
            Self::Json(json) => json_kind(json),
            Self::Text(_) => "string",
            Self::Missing => "no value",
        }
    }
}

const fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "nil",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Render `nodes` against `feature`.
pub(super) fn render(nodes: &[Node], feature: &Feature) -> Result<String, RenderError> {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Action(commands) => {
                let value = pipeline(commands, feature)?;
                out.push_str(&text_of(&value)?);
            }
        }
    }
    Ok(out)
}

fn pipeline<'a>(commands: &'a [Command], feature: &'a Feature) -> Result<Value<'a>, RenderError> {
    let mut piped: Option<Value<'a>> = None;
    for command in commands {
        let value = match command {
            Command::Operand(operand) => evaluate(operand, feature)?,
            Command::Call { function, args } => {
                let argument = match (args.first(), piped.take()) {
                    (Some(operand), _) => evaluate(operand, feature)?,
                    (None, Some(value)) => value,
                    (None, None) => Value::Missing,
                };
                call(*function, &argument)?
            }
        };
        piped = Some(value);
    }
    Ok(piped.unwrap_or(Value::Missing))
}

fn evaluate<'a>(operand: &'a Operand, feature: &'a Feature) -> Result<Value<'a>, RenderError> {
    match operand {
        Operand::Literal(text) => Ok(Value::Text(text.clone())),
        Operand::Field(Field::Geometry) => Ok(Value::Geometry(&feature.geometry)),
        Operand::Field(Field::Srid) => Ok(Value::Srid(feature.srid)),
        Operand::Field(Field::Tags(path)) => tag(&feature.tags, path),
    }
}

fn tag<'a>(tags: &'a Tags, path: &[String]) -> Result<Value<'a>, RenderError> {
    let mut keys = path.iter();
    let Some(first) = keys.next() else {
        return Ok(Value::Tags(tags));
    };
    let mut current = tags.get(first);
    for key in keys {
        current = match current {
            None | Some(Json::Null) => {
                return Err(RenderError::FieldOnNil { field: key.clone() });
            }
            Some(Json::Object(map)) => map.get(key),
            Some(other) => {
                return Err(RenderError::FieldOnScalar {
                    field: key.clone(),
                    got: json_kind(other),
                });
            }
        };
    }
    Ok(current.map_or(Value::Missing, Value::Json))
}

fn call(function: Function, argument: &Value<'_>) -> Result<Value<'static>, RenderError> {
    let text = match function {
        Function::AsText => to_wkt(geometry_of(function, argument)?),
        Function::AsBinary => hex::encode(to_wkb(geometry_of(function, argument)?)?),
        Function::Quote => quote(argument)?,
    };
    Ok(Value::Text(text))
}

fn geometry_of<'a>(
    function: Function,
    argument: &Value<'a>,
) -> Result<&'a Geometry<f64>, RenderError> {
    match argument {
        Value::Geometry(geometry) => Ok(*geometry),
        other => Err(RenderError::ExpectedGeometry {
            function: function.name(),
            got: other.kind(),
        }),
    }
}

/// Render `value` as a single-quoted SQL literal, or `NULL` when absent.
fn quote(value: &Value<'_>) -> Result<String, RenderError> {
    if matches!(value, Value::Missing | Value::Json(Json::Null)) {
        return Ok("NULL".to_owned());
    }
    let text = text_of(value)?;
    Ok(format!("'{}'", text.replace('\'', "''")))
}

fn text_of(value: &Value<'_>) -> Result<String, RenderError> {
    Ok(match value {
        Value::Geometry(geometry) => to_wkt(geometry),
        Value::Srid(srid) => srid.to_string(),
        Value::Tags(tags) => serde_json::to_string(tags)?,
        Value::Json(json) => json_text(json)?,
        Value::Text(text) => text.clone(),
        Value::Missing => NO_VALUE.to_owned(),
    })
}

fn json_text(json: &Json) -> Result<String, RenderError> {
    Ok(match json {
        Json::Null => NIL.to_owned(),
        Json::Bool(flag) => flag.to_string(),
        Json::String(text) => text.clone(),
        Json::Number(number) => match number.as_f64().filter(|_| number.is_f64()) {
            Some(float) => float.to_string(),
            None => number.to_string(),
        },
        Json::Array(_) | Json::Object(_) => serde_json::to_string(json)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parse::parse;
    use geo::Point;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn feature() -> Feature {
        Feature::new(Geometry::Point(Point::new(1.0, 1.0)), 4326)
            .with_tag("name", "O'Brien's")
            .with_tag("lanes", 2)
            .with_tag("width", 3.5)
            .with_tag("whole", 5.0)
            .with_tag("lit", true)
            .with_tag("note", Json::Null)
            .with_tag("refs", json!(["a", 1]))
            .with_tag("addr", json!({ "street": "High Street", "number": 7 }))
    }

    fn rendered(source: &str, feature: &Feature) -> Result<String, RenderError> {
        render(&parse(source).expect("template parses"), feature)
    }

    #[rstest]
    #[case("{{ .Tags.name }}", "O'Brien's")]
    #[case("{{ .Tags.lanes }}", "2")]
    #[case("{{ .Tags.width }}", "3.5")]
    #[case("{{ .Tags.whole }}", "5")]
    #[case("{{ .Tags.lit }}", "true")]
    #[case("{{ .Tags.note }}", "<nil>")]
    #[case("{{ .Tags.missing }}", "<no value>")]
    #[case("{{ .Tags.addr.missing }}", "<no value>")]
    #[case("{{ .Tags.refs }}", r#"["a",1]"#)]
    #[case("{{ .Tags.addr.street }}", "High Street")]
    #[case("{{ .SRID }}", "4326")]
    #[case("{{ .Geometry }}", "POINT (1 1)")]
    fn renders_values(feature: Feature, #[case] source: &str, #[case] expected: &str) {
        assert_eq!(rendered(source, &feature).expect("renders"), expected);
    }

    #[rstest]
    #[case("{{ Quote .Tags.name }}", "'O''Brien''s'")]
    #[case("{{ .Tags.lanes | Quote }}", "'2'")]
    #[case("{{ .Tags.missing | Quote }}", "NULL")]
    #[case("{{ .Tags.note | Quote }}", "NULL")]
    #[case(r#"{{ Quote "it's" }}"#, "'it''s'")]
    #[case("{{ .Geometry | AsText | Quote }}", "'POINT (1 1)'")]
    fn quote_escapes_single_quotes(feature: Feature, #[case] source: &str, #[case] expected: &str) {
        assert_eq!(rendered(source, &feature).expect("renders"), expected);
    }

    #[rstest]
    fn geometry_functions_reject_other_values(feature: Feature) {
        let err = rendered("{{ AsText .SRID }}", &feature).expect_err("SRID is not a geometry");
        assert!(matches!(
            err,
            RenderError::ExpectedGeometry {
                function: "AsText",
                got: "integer"
            }
        ));
    }

    #[rstest]
    fn fields_of_scalars_fail(feature: Feature) {
        let err = rendered("{{ .Tags.name.first }}", &feature).expect_err("name is a string");
        assert!(matches!(err, RenderError::FieldOnScalar { ref field, got: "string" } if field == "first"));
    }

    #[rstest]
    #[case("{{ .Tags.missing.deeper }}")]
    #[case("{{ .Tags.note.deeper }}")]
    #[case("{{ .Tags.missing.deeper | Quote }}")]
    fn fields_of_absent_values_fail(feature: Feature, #[case] source: &str) {
        let err = rendered(source, &feature).expect_err("nothing to descend into");
        assert!(matches!(err, RenderError::FieldOnNil { ref field } if field == "deeper"));
        assert_eq!(err.to_string(), "nil pointer evaluating interface {}.deeper");
    }
}
