//! Minimal GeoJSON feature decoding.

use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while decoding a GeoJSON feature body.
#[derive(Debug, Error)]
pub enum GeoJsonError {
    /// The body was not a GeoJSON feature object.
    #[error("could not unmarshal geojson: {0}")]
    Json(#[from] serde_json::Error),
    /// The feature had no geometry.
    #[error("feature has no geometry")]
    MissingGeometry,
    /// A position had fewer than two ordinates.
    #[error("position must have at least two ordinates, found {0}")]
    ShortPosition(usize),
}

#[derive(Debug, Deserialize)]
enum FeatureTag {
    Feature,
}

#[derive(Debug, Deserialize)]
pub(super) struct GeoJsonFeature {
    #[serde(rename = "type")]
    _tag: FeatureTag,
    geometry: Option<GeoJsonGeometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct Position(Vec<f64>);

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeoJsonGeometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<GeoJsonGeometry> },
}

impl GeoJsonFeature {
    pub(super) fn parse(body: &[u8]) -> Result<Self, GeoJsonError> {
        Ok(serde_json::from_slice(body)?)
    }

    pub(super) fn into_parts(self) -> Result<(Geometry<f64>, Map<String, Value>), GeoJsonError> {
        let geometry = self.geometry.ok_or(GeoJsonError::MissingGeometry)?.into_geo()?;
        Ok((geometry, self.properties.unwrap_or_default()))
    }
}

impl Position {
    fn coord(&self) -> Result<Coord<f64>, GeoJsonError> {
        match self.0.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            short => Err(GeoJsonError::ShortPosition(short.len())),
        }
    }
}

fn line(positions: &[Position]) -> Result<LineString<f64>, GeoJsonError> {
    positions
        .iter()
        .map(Position::coord)
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

fn polygon(rings: &[Vec<Position>]) -> Result<Polygon<f64>, GeoJsonError> {
    let mut lines = rings.iter().map(|ring| line(ring));
    let exterior = lines.next().transpose()?.unwrap_or_else(|| LineString::new(Vec::new()));
    let interiors = lines.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

impl GeoJsonGeometry {
    fn into_geo(self) -> Result<Geometry<f64>, GeoJsonError> {
        Ok(match self {
            Self::Point { coordinates } => Geometry::Point(Point::from(coordinates.coord()?)),
            Self::MultiPoint { coordinates } => Geometry::MultiPoint(MultiPoint::new(
                coordinates
                    .iter()
                    .map(|position| position.coord().map(Point::from))
                    .collect::<Result<_, _>>()?,
            )),
            Self::LineString { coordinates } => Geometry::LineString(line(&coordinates)?),
            Self::MultiLineString { coordinates } => Geometry::MultiLineString(
                MultiLineString::new(
                    coordinates
                        .iter()
                        .map(|positions| line(positions))
                        .collect::<Result<_, _>>()?,
                ),
            ),
            Self::Polygon { coordinates } => Geometry::Polygon(polygon(&coordinates)?),
            Self::MultiPolygon { coordinates } => Geometry::MultiPolygon(MultiPolygon::new(
                coordinates
                    .iter()
                    .map(|rings| polygon(rings))
                    .collect::<Result<_, _>>()?,
            )),
            Self::GeometryCollection { geometries } => {
                Geometry::GeometryCollection(GeometryCollection::new_from(
                    geometries
                        .into_iter()
                        .map(Self::into_geo)
                        .collect::<Result<_, _>>()?,
                ))
            }
        })
    }
}
