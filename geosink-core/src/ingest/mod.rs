//! Transport-agnostic ingestion front end.
//!
//! An [`Ingestor`] routes a single GeoJSON feature addressed by a
//! `/{map}/{consumer}/{layer}` path to the matching consumer. An HTTP
//! server maps [`IngestError::status`] onto its response codes and writes
//! [`IngestResponse::EMPTY_BODY`] on success.

mod geojson;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use log::{debug, warn};
use serde_json::{Map, Value};
use thiserror::Error;

pub use self::geojson::GeoJsonError;
use self::geojson::GeoJsonFeature;
use crate::{ConsumerError, ConsumerMap, ErrorKind, ExecutionContext, Feature};

/// Property holding the feature's coordinate reference id.
pub const SRID_PROPERTY: &str = "SRID";

/// Destination of an ingestion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestTarget {
    /// Map grouping the consumers.
    pub map: String,
    /// Consumer within the map.
    pub consumer: String,
    /// Layer within the consumer.
    pub layer: String,
}

impl IngestTarget {
    /// Parse a `/{map}/{consumer}/{layer}` path. The leading slash is
    /// optional; every segment must be non-empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use geosink_core::ingest::IngestTarget;
    ///
    /// let target = IngestTarget::parse("/city/edits/roads").unwrap();
    /// assert_eq!(target.consumer, "edits");
    /// assert!(IngestTarget::parse("/city/edits").is_err());
    /// ```
    pub fn parse(path: &str) -> Result<Self, IngestError> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let segments: Vec<&str> = trimmed.split('/').collect();
        match segments.as_slice() {
            [map, consumer, layer]
                if !map.is_empty() && !consumer.is_empty() && !layer.is_empty() =>
            {
                Ok(Self {
                    map: (*map).to_owned(),
                    consumer: (*consumer).to_owned(),
                    layer: (*layer).to_owned(),
                })
            }
            _ => Err(IngestError::BadPath(path.to_owned())),
        }
    }
}

impl fmt::Display for IngestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}/{}", self.map, self.consumer, self.layer)
    }
}

/// Errors raised while ingesting a feature.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The path did not have exactly three segments.
    #[error("path must be /map_name/consumer_name/layer_name, got {0:?}")]
    BadPath(String),
    /// The body was not a usable GeoJSON feature.
    #[error(transparent)]
    Decode(#[from] GeoJsonError),
    /// No map is configured under the name.
    #[error("map not found: {0}")]
    MapNotFound(String),
    /// The map has no consumer under the name.
    #[error("consumer not found: {consumer} in map {map}")]
    ConsumerNotFound {
        /// Map that was searched.
        map: String,
        /// Requested consumer.
        consumer: String,
    },
    /// The consumer rejected the feature.
    #[error("could not insert feature: {0}")]
    Insert(#[from] ConsumerError),
}

impl IngestError {
    /// HTTP-style status code for this failure.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::BadPath(_) | Self::Decode(_) => 400,
            Self::MapNotFound(_) | Self::ConsumerNotFound { .. } => 404,
            Self::Insert(ConsumerError::DeadlineExceeded { .. }) => 504,
            Self::Insert(ConsumerError::Cancelled { .. }) => 499,
            Self::Insert(err) => match err.kind() {
                ErrorKind::LayerNotFound => 404,
                ErrorKind::GeometryTypeMismatch => 422,
                _ => 500,
            },
        }
    }
}

/// Successful ingestion outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestResponse;

impl IngestResponse {
    /// Body written for every successful ingestion.
    pub const EMPTY_BODY: &'static str = "{}";

    /// Status code for a successful ingestion.
    #[must_use]
    pub const fn status(self) -> u16 {
        200
    }

    /// Response body.
    #[must_use]
    pub const fn body(self) -> &'static str {
        Self::EMPTY_BODY
    }
}

/// Routes decoded features to configured consumers.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use geosink_core::{ConsumerMap, GeometryKind, LayerInfo};
/// use geosink_core::ingest::Ingestor;
/// use geosink_core::test_support::MemoryConsumer;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let consumer = Arc::new(MemoryConsumer::with_layers([LayerInfo {
///     name: "wells".into(),
///     kind: GeometryKind::Point,
///     srid: 4326,
/// }]));
/// let mut consumers = ConsumerMap::new();
/// consumers.insert("edits".into(), consumer.clone());
/// let ingestor = Ingestor::new().with_map("default", consumers);
///
/// let body = br#"{"type":"Feature","geometry":{"type":"Point","coordinates":[1,1]},"properties":{"SRID":4326}}"#;
/// let response = ingestor.ingest("/default/edits/wells", body).await.unwrap();
/// assert_eq!(response.body(), "{}");
/// assert_eq!(consumer.written().len(), 1);
/// # }
/// ```
pub struct Ingestor {
    maps: BTreeMap<String, ConsumerMap>,
    deadline: Duration,
}

impl fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let maps: BTreeMap<&str, Vec<&str>> = self
            .maps
            .iter()
            .map(|(name, consumers)| {
                (
                    name.as_str(),
                    consumers.keys().map(String::as_str).collect(),
                )
            })
            .collect();
        f.debug_struct("Ingestor")
            .field("maps", &maps)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Default for Ingestor {
    fn default() -> Self {
        Self {
            maps: BTreeMap::new(),
            deadline: Self::DEFAULT_DEADLINE,
        }
    }
}

impl Ingestor {
    /// Deadline bound to every insertion unless overridden.
    pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(1);

    /// Create an ingestor with no maps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the per-request deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Add or replace the consumers served under map `name`.
    #[must_use]
    pub fn with_map(mut self, name: impl Into<String>, consumers: ConsumerMap) -> Self {
        self.maps.insert(name.into(), consumers);
        self
    }

    /// Configured per-request deadline.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Ingest one GeoJSON feature under a fresh context bound to the
    /// configured deadline.
    pub async fn ingest(&self, path: &str, body: &[u8]) -> Result<IngestResponse, IngestError> {
        self.ingest_with(&ExecutionContext::new(), path, body).await
    }

    /// Ingest one GeoJSON feature under a child of `parent`, so cancelling
    /// the parent abandons the insertion.
    pub async fn ingest_with(
        &self,
        parent: &ExecutionContext,
        path: &str,
        body: &[u8],
    ) -> Result<IngestResponse, IngestError> {
        let target = IngestTarget::parse(path)?;
        let feature = decode_feature(body)?;
        let consumers = self
            .maps
            .get(&target.map)
            .ok_or_else(|| IngestError::MapNotFound(target.map.clone()))?;
        let consumer =
            consumers
                .get(&target.consumer)
                .ok_or_else(|| IngestError::ConsumerNotFound {
                    map: target.map.clone(),
                    consumer: target.consumer.clone(),
                })?;
        let ctx = parent
            .child()
            .with_deadline(tokio::time::Instant::now() + self.deadline);
        debug!("ingesting feature into {target}");
        consumer
            .insert_features(&ctx, &target.layer, std::slice::from_ref(&feature))
            .await?;
        Ok(IngestResponse)
    }
}

/// Decode a GeoJSON feature body into a [`Feature`].
///
/// Every property becomes a tag. The SRID is read from the `SRID` property
/// and a fractional value is truncated toward zero. When the property is
/// absent or not a non-negative number the feature is built with SRID 0 and
/// a warning is logged.
pub fn decode_feature(body: &[u8]) -> Result<Feature, IngestError> {
    let (geometry, properties) = GeoJsonFeature::parse(body)?.into_parts()?;
    let srid = srid_of(&properties);
    Ok(Feature::new(geometry, srid).with_tags(properties.into_iter().collect()))
}

/// One past the largest value a `u64` holds.
const SRID_LIMIT: f64 = 18_446_744_073_709_551_616.0;

fn srid_of(properties: &Map<String, Value>) -> u64 {
    let value = properties.get(SRID_PROPERTY);
    value
        .and_then(|srid| srid.as_u64().or_else(|| srid.as_f64().and_then(whole_srid)))
        .unwrap_or_else(|| {
            warn!("could not read a numeric SRID from {value:?}, defaulting to 0");
            0
        })
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "the value is range checked before truncation"
)]
fn whole_srid(srid: f64) -> Option<u64> {
    (srid.is_finite() && srid >= 0.0 && srid < SRID_LIMIT).then(|| srid.trunc() as u64)
}
