//! The consumer contract every storage backend satisfies.

use std::error::Error as StdError;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::{ExecutionContext, Feature, GeometryKind, Interrupted};

/// Boxed error used where a backend surfaces its own failure type.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Read-only projection of a configured layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerInfo {
    /// Layer name, unique within its consumer.
    pub name: String,
    /// Geometry shape every feature in the layer must have.
    #[serde(rename = "geom_type")]
    pub kind: GeometryKind,
    /// Coordinate reference id of the layer.
    pub srid: u64,
}

/// Failure classification used to decide how an error is surfaced.
///
/// Startup kinds (`Configuration`, `RegistrationConflict`, `TemplateCompile`,
/// `Connection`) halt the affected consumer. Per-request kinds reject only
/// the request that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid configuration.
    Configuration,
    /// Duplicate consumer or backend-type name.
    RegistrationConflict,
    /// A layer template failed to compile.
    TemplateCompile,
    /// The backend could not open its connection pool.
    Connection,
    /// A feature did not match its layer's declared shape.
    GeometryTypeMismatch,
    /// The requested layer is not configured.
    LayerNotFound,
    /// Rendering or executing a statement failed.
    StatementExecution,
    /// The caller cancelled or the deadline passed.
    Cancelled,
}

impl ErrorKind {
    /// Whether this kind is raised while a consumer is being built.
    #[must_use]
    pub const fn is_startup(self) -> bool {
        matches!(
            self,
            Self::Configuration | Self::RegistrationConflict | Self::TemplateCompile | Self::Connection
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::RegistrationConflict => "registration conflict",
            Self::TemplateCompile => "template compile",
            Self::Connection => "connection",
            Self::GeometryTypeMismatch => "geometry type mismatch",
            Self::LayerNotFound => "layer not found",
            Self::StatementExecution => "statement execution",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Errors produced by consumers, both while being built and while inserting.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The named layer is not configured on this consumer.
    #[error("layer {0:?} does not exist")]
    LayerNotFound(String),
    /// A feature's geometry differs from the layer's declared shape.
    #[error("layer {layer} only accepts {expected}, got {got}")]
    GeometryTypeMismatch {
        /// Target layer.
        layer: String,
        /// Shape declared by the layer.
        expected: GeometryKind,
        /// Shape carried by the rejected feature.
        got: &'static str,
    },
    /// The caller cancelled the insertion.
    #[error("insertion into layer {layer} was cancelled")]
    Cancelled {
        /// Target layer.
        layer: String,
    },
    /// The insertion did not finish before the context deadline.
    #[error("insertion into layer {layer} exceeded its deadline")]
    DeadlineExceeded {
        /// Target layer.
        layer: String,
    },
    /// Rendering or executing a statement failed.
    #[error("failed to write feature to layer {layer}: {source}")]
    Statement {
        /// Target layer.
        layer: String,
        /// Underlying render, encoding or database failure.
        #[source]
        source: BoxError,
    },
    /// A backend-specific failure, typically raised while building a consumer.
    #[error("{kind} error: {source}")]
    Backend {
        /// Classification of the failure.
        kind: ErrorKind,
        /// Backend error.
        #[source]
        source: BoxError,
    },
}

impl ConsumerError {
    /// Wrap a backend error with its classification.
    pub fn backend<E>(kind: ErrorKind, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Backend {
            kind,
            source: Box::new(source),
        }
    }

    /// Wrap a statement failure for `layer`.
    pub fn statement<E>(layer: &str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Statement {
            layer: layer.to_owned(),
            source: source.into(),
        }
    }

    /// Convert an interruption observed while writing to `layer`.
    #[must_use]
    pub fn interrupted(layer: &str, reason: Interrupted) -> Self {
        match reason {
            Interrupted::Cancelled => Self::Cancelled {
                layer: layer.to_owned(),
            },
            Interrupted::DeadlineExceeded => Self::DeadlineExceeded {
                layer: layer.to_owned(),
            },
        }
    }

    /// Classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::LayerNotFound(_) => ErrorKind::LayerNotFound,
            Self::GeometryTypeMismatch { .. } => ErrorKind::GeometryTypeMismatch,
            Self::Cancelled { .. } | Self::DeadlineExceeded { .. } => ErrorKind::Cancelled,
            Self::Statement { .. } => ErrorKind::StatementExecution,
            Self::Backend { kind, .. } => *kind,
        }
    }
}

/// A pluggable backend that accepts feature writes and reports its layers.
///
/// Implementations must be safe to call concurrently from many request
/// workers. Layer definitions are fixed at construction, so only the
/// backend's own connection handling needs synchronisation.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use geosink_core::{Consumer, ConsumerError, ExecutionContext, Feature, LayerInfo};
///
/// struct Discard;
///
/// #[async_trait]
/// impl Consumer for Discard {
///     async fn insert_features(
///         &self,
///         ctx: &ExecutionContext,
///         layer: &str,
///         _features: &[Feature],
///     ) -> Result<(), ConsumerError> {
///         ctx.check()
///             .map_err(|reason| ConsumerError::interrupted(layer, reason))
///     }
///
///     fn layers(&self) -> Result<Vec<LayerInfo>, ConsumerError> {
///         Ok(Vec::new())
///     }
/// }
/// ```
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Insert `features` into `layer` in the order supplied.
    ///
    /// Processing halts at the first failure. Features written before the
    /// failure stay written; there is no enclosing transaction.
    async fn insert_features(
        &self,
        ctx: &ExecutionContext,
        layer: &str,
        features: &[Feature],
    ) -> Result<(), ConsumerError>;

    /// Snapshot of the configured layers in unspecified order.
    fn layers(&self) -> Result<Vec<LayerInfo>, ConsumerError>;
}
