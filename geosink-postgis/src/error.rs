//! Errors raised while building a PostGIS consumer.

use geosink_core::{BoxError, ConfigError, ConsumerError, ErrorKind, InvalidGeometryType};
use thiserror::Error;

use crate::template::CompileError;

/// Errors raised while building a [`PostgisConsumer`](crate::PostgisConsumer).
#[derive(Debug, Error)]
pub enum PostgisError {
    /// A configuration key was missing or held the wrong type.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// An integer setting did not fit its target type.
    #[error("config key {key:?} is out of range, got {value}")]
    IntegerOutOfRange {
        /// Configuration key.
        key: &'static str,
        /// Configured value.
        value: u64,
    },
    /// A layer declared a `geom_type` outside the catalogue.
    #[error(transparent)]
    InvalidGeometryType(#[from] InvalidGeometryType),
    /// Two layers of one consumer share a name.
    #[error("layer {0} is declared more than once")]
    DuplicateLayer(String),
    /// A layer's `sql` template failed to compile.
    #[error("template for layer {layer} failed to compile: {source}")]
    TemplateCompile {
        /// Layer whose template failed.
        layer: String,
        /// Compiler diagnostic.
        #[source]
        source: CompileError,
    },
    /// The connection pool could not be opened.
    #[error("failed while creating connection pool: {0}")]
    PoolCreationFailed(#[source] BoxError),
}

impl PostgisError {
    /// Classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_)
            | Self::IntegerOutOfRange { .. }
            | Self::InvalidGeometryType(_)
            | Self::DuplicateLayer(_) => ErrorKind::Configuration,
            Self::TemplateCompile { .. } => ErrorKind::TemplateCompile,
            Self::PoolCreationFailed(_) => ErrorKind::Connection,
        }
    }
}

impl From<PostgisError> for ConsumerError {
    fn from(err: PostgisError) -> Self {
        Self::backend(err.kind(), err)
    }
}
