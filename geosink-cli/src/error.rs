//! Error types emitted by the geosink CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use geosink_core::ingest::IngestError;
use geosink_core::{ConsumerError, RegistryError, ResolveError};
use thiserror::Error;

/// Errors emitted by the geosink CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Option name.
        field: &'static str,
        /// Environment variable that can supply it.
        env: &'static str,
    },
    /// A referenced input path does not exist or is not a file.
    #[error("{field} path {path:?} does not exist or is not a file")]
    MissingSourceFile {
        /// Option naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Option naming the path.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// Reading an input file failed.
    #[error("failed to read {path:?}: {source}")]
    ReadFile {
        /// File being read.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// The consumer configuration file was not valid JSON.
    #[error("failed to parse consumer configuration {path:?}: {source}")]
    ParseConsumers {
        /// Configuration file.
        path: Utf8PathBuf,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// The async runtime could not be started.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// A backend could not be registered.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// A consumer block could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// A consumer could not report its layers.
    #[error("failed to list layers: {0}")]
    Layers(#[from] ConsumerError),
    /// The feature was rejected.
    #[error("ingestion failed with status {status}: {source}")]
    Ingest {
        /// HTTP-style status of the failure.
        status: u16,
        /// Ingestion failure.
        #[source]
        source: IngestError,
    },
    /// Serialising command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}

impl From<IngestError> for CliError {
    fn from(source: IngestError) -> Self {
        Self::Ingest {
            status: source.status(),
            source,
        }
    }
}
