//! Core write-path types for geosink.
//!
//! A consumer is a pluggable storage backend that accepts geometry
//! features tagged with key/value attributes and persists them into named
//! layers. This crate defines the consumer contract, the registry backends
//! register with, configuration-driven resolution of consumer instances and
//! an ingestion front end that routes GeoJSON features to them.
//!
//! Backends live in their own crates and plug in through
//! [`ConsumerFactory`].

#![forbid(unsafe_code)]

mod config;
mod consumer;
mod context;
mod feature;
mod geometry;
pub mod ingest;
mod registry;
mod resolve;

#[doc(hidden)]
pub mod test_support;

pub use config::{ConfigDict, ConfigError};
pub use consumer::{BoxError, Consumer, ConsumerError, ErrorKind, LayerInfo};
pub use context::{ExecutionContext, Interrupted};
pub use feature::{Feature, Tags};
pub use geometry::{GeometryKind, InvalidGeometryType, geometry_name};
pub use registry::{ConsumerFactory, ConsumerRegistry, RegistryError};
pub use resolve::{ConsumerMap, PartialResolution, ResolveError, resolve_consumers};
