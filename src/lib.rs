//! Facade crate for the geosink write path.
//!
//! This crate re-exports the consumer contract and registry from
//! `geosink-core` and exposes the PostGIS backend behind the `postgis`
//! feature flag.

#![forbid(unsafe_code)]

pub use geosink_core::ingest;
pub use geosink_core::{
    ConfigDict, ConfigError, Consumer, ConsumerError, ConsumerFactory, ConsumerMap,
    ConsumerRegistry, ErrorKind, ExecutionContext, Feature, GeometryKind, LayerInfo,
    RegistryError, ResolveError, Tags, resolve_consumers,
};

#[cfg(feature = "postgis")]
pub use geosink_postgis::{PostgisConsumer, PostgisError, PostgisFactory, Template};

/// Build a registry with every backend compiled into this crate.
#[cfg(feature = "postgis")]
pub fn default_registry() -> Result<ConsumerRegistry, RegistryError> {
    let mut registry = ConsumerRegistry::new();
    geosink_postgis::register(&mut registry)?;
    Ok(registry)
}
