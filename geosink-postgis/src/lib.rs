//! PostGIS backend for geosink.
//!
//! Each consumer owns a pooled connection to one database and a set of
//! layers. A layer pairs a geometry shape with a statement template; every
//! inserted feature is checked against the shape, rendered through the
//! template and executed as a single statement.
//!
//! Register the backend with [`register`] and resolve consumers through the
//! registry using the type name [`CONSUMER_TYPE`].

#![forbid(unsafe_code)]

mod config;
mod consumer;
mod error;
mod executor;
mod factory;
mod layer;
pub mod template;

#[doc(hidden)]
pub mod test_support;

use std::sync::Arc;

use geosink_core::{ConsumerRegistry, RegistryError};

pub use config::{
    APPLICATION_NAME, ConnectionParams, DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT, DEFAULT_SRID, keys,
};
pub use consumer::PostgisConsumer;
pub use error::PostgisError;
pub use executor::{Connector, PgConnector, PgExecutor, StatementExecutor};
pub use factory::PostgisFactory;
pub use layer::{LayerDefinition, compile_layers};
pub use template::{CompileError, RenderError, Template};

/// Type name the backend registers under.
pub const CONSUMER_TYPE: &str = "postgis";

/// Register a [`PostgisFactory`] under [`CONSUMER_TYPE`].
///
/// The returned handle shares the registered factory, so callers can inspect
/// its live consumers.
///
/// # Examples
///
/// ```
/// use geosink_core::ConsumerRegistry;
///
/// let mut registry = ConsumerRegistry::new();
/// geosink_postgis::register(&mut registry).unwrap();
/// assert!(geosink_postgis::register(&mut registry).is_err());
/// assert_eq!(registry.known_type_names(), ["postgis"]);
/// ```
pub fn register(registry: &mut ConsumerRegistry) -> Result<Arc<PostgisFactory>, RegistryError> {
    let factory = Arc::new(PostgisFactory::new());
    registry.register(CONSUMER_TYPE, factory.clone())?;
    Ok(factory)
}
