//! Registry mapping backend-type names to consumer factories.
//!
//! The registry is an explicit value rather than process-wide state: build
//! it during startup, register every backend before the first
//! [`ConsumerRegistry::resolve`], pass it through the startup path, and call
//! [`ConsumerRegistry::cleanup`] once at shutdown. Registration takes
//! `&mut self`, so the single-writer-at-init model is enforced by the
//! borrow checker; resolution and cleanup only need shared access.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use thiserror::Error;

use crate::{ConfigDict, Consumer, ConsumerError, ErrorKind};

/// Builds consumers of one backend type and tears them down at shutdown.
///
/// This is the init/cleanup pair a backend registers under its type name.
#[async_trait]
pub trait ConsumerFactory: Send + Sync {
    /// Build a live consumer from a configuration block.
    async fn init(&self, config: &ConfigDict) -> Result<Arc<dyn Consumer>, ConsumerError>;

    /// Release every resource held by consumers this factory built.
    ///
    /// Must be idempotent: a second call after a completed cleanup is a
    /// no-op.
    async fn cleanup(&self);
}

/// Errors raised by [`ConsumerRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A factory is already registered under the name.
    #[error("consumer {0} already exists")]
    AlreadyRegistered(String),
    /// Resolution was attempted before any factory was registered.
    #[error("no consumers registered")]
    NoConsumersRegistered,
    /// No factory is registered under the requested type name.
    #[error(
        "no consumers registered by the name: {name}, known consumers: {}",
        .known.join(", ")
    )]
    UnknownConsumerType {
        /// Requested type name.
        name: String,
        /// Sorted names of every registered type.
        known: Vec<String>,
    },
    /// The factory itself failed; its error is returned unchanged.
    #[error(transparent)]
    Init(#[from] ConsumerError),
}

impl RegistryError {
    /// Classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyRegistered(_) => ErrorKind::RegistrationConflict,
            Self::NoConsumersRegistered | Self::UnknownConsumerType { .. } => {
                ErrorKind::Configuration
            }
            Self::Init(err) => err.kind(),
        }
    }
}

/// Name-keyed table of consumer factories.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use geosink_core::{ConfigDict, ConsumerRegistry, RegistryError};
/// use geosink_core::test_support::StaticFactory;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), RegistryError> {
/// let mut registry = ConsumerRegistry::new();
/// registry.register("memory", Arc::new(StaticFactory::default()))?;
///
/// let err = registry
///     .resolve("postgis", &ConfigDict::new())
///     .await
///     .err()
///     .unwrap();
/// assert_eq!(
///     err.to_string(),
///     "no consumers registered by the name: postgis, known consumers: memory"
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ConsumerRegistry {
    factories: BTreeMap<String, Arc<dyn ConsumerFactory>>,
}

impl fmt::Debug for ConsumerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerRegistry")
            .field("types", &self.known_type_names())
            .finish()
    }
}

impl ConsumerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`.
    ///
    /// Fails without modifying the registry when `name` is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: Arc<dyn ConsumerFactory>,
    ) -> Result<(), RegistryError> {
        let type_name = name.into();
        if self.factories.contains_key(&type_name) {
            return Err(RegistryError::AlreadyRegistered(type_name));
        }
        debug!("registered consumer type {type_name}");
        self.factories.insert(type_name, factory);
        Ok(())
    }

    /// Build a consumer of type `type_name` from `config`.
    pub async fn resolve(
        &self,
        type_name: &str,
        config: &ConfigDict,
    ) -> Result<Arc<dyn Consumer>, RegistryError> {
        if self.factories.is_empty() {
            return Err(RegistryError::NoConsumersRegistered);
        }
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| RegistryError::UnknownConsumerType {
                name: type_name.to_owned(),
                known: self.known_type_names(),
            })?;
        Ok(factory.init(config).await?)
    }

    /// Names of every registered type. Callers must not rely on the order.
    #[must_use]
    pub fn known_type_names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no type is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Run every factory's cleanup hook, releasing all live consumers.
    pub async fn cleanup(&self) {
        for (name, factory) in &self.factories {
            debug!("cleaning up consumer type {name}");
            factory.cleanup().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StaticFactory;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn factory() -> Arc<StaticFactory> {
        Arc::new(StaticFactory::default())
    }

    #[rstest]
    fn duplicate_registration_leaves_registry_untouched(factory: Arc<StaticFactory>) {
        let mut registry = ConsumerRegistry::new();
        registry
            .register("memory", factory.clone())
            .expect("first registration succeeds");
        let err = registry
            .register("memory", Arc::new(StaticFactory::default()))
            .expect_err("duplicate must fail");
        assert!(matches!(err, RegistryError::AlreadyRegistered(ref name) if name == "memory"));
        assert_eq!(err.kind(), ErrorKind::RegistrationConflict);
        assert_eq!(registry.len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn empty_registry_rejects_resolution() {
        let registry = ConsumerRegistry::new();
        let err = registry
            .resolve("memory", &ConfigDict::new())
            .await
            .err()
            .expect("empty registry must fail");
        assert!(matches!(err, RegistryError::NoConsumersRegistered));
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_type_lists_sorted_known_names() {
        let mut registry = ConsumerRegistry::new();
        registry
            .register("zeta", Arc::new(StaticFactory::default()))
            .expect("register zeta");
        registry
            .register("alpha", Arc::new(StaticFactory::default()))
            .expect("register alpha");
        let err = registry
            .resolve("postgis", &ConfigDict::new())
            .await
            .err()
            .expect("unknown type must fail");
        match err {
            RegistryError::UnknownConsumerType { name, known } => {
                assert_eq!(name, "postgis");
                assert_eq!(known, ["alpha", "zeta"]);
            }
            other => panic!("expected UnknownConsumerType, found {other:?}"),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn factory_errors_pass_through_unchanged(factory: Arc<StaticFactory>) {
        let mut registry = ConsumerRegistry::new();
        registry
            .register("memory", factory.clone())
            .expect("register memory");
        let config = ConfigDict::try_from(json!({ "layers": [{ "name": "roads" }] }))
            .expect("config literal");
        let err = registry
            .resolve("memory", &config)
            .await
            .err()
            .expect("missing geom_type must fail");
        assert!(matches!(err, RegistryError::Init(ConsumerError::Backend { .. })));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(factory.init_calls(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn cleanup_reaches_every_factory(factory: Arc<StaticFactory>) {
        let other = Arc::new(StaticFactory::default());
        let mut registry = ConsumerRegistry::new();
        registry
            .register("memory", factory.clone())
            .expect("register memory");
        registry
            .register("other", other.clone())
            .expect("register other");
        registry.cleanup().await;
        assert_eq!(factory.cleanup_calls(), 1);
        assert_eq!(other.cleanup_calls(), 1);
    }
}
