//! Turn an ordered list of configuration blocks into live consumers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::info;
use thiserror::Error;

use crate::{ConfigDict, ConfigError, Consumer, ConsumerRegistry, ErrorKind, RegistryError};

/// Live consumers keyed by their operator-chosen name.
pub type ConsumerMap = BTreeMap<String, Arc<dyn Consumer>>;

const KEY_NAME: &str = "name";
const KEY_TYPE: &str = "type";

/// Errors raised while resolving configuration blocks.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A block had no `name`.
    #[error("register: consumer 'name' parameter missing")]
    NameMissing,
    /// A block's `name` was not a string.
    #[error("register: consumer 'name' value must be a string")]
    NameInvalid,
    /// Two blocks shared a `name`.
    #[error("register: consumer ({0}) already registered")]
    AlreadyRegistered(String),
    /// The named block had no `type`.
    #[error("register: consumer 'type' parameter missing for consumer ({0})")]
    TypeMissing(String),
    /// The named block's `type` was not a string.
    #[error("register: consumer 'type' must be a string for consumer ({0})")]
    TypeInvalid(String),
    /// The registry could not build the named consumer.
    #[error("register: consumer ({name}) failed: {source}")]
    Registry {
        /// Consumer being built.
        name: String,
        /// Registry or factory failure.
        #[source]
        source: RegistryError,
    },
}

impl ResolveError {
    /// Classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyRegistered(_) => ErrorKind::RegistrationConflict,
            Self::Registry { source, .. } => source.kind(),
            Self::NameMissing | Self::NameInvalid | Self::TypeMissing(_) | Self::TypeInvalid(_) => {
                ErrorKind::Configuration
            }
        }
    }
}

/// A failed resolution together with the consumers built before the failure.
///
/// The caller owns the partial map and is responsible for cleaning it up.
#[derive(Error)]
#[error("{error}")]
pub struct PartialResolution {
    /// Consumers built before the failing block.
    pub resolved: ConsumerMap,
    /// The first failure.
    pub error: ResolveError,
}

impl fmt::Debug for PartialResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialResolution")
            .field("resolved", &self.resolved.keys().collect::<Vec<_>>())
            .field("error", &self.error)
            .finish()
    }
}

/// Resolve every block in order, stopping at the first failure.
///
/// Each block needs a string `name`, unique across the list, and a string
/// `type` naming a registered factory. Both keys are validated before the
/// factory runs.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use geosink_core::{ConfigDict, ConsumerRegistry, ResolveError, resolve_consumers};
/// use geosink_core::test_support::StaticFactory;
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut registry = ConsumerRegistry::new();
/// registry.register("memory", Arc::new(StaticFactory::default())).unwrap();
///
/// let block = ConfigDict::try_from(json!({ "name": "edits", "type": "memory", "layers": [] })).unwrap();
/// let failure = resolve_consumers(&registry, &[block.clone(), block])
///     .await
///     .err()
///     .unwrap();
/// assert!(matches!(failure.error, ResolveError::AlreadyRegistered(ref name) if name == "edits"));
/// assert_eq!(failure.resolved.len(), 1);
/// # }
/// ```
pub async fn resolve_consumers(
    registry: &ConsumerRegistry,
    blocks: &[ConfigDict],
) -> Result<ConsumerMap, PartialResolution> {
    let mut resolved = ConsumerMap::new();
    for block in blocks {
        match resolve_block(registry, block, &resolved).await {
            Ok((name, consumer)) => {
                info!("registered consumer {name}");
                resolved.insert(name, consumer);
            }
            Err(error) => return Err(PartialResolution { resolved, error }),
        }
    }
    Ok(resolved)
}

async fn resolve_block(
    registry: &ConsumerRegistry,
    block: &ConfigDict,
    resolved: &ConsumerMap,
) -> Result<(String, Arc<dyn Consumer>), ResolveError> {
    let name = block.string(KEY_NAME).map_err(|err| match err {
        ConfigError::KeyMissing { .. } => ResolveError::NameMissing,
        ConfigError::KeyType { .. } => ResolveError::NameInvalid,
    })?;
    if resolved.contains_key(name) {
        return Err(ResolveError::AlreadyRegistered(name.to_owned()));
    }
    let type_name = block.string(KEY_TYPE).map_err(|err| match err {
        ConfigError::KeyMissing { .. } => ResolveError::TypeMissing(name.to_owned()),
        ConfigError::KeyType { .. } => ResolveError::TypeInvalid(name.to_owned()),
    })?;
    let consumer = registry
        .resolve(type_name, block)
        .await
        .map_err(|source| ResolveError::Registry {
            name: name.to_owned(),
            source,
        })?;
    Ok((name.to_owned(), consumer))
}
