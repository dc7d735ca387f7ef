//! Loading and resolving the consumer configuration file.

use camino::Utf8Path;
use geosink_core::{ConfigDict, ConsumerMap, ConsumerRegistry, resolve_consumers};
use log::{info, warn};
use serde::Deserialize;

use crate::CliError;

/// Top-level layout of a consumer configuration file.
#[derive(Debug, Default, Deserialize)]
struct ConsumersFile {
    #[serde(default)]
    consumers: Vec<ConfigDict>,
}

/// Fail unless `path` is an existing regular file.
pub(crate) fn require_file(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match geosink_fs::is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::MissingSourceFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Read the UTF-8 file at `path`.
pub(crate) fn read_file(path: &Utf8Path) -> Result<String, CliError> {
    geosink_fs::read_to_string(path).map_err(|source| CliError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the consumer blocks listed under `consumers` in `path`.
pub(crate) fn load_consumer_blocks(path: &Utf8Path) -> Result<Vec<ConfigDict>, CliError> {
    let text = read_file(path)?;
    let file: ConsumersFile =
        serde_json::from_str(&text).map_err(|source| CliError::ParseConsumers {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(file.consumers)
}

/// Resolve every consumer configured in `path`.
///
/// Consumers built before a failure are dropped here; the registry's
/// cleanup releases their resources.
pub(crate) async fn resolve_file(
    registry: &ConsumerRegistry,
    path: &Utf8Path,
) -> Result<ConsumerMap, CliError> {
    let blocks = load_consumer_blocks(path)?;
    match resolve_consumers(registry, &blocks).await {
        Ok(consumers) => {
            info!("resolved {} consumers from {path}", consumers.len());
            Ok(consumers)
        }
        Err(failure) => {
            warn!(
                "resolution stopped after {} consumers: {}",
                failure.resolved.len(),
                failure.error
            );
            Err(failure.error.into())
        }
    }
}
