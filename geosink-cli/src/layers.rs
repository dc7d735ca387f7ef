//! Layers command implementation for the geosink CLI.

use std::collections::BTreeMap;
use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use geosink_core::{ConsumerMap, ConsumerRegistry, LayerInfo};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::consumers::{require_file, resolve_file};
use crate::{ARG_CONFIG, CliError, ENV_LAYERS_CONFIG, write_json};

/// CLI arguments for the `layers` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Resolve every consumer in the configuration file and print \
                 each consumer's layers, with their geometry type and SRID, \
                 as JSON.",
    about = "List the layers of every configured consumer"
)]
#[ortho_config(prefix = "GEOSINK")]
pub(crate) struct LayersArgs {
    /// Path to the consumer configuration JSON file.
    #[arg(long = ARG_CONFIG, value_name = "path")]
    #[serde(default)]
    pub(crate) config: Option<Utf8PathBuf>,
}

impl LayersArgs {
    pub(crate) fn into_config(self) -> Result<LayersConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        LayersConfig::try_from(merged)
    }
}

/// Resolved `layers` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LayersConfig {
    /// Consumer configuration file.
    pub(crate) config: Utf8PathBuf,
}

impl TryFrom<LayersArgs> for LayersConfig {
    type Error = CliError;

    fn try_from(args: LayersArgs) -> Result<Self, Self::Error> {
        let config = args.config.ok_or(CliError::MissingArgument {
            field: ARG_CONFIG,
            env: ENV_LAYERS_CONFIG,
        })?;
        Ok(Self { config })
    }
}

pub(crate) async fn run_layers(
    config: &LayersConfig,
    registry: &ConsumerRegistry,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    require_file(&config.config, ARG_CONFIG)?;
    let consumers = resolve_file(registry, &config.config).await?;
    write_json(writer, &list_layers(&consumers)?)
}

/// Layers of every consumer, keyed by consumer name and sorted by layer name.
pub(crate) fn list_layers(
    consumers: &ConsumerMap,
) -> Result<BTreeMap<String, Vec<LayerInfo>>, CliError> {
    consumers
        .iter()
        .map(|(name, consumer)| {
            let mut layers = consumer.layers()?;
            layers.sort_by(|left, right| left.name.cmp(&right.name));
            Ok((name.clone(), layers))
        })
        .collect()
}
