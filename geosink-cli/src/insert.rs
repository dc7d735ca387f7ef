//! Insert command implementation for the geosink CLI.

use std::io::Write;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use geosink_core::ConsumerRegistry;
use geosink_core::ingest::Ingestor;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::consumers::{read_file, require_file, resolve_file};
use crate::{
    ARG_CONFIG, ARG_DEADLINE_MS, ARG_FEATURE, ARG_TARGET, CliError, ENV_INSERT_CONFIG,
    ENV_INSERT_FEATURE, ENV_INSERT_TARGET,
};

/// Map every configured consumer is served under.
pub(crate) const DEFAULT_MAP: &str = "default";
/// Insertion deadline used when `--deadline-ms` is not set.
pub(crate) const DEFAULT_DEADLINE_MS: u64 = 1000;

/// CLI arguments for the `insert` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Resolve every consumer in the configuration file and route \
                 one GeoJSON feature to /default/<consumer>/<layer>, exactly \
                 as the ingestion endpoint would. Prints {} on success.",
    about = "Insert one GeoJSON feature"
)]
#[ortho_config(prefix = "GEOSINK")]
pub(crate) struct InsertArgs {
    /// Path to the consumer configuration JSON file.
    #[arg(long = ARG_CONFIG, value_name = "path")]
    #[serde(default)]
    pub(crate) config: Option<Utf8PathBuf>,
    /// Milliseconds an insertion may run before it is abandoned.
    #[arg(long = ARG_DEADLINE_MS, value_name = "ms")]
    #[serde(default)]
    pub(crate) deadline_ms: Option<u64>,
    /// Destination path, `/default/<consumer>/<layer>`.
    #[arg(value_name = "target")]
    #[serde(default)]
    pub(crate) target: Option<String>,
    /// Path to a file holding one GeoJSON feature.
    #[arg(value_name = "feature")]
    #[serde(default)]
    pub(crate) feature: Option<Utf8PathBuf>,
}

impl InsertArgs {
    pub(crate) fn into_config(self) -> Result<InsertConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        InsertConfig::try_from(merged)
    }
}

/// Resolved `insert` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InsertConfig {
    /// Consumer configuration file.
    pub(crate) config: Utf8PathBuf,
    /// Per-insertion deadline.
    pub(crate) deadline: Duration,
    /// Destination path.
    pub(crate) target: String,
    /// GeoJSON feature file.
    pub(crate) feature: Utf8PathBuf,
}

impl TryFrom<InsertArgs> for InsertConfig {
    type Error = CliError;

    fn try_from(args: InsertArgs) -> Result<Self, Self::Error> {
        let config = args.config.ok_or(CliError::MissingArgument {
            field: ARG_CONFIG,
            env: ENV_INSERT_CONFIG,
        })?;
        let target = args.target.ok_or(CliError::MissingArgument {
            field: ARG_TARGET,
            env: ENV_INSERT_TARGET,
        })?;
        let feature = args.feature.ok_or(CliError::MissingArgument {
            field: ARG_FEATURE,
            env: ENV_INSERT_FEATURE,
        })?;
        let deadline = Duration::from_millis(args.deadline_ms.unwrap_or(DEFAULT_DEADLINE_MS));
        Ok(Self {
            config,
            deadline,
            target,
            feature,
        })
    }
}

pub(crate) async fn run_insert(
    config: &InsertConfig,
    registry: &ConsumerRegistry,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    require_file(&config.config, ARG_CONFIG)?;
    require_file(&config.feature, ARG_FEATURE)?;
    let body = read_file(&config.feature)?;
    let consumers = resolve_file(registry, &config.config).await?;
    let ingestor = Ingestor::new()
        .with_deadline(config.deadline)
        .with_map(DEFAULT_MAP, consumers);
    let response = ingestor.ingest(&config.target, body.as_bytes()).await?;
    writeln!(writer, "{}", response.body()).map_err(CliError::WriteOutput)
}
