//! Command-line interface for the geosink write path.
//!
//! Each invocation builds a registry with every compiled-in backend,
//! resolves the consumers named in a configuration file, runs one command
//! and always runs the registry's cleanup before returning.
#![forbid(unsafe_code)]

mod consumers;
mod error;
mod insert;
mod layers;

use std::io::Write;

use clap::{Parser, Subcommand};
use geosink_core::ConsumerRegistry;
use serde::Serialize;

pub use error::CliError;
use insert::{InsertArgs, InsertConfig};
use layers::{LayersArgs, LayersConfig};

const ARG_CONFIG: &str = "config";
const ARG_DEADLINE_MS: &str = "deadline-ms";
const ARG_TARGET: &str = "target";
const ARG_FEATURE: &str = "feature";
const ENV_LAYERS_CONFIG: &str = "GEOSINK_CMDS_LAYERS_CONFIG";
const ENV_INSERT_CONFIG: &str = "GEOSINK_CMDS_INSERT_CONFIG";
const ENV_INSERT_TARGET: &str = "GEOSINK_CMDS_INSERT_TARGET";
const ENV_INSERT_FEATURE: &str = "GEOSINK_CMDS_INSERT_FEATURE";

/// Run the geosink CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let invocation = cli.command.into_invocation()?;
    let mut stdout = std::io::stdout().lock();
    runtime.block_on(run_command(&invocation, &DefaultRegistryBuilder, &mut stdout))
}

#[derive(Debug, Parser)]
#[command(
    name = "geosink",
    about = "Write geometry features through configured consumers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the layers of every configured consumer.
    Layers(LayersArgs),
    /// Insert one GeoJSON feature through the ingestion path.
    Insert(InsertArgs),
}

impl Command {
    fn into_invocation(self) -> Result<Invocation, CliError> {
        match self {
            Self::Layers(args) => args.into_config().map(Invocation::Layers),
            Self::Insert(args) => args.into_config().map(Invocation::Insert),
        }
    }
}

/// A command with its configuration fully merged and validated.
#[derive(Debug)]
enum Invocation {
    Layers(LayersConfig),
    Insert(InsertConfig),
}

/// Builds the registry a command resolves its consumers from.
trait RegistryBuilder {
    fn build(&self) -> Result<ConsumerRegistry, CliError>;
}

struct DefaultRegistryBuilder;

impl RegistryBuilder for DefaultRegistryBuilder {
    fn build(&self) -> Result<ConsumerRegistry, CliError> {
        let mut registry = ConsumerRegistry::new();
        geosink_postgis::register(&mut registry)?;
        Ok(registry)
    }
}

async fn run_command(
    invocation: &Invocation,
    builder: &dyn RegistryBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let registry = builder.build()?;
    let outcome = match invocation {
        Invocation::Layers(config) => layers::run_layers(config, &registry, writer).await,
        Invocation::Insert(config) => insert::run_insert(config, &registry, writer).await,
    };
    registry.cleanup().await;
    outcome
}

fn write_json<T: Serialize>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
mod tests;
