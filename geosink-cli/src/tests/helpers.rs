//! Test helpers for writing consumer configuration and feature files.

use super::*;
use camino::Utf8PathBuf;
use geosink_core::test_support::StaticFactory;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Registry builder installing the in-memory backend under `memory`.
#[derive(Default)]
pub(super) struct MemoryRegistryBuilder {
    pub(super) factory: Arc<StaticFactory>,
}

impl RegistryBuilder for MemoryRegistryBuilder {
    fn build(&self) -> Result<ConsumerRegistry, CliError> {
        let mut registry = ConsumerRegistry::new();
        registry.register("memory", self.factory.clone())?;
        Ok(registry)
    }
}

/// One `edits` consumer with a point layer `wells` and a linestring layer
/// `roads`.
pub(super) const CONSUMERS: &str = r#"{
  "consumers": [
    {
      "name": "edits",
      "type": "memory",
      "layers": [
        { "name": "wells", "geom_type": "point", "srid": 4326 },
        { "name": "roads", "geom_type": "linestring" }
      ]
    }
  ]
}"#;

/// A GeoJSON point feature with an SRID property.
pub(super) const POINT_FEATURE: &str = r#"{
  "type": "Feature",
  "geometry": { "type": "Point", "coordinates": [1.5, 2.5] },
  "properties": { "SRID": 4326, "name": "north well" }
}"#;

/// Temporary directory holding the files a command reads.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        Self { _dir: dir, root }
    }

    pub(super) fn write(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.root.join(name);
        fs::write(&path, contents).expect("write fixture");
        path
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }
}

pub(super) fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build test runtime")
}

/// Run `invocation` against `builder`, returning the outcome and the
/// captured output.
pub(super) fn run_captured(
    invocation: &Invocation,
    builder: &dyn RegistryBuilder,
) -> (Result<(), CliError>, String) {
    let mut output = Vec::new();
    let outcome = runtime().block_on(run_command(invocation, builder, &mut output));
    (outcome, String::from_utf8(output).expect("utf-8 output"))
}

pub(super) fn layers_invocation(config: Utf8PathBuf) -> Invocation {
    Invocation::Layers(LayersConfig { config })
}

pub(super) fn insert_invocation(config: Utf8PathBuf, target: &str, feature: Utf8PathBuf) -> Invocation {
    Invocation::Insert(InsertConfig {
        config,
        deadline: Duration::from_millis(insert::DEFAULT_DEADLINE_MS),
        target: target.to_owned(),
        feature,
    })
}
