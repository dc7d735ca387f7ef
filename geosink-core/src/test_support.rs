//! In-memory `Consumer` and `ConsumerFactory` doubles used by unit and
//! behaviour tests across the workspace.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    ConfigDict, Consumer, ConsumerError, ConsumerFactory, ErrorKind, ExecutionContext, Feature,
    GeometryKind, LayerInfo,
};

/// Consumer that keeps accepted features in memory.
///
/// Shape checks and cancellation follow the same rules as a database-backed
/// consumer, so orchestration code can be exercised without a database.
#[derive(Debug, Default)]
pub struct MemoryConsumer {
    layers: BTreeMap<String, LayerInfo>,
    written: Mutex<Vec<(String, Feature)>>,
    delay: Option<Duration>,
}

impl MemoryConsumer {
    /// Build a consumer exposing `layers`.
    #[must_use]
    pub fn with_layers<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = LayerInfo>,
    {
        Self {
            layers: layers
                .into_iter()
                .map(|layer| (layer.name.clone(), layer))
                .collect(),
            ..Self::default()
        }
    }

    /// Wait `delay` before accepting each feature.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Features accepted so far, paired with their layer.
    #[must_use]
    pub fn written(&self) -> Vec<(String, Feature)> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Consumer for MemoryConsumer {
    async fn insert_features(
        &self,
        ctx: &ExecutionContext,
        layer: &str,
        features: &[Feature],
    ) -> Result<(), ConsumerError> {
        let info = self
            .layers
            .get(layer)
            .ok_or_else(|| ConsumerError::LayerNotFound(layer.to_owned()))?;
        for feature in features {
            if !info.kind.matches(&feature.geometry) {
                return Err(ConsumerError::GeometryTypeMismatch {
                    layer: layer.to_owned(),
                    expected: info.kind,
                    got: crate::geometry_name(&feature.geometry),
                });
            }
            let delay = self.delay.unwrap_or_default();
            ctx.run(tokio::time::sleep(delay))
                .await
                .map_err(|reason| ConsumerError::interrupted(layer, reason))?;
            self.written
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((layer.to_owned(), feature.clone()));
        }
        Ok(())
    }

    fn layers(&self) -> Result<Vec<LayerInfo>, ConsumerError> {
        Ok(self.layers.values().cloned().collect())
    }
}

/// Factory building [`MemoryConsumer`] values from configuration blocks.
///
/// Each block must carry a `layers` list of `{ name, geom_type, srid? }`
/// tables. The factory counts `init` and `cleanup` calls and keeps every
/// consumer it builds until cleanup.
#[derive(Debug, Default)]
pub struct StaticFactory {
    init_calls: AtomicUsize,
    cleanup_calls: AtomicUsize,
    live: Mutex<Vec<Arc<MemoryConsumer>>>,
}

impl StaticFactory {
    /// Number of `init` calls so far.
    #[must_use]
    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Number of `cleanup` calls so far.
    #[must_use]
    pub fn cleanup_calls(&self) -> usize {
        self.cleanup_calls.load(Ordering::SeqCst)
    }

    /// Consumers built and not yet cleaned up, in construction order.
    #[must_use]
    pub fn live(&self) -> Vec<Arc<MemoryConsumer>> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn parse_layers(config: &ConfigDict) -> Result<Vec<LayerInfo>, ConsumerError> {
        let configuration = |err| ConsumerError::backend(ErrorKind::Configuration, err);
        config
            .dict_slice("layers")
            .map_err(configuration)?
            .iter()
            .map(|layer| {
                let name = layer.string("name").map_err(configuration)?;
                let kind: GeometryKind = layer
                    .string("geom_type")
                    .map_err(configuration)?
                    .parse()
                    .map_err(|err| ConsumerError::backend(ErrorKind::Configuration, err))?;
                let srid = layer.u64_or("srid", 3857).map_err(configuration)?;
                Ok(LayerInfo {
                    name: name.to_owned(),
                    kind,
                    srid,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ConsumerFactory for StaticFactory {
    async fn init(&self, config: &ConfigDict) -> Result<Arc<dyn Consumer>, ConsumerError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        let consumer = Arc::new(MemoryConsumer::with_layers(Self::parse_layers(config)?));
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&consumer));
        Ok(consumer)
    }

    async fn cleanup(&self) {
        self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
