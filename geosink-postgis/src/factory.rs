//! Builds PostGIS consumers and tears them down at shutdown.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use geosink_core::{ConfigDict, Consumer, ConsumerError, ConsumerFactory};
use log::info;
use tokio::sync::Mutex;

use crate::config::keys;
use crate::{
    ConnectionParams, Connector, PgConnector, PostgisConsumer, PostgisError, compile_layers,
};

/// [`ConsumerFactory`] for the `postgis` backend type.
///
/// Every consumer it builds stays on a live list until
/// [`ConsumerFactory::cleanup`] drains it, so each pool is closed exactly
/// once however many times cleanup runs.
pub struct PostgisFactory<C: Connector = PgConnector> {
    connector: C,
    live: Mutex<Vec<Arc<PostgisConsumer<C::Executor>>>>,
}

impl<C: Connector + fmt::Debug> fmt::Debug for PostgisFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgisFactory")
            .field("connector", &self.connector)
            .finish_non_exhaustive()
    }
}

impl PostgisFactory {
    /// A factory opening real PostgreSQL pools.
    #[must_use]
    pub fn new() -> Self {
        Self::with_connector(PgConnector)
    }
}

impl Default for PostgisFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> PostgisFactory<C> {
    /// A factory opening pools through `connector`.
    #[must_use]
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            live: Mutex::new(Vec::new()),
        }
    }

    /// Build a consumer from a configuration block.
    ///
    /// Connection settings and every layer template are validated before a
    /// pool is opened.
    pub async fn build(
        &self,
        config: &ConfigDict,
    ) -> Result<Arc<PostgisConsumer<C::Executor>>, PostgisError> {
        let name = config.opt_string(keys::NAME)?.unwrap_or_default().to_owned();
        let params = ConnectionParams::from_config(config)?;
        let layers = compile_layers(&config.dict_slice(keys::LAYERS)?, params.srid)?;
        let executor = self
            .connector
            .connect(&params)
            .await
            .map_err(PostgisError::PoolCreationFailed)?;
        info!(
            "postgis consumer {name} connected to {}:{}/{} with {} layers (pool size {})",
            params.host,
            params.port,
            params.database,
            layers.len(),
            params.max_connections
        );
        let consumer = Arc::new(PostgisConsumer::new(name, layers, executor));
        self.live.lock().await.push(Arc::clone(&consumer));
        Ok(consumer)
    }

    /// Connector used to open pools.
    #[must_use]
    pub const fn connector(&self) -> &C {
        &self.connector
    }

    /// Number of consumers built and not yet cleaned up.
    pub async fn live_count(&self) -> usize {
        self.live.lock().await.len()
    }
}

#[async_trait]
impl<C: Connector> ConsumerFactory for PostgisFactory<C> {
    async fn init(&self, config: &ConfigDict) -> Result<Arc<dyn Consumer>, ConsumerError> {
        let consumer: Arc<dyn Consumer> = self.build(config).await?;
        Ok(consumer)
    }

    async fn cleanup(&self) {
        let drained: Vec<_> = self.live.lock().await.drain(..).collect();
        if drained.is_empty() {
            return;
        }
        info!("cleaning up postgis consumers");
        for consumer in drained {
            consumer.close().await;
        }
    }
}
