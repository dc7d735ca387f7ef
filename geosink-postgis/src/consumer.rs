//! The PostGIS consumer.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use geosink_core::{Consumer, ConsumerError, ExecutionContext, Feature, LayerInfo};
use log::{debug, warn};

use crate::{LayerDefinition, StatementExecutor};

/// Writes features by rendering each layer's template and executing the
/// resulting statement.
///
/// Layers are fixed at construction. Statements run one at a time in the
/// order features are supplied, with no enclosing transaction.
pub struct PostgisConsumer<E> {
    name: String,
    layers: BTreeMap<String, LayerDefinition>,
    executor: E,
}

impl<E> fmt::Debug for PostgisConsumer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgisConsumer")
            .field("name", &self.name)
            .field("layers", &self.layers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<E: StatementExecutor> PostgisConsumer<E> {
    /// Build a consumer over compiled `layers`.
    #[must_use]
    pub const fn new(
        name: String,
        layers: BTreeMap<String, LayerDefinition>,
        executor: E,
    ) -> Self {
        Self {
            name,
            layers,
            executor,
        }
    }

    /// Consumer name, as configured.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compiled layer named `layer`, if configured.
    #[must_use]
    pub fn layer(&self, layer: &str) -> Option<&LayerDefinition> {
        self.layers.get(layer)
    }

    /// Release the connection pool.
    pub async fn close(&self) {
        debug!("closing connection pool for consumer {}", self.name);
        self.executor.close().await;
    }

    async fn insert_one(
        &self,
        ctx: &ExecutionContext,
        layer: &LayerDefinition,
        feature: &Feature,
    ) -> Result<(), ConsumerError> {
        let name = layer.name();
        ctx.check()
            .map_err(|reason| ConsumerError::interrupted(name, reason))?;
        layer.check(feature)?;
        let sql = layer
            .render(feature)
            .map_err(|err| ConsumerError::statement(name, err))?;
        debug!("{}: {name}: {sql}", self.name);
        match ctx.run(self.executor.execute(&sql)).await {
            Ok(Ok(rows)) => {
                debug!("{}: {name}: {rows} rows affected", self.name);
                Ok(())
            }
            Ok(Err(err)) => {
                warn!("{}: {name}: statement failed: {err}", self.name);
                Err(ConsumerError::statement(name, err))
            }
            Err(reason) => Err(ConsumerError::interrupted(name, reason)),
        }
    }
}

#[async_trait]
impl<E: StatementExecutor> Consumer for PostgisConsumer<E> {
    async fn insert_features(
        &self,
        ctx: &ExecutionContext,
        layer: &str,
        features: &[Feature],
    ) -> Result<(), ConsumerError> {
        let definition = self
            .layers
            .get(layer)
            .ok_or_else(|| ConsumerError::LayerNotFound(layer.to_owned()))?;
        for feature in features {
            self.insert_one(ctx, definition, feature).await?;
        }
        Ok(())
    }

    fn layers(&self) -> Result<Vec<LayerInfo>, ConsumerError> {
        Ok(self.layers.values().map(LayerDefinition::info).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_layers;
    use crate::test_support::RecordingExecutor;
    use geo::{Geometry, MultiPoint, Point};
    use geosink_core::{ConfigDict, ErrorKind, GeometryKind, Tags};
    use rstest::{fixture, rstest};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn consumer(executor: Arc<RecordingExecutor>) -> PostgisConsumer<Arc<RecordingExecutor>> {
        let blocks = [
            ConfigDict::try_from(json!({
                "name": "wells",
                "geom_type": "point",
                "sql": "INSERT INTO wells VALUES ('{{ AsText .Geometry }}', {{ .SRID }})",
            }))
            .expect("config literal"),
            ConfigDict::try_from(json!({
                "name": "roads",
                "geom_type": "linestring",
                "srid": 4326,
                "sql": "INSERT INTO roads VALUES ('{{ AsBinary .Geometry }}')",
            }))
            .expect("config literal"),
            ConfigDict::try_from(json!({
                "name": "springs",
                "geom_type": "point",
                "sql": "INSERT INTO springs VALUES ('{{ .Tags.name.first }}')",
            }))
            .expect("config literal"),
        ];
        let layers = compile_layers(&blocks, 3857).expect("layers compile");
        PostgisConsumer::new("edits".into(), layers, executor)
    }

    #[fixture]
    fn executor() -> Arc<RecordingExecutor> {
        Arc::new(RecordingExecutor::default())
    }

    fn point(x: f64) -> Feature {
        Feature::new(Geometry::Point(Point::new(x, 1.0)), 3857)
    }

    fn named_point(x: f64, name: serde_json::Value) -> Feature {
        point(x).with_tags(Tags::from([("name".to_owned(), name)]))
    }

    #[rstest]
    #[tokio::test]
    async fn executes_one_statement_per_feature(executor: Arc<RecordingExecutor>) {
        let consumer = consumer(Arc::clone(&executor));
        consumer
            .insert_features(&ExecutionContext::new(), "wells", &[point(1.0), point(2.0)])
            .await
            .expect("insert succeeds");
        assert_eq!(
            executor.statements(),
            [
                "INSERT INTO wells VALUES ('POINT (1 1)', 3857)",
                "INSERT INTO wells VALUES ('POINT (2 1)', 3857)",
            ]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_layers_are_reported(executor: Arc<RecordingExecutor>) {
        let consumer = consumer(Arc::clone(&executor));
        let err = consumer
            .insert_features(&ExecutionContext::new(), "rivers", &[point(1.0)])
            .await
            .expect_err("unknown layer must fail");
        assert_eq!(err.kind(), ErrorKind::LayerNotFound);
        assert_eq!(err.to_string(), "layer \"rivers\" does not exist");
        assert!(executor.statements().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn mismatched_shapes_execute_nothing(executor: Arc<RecordingExecutor>) {
        let consumer = consumer(Arc::clone(&executor));
        let multi = Feature::new(
            Geometry::MultiPoint(MultiPoint::from(vec![(1.0, 1.0)])),
            3857,
        );
        let err = consumer
            .insert_features(&ExecutionContext::new(), "wells", &[multi])
            .await
            .expect_err("multipoint must be rejected");
        assert_eq!(err.kind(), ErrorKind::GeometryTypeMismatch);
        assert!(executor.statements().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn a_mismatch_mid_batch_abandons_the_rest(executor: Arc<RecordingExecutor>) {
        let consumer = consumer(Arc::clone(&executor));
        let multi = Feature::new(
            Geometry::MultiPoint(MultiPoint::from(vec![(2.0, 1.0)])),
            3857,
        );
        let err = consumer
            .insert_features(
                &ExecutionContext::new(),
                "wells",
                &[point(1.0), multi, point(3.0)],
            )
            .await
            .expect_err("multipoint must be rejected");
        assert_eq!(err.kind(), ErrorKind::GeometryTypeMismatch);
        assert_eq!(executor.attempts(), 1);
        assert_eq!(
            executor.statements(),
            ["INSERT INTO wells VALUES ('POINT (1 1)', 3857)"]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn a_render_failure_mid_batch_abandons_the_rest(executor: Arc<RecordingExecutor>) {
        let consumer = consumer(Arc::clone(&executor));
        let features = [
            named_point(1.0, json!({ "first": "north" })),
            named_point(2.0, json!("south")),
            named_point(3.0, json!({ "first": "east" })),
        ];
        let err = consumer
            .insert_features(&ExecutionContext::new(), "springs", &features)
            .await
            .expect_err("a scalar tag has no fields");
        assert_eq!(err.kind(), ErrorKind::StatementExecution);
        assert_eq!(executor.attempts(), 1);
        assert_eq!(
            executor.statements(),
            ["INSERT INTO springs VALUES ('north')"]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn halts_at_the_first_failed_statement() {
        let executor = Arc::new(RecordingExecutor::failing_at(2));
        let consumer = consumer(Arc::clone(&executor));
        let features = [point(1.0), point(2.0), point(3.0), point(4.0)];
        let err = consumer
            .insert_features(&ExecutionContext::new(), "wells", &features)
            .await
            .expect_err("third statement fails");
        assert_eq!(err.kind(), ErrorKind::StatementExecution);
        assert_eq!(executor.statements().len(), 2);
        assert_eq!(executor.attempts(), 3);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn slow_statements_hit_the_deadline() {
        let executor = Arc::new(RecordingExecutor::default().with_delay(Duration::from_secs(5)));
        let consumer = consumer(Arc::clone(&executor));
        let ctx = ExecutionContext::with_timeout(Duration::from_secs(1));
        let err = consumer
            .insert_features(&ctx, "wells", &[point(1.0)])
            .await
            .expect_err("deadline must expire");
        assert!(matches!(err, ConsumerError::DeadlineExceeded { ref layer } if layer == "wells"));
        assert!(executor.statements().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn cancelled_contexts_execute_nothing(executor: Arc<RecordingExecutor>) {
        let consumer = consumer(Arc::clone(&executor));
        let ctx = ExecutionContext::new();
        ctx.cancel();
        let err = consumer
            .insert_features(&ctx, "wells", &[point(1.0)])
            .await
            .expect_err("cancelled context must fail");
        assert!(matches!(err, ConsumerError::Cancelled { .. }));
        assert_eq!(executor.attempts(), 0);
    }

    #[rstest]
    fn reports_layers_in_name_order(executor: Arc<RecordingExecutor>) {
        let consumer = consumer(executor);
        let layers = consumer.layers().expect("layers listed");
        let summary: Vec<_> = layers
            .iter()
            .map(|layer| (layer.name.as_str(), layer.kind, layer.srid))
            .collect();
        assert_eq!(
            summary,
            [
                ("roads", GeometryKind::LineString, 4326),
                ("springs", GeometryKind::Point, 3857),
                ("wells", GeometryKind::Point, 3857),
            ]
        );
    }
}
