//! Executor and connector doubles for exercising the consumer without a
//! database.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use geosink_core::BoxError;

use crate::{ConnectionParams, Connector, StatementExecutor};

/// Records every statement it executes.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    statements: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    close_calls: AtomicUsize,
    fail_at: Option<usize>,
    delay: Option<Duration>,
}

impl RecordingExecutor {
    /// An executor whose statement at zero-based position `index` fails.
    #[must_use]
    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::default()
        }
    }

    /// Wait `delay` before completing each statement.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Statements that completed, in execution order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of statements started, including failed and abandoned ones.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Number of `close` calls.
    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatementExecutor for RecordingExecutor {
    async fn execute(&self, sql: &str) -> Result<u64, BoxError> {
        let index = self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_at == Some(index) {
            return Err(format!("statement {index} rejected").into());
        }
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sql.to_owned());
        Ok(1)
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out [`RecordingExecutor`] values and remembers each one.
#[derive(Debug, Default)]
pub struct RecordingConnector {
    refuse: bool,
    connects: Mutex<Vec<ConnectionParams>>,
    executors: Mutex<Vec<Arc<RecordingExecutor>>>,
}

impl RecordingConnector {
    /// A connector that fails every connection attempt.
    #[must_use]
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Parameters of every connection attempt, in order.
    #[must_use]
    pub fn connects(&self) -> Vec<ConnectionParams> {
        self.connects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Executors handed out so far.
    #[must_use]
    pub fn executors(&self) -> Vec<Arc<RecordingExecutor>> {
        self.executors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    type Executor = Arc<RecordingExecutor>;

    async fn connect(&self, params: &ConnectionParams) -> Result<Self::Executor, BoxError> {
        self.connects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(params.clone());
        if self.refuse {
            return Err(format!("connection to {}:{} refused", params.host, params.port).into());
        }
        let executor = Arc::new(RecordingExecutor::default());
        self.executors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&executor));
        Ok(executor)
    }
}
