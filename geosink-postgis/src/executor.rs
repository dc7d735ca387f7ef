//! Statement execution against a pooled database connection.
//!
//! [`StatementExecutor`] and [`Connector`] separate the consumer from the
//! database driver, so insertion and lifecycle logic can be exercised
//! without a running server. [`PgConnector`] opens an `sqlx` pool.

use std::sync::Arc;

use async_trait::async_trait;
use geosink_core::BoxError;
use log::LevelFilter;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::ConnectOptions;

use crate::ConnectionParams;

/// Executes rendered SQL statements.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Execute `sql`, returning the number of rows affected.
    async fn execute(&self, sql: &str) -> Result<u64, BoxError>;

    /// Release the underlying connections. Called once during cleanup.
    async fn close(&self);
}

#[async_trait]
impl<E> StatementExecutor for Arc<E>
where
    E: StatementExecutor + ?Sized,
{
    async fn execute(&self, sql: &str) -> Result<u64, BoxError> {
        (**self).execute(sql).await
    }

    async fn close(&self) {
        (**self).close().await;
    }
}

/// Opens a [`StatementExecutor`] for a set of connection parameters.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Executor produced by this connector.
    type Executor: StatementExecutor + 'static;

    /// Open a pool sized by `params.max_connections`.
    async fn connect(&self, params: &ConnectionParams) -> Result<Self::Executor, BoxError>;
}

/// [`StatementExecutor`] backed by an `sqlx` PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatementExecutor for PgExecutor {
    async fn execute(&self, sql: &str) -> Result<u64, BoxError> {
        let result = sqlx::raw_sql(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// [`Connector`] opening PostgreSQL pools with `sqlx`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

impl PgConnector {
    /// Connection options for `params`. Statements are logged at debug level.
    #[must_use]
    pub fn options(params: &ConnectionParams) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .database(&params.database)
            .username(&params.user)
            .password(&params.password)
            .application_name(&params.application_name)
            .log_statements(LevelFilter::Debug)
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Executor = PgExecutor;

    async fn connect(&self, params: &ConnectionParams) -> Result<PgExecutor, BoxError> {
        let pool = PgPoolOptions::new()
            .max_connections(params.max_connections)
            .connect_with(Self::options(params))
            .await?;
        Ok(PgExecutor::new(pool))
    }
}
