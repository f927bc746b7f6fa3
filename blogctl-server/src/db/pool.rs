//! Connection pool plus the retrying handle every repository goes through

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use blogctl_core::{Connector, RetryExecutor, RetryPolicy};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgPool};

use super::DbError;

/// Default maximum connections for the pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

fn pool_options(max_connections: u32) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
}

/// Create a PostgreSQL connection pool, connecting immediately.
///
/// # Errors
///
/// Returns an error if the first connection fails.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    pool_options(max_connections).connect(database_url).await
}

/// Create a pool that opens connections on first use.
///
/// Only fails when the URL itself cannot be parsed.
pub fn create_lazy_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    pool_options(max_connections).connect_lazy(database_url)
}

/// Reconnects by checking out a pooled connection and pinging it; the pool
/// replaces dead connections on acquire.
#[derive(Debug, Clone)]
pub struct PoolConnector {
    pool: PgPool,
}

#[async_trait]
impl Connector for PoolConnector {
    type Error = sqlx::Error;

    async fn reconnect(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await
    }
}

/// Pool handle shared by all repositories.
///
/// Cheap to clone; the pool and the executor are both reference counted or
/// plain data.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
    retry: RetryExecutor<PoolConnector>,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self::with_policy(pool, RetryPolicy::default())
    }

    pub fn with_policy(pool: PgPool, policy: RetryPolicy) -> Self {
        let connector = PoolConnector { pool: pool.clone() };
        Self {
            pool,
            retry: RetryExecutor::with_policy(connector, policy),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn executor(&self) -> &RetryExecutor<PoolConnector> {
        &self.retry
    }

    /// Run `op` through the retry executor.
    ///
    /// `op` is called again from scratch on a transient failure, so it must
    /// not leave partial writes behind (use a transaction for multi-step work).
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        self.retry.execute(op).await
    }

    /// `SELECT 1` round trip, retried.
    pub async fn ping(&self) -> Result<(), DbError> {
        let pool = &self.pool;
        self.run(move || async move {
            sqlx::query("SELECT 1").execute(pool).await?;
            Ok::<_, DbError>(())
        })
        .await
    }
}
