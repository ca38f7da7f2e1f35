//! Ledger store: SQLite connection pool and embedded migrations

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::{BillingError, BillingResult};

/// Transaction handle every billing operation runs inside
pub type LedgerTx<'c> = Transaction<'c, Sqlite>;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Handle to the transactional store holding plans, subscriptions, orders
/// and activations. Cheap to clone; passed explicitly to every service.
#[derive(Clone, Debug)]
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    /// Open (creating if needed) the database at `url` and apply migrations
    pub async fn connect(url: &str, max_connections: u32) -> BillingResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| BillingError::Config(format!("Invalid database URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        tracing::info!(max_connections, "Ledger store connection established");
        Self::from_pool(pool).await
    }

    /// Private in-memory database, used by tests and throwaway local runs.
    ///
    /// An in-memory SQLite database lives only as long as its connection, so
    /// the pool is pinned to a single connection that never expires.
    pub async fn in_memory() -> BillingResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| BillingError::Config(e.to_string()))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> BillingResult<Self> {
        MIGRATOR.run(&pool).await?;
        tracing::info!("Ledger migrations applied");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open the single transaction an operation runs inside
    pub async fn begin(&self) -> BillingResult<LedgerTx<'static>> {
        Ok(self.pool.begin().await?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
