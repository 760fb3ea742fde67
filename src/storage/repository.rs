use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

use super::{MIGRATION_001_INITIAL, OrderStore, TransactionLog, UserStore};

/// Composition root for persistence: one SQLite pool and the three stores that run on it.
///
/// The stores are stateless; ledger operations pass them either the pool or an open
/// transaction from [`Repository::begin`].
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    pub users: UserStore,
    pub orders: OrderStore,
    pub transactions: TransactionLog,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            users: UserStore,
            orders: OrderStore,
            transactions: TransactionLog,
        }
    }

    /// Connect to a SQLite database URL such as `sqlite:ledger.db?mode=rwc`.
    ///
    /// Writers that find the database locked wait up to `busy_timeout` before failing.
    pub async fn connect(database_url: &str, busy_timeout: Duration) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .busy_timeout(busy_timeout)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate). Safe to run on an existing one.
    pub async fn init(database_url: &str, busy_timeout: Duration) -> Result<Self> {
        let repo = Self::connect(database_url, busy_timeout).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a transaction. Dropping it without commit rolls it back.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
