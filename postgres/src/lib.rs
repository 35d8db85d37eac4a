//! `PostgreSQL` store for the DB management backend.
//!
//! [`PgStore`] implements every persistence trait from `dbm-core` over a single
//! connection pool:
//!
//! - [`DirtyPoolStore`](dbm_core::DirtyPoolStore): pool hosts and machine events
//! - [`MetaStore`](dbm_core::MetaStore): tickets, business cache, clusters
//! - [`ProxyStore`](dbm_core::ProxyStore): cloud extensions and nginx proxies
//!
//! Queries are built at runtime with `sqlx::query` / `QueryBuilder`; the schema
//! lives in `migrations/` and is applied with [`PgStore::migrate`].
//!
//! # Example
//!
//! ```ignore
//! use dbm_postgres::PgStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PgStore::connect("postgres://localhost/dbm", 10).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod dirty_pool;
mod meta;
mod proxy;
mod rows;

use dbm_core::StoreError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Connection pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound of open connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// How long to wait for a free connection.
    pub connect_timeout: Duration,
    /// Idle connections older than this are closed.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// `PostgreSQL` implementation of the store traits.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a pool against `database_url` with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection cannot be established.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        Self::connect_with(
            database_url,
            &PoolConfig {
                max_connections,
                ..PoolConfig::default()
            },
        )
        .await
    }

    /// Open a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection cannot be established.
    pub async fn connect_with(database_url: &str, config: &PoolConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(database_url)
            .await
            .map_err(db_err)?;

        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self { pool })
    }

    /// Apply pending migrations from `migrations/`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub(crate) fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}
