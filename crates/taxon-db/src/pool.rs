//! PostgreSQL pool setup.
//!
//! An import keeps up to `IMPORT_CONCURRENCY` chunk upserts in flight plus
//! one lookup query, so the pool is sized from the import settings rather
//! than from request traffic.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use taxon_core::defaults::DB_MAX_CONNECTIONS;
use taxon_core::{Error, Result};

/// Seconds to wait for a free connection before a chunk fails.
pub const ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Seconds an unused connection stays open.
pub const IDLE_TIMEOUT_SECS: u64 = 300;

/// Connection limits for one console process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Upper bound on waiting for a connection; a chunk that waits longer
    /// is reported as failed.
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DB_MAX_CONNECTIONS,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(ACQUIRE_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(IDLE_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Raise `max_connections` so `concurrency` chunks and one lookup can
    /// run without waiting on each other. Never lowers it.
    pub fn sized_for(mut self, concurrency: usize) -> Self {
        let needed = u32::try_from(concurrency)
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        if needed > self.max_connections {
            debug!(
                subsystem = "db",
                component = "pool",
                configured = self.max_connections,
                needed,
                "Raising pool size to match import concurrency"
            );
            self.max_connections = needed;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::Config(
                "DB_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(Error::Config(format!(
                "minimum connections ({}) exceeds maximum ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

/// Connect with [`PoolConfig::default`].
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    config.validate()?;
    let start = Instant::now();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect(database_url)
        .await?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        max_connections = config.max_connections,
        duration_ms = start.elapsed().as_millis() as u64,
        "Connected to database"
    );
    Ok(pool)
}

/// Report pool saturation after a batch of work.
///
/// A pool with no idle connection at the end of an import means chunks
/// queued for connections rather than for the store.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = "db",
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool usage"
    );
    if size > 0 && idle == 0 {
        warn!(
            subsystem = "db",
            component = "pool",
            pool_size = size,
            "No idle connections; lower IMPORT_CONCURRENCY or raise DB_MAX_CONNECTIONS"
        );
    }
}
