//! PostgreSQL pool setup.
//!
//! Every connection is tagged with an `application_name` and a server-side
//! `statement_timeout` so a runaway part reassembly or vector scan cannot hold
//! a connection forever.

use std::str::FromStr;
use std::time::{Duration, Instant};

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use quill_core::{defaults, Error, Result};

const APPLICATION_NAME: &str = "quill";

/// Tuning knobs for [`create_pool_with_config`].
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a request waits for a free connection.
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    /// Sent as `statement_timeout`; `None` keeps the server default.
    pub statement_timeout: Option<Duration>,
    pub application_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: defaults::DB_MAX_CONNECTIONS,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(300)),
            statement_timeout: Some(Duration::from_secs(30)),
            application_name: APPLICATION_NAME.to_string(),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamped to at least one connection.
    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n.max(1);
        self.min_connections = self.min_connections.min(self.max_connections);
        self
    }

    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n.min(self.max_connections);
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Connection options for `database_url` with this config applied.
    pub fn connect_options(&self, database_url: &str) -> Result<PgConnectOptions> {
        let mut options = PgConnectOptions::from_str(database_url)
            .map_err(Error::Database)?
            .application_name(&self.application_name);
        if let Some(timeout) = self.statement_timeout {
            options = options.options([("statement_timeout", format!("{}ms", timeout.as_millis()))]);
        }
        Ok(options)
    }
}

/// Pool with [`PoolConfig::default`].
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();
    let options = config.connect_options(database_url)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        host = options.get_host(),
        database = options.get_database().unwrap_or("(default)"),
        max_connections = config.max_connections,
        statement_timeout_ms = config.statement_timeout.map(|t| t.as_millis() as u64),
        "Connecting to PostgreSQL"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect_with(options)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "PostgreSQL pool ready"
    );
    Ok(pool)
}

/// Log pool occupancy. Warns once every connection is checked out.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();
    let in_use = (size as usize).saturating_sub(idle);

    if size > 0 && idle == 0 {
        warn!(
            subsystem = "db",
            component = "pool",
            pool_size = size,
            in_use,
            "All pooled connections are in use"
        );
    } else {
        debug!(subsystem = "db", component = "pool", pool_size = size, in_use, "Pool usage");
    }
}
