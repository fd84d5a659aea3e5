//! Pooled access to one hot-tier Redis server
//!
//! A [`RedisPool`] owns a single multiplexed connection. A semaphore caps the
//! number of commands in flight, and a connection that drops is re-dialed
//! lazily by the next command.
//!
//! # Example
//!
//! ```rust,no_run
//! use kuba_graphite::redis::{RedisConfig, RedisPool};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RedisConfig::new("redis://cache-1:6379/0")
//!     .max_in_flight(32)
//!     .command_timeout(Duration::from_millis(500));
//!
//! let shard = RedisPool::new(config).await?;
//! shard.ping().await?;
//! # Ok(())
//! # }
//! ```

use super::util::{sanitize_url, storage_error};
use crate::engine::retry::RetryPolicy;
use crate::error::StorageError;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, warn};

/// Upper bound for `max_in_flight`
const MAX_IN_FLIGHT_LIMIT: u32 = 1000;

/// Settings for one hot shard
#[derive(Clone, Debug)]
pub struct RedisConfig {
    /// `redis://[:password@]host:port/db`, or `rediss://` with TLS
    pub url: String,
    /// Commands allowed in flight at once (`HOT_POOL_SIZE`)
    pub max_in_flight: u32,
    /// Budget for dialing the server
    pub dial_timeout: Duration,
    /// Budget for a single command or pipeline
    pub command_timeout: Duration,
    /// Backoff for retriable failures
    pub retry: RetryPolicy,
    /// Whether the URL must use `rediss://`
    pub tls: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new("redis://localhost:6379/0")
    }
}

impl RedisConfig {
    /// Shard at `url` with default limits
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_in_flight: 10,
            dial_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            tls: false,
        }
    }

    /// Cap on concurrent commands
    pub fn max_in_flight(mut self, limit: u32) -> Self {
        self.max_in_flight = limit;
        self
    }

    /// Dial budget
    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Per-command budget
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Backoff policy
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Require TLS; needs the `redis-tls` feature
    pub fn tls(mut self, enabled: bool) -> Self {
        self.tls = enabled;
        self
    }

    /// Reject settings the pool cannot honour
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.url.trim().is_empty() {
            return Err(StorageError::backend("hot shard URL is empty"));
        }
        if self.max_in_flight == 0 || self.max_in_flight > MAX_IN_FLIGHT_LIMIT {
            return Err(StorageError::backend(format!(
                "hot shard in-flight limit must be within 1..={MAX_IN_FLIGHT_LIMIT}, got {}",
                self.max_in_flight
            )));
        }
        if cfg!(not(feature = "redis-tls")) && self.tls {
            return Err(StorageError::backend(
                "TLS requested for the hot tier but the redis-tls feature is disabled",
            ));
        }
        if self.tls != self.url.starts_with("rediss://") {
            return Err(StorageError::backend(format!(
                "scheme of {} does not match tls = {}",
                sanitize_url(&self.url),
                self.tls
            )));
        }
        Ok(())
    }
}

/// One hot shard: a shared connection plus a concurrency limit
pub struct RedisPool {
    client: Client,
    conn: RwLock<Option<MultiplexedConnection>>,
    permits: Arc<Semaphore>,
    config: RedisConfig,
    /// Sanitized URL for log lines
    label: String,
}

impl RedisPool {
    /// Validate `config` and dial the server once
    pub async fn new(config: RedisConfig) -> Result<Self, StorageError> {
        config.validate()?;
        let client =
            Client::open(config.url.as_str()).map_err(|e| storage_error(&config.url, &e))?;

        let shard = Self {
            client,
            conn: RwLock::new(None),
            permits: Arc::new(Semaphore::new(config.max_in_flight as usize)),
            label: sanitize_url(&config.url),
            config,
        };
        shard.dial().await?;
        debug!(shard = %shard.label, in_flight = shard.config.max_in_flight, "hot shard ready");
        Ok(shard)
    }

    async fn dial(&self) -> Result<MultiplexedConnection, StorageError> {
        let started = Instant::now();
        let conn = match tokio::time::timeout(
            self.config.dial_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(storage_error(&self.config.url, &e)),
            Err(_) => {
                return Err(StorageError::timeout(format!(
                    "dialing {} took longer than {:?}",
                    self.label, self.config.dial_timeout
                )))
            }
        };

        *self.conn.write().await = Some(conn.clone());
        debug!(shard = %self.label, elapsed = ?started.elapsed(), "dialed hot shard");
        Ok(conn)
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StorageError> {
        if let Some(conn) = self.conn.read().await.as_ref() {
            return Ok(conn.clone());
        }
        self.dial().await
    }

    /// Run `command` on the shard under the in-flight limit
    ///
    /// Every attempt gets a fresh clone of the connection and its own
    /// timeout. Retriable failures back off per the configured policy, and a
    /// dropped connection is discarded so the next attempt re-dials.
    pub async fn execute<F, Fut, T>(&self, command: F) -> Result<T, StorageError>
    where
        F: Fn(MultiplexedConnection) -> Fut,
        Fut: Future<Output = Result<T, RedisError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| StorageError::backend(format!("hot shard {} is closed", self.label)))?;

        let mut attempt = 0;
        loop {
            let conn = self.connection().await?;
            let failure = match tokio::time::timeout(self.config.command_timeout, command(conn)).await {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(e)) => {
                    if e.is_connection_dropped() || e.is_io_error() {
                        *self.conn.write().await = None;
                    }
                    storage_error(&self.config.url, &e)
                }
                Err(_) => StorageError::timeout(format!(
                    "command on {} took longer than {:?}",
                    self.label, self.config.command_timeout
                )),
            };

            if !failure.is_retriable() || !self.config.retry.allows_retry(attempt) {
                return Err(failure);
            }
            let delay = self.config.retry.backoff(attempt);
            warn!(
                shard = %self.label,
                attempt = attempt + 1,
                ?delay,
                error = %failure,
                "hot shard command failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Round trip a PING
    pub async fn ping(&self) -> Result<(), StorageError> {
        self.execute(|mut conn| async move { redis::cmd("PING").query_async::<String>(&mut conn).await })
            .await
            .map(drop)
    }

    /// Sanitized URL of this shard
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Settings the shard was built with
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}
