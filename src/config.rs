//! Configuration management
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, `GRAPHITE_CONFIG`, or `./graphite.toml`)
//! 3. environment variables (`PORT`, `HOT_ADDRS`, `COLD_TABLE_NAME`, ...)
//!
//! The result is validated once and treated as read-only afterwards.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 8080
//! shutdown_timeout_secs = 10
//!
//! [hot]
//! backend = "redis"
//! addrs = ["cache-1:6379", "cache-2:6379"]
//! pool_size = 16
//!
//! [cold]
//! table_name = "graphite"
//! ttl = true
//!
//! [query]
//! render_timeout_secs = 30
//! timezone = "+09:00"
//! ```

use crate::error::{Error, Result};
use crate::redis::util::connection_url;
use crate::redis::RedisConfig;
use crate::storage::StorageOptions;
use crate::timeparser::{parse_location, parse_time_offset};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "GRAPHITE_CONFIG";

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "graphite.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ApplicationConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Hot tier settings
    pub hot: HotConfig,
    /// Cold tier settings
    pub cold: ColdConfig,
    /// Query settings
    pub query: QueryConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: String,
    /// Listen port
    pub port: u16,
    /// Grace period for in-flight requests on shutdown
    pub shutdown_timeout_secs: u64,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Forces the `debug` log level
    pub debug: bool,
    /// CORS origins; empty allows any origin
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_secs: 10,
            log_level: "info".to_string(),
            debug: false,
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// Which hot backend to run
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HotBackend {
    /// Redis servers from `addrs`
    #[default]
    Redis,
    /// Process-local map, data is lost on restart
    Memory,
}

impl std::str::FromStr for HotBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(HotBackend::Redis),
            "memory" | "in-memory" => Ok(HotBackend::Memory),
            other => Err(Error::Configuration(format!(
                "unknown hot backend {other:?}, expected redis or memory"
            ))),
        }
    }
}

/// Hot tier settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HotConfig {
    /// Backend kind
    pub backend: HotBackend,
    /// `host:port` of every server in the ring
    pub addrs: Vec<String>,
    /// Shared password, if any
    pub password: Option<String>,
    /// Database index
    pub db: u32,
    /// In-flight commands per server
    pub pool_size: u32,
    /// Use `rediss://`
    pub tls: bool,
    /// Connect timeout in milliseconds
    pub connection_timeout_ms: u64,
    /// Command timeout in milliseconds
    pub command_timeout_ms: u64,
    /// Names per pipelined read
    pub batch_limit: usize,
}

impl Default for HotConfig {
    fn default() -> Self {
        Self {
            backend: HotBackend::Redis,
            addrs: vec!["localhost:6379".to_string()],
            password: None,
            db: 0,
            pool_size: 10,
            tls: false,
            connection_timeout_ms: 5_000,
            command_timeout_ms: 1_000,
            batch_limit: 50,
        }
    }
}

/// Cold tier settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ColdConfig {
    /// Region of the wide-column service
    pub region: String,
    /// Table holding every metric
    pub table_name: String,
    /// Provisioned read capacity
    pub read_capacity: u64,
    /// Provisioned write capacity
    pub write_capacity: u64,
    /// Endpoint override, for local emulators
    pub endpoint: Option<String>,
    /// Write a TTL attribute on every item
    pub ttl: bool,
    /// Names per batched read
    pub batch_limit: usize,
    /// Per-attempt call timeout in seconds
    pub call_timeout_secs: u64,
}

impl Default for ColdConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            table_name: "metrics".to_string(),
            read_capacity: 5,
            write_capacity: 5,
            endpoint: None,
            ttl: false,
            batch_limit: 100,
            call_timeout_secs: 10,
        }
    }
}

/// Query settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    /// Budget for one `/render` evaluation, in seconds
    pub render_timeout_secs: u64,
    /// Zone for absolute `from`/`until` values
    pub timezone: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            render_timeout_secs: 30,
            timezone: "UTC".to_string(),
        }
    }
}

impl ApplicationConfig {
    /// Parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
            .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))
    }

    /// Parse TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Configuration(format!("invalid TOML: {e}")))
    }

    /// Locate, load, override and validate
    ///
    /// `explicit` wins over `GRAPHITE_CONFIG`, which wins over
    /// `./graphite.toml`. Without any file the defaults are used. The
    /// environment is applied first, then `customize` (command-line flags),
    /// and validation runs last so no override escapes it.
    pub fn discover(explicit: Option<&Path>, customize: impl FnOnce(&mut Self)) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(|| {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                local.exists().then_some(local)
            });

        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        customize(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Server
        if let Some(v) = var("PORT") {
            self.server.port = parse_number("PORT", &v)?;
        }
        if let Some(v) = var("SHUTDOWN_TIMEOUT") {
            self.server.shutdown_timeout_secs = parse_seconds("SHUTDOWN_TIMEOUT", &v)?;
        }
        if let Some(v) = var("DEBUG") {
            self.server.debug = parse_bool("DEBUG", &v)?;
        }

        // Hot tier
        if let Some(v) = var("HOT_BACKEND") {
            self.hot.backend = v.parse()?;
        }
        if let Some(v) = var("HOT_ADDRS") {
            self.hot.addrs = v
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = var("HOT_PASSWORD") {
            self.hot.password = Some(v);
        }
        if let Some(v) = var("HOT_DB") {
            self.hot.db = parse_number("HOT_DB", &v)?;
        }
        if let Some(v) = var("HOT_POOL_SIZE") {
            self.hot.pool_size = parse_number("HOT_POOL_SIZE", &v)?;
        }

        // Cold tier
        if let Some(v) = var("COLD_REGION") {
            self.cold.region = v;
        }
        if let Some(v) = var("COLD_TABLE_NAME") {
            self.cold.table_name = v;
        }
        if let Some(v) = var("COLD_TABLE_RCU") {
            self.cold.read_capacity = parse_number("COLD_TABLE_RCU", &v)?;
        }
        if let Some(v) = var("COLD_TABLE_WCU") {
            self.cold.write_capacity = parse_number("COLD_TABLE_WCU", &v)?;
        }
        if let Some(v) = var("COLD_ENDPOINT") {
            self.cold.endpoint = Some(v);
        }
        if let Some(v) = var("COLD_TTL") {
            self.cold.ttl = parse_bool("COLD_TTL", &v)?;
        }

        // Query
        if let Some(v) = var("TIMEZONE") {
            self.query.timezone = v;
        }
        if let Some(v) = var("RENDER_TIMEOUT") {
            self.query.render_timeout_secs = parse_seconds("RENDER_TIMEOUT", &v)?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Configuration("server port cannot be 0".to_string()));
        }
        if self.hot.backend == HotBackend::Redis {
            if self.hot.addrs.is_empty() {
                return Err(Error::Configuration(
                    "at least one hot store address is required".to_string(),
                ));
            }
            if self.hot.pool_size == 0 || self.hot.pool_size > 1000 {
                return Err(Error::Configuration(
                    "hot pool size must be between 1 and 1000".to_string(),
                ));
            }
        }
        if self.hot.batch_limit == 0 || self.cold.batch_limit == 0 {
            return Err(Error::Configuration("batch limits must be > 0".to_string()));
        }
        if self.cold.table_name.trim().is_empty() {
            return Err(Error::Configuration("cold table name cannot be empty".to_string()));
        }
        if self.query.render_timeout_secs == 0 {
            return Err(Error::Configuration("render timeout must be > 0".to_string()));
        }
        self.location()?;
        Ok(())
    }

    /// Zone for absolute time arguments
    pub fn location(&self) -> Result<FixedOffset> {
        parse_location(&self.query.timezone)
            .map_err(|e| Error::Configuration(format!("TIMEZONE: {e}")))
    }

    /// Log filter for the subscriber when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &str {
        if self.server.debug {
            "debug"
        } else {
            &self.server.log_level
        }
    }

    /// `/render` evaluation budget
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.query.render_timeout_secs)
    }

    /// Shutdown grace period
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// One Redis pool config per hot address
    pub fn redis_configs(&self) -> Result<Vec<RedisConfig>> {
        self.hot
            .addrs
            .iter()
            .map(|addr| -> Result<RedisConfig> {
                let url = connection_url(addr, self.hot.password.as_deref(), self.hot.db, self.hot.tls)?;
                Ok(RedisConfig::new(url)
                    .max_in_flight(self.hot.pool_size)
                    .tls(self.hot.tls)
                    .dial_timeout(Duration::from_millis(self.hot.connection_timeout_ms))
                    .command_timeout(Duration::from_millis(self.hot.command_timeout_ms)))
            })
            .collect()
    }

    /// Storage tunables derived from the hot and cold sections
    pub fn storage_options(&self) -> StorageOptions {
        StorageOptions {
            table: self.cold.table_name.clone(),
            read_capacity: self.cold.read_capacity,
            write_capacity: self.cold.write_capacity,
            ttl_enabled: self.cold.ttl,
            hot_batch_limit: self.hot.batch_limit,
            cold_batch_limit: self.cold.batch_limit,
            cold_call_timeout: Duration::from_secs(self.cold.call_timeout_secs),
        }
    }

    /// Copy safe to log or expose, with the password masked
    pub fn sanitized(&self) -> Self {
        let mut copy = self.clone();
        if copy.hot.password.is_some() {
            copy.hot.password = Some("***".to_string());
        }
        copy
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Configuration(format!("{key}: {value:?} is not a valid number")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Configuration(format!("{key}: {value:?} is not a boolean"))),
    }
}

/// Whole seconds, either bare (`30`) or with a unit (`30s`, `2min`)
fn parse_seconds(key: &str, value: &str) -> Result<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(secs);
    }
    let secs = parse_time_offset(value)
        .map_err(|e| Error::Configuration(format!("{key}: {e}")))?;
    u64::try_from(secs)
        .map_err(|_| Error::Configuration(format!("{key}: {value:?} must not be negative")))
}
