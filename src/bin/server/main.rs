//! Kuba Graphite HTTP Server
//!
//! # Endpoints
//!
//! - `GET|POST /render` - Graphite render API (JSON)
//! - `POST /datapoints` - Insert datapoints for one metric
//! - `GET /ping` - Hot store reachability
//! - `GET /inspect` - Build info, retention ladder and effective config
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `--config <path>`
//! 2. `GRAPHITE_CONFIG` environment variable (path to TOML file)
//! 3. `./graphite.toml` in current directory
//! 4. Default configuration
//!
//! Environment variables (`PORT`, `HOT_ADDRS`, `COLD_TABLE_NAME`, ...) override
//! the file.
//!
//! # Exit codes
//!
//! `0` clean shutdown, `1` bad command line, `2` bad configuration,
//! `3` shutdown failure, `-1` storage initialization failure.

use clap::Parser;
use kuba_graphite::{
    api::{build_router, AppState},
    config::{ApplicationConfig, HotBackend},
    engine::stubs::{InMemoryHashStore, InMemoryWideColumnStore},
    engine::traits::{HashStore, WideColumnStore},
    redis::RedisHashStore,
    storage::{Storage, StorageBuilder},
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_OK: i32 = 0;
const EXIT_USAGE: i32 = 1;
const EXIT_CONFIG: i32 = 2;
const EXIT_SHUTDOWN: i32 = 3;
const EXIT_STORAGE: i32 = -1;

// =============================================================================
// CLI Definition
// =============================================================================

/// Kuba Graphite - Graphite-compatible time-series front-end
#[derive(Parser, Debug)]
#[command(name = "kuba-graphite")]
#[command(disable_version_flag = true)]
#[command(about = "Graphite-compatible query front-end over Redis and a wide-column store", long_about = None)]
struct Cli {
    /// Listen port (overrides PORT and the config file)
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Path to configuration file (overrides GRAPHITE_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print version and build to stderr and exit
    #[arg(short = 'v', long)]
    version: bool,
}

impl Cli {
    /// Flags that override the loaded configuration
    fn apply_to(&self, config: &mut ApplicationConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

fn version_line() -> String {
    format!(
        "{} version {}, build {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    )
}

// =============================================================================
// Startup
// =============================================================================

fn init_tracing(config: &ApplicationConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn init_storage(config: &ApplicationConfig) -> kuba_graphite::Result<Storage> {
    let hot: Arc<dyn HashStore> = match config.hot.backend {
        HotBackend::Redis => {
            let redis = config.redis_configs()?;
            Arc::new(RedisHashStore::connect(redis).await?)
        }
        HotBackend::Memory => {
            warn!("Using in-memory hot store, data is lost on restart");
            Arc::new(InMemoryHashStore::new())
        }
    };

    if let Some(endpoint) = &config.cold.endpoint {
        warn!(endpoint = %endpoint, "No wide-column driver is built in, endpoint ignored");
    }
    warn!(
        region = %config.cold.region,
        "Using in-memory cold store, data is lost on restart"
    );
    let cold: Arc<dyn WideColumnStore> = Arc::new(InMemoryWideColumnStore::new());

    StorageBuilder::new()
        .with_hot_store(hot)
        .with_cold_store(cold)
        .with_options(config.storage_options())
        .build()
        .await
}

/// Graceful shutdown signal handler
///
/// A failed handler installation logs a warning and never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler installation failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler installation failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn run(cli: Cli) -> i32 {
    let config = match ApplicationConfig::discover(cli.config.as_deref(), |c| cli.apply_to(c)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return EXIT_CONFIG;
        }
    };

    init_tracing(&config);
    info!(version = %version_line(), "Starting server");

    let storage = match init_storage(&config).await {
        Ok(storage) => storage,
        Err(e) => {
            error!(error = %e, "Storage initialization failed");
            return EXIT_STORAGE;
        }
    };

    let grace = config.shutdown_timeout();
    let addr = format!("{}:{}", config.server.listen_addr, config.server.port);
    let config = Arc::new(config);
    let state = match AppState::new(storage, config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!(error = %e, "Invalid server configuration");
            return EXIT_CONFIG;
        }
    };

    let addr: SocketAddr = match addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(addr = %addr, error = %e, "Invalid listen address");
            return EXIT_CONFIG;
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %addr, error = %e, "Failed to bind");
            return EXIT_CONFIG;
        }
    };
    info!(addr = %addr, "Listening");

    let stop = Arc::new(Notify::new());
    let server = axum::serve(listener, build_router(state)).with_graceful_shutdown({
        let stop = Arc::clone(&stop);
        async move { stop.notified().await }
    });
    let mut handle = tokio::spawn(server.into_future());

    tokio::select! {
        finished = &mut handle => {
            error!(result = ?finished, "Server stopped unexpectedly");
            return EXIT_SHUTDOWN;
        }
        _ = shutdown_signal() => {}
    }

    stop.notify_one();
    match tokio::time::timeout(grace, handle).await {
        Ok(Ok(Ok(()))) => {
            info!("Server shutdown complete");
            EXIT_OK
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "Server error during shutdown");
            EXIT_SHUTDOWN
        }
        Ok(Err(e)) => {
            error!(error = %e, "Server task failed");
            EXIT_SHUTDOWN
        }
        Err(_) => {
            error!(timeout = ?grace, "In-flight requests did not finish in time");
            EXIT_SHUTDOWN
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_OK };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if cli.version {
        eprintln!("{}", version_line());
        std::process::exit(EXIT_OK);
    }

    std::process::exit(run(cli).await);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from(["kuba-graphite", "-P", "9000", "-c", "g.toml"]).unwrap();
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.config, Some(PathBuf::from("g.toml")));
        assert!(!cli.version);

        let cli = Cli::try_parse_from(["kuba-graphite", "--version"]).unwrap();
        assert!(cli.version);
    }

    #[test]
    fn test_bad_flags_are_usage_errors() {
        let err = Cli::try_parse_from(["kuba-graphite", "--port", "x"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_port_flag_is_validated() {
        let cli = Cli::try_parse_from(["kuba-graphite", "--port", "0"]).unwrap();
        let mut config = ApplicationConfig::default();
        cli.apply_to(&mut config);
        assert_eq!(config.server.port, 0);
        assert!(config.validate().is_err());

        let cli = Cli::try_parse_from(["kuba-graphite", "-P", "9001"]).unwrap();
        let mut config = ApplicationConfig::default();
        cli.apply_to(&mut config);
        assert_eq!(config.server.port, 9001);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_version_line() {
        assert!(version_line().starts_with("kuba-graphite version "));
        assert!(version_line().contains(", build "));
    }
}
