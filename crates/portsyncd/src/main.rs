// # portsyncd - Port Sync Daemon
//
// This is a THIN integration layer. All sync logic lives in portsync-core.
//
// The portsyncd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the port source and the qBittorrent client
// 4. Running the sync loop until SIGTERM/SIGINT
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### qBittorrent
// - `QB_HOST`: WebUI URL (default: http://localhost:8080)
// - `QB_USERNAME`: WebUI user (default: admin)
// - `QB_PASSWORD`: WebUI password (default: adminadmin)
// - `QB_AUTH_ENABLED`: Log in before changing the port (default: true)
// - `QB_TIMEOUT_SECS`: Per-request timeout (default: 10)
//
// ### Port Source
// - `PORT_FILE`: File the VPN client writes the forwarded port into (default: /app/port.dat)
//
// ### Loop
// - `CHECK_INTERVAL`: Seconds between port file reads (default: 10)
// - `HEALTH_CHECK_INTERVAL`: Seconds between health probes (default: CHECK_INTERVAL)
// - `DRY_RUN`: Log port changes instead of sending them (default: false)
//
// ### Logging
// - `LOG_LEVEL`: trace, debug, info, warn, error (default: INFO)
//
// ## Example
//
// ```bash
// export QB_HOST=http://qbittorrent:8080
// export QB_PASSWORD=your_password
// export PORT_FILE=/pia/port.dat
// export CHECK_INTERVAL=30
//
// portsyncd
// ```

use anyhow::{Context, Result};
use portsync_core::{AuthConfig, ClientConfig, PortSync, SourceConfig, SyncConfig};
use portsync_qbittorrent::QBittorrentClient;
use portsync_source_file::FilePortSource;
use std::env;
use std::future::Future;
use std::process::ExitCode;
use std::str::FromStr;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum PortsyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<PortsyncExitCode> for ExitCode {
    fn from(code: PortsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Log verbosity accepted in `LOG_LEVEL`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => anyhow::bail!(
                "LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                s
            ),
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    sync: SyncConfig,
    log_level: LogLevel,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value lookup
    ///
    /// Every value is parsed eagerly so a typo fails here, before the loop
    /// starts, instead of surfacing as a runtime error.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let auth_enabled = parse_bool("QB_AUTH_ENABLED", &get("QB_AUTH_ENABLED", "true"))?;
        let auth = if auth_enabled {
            AuthConfig::Credentials {
                username: get("QB_USERNAME", "admin"),
                password: get("QB_PASSWORD", "adminadmin"),
            }
        } else {
            AuthConfig::Disabled
        };

        let mut client = ClientConfig::new(get("QB_HOST", "http://localhost:8080")).with_auth(auth);
        client.timeout_secs = parse_secs("QB_TIMEOUT_SECS", &get("QB_TIMEOUT_SECS", "10"))?;
        client.dry_run = parse_bool("DRY_RUN", &get("DRY_RUN", "false"))?;

        let mut sync = SyncConfig::new(client, SourceConfig::new(get("PORT_FILE", "/app/port.dat")));
        sync.poll_interval_secs = parse_secs("CHECK_INTERVAL", &get("CHECK_INTERVAL", "10"))?;
        sync.health_check_interval_secs = match lookup("HEALTH_CHECK_INTERVAL") {
            Some(value) => parse_secs("HEALTH_CHECK_INTERVAL", &value)?,
            None => sync.poll_interval_secs,
        };

        let log_level = get("LOG_LEVEL", "INFO").parse()?;

        Ok(Self { sync, log_level })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.sync.validate()?;

        if let AuthConfig::Credentials { password, .. } = &self.sync.client.auth
            && password.is_empty()
        {
            anyhow::bail!(
                "QB_PASSWORD is empty while QB_AUTH_ENABLED=true. \
                Set QB_PASSWORD or disable authentication with QB_AUTH_ENABLED=false"
            );
        }

        Ok(())
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .with_context(|| format!("{} must be a whole number of seconds. Got: '{}'", key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => anyhow::bail!(
            "{} must be true or false (also 1/0, yes/no, on/off). Got: '{}'",
            key,
            value
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return PortsyncExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return PortsyncExitCode::ConfigError.into();
    }

    // Initialize tracing; file and line only help when debugging
    let verbose = matches!(config.log_level, LogLevel::Trace | LogLevel::Debug);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::from(config.log_level))
        .with_file(verbose)
        .with_line_number(verbose)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return PortsyncExitCode::ConfigError.into();
    }

    info!("Starting portsyncd");
    info!("qBittorrent host: {}", config.sync.client.base_url);
    info!("Port file: {}", config.sync.source.path.display());
    info!(
        "Authentication: {}",
        if config.sync.client.auth.is_enabled() { "enabled" } else { "disabled" }
    );

    // One cooperative loop; no worker threads needed
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return PortsyncExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> PortsyncExitCode {
    let client = match QBittorrentClient::from_config(&config.sync.client) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create qBittorrent client: {}", e);
            return PortsyncExitCode::ConfigError;
        }
    };
    let source = FilePortSource::from_config(&config.sync.source);

    let (mut sync, event_rx) =
        match PortSync::new(Box::new(source), Box::new(client), &config.sync) {
            Ok(parts) => parts,
            Err(e) => {
                error!("Failed to create sync loop: {}", e);
                return PortsyncExitCode::ConfigError;
            }
        };
    // The loop logs everything itself; events are for embedders
    drop(event_rx);

    let shutdown = match shutdown_signal() {
        Ok(shutdown) => shutdown,
        Err(e) => {
            error!("Daemon error: {}", e);
            return PortsyncExitCode::RuntimeError;
        }
    };

    sync.run_until(shutdown).await;

    info!("Shutting down daemon");
    PortsyncExitCode::CleanShutdown
}

/// Install handlers for SIGTERM and SIGINT
///
/// Handlers are installed up front so a failure is reported before the
/// loop starts. The returned future resolves with the signal name.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Wait for Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
            std::future::pending::<()>().await;
        }
        "SIGINT"
    })
}
