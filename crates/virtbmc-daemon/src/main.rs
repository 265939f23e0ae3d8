//! virtbmcd - the virtbmc daemon.
//!
//! Owns the instance pool and serves the controller API on a loopback
//! socket. On start it restarts every instance marked active unless
//! `--no-autostart` is given; on ctrl-c or SIGTERM it stops accepting
//! requests and stops every instance.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use virtbmc_control::{Controller, ControllerService, DriverRegistry};
use virtbmc_daemon::config::{
    DEFAULT_LISTEN_ADDR, DEFAULT_REQUEST_TIMEOUT_SECONDS, DEFAULT_STOP_GRACE_SECONDS,
    DEFAULT_WAKE_INTERVAL_MS,
};
use virtbmc_daemon::{create_router, DaemonConfig, DaemonState};
use virtbmc_store::{config_location, store_path, JsonStore};

/// Crates whose spans and events the default filter lets through.
const LOG_TARGETS: [&str; 5] = [
    "virtbmc_daemon",
    "virtbmc_control",
    "virtbmc_core",
    "virtbmc_store",
    "virtbmc_openstack",
];

/// Virtual BMC daemon.
#[derive(Debug, Parser)]
#[command(name = "virtbmcd", version, about)]
struct Args {
    /// Address the controller API listens on.
    #[arg(long, env = "VIRTBMC_LISTEN", default_value = DEFAULT_LISTEN_ADDR)]
    listen: String,

    /// Configuration location (default: /etc/virtbmc, then ~/.virtbmc).
    #[arg(long, env = "VIRTBMC_CONFIG")]
    config_dir: Option<PathBuf>,

    /// Do not restart instances marked active.
    #[arg(long)]
    no_autostart: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short = 'd', long)]
    debug: bool,

    /// Upper bound between stop checks of an idle serve loop, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_WAKE_INTERVAL_MS)]
    wake_interval_ms: u64,

    /// Seconds a stopping serve loop may take before it is aborted.
    #[arg(long, default_value_t = DEFAULT_STOP_GRACE_SECONDS)]
    stop_grace_seconds: u64,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECONDS)]
    request_timeout_seconds: u64,
}

impl From<Args> for DaemonConfig {
    fn from(args: Args) -> Self {
        Self {
            listen_addr: args.listen,
            data_dir: args.config_dir,
            autostart: !args.no_autostart,
            wake_interval_ms: args.wake_interval_ms,
            stop_grace_seconds: args.stop_grace_seconds,
            request_timeout_seconds: args.request_timeout_seconds,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(args.debug).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::env::var_os("NO_COLOR").is_none()),
        )
        .init();

    let config = DaemonConfig::from(args);
    tracing::info!("Starting virtbmc daemon");

    let location = match &config.data_dir {
        Some(dir) => dir.clone(),
        None => config_location()?,
    };
    let store_dir = store_path(&location);
    tracing::info!(path = %store_dir.display(), "Opening config store");
    let store = Arc::new(JsonStore::open(&store_dir)?);

    let registry = DriverRegistry::builtin();
    tracing::info!(drivers = ?registry.drivers(), "Drivers registered");
    let control = Arc::new(ControllerService::new(
        store,
        registry,
        &config.control_config(),
    ));

    if config.autostart {
        let report = control.recover().await;
        tracing::info!(
            recovered = report.recovered.len(),
            failed = report.failed.len(),
            "Recovery finished"
        );
    } else {
        tracing::info!("Autostart disabled, not recovering active bmcs");
    }

    let listen_addr = config.listen_addr.clone();
    let app = create_router(DaemonState::new(Arc::clone(&control), config));

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down, stopping all bmcs");
    control.shutdown().await;

    Ok(())
}

/// `warn` for dependencies, `info` (or `debug`) for the virtbmc crates.
fn default_filter(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    let mut directives = vec!["warn".to_string(), "tower_http=info".to_string()];
    directives.extend(LOG_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
