//! `navbridge` – runs the navigation bridge from the command line.
//!
//! 1. Loads `~/.navbridge/config.toml` (or `$NAVBRIDGE_CONFIG`), applies
//!    `NAVBRIDGE_*` overrides and validates it.
//! 2. Drives the simulated tracking camera through the bridge at the
//!    configured rate.
//! 3. Writes every outbound message to stdout as one JSON line and reads
//!    resync requests from stdin, one JSON object per line.
//! 4. Stops cleanly on **Ctrl-C**.
//!
//! `navbridge init` writes a default config file and exits.
//!
//! Logs and the banner go to stderr so stdout stays machine-readable.

mod config;
mod stdio;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use navbridge_hal::SimTrackingCamera;
use navbridge_middleware::{EventBus, Transport};
use navbridge_runtime::{LoopStats, NavBridge, init_tracing};
use navbridge_types::NavError;
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// How long runtime shutdown waits for blocked stdin reads.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// How long the stdout writer may take to drain after shutdown.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    let _telemetry = init_tracing("navbridge");
    print_banner();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => {}
        Some("init") => return init_config(),
        Some("-h" | "--help" | "help") => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Some(other) => {
            eprintln!("{}: unknown argument '{other}'", "error".red().bold());
            print_usage();
            return ExitCode::FAILURE;
        }
    }

    let cfg = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    // ── Shutdown signal ───────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let ctrlc_tx = shutdown_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        ctrlc_tx.send_replace(true);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; stop the bridge by closing its process");
    }

    let result = runtime.block_on(run(cfg, shutdown_tx, shutdown_rx));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);

    match result {
        Ok(stats) => {
            info!(
                ticks = stats.ticks,
                complete = stats.complete,
                aborted = stats.aborted,
                no_data = stats.no_data,
                faulted = stats.faulted,
                "navbridge exited"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "navbridge stopped with an error");
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bridge
// ─────────────────────────────────────────────────────────────────────────────

async fn run(
    cfg: config::Config,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown: watch::Receiver<bool>,
) -> Result<LoopStats, NavError> {
    let sampling = cfg.sampling_config()?;
    let bus = EventBus::default();
    let transport: Arc<dyn Transport> = Arc::new(bus);

    let writer = stdio::spawn_outbound(transport.as_ref(), tokio::io::stdout(), shutdown.clone());
    let reader = tokio::spawn(stdio::pump_resync_lines(
        BufReader::new(tokio::io::stdin()),
        transport.clone(),
        shutdown.clone(),
    ));

    let camera = SimTrackingCamera::new("sim", sampling.camera_axes, sampling.frequency_hz, cfg.sim);
    let bridge = NavBridge::new(&sampling, camera, transport)?;
    info!(
        frequency_hz = sampling.frequency_hz,
        continuous_sync = sampling.continuous_sync,
        axes = ?sampling.camera_axes,
        "navbridge running; resync requests are read from stdin"
    );
    let result = bridge.run(shutdown).await;

    // Stop the stdio tasks too when the bridge ended on its own.
    shutdown_tx.send_replace(true);
    reader.abort();
    match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await {
        Ok(Ok(lines)) => info!(lines, "output stream closed"),
        Ok(Err(e)) => warn!(error = %e, "output task failed"),
        Err(_) => warn!("output stream did not drain in time"),
    }

    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

fn load_config() -> Result<config::Config, NavError> {
    let path = config::config_path();
    let mut cfg = match config::load_from(&path)? {
        Some(cfg) => {
            info!(path = %path.display(), "config loaded");
            cfg
        }
        None => {
            info!(path = %path.display(), "no config file; using defaults");
            config::Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);
    cfg.sampling_config()?;
    Ok(cfg)
}

fn init_config() -> ExitCode {
    let path = config::config_path();
    if path.exists() {
        eprintln!(
            "  Config already exists at {}; leaving it unchanged.",
            path.display().to_string().bold()
        );
        return ExitCode::SUCCESS;
    }
    match config::save_to(&config::Config::default(), &path) {
        Ok(()) => {
            eprintln!(
                "  {} Config written to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {e}", "Error saving config".red());
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    eprintln!();
    eprintln!(
        "  {} {}",
        "navbridge".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    eprintln!("  Visual-inertial odometry to NED navigation bridge");
    eprintln!();
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  {}        run the bridge with the simulated camera", "navbridge".bold());
    eprintln!("  {}   write a default config file", "navbridge init".bold());
}
