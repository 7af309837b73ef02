//! ScriptLink worker — entry point.
//!
//! This binary is the worker side of a ScriptLink deployment: an external
//! launcher starts it, reads the `Host:`/`Port:` endpoint report from its
//! stdout, and hands the endpoint to the host application, which then opens
//! the single WebSocket connection and starts invoking actions.
//!
//! # Usage
//!
//! ```text
//! scriptlink-worker [OPTIONS]
//!
//! Options:
//!   --bind-host <HOST>          Host/interface to bind [default: 127.0.0.1]
//!   --port-range-start <PORT>   First candidate port, inclusive [default: 61550]
//!   --port-range-end <PORT>     End of the candidate range, exclusive [default: 62000]
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence when both are present.
//!
//! | Variable                      | Default     | Description                  |
//! |-------------------------------|-------------|------------------------------|
//! | `SCRIPTLINK_BIND_HOST`        | `127.0.0.1` | Bind host/interface          |
//! | `SCRIPTLINK_PORT_RANGE_START` | `61550`     | First candidate port         |
//! | `SCRIPTLINK_PORT_RANGE_END`   | `62000`     | End of candidate range       |
//!
//! # Lifecycle
//!
//! The worker runs until it receives Ctrl+C (SIGINT), then closes the
//! listener, lets spawned handlers finish or fail their sends quietly, and
//! exits 0.  The one fatal startup condition — no bindable port in the
//! candidate range — exits non-zero.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::ensure;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scriptlink_worker::application::ActionRegistry;
use scriptlink_worker::demo::register_demo_actions;
use scriptlink_worker::domain::WorkerConfig;
use scriptlink_worker::infrastructure::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// ScriptLink action-RPC worker.
///
/// Binds a port from the candidate range, reports the endpoint on stdout,
/// and serves actions to the host application over one WebSocket connection.
#[derive(Debug, Parser)]
#[command(
    name = "scriptlink-worker",
    about = "Single-connection action-RPC worker for ScriptLink embedding hosts",
    version
)]
struct Cli {
    /// Host or interface to bind the listener to.
    ///
    /// The worker normally serves a host process on the same machine, so the
    /// default is loopback.
    #[arg(long, default_value = "127.0.0.1", env = "SCRIPTLINK_BIND_HOST")]
    bind_host: String,

    /// First candidate port, inclusive.
    #[arg(long, default_value_t = 61550, env = "SCRIPTLINK_PORT_RANGE_START")]
    port_range_start: u16,

    /// End of the candidate port range, exclusive.
    #[arg(long, default_value_t = 62000, env = "SCRIPTLINK_PORT_RANGE_END")]
    port_range_end: u16,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`WorkerConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the candidate range is empty.
    fn into_worker_config(self) -> anyhow::Result<WorkerConfig> {
        ensure!(
            self.port_range_start < self.port_range_end,
            "empty candidate port range: {}..{}",
            self.port_range_start,
            self.port_range_end
        );

        Ok(WorkerConfig {
            bind_host: self.bind_host,
            port_range_start: self.port_range_start,
            port_range_end: self.port_range_end,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log level is controlled by `RUST_LOG`; `info` when absent or invalid.
    // Logs go to stderr so the stdout endpoint report stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.into_worker_config()?;

    // Registration happens here, before the server loop starts; afterwards
    // the registry is shared read-only.
    let mut registry = ActionRegistry::new();
    register_demo_actions(&mut registry);
    info!(
        "registered {} actions: {}",
        registry.len(),
        registry.action_names().join(", ")
    );

    let registry = Arc::new(registry);

    // Shutdown flag: the Ctrl+C task clears it, the accept loop polls it.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C — shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    info!(
        "ScriptLink worker starting — bind={}, candidate ports {}..{}",
        config.bind_host, config.port_range_start, config.port_range_end
    );

    run_server(config, registry, running).await?;

    info!("ScriptLink worker stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
