//! WebSocket server: bootstrap, accept loop, and per-connection read loop.
//!
//! This module is responsible for:
//!
//! 1. Allocating a port from the configured candidate range.
//! 2. Binding the TCP listener and printing the endpoint report to stdout.
//! 3. Accepting host connections and upgrading them to WebSocket sessions,
//!    each new connection superseding the previous one in the [`Session`]
//!    slot.
//! 4. Running the read loop per connection: decode each frame, record its
//!    metadata, dispatch its payload, and spawn the handler as its own task.
//! 5. Exiting cleanly when the shared `running` flag is cleared.
//!
//! # One frame, one task
//!
//! Frames are decoded and dispatched in arrival order, but every handler
//! invocation runs on a spawned Tokio task.  A handler that waits on I/O or
//! sleeps never delays receipt of the next frame; hosts observe responses in
//! completion order and correlate them by metadata.
//!
//! # Failure isolation
//!
//! A frame that fails to decode, or that names an unregistered action, is
//! logged and dropped — the connection and the process carry on.  The only
//! fatal condition in this module is bootstrap failure (no bindable port,
//! listener bind error), which surfaces as an error from [`run_server`].

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async_with_config,
    tungstenite::{protocol::WebSocketConfig, Error as WsError, Message},
};
use tracing::{debug, error, info, warn};

use scriptlink_core::decode;

use crate::application::context::ResponseSink;
use crate::application::registry::ActionRegistry;
use crate::domain::config::WorkerConfig;
use crate::infrastructure::port::find_available_port;
use crate::infrastructure::session::Session;

// ── Public API ────────────────────────────────────────────────────────────────

/// Runs the worker: allocate a port, bind, report the endpoint, and accept
/// host connections until `running` is cleared.
///
/// # Errors
///
/// Returns an error if no port in the configured range is available or the
/// listener cannot be bound — the fatal bootstrap conditions.  Everything
/// after bootstrap is logged and survived.
pub async fn run_server(
    config: WorkerConfig,
    registry: Arc<ActionRegistry>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let (listener, addr) = bind_worker_listener(&config).await?;
    report_endpoint(&config.bind_host, addr.port());
    accept_loop(listener, registry, Arc::new(Session::new()), running).await
}

/// Allocates a port from the candidate range and binds the listener on it.
///
/// Exposed separately from [`run_server`] so integration tests can bind
/// first, learn the address, and then drive [`accept_loop`] themselves.
///
/// # Errors
///
/// Returns an error when the range is exhausted, or when the real bind loses
/// the (accepted, rare) race against another process grabbing the probed
/// port.
pub async fn bind_worker_listener(
    config: &WorkerConfig,
) -> anyhow::Result<(TcpListener, SocketAddr)> {
    let port = find_available_port(
        &config.bind_host,
        config.port_range_start,
        config.port_range_end,
    )?;

    let listener = TcpListener::bind((config.bind_host.as_str(), port))
        .await
        .with_context(|| format!("failed to bind listener on {}:{port}", config.bind_host))?;
    let addr = listener.local_addr()?;

    info!("worker listening on {addr}");
    Ok((listener, addr))
}

/// Accepts host connections until `running` is cleared.
///
/// Each accepted connection runs in its own Tokio task and attaches itself
/// to `session`, superseding the previous connection.  The accept loop
/// itself never blocks on a connection's lifetime.
pub async fn accept_loop(
    listener: TcpListener,
    registry: Arc<ActionRegistry>,
    session: Arc<Session>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        // Check the shutdown flag before each accept attempt.
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A short timeout on accept() lets the loop re-check the `running`
        // flag even when no host is connecting.
        let accept_result = timeout(Duration::from_millis(200), listener.accept()).await;

        match accept_result {
            Ok(Ok((stream, peer_addr))) => {
                info!("host connected from {peer_addr}");
                let registry = Arc::clone(&registry);
                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    handle_host_connection(stream, peer_addr, registry, session).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error; log and keep serving.
                error!("accept error: {e}");
            }
            Err(_) => {
                // Poll timeout — loop back to check the `running` flag.
            }
        }
    }

    Ok(())
}

// ── Endpoint report ───────────────────────────────────────────────────────────

/// Prints the `Host:`/`Port:` endpoint report the external launcher reads
/// from the worker's stdout and relays to the host process.
///
/// Plain `println!` on purpose: this is machine-read wire output, not a log
/// line, and must not pick up tracing prefixes or filtering.
fn report_endpoint(host: &str, port: u16) {
    println!("Host: {host}\nPort: {port}\n");
}

// ── Per-connection lifecycle ──────────────────────────────────────────────────

/// Top-level handler for one host connection: wraps [`run_connection`] and
/// logs the outcome.
///
/// The outer/inner pair lets `run_connection` use `?` for the handshake
/// while closure and errors are logged here, where the task ends.
async fn handle_host_connection(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<ActionRegistry>,
    session: Arc<Session>,
) {
    match run_connection(raw_stream, peer_addr, registry, session).await {
        Ok(()) => info!("connection {peer_addr} closed"),
        Err(e) => warn!("connection {peer_addr} ended with error: {e:#}"),
    }
}

/// Runs the complete lifecycle of one host connection.
///
/// 1. Completes the WebSocket upgrade handshake (no message-size cap —
///    payloads are caller-defined and may be large).
/// 2. Attaches an outbound channel to the shared [`Session`], superseding
///    any previous connection, and spawns the writer task that drains it.
/// 3. Reads frames until the transport closes, dispatching each one.
/// 4. Detaches from the session (if still the owner) and lets the writer
///    drain out.
///
/// Transport closure is the normal end of a connection, not an error.
async fn run_connection(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<ActionRegistry>,
    session: Arc<Session>,
) -> anyhow::Result<()> {
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = None;
    ws_config.max_frame_size = None;

    let ws_stream = accept_async_with_config(raw_stream, Some(ws_config))
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    debug!("WebSocket session established: {peer_addr}");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // Outbound channel: handlers queue responses through the Session slot;
    // the writer task drains them onto this connection's sink.  The channel
    // decouples handler completion from socket backpressure.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
    session.attach(out_tx.clone());

    let writer_task = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            if let Err(e) = ws_tx.send(message).await {
                debug!("connection {peer_addr}: write failed: {e}");
                break;
            }
        }
    });

    // ── Read loop ─────────────────────────────────────────────────────────────
    //
    // One frame at a time, in arrival order.  Handlers are spawned, so the
    // next frame is read as soon as the current one is dispatched.
    while let Some(frame) = ws_rx.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(WsError::ConnectionClosed | WsError::Protocol(_)) => {
                info!("connection {peer_addr}: host closed the connection");
                break;
            }
            Err(e) => {
                warn!("connection {peer_addr}: read error: {e}");
                break;
            }
        };

        match frame {
            Message::Text(raw) => handle_frame(&raw, &registry, &session, peer_addr),

            Message::Binary(bytes) => {
                // Some host bindings send text payloads as binary frames;
                // the tolerant codec handles the lossy conversion's noise.
                let raw = String::from_utf8_lossy(&bytes);
                handle_frame(&raw, &registry, &session, peer_addr);
            }

            Message::Ping(data) => {
                // Protocol-level ping; tungstenite queues the pong itself.
                debug!("connection {peer_addr}: ping ({} bytes)", data.len());
            }

            Message::Pong(_) => {
                debug!("connection {peer_addr}: pong received");
            }

            Message::Close(_) => {
                info!("connection {peer_addr}: close frame received");
                break;
            }

            Message::Frame(_) => {
                debug!("connection {peer_addr}: raw frame (ignored)");
            }
        }
    }

    // Give the slot back unless a newer connection already took it, then
    // drop our sender so the writer drains its queue and exits.
    session.detach(&out_tx);
    drop(out_tx);
    let _ = writer_task.await;

    Ok(())
}

// ── Frame handling ────────────────────────────────────────────────────────────

/// Processes one inbound frame: decode, record metadata, dispatch, spawn.
///
/// All failure modes are logged and dropped; one bad frame never ends the
/// connection.
fn handle_frame(
    raw: &str,
    registry: &Arc<ActionRegistry>,
    session: &Arc<Session>,
    peer_addr: SocketAddr,
) {
    let envelope = match decode(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("connection {peer_addr}: dropping frame: {e}");
            return;
        }
    };

    // Record the request's metadata before dispatch so every response this
    // invocation emits can quote it.
    if let Err(e) = registry.record_metadata(&envelope.action, envelope.metadata) {
        warn!("connection {peer_addr}: dropping frame: {e}");
        return;
    }

    let sink = Arc::clone(session) as Arc<dyn ResponseSink>;
    match registry.dispatch(&envelope.action, envelope.data, sink) {
        Ok(handler) => {
            debug!("connection {peer_addr}: dispatching '{}'", envelope.action);
            tokio::spawn(handler);
        }
        Err(e) => {
            warn!("connection {peer_addr}: dropping frame: {e}");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
