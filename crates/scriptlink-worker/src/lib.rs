//! scriptlink-worker library crate.
//!
//! This crate implements the ScriptLink worker: a process that exposes named
//! *actions* to a host application over one persistent WebSocket connection.
//! The host sends JSON request envelopes; the worker dispatches them to
//! registered async handlers, which emit zero or more response envelopes back
//! on the same connection, tagged with the action name and the caller's
//! correlation metadata.
//!
//! # Architecture
//!
//! ```text
//! Host application (one WebSocket, JSON envelopes)
//!         ↕
//! [scriptlink-worker]
//!   ├── domain/           WorkerConfig (bind host, candidate port range)
//!   ├── application/      ActionRegistry, ActionContext, ResponseSink seam
//!   ├── infrastructure/
//!   │     ├── port/       candidate-range port allocator
//!   │     ├── session/    the single active transport slot
//!   │     └── ws_server/  bind, endpoint report, accept + read loops
//!   └── demo/             sample greet/greet2 actions for the binary
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no external dependencies (no I/O, no async, no frameworks).
//! - `application` depends on `domain` and `scriptlink-core` only; it never
//!   spawns tasks or touches sockets.
//! - `infrastructure` depends on all other layers plus `tokio` and
//!   `tungstenite`.
//!
//! # Connection model
//!
//! Exactly one host connection is active at a time.  Accepting a new
//! connection replaces the active transport; a handler still running from the
//! previous connection delivers its remaining responses to whichever
//! transport is active when it emits (or logs a dropped send when none is).
//! Hosts correlate responses by the echoed `__metadata__` value, not by
//! arrival order.

/// Domain layer: pure configuration types (no I/O).
pub mod domain;

/// Application layer: action registration, dispatch, and the outbound-send
/// primitive handed to handlers.
pub mod application;

/// Infrastructure layer: port allocation, the live session slot, and the
/// WebSocket server loops.
pub mod infrastructure;

/// Sample actions registered by the worker binary.
pub mod demo;
