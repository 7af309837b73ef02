//! Application layer for scriptlink-worker.
//!
//! The application layer owns the action model: which handlers exist, how an
//! inbound request reaches one, and how a handler emits responses.  It knows
//! *what* to do but delegates *how* — sockets, task spawning — to the
//! infrastructure layer behind the [`ResponseSink`] seam.
//!
//! # Responsibilities
//!
//! - [`ActionRegistry`]: name → handler mapping plus the per-action
//!   most-recently-received caller metadata.
//! - [`ActionContext`]: the per-invocation handle a handler uses to send
//!   tagged responses.
//! - [`DispatchError`] and [`SendError`]: the application-level failures.
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or listening for connections (infrastructure)
//! - Tokio task spawning — `dispatch` *returns* the handler future and the
//!   read loop spawns it, so dispatch initiation stays in arrival order
//!   while completion order is free
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod context;
pub mod registry;

pub use context::{ActionContext, ResponseSink, SendError};
pub use registry::{ActionRegistry, DispatchError, HandlerFuture};
