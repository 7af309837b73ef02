//! The per-invocation context handed to action handlers.
//!
//! A handler never names itself and never touches the transport.  Its
//! invocation wrapper binds the action name and the action's metadata slot
//! into an [`ActionContext`]; [`ActionContext::send`] builds the response
//! envelope — action name, payload, *currently stored* metadata — encodes
//! it, and hands the text to the [`ResponseSink`].
//!
//! # Metadata is read at emission time
//!
//! The metadata slot is shared with the registry and overwritten by every
//! inbound request for the action.  A handler that emits several responses
//! quotes whatever the slot holds at each emission; if a second request for
//! the same action arrives before the first handler finishes, the first
//! handler's later emissions carry the second request's metadata
//! (last-write-wins, the protocol's documented behavior).
//!
//! # Sends never propagate failure into handlers
//!
//! A handler racing a connection teardown must not crash the process: a
//! failed send is logged at `warn` and dropped.  No retry happens at this
//! layer; the host re-invokes the action if it cares.

use std::sync::{Arc, Mutex, PoisonError};

use scriptlink_core::{encode, Envelope};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

// ── Outbound seam ─────────────────────────────────────────────────────────────

/// Errors a [`ResponseSink`] can report for one outbound message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// No transport is currently active (the session is idle).
    #[error("no active connection")]
    NotConnected,

    /// The active transport closed before the message could be written.
    #[error("connection closed before the message could be written")]
    ConnectionClosed,
}

/// Destination for encoded response envelopes.
///
/// The live implementation is the infrastructure `Session` (the single
/// active WebSocket).  Tests substitute a recording sink, which is why the
/// dispatch path is expressed against this trait rather than a socket type.
pub trait ResponseSink: Send + Sync {
    /// Queues one encoded envelope for delivery on the active transport.
    fn send_text(&self, text: String) -> Result<(), SendError>;
}

// ── Action context ────────────────────────────────────────────────────────────

/// Per-invocation handle through which a handler emits responses.
///
/// Cheap to clone; handlers that fan work out across tasks can carry a clone
/// into each of them.
#[derive(Clone)]
pub struct ActionContext {
    /// Name of the action this invocation belongs to; stamped on every
    /// response envelope.
    action: String,

    /// The action's metadata slot, shared with the registry entry.
    metadata: Arc<Mutex<Value>>,

    /// Where encoded envelopes go.
    sink: Arc<dyn ResponseSink>,
}

impl ActionContext {
    pub(crate) fn new(
        action: String,
        metadata: Arc<Mutex<Value>>,
        sink: Arc<dyn ResponseSink>,
    ) -> Self {
        Self {
            action,
            metadata,
            sink,
        }
    }

    /// The name of the action this invocation was dispatched for.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Sends one response payload to the host.
    ///
    /// The envelope carries this invocation's action name and the metadata
    /// most recently recorded for it.  Failures (no active connection, or
    /// the connection closed underneath the handler) are logged and dropped,
    /// never propagated.
    pub fn send(&self, data: Value) {
        let metadata = self
            .metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let envelope = Envelope::new(self.action.clone(), data, metadata);
        let text = match encode(&envelope) {
            Ok(text) => text,
            Err(e) => {
                warn!("action '{}': failed to encode response: {e}", self.action);
                return;
            }
        };

        match self.sink.send_text(text) {
            Ok(()) => debug!("action '{}': response queued", self.action),
            Err(e) => warn!("action '{}': response dropped: {e}", self.action),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
