//! The single active transport slot.
//!
//! The worker talks to exactly one host connection at a time.  [`Session`]
//! owns that fact: it holds (at most) one outbound channel — the sender side
//! of the writer task of the currently active connection.  Accepting a new
//! connection [`attach`]es its channel, replacing the previous one; the read
//! loop [`detach`]es on exit, but only if the slot still belongs to it, so a
//! superseded connection's teardown never evicts its replacement.
//!
//! # Send semantics
//!
//! [`Session::send_text`] (the [`ResponseSink`] impl) resolves the slot and
//! queues the message under one short lock, so a send uses wholly the old or
//! wholly the new transport — never a torn mix — relative to a concurrent
//! `attach`.  A handler that outlives its own connection therefore delivers
//! to whichever connection is active when it emits; with no connection at
//! all the send fails with [`SendError::NotConnected`], and with a
//! connection whose writer has already shut down it fails with
//! [`SendError::ConnectionClosed`].  Callers log and drop both.
//!
//! [`attach`]: Session::attach
//! [`detach`]: Session::detach

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use crate::application::context::{ResponseSink, SendError};

/// Owner of the single active host connection.
///
/// Shared as `Arc<Session>` between the accept loop (which attaches), the
/// per-connection read loops (which detach), and every handler context
/// (which sends).
#[derive(Default)]
pub struct Session {
    /// Outbound channel of the active connection's writer task, or `None`
    /// while idle.
    active: Mutex<Option<UnboundedSender<Message>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `outbound` the active transport, superseding any previous one.
    ///
    /// The superseded connection is not closed here — its read loop keeps
    /// running until the peer goes away — but responses stop routing to it
    /// from this moment on.
    pub fn attach(&self, outbound: UnboundedSender<Message>) {
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(outbound);
        if previous.is_some() {
            info!("new host connection supersedes the previous one");
        }
    }

    /// Clears the slot if it still holds `outbound`'s channel.
    ///
    /// Called by a connection's read loop on exit.  When the connection was
    /// already superseded the slot belongs to its replacement and is left
    /// untouched.
    pub fn detach(&self, outbound: &UnboundedSender<Message>) {
        let mut slot = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if slot
            .as_ref()
            .is_some_and(|active| active.same_channel(outbound))
        {
            *slot = None;
            debug!("session idle: active connection detached");
        }
    }

    /// Whether a connection is currently attached.
    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl ResponseSink for Session {
    fn send_text(&self, text: String) -> Result<(), SendError> {
        // Resolve-and-queue under the slot lock: the message goes wholly to
        // whichever transport is active at this instant.
        let slot = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(outbound) => outbound
                .send(Message::Text(text))
                .map_err(|_| SendError::ConnectionClosed),
            None => Err(SendError::NotConnected),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
