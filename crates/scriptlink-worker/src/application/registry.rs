//! Action registration and dispatch.
//!
//! The [`ActionRegistry`] is the worker's process-wide map from action names
//! to handlers.  It is populated by explicit [`register`] calls during
//! startup — before the server loop runs — and then shared immutably
//! (`Arc<ActionRegistry>`) across the connection lifetime.  The only mutable
//! state per entry is the action's metadata slot, which every inbound
//! request overwrites.
//!
//! # Dispatch returns a future
//!
//! [`dispatch`] looks up the handler, binds the action name, metadata slot,
//! and response sink into an [`ActionContext`], and returns the handler's
//! future *without running it*.  The read loop spawns the future as its own
//! task.  This split keeps two guarantees cheap:
//!
//! - dispatch initiation follows frame arrival order (the read loop calls
//!   `dispatch` synchronously, one frame at a time), and
//! - a slow handler never blocks receipt of further frames (its body runs
//!   on a spawned task, not inside the read loop).
//!
//! [`register`]: ActionRegistry::register
//! [`dispatch`]: ActionRegistry::dispatch

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use thiserror::Error;

use crate::application::context::{ActionContext, ResponseSink};

/// A handler invocation, boxed for storage behind one registry type.
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Type-erased handler: one payload in, responses out via the context.
type HandlerFn = Arc<dyn Fn(Value, ActionContext) -> HandlerFuture + Send + Sync>;

/// Errors from registry lookups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The named action has no registered handler.
    #[error("unknown action: '{0}'")]
    UnknownAction(String),
}

/// One registered action: its handler and the most recently received caller
/// metadata.
struct HandlerEntry {
    handler: HandlerFn,

    /// Overwritten by every inbound request for this action; read by the
    /// handler's context at each emission.  Shared (`Arc`) with the contexts
    /// of in-flight invocations.
    metadata: Arc<Mutex<Value>>,
}

/// Process-wide mapping from action names to handler entries.
///
/// Registration happens during startup; afterwards the registry is shared
/// read-only and only the per-entry metadata slots change.
#[derive(Default)]
pub struct ActionRegistry {
    entries: HashMap<String, HandlerEntry>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `name` with `handler`.
    ///
    /// Registering a name twice replaces the earlier entry
    /// (last-registered-wins) and resets its metadata slot to `null`.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value, ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: HandlerFn =
            Arc::new(move |data, ctx| -> HandlerFuture { Box::pin(handler(data, ctx)) });
        self.entries.insert(
            name.into(),
            HandlerEntry {
                handler,
                metadata: Arc::new(Mutex::new(Value::Null)),
            },
        );
    }

    /// Stores `metadata` against the entry for `name`, overwriting any
    /// previous value.
    ///
    /// The read loop calls this with the inbound request's metadata before
    /// dispatching its payload, so responses emitted from that point on
    /// quote it.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownAction`] if `name` is not registered.
    pub fn record_metadata(&self, name: &str, metadata: Value) -> Result<(), DispatchError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| DispatchError::UnknownAction(name.to_string()))?;
        *entry
            .metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = metadata;
        Ok(())
    }

    /// Returns a snapshot of the metadata currently stored for `name`.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownAction`] if `name` is not registered.
    pub fn metadata(&self, name: &str) -> Result<Value, DispatchError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| DispatchError::UnknownAction(name.to_string()))?;
        Ok(entry
            .metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    /// Looks up the handler for `name` and returns its invocation future,
    /// bound to a fresh [`ActionContext`] over `sink`.
    ///
    /// The caller spawns the future; `dispatch` itself never blocks and
    /// never runs handler code.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownAction`] if `name` is not registered.  The
    /// registry is left untouched in that case.
    pub fn dispatch(
        &self,
        name: &str,
        data: Value,
        sink: Arc<dyn ResponseSink>,
    ) -> Result<HandlerFuture, DispatchError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| DispatchError::UnknownAction(name.to_string()))?;
        let context = ActionContext::new(name.to_string(), Arc::clone(&entry.metadata), sink);
        Ok((entry.handler)(data, context))
    }

    /// Whether `name` has a registered handler.
    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no actions are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered action names, sorted for stable log output.
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::context::SendError;
    use scriptlink_core::{decode, Envelope};
    use serde_json::json;

    /// Sink that records every envelope text it receives.
    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn envelopes(&self) -> Vec<Envelope> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|text| decode(text).expect("sink received invalid envelope"))
                .collect()
        }
    }

    impl ResponseSink for RecordingSink {
        fn send_text(&self, text: String) -> Result<(), SendError> {
            self.sent.lock().unwrap().push(text);
            Ok(())
        }
    }

    /// Registry with an `echo` action that sends its payload straight back.
    fn echo_registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        registry.register("echo", |data, ctx| async move {
            ctx.send(data);
        });
        registry
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = ActionRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_adds_action() {
        let registry = echo_registry();
        assert!(registry.is_registered("echo"));
        assert_eq!(registry.action_names(), vec!["echo"]);
    }

    #[test]
    fn test_register_same_name_overwrites_and_keeps_one_entry() {
        // Arrange
        let mut registry = echo_registry();

        // Act: register a second handler under the same name
        registry.register("echo", |_data, ctx| async move {
            ctx.send(json!({"replaced": true}));
        });

        // Assert: last-registered-wins, still exactly one entry
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_same_name_resets_metadata() {
        let mut registry = echo_registry();
        registry.record_metadata("echo", json!({"id": 1})).unwrap();

        registry.register("echo", |data, ctx| async move {
            ctx.send(data);
        });

        assert_eq!(registry.metadata("echo").unwrap(), Value::Null);
    }

    #[test]
    fn test_record_metadata_overwrites_previous_value() {
        let registry = echo_registry();

        registry.record_metadata("echo", json!({"id": 1})).unwrap();
        registry.record_metadata("echo", json!({"id": 2})).unwrap();

        assert_eq!(registry.metadata("echo").unwrap(), json!({"id": 2}));
    }

    #[test]
    fn test_record_metadata_unknown_action_fails() {
        let registry = echo_registry();
        let result = registry.record_metadata("nope", json!({}));
        assert_eq!(
            result,
            Err(DispatchError::UnknownAction("nope".to_string()))
        );
    }

    #[test]
    fn test_dispatch_unknown_action_fails_and_leaves_registry_intact() {
        // Arrange
        let registry = echo_registry();
        let sink = Arc::new(RecordingSink::default());

        // Act
        let result = registry.dispatch("nope", json!({}), sink);

        // Assert: the error names the action and nothing changed
        assert!(matches!(
            result,
            Err(DispatchError::UnknownAction(name)) if name == "nope"
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.is_registered("echo"));
    }

    #[tokio::test]
    async fn test_dispatch_runs_handler_with_payload_and_metadata() {
        // Arrange
        let registry = echo_registry();
        let sink = Arc::new(RecordingSink::default());
        registry
            .record_metadata("echo", json!({"id": "abc"}))
            .unwrap();

        // Act: dispatch returns the future; running it is the caller's job
        let future = registry
            .dispatch(
                "echo",
                json!({"k": 1}),
                Arc::clone(&sink) as Arc<dyn ResponseSink>,
            )
            .unwrap();
        future.await;

        // Assert
        let envelopes = sink.envelopes();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].action, "echo");
        assert_eq!(envelopes[0].data, json!({"k": 1}));
        assert_eq!(envelopes[0].metadata, json!({"id": "abc"}));
    }

    #[tokio::test]
    async fn test_metadata_recorded_mid_flight_wins() {
        // Documents the last-write-wins contract: a second request's
        // metadata, recorded before the first invocation emits, is what the
        // first invocation's emission quotes.

        // Arrange
        let registry = echo_registry();
        let sink = Arc::new(RecordingSink::default());
        registry.record_metadata("echo", json!({"id": 1})).unwrap();
        let first = registry
            .dispatch(
                "echo",
                json!({}),
                Arc::clone(&sink) as Arc<dyn ResponseSink>,
            )
            .unwrap();

        // Act: the second request arrives before the first handler runs
        registry.record_metadata("echo", json!({"id": 2})).unwrap();
        first.await;

        // Assert
        assert_eq!(sink.envelopes()[0].metadata, json!({"id": 2}));
    }

    #[tokio::test]
    async fn test_handler_emitting_multiple_responses_uses_one_context() {
        // Arrange
        let mut registry = ActionRegistry::new();
        registry.register("burst", |_data, ctx| async move {
            for i in 0..3 {
                ctx.send(json!({"seq": i}));
            }
        });
        registry.record_metadata("burst", json!({"id": 9})).unwrap();
        let sink = Arc::new(RecordingSink::default());

        // Act
        registry
            .dispatch(
                "burst",
                json!({}),
                Arc::clone(&sink) as Arc<dyn ResponseSink>,
            )
            .unwrap()
            .await;

        // Assert: all three responses are tagged with the action and the
        // stored metadata
        let envelopes = sink.envelopes();
        assert_eq!(envelopes.len(), 3);
        for (i, envelope) in envelopes.iter().enumerate() {
            assert_eq!(envelope.action, "burst");
            assert_eq!(envelope.data, json!({"seq": i}));
            assert_eq!(envelope.metadata, json!({"id": 9}));
        }
    }

    #[test]
    fn test_action_names_are_sorted() {
        let mut registry = ActionRegistry::new();
        registry.register("zeta", |_d, _c| async {});
        registry.register("alpha", |_d, _c| async {});
        registry.register("mid", |_d, _c| async {});
        assert_eq!(registry.action_names(), vec!["alpha", "mid", "zeta"]);
    }
}
