//! The wire envelope exchanged between host and worker.
//!
//! Both directions use the same shape, one JSON object per transport message:
//!
//! ```json
//! {"action":"greet","data":{"name":"Bob","age":5},"__metadata__":{"id":"abc"}}
//! ```
//!
//! - Inbound (host → worker): a request.  `action` names the handler to run,
//!   `data` is the handler's payload, `__metadata__` is an opaque value the
//!   caller uses to correlate the asynchronous responses.
//! - Outbound (worker → host): a response.  `action` names the handler that
//!   produced it, `data` is the response payload, `__metadata__` echoes the
//!   most recently received metadata for that action.
//!
//! # Field names are wire contract
//!
//! Existing host-side callers match on these exact keys, `__metadata__`
//! included.  The serde `rename` attribute pins the JSON key while keeping
//! the Rust field idiomatically named.
//!
//! # Why `serde_json::Value` for `data` and `metadata`?
//!
//! The payload is arbitrarily nested caller-defined structure; the worker
//! parses it structurally and hands it to the handler untouched.  Schema
//! validation is deliberately the handler's concern, not the codec's.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One host↔worker message: an action name, a payload, and caller metadata.
///
/// All three fields are required on decode — an object missing any of them
/// is rejected by the codec rather than silently defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Name of the action this message belongs to.
    pub action: String,

    /// The payload: request data inbound, response data outbound.
    pub data: Value,

    /// Opaque caller-supplied correlation value, echoed back verbatim on
    /// responses.  The wire key is `__metadata__`.
    #[serde(rename = "__metadata__")]
    pub metadata: Value,
}

impl Envelope {
    /// Builds an envelope from its three logical fields.
    pub fn new(action: impl Into<String>, data: Value, metadata: Value) -> Self {
        Self {
            action: action.into(),
            data,
            metadata,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
