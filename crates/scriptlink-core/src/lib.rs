//! # scriptlink-core
//!
//! Shared library for ScriptLink containing the wire envelope type and the
//! text codec used on the host↔worker connection.
//!
//! This crate is used by the worker process and by any Rust-side test client.
//! It has zero dependencies on OS APIs, async runtimes, or network sockets.
//!
//! # Protocol overview
//!
//! ScriptLink is an action-RPC bridge: a host application (an editor, a game
//! engine, any process embedding a scripting bridge) holds one persistent
//! WebSocket connection to a worker process.  The worker exposes named
//! *actions*; the host invokes them by sending JSON envelopes and receives
//! zero or more tagged JSON envelopes back, asynchronously, on the same
//! connection.
//!
//! Every message in either direction is one JSON object:
//!
//! ```json
//! {"action":"greet","data":{"name":"Bob","age":5},"__metadata__":{"id":"abc"}}
//! ```
//!
//! - **`protocol`** – the [`Envelope`] struct modelling that object, and the
//!   codec that converts it to and from the text the transport carries.
//!   Decoding tolerates stray text around the object (log prefixes, framing
//!   noise) by isolating the substring between the first `{` and the last
//!   `}` before parsing.

// Rust will look for the module in a subdirectory with the same name
// (src/protocol/mod.rs).
pub mod protocol;

// Re-export the most-used items at the crate root so callers can write
// `scriptlink_core::Envelope` instead of the full path.
pub use protocol::codec::{decode, encode, ProtocolError};
pub use protocol::envelope::Envelope;
