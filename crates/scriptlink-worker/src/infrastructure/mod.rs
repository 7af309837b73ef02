//! Infrastructure layer for scriptlink-worker.
//!
//! All I/O lives here: probing the candidate port range, binding the
//! listener, accepting the host's WebSocket connection, reading frames, and
//! writing responses.
//!
//! # Responsibilities
//!
//! - Finding a free port in the configured range
//! - Binding the TCP listener and printing the endpoint report
//! - Performing the WebSocket upgrade handshake
//! - Owning the single active transport slot ([`session::Session`])
//! - Running the read loop: decode → record metadata → dispatch → spawn
//! - Handling the graceful shutdown flag
//!
//! # What does NOT belong here?
//!
//! - Handler lookup and the outbound envelope construction (application)
//! - Envelope parsing rules (scriptlink-core)
//! - Configuration parsing (done in `main.rs`)

pub mod port;
pub mod session;
pub mod ws_server;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use port::{find_available_port, PortError};
pub use session::Session;
pub use ws_server::run_server;
