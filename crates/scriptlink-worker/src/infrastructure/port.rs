//! Candidate-range port allocation.
//!
//! The worker does not get a port assigned; it picks one itself from a fixed
//! candidate range and reports it on stdout for the launcher to relay to the
//! host.  Allocation is a probe: bind a listener on each candidate in order,
//! release it, and hand the first successful port back to the caller.
//!
//! The probe-and-release approach has an inherent race — another process can
//! grab the port between the probe and the real bind.  The range is large,
//! collisions are rare, and the real bind still fails loudly when it
//! happens, so the launcher can simply restart the worker.

use std::net::TcpListener;

use thiserror::Error;
use tracing::debug;

/// Errors from port allocation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortError {
    /// Every candidate in `[start, end)` refused the bind probe.
    #[error("no available port in range {start}..{end}")]
    NoPortAvailable { start: u16, end: u16 },
}

/// Returns the first port in `[start, end)` that accepts a local bind on
/// `host`.
///
/// The probe listener is released before returning, so the caller performs
/// the real bind itself (see the module note on the accepted race).  Runs
/// synchronously; it is called once at bootstrap, before the server loop.
///
/// # Errors
///
/// [`PortError::NoPortAvailable`] when the whole range is exhausted.
///
/// # Examples
///
/// ```no_run
/// use scriptlink_worker::infrastructure::find_available_port;
///
/// let port = find_available_port("127.0.0.1", 61550, 62000)?;
/// # Ok::<(), scriptlink_worker::infrastructure::PortError>(())
/// ```
pub fn find_available_port(host: &str, start: u16, end: u16) -> Result<u16, PortError> {
    for port in start..end {
        match TcpListener::bind((host, port)) {
            // Binding succeeded; dropping the listener releases the port.
            Ok(_probe) => return Ok(port),
            Err(e) => debug!("port {port} unavailable: {e}"),
        }
    }
    Err(PortError::NoPortAvailable { start, end })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
