//! Free-port discovery for the local listener.
//!
//! Probe-then-bind: each candidate is checked by binding a throwaway
//! listener and dropping it, so a narrow window remains between the probe
//! and the real bind. The caller treats a bind failure after a successful
//! probe as fatal rather than retrying.

use std::net::TcpListener;

use thiserror::Error;

/// Number of candidate ports probed per scan, starting at the preferred port.
pub const SCAN_WIDTH: u16 = 10;

#[derive(Debug, Error)]
pub enum PortSelectError {
    #[error("no free TCP port within {width} ports of {start}")]
    Exhausted { start: u16, width: u16 },
}

/// Candidate ports for a scan starting at `start`: the fixed window
/// `[start, start + SCAN_WIDTH)`, ascending. Candidates past 65535 are
/// dropped, never wrapped.
fn scan_candidates(start: u16) -> impl Iterator<Item = u16> {
    (0..SCAN_WIDTH).filter_map(move |offset| start.checked_add(offset))
}

/// Whether a probe listener can currently bind `host:port`.
pub fn port_is_available(host: &str, port: u16) -> bool {
    TcpListener::bind((host, port)).is_ok()
}

/// First bindable port in the scan window, in ascending order.
///
/// Bind failures are not classified: anything that keeps the probe from
/// binding (in use, permission, address problems) skips the candidate.
pub fn find_free_port(host: &str, start: u16) -> Result<u16, PortSelectError> {
    for candidate in scan_candidates(start) {
        if port_is_available(host, candidate) {
            tracing::debug!("selected port {} (scan started at {})", candidate, start);
            return Ok(candidate);
        }
        tracing::debug!("port {} unavailable, trying next", candidate);
    }
    Err(PortSelectError::Exhausted {
        start,
        width: SCAN_WIDTH,
    })
}
