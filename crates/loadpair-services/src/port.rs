//! Port allocation within the shared range.

use std::net::TcpListener;

/// Find the lowest port in `[low, high)` that `host` can bind right now.
///
/// Each candidate is bound and immediately released; the caller re-binds it.
/// Returns `high` when every candidate is taken, so the caller's own bind is
/// expected to fail and must be tolerated.
pub fn find_free_port(host: &str, low: u16, high: u16) -> u16 {
    for port in low..high {
        match TcpListener::bind((host, port)) {
            Ok(listener) => {
                drop(listener);
                return port;
            }
            Err(e) => tracing::trace!(port, error = %e, "port in use"),
        }
    }
    tracing::warn!(low, high, "no free port in range, falling back to range end");
    high
}
