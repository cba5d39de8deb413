//! Liveness probing and bounded polling.
//!
//! A TCP connect attempt is the single source of truth for "is the service
//! up". Probes never raise; every connection error (refused, timeout,
//! unreachable) reads as "not listening".

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

/// Default connect timeout, well under a second.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Liveness probe seam.
pub trait Probe {
    fn is_open(&self, host: &str, port: u16) -> bool;
}

/// Production probe: a short-timeout TCP connect.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    pub timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            timeout: PROBE_TIMEOUT,
        }
    }
}

impl Probe for TcpProbe {
    fn is_open(&self, host: &str, port: u16) -> bool {
        is_port_open(host, port, self.timeout)
    }
}

/// Attempt a TCP connection; true on success, false on any error.
pub fn is_port_open(host: &str, port: u16, timeout: Duration) -> bool {
    let addrs = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            debug!(host, port, error = %e, "address resolution failed");
            return false;
        }
    };
    for addr in addrs {
        if TcpStream::connect_timeout(&addr, timeout).is_ok() {
            return true;
        }
    }
    false
}

/// Poll a condition once per interval, up to `max_attempts` times.
///
/// Returns true as soon as the condition holds; false once the attempt
/// budget is exhausted. No sleep after the final attempt.
pub fn wait_for<F>(mut condition: F, interval: Duration, max_attempts: u32) -> bool
where
    F: FnMut() -> bool,
{
    for attempt in 0..max_attempts {
        if condition() {
            return true;
        }
        if attempt + 1 < max_attempts && !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }
    false
}
