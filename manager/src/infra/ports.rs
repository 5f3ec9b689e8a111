//! Port Allocator (spec §4.A).
//!
//! Advisory only: a bind-then-close probe, not a reservation. Concurrent
//! launchers racing for the same port surface as a container-launch
//! failure, handled by retrying with a fresh allocation (spec §7).

use std::net::{TcpListener, TcpStream};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// Scan `[start, end)` ascending; return the first port that nothing is
    /// listening on (loopback connect fails) and that a wildcard bind
    /// succeeds against. The probe socket is closed immediately.
    pub fn allocate(&self) -> Option<u16> {
        for port in self.start..self.end {
            if is_port_free(port) {
                return Some(port);
            }
        }
        None
    }
}

fn is_port_free(port: u16) -> bool {
    let nothing_listening = TcpStream::connect_timeout(
        &format!("127.0.0.1:{port}").parse().unwrap(),
        Duration::from_millis(200),
    )
    .is_err();

    if !nothing_listening {
        return false;
    }

    match TcpListener::bind(("0.0.0.0", port)) {
        Ok(listener) => {
            drop(listener);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_first_free_port_in_range() {
        // Bind to an OS-assigned port so we know it's free, then probe a
        // range that only contains it.
        let probe = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let range = PortRange::new(port, port + 1);
        assert_eq!(range.allocate(), Some(port));
    }

    #[test]
    fn skips_a_port_already_listening() {
        let held = TcpListener::bind("127.0.0.1:0").unwrap();
        let held_port = held.local_addr().unwrap().port();

        let range = PortRange::new(held_port, held_port + 2);
        let allocated = range.allocate();
        assert_ne!(allocated, Some(held_port));
        drop(held);
    }

    #[test]
    fn exhausted_range_returns_none() {
        let range = PortRange::new(1, 1);
        assert_eq!(range.allocate(), None);
    }
}
