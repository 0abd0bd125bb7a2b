//! Peer addresses known to the transport and the sessions they carry
//!
//! This module handles the transport-side bookkeeping for connected peers:
//! - which session a UDP address belongs to
//! - liveness tracking from heartbeats and commands
//! - capacity enforcement for new connections
//!
//! It knows nothing about games. Evicted peers are reported back so the
//! caller can disconnect their sessions from the lobby.

use log::info;
use shared::SessionId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A peer that completed the hello handshake
#[derive(Debug)]
pub struct Connection {
    pub session_id: SessionId,
    /// Network address for sending events
    pub addr: SocketAddr,
    /// Last time we received any packet from this peer
    pub last_seen: Instant,
}

impl Connection {
    pub fn new(session_id: SessionId, addr: SocketAddr) -> Self {
        Self {
            session_id,
            addr,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// True if nothing arrived from this peer within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Every live peer, keyed by address
pub struct ConnectionManager {
    connections: HashMap<SocketAddr, Connection>,
    /// Maximum number of concurrent peers allowed
    max_clients: usize,
    timeout: Duration,
}

impl ConnectionManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            connections: HashMap::new(),
            max_clients,
            timeout,
        }
    }

    pub fn is_full(&self) -> bool {
        self.connections.len() >= self.max_clients
    }

    /// Records a new peer. Returns false when the server is at capacity.
    pub fn register(&mut self, addr: SocketAddr, session_id: SessionId) -> bool {
        if self.is_full() {
            return false;
        }

        info!("Session {} bound to {}", session_id, addr);
        self.connections
            .insert(addr, Connection::new(session_id, addr));
        true
    }

    /// Forgets a peer, returning the session it carried
    pub fn remove(&mut self, addr: SocketAddr) -> Option<SessionId> {
        self.connections.remove(&addr).map(|c| {
            info!("Session {} unbound from {}", c.session_id, addr);
            c.session_id
        })
    }

    pub fn session_for(&self, addr: SocketAddr) -> Option<SessionId> {
        self.connections.get(&addr).map(|c| c.session_id)
    }

    /// Refreshes liveness. Returns false for an unknown address.
    pub fn touch(&mut self, addr: SocketAddr) -> bool {
        match self.connections.get_mut(&addr) {
            Some(connection) => {
                connection.touch();
                true
            }
            None => false,
        }
    }

    /// Removes peers that went silent and returns their sessions
    pub fn check_timeouts(&mut self) -> Vec<SessionId> {
        let timeout = self.timeout;
        let timed_out: Vec<SocketAddr> = self
            .connections
            .values()
            .filter(|c| c.is_timed_out(timeout))
            .map(|c| c.addr)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|addr| self.remove(addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_connection_timeout() {
        let mut connection = Connection::new(1, test_addr());
        assert!(!connection.is_timed_out(Duration::from_secs(1)));

        connection.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(connection.is_timed_out(Duration::from_secs(1)));

        connection.touch();
        assert!(!connection.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_register_and_lookup() {
        let mut manager = ConnectionManager::new(2, Duration::from_secs(5));
        assert!(manager.is_empty());

        assert!(manager.register(test_addr(), 7));
        assert_eq!(manager.session_for(test_addr()), Some(7));
        assert_eq!(manager.session_for(test_addr2()), None);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_capacity_enforced() {
        let mut manager = ConnectionManager::new(1, Duration::from_secs(5));
        assert!(manager.register(test_addr(), 1));
        assert!(manager.is_full());
        assert!(!manager.register(test_addr2(), 2));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut manager = ConnectionManager::new(2, Duration::from_secs(5));
        manager.register(test_addr(), 3);

        assert_eq!(manager.remove(test_addr()), Some(3));
        assert_eq!(manager.remove(test_addr()), None);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_touch_unknown_addr() {
        let mut manager = ConnectionManager::new(2, Duration::from_secs(5));
        assert!(!manager.touch(test_addr()));
        manager.register(test_addr(), 1);
        assert!(manager.touch(test_addr()));
    }

    #[test]
    fn test_check_timeouts_evicts_silent_peers() {
        let mut manager = ConnectionManager::new(3, Duration::from_secs(1));
        manager.register(test_addr(), 1);
        manager.register(test_addr2(), 2);

        if let Some(connection) = manager.connections.get_mut(&test_addr()) {
            connection.last_seen = Instant::now() - Duration::from_secs(2);
        }

        assert_eq!(manager.check_timeouts(), vec![1]);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.session_for(test_addr2()), Some(2));
    }
}
