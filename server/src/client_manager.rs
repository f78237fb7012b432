//! Connection registry for the UDP router
//!
//! This module tracks every connected client independently of the match
//! rooms, including:
//! - Session id allocation and capacity limits
//! - Address lookup for incoming datagrams
//! - Which room each session was routed to
//! - Inactivity timeouts for clients that vanish without saying goodbye
//!
//! Match simulation state lives in the rooms; the registry only knows enough
//! to route packets and to notice silent disconnects.

use log::info;
use shared::{Clock, SessionId};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Clients silent for longer than this are considered disconnected.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected client and where its packets go
#[derive(Debug)]
pub struct Client {
    /// Session id assigned by the server
    pub id: SessionId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Server clock reading when we last received any packet from this
    /// client
    pub last_seen: Duration,
    /// Room the session plays in, once routed
    pub room_id: Option<u32>,
}

impl Client {
    pub fn new(id: SessionId, addr: SocketAddr, now: Duration) -> Self {
        Self {
            id,
            addr,
            last_seen: now,
            room_id: None,
        }
    }

    /// Returns true if no packets have been received from this client within
    /// `timeout` of `now`
    pub fn is_timed_out(&self, now: Duration, timeout: Duration) -> bool {
        now.saturating_sub(self.last_seen) > timeout
    }
}

/// Manages all connected clients
///
/// Session ids start at 1 and are never reused while the server runs, so a
/// stale packet can never be attributed to a newer session.
pub struct ClientManager {
    clients: BTreeMap<SessionId, Client>,
    next_client_id: SessionId,
    max_clients: usize,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl ClientManager {
    pub fn new(max_clients: usize, clock: Arc<dyn Clock>) -> Self {
        Self::with_timeout(max_clients, CLIENT_TIMEOUT, clock)
    }

    pub fn with_timeout(max_clients: usize, timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clients: BTreeMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
            clock,
        }
    }

    /// Attempts to register a new client
    ///
    /// Returns None if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<SessionId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr, self.clock.now()));

        Some(client_id)
    }

    /// Removes a client, returning its record so the caller can notify the
    /// room it was in
    pub fn remove_client(&mut self, client_id: SessionId) -> Option<Client> {
        let client = self.clients.remove(&client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<SessionId> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| client.id)
    }

    pub fn addr_of(&self, client_id: SessionId) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    /// Marks the client as alive
    pub fn touch(&mut self, client_id: SessionId) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = self.clock.now();
        }
    }

    pub fn assign_room(&mut self, client_id: SessionId, room_id: u32) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.room_id = Some(room_id);
                true
            }
            None => false,
        }
    }

    pub fn room_of(&self, client_id: SessionId) -> Option<u32> {
        self.clients.get(&client_id).and_then(|client| client.room_id)
    }

    /// Removes timed-out clients
    ///
    /// Returns each removed session with the room it was in, so the router
    /// can vacate its player slot.
    pub fn check_timeouts(&mut self) -> Vec<(SessionId, Option<u32>)> {
        let now = self.clock.now();
        let timed_out: Vec<SessionId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(now, self.timeout))
            .map(|client| client.id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|id| self.remove_client(id))
            .map(|client| (client.id, client.room_id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
