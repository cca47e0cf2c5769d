//! Connected peers and their byte buffers
//!
//! This module keeps the server-side record of every open connection:
//! - Capacity enforcement and connection id assignment
//! - The player each connection controls
//! - Per-connection send/receive buffers, so no parse state is shared
//! - Idle detection for peers that stopped talking
//!
//! Sockets themselves live in the network tasks; a [`Client`] holds the
//! sending end of its writer task's channel and the handle of its reader task.

use log::{debug, info};
use shared::{Connection, ConnectionEvent, PlayerId};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One connected peer
///
/// Each client maintains:
/// - Connection metadata (id, address, last activity)
/// - The handle of the player it controls
/// - Its own framing buffers
#[derive(Debug)]
pub struct Client {
    /// Connection id assigned by the server
    pub id: u32,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// Player spawned for this connection
    pub player: PlayerId,
    /// Framing buffers for this peer
    pub connection: Connection,
    /// Last time bytes arrived from this client
    pub last_seen: Instant,
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
    reader: Option<JoinHandle<()>>,
}

impl Client {
    /// Creates a client whose outgoing bytes go to `outgoing`
    ///
    /// The buffers start empty and the client counts as active right away.
    pub fn new(
        id: u32,
        addr: SocketAddr,
        player: PlayerId,
        outgoing: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Self {
        let mut connection = Connection::new();
        connection.apply_event(&ConnectionEvent::Opened);
        Self {
            id,
            addr,
            player,
            connection,
            last_seen: Instant::now(),
            outgoing,
            reader: None,
        }
    }

    /// Ties the socket's reader task to this client; it is aborted when the
    /// client is dropped.
    pub fn attach_reader(&mut self, reader: JoinHandle<()>) {
        self.reader = Some(reader);
    }

    /// Feeds a transport notification into the connection buffers
    pub fn handle_event(&mut self, event: &ConnectionEvent) {
        if matches!(event, ConnectionEvent::DataArrived(_)) {
            self.last_seen = Instant::now();
        }
        self.connection.apply_event(event);
    }

    /// Hands queued outgoing bytes to the writer task
    ///
    /// Returns false once the writer has gone away, meaning the socket is
    /// closed and the client should be dropped.
    pub fn flush(&mut self) -> bool {
        if !self.connection.has_outgoing() {
            return true;
        }
        let bytes = self.connection.take_outgoing();
        debug!("Flushing {} bytes to client {}", bytes.len(), self.id);
        self.outgoing.send(bytes).is_ok()
    }

    /// Checks if the client has been silent for longer than `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Registry of connected clients
///
/// Clients are kept ordered by connection id, so per-tick work such as
/// decoding controls and sending snapshots always visits them in the order
/// they connected.
#[derive(Debug)]
pub struct ClientManager {
    /// Connected clients indexed by their id
    clients: BTreeMap<u32, Client>,
    /// Next id handed to a new connection
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty registry holding at most `max_clients` clients
    ///
    /// Client ids start from 1 and are never reused.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: BTreeMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    /// Registers a new connection
    ///
    /// Returns `Some(client_id)` if successful, `None` if the server is at
    /// capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        player: PlayerId,
        outgoing: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Option<u32> {
        if self.is_full() {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, player, outgoing));
        Some(client_id)
    }

    /// Removes a client, returning it so the caller can clean up its player
    ///
    /// Dropping the returned client aborts its reader task and closes its
    /// writer channel, so both halves of the socket are released.
    pub fn remove_client(&mut self, client_id: u32) -> Option<Client> {
        let client = self.clients.remove(&client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: u32) -> Option<&mut Client> {
        self.clients.get_mut(&client_id)
    }

    /// Clients in connection order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Client> {
        self.clients.values_mut()
    }

    /// Ids of clients that have not sent anything within `timeout`
    ///
    /// The clients are left in place; the caller removes them together with
    /// their players.
    pub fn timed_out(&self, timeout: Duration) -> Vec<u32> {
        self.clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.id)
            .collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
