//! Server network layer: TCP transport and the fixed-rate game loop

use crate::client_manager::ClientManager;
use log::{debug, error, info, warn};
use shared::{send_state_message, ConnectionEvent, Game, GameError};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

const READ_BUFFER_SIZE: usize = 4096;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Connection {
        client_id: u32,
        event: ConnectionEvent,
    },
    Shutdown,
}

/// Main server coordinating sockets and the authoritative game
pub struct Server {
    listener: TcpListener,
    clients: ClientManager,
    game: Game,
    tick_duration: Duration,
    client_timeout: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        game: Game,
        tick_duration: Duration,
        max_clients: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            clients: ClientManager::new(max_clients),
            game,
            tick_duration,
            client_timeout: Duration::from_secs(10),
            server_tx,
            server_rx,
        })
    }

    /// Drops clients that send nothing for `timeout`.
    pub fn with_client_timeout(mut self, timeout: Duration) -> Self {
        self.client_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    /// Sender for injecting messages into the main loop, e.g. [`ServerMessage::Shutdown`].
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns a player for a new connection and registers it.
    ///
    /// Returns `None` when the server is full or the map has no free cell;
    /// the caller then drops the socket.
    pub fn register_client(
        &mut self,
        addr: SocketAddr,
        outgoing: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Option<u32> {
        if self.clients.is_full() {
            warn!("Refusing {}: server full", addr);
            return None;
        }

        let player = match self.game.spawn_player() {
            Ok(player) => player,
            Err(GameError::NoSpawnSpace) => {
                warn!("Refusing {}: no free cell to spawn a player", addr);
                return None;
            }
            Err(e) => {
                error!("Refusing {}: {}", addr, e);
                return None;
            }
        };

        let client_id = self.clients.add_client(addr, player, outgoing);
        if client_id.is_none() {
            self.game.remove_player(player);
        }
        client_id
    }

    /// Closes a connection and removes its player from the game.
    pub fn disconnect(&mut self, client_id: u32) {
        if let Some(client) = self.clients.remove_client(client_id) {
            self.game.remove_player(client.player);
        }
    }

    fn accept_connection(&mut self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
        }

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let Some(client_id) = self.register_client(addr, outgoing_tx) else {
            return;
        };

        let (reader, writer) = stream.into_split();
        let reader_task = spawn_reader(client_id, reader, self.server_tx.clone());
        if let Some(client) = self.clients.get_mut(client_id) {
            client.attach_reader(reader_task);
        }
        spawn_writer(client_id, writer, outgoing_rx);
    }

    /// Processes one notification from the network tasks.
    ///
    /// Returns false when the loop should stop.
    pub fn handle_message(&mut self, message: ServerMessage) -> bool {
        match message {
            ServerMessage::Connection { client_id, event } => {
                let closed = event == ConnectionEvent::Closed;
                match self.clients.get_mut(client_id) {
                    Some(client) => client.handle_event(&event),
                    None => debug!("Event for unknown client {}", client_id),
                }
                if closed {
                    self.disconnect(client_id);
                }
                true
            }
            ServerMessage::Shutdown => false,
        }
    }

    /// Runs one simulation step: decode buffered controls, update the game,
    /// send every client a snapshot with its own player first.
    pub fn tick(&mut self, dt: f32) {
        let mut failed = Vec::new();

        for client in self.clients.iter_mut() {
            let Some(player) = self.game.player_mut(client.player) else {
                continue;
            };
            loop {
                match player.controls.recv_controls_message(&mut client.connection) {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(e) => {
                        warn!("Protocol error from client {}: {}", client.id, e);
                        failed.push(client.id);
                        break;
                    }
                }
            }
        }
        for client_id in failed.drain(..) {
            self.disconnect(client_id);
        }

        let report = self.game.update(dt);
        for id in &report.deaths {
            if let Some(player) = self.game.player(*id) {
                info!("{} died with length {}", player.name, player.body.len());
            }
        }

        for client in self.clients.iter_mut() {
            if let Err(e) = send_state_message(&self.game, Some(client.player), &mut client.connection) {
                error!("Failed to encode state for client {}: {}", client.id, e);
                failed.push(client.id);
                continue;
            }
            if !client.flush() {
                failed.push(client.id);
            }
        }
        for client_id in failed {
            self.disconnect(client_id);
        }
    }

    fn drop_idle_clients(&mut self) {
        for client_id in self.clients.timed_out(self.client_timeout) {
            info!("Client {} timed out", client_id);
            self.disconnect(client_id);
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let dt = self.tick_duration.as_secs_f32();
        let ticks_per_second = (1.0 / dt).round().max(1.0) as u64;
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.accept_connection(stream, addr),
                        Err(e) => error!("Error accepting connection: {}", e),
                    }
                },

                // Handle network events
                message = self.server_rx.recv() => {
                    let keep_running = match message {
                        Some(message) => self.handle_message(message),
                        None => false,
                    };
                    if !keep_running {
                        info!("Server shutting down");
                        break;
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let lag = now.duration_since(last_tick);
                    last_tick = now;
                    if lag > self.tick_duration * 3 {
                        warn!("Server falling behind: {:.3}s since last tick", lag.as_secs_f32());
                    }

                    self.tick(dt);

                    if self.game.tick % ticks_per_second == 0 {
                        self.drop_idle_clients();
                        if !self.clients.is_empty() {
                            debug!("Tick {}: {} clients, {} apples",
                                   self.game.tick, self.clients.len(), self.game.apples().len());
                        }
                    }
                },
            }
        }

        Ok(())
    }
}

/// Spawns a task forwarding everything read from the socket to the main loop
fn spawn_reader(
    client_id: u32,
    mut reader: OwnedReadHalf,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];

        loop {
            match reader.read(&mut buffer).await {
                Ok(0) => break,
                Ok(len) => {
                    let event = ConnectionEvent::DataArrived(buffer[..len].to_vec());
                    if let Err(e) = server_tx.send(ServerMessage::Connection { client_id, event }) {
                        error!("Failed to send data to main loop: {}", e);
                        return;
                    }
                }
                Err(e) => {
                    debug!("Read error on client {}: {}", client_id, e);
                    break;
                }
            }
        }

        let event = ConnectionEvent::Closed;
        if let Err(e) = server_tx.send(ServerMessage::Connection { client_id, event }) {
            debug!("Main loop gone before close of client {}: {}", client_id, e);
        }
    })
}

/// Spawns a task writing queued bytes to the socket until the client is dropped
fn spawn_writer(
    client_id: u32,
    mut writer: OwnedWriteHalf,
    mut outgoing_rx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    tokio::spawn(async move {
        while let Some(bytes) = outgoing_rx.recv().await {
            if let Err(e) = writer.write_all(&bytes).await {
                debug!("Write error on client {}: {}", client_id, e);
                return;
            }
        }
        if let Err(e) = writer.shutdown().await {
            debug!("Shutdown error on client {}: {}", client_id, e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{ButtonKind, Connection, Controls, GameConfig, Map, Snapshot};

    async fn test_server(max_clients: usize) -> Server {
        let config = GameConfig {
            target_apples: 0,
            ..GameConfig::default()
        };
        let game = Game::with_map(Map::open(5, 5).unwrap(), config).unwrap();
        Server::new("127.0.0.1:0", game, Duration::from_millis(33), max_clients)
            .await
            .unwrap()
    }

    fn test_addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn data(client_id: u32, bytes: Vec<u8>) -> ServerMessage {
        ServerMessage::Connection {
            client_id,
            event: ConnectionEvent::DataArrived(bytes),
        }
    }

    fn decode_all(bytes: Vec<u8>) -> Vec<Snapshot> {
        let mut conn = Connection::new();
        conn.receive(&bytes);
        let mut snapshots = Vec::new();
        while let Some(snapshot) = Snapshot::recv_state_message(&mut conn).unwrap() {
            snapshots.push(snapshot);
        }
        snapshots
    }

    #[tokio::test]
    async fn test_register_spawns_player() {
        let mut server = test_server(4).await;
        let (tx, _rx) = mpsc::unbounded_channel();

        let client_id = server.register_client(test_addr(), tx).unwrap();
        let player = server.clients().get(client_id).unwrap().player;
        assert!(server.game().player(player).is_some());
        assert_eq!(server.game().players().len(), 1);
    }

    #[tokio::test]
    async fn test_register_refused_when_full() {
        let mut server = test_server(1).await;
        let (tx, _rx) = mpsc::unbounded_channel();

        assert!(server.register_client(test_addr(), tx.clone()).is_some());
        assert!(server.register_client(test_addr(), tx).is_none());
        assert_eq!(server.game().players().len(), 1);
    }

    #[tokio::test]
    async fn test_register_refused_without_space() {
        let game = Game::with_map(
            Map::open(1, 1).unwrap(),
            GameConfig {
                target_apples: 0,
                ..GameConfig::default()
            },
        )
        .unwrap();
        let mut server = Server::new("127.0.0.1:0", game, Duration::from_millis(33), 8)
            .await
            .unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();

        assert!(server.register_client(test_addr(), tx.clone()).is_some());
        assert!(server.register_client(test_addr(), tx).is_none());
        assert_eq!(server.clients().len(), 1);
    }

    #[tokio::test]
    async fn test_tick_sends_own_player_first() {
        let mut server = test_server(4).await;
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let first = server.register_client(test_addr(), tx1).unwrap();
        let second = server.register_client(test_addr(), tx2).unwrap();

        server.tick(1.0 / 30.0);

        let name_of = |id: u32| {
            let player = server.clients().get(id).unwrap().player;
            server.game().player(player).unwrap().name.clone()
        };
        let snapshots = decode_all(rx1.try_recv().unwrap());
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].players[0].name, name_of(first));

        let snapshots = decode_all(rx2.try_recv().unwrap());
        assert_eq!(snapshots[0].players[0].name, name_of(second));
        assert_eq!(snapshots[0].players.len(), 2);
    }

    #[tokio::test]
    async fn test_controls_applied_at_tick() {
        let mut server = test_server(4).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let client_id = server.register_client(test_addr(), tx).unwrap();
        let player = server.clients().get(client_id).unwrap().player;

        let mut controls = Controls::new();
        controls.press(ButtonKind::Jump);
        let mut conn = Connection::new();
        controls.send_controls_message(&mut conn).unwrap();
        let bytes = conn.take_outgoing();

        // split delivery: header first, payload later
        assert!(server.handle_message(data(client_id, bytes[..3].to_vec())));
        assert!(server.handle_message(data(client_id, bytes[3..].to_vec())));
        assert!(!server.game().player(player).unwrap().controls.jump.pressed);

        server.tick(1.0 / 30.0);
        let player = server.game().player(player).unwrap();
        assert!(player.controls.jump.pressed);
        assert_approx_eq!(player.height, 0.6, 1e-5);
        assert!(server.clients().get(client_id).unwrap().connection.recv_buffer.is_empty());
    }

    #[tokio::test]
    async fn test_protocol_error_closes_only_offender() {
        let mut server = test_server(4).await;
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let bad = server.register_client(test_addr(), tx1).unwrap();
        let good = server.register_client(test_addr(), tx2).unwrap();
        let bad_player = server.clients().get(bad).unwrap().player;

        server.handle_message(data(bad, vec![1, 7, 0, 0, 0, 0, 0, 0, 0, 0, 0]));
        server.tick(1.0 / 30.0);

        assert!(server.clients().get(bad).is_none());
        assert!(server.game().player(bad_player).is_none());
        assert!(server.clients().get(good).is_some());
        let snapshots = decode_all(rx2.try_recv().unwrap());
        assert_eq!(snapshots[0].players.len(), 1);
    }

    #[tokio::test]
    async fn test_protocol_error_releases_socket() {
        let mut server = test_server(4).await;
        let addr = server.local_addr().unwrap();
        let handle = server.handle();

        let peer = async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(&[1, 2, 0, 0, 0x80, 0x80]).await.unwrap();

            let mut buffer = [0u8; 1024];
            while let Ok(len) = stream.read(&mut buffer).await {
                if len == 0 {
                    break;
                }
            }

            // once both halves are gone the peer gets a reset
            let frame = [1, 5, 0, 0, 0, 0, 0, 0, 0];
            let mut accepted = 0;
            for _ in 0..50 {
                if stream.write_all(&frame).await.is_err() {
                    break;
                }
                accepted += 1;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            handle.send(ServerMessage::Shutdown).unwrap();
            accepted
        };

        let (result, accepted) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(server.run(), peer)
        })
        .await
        .unwrap();
        assert!(result.is_ok());
        assert!(accepted < 50);
        assert!(server.clients().is_empty());
    }

    #[tokio::test]
    async fn test_close_removes_player() {
        let mut server = test_server(4).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let client_id = server.register_client(test_addr(), tx).unwrap();

        server.handle_message(data(client_id, vec![1, 5]));
        assert!(server.handle_message(ServerMessage::Connection {
            client_id,
            event: ConnectionEvent::Closed,
        }));
        assert!(server.clients().is_empty());
        assert!(server.game().players().is_empty());
    }

    #[tokio::test]
    async fn test_writer_gone_drops_client() {
        let mut server = test_server(4).await;
        let (tx, rx) = mpsc::unbounded_channel();
        let client_id = server.register_client(test_addr(), tx).unwrap();
        drop(rx);

        server.tick(1.0 / 30.0);
        assert!(server.clients().get(client_id).is_none());
    }

    #[tokio::test]
    async fn test_shutdown_message() {
        let mut server = test_server(1).await;
        assert!(!server.handle_message(ServerMessage::Shutdown));
    }
}
