use crate::autopilot::choose_direction;
use crate::game::ClientGameState;
use crate::input::InputManager;
use log::{debug, info, warn};
use shared::{Connection, ConnectionEvent, ProtocolError, Snapshot};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{interval, MissedTickBehavior};

const READ_BUFFER_SIZE: usize = 4096;

/// Reads whatever is available from `reader` into the connection's receive
/// buffer. Returns the number of bytes read; 0 means the stream ended.
pub async fn pump_incoming<R>(reader: &mut R, connection: &mut Connection) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    let len = reader.read(&mut buffer).await?;
    if len == 0 {
        connection.apply_event(&ConnectionEvent::Closed);
    } else {
        connection.apply_event(&ConnectionEvent::DataArrived(buffer[..len].to_vec()));
    }
    Ok(len)
}

/// Decodes every complete state message in the receive buffer into `state`.
/// Returns how many were applied.
pub fn drain_snapshots(
    connection: &mut Connection,
    state: &mut ClientGameState,
) -> Result<usize, ProtocolError> {
    let mut applied = 0;
    while let Some(snapshot) = Snapshot::recv_state_message(connection)? {
        state.apply_snapshot(snapshot);
        applied += 1;
    }
    Ok(applied)
}

pub struct Client {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    connection: Connection,

    game_state: ClientGameState,
    input_manager: InputManager,
    input_interval: Duration,
}

impl Client {
    pub async fn connect(
        server_addr: &str,
        input_interval: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to server...");
        let stream = TcpStream::connect(server_addr).await?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", stream.peer_addr()?);

        let (reader, writer) = stream.into_split();
        let mut connection = Connection::new();
        connection.apply_event(&ConnectionEvent::Opened);

        Ok(Client {
            reader,
            writer,
            connection,
            game_state: ClientGameState::new(),
            input_manager: InputManager::new(),
            input_interval,
        })
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    pub fn input_manager(&self) -> &InputManager {
        &self.input_manager
    }

    async fn send_input(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(snapshot) = self.game_state.latest() {
            self.input_manager.steer(choose_direction(snapshot));
        }
        self.input_manager.flush(&mut self.connection)?;

        let bytes = self.connection.take_outgoing();
        self.writer.write_all(&bytes).await?;
        Ok(())
    }

    /// Plays until the server goes away, a protocol error occurs, or
    /// `max_snapshots` snapshots have been received.
    pub async fn run(&mut self, max_snapshots: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
        let mut input_interval = interval(self.input_interval);
        input_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                result = pump_incoming(&mut self.reader, &mut self.connection) => {
                    if result? == 0 {
                        warn!("Server closed the connection");
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "server closed the connection",
                        )
                        .into());
                    }

                    let applied = drain_snapshots(&mut self.connection, &mut self.game_state)?;
                    if applied > 1 {
                        debug!("Decoded {} snapshots from one read", applied);
                    }

                    if let Some(limit) = max_snapshots {
                        if self.game_state.snapshots_received() >= limit {
                            info!("Received {} snapshots, leaving", limit);
                            self.writer.shutdown().await?;
                            return Ok(());
                        }
                    }
                },

                _ = input_interval.tick() => {
                    self.send_input().await?;
                },
            }
        }
    }
}
