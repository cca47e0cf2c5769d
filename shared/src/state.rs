//! Full-game snapshots sent from the server to every client.
//!
//! Payload layout, all integers little-endian:
//!
//! ```text
//! width u32, height u32, block u8 * (width * height)
//! apple count u32, { x i32, y i32, type u8 } * count
//! player count u8, {
//!     color f32 * 3, direction u8,
//!     body length u32, { x i32, y i32 } * length,
//!     name length u8, name bytes
//! } * count
//! ```
//!
//! The decoder must consume exactly the declared payload; anything else is a
//! fatal [`ProtocolError`] for the connection.

use crate::connection::Connection;
use crate::error::{FrameError, ProtocolError};
use crate::game::{Apple, AppleType, Direction, Game, Player, PlayerId};
use crate::map::{Cell, Map, MapBlock};
use crate::protocol::{begin_frame, finish_frame, MessageType};

/// Longest name that fits the one-byte length field.
pub const MAX_NAME_LEN: usize = 255;

const CELL_LEN: usize = 8;

/// One player as seen by a client.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub color: [f32; 3],
    pub direction: Direction,
    /// Tail first, head last.
    pub body: Vec<Cell>,
    pub name: String,
}

impl PlayerState {
    pub fn head(&self) -> Option<Cell> {
        self.body.last().copied()
    }
}

impl From<&Player> for PlayerState {
    fn from(player: &Player) -> Self {
        Self {
            color: player.color,
            direction: player.direction,
            body: player.body.clone(),
            name: truncate_name(&player.name).to_owned(),
        }
    }
}

/// Decoded state message, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub map: Map,
    pub apples: Vec<Apple>,
    /// The receiving client's own player comes first when the server knows it.
    pub players: Vec<PlayerState>,
}

// Borrowed view shared by the game and snapshot encoders.
struct PlayerRecord<'a> {
    color: [f32; 3],
    direction: Direction,
    body: &'a [Cell],
    name: &'a str,
}

impl<'a> From<&'a Player> for PlayerRecord<'a> {
    fn from(player: &'a Player) -> Self {
        Self {
            color: player.color,
            direction: player.direction,
            body: &player.body,
            name: &player.name,
        }
    }
}

impl<'a> From<&'a PlayerState> for PlayerRecord<'a> {
    fn from(player: &'a PlayerState) -> Self {
        Self {
            color: player.color,
            direction: player.direction,
            body: &player.body,
            name: &player.name,
        }
    }
}

impl Snapshot {
    /// Captures `game` the way [`send_state_message`] would encode it.
    pub fn from_game(game: &Game, requesting: Option<PlayerId>) -> Self {
        Self {
            map: game.map().clone(),
            apples: game.apples().to_vec(),
            players: ordered_players(game, requesting)
                .into_iter()
                .map(PlayerState::from)
                .collect(),
        }
    }

    /// The receiving client's own player.
    pub fn local_player(&self) -> Option<&PlayerState> {
        self.players.first()
    }

    /// Appends the payload (no frame header) to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        let records: Vec<PlayerRecord<'_>> = self.players.iter().map(PlayerRecord::from).collect();
        write_payload(out, &self.map, &self.apples, &records)
    }

    /// Decodes a complete payload.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = Reader::new(payload);

        let width = reader.u32()?;
        let height = reader.u32()?;
        if width == 0 || height == 0 {
            return Err(ProtocolError::InvalidValue {
                field: "map size",
                value: width.min(height),
            });
        }
        let block_count = (width as usize).saturating_mul(height as usize);
        let blocks = reader
            .take(block_count)?
            .iter()
            .map(|tag| {
                MapBlock::from_u8(*tag).ok_or(ProtocolError::InvalidValue {
                    field: "map block",
                    value: u32::from(*tag),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let map = Map::new(width, height, blocks).map_err(|_| ProtocolError::InvalidValue {
            field: "map size",
            value: width,
        })?;

        let apple_count = reader.u32()? as usize;
        reader.ensure(apple_count.saturating_mul(CELL_LEN + 1))?;
        let mut apples = Vec::with_capacity(apple_count);
        for _ in 0..apple_count {
            let position = reader.cell()?;
            let tag = reader.u8()?;
            let kind = AppleType::from_u8(tag).ok_or(ProtocolError::InvalidValue {
                field: "apple type",
                value: u32::from(tag),
            })?;
            apples.push(Apple::new(position, kind));
        }

        let player_count = reader.u8()?;
        let mut players = Vec::with_capacity(usize::from(player_count));
        for _ in 0..player_count {
            players.push(reader.player()?);
        }

        reader.finish()?;
        Ok(Self {
            map,
            apples,
            players,
        })
    }

    /// Decodes the next state message from `connection`, if one is complete.
    ///
    /// Returns `Ok(None)` while the message is still partial; the buffer is
    /// left untouched in that case.
    pub fn recv_state_message(connection: &mut Connection) -> Result<Option<Self>, ProtocolError> {
        let (len, snapshot) = match connection.peek(MessageType::State) {
            Ok(frame) => (frame.frame_len(), Self::decode(frame.payload)),
            Err(FrameError::NeedMoreData) => return Ok(None),
            Err(FrameError::UnexpectedType { found, .. }) => {
                return Err(ProtocolError::UnexpectedMessage { found })
            }
        };
        connection.consume(len);
        snapshot.map(Some)
    }
}

/// Queues a state message for `connection`. `requesting` names the player
/// the receiving client controls; its record goes first.
pub fn send_state_message(
    game: &Game,
    requesting: Option<PlayerId>,
    connection: &mut Connection,
) -> Result<(), ProtocolError> {
    let records: Vec<PlayerRecord<'_>> = ordered_players(game, requesting)
        .into_iter()
        .map(PlayerRecord::from)
        .collect();

    let out = &mut connection.send_buffer;
    let start = out.len();
    let mark = begin_frame(out, MessageType::State);
    if let Err(err) = write_payload(out, game.map(), game.apples(), &records) {
        out.truncate(start);
        return Err(err);
    }
    finish_frame(out, mark)
}

fn ordered_players(game: &Game, requesting: Option<PlayerId>) -> Vec<&Player> {
    let first = requesting.and_then(|id| game.player(id));
    first
        .into_iter()
        .chain(
            game.players()
                .iter()
                .filter(|(id, _)| Some(*id) != requesting)
                .map(|(_, player)| player),
        )
        .collect()
}

fn write_payload(
    out: &mut Vec<u8>,
    map: &Map,
    apples: &[Apple],
    players: &[PlayerRecord<'_>],
) -> Result<(), ProtocolError> {
    let player_count = u8::try_from(players.len()).map_err(|_| ProtocolError::TooManyPlayers {
        count: players.len(),
    })?;

    out.extend_from_slice(&map.width().to_le_bytes());
    out.extend_from_slice(&map.height().to_le_bytes());
    out.extend(map.blocks().iter().map(|block| *block as u8));

    out.extend_from_slice(&(apples.len() as u32).to_le_bytes());
    for apple in apples {
        put_cell(out, apple.position);
        out.push(apple.kind as u8);
    }

    out.push(player_count);
    for player in players {
        for component in player.color {
            out.extend_from_slice(&component.to_le_bytes());
        }
        out.push(player.direction as u8);
        out.extend_from_slice(&(player.body.len() as u32).to_le_bytes());
        for cell in player.body {
            put_cell(out, *cell);
        }
        let name = truncate_name(player.name);
        out.push(name.len() as u8);
        out.extend_from_slice(name.as_bytes());
    }
    Ok(())
}

fn put_cell(out: &mut Vec<u8>, cell: Cell) {
    out.extend_from_slice(&cell.x.to_le_bytes());
    out.extend_from_slice(&cell.y.to_le_bytes());
}

/// Cuts `name` to at most [`MAX_NAME_LEN`] bytes without splitting a char.
pub fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_NAME_LEN {
        return name;
    }
    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn ensure(&self, needed: usize) -> Result<(), ProtocolError> {
        if needed > self.remaining() {
            return Err(ProtocolError::Truncated {
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        self.ensure(len)?;
        let buf: &'a [u8] = self.buf;
        let bytes = &buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut bytes = [0; N];
        bytes.copy_from_slice(self.take(N)?);
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        self.array().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> Result<i32, ProtocolError> {
        self.array().map(i32::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32, ProtocolError> {
        self.array().map(f32::from_le_bytes)
    }

    fn cell(&mut self) -> Result<Cell, ProtocolError> {
        Ok(Cell::new(self.i32()?, self.i32()?))
    }

    fn player(&mut self) -> Result<PlayerState, ProtocolError> {
        let color = [self.f32()?, self.f32()?, self.f32()?];
        let tag = self.u8()?;
        let direction = Direction::from_u8(tag).ok_or(ProtocolError::InvalidValue {
            field: "direction",
            value: u32::from(tag),
        })?;

        let body_len = self.u32()? as usize;
        self.ensure(body_len.saturating_mul(CELL_LEN))?;
        let body = (0..body_len)
            .map(|_| self.cell())
            .collect::<Result<Vec<_>, _>>()?;

        let name_len = usize::from(self.u8()?);
        let name = std::str::from_utf8(self.take(name_len)?)
            .map_err(|_| ProtocolError::InvalidName)?
            .to_owned();

        Ok(PlayerState {
            color,
            direction,
            body,
            name,
        })
    }

    fn finish(&self) -> Result<(), ProtocolError> {
        if self.pos != self.buf.len() {
            return Err(ProtocolError::TrailingData {
                consumed: self.pos,
                declared: self.buf.len(),
            });
        }
        Ok(())
    }
}
