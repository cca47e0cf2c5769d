//! Error types shared by the codecs, the map loader and the simulation.
//!
//! Three families, matching how the caller is expected to react:
//! - [`FrameError`] is a recoverable framing outcome (wait for bytes, or try a
//!   different decoder).
//! - [`ProtocolError`] is fatal for the connection that produced it.
//! - [`GameError`] covers map/config loading and spawn failures.

use crate::protocol::MessageType;
use thiserror::Error;

/// Non-consuming outcomes of inspecting the front of a receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("need more data")]
    NeedMoreData,
    #[error("unexpected message type {found:#04x}, expected {expected:?}")]
    UnexpectedType { found: u8, expected: MessageType },
}

/// Malformed or unencodable messages. The connection must be closed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("controls message with size {size} != {expected}")]
    ControlsSize { size: usize, expected: usize },
    #[error("payload of {len} bytes does not fit a 24-bit length field")]
    PayloadTooLarge { len: usize },
    #[error("ran out of bytes reading state message: needed {needed}, {available} left")]
    Truncated { needed: usize, available: usize },
    #[error("trailing data in state message: consumed {consumed} of {declared} bytes")]
    TrailingData { consumed: usize, declared: usize },
    #[error("invalid {field} value {value}")]
    InvalidValue { field: &'static str, value: u32 },
    #[error("player name is not valid UTF-8")]
    InvalidName,
    #[error("cannot encode {count} players, at most 255 fit")]
    TooManyPlayers { count: usize },
    #[error("unexpected message type {found:#04x}")]
    UnexpectedMessage { found: u8 },
}

/// Problems building a game or placing entities in it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    #[error("map must have non-zero size, got {width}x{height}")]
    EmptyMap { width: u32, height: u32 },
    #[error("map has {actual} blocks but {width}x{height} needs {expected}")]
    MapSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("map row {row} has width {actual}, expected {expected}")]
    RaggedMapRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("unknown map character {found:?} at row {row}, column {column}")]
    UnknownMapChar { found: char, row: usize, column: usize },
    #[error("player velocity must be positive and finite, got {0}")]
    InvalidVelocity(f32),
    #[error("no free cell left to spawn a player")]
    NoSpawnSpace,
    #[error("a player needs at least one body cell")]
    EmptyBody,
    #[error("cell ({x}, {y}) is blocked or occupied")]
    CellUnavailable { x: i32, y: i32 },
}
