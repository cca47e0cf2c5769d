//! # Gridsnake shared core
//!
//! Everything both ends of the connection agree on: the wire protocol, the
//! arena model and the authoritative simulation.
//!
//! ## Modules
//! - [`protocol`]: `[type][24-bit length][payload]` framing
//! - [`connection`]: per-peer send and receive byte queues
//! - [`controls`]: button accumulator and the fixed 5-byte controls message
//! - [`state`]: full-game snapshot message
//! - [`map`], [`spawn`]: the grid and free-cell placement
//! - [`game`]: players, apples and the fixed-timestep tick
//! - [`config`]: match settings loaded from JSON
//!
//! Decoding is always non-consuming until a complete message is present, so a
//! receive buffer can be filled in arbitrarily small pieces.

pub mod config;
pub mod connection;
pub mod controls;
pub mod error;
pub mod game;
pub mod map;
pub mod protocol;
pub mod spawn;
pub mod state;

pub use config::GameConfig;
pub use connection::{Connection, ConnectionEvent};
pub use controls::{Button, ButtonKind, Controls};
pub use error::{FrameError, GameError, ProtocolError};
pub use game::{Apple, AppleType, Direction, Game, Player, PlayerId, TickReport, TICK};
pub use map::{Cell, Map, MapBlock};
pub use protocol::MessageType;
pub use state::{send_state_message, PlayerState, Snapshot};
