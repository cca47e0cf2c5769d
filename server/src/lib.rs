//! # Game Server Library
//!
//! The authoritative side of the snake arena. The server owns the only copy
//! of the [`shared::Game`] that is ever simulated; clients send button state
//! and receive full snapshots back.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every tick the server decodes the controls each client has sent since the
//! previous tick, advances the game by one fixed step, and resolves deaths
//! and apple respawns. Clients never simulate.
//!
//! ### Client Management
//! Handles the lifecycle of client connections:
//! - Capacity checks and a spawned player per connection
//! - One pair of framing buffers per connection
//! - Disconnection and idle-timeout cleanup, removing the player as well
//!
//! ### State Broadcasting
//! After each tick every client receives a state message in which its own
//! player is listed first, so the client always knows which snake it steers.
//!
//! ## Architecture Design
//!
//! ### Single Owner Event Loop
//! One task owns the game and the client registry and processes accepts,
//! network events and ticks sequentially. Bytes arriving between ticks are
//! only buffered; decoding happens at the tick boundary, so the game needs
//! no locking.
//!
//! ### TCP Transport
//! Messages are framed on a reliable byte stream. Each socket is split into a
//! reader task, which forwards whatever arrives to the main loop, and a
//! writer task, which drains an outgoing channel. Framing never assumes a
//! read returns a whole message.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection ids, capacity limit, per-connection buffers and idle detection.
//!
//! ### Network Module (`network`)
//! Listener, per-socket tasks and the fixed-rate loop driving the game.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use shared::{Game, GameConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let game = Game::new(GameConfig::default())?;
//!
//!     // 30Hz ticks, at most 16 clients
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         game,
//!         Duration::from_secs_f32(1.0 / 30.0),
//!         16,
//!     ).await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod network;
