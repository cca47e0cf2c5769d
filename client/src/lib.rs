//! # Game Client Library
//!
//! A headless client for the snake arena. It connects over TCP, sends its
//! button state at a fixed rate and keeps the latest authoritative snapshot
//! the server broadcasts after every tick.
//!
//! ## Architecture Overview
//!
//! The server is the only place the game is simulated. The client therefore
//! has no prediction or reconciliation: whatever arrives in a state message
//! replaces what it knew before. The first player record in every snapshot
//! is the one this client controls.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Holds the newest snapshot and a small summary of the local snake.
//!
//! ### Input Module (`input`)
//! Button accumulator: press/release edges raise press counts, a flush turns
//! them into a controls message and starts a new counting window.
//!
//! ### Autopilot Module (`autopilot`)
//! Chooses a direction from the latest snapshot, standing in for a keyboard.
//!
//! ### Network Module (`network`)
//! TCP stream handling. Reads are appended to the receive buffer and every
//! complete state message is decoded, however the bytes were split.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("127.0.0.1:8080", Duration::from_millis(100)).await?;
//!
//!     // play until 300 snapshots have arrived
//!     client.run(Some(300)).await?;
//!     Ok(())
//! }
//! ```

pub mod autopilot;
pub mod game;
pub mod input;
pub mod network;
