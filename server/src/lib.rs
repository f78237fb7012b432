//! # Match Server Library
//!
//! Authoritative side of the arcade soccer netcode. The server owns the
//! canonical match state of every room, steps it on a fixed timestep and
//! streams snapshots to the clients placed in that room.
//!
//! ## Architecture
//!
//! ### One task per room
//! Each room is a [`room::Room`] running in its own tokio task. Rooms share
//! no mutable state; the router only talks to them over channels, so rooms
//! scale out without any cross-room locking.
//!
//! ### Fixed timestep
//! A room feeds elapsed time from an injectable [`shared::Clock`] into an
//! accumulator and runs whole `1 / tick_rate` steps, at most
//! [`room::MAX_STEPS_PER_UPDATE`] per wake-up. Snapshots go out every
//! `tick_rate / broadcast_rate` ticks.
//!
//! ### Tick order
//! Inside [`game::GameState::step`]: membership changes, pause expiry,
//! participant check, input drain, control handoffs, movement, collisions,
//! ball, shot and pass actions, possession, then goal and timer.
//!
//! ## Module Organization
//!
//! - `network`: UDP socket, session routing, room supervision
//! - `client_manager`: connection registry and inactivity timeouts
//! - `room`: accumulator loop and room task
//! - `game`: per-room state, session inputs and the tick itself
//! - `match_phase`: waiting / playing / ended transitions, goals, timer
//! - `control`: which session drives which player
//! - `bots`: input sources for players without a human
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use shared::{GameConfig, MonotonicClock};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         GameConfig::default(),
//!         32,
//!         Arc::new(MonotonicClock::new()),
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bots;
pub mod client_manager;
pub mod control;
pub mod game;
pub mod match_phase;
pub mod network;
pub mod room;
