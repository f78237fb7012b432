//! # Match Client Library
//!
//! Client half of the soccer netcode. The client never simulates the whole
//! match: it mirrors the authoritative snapshots streamed by its room and
//! predicts only the one player the server currently assigns to it.
//!
//! ## Modules
//!
//! - `input`: turns per-frame controller samples into sequenced commands,
//!   with edge-triggered buttons and measured shot charge.
//! - `controller`: scripted controllers for headless runs.
//! - `prediction`: immediate local application of input, replay of
//!   unacknowledged commands and tiered correction toward the server.
//! - `interpolation`: smoothing of every entity the client does not predict.
//! - `game`: the mirror plus predictor, and the per-frame render view.
//! - `network`: UDP connection and the frame loop.
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::controller::RandomWalk;
//! use client::network::Client;
//! use shared::{Clock, GameConfig, MonotonicClock};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
//! let mut client = Client::new(
//!     "127.0.0.1:8080",
//!     GameConfig::default(),
//!     Box::new(RandomWalk::new()),
//!     clock,
//! )
//! .await?;
//! client.run(None).await?;
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod game;
pub mod input;
pub mod interpolation;
pub mod network;
pub mod prediction;
