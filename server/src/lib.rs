//! # Card Table Server Library
//!
//! This library provides the authoritative server for a cooperative card game
//! played at tables of two to six seats. It owns every live table and every
//! connected session, applies moves, enforces turn and idle time limits, and
//! pushes each viewer exactly the part of the game they are allowed to see.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Game State
//! All rule decisions are made here. Clients request moves; the server
//! validates them, appends the result to the table's action log and tells
//! everyone at the table what happened.
//!
//! ### Session Lifecycle
//! Handles the complete lifecycle of a connected user:
//! - Creating, joining and leaving tables
//! - Spectating live games and reviewing finished ones
//! - Re-attaching a user to their seat after a reconnect
//! - Replacing a session when the same user logs on twice
//!
//! ### Hidden Information
//! Every action leaving the server passes through the scrubber, which hides a
//! player's own cards from them while spectators and replays see everything.
//!
//! ## Architecture Design
//!
//! ### One Lock
//! The [`Lobby`] holds all tables and sessions and sits behind a single mutex
//! in the [`Coordinator`]. Commands, timer wake-ups and connection events each
//! run to completion under it, so two mutations never interleave.
//!
//! ### Cooperative Timers
//! Turn and idle timers are plain sleeping tasks. They are never cancelled;
//! each one re-checks under the lock whether the situation it was armed for
//! still holds and does nothing if not.
//!
//! ### Per-Session Delivery
//! Each session owns an unbounded FIFO channel. Events for a table are queued
//! while the lock is held, so every client sees them in emission order.
//!
//! ## Module Organization
//!
//! - `lobby`, `table`, `replay`, `ready`: the registry and the commands that
//!   move sessions between statuses
//! - `game`, `moves`, `score`: table state, move application and end rules
//! - `timers`, `coordinator`: time limits and the global lock
//! - `notify`, `scrub`, `session`: fan-out and per-viewer redaction
//! - `store`: finished-game persistence behind the [`ActionStore`] trait
//! - `network`, `connection`: the UDP front end
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{Coordinator, Lobby, MemoryStore, ServerConfig};
//! use server::network::Server;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let lobby = Lobby::new(ServerConfig::default(), Arc::new(MemoryStore::new()));
//!
//!     // Bind to an address with room for 64 clients, dropping any that stay
//!     // silent for 30 seconds
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Coordinator::new(lobby),
//!         64,
//!         Duration::from_secs(30),
//!     ).await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod coordinator;
pub mod deck;
pub mod error;
pub mod game;
pub mod lobby;
pub mod moves;
pub mod network;
pub mod notify;
pub mod ready;
pub mod replay;
pub mod score;
pub mod scrub;
pub mod session;
pub mod store;
pub mod table;
pub mod timers;
pub mod utils;

pub use config::ServerConfig;
pub use coordinator::Coordinator;
pub use error::{CommandError, GENERIC_FAILURE};
pub use game::{Game, Player, Spectator};
pub use lobby::Lobby;
pub use moves::{ActionCommand, MoveOutcome};
pub use scrub::Viewer;
pub use session::{EventSender, Session};
pub use store::{ActionStore, FinishedGame, MemoryStore, StoreError};
pub use timers::TimerRequest;
