//! # Character Server Library
//!
//! The authoritative side of the brawler. It owns the canonical state of
//! every character, validates every combat transition, and relays the
//! outcome to connected clients over reliable ordered channels.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Attack and stun transitions only execute here. Each request passes the
//! authority check and the combat gate before any state changes. Rejected
//! requests are dropped silently apart from a debug log line.
//!
//! ### Input Relay
//! Movement axis values arrive as server calls. The forward value is
//! acknowledged to the originating client only; the strafe value is
//! multicast so every client applies it against its own copy.
//!
//! ### Stun Timers
//! Each character owns at most one stun-expiry timer. Arming a new stun
//! replaces any pending expiry, so a stale timer can never end a newer stun.
//!
//! ### Damage Pipeline
//! Pickups are collected when a character's capsule first touches them.
//! Health changes go back to the owning client, which updates its HUD and
//! travels to the menu level on death.
//!
//! ## Module Organization
//!
//! - `client_manager`: connection lifecycle, per-client call queues, outbound channels
//! - `game`: the authoritative world and every canonical mutation
//! - `network`: TCP accept loop, per-connection tasks, and the fixed-rate tick
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use shared::GameConfig;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(16),
//!         16,
//!         GameConfig::default(),
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;
