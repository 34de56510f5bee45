//! # Character Client Library
//!
//! The non-authoritative side of the brawler. A client owns exactly one
//! character: it samples input, sends movement and attack requests to the
//! server as calls, and mirrors whatever the server replicates back.
//!
//! ## Architecture Overview
//!
//! ### Requests, Not Decisions
//! Attacks and stuns are never applied locally on request. The client asks,
//! the server validates, and the resulting multicast updates every mirror,
//! the requester's included.
//!
//! ### Owner-Driven Transform
//! Forward movement is applied when the server acknowledges it; strafe
//! movement when the multicast arrives. The owning client moves its own
//! character and reports the transform back each frame.
//!
//! ### Local Effects
//! Stun indicators, the HUD, and the attack animation timer live only on
//! the client. When the animation timer elapses the client tells the server
//! its attack has finished.
//!
//! ## Module Organization
//!
//! - `game`: the mirrored world (`ClientGameState`)
//! - `hud`: a HUD that reports health through the log
//! - `input`: input sources, scripts, and call sequencing
//! - `network`: the TCP connection and the frame loop

pub mod game;
pub mod hud;
pub mod input;
pub mod network;
