//! Gameplay tuning shared by client and server
//!
//! The server owns the authoritative copy and hands it to every client in
//! the `Connected` packet so both sides agree on timings and limits.

use crate::timer::seconds;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How a stun interacts with an attack already in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StunPolicy {
    /// The attack flag survives the stun; both states coexist
    #[default]
    KeepAttack,
    /// Entering a stun cancels the attack first
    SupersedeAttack,
}

impl FromStr for StunPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keep" | "keep-attack" => Ok(StunPolicy::KeepAttack),
            "supersede" | "supersede-attack" => Ok(StunPolicy::SupersedeAttack),
            other => Err(format!("unknown stun policy '{}'", other)),
        }
    }
}

impl fmt::Display for StunPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StunPolicy::KeepAttack => write!(f, "keep-attack"),
            StunPolicy::SupersedeAttack => write!(f, "supersede-attack"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Seconds a stun lasts, measured from the latest accepted stun
    pub stun_duration: f32,
    pub max_hit_points: i32,
    /// Degrees per second at full turn input
    pub base_turn_rate: f32,
    pub base_look_up_rate: f32,
    pub walk_speed: f32,
    pub capsule_radius: f32,
    pub capsule_half_height: f32,
    pub indicator_lifetime: f32,
    pub indicator_rise_height: f32,
    /// Level opened when a character dies
    pub death_level: String,
    /// Length of the attack animation on the owning client
    pub attack_duration: f32,
    pub stun_policy: StunPolicy,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            stun_duration: 5.0,
            max_hit_points: 100,
            base_turn_rate: 45.0,
            base_look_up_rate: 45.0,
            walk_speed: 600.0,
            capsule_radius: 42.0,
            capsule_half_height: 96.0,
            indicator_lifetime: 3.0,
            indicator_rise_height: 100.0,
            death_level: "LevelMenu".to_string(),
            attack_duration: 0.8,
            stun_policy: StunPolicy::KeepAttack,
        }
    }
}

impl GameConfig {
    pub fn stun_time(&self) -> Duration {
        seconds(self.stun_duration)
    }

    pub fn attack_time(&self) -> Duration {
        seconds(self.attack_duration)
    }
}
