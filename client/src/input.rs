//! Client input sampling with sequencing and edge detection
//!
//! The client runs headless, so input comes from an `InputSource`. The
//! bundled `ScriptedInput` drives a character through a fixed routine,
//! which is enough to exercise every server call.

use shared::{RpcEnvelope, ServerRpc};
use std::fmt;
use std::str::FromStr;

/// One frame of sampled input
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputFrame {
    pub move_forward: f32,
    pub move_right: f32,
    pub turn: f32,
    pub look_up: f32,
    /// Held state of the attack button
    pub attack: bool,
    /// Held state of the scene diagnostics button
    pub show_info: bool,
}

pub trait InputSource {
    /// Samples the device after `dt` seconds have passed
    fn sample(&mut self, dt: f32) -> InputFrame;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Script {
    /// Stands still
    #[default]
    Idle,
    /// Walks forward while turning
    Circle,
    /// Walks forward and attacks every few seconds
    Brawler,
    /// Strafes left and right
    Strafe,
}

impl FromStr for Script {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Ok(Script::Idle),
            "circle" => Ok(Script::Circle),
            "brawler" => Ok(Script::Brawler),
            "strafe" => Ok(Script::Strafe),
            other => Err(format!("unknown script '{}'", other)),
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Script::Idle => "idle",
            Script::Circle => "circle",
            Script::Brawler => "brawler",
            Script::Strafe => "strafe",
        };
        write!(f, "{}", name)
    }
}

const ATTACK_PERIOD: f32 = 2.0;
const ATTACK_HOLD: f32 = 0.1;
const STRAFE_PERIOD: f32 = 1.5;

/// Plays back a `Script`; the first frame also presses show-info
pub struct ScriptedInput {
    script: Script,
    elapsed: f32,
    frames: u64,
}

impl ScriptedInput {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            elapsed: 0.0,
            frames: 0,
        }
    }
}

impl InputSource for ScriptedInput {
    fn sample(&mut self, dt: f32) -> InputFrame {
        self.elapsed += dt.max(0.0);
        self.frames += 1;

        let mut frame = InputFrame {
            show_info: self.frames == 1,
            ..InputFrame::default()
        };

        match self.script {
            Script::Idle => {}
            Script::Circle => {
                frame.move_forward = 1.0;
                frame.turn = 0.5;
            }
            Script::Brawler => {
                frame.move_forward = 1.0;
                // Held for a short window once per period
                frame.attack = self.elapsed % ATTACK_PERIOD < ATTACK_HOLD;
            }
            Script::Strafe => {
                let phase = (self.elapsed / STRAFE_PERIOD) as u64;
                frame.move_right = if phase % 2 == 0 { 1.0 } else { -1.0 };
                frame.look_up = if phase % 2 == 0 { 0.2 } else { -0.2 };
            }
        }

        frame
    }
}

/// Button presses detected this frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputEvents {
    pub attack_pressed: bool,
    pub show_info_pressed: bool,
}

/// Turns sampled frames into press events and sequenced server calls
pub struct InputManager {
    next_sequence: u32,
    prev_attack: bool,
    prev_show_info: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            prev_attack: false,
            prev_show_info: false,
        }
    }

    /// Detects press events (held now, released last frame)
    pub fn update(&mut self, frame: &InputFrame) -> InputEvents {
        let events = InputEvents {
            attack_pressed: frame.attack && !self.prev_attack,
            show_info_pressed: frame.show_info && !self.prev_show_info,
        };

        self.prev_attack = frame.attack;
        self.prev_show_info = frame.show_info;
        events
    }

    /// Stamps a call with the next sequence number
    pub fn wrap(&mut self, rpc: ServerRpc) -> RpcEnvelope {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        RpcEnvelope { sequence, rpc }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_manager_creation() {
        let input_manager = InputManager::new();
        assert_eq!(input_manager.next_sequence, 1);
    }

    #[test]
    fn test_sequences_increase() {
        let mut manager = InputManager::new();
        assert_eq!(manager.wrap(ServerRpc::Attack).sequence, 1);
        assert_eq!(manager.wrap(ServerRpc::AttackFinished).sequence, 2);
    }

    #[test]
    fn test_attack_fires_on_press_only() {
        let mut manager = InputManager::new();
        let held = InputFrame {
            attack: true,
            ..InputFrame::default()
        };

        assert!(manager.update(&held).attack_pressed);
        assert!(!manager.update(&held).attack_pressed);
        manager.update(&InputFrame::default());
        assert!(manager.update(&held).attack_pressed);
    }

    #[test]
    fn test_script_parsing() {
        assert_eq!("Brawler".parse::<Script>(), Ok(Script::Brawler));
        assert!("dance".parse::<Script>().is_err());
        assert_eq!(Script::Strafe.to_string(), "strafe");
    }

    #[test]
    fn test_first_frame_shows_info() {
        let mut input = ScriptedInput::new(Script::Idle);
        assert!(input.sample(0.016).show_info);
        assert!(!input.sample(0.016).show_info);
    }

    #[test]
    fn test_brawler_attacks_periodically() {
        let mut input = ScriptedInput::new(Script::Brawler);
        let mut manager = InputManager::new();

        let presses = (0..240)
            .map(|_| input.sample(0.016))
            .filter(|frame| manager.update(frame).attack_pressed)
            .count();

        // Just under 4 seconds holds the button twice
        assert_eq!(presses, 2);
    }

    #[test]
    fn test_strafe_alternates() {
        let mut input = ScriptedInput::new(Script::Strafe);
        assert_eq!(input.sample(0.5).move_right, 1.0);
        assert_eq!(input.sample(1.5).move_right, -1.0);
    }
}
