//! Per-character state and the local effects of every replicated transition
//!
//! Both sides hold a `CharacterState` per character. The server's copy is
//! canonical; clients mutate their mirrors only in response to multicasts
//! and state syncs, never on their own initiative for the authority-gated
//! flags.

use crate::math::{Rotator, Transform, Vec3};
use serde::{Deserialize, Serialize};

pub type CharacterId = u32;

/// Control pitch is clamped to plus or minus this many degrees
pub const MAX_CONTROL_PITCH: f32 = 89.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementMode {
    Walking,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatState {
    Idle,
    Attacking,
    Stunned,
}

/// The two authority-gated flags, detached from the rest of the state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CombatFlags {
    pub is_attacking: bool,
    pub is_stunned: bool,
}

/// Replicated character fields in wire order: three floats, three booleans
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReplicatedCharacter {
    pub forward_input: f32,
    pub right_input: f32,
    /// Observability only; the owning client is the writer
    pub turn_rate: f32,
    pub is_attacking: bool,
    pub is_stunned: bool,
    pub use_controller_rotation_yaw: bool,
}

#[derive(Debug, Clone)]
pub struct CharacterState {
    pub id: CharacterId,
    pub transform: Transform,
    /// Where the controlling player is looking; drives camera-relative movement
    pub control_rotation: Rotator,
    pub movement_mode: MovementMode,

    pub forward_input: f32,
    pub right_input: f32,
    pub turn_rate: f32,

    pub is_attacking: bool,
    pub is_stunned: bool,
    /// Replicated shadow of `use_controller_rotation_yaw`
    pub use_controller_rotation_yaw_replicated: bool,
    pub use_controller_rotation_yaw: bool,

    pub current_hit_points: i32,
    pub max_hit_points: i32,

    pending_movement: Vec3,
}

impl CharacterState {
    pub fn new(id: CharacterId, transform: Transform, max_hit_points: i32) -> Self {
        let max_hit_points = max_hit_points.max(0);
        Self {
            id,
            transform,
            control_rotation: transform.rotation,
            movement_mode: MovementMode::Walking,
            forward_input: 0.0,
            right_input: 0.0,
            turn_rate: 0.0,
            is_attacking: false,
            is_stunned: false,
            use_controller_rotation_yaw_replicated: false,
            use_controller_rotation_yaw: false,
            current_hit_points: max_hit_points,
            max_hit_points,
            pending_movement: Vec3::ZERO,
        }
    }

    pub fn location(&self) -> Vec3 {
        self.transform.location
    }

    pub fn is_walking(&self) -> bool {
        self.movement_mode == MovementMode::Walking
    }

    pub fn combat_flags(&self) -> CombatFlags {
        CombatFlags {
            is_attacking: self.is_attacking,
            is_stunned: self.is_stunned,
        }
    }

    /// Stun dominates attack when both flags are set
    pub fn combat_state(&self) -> CombatState {
        if self.is_stunned {
            CombatState::Stunned
        } else if self.is_attacking {
            CombatState::Attacking
        } else {
            CombatState::Idle
        }
    }

    pub fn is_dead(&self) -> bool {
        self.current_hit_points <= 0
    }

    pub fn replicated(&self) -> ReplicatedCharacter {
        ReplicatedCharacter {
            forward_input: self.forward_input,
            right_input: self.right_input,
            turn_rate: self.turn_rate,
            is_attacking: self.is_attacking,
            is_stunned: self.is_stunned,
            use_controller_rotation_yaw: self.use_controller_rotation_yaw_replicated,
        }
    }

    /// Overwrites the mirror with the server's replicated values.
    ///
    /// The owning client keeps its own `turn_rate`, since it is the writer
    /// of that field.
    pub fn apply_replicated(&mut self, replicated: &ReplicatedCharacter, owns_turn_rate: bool) {
        self.forward_input = replicated.forward_input;
        self.right_input = replicated.right_input;
        if !owns_turn_rate {
            self.turn_rate = replicated.turn_rate;
        }
        self.is_attacking = replicated.is_attacking;
        self.is_stunned = replicated.is_stunned;
        self.use_controller_rotation_yaw_replicated = replicated.use_controller_rotation_yaw;
        self.use_controller_rotation_yaw = self.use_controller_rotation_yaw_replicated;
        self.movement_mode = if self.is_attacking || self.is_stunned {
            MovementMode::None
        } else {
            MovementMode::Walking
        };
    }

    /// Axis values only pass through while walking
    pub fn gate_axis(&self, value: f32) -> f32 {
        if self.is_walking() {
            value
        } else {
            0.0
        }
    }

    pub fn enter_attack(&mut self) {
        self.movement_mode = MovementMode::None;
        self.is_attacking = true;
    }

    pub fn leave_attack(&mut self) {
        self.is_attacking = false;
        if !self.is_stunned {
            self.movement_mode = MovementMode::Walking;
        }
    }

    pub fn enter_stun(&mut self) {
        self.movement_mode = MovementMode::None;
        self.use_controller_rotation_yaw_replicated = false;
        self.use_controller_rotation_yaw = self.use_controller_rotation_yaw_replicated;
        self.is_stunned = true;
    }

    pub fn leave_stun(&mut self) {
        self.use_controller_rotation_yaw_replicated = true;
        self.use_controller_rotation_yaw = self.use_controller_rotation_yaw_replicated;
        self.is_stunned = false;
        if !self.is_attacking {
            self.movement_mode = MovementMode::Walking;
        }
    }

    /// Queues movement for the next `consume_movement`
    pub fn add_movement_input(&mut self, direction: Vec3, scale: f32) {
        self.pending_movement += direction * scale;
    }

    pub fn pending_movement(&self) -> Vec3 {
        self.pending_movement
    }

    /// Moves the character by the queued input and clears the queue.
    ///
    /// Queued input is discarded without effect while not walking.
    pub fn consume_movement(&mut self, walk_speed: f32, dt: f32) -> Vec3 {
        let pending = std::mem::replace(&mut self.pending_movement, Vec3::ZERO);
        if !self.is_walking() || pending.abs_diff_eq(Vec3::ZERO, 1e-4) {
            return Vec3::ZERO;
        }

        // Diagonal input is no faster than straight input
        let magnitude = pending.length();
        let direction = if magnitude > 1.0 {
            pending * (1.0 / magnitude)
        } else {
            pending
        };

        let delta = direction * (walk_speed * dt);
        self.transform.location += delta;
        if delta.truncate().length() > 1e-4 {
            self.transform.rotation = Rotator::from_direction(Vec3::new(delta.x, delta.y, 0.0));
        }
        delta
    }

    /// Applies an acknowledged forward value along the control heading
    pub fn apply_forward(&mut self, value: f32) {
        if value != 0.0 {
            let direction = self.control_rotation.yaw_only().forward();
            self.add_movement_input(direction, value);
        }
    }

    /// Receiving side of the strafe multicast.
    ///
    /// Each receiver re-checks its own movement mode and derives the
    /// direction from its own control rotation.
    pub fn apply_right(&mut self, value: f32) {
        if self.is_walking() {
            self.right_input = value;
            if value != 0.0 {
                let direction = self.control_rotation.yaw_only().right();
                self.add_movement_input(direction, value);
            }
        } else {
            self.right_input = 0.0;
        }
    }

    /// Local turn: the observability rate is gated, the yaw is not
    pub fn turn(&mut self, rate: f32, base_turn_rate: f32, dt: f32) {
        self.turn_rate = self.gate_axis(rate);
        self.control_rotation.yaw += rate * base_turn_rate * dt;
        self.control_rotation = self.control_rotation.normalized();
    }

    pub fn look_up(&mut self, rate: f32, base_look_up_rate: f32, dt: f32) {
        let pitch = self.control_rotation.pitch + rate * base_look_up_rate * dt;
        self.control_rotation.pitch = pitch.clamp(-MAX_CONTROL_PITCH, MAX_CONTROL_PITCH);
    }

    /// Subtracts `damage` and clamps into `[0, max_hit_points]`
    pub fn apply_damage(&mut self, damage: i32) -> i32 {
        let next = self.current_hit_points.saturating_sub(damage);
        self.current_hit_points = next.clamp(0, self.max_hit_points);
        self.current_hit_points
    }

    pub fn set_health(&mut self, current: i32, max: i32) {
        self.max_hit_points = max.max(0);
        self.current_hit_points = current.clamp(0, self.max_hit_points);
    }
}
