//! Client-side mirror of the replicated characters
//!
//! The mirror never decides a combat transition. It applies whatever the
//! server multicasts, drives the transform of its own character from the
//! acknowledged movement, and reports the end of its attack animation.

use crate::input::{InputEvents, InputFrame};
use log::{debug, info, warn};
use shared::indicator::{facing_camera, IndicatorPool, IndicatorSpawner};
use shared::interaction::Hud;
use shared::timer::{seconds, TimerManager};
use shared::{
    Authority, CharacterId, CharacterSnapshot, CharacterState, GameConfig, Packet, ServerRpc,
    Transform, Vec3,
};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

const CAMERA_BOOM_LENGTH: f32 = 300.0;
const CAMERA_HEIGHT: f32 = 60.0;

pub struct ClientGameState {
    pub local_id: Option<CharacterId>,
    pub config: GameConfig,
    pub characters: HashMap<CharacterId, CharacterState>,
    pub indicators: IndicatorPool,
    pub last_sync_tick: Option<u32>,
    hud: Option<Box<dyn Hud + Send>>,
    attack_timer: TimerManager<CharacterId>,
    /// Local override of the attack animation length
    attack_duration: Option<Duration>,
    pending_level: Option<String>,
}

impl ClientGameState {
    pub fn new() -> Self {
        let config = GameConfig::default();
        Self {
            local_id: None,
            indicators: IndicatorPool::new(config.indicator_lifetime, config.indicator_rise_height),
            config,
            characters: HashMap::new(),
            last_sync_tick: None,
            hud: None,
            attack_timer: TimerManager::new(),
            attack_duration: None,
            pending_level: None,
        }
    }

    pub fn with_hud(mut self, hud: Box<dyn Hud + Send>) -> Self {
        self.hud = Some(hud);
        self
    }

    pub fn set_attack_duration(&mut self, seconds: Option<f32>) {
        self.attack_duration = seconds
            .filter(|s| *s >= 0.0)
            .map(shared::timer::seconds);
    }

    pub fn local_character(&self) -> Option<&CharacterState> {
        self.local_id.and_then(|id| self.characters.get(&id))
    }

    fn local_character_mut(&mut self) -> Option<&mut CharacterState> {
        let id = self.local_id?;
        self.characters.get_mut(&id)
    }

    /// Third-person camera behind the owned character
    pub fn camera_location(&self) -> Vec3 {
        match self.local_character() {
            Some(character) => {
                let behind = character.control_rotation.yaw_only().forward() * -CAMERA_BOOM_LENGTH;
                character.location() + behind + Vec3::new(0.0, 0.0, CAMERA_HEIGHT)
            }
            None => Vec3::ZERO,
        }
    }

    /// Level the server asked this client to travel to, if any
    pub fn take_pending_level(&mut self) -> Option<String> {
        self.pending_level.take()
    }

    pub fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected { client_id, config } => self.on_connected(client_id, config),

            Packet::MoveForwardAck { value } => {
                if let Some(character) = self.local_character_mut() {
                    character.apply_forward(value);
                }
            }

            Packet::MoveRightApplied { character, value } => {
                let owned = self.local_id == Some(character);
                if let Some(c) = self.characters.get_mut(&character) {
                    if owned {
                        c.apply_right(value);
                    } else {
                        // Remote proxies have no controller to move them
                        c.right_input = c.gate_axis(value);
                    }
                }
            }

            Packet::AttackBegan { character } => self.on_attack_began(character),

            Packet::AttackEnded { character } => {
                if let Some(c) = self.characters.get_mut(&character) {
                    c.leave_attack();
                }
                self.attack_timer.cancel(&character);
            }

            Packet::StunBegan { character } => {
                if let Some(c) = self.characters.get_mut(&character) {
                    c.enter_stun();
                }
            }

            Packet::StunFinished { character } => {
                if let Some(c) = self.characters.get_mut(&character) {
                    c.leave_stun();
                }
            }

            Packet::StunIndicatorSpawn {
                character,
                location,
            } => {
                let rotation = facing_camera(location, self.camera_location());
                self.indicators.spawn_indicator(location, rotation);
                debug!("Stun indicator for character {} at {:?}", character, location);
            }

            Packet::CharacterSpawned {
                character,
                transform,
            } => self.spawn(character, transform),

            Packet::CharacterRemoved { character } => {
                self.characters.remove(&character);
                self.attack_timer.cancel(&character);
            }

            Packet::HealthChanged { current, max } => self.on_health_changed(current, max),

            Packet::ItemCollected {
                character,
                pickup,
                damage,
            } => {
                info!(
                    "Character {} collected pickup {} for {} damage",
                    character, pickup, damage
                );
            }

            Packet::OpenLevel { name } => {
                info!("Opening level {}", name);
                self.pending_level = Some(name);
            }

            Packet::StateSync { tick, characters } => self.apply_state_sync(tick, characters),

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.local_id = None;
            }

            other => warn!("Unexpected packet type {:?}", other),
        }
    }

    fn on_connected(&mut self, client_id: u32, config: GameConfig) {
        info!("Connected! Client ID: {}", client_id);
        self.local_id = Some(client_id);
        self.indicators =
            IndicatorPool::new(config.indicator_lifetime, config.indicator_rise_height);
        self.config = config;
    }

    fn spawn(&mut self, id: CharacterId, transform: Transform) {
        let max_hit_points = self.config.max_hit_points;
        self.characters
            .entry(id)
            .or_insert_with(|| CharacterState::new(id, transform, max_hit_points));
    }

    fn on_attack_began(&mut self, character: CharacterId) {
        if let Some(c) = self.characters.get_mut(&character) {
            c.enter_attack();
        }

        if self.local_id == Some(character) {
            let duration = self
                .attack_duration
                .unwrap_or_else(|| self.config.attack_time());
            self.attack_timer.reschedule(character, duration);
        }
    }

    fn on_health_changed(&mut self, current: i32, max: i32) {
        if let Some(character) = self.local_character_mut() {
            character.set_health(current, max);
        }

        match self.hud.as_mut() {
            Some(hud) => hud.set_health(current, max),
            None => warn!("No HUD to show health {}/{}", current, max),
        }
    }

    fn apply_state_sync(&mut self, tick: u32, snapshots: Vec<CharacterSnapshot>) {
        if self.last_sync_tick.is_some_and(|last| tick < last) {
            debug!("Ignoring stale state sync {}", tick);
            return;
        }
        self.last_sync_tick = Some(tick);

        let max_hit_points = self.config.max_hit_points;
        let mut seen = HashSet::new();

        for snapshot in snapshots {
            seen.insert(snapshot.id);
            let owned = self.local_id == Some(snapshot.id);

            let character = self.characters.entry(snapshot.id).or_insert_with(|| {
                CharacterState::new(snapshot.id, snapshot.transform, max_hit_points)
            });

            // The owner drives its own transform, except while the server
            // holds its location frozen
            let locked = snapshot.replicated.is_attacking || snapshot.replicated.is_stunned;
            if !owned {
                character.transform = snapshot.transform;
            } else if locked {
                character.transform.location = snapshot.transform.location;
            }
            character.apply_replicated(&snapshot.replicated, owned);
        }

        self.characters.retain(|id, _| seen.contains(id));
    }

    /// Applies one frame of local input and returns the calls to send
    pub fn local_input(&mut self, frame: &InputFrame, events: InputEvents, dt: f32) -> Vec<ServerRpc> {
        if events.show_info_pressed {
            self.log_actors();
        }

        let base_turn_rate = self.config.base_turn_rate;
        let base_look_up_rate = self.config.base_look_up_rate;
        let walk_speed = self.config.walk_speed;

        let Some(character) = self.local_character_mut() else {
            return Vec::new();
        };

        character.turn(frame.turn, base_turn_rate, dt);
        character.look_up(frame.look_up, base_look_up_rate, dt);
        character.consume_movement(walk_speed, dt);

        let mut rpcs = vec![
            ServerRpc::MoveForward {
                value: frame.move_forward,
            },
            ServerRpc::MoveRight {
                value: frame.move_right,
            },
        ];
        if events.attack_pressed {
            rpcs.push(ServerRpc::Attack);
        }
        rpcs.push(ServerRpc::ServerMove {
            transform: character.transform,
        });
        rpcs
    }

    /// Advances local effects and timers; returns calls they produced
    pub fn update(&mut self, dt: f32) -> Vec<ServerRpc> {
        self.indicators.tick(dt);

        let mut rpcs = Vec::new();
        for id in self.attack_timer.advance(seconds(dt)) {
            if self.local_id == Some(id) {
                debug!("Attack animation of {} finished", id);
                rpcs.push(ServerRpc::AttackFinished);
            }
        }

        rpcs
    }

    /// Dumps the mirrored scene to the log
    pub fn log_actors(&self) {
        let mut ids: Vec<&CharacterId> = self.characters.keys().collect();
        ids.sort();
        for id in ids {
            warn!("Found an actor - Character_{} - Character", id);
        }
        for (index, _) in self.indicators.indicators().iter().enumerate() {
            warn!("Found an actor - StunIndicator_{} - StunIndicator", index);
        }
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}

impl Authority for ClientGameState {
    fn is_authoritative(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::gate::authorize;
    use shared::{MovementMode, Rejection, ReplicatedCharacter};
    use std::sync::{Arc, Mutex};

    struct SharedHud(Arc<Mutex<Vec<(i32, i32)>>>);

    impl Hud for SharedHud {
        fn set_health(&mut self, current: i32, max: i32) {
            self.0.lock().unwrap().push((current, max));
        }
    }

    fn connected() -> ClientGameState {
        let mut game = ClientGameState::new();
        game.handle_packet(Packet::Connected {
            client_id: 1,
            config: GameConfig::default(),
        });
        game.handle_packet(Packet::CharacterSpawned {
            character: 1,
            transform: Transform::default(),
        });
        game.handle_packet(Packet::CharacterSpawned {
            character: 2,
            transform: Transform::at(Vec3::new(500.0, 0.0, 0.0)),
        });
        game
    }

    fn snapshot(id: CharacterId, location: Vec3, replicated: ReplicatedCharacter) -> CharacterSnapshot {
        CharacterSnapshot {
            id,
            transform: Transform::at(location),
            replicated,
        }
    }

    fn idle() -> ReplicatedCharacter {
        ReplicatedCharacter {
            forward_input: 0.0,
            right_input: 0.0,
            turn_rate: 0.0,
            is_attacking: false,
            is_stunned: false,
            use_controller_rotation_yaw: false,
        }
    }

    #[test]
    fn test_connected_sets_local_and_config() {
        let game = connected();
        assert_eq!(game.local_id, Some(1));
        assert_eq!(game.characters.len(), 2);
        assert!(!game.is_authoritative());
    }

    #[test]
    fn test_forward_ack_moves_owned_character() {
        let mut game = connected();
        game.handle_packet(Packet::MoveForwardAck { value: 1.0 });

        let rpcs = game.local_input(&InputFrame::default(), InputEvents::default(), 0.1);
        let location = game.local_character().unwrap().location();
        assert_approx_eq!(location.x, 60.0, 1e-3);

        match rpcs.last() {
            Some(ServerRpc::ServerMove { transform }) => {
                assert_approx_eq!(transform.location.x, 60.0, 1e-3)
            }
            other => panic!("Expected ServerMove, got {:?}", other),
        }
    }

    #[test]
    fn test_remote_strafe_sets_value_only() {
        let mut game = connected();
        game.handle_packet(Packet::MoveRightApplied {
            character: 2,
            value: 1.0,
        });

        let remote = &game.characters[&2];
        assert_eq!(remote.right_input, 1.0);
        assert!(remote.pending_movement().abs_diff_eq(Vec3::ZERO, 1e-4));
    }

    #[test]
    fn test_owned_strafe_ignored_while_locked() {
        let mut game = connected();
        game.handle_packet(Packet::StunBegan { character: 1 });
        game.handle_packet(Packet::MoveRightApplied {
            character: 1,
            value: 1.0,
        });

        let local = game.local_character().unwrap();
        assert_eq!(local.right_input, 0.0);
        assert!(local.pending_movement().abs_diff_eq(Vec3::ZERO, 1e-4));
    }

    #[test]
    fn test_attack_animation_reports_completion() {
        let mut game = connected();
        game.handle_packet(Packet::AttackBegan { character: 1 });
        assert_eq!(
            game.local_character().unwrap().movement_mode,
            MovementMode::None
        );

        assert!(game.update(0.5).is_empty());
        assert_eq!(game.update(0.5), vec![ServerRpc::AttackFinished]);
        assert!(game.update(1.0).is_empty());
    }

    #[test]
    fn test_remote_attack_has_no_local_timer() {
        let mut game = connected();
        game.handle_packet(Packet::AttackBegan { character: 2 });
        assert!(game.characters[&2].is_attacking);
        assert!(game.update(2.0).is_empty());
    }

    #[test]
    fn test_attack_duration_override() {
        let mut game = connected();
        game.set_attack_duration(Some(0.2));
        game.handle_packet(Packet::AttackBegan { character: 1 });
        assert_eq!(game.update(0.25), vec![ServerRpc::AttackFinished]);
    }

    #[test]
    fn test_attack_ended_cancels_timer() {
        let mut game = connected();
        game.handle_packet(Packet::AttackBegan { character: 1 });
        game.handle_packet(Packet::AttackEnded { character: 1 });

        assert_eq!(
            game.local_character().unwrap().movement_mode,
            MovementMode::Walking
        );
        assert!(game.update(1.0).is_empty());
    }

    #[test]
    fn test_stun_indicator_rises_and_expires() {
        let mut game = connected();
        game.handle_packet(Packet::StunIndicatorSpawn {
            character: 2,
            location: Vec3::new(500.0, 0.0, 0.0),
        });
        assert_eq!(game.indicators.len(), 1);

        game.update(1.5);
        let indicator = &game.indicators.indicators()[0];
        assert_approx_eq!(indicator.location.z, 50.0, 1e-3);

        game.update(1.5);
        assert!(game.indicators.is_empty());
    }

    #[test]
    fn test_state_sync_respects_owner_transform() {
        let mut game = connected();
        let mut replicated = idle();
        replicated.turn_rate = 0.9;

        game.characters.get_mut(&1).unwrap().turn_rate = 0.25;
        game.handle_packet(Packet::StateSync {
            tick: 5,
            characters: vec![
                snapshot(1, Vec3::new(999.0, 0.0, 0.0), replicated),
                snapshot(2, Vec3::new(10.0, 20.0, 0.0), replicated),
            ],
        });

        let local = &game.characters[&1];
        assert_eq!(local.location(), Vec3::ZERO);
        assert_eq!(local.turn_rate, 0.25);

        let remote = &game.characters[&2];
        assert_eq!(remote.location(), Vec3::new(10.0, 20.0, 0.0));
        assert_eq!(remote.turn_rate, 0.9);
    }

    #[test]
    fn test_state_sync_corrects_locked_owner_location() {
        let mut game = connected();
        let mut stunned = idle();
        stunned.is_stunned = true;

        // A move made locally before the stun reached this client
        {
            let local = game.characters.get_mut(&1).unwrap();
            local.transform.location = Vec3::new(40.0, 0.0, 0.0);
            local.transform.rotation.yaw = 30.0;
        }

        game.handle_packet(Packet::StateSync {
            tick: 5,
            characters: vec![
                snapshot(1, Vec3::new(10.0, 0.0, 0.0), stunned),
                snapshot(2, Vec3::new(500.0, 0.0, 0.0), idle()),
            ],
        });

        let local = &game.characters[&1];
        assert_eq!(local.location(), Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(local.transform.rotation.yaw, 30.0);
        assert!(local.is_stunned);
        assert_eq!(local.movement_mode, MovementMode::None);
    }

    #[test]
    fn test_state_sync_drops_missing_and_stale() {
        let mut game = connected();
        game.handle_packet(Packet::StateSync {
            tick: 10,
            characters: vec![snapshot(1, Vec3::ZERO, idle())],
        });
        assert!(!game.characters.contains_key(&2));

        game.handle_packet(Packet::StateSync {
            tick: 9,
            characters: vec![
                snapshot(1, Vec3::ZERO, idle()),
                snapshot(3, Vec3::ZERO, idle()),
            ],
        });
        assert!(!game.characters.contains_key(&3));
    }

    #[test]
    fn test_health_changed_reaches_hud() {
        let record = Arc::new(Mutex::new(Vec::new()));
        let mut game = ClientGameState::new().with_hud(Box::new(SharedHud(Arc::clone(&record))));
        game.handle_packet(Packet::Connected {
            client_id: 1,
            config: GameConfig::default(),
        });
        game.handle_packet(Packet::CharacterSpawned {
            character: 1,
            transform: Transform::default(),
        });

        game.handle_packet(Packet::HealthChanged { current: 70, max: 100 });

        assert_eq!(*record.lock().unwrap(), vec![(70, 100)]);
        assert_eq!(game.local_character().unwrap().current_hit_points, 70);
    }

    #[test]
    fn test_health_changed_without_hud_is_harmless() {
        let mut game = connected();
        game.handle_packet(Packet::HealthChanged { current: 0, max: 100 });
        assert!(game.local_character().unwrap().is_dead());
    }

    #[test]
    fn test_open_level_is_taken_once() {
        let mut game = connected();
        game.handle_packet(Packet::OpenLevel {
            name: "LevelMenu".to_string(),
        });
        assert_eq!(game.take_pending_level().as_deref(), Some("LevelMenu"));
        assert_eq!(game.take_pending_level(), None);
    }

    #[test]
    fn test_mirror_fails_authority_gate() {
        let game = connected();
        assert_eq!(authorize(&game), Err(Rejection::Unauthorized));
    }

    #[test]
    fn test_local_input_sends_attack_on_press() {
        let mut game = connected();
        let frame = InputFrame {
            move_forward: 1.0,
            move_right: -0.5,
            attack: true,
            ..InputFrame::default()
        };
        let events = InputEvents {
            attack_pressed: true,
            show_info_pressed: true,
        };

        let rpcs = game.local_input(&frame, events, 0.016);
        assert_eq!(rpcs[0], ServerRpc::MoveForward { value: 1.0 });
        assert_eq!(rpcs[1], ServerRpc::MoveRight { value: -0.5 });
        assert_eq!(rpcs[2], ServerRpc::Attack);
        assert!(matches!(rpcs[3], ServerRpc::ServerMove { .. }));
    }

    #[test]
    fn test_local_input_before_connect_is_empty() {
        let mut game = ClientGameState::new();
        let rpcs = game.local_input(&InputFrame::default(), InputEvents::default(), 0.016);
        assert!(rpcs.is_empty());
    }

    #[test]
    fn test_turn_while_stunned_keeps_rate_zero() {
        let mut game = connected();
        game.handle_packet(Packet::StunBegan { character: 1 });
        let frame = InputFrame {
            turn: 1.0,
            ..InputFrame::default()
        };

        game.local_input(&frame, InputEvents::default(), 1.0);
        let local = game.local_character().unwrap();
        assert_eq!(local.turn_rate, 0.0);
        assert_approx_eq!(local.control_rotation.yaw, 45.0, 1e-3);
    }
}
