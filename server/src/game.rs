//! Authoritative world: every character, every pickup, and the stun timers
//!
//! All canonical mutations happen here. Handlers never touch the network;
//! they queue `Outbound` packets which the network layer routes onto the
//! per-client channels after the tick.

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::gate::{authorize, validate};
use shared::interaction::{Hud, InteractionPipeline, ItemCollectedListener, LevelTransition};
use shared::overlap::{capsule_touches_sphere, capsules_overlap, OverlapKey, OverlapTracker};
use shared::pickup::{Pickup, PickupActor};
use shared::timer::TimerManager;
use shared::{
    Authority, CharacterId, CharacterSnapshot, CharacterState, GameConfig, Packet, PickupId,
    PickupKind, Rejection, Request, ServerRpc, StunPolicy, Transform, Vec3,
};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

const SPAWN_ORIGIN_X: f32 = 500.0;
const SPAWN_SPACING: f32 = 300.0;
const SPAWN_COLUMNS: u32 = 10;

/// A packet waiting to be routed by the network layer
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Enqueued on one client's channel
    To { client: u32, packet: Packet },
    /// Enqueued on every client's channel
    Multicast(Packet),
}

/// Turns collaborator callbacks into packets for the owning client
struct Relay {
    client: u32,
    outbound: Vec<Outbound>,
}

impl Relay {
    fn new(client: u32) -> Self {
        Self {
            client,
            outbound: Vec::new(),
        }
    }
}

impl Hud for Relay {
    fn set_health(&mut self, current: i32, max: i32) {
        self.outbound.push(Outbound::To {
            client: self.client,
            packet: Packet::HealthChanged { current, max },
        });
    }
}

impl LevelTransition for Relay {
    fn open_level(&mut self, name: &str) {
        self.outbound.push(Outbound::To {
            client: self.client,
            packet: Packet::OpenLevel {
                name: name.to_string(),
            },
        });
    }
}

impl ItemCollectedListener for Relay {
    fn item_collected(&mut self, character: CharacterId, pickup: PickupId, damage: i32) {
        self.outbound.push(Outbound::Multicast(Packet::ItemCollected {
            character,
            pickup,
            damage,
        }));
    }
}

/// Non-finite input becomes zero, everything else is clamped to [-1, 1]
fn clamp_axis(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

pub struct GameState {
    pub tick: u32,
    pub config: GameConfig,
    pub characters: HashMap<CharacterId, CharacterState>,
    pub pickups: HashMap<PickupId, PickupActor>,
    stun_timers: TimerManager<CharacterId>,
    overlaps: OverlapTracker,
    outbound: Vec<Outbound>,
    rng: StdRng,
    next_pickup_id: PickupId,
}

impl GameState {
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic world for tests and replays
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, rng: StdRng) -> Self {
        Self {
            tick: 0,
            config,
            characters: HashMap::new(),
            pickups: HashMap::new(),
            stun_timers: TimerManager::new(),
            overlaps: OverlapTracker::new(),
            outbound: Vec::new(),
            rng,
            next_pickup_id: 1,
        }
    }

    pub fn add_player(&mut self, client_id: u32) {
        // One grid cell per id; ids are never reused
        let index = client_id.saturating_sub(1);
        let spawn_x = SPAWN_ORIGIN_X + (index % SPAWN_COLUMNS) as f32 * SPAWN_SPACING;
        let spawn_y = (index / SPAWN_COLUMNS) as f32 * SPAWN_SPACING;
        let transform = Transform::at(Vec3::new(spawn_x, spawn_y, 0.0));
        let character = CharacterState::new(client_id, transform, self.config.max_hit_points);

        info!("Added character {} at ({}, {})", client_id, spawn_x, spawn_y);
        self.characters.insert(client_id, character);
        self.multicast(Packet::CharacterSpawned {
            character: client_id,
            transform,
        });
    }

    pub fn remove_player(&mut self, client_id: &u32) {
        if self.characters.remove(client_id).is_none() {
            return;
        }

        self.stun_timers.cancel(client_id);
        self.overlaps.forget_character(*client_id);
        self.multicast(Packet::CharacterRemoved {
            character: *client_id,
        });
        info!("Removed character {}", client_id);
    }

    pub fn add_pickup(&mut self, location: Vec3, kind: PickupKind) -> PickupId {
        let id = self.next_pickup_id;
        self.next_pickup_id += 1;
        self.pickups.insert(id, PickupActor::new(id, location, kind));
        debug!("Placed pickup {} at {:?}", id, location);
        id
    }

    /// Dispatches one server RPC from `client_id`'s channel
    pub fn handle_rpc(&mut self, client_id: u32, rpc: ServerRpc) -> Result<(), Rejection> {
        match rpc {
            ServerRpc::MoveForward { value } => self.move_forward(client_id, value).map(|_| ()),
            ServerRpc::MoveRight { value } => self.move_right(client_id, value).map(|_| ()),
            ServerRpc::Attack => self.begin_attack(client_id),
            ServerRpc::AttackFinished => self.finish_attack(client_id),
            ServerRpc::ServerMove { transform } => self.server_move(client_id, transform),
        }
    }

    /// Records the forward value and acknowledges it to the originator only.
    ///
    /// Returns the applied value, which is zero unless walking.
    pub fn move_forward(&mut self, id: CharacterId, value: f32) -> Result<f32, Rejection> {
        let character = self.character_mut(id)?;
        let applied = character.gate_axis(clamp_axis(value));
        character.forward_input = applied;
        let walking = character.is_walking();

        if walking {
            self.send_to(id, Packet::MoveForwardAck { value: applied });
        }
        Ok(applied)
    }

    /// Records the strafe value and multicasts it to every client
    pub fn move_right(&mut self, id: CharacterId, value: f32) -> Result<f32, Rejection> {
        let character = self.character_mut(id)?;
        let applied = character.gate_axis(clamp_axis(value));
        character.right_input = applied;

        self.multicast(Packet::MoveRightApplied {
            character: id,
            value: applied,
        });
        Ok(applied)
    }

    /// Accepts the owner's transform; location is frozen while movement is locked
    pub fn server_move(&mut self, id: CharacterId, transform: Transform) -> Result<(), Rejection> {
        let character = self.character_mut(id)?;
        let location = transform.location;
        if !location.is_finite() {
            warn!("Dropping non-finite move from character {}", id);
            return Ok(());
        }

        if character.is_walking() {
            character.transform.location = location;
        }
        character.transform.rotation = transform.rotation;
        Ok(())
    }

    pub fn begin_attack(&mut self, id: CharacterId) -> Result<(), Rejection> {
        authorize(&*self)?;
        let character = self.character_mut(id)?;
        validate(character.combat_flags(), Request::Attack)?;
        character.enter_attack();

        info!("Character {} attacks", id);
        self.multicast(Packet::AttackBegan { character: id });
        Ok(())
    }

    pub fn finish_attack(&mut self, id: CharacterId) -> Result<(), Rejection> {
        authorize(&*self)?;
        let character = self.character_mut(id)?;
        validate(character.combat_flags(), Request::AttackFinish)?;
        character.leave_attack();

        debug!("Character {} finished attacking", id);
        self.multicast(Packet::AttackEnded { character: id });
        Ok(())
    }

    /// Stuns `id` and spawns an indicator at `location` on every client
    pub fn begin_stun(&mut self, id: CharacterId, location: Vec3) -> Result<(), Rejection> {
        authorize(&*self)?;
        let policy = self.config.stun_policy;
        let stun_time = self.config.stun_time();

        let character = self.character_mut(id)?;
        validate(character.combat_flags(), Request::StunBegin)?;

        let cancel_attack = policy == StunPolicy::SupersedeAttack && character.is_attacking;
        if cancel_attack {
            character.leave_attack();
        }
        character.enter_stun();

        self.stun_timers.reschedule(id, stun_time);

        if cancel_attack {
            self.multicast(Packet::AttackEnded { character: id });
        }
        self.multicast(Packet::StunBegan { character: id });
        self.multicast(Packet::StunIndicatorSpawn {
            character: id,
            location,
        });

        info!("Character {} stunned for {:.1}s", id, stun_time.as_secs_f32());
        Ok(())
    }

    pub fn finish_stun(&mut self, id: CharacterId) -> Result<(), Rejection> {
        authorize(&*self)?;
        let character = self.character_mut(id)?;
        validate(character.combat_flags(), Request::StunFinish)?;
        character.leave_stun();

        self.stun_timers.cancel(&id);
        info!("Character {} recovered from stun", id);
        self.multicast(Packet::StunFinished { character: id });
        Ok(())
    }

    pub fn stun_time_remaining(&self, id: CharacterId) -> Option<Duration> {
        self.stun_timers.remaining(&id)
    }

    /// Fires expired stun timers, then evaluates new overlaps
    pub fn update(&mut self, dt: Duration) {
        for id in self.stun_timers.advance(dt) {
            if let Err(rejection) = self.finish_stun(id) {
                debug!("Stun expiry for {} dropped: {}", id, rejection);
            }
        }

        self.detect_overlaps();
        self.tick = self.tick.wrapping_add(1);
    }

    fn detect_overlaps(&mut self) {
        let radius = self.config.capsule_radius;
        let half_height = self.config.capsule_half_height;

        let mut ids: Vec<CharacterId> = self.characters.keys().copied().collect();
        ids.sort_unstable();

        let mut current = HashSet::new();
        for i in 0..ids.len() {
            let a = &self.characters[&ids[i]];
            for id_b in &ids[(i + 1)..] {
                let b = &self.characters[id_b];
                if capsules_overlap(a.location(), b.location(), radius, half_height) {
                    current.insert(OverlapKey::characters(a.id, b.id));
                }
            }

            for pickup in self.pickups.values() {
                if capsule_touches_sphere(
                    a.location(),
                    radius,
                    half_height,
                    pickup.location,
                    pickup.radius,
                ) {
                    current.insert(OverlapKey::Pickup(a.id, pickup.id));
                }
            }
        }

        for key in self.overlaps.update(current) {
            match key {
                OverlapKey::Characters(a, b) => {
                    self.handle_character_overlap(a, b);
                    self.handle_character_overlap(b, a);
                }
                OverlapKey::Pickup(character, pickup) => self.collect_pickup(character, pickup),
            }
        }
    }

    /// `target` touched `other`; an attacking `other` stuns `target`
    fn handle_character_overlap(&mut self, target: CharacterId, other: CharacterId) {
        let other_attacking = self
            .characters
            .get(&other)
            .is_some_and(|c| c.is_attacking);
        if !other_attacking {
            return;
        }

        let Some(location) = self.characters.get(&target).map(|c| c.location()) else {
            return;
        };

        if let Err(rejection) = self.begin_stun(target, location) {
            debug!("Stun of {} by {} dropped: {}", target, other, rejection);
        }
    }

    fn collect_pickup(&mut self, character_id: CharacterId, pickup_id: PickupId) {
        let Some(character) = self.characters.get_mut(&character_id) else {
            return;
        };
        let Some(pickup) = self.pickups.remove(&pickup_id) else {
            return;
        };

        let mut hud = Relay::new(character_id);
        let mut level = Relay::new(character_id);
        let mut collected = Relay::new(character_id);

        let outcome = InteractionPipeline::new(&self.config.death_level)
            .with_hud(&mut hud)
            .with_level_transition(&mut level)
            .with_listener(&mut collected)
            .pick_up(character, pickup, &mut self.rng);

        self.outbound.extend(hud.outbound);
        self.outbound.extend(level.outbound);
        self.outbound.extend(collected.outbound);

        if outcome.died {
            info!("Character {} was defeated", character_id);
        }
    }

    /// Full replicated state of every character, ordered by id
    pub fn snapshot(&self) -> Packet {
        let mut characters: Vec<CharacterSnapshot> =
            self.characters.values().map(CharacterSnapshot::from).collect();
        characters.sort_by_key(|c| c.id);

        Packet::StateSync {
            tick: self.tick,
            characters,
        }
    }

    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbound)
    }

    /// Dumps every actor in the world to the log
    pub fn log_actors(&self) {
        let mut ids: Vec<&CharacterId> = self.characters.keys().collect();
        ids.sort();
        for id in ids {
            let state = self.characters[id].combat_state();
            warn!("Found an actor - Character_{} - Character ({:?})", id, state);
        }

        let mut pickups: Vec<&PickupActor> = self.pickups.values().collect();
        pickups.sort_by_key(|p| p.id);
        for pickup in pickups {
            warn!(
                "Found an actor - Pickup_{} - {}",
                pickup.id,
                pickup.class_name()
            );
        }
    }

    fn character_mut(&mut self, id: CharacterId) -> Result<&mut CharacterState, Rejection> {
        self.characters
            .get_mut(&id)
            .ok_or(Rejection::UnknownCharacter(id))
    }

    fn send_to(&mut self, client: u32, packet: Packet) {
        self.outbound.push(Outbound::To { client, packet });
    }

    fn multicast(&mut self, packet: Packet) {
        self.outbound.push(Outbound::Multicast(packet));
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(GameConfig::default())
    }
}

impl Authority for GameState {
    fn is_authoritative(&self) -> bool {
        true
    }
}
