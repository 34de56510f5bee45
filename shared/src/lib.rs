//! Types shared by the authoritative server and its clients: character
//! state, the validation gate, the wire protocol, and the collaborator
//! contracts the character code talks to.

pub mod character;
pub mod codec;
pub mod config;
pub mod gate;
pub mod indicator;
pub mod interaction;
pub mod math;
pub mod overlap;
pub mod pickup;
pub mod session;
pub mod timer;

pub use character::{
    CharacterId, CharacterState, CombatFlags, CombatState, MovementMode, ReplicatedCharacter,
};
pub use config::{GameConfig, StunPolicy};
pub use gate::{can_transition, Rejection, Request};
pub use math::{Rotator, Transform, Vec3};
pub use pickup::{PickupId, PickupKind};

use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;

/// Capability of the executing context to perform canonical mutations
pub trait Authority {
    fn is_authoritative(&self) -> bool;
}

/// Client to server calls, executed by the server on its next tick
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ServerRpc {
    MoveForward { value: f32 },
    MoveRight { value: f32 },
    Attack,
    /// The owner's attack animation completed
    AttackFinished,
    /// Client-driven transform of the owned character
    ServerMove { transform: Transform },
}

/// A server RPC tagged with its per-connection sequence number
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RpcEnvelope {
    pub sequence: u32,
    pub rpc: ServerRpc,
}

/// One character's entry in a state sync
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CharacterSnapshot {
    pub id: CharacterId,
    pub transform: Transform,
    pub replicated: ReplicatedCharacter,
}

impl From<&CharacterState> for CharacterSnapshot {
    fn from(c: &CharacterState) -> Self {
        Self {
            id: c.id,
            transform: c.transform,
            replicated: c.replicated(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Rpc(RpcEnvelope),
    Disconnect,

    Connected {
        client_id: u32,
        config: GameConfig,
    },
    /// Sent to the originating client only
    MoveForwardAck {
        value: f32,
    },
    MoveRightApplied {
        character: CharacterId,
        value: f32,
    },
    AttackBegan {
        character: CharacterId,
    },
    AttackEnded {
        character: CharacterId,
    },
    StunBegan {
        character: CharacterId,
    },
    StunFinished {
        character: CharacterId,
    },
    StunIndicatorSpawn {
        character: CharacterId,
        location: Vec3,
    },
    CharacterSpawned {
        character: CharacterId,
        transform: Transform,
    },
    CharacterRemoved {
        character: CharacterId,
    },
    HealthChanged {
        current: i32,
        max: i32,
    },
    ItemCollected {
        character: CharacterId,
        pickup: PickupId,
        damage: i32,
    },
    OpenLevel {
        name: String,
    },
    StateSync {
        tick: u32,
        characters: Vec<CharacterSnapshot>,
    },
    Disconnected {
        reason: String,
    },
}
