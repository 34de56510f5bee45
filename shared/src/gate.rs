//! Validation gate for authority-only transitions
//!
//! Every transition of the attack/stun machine is checked here before any
//! state is touched. The predicate is pure so it can be exercised without
//! a world, timers, or channels.

use crate::character::{CharacterId, CombatFlags};
use crate::Authority;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A transition somebody asked the authority to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    Attack,
    AttackFinish,
    StunBegin,
    StunFinish,
}

/// Why a request produced no state change.
///
/// None of these reach the requesting peer; handlers log them and move on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("validation gate refused {0:?}")]
    ValidationRejected(Request),
    #[error("mutation attempted without authority")]
    Unauthorized,
    #[error("no character with id {0}")]
    UnknownCharacter(CharacterId),
}

pub fn can_transition(flags: CombatFlags, request: Request) -> bool {
    match request {
        // Being mid-attack does not block a fresh attack request
        Request::Attack => !flags.is_stunned,
        Request::AttackFinish => flags.is_attacking,
        Request::StunBegin => !flags.is_stunned,
        Request::StunFinish => flags.is_stunned,
    }
}

/// Gate wrapper producing a `Rejection` the caller can propagate with `?`
pub fn validate(flags: CombatFlags, request: Request) -> Result<(), Rejection> {
    if can_transition(flags, request) {
        Ok(())
    } else {
        Err(Rejection::ValidationRejected(request))
    }
}

/// Early-return guard for authority-only code paths
pub fn authorize<A: Authority + ?Sized>(context: &A) -> Result<(), Rejection> {
    if context.is_authoritative() {
        Ok(())
    } else {
        Err(Rejection::Unauthorized)
    }
}
