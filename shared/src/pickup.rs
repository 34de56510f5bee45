//! Pickup capability and the pickups the world can hold

use crate::math::Vec3;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type PickupId = u32;

/// Bounds of `deal_damage`, lower inclusive, upper exclusive
pub const DEAL_DAMAGE_MIN: i32 = 10;
pub const DEAL_DAMAGE_MAX: i32 = 20;

pub const PICKUP_RADIUS: f32 = 30.0;

/// Anything a character can collect by touching it
pub trait Pickup {
    /// Invoked exactly once per collection; returns the damage to apply
    fn interact(&mut self, rng: &mut dyn RngCore) -> i32;

    fn class_name(&self) -> &'static str;
}

/// Random damage in `[DEAL_DAMAGE_MIN, DEAL_DAMAGE_MAX)`
pub fn deal_damage<R: Rng + ?Sized>(rng: &mut R) -> i32 {
    rng.gen_range(DEAL_DAMAGE_MIN..DEAL_DAMAGE_MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PickupKind {
    FixedDamage(i32),
    RandomDamage,
}

impl Pickup for PickupKind {
    fn interact(&mut self, rng: &mut dyn RngCore) -> i32 {
        match self {
            PickupKind::FixedDamage(damage) => *damage,
            PickupKind::RandomDamage => deal_damage(rng),
        }
    }

    fn class_name(&self) -> &'static str {
        match self {
            PickupKind::FixedDamage(_) => "DamagePickup",
            PickupKind::RandomDamage => "RandomDamagePickup",
        }
    }
}

/// A pickup placed in the world
#[derive(Debug, Clone, PartialEq)]
pub struct PickupActor {
    pub id: PickupId,
    pub location: Vec3,
    pub radius: f32,
    pub kind: PickupKind,
}

impl PickupActor {
    pub fn new(id: PickupId, location: Vec3, kind: PickupKind) -> Self {
        Self {
            id,
            location,
            radius: PICKUP_RADIUS,
            kind,
        }
    }
}

impl Pickup for PickupActor {
    fn interact(&mut self, rng: &mut dyn RngCore) -> i32 {
        self.kind.interact(rng)
    }

    fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }
}

/// Pickup placement parsed from the command line: `x,y,z:damage` or `x,y,z:random`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickupSpec {
    pub location: Vec3,
    pub kind: PickupKind,
}

impl FromStr for PickupSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (coords, kind) = s
            .split_once(':')
            .ok_or_else(|| format!("expected 'x,y,z:damage' but got '{}'", s))?;

        let parts: Vec<f32> = coords
            .split(',')
            .map(|part| part.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("bad coordinate in '{}': {}", s, e))?;

        if parts.len() != 3 {
            return Err(format!("expected three coordinates in '{}'", s));
        }

        let kind = match kind.trim() {
            "random" => PickupKind::RandomDamage,
            damage => PickupKind::FixedDamage(
                damage
                    .parse::<i32>()
                    .map_err(|e| format!("bad damage in '{}': {}", s, e))?,
            ),
        };

        Ok(PickupSpec {
            location: Vec3::new(parts[0], parts[1], parts[2]),
            kind,
        })
    }
}

impl fmt::Display for PickupSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Vec3 { x, y, z } = self.location;
        match self.kind {
            PickupKind::FixedDamage(damage) => write!(f, "{},{},{}:{}", x, y, z, damage),
            PickupKind::RandomDamage => write!(f, "{},{},{}:random", x, y, z),
        }
    }
}
