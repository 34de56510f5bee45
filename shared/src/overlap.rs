//! Capsule overlap tests and begin-edge tracking

use crate::character::CharacterId;
use crate::math::Vec3;
use crate::pickup::PickupId;
use std::collections::HashSet;

/// Vertical capsules; horizontal test on radii, vertical on half heights
pub fn capsules_overlap(a: Vec3, b: Vec3, radius: f32, half_height: f32) -> bool {
    let delta = b - a;
    delta.truncate().length() < radius * 2.0 && delta.z.abs() < half_height * 2.0
}

pub fn capsule_touches_sphere(
    capsule: Vec3,
    radius: f32,
    half_height: f32,
    sphere: Vec3,
    sphere_radius: f32,
) -> bool {
    let delta = sphere - capsule;
    delta.truncate().length() < radius + sphere_radius && delta.z.abs() < half_height + sphere_radius
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlapKey {
    /// Smaller id first
    Characters(CharacterId, CharacterId),
    Pickup(CharacterId, PickupId),
}

impl OverlapKey {
    pub fn characters(a: CharacterId, b: CharacterId) -> Self {
        if a <= b {
            OverlapKey::Characters(a, b)
        } else {
            OverlapKey::Characters(b, a)
        }
    }
}

/// Remembers which pairs overlapped last frame so only new contacts fire
#[derive(Debug, Default)]
pub struct OverlapTracker {
    active: HashSet<OverlapKey>,
}

impl OverlapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the active set and returns the pairs that just began
    pub fn update(&mut self, current: HashSet<OverlapKey>) -> Vec<OverlapKey> {
        let mut began: Vec<OverlapKey> = current.difference(&self.active).copied().collect();
        began.sort_by_key(|key| match *key {
            OverlapKey::Characters(a, b) => (0, a, b),
            OverlapKey::Pickup(c, p) => (1, c, p),
        });
        self.active = current;
        began
    }

    /// Drops every pair involving `character`
    pub fn forget_character(&mut self, character: CharacterId) {
        self.active.retain(|key| match *key {
            OverlapKey::Characters(a, b) => a != character && b != character,
            OverlapKey::Pickup(c, _) => c != character,
        });
    }

    pub fn is_active(&self, key: &OverlapKey) -> bool {
        self.active.contains(key)
    }
}
