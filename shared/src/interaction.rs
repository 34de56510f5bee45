//! Interaction and damage pipeline
//!
//! Collecting a pickup runs a fixed sequence: interact once, apply the damage
//! to the collector, tell the HUD, handle death, announce the collection, and
//! finally drop the pickup. Every collaborator is optional; a missing one is
//! skipped.

use crate::character::{CharacterId, CharacterState};
use crate::pickup::{Pickup, PickupActor, PickupId};
use log::{info, warn};
use rand::RngCore;

/// Receives health updates for display
pub trait Hud {
    fn set_health(&mut self, current: i32, max: i32);
}

/// Switches the game to another level; no confirmation is awaited
pub trait LevelTransition {
    fn open_level(&mut self, name: &str);
}

/// Interested in every successful collection
pub trait ItemCollectedListener {
    fn item_collected(&mut self, character: CharacterId, pickup: PickupId, damage: i32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionOutcome {
    pub damage: i32,
    pub current_hit_points: i32,
    /// True only on the application that brought health to zero
    pub died: bool,
}

pub struct InteractionPipeline<'a> {
    death_level: &'a str,
    hud: Option<&'a mut dyn Hud>,
    level_transition: Option<&'a mut dyn LevelTransition>,
    listeners: Vec<&'a mut dyn ItemCollectedListener>,
}

impl<'a> InteractionPipeline<'a> {
    pub fn new(death_level: &'a str) -> Self {
        Self {
            death_level,
            hud: None,
            level_transition: None,
            listeners: Vec::new(),
        }
    }

    pub fn with_hud(mut self, hud: &'a mut dyn Hud) -> Self {
        self.hud = Some(hud);
        self
    }

    pub fn with_level_transition(mut self, level_transition: &'a mut dyn LevelTransition) -> Self {
        self.level_transition = Some(level_transition);
        self
    }

    pub fn with_listener(mut self, listener: &'a mut dyn ItemCollectedListener) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Collects `pickup`, consuming it
    pub fn pick_up(
        &mut self,
        character: &mut CharacterState,
        mut pickup: PickupActor,
        rng: &mut dyn RngCore,
    ) -> InteractionOutcome {
        let damage = pickup.interact(rng);
        let outcome = self.invoke_damage(character, damage);

        for listener in self.listeners.iter_mut() {
            listener.item_collected(character.id, pickup.id, damage);
        }

        info!(
            "Character {} collected {} {}",
            character.id,
            pickup.class_name(),
            pickup.id
        );
        outcome
    }

    pub fn invoke_damage(&mut self, character: &mut CharacterState, damage: i32) -> InteractionOutcome {
        let was_alive = !character.is_dead();
        let current = character.apply_damage(damage);

        match self.hud.as_mut() {
            Some(hud) => hud.set_health(current, character.max_hit_points),
            None => warn!("No HUD to report health of character {}", character.id),
        }

        let died = was_alive && character.is_dead();
        if died {
            info!(
                "Character {} died, opening level {}",
                character.id, self.death_level
            );
            if let Some(level_transition) = self.level_transition.as_mut() {
                level_transition.open_level(self.death_level);
            }
        }

        info!("Character {} took a hit for {} points", character.id, damage);

        InteractionOutcome {
            damage,
            current_hit_points: current,
            died,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Transform, Vec3};
    use crate::pickup::PickupKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[derive(Default)]
    struct RecordingHud {
        updates: Vec<(i32, i32)>,
    }

    impl Hud for RecordingHud {
        fn set_health(&mut self, current: i32, max: i32) {
            self.updates.push((current, max));
        }
    }

    #[derive(Default)]
    struct RecordingLevels {
        opened: Vec<String>,
    }

    impl LevelTransition for RecordingLevels {
        fn open_level(&mut self, name: &str) {
            self.opened.push(name.to_string());
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        collected: Vec<(CharacterId, PickupId, i32)>,
    }

    impl ItemCollectedListener for RecordingListener {
        fn item_collected(&mut self, character: CharacterId, pickup: PickupId, damage: i32) {
            self.collected.push((character, pickup, damage));
        }
    }

    fn character(hp: i32) -> CharacterState {
        let mut c = CharacterState::new(1, Transform::default(), 100);
        c.current_hit_points = hp;
        c
    }

    #[test]
    fn test_pickup_damage_reports_to_hud() {
        let mut hud = RecordingHud::default();
        let mut levels = RecordingLevels::default();
        let mut listener = RecordingListener::default();
        let mut rng = StdRng::seed_from_u64(0);
        let mut c = character(100);

        let outcome = InteractionPipeline::new("LevelMenu")
            .with_hud(&mut hud)
            .with_level_transition(&mut levels)
            .with_listener(&mut listener)
            .pick_up(
                &mut c,
                PickupActor::new(4, Vec3::ZERO, PickupKind::FixedDamage(30)),
                &mut rng,
            );

        assert_eq!(outcome.current_hit_points, 70);
        assert!(!outcome.died);
        assert_eq!(hud.updates, vec![(70, 100)]);
        assert!(levels.opened.is_empty());
        assert_eq!(listener.collected, vec![(1, 4, 30)]);
    }

    #[test]
    fn test_lethal_damage_clamps_and_transitions_once() {
        let mut hud = RecordingHud::default();
        let mut levels = RecordingLevels::default();
        let mut rng = StdRng::seed_from_u64(0);
        let mut c = character(10);

        let outcome = InteractionPipeline::new("LevelMenu")
            .with_hud(&mut hud)
            .with_level_transition(&mut levels)
            .pick_up(
                &mut c,
                PickupActor::new(1, Vec3::ZERO, PickupKind::FixedDamage(15)),
                &mut rng,
            );

        assert_eq!(outcome.current_hit_points, 0);
        assert!(outcome.died);
        assert_eq!(c.current_hit_points, 0);
        assert_eq!(hud.updates, vec![(0, 100)]);
        assert_eq!(levels.opened, vec!["LevelMenu".to_string()]);
    }

    #[test]
    fn test_damage_while_dead_does_not_transition_again() {
        let mut levels = RecordingLevels::default();
        let mut c = character(0);

        let outcome = InteractionPipeline::new("LevelMenu")
            .with_level_transition(&mut levels)
            .invoke_damage(&mut c, 5);

        assert!(!outcome.died);
        assert!(levels.opened.is_empty());
    }

    #[test]
    fn test_missing_collaborators_are_skipped() {
        let mut c = character(50);
        let outcome = InteractionPipeline::new("LevelMenu").invoke_damage(&mut c, 80);
        assert_eq!(outcome.current_hit_points, 0);
        assert!(outcome.died);
    }

    #[test]
    fn test_negative_damage_clamps_to_max() {
        let mut hud = RecordingHud::default();
        let mut c = character(90);
        InteractionPipeline::new("LevelMenu")
            .with_hud(&mut hud)
            .invoke_damage(&mut c, -50);
        assert_eq!(hud.updates, vec![(100, 100)]);
    }
}
