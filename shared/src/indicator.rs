//! Transient stun indicator: spawned at a point, rises, then removes itself

use crate::math::{Rotator, Vec3};

/// Something that can place a fire-and-forget indicator in the scene
pub trait IndicatorSpawner {
    fn spawn_indicator(&mut self, location: Vec3, rotation: Rotator);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorStatus {
    Rising,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Indicator {
    pub origin: Vec3,
    pub location: Vec3,
    pub rotation: Rotator,
    pub elapsed: f32,
    pub lifetime: f32,
    pub rise_height: f32,
}

impl Indicator {
    pub fn new(location: Vec3, rotation: Rotator, lifetime: f32, rise_height: f32) -> Self {
        Self {
            origin: location,
            location,
            rotation,
            elapsed: 0.0,
            lifetime: lifetime.max(0.0),
            rise_height,
        }
    }

    /// Advances the rise; linear over the lifetime
    pub fn tick(&mut self, dt: f32) -> IndicatorStatus {
        self.elapsed = (self.elapsed + dt).min(self.lifetime);
        let progress = if self.lifetime > 0.0 {
            self.elapsed / self.lifetime
        } else {
            1.0
        };
        self.location = Vec3::new(
            self.origin.x,
            self.origin.y,
            self.origin.z + self.rise_height * progress,
        );

        if self.elapsed >= self.lifetime {
            IndicatorStatus::Finished
        } else {
            IndicatorStatus::Rising
        }
    }
}

/// Rotation that makes an indicator face the viewing camera
pub fn facing_camera(character_location: Vec3, camera_location: Vec3) -> Rotator {
    Rotator::from_direction(camera_location - character_location)
}

/// Live indicators owned by one viewer
#[derive(Debug, Default)]
pub struct IndicatorPool {
    indicators: Vec<Indicator>,
    lifetime: f32,
    rise_height: f32,
}

impl IndicatorPool {
    pub fn new(lifetime: f32, rise_height: f32) -> Self {
        Self {
            indicators: Vec::new(),
            lifetime,
            rise_height,
        }
    }

    pub fn tick(&mut self, dt: f32) {
        self.indicators
            .retain_mut(|indicator| indicator.tick(dt) == IndicatorStatus::Rising);
    }

    pub fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }
}

impl IndicatorSpawner for IndicatorPool {
    fn spawn_indicator(&mut self, location: Vec3, rotation: Rotator) {
        self.indicators.push(Indicator::new(
            location,
            rotation,
            self.lifetime,
            self.rise_height,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_indicator_rises_then_finishes() {
        let mut indicator = Indicator::new(Vec3::new(0.0, 0.0, 10.0), Rotator::default(), 3.0, 90.0);

        assert_eq!(indicator.tick(1.0), IndicatorStatus::Rising);
        assert_approx_eq!(indicator.location.z, 40.0);

        assert_eq!(indicator.tick(1.5), IndicatorStatus::Rising);
        assert_eq!(indicator.tick(1.0), IndicatorStatus::Finished);
        assert_approx_eq!(indicator.location.z, 100.0);
    }

    #[test]
    fn test_pool_drops_finished_indicators() {
        let mut pool = IndicatorPool::new(3.0, 100.0);
        pool.spawn_indicator(Vec3::ZERO, Rotator::default());
        pool.tick(2.0);
        pool.spawn_indicator(Vec3::ZERO, Rotator::default());
        assert_eq!(pool.len(), 2);

        pool.tick(1.0);
        assert_eq!(pool.len(), 1);

        pool.tick(2.0);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_indicator_faces_camera() {
        let rotation = facing_camera(Vec3::ZERO, Vec3::new(-300.0, 0.0, 0.0));
        assert_approx_eq!(rotation.yaw.abs(), 180.0, 1e-3);
        assert_approx_eq!(rotation.pitch, 0.0, 1e-3);
    }

    #[test]
    fn test_zero_lifetime_finishes_immediately() {
        let mut indicator = Indicator::new(Vec3::ZERO, Rotator::default(), 0.0, 50.0);
        assert_eq!(indicator.tick(0.0), IndicatorStatus::Finished);
        assert_approx_eq!(indicator.location.z, 50.0);
    }
}
