//! Rotation and transform helpers over `glam` vectors
//!
//! Conventions follow a Z-up world: yaw rotates around Z, pitch around the
//! lateral axis, all angles in degrees.

pub use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Orientation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotator {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Rotator {
    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Drops pitch and roll, leaving a ground-plane heading
    pub fn yaw_only(&self) -> Rotator {
        Rotator::new(0.0, self.yaw, 0.0)
    }

    /// Unit X axis of the rotation
    pub fn forward(&self) -> Vec3 {
        let (sp, cp) = self.pitch.to_radians().sin_cos();
        let (sy, cy) = self.yaw.to_radians().sin_cos();
        Vec3::new(cp * cy, cp * sy, sp)
    }

    /// Unit Y axis of the rotation, ignoring roll
    pub fn right(&self) -> Vec3 {
        let (sy, cy) = self.yaw.to_radians().sin_cos();
        Vec3::new(-sy, cy, 0.0)
    }

    /// Rotation whose forward axis points along `direction`
    pub fn from_direction(direction: Vec3) -> Rotator {
        let yaw = direction.y.atan2(direction.x).to_degrees();
        let pitch = direction.z.atan2(direction.truncate().length()).to_degrees();
        Rotator::new(pitch, yaw, 0.0)
    }

    /// Wraps yaw into (-180, 180]
    pub fn normalized(&self) -> Rotator {
        let mut yaw = self.yaw % 360.0;
        if yaw > 180.0 {
            yaw -= 360.0;
        } else if yaw <= -180.0 {
            yaw += 360.0;
        }
        Rotator::new(self.pitch, yaw, self.roll)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub location: Vec3,
    pub rotation: Rotator,
}

impl Transform {
    pub fn new(location: Vec3, rotation: Rotator) -> Self {
        Self { location, rotation }
    }

    pub fn at(location: Vec3) -> Self {
        Self {
            location,
            rotation: Rotator::default(),
        }
    }
}
