//! Headless HUD: reports the owned character's health through the log

use log::info;
use shared::interaction::Hud;

#[derive(Debug, Default)]
pub struct LogHud {
    current: i32,
    max: i32,
}

impl LogHud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of health left, as a health bar would draw it
    pub fn health_ratio(&self) -> f32 {
        if self.max <= 0 {
            return 0.0;
        }
        self.current as f32 / self.max as f32
    }
}

impl Hud for LogHud {
    fn set_health(&mut self, current: i32, max: i32) {
        self.current = current;
        self.max = max;
        info!(
            "Health {}/{} ({:.0}%)",
            current,
            max,
            self.health_ratio() * 100.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_health_ratio() {
        let mut hud = LogHud::new();
        assert_eq!(hud.health_ratio(), 0.0);

        hud.set_health(75, 100);
        assert_approx_eq!(hud.health_ratio(), 0.75);

        hud.set_health(0, 0);
        assert_eq!(hud.health_ratio(), 0.0);
    }
}
