//! Warmth stat: drains in the cold, recovers near heat sources.

use glam::Vec3;
use meadow_config::GameplayConfig;
use tracing::trace;

/// Upper bound of every stat.
pub const STAT_MAX: f32 = 100.0;

/// Stats reported to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Warmth,
}

/// A stat whose displayed (rounded) value changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatUpdate {
    pub stat: StatKind,
    pub value: f32,
}

/// Tracks warmth against a list of heat sources.
#[derive(Debug, Clone)]
pub struct StatusTracker {
    warmth: f32,
    decay_per_sec: f32,
    recovery_per_sec: f32,
    heat_radius: f32,
    heat_sources: Vec<Vec3>,
    last_reported: i32,
}

impl StatusTracker {
    /// Full warmth, rates from `config`.
    pub fn new(config: &GameplayConfig) -> Self {
        Self {
            warmth: STAT_MAX,
            decay_per_sec: config.warmth_decay_per_sec,
            recovery_per_sec: config.warmth_recovery_per_sec,
            heat_radius: config.heat_radius,
            heat_sources: Vec::new(),
            last_reported: STAT_MAX as i32,
        }
    }

    /// Registers a heat source (campfire, stove).
    pub fn add_heat_source(&mut self, position: Vec3) {
        self.heat_sources.push(position);
    }

    pub fn warmth(&self) -> f32 {
        self.warmth
    }

    /// Whether `position` is within the heat radius of any source.
    pub fn is_near_heat(&self, position: Vec3) -> bool {
        let r2 = self.heat_radius * self.heat_radius;
        self.heat_sources
            .iter()
            .any(|s| s.distance_squared(position) <= r2)
    }

    /// Advances warmth by `dt` seconds at `position`. Returns an update when
    /// the rounded value changed.
    pub fn update(&mut self, dt: f32, position: Vec3) -> Option<StatUpdate> {
        let rate = if self.is_near_heat(position) {
            self.recovery_per_sec
        } else {
            -self.decay_per_sec
        };
        self.warmth = (self.warmth + rate * dt).clamp(0.0, STAT_MAX);

        let rounded = self.warmth.round() as i32;
        if rounded == self.last_reported {
            return None;
        }
        self.last_reported = rounded;
        trace!(warmth = self.warmth, "warmth changed");
        Some(StatUpdate {
            stat: StatKind::Warmth,
            value: rounded as f32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> StatusTracker {
        StatusTracker::new(&GameplayConfig {
            warmth_decay_per_sec: 1.0,
            warmth_recovery_per_sec: 5.0,
            heat_radius: 3.0,
            ..GameplayConfig::default()
        })
    }

    #[test]
    fn test_decays_away_from_heat() {
        let mut status = tracker();
        let mut updates = 0;
        for _ in 0..100 {
            if status.update(0.1, Vec3::ZERO).is_some() {
                updates += 1;
            }
        }
        assert!((status.warmth() - 90.0).abs() < 1e-3, "warmth={}", status.warmth());
        assert_eq!(updates, 10, "one update per whole point lost");
    }

    #[test]
    fn test_recovers_near_heat_and_clamps() {
        let mut status = tracker();
        status.add_heat_source(Vec3::new(2.0, 0.0, 0.0));
        for _ in 0..10 {
            status.update(1.0, Vec3::new(100.0, 0.0, 0.0));
        }
        assert!(status.warmth() < 95.0);

        assert!(status.is_near_heat(Vec3::ZERO));
        for _ in 0..10 {
            status.update(1.0, Vec3::ZERO);
        }
        assert_eq!(status.warmth(), STAT_MAX);
    }

    #[test]
    fn test_never_below_zero() {
        let mut status = tracker();
        status.update(1_000.0, Vec3::ZERO);
        assert_eq!(status.warmth(), 0.0);
        assert_eq!(status.update(1.0, Vec3::ZERO), None);
    }

    #[test]
    fn test_no_update_without_visible_change() {
        let mut status = tracker();
        assert_eq!(status.update(0.2, Vec3::ZERO), None);
    }
}
