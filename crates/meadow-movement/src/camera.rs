//! Orbit camera parameters that frame the local avatar and define the
//! frame directional input is interpreted in.

use glam::{Vec2, Vec3};

/// Orbit camera parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraParams {
    /// Horizontal orbit angle in radians. 0 = behind the avatar at +Z,
    /// looking toward -Z.
    pub yaw: f32,
    /// Elevation above the horizon in radians.
    pub pitch: f32,
    /// Distance from the avatar in metres.
    pub distance: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 20.0_f32.to_radians(),
            distance: 8.0,
        }
    }
}

/// Current and target camera parameters. Input moves the target; the
/// current parameters follow with exponential smoothing.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraRig {
    /// Parameters the renderer should use this frame.
    pub current: CameraParams,
    /// Parameters the camera is easing toward.
    pub target: CameraParams,
    /// Follow rate (1/s).
    pub follow_rate: f32,
    /// Minimum pitch in radians.
    pub pitch_min: f32,
    /// Maximum pitch in radians.
    pub pitch_max: f32,
    /// Minimum zoom distance.
    pub distance_min: f32,
    /// Maximum zoom distance.
    pub distance_max: f32,
}

impl CameraRig {
    /// Rig at rest on the default parameters.
    pub fn new(follow_rate: f32) -> Self {
        Self {
            current: CameraParams::default(),
            target: CameraParams::default(),
            follow_rate,
            pitch_min: -10.0_f32.to_radians(),
            pitch_max: 80.0_f32.to_radians(),
            distance_min: 2.0,
            distance_max: 30.0,
        }
    }

    /// Apply look (`x` = yaw, `y` = pitch, radians) and zoom deltas to the
    /// target. Pitch and distance are clamped.
    pub fn apply_input(&mut self, look: Vec2, zoom: f32) {
        self.target.yaw += look.x;
        self.target.pitch = (self.target.pitch + look.y).clamp(self.pitch_min, self.pitch_max);
        self.target.distance =
            (self.target.distance - zoom).clamp(self.distance_min, self.distance_max);
    }

    /// Ease the current parameters toward the target.
    pub fn update(&mut self, dt: f32) {
        let k = 1.0 - (-self.follow_rate * dt).exp();
        self.current.yaw += (self.target.yaw - self.current.yaw) * k;
        self.current.pitch += (self.target.pitch - self.current.pitch) * k;
        self.current.distance += (self.target.distance - self.current.distance) * k;
    }

    /// Horizontal unit vector the camera looks along.
    pub fn forward(&self) -> Vec3 {
        let (sin, cos) = self.current.yaw.sin_cos();
        Vec3::new(-sin, 0.0, -cos)
    }

    /// Horizontal unit vector to the camera's right.
    pub fn right(&self) -> Vec3 {
        let (sin, cos) = self.current.yaw.sin_cos();
        Vec3::new(cos, 0.0, -sin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_frame_looks_down_negative_z() {
        let rig = CameraRig::new(10.0);
        assert!(rig.forward().abs_diff_eq(Vec3::NEG_Z, 1e-6));
        assert!(rig.right().abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn test_current_follows_target() {
        let mut rig = CameraRig::new(10.0);
        rig.apply_input(Vec2::new(1.0, 0.0), 0.0);
        assert_eq!(rig.current.yaw, 0.0, "input only moves the target");

        for _ in 0..120 {
            rig.update(1.0 / 60.0);
        }
        assert!((rig.current.yaw - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_pitch_and_zoom_clamped() {
        let mut rig = CameraRig::new(10.0);
        rig.apply_input(Vec2::new(0.0, 10.0), 100.0);
        assert_eq!(rig.target.pitch, rig.pitch_max);
        assert_eq!(rig.target.distance, rig.distance_min);
    }
}
