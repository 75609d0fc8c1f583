//! Timestamped entity state records shared by the local simulation and
//! remote peers.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Identifier of a peer (and of the avatar it controls) within a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl PeerId {
    /// Creates a peer id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discrete animation state. Never interpolated; the newer sample wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimState {
    /// Standing still.
    #[default]
    Idle,
    /// Moving at walk speed.
    Walk,
    /// Moving faster than walk speed.
    Run,
    /// Rising after a jump.
    Jump,
    /// Airborne and descending.
    Fall,
    /// Playing an interaction.
    Interact,
}

/// One entity's transform and animation state at a point in time.
///
/// Snapshots are immutable once created. Within one [`crate::StateBuffer`]
/// their timestamps never decrease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Owning entity.
    pub id: PeerId,
    /// World-space position (y up).
    pub position: Vec3,
    /// Yaw around +Y in radians.
    pub facing: f32,
    /// Animation state at this instant.
    pub anim: AnimState,
    /// Milliseconds on the receiving simulation clock.
    pub timestamp_ms: u64,
}

impl EntitySnapshot {
    /// Convenience constructor.
    pub fn new(
        id: PeerId,
        position: Vec3,
        facing: f32,
        anim: AnimState,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            id,
            position,
            facing,
            anim,
            timestamp_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_display_matches_raw() {
        let id = PeerId::new("fox-17");
        assert_eq!(id.to_string(), "fox-17");
        assert_eq!(id.as_str(), "fox-17");
    }

    #[test]
    fn test_default_anim_is_idle() {
        assert_eq!(AnimState::default(), AnimState::Idle);
    }
}
