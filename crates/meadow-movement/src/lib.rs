//! Local avatar movement: camera-relative accelerated motion, ground
//! alignment, and axis-separated collision sliding against static obstacles.

pub mod aabb;
pub mod camera;
pub mod controller;
pub mod ground;
pub mod obstacles;

pub use aabb::Aabb;
pub use camera::{CameraParams, CameraRig};
pub use controller::{
    LocalMotionState, MotionPhase, MovementController, MovementInput, resolve_axis_separated,
};
pub use ground::{FlatGround, GroundHit, GroundQuery, HeightField};
pub use obstacles::{ObstacleProvider, ObstacleSet};
