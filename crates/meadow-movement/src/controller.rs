//! Kinematic movement controller for the local avatar.
//!
//! Each [`MovementController::update`] runs, in order: camera-relative
//! desired velocity, exponential velocity smoothing, axis-separated
//! horizontal collision, ground sampling with normal smoothing and gravity,
//! facing toward velocity, and the world-bounds clamp. The position tracks
//! the avatar's feet; its collision core is a narrow box standing on them.

use glam::{Mat3, Quat, Vec2, Vec3};
use meadow_config::MovementConfig;
use tracing::trace;

use crate::aabb::Aabb;
use crate::camera::CameraRig;
use crate::ground::{GroundHit, GroundQuery};
use crate::obstacles::ObstacleProvider;

/// Largest drop (m) over which a grounded avatar stays glued to the ground
/// while walking downhill.
const GROUND_SNAP: f32 = 0.2;

/// Below this speed a released stick zeroes the velocity outright.
const REST_SPEED: f32 = 1e-3;

// ---------------------------------------------------------------------------
// Input & state
// ---------------------------------------------------------------------------

/// One frame of player intent.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MovementInput {
    /// Stick/WASD direction: `x` strafes right, `y` moves forward.
    pub direction: Vec2,
    /// Jump pressed this frame.
    pub jump: bool,
    /// Sprint held.
    pub sprint: bool,
    /// Camera look delta in radians (`x` yaw, `y` pitch).
    pub look: Vec2,
    /// Camera zoom delta in metres (positive zooms in).
    pub zoom: f32,
}

/// Coarse locomotion phase, used to pick an animation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MotionPhase {
    /// Grounded and stationary.
    #[default]
    Idle,
    /// Grounded, up to walk speed.
    Walk,
    /// Grounded, faster than walk speed.
    Run,
    /// Airborne and rising.
    Jump,
    /// Airborne and descending.
    Fall,
}

/// Everything the controller mutates once per tick.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalMotionState {
    /// Feet position in world space.
    pub position: Vec3,
    /// Horizontal velocity (`y` is always zero).
    pub velocity: Vec3,
    /// Vertical velocity in m/s (positive = up).
    pub vertical_velocity: f32,
    /// Smoothed ground normal used as "up" for orientation.
    pub up: Vec3,
    /// Avatar orientation; local +Z is forward.
    pub orientation: Quat,
    /// Whether the avatar stood on ground or an obstacle after the last tick.
    pub grounded: bool,
    /// Camera framing the avatar.
    pub camera: CameraRig,
}

// ---------------------------------------------------------------------------
// Collision
// ---------------------------------------------------------------------------

/// Collision core of an avatar whose feet are at `position`.
fn core_volume(position: Vec3, core_half: Vec3) -> Aabb {
    Aabb::from_center_half_extents(position + Vec3::Y * core_half.y, core_half)
}

/// Shrunk obstacle volumes overlapping `core`.
fn overlapping<'a>(
    core: &'a Aabb,
    obstacles: &'a [Aabb],
    shrink: f32,
) -> impl Iterator<Item = Aabb> + 'a {
    obstacles
        .iter()
        .filter_map(move |o| o.shrunk(shrink))
        .filter(move |o| core.intersects(o))
}

fn is_blocked(position: Vec3, core_half: Vec3, obstacles: &[Aabb], shrink: f32) -> bool {
    let core = core_volume(position, core_half);
    obstacles
        .iter()
        .filter_map(|o| o.shrunk(shrink))
        .any(|o| core.intersects(&o))
}

/// Advance `position` by `velocity * dt` one horizontal axis at a time.
///
/// X is tried first; if the core volume at the X-only candidate overlaps a
/// shrunk obstacle (or would leave the `half_extent` square) X is not
/// committed and X velocity is zeroed. Z is then tried from the resolved
/// position the same way. Contact on one axis therefore leaves motion on the
/// other intact, which is what makes the avatar slide along walls.
///
/// Returns the resolved `(position, velocity)`.
pub fn resolve_axis_separated(
    position: Vec3,
    velocity: Vec3,
    dt: f32,
    core_half: Vec3,
    shrink: f32,
    half_extent: f32,
    obstacles: &[Aabb],
) -> (Vec3, Vec3) {
    let mut pos = position;
    let mut vel = velocity;

    for axis in [Vec3::X, Vec3::Z] {
        let step = vel.dot(axis) * dt;
        if step == 0.0 {
            continue;
        }
        let candidate = pos + axis * step;
        let out_of_bounds = candidate.dot(axis).abs() > half_extent;
        if out_of_bounds || is_blocked(candidate, core_half, obstacles, shrink) {
            vel -= axis * vel.dot(axis);
        } else {
            pos = candidate;
        }
    }
    (pos, vel)
}

/// Rotation whose local +Z points along `forward` and local +Y toward `up`.
fn look_rotation(forward: Vec3, up: Vec3) -> Option<Quat> {
    let right = up.cross(forward).try_normalize()?;
    let true_up = forward.cross(right);
    Some(Quat::from_mat3(&Mat3::from_cols(right, true_up, forward)).normalize())
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Drives the local avatar from input, terrain, and obstacles.
#[derive(Clone, Debug)]
pub struct MovementController {
    config: MovementConfig,
    state: LocalMotionState,
    phase: MotionPhase,
}

impl MovementController {
    /// Place a resting avatar with its feet at `spawn`.
    pub fn new(config: MovementConfig, spawn: Vec3) -> Self {
        let camera = CameraRig::new(config.camera_follow_rate);
        Self {
            config,
            state: LocalMotionState {
                position: spawn,
                velocity: Vec3::ZERO,
                vertical_velocity: 0.0,
                up: Vec3::Y,
                orientation: Quat::IDENTITY,
                grounded: false,
                camera,
            },
            phase: MotionPhase::Idle,
        }
    }

    /// Current motion state.
    pub fn state(&self) -> &LocalMotionState {
        &self.state
    }

    /// Mutable access to the camera rig.
    pub fn camera_mut(&mut self) -> &mut CameraRig {
        &mut self.state.camera
    }

    /// Tuning in use.
    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    /// Feet position.
    pub fn position(&self) -> Vec3 {
        self.state.position
    }

    /// Locomotion phase after the last tick.
    pub fn phase(&self) -> MotionPhase {
        self.phase
    }

    /// Facing as a yaw around +Y in radians, `atan2(forward.x, forward.z)`.
    pub fn heading(&self) -> f32 {
        let forward = self.state.orientation * Vec3::Z;
        forward.x.atan2(forward.z)
    }

    /// Half extents of the collision core.
    pub fn core_half_extents(&self) -> Vec3 {
        Vec3::new(
            self.config.core_half_width,
            self.config.core_half_height,
            self.config.core_half_width,
        )
    }

    /// Collision core at the current position.
    pub fn core_volume(&self) -> Aabb {
        core_volume(self.state.position, self.core_half_extents())
    }

    /// Move the avatar without simulating, dropping all velocity.
    pub fn teleport(&mut self, position: Vec3) {
        self.state.position = position;
        self.state.velocity = Vec3::ZERO;
        self.state.vertical_velocity = 0.0;
        self.state.grounded = false;
    }

    /// Advance one frame of `dt` seconds.
    pub fn update(
        &mut self,
        dt: f32,
        input: &MovementInput,
        ground: &dyn GroundQuery,
        obstacles: &dyn ObstacleProvider,
    ) {
        if dt <= 0.0 {
            return;
        }
        let obstacles = obstacles.obstacles();

        self.state.camera.apply_input(input.look, input.zoom);
        self.state.camera.update(dt);

        let desired = self.desired_velocity(input);
        self.smooth_velocity(desired, dt);

        let (position, velocity) = resolve_axis_separated(
            self.state.position,
            self.state.velocity,
            dt,
            self.core_half_extents(),
            self.config.obstacle_shrink,
            self.config.world_half_extent,
            obstacles,
        );
        self.state.position = position;
        self.state.velocity = velocity;

        self.integrate_vertical(dt, input.jump, ground, obstacles);
        self.orient(dt);

        let half = self.config.world_half_extent;
        self.state.position.x = self.state.position.x.clamp(-half, half);
        self.state.position.z = self.state.position.z.clamp(-half, half);

        self.phase = self.classify();
        trace!(
            position = ?self.state.position,
            velocity = ?self.state.velocity,
            grounded = self.state.grounded,
            "movement tick"
        );
    }

    /// Step 1: camera-relative target velocity.
    fn desired_velocity(&self, input: &MovementInput) -> Vec3 {
        if input.direction == Vec2::ZERO {
            return Vec3::ZERO;
        }
        let dir = input.direction.normalize();
        let camera = &self.state.camera;
        let world = camera.right() * dir.x + camera.forward() * dir.y;
        let speed = if input.sprint {
            self.config.walk_speed * self.config.sprint_multiplier
        } else {
            self.config.walk_speed
        };
        world * speed
    }

    /// Step 2: exponential approach, decelerating harder than accelerating.
    fn smooth_velocity(&mut self, desired: Vec3, dt: f32) {
        let current = self.state.velocity;
        let rate = if desired.length_squared() > current.length_squared() {
            self.config.acceleration_rate
        } else {
            self.config.deceleration_rate
        };
        let mut next = current.lerp(desired, 1.0 - (-rate * dt).exp());
        if desired == Vec3::ZERO && next.length() < REST_SPEED {
            next = Vec3::ZERO;
        }
        self.state.velocity = next;
    }

    /// Step 4: ground normal smoothing, jump, gravity, and landing.
    fn integrate_vertical(
        &mut self,
        dt: f32,
        jump: bool,
        ground: &dyn GroundQuery,
        obstacles: &[Aabb],
    ) {
        let pos = self.state.position;
        let hit = ground.sample(pos.x, pos.z).unwrap_or(GroundHit {
            height: self.config.fallback_ground_height,
            normal: Vec3::Y,
        });

        let k = 1.0 - (-self.config.normal_smoothing_rate * dt).exp();
        self.state.up = self.state.up.lerp(hit.normal, k).normalize_or(Vec3::Y);

        let was_grounded = self.state.grounded;
        if was_grounded && jump {
            self.state.vertical_velocity = self.config.jump_impulse;
        }
        self.state.vertical_velocity -= self.config.gravity * dt;

        let mut y = pos.y + self.state.vertical_velocity * dt;
        let mut grounded = false;
        let rising = self.state.vertical_velocity > 0.0;
        if y <= hit.height || (was_grounded && !rising && y - hit.height <= GROUND_SNAP) {
            y = hit.height;
            grounded = true;
        }

        let core_half = self.core_half_extents();
        let shrink = self.config.obstacle_shrink;
        let candidate = Vec3::new(pos.x, y, pos.z);
        let core = core_volume(candidate, core_half);
        let top = overlapping(&core, obstacles, shrink)
            .map(|o| o.max.y)
            .reduce(f32::max);
        if let Some(top) = top {
            let landing = Vec3::new(pos.x, top, pos.z);
            if y < pos.y && !is_blocked(landing, core_half, obstacles, shrink) {
                y = top;
                grounded = true;
            } else {
                y = pos.y;
            }
        }

        if grounded {
            self.state.vertical_velocity = 0.0;
        } else if top.is_some() {
            // Head against an underside.
            self.state.vertical_velocity = self.state.vertical_velocity.min(0.0);
        }
        self.state.position.y = y;
        self.state.grounded = grounded;
    }

    /// Step 5: rotate toward the direction of travel around the smoothed up.
    fn orient(&mut self, dt: f32) {
        let speed = self.state.velocity.length();
        if speed <= self.config.velocity_epsilon {
            return;
        }
        let up = self.state.up;
        let travel = self.state.velocity / speed;
        let Some(forward) = travel.reject_from_normalized(up).try_normalize() else {
            return;
        };
        let Some(target) = look_rotation(forward, up) else {
            return;
        };
        let k = 1.0 - (-self.config.turn_rate * dt).exp();
        self.state.orientation = self.state.orientation.slerp(target, k).normalize();
    }

    fn classify(&self) -> MotionPhase {
        if !self.state.grounded {
            return if self.state.vertical_velocity > 0.0 {
                MotionPhase::Jump
            } else {
                MotionPhase::Fall
            };
        }
        let speed = self.state.velocity.length();
        if speed <= self.config.velocity_epsilon {
            MotionPhase::Idle
        } else if speed > self.config.walk_speed * 1.05 {
            MotionPhase::Run
        } else {
            MotionPhase::Walk
        }
    }
}
