//! Knockdown - a physics-driven "knock the furniture over" game core
//!
//! Core modules:
//! - `sim`: Simulation (rigid-body world, stage objects, aiming, game state)
//! - `renderer`: CPU-side instance buffers consumed by a renderer
//! - `settings`: Data-driven tuning loaded from JSON
//! - `error`: Configuration and load errors

pub mod error;
pub mod renderer;
pub mod settings;
pub mod sim;

pub use error::{GameError, GameResult};
pub use settings::Settings;

use glam::{EulerRot, Quat, Vec3};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep, shared by live stepping and trajectory preview
    pub const SIM_DT: f32 = 1.0 / 30.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 4;

    /// World gravity (m/s²)
    pub const GRAVITY: [f32; 3] = [0.0, -9.82, 0.0];
    /// Restitution applied to every collider
    pub const DEFAULT_RESTITUTION: f32 = 0.5;

    /// Projectile defaults
    pub const BALL_RADIUS: f32 = 0.25;
    pub const BALL_MASS: f32 = 8.0;
    pub const BALL_DAMPING: f32 = 0.4;

    /// Trajectory preview horizon (steps of `SIM_DT`)
    pub const TRAJECTORY_STEPS: usize = 90;
    /// Minimum accumulated time between preview samples (seconds)
    pub const TRAJECTORY_SAMPLE_INTERVAL: f32 = 0.0051;

    /// Cosine between body-up and world-up below which furniture counts as knocked over
    pub const UPRIGHT_COS_THRESHOLD: f32 = 0.35;

    /// Score awarded when a box hits the ground
    pub const BOX_SCORE: i64 = 100;
    /// Score penalty for knocking over a piece of furniture
    pub const FURNITURE_PENALTY: i64 = -750;

    /// Entrance animation
    pub const SPAWN_DURATION: f32 = 0.8;
    pub const SPAWN_STAGGER: f32 = 0.075;
    /// Despawn animation
    pub const DESPAWN_DURATION: f32 = 0.9;

    /// Extra drop height for boxes so they settle onto their surface
    pub const BOX_DROP_CLEARANCE: f32 = 0.35;

    /// Where unused instance slots are parked (outside any camera frustum)
    pub const PARKED_POSITION: [f32; 3] = [0.0, 0.0, -1_000.0];
    /// Kill plane used when a stage declares no exit height
    pub const DEFAULT_KILL_Y: f32 = -50.0;
}

/// Build a quaternion from an XYZ Euler triple (the order stage data is authored in)
#[inline]
pub fn quat_from_euler(euler: [f32; 3]) -> Quat {
    Quat::from_euler(EulerRot::XYZ, euler[0], euler[1], euler[2])
}

/// Cosine between a rotated body's up axis and world up
#[inline]
pub fn upright_cos(rotation: Quat) -> f32 {
    (rotation * Vec3::Y).dot(Vec3::Y)
}

/// Clamp a value into [0, 1]
#[inline]
pub fn saturate(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}
