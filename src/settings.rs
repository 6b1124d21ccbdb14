//! Game tuning loaded from JSON
//!
//! Every field has a default, so a settings file only needs the values it
//! overrides. A missing file means defaults; a malformed one is an error.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{GameError, GameResult};
use crate::sim::ObjectKind;

/// Rigid-body world tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    /// World gravity (m/s²)
    pub gravity: [f32; 3],
    /// Restitution applied to every collider
    pub restitution: f32,
    /// Fixed step shared by live stepping and preview
    pub fixed_step: f32,
    /// Substep cap per frame
    pub max_substeps: u32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            restitution: DEFAULT_RESTITUTION,
            fixed_step: SIM_DT,
            max_substeps: MAX_SUBSTEPS,
        }
    }
}

/// Drag-to-launch tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AimSettings {
    /// Drag length (world units) that maps to full power
    pub max_drag: f32,
    /// Minimum normalized drag that launches
    pub fire_threshold: f32,
    /// Horizontal speed at full power
    pub speed_scale: f32,
    /// Extra vertical speed at full power
    pub height_speed: f32,
    /// Vertical speed of the shortest launch
    pub min_height_speed: f32,
    /// Preview horizon in fixed steps
    pub preview_steps: usize,
    /// Minimum accumulated time between preview samples
    pub sample_interval: f32,
    pub ball_radius: f32,
    pub ball_mass: f32,
    pub ball_damping: f32,
}

impl Default for AimSettings {
    fn default() -> Self {
        Self {
            max_drag: 4.0,
            fire_threshold: 0.125,
            speed_scale: 28.0,
            height_speed: 10.0,
            min_height_speed: 8.0,
            preview_steps: TRAJECTORY_STEPS,
            sample_interval: TRAJECTORY_SAMPLE_INTERVAL,
            ball_radius: BALL_RADIUS,
            ball_mass: BALL_MASS,
            ball_damping: BALL_DAMPING,
        }
    }
}

/// Stage object scoring and lifecycle tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectSettings {
    /// Up-vector cosine below which an object counts as knocked over
    pub upright_cos_threshold: f32,
    pub box_score: i64,
    pub furniture_penalty: i64,
    pub spawn_duration: f32,
    pub spawn_stagger: f32,
    pub despawn_duration: f32,
    /// Rise height range of the despawn animation
    pub despawn_rise: [f32; 2],
    /// Kinds defeated by touching the ground
    pub ground_contact_kinds: Vec<ObjectKind>,
    /// Kinds defeated by tipping past the upright threshold
    pub orientation_kinds: Vec<ObjectKind>,
    /// Populate furniture surfaces with boxes on load
    pub populate_boxes: bool,
    /// Seed for box population and despawn rise heights
    pub seed: u64,
}

impl Default for ObjectSettings {
    fn default() -> Self {
        Self {
            upright_cos_threshold: UPRIGHT_COS_THRESHOLD,
            box_score: BOX_SCORE,
            furniture_penalty: FURNITURE_PENALTY,
            spawn_duration: SPAWN_DURATION,
            spawn_stagger: SPAWN_STAGGER,
            despawn_duration: DESPAWN_DURATION,
            despawn_rise: [4.0, 6.0],
            ground_contact_kinds: vec![ObjectKind::Box],
            orientation_kinds: ObjectKind::FURNITURE.to_vec(),
            populate_boxes: true,
            seed: 0x5eed,
        }
    }
}

impl ObjectSettings {
    pub fn defeated_by_ground(&self, kind: ObjectKind) -> bool {
        self.ground_contact_kinds.contains(&kind)
    }

    pub fn defeated_by_orientation(&self, kind: ObjectKind) -> bool {
        self.orientation_kinds.contains(&kind)
    }

    /// Score delta for defeating an object of this kind
    pub fn score_for(&self, kind: ObjectKind) -> i64 {
        if kind.is_furniture() {
            self.furniture_penalty
        } else {
            self.box_score
        }
    }
}

/// All game tuning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub physics: PhysicsSettings,
    pub aim: AimSettings,
    pub objects: ObjectSettings,
}

impl Settings {
    /// Parse settings from a JSON string
    pub fn from_json(json: &str, origin: &str) -> GameResult<Self> {
        serde_json::from_str(json).map_err(|e| GameError::Settings {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Load settings from a JSON file
    pub fn load(path: &Path) -> GameResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_json(&json, &path.display().to_string())?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> GameResult<Self> {
        if !path.exists() {
            log::info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Write settings as pretty JSON
    pub fn save(&self, path: &Path) -> GameResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| GameError::Settings {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|source| GameError::Io {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}
