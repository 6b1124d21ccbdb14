//! Stage definitions and the built-in stage list

use std::f32::consts::{FRAC_PI_2, PI};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::shapes::ObjectKind;
use crate::consts::DEFAULT_KILL_Y;
use crate::error::{GameError, GameResult};
use crate::renderer::InstanceKind;

/// A static ground box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundDef {
    pub position: Vec3,
    /// Full extents
    pub size: Vec3,
}

impl GroundDef {
    pub fn new(position: [f32; 3], size: [f32; 3]) -> Self {
        Self {
            position: Vec3::from_array(position),
            size: Vec3::from_array(size),
        }
    }
}

/// A furniture placement (position of the footprint, XYZ Euler rotation)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectPlacement {
    pub kind: ObjectKind,
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
}

impl ObjectPlacement {
    pub fn new(kind: ObjectKind, position: [f32; 3], yaw: f32) -> Self {
        Self {
            kind,
            position: Vec3::from_array(position),
            rotation: Vec3::new(0.0, yaw, 0.0),
        }
    }
}

/// Camera framing and bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSettings {
    /// Point the camera orbits
    pub center: Vec3,
    /// Initial camera position
    pub camera: Vec3,
    /// Drift-recovery radius around `center`
    pub radius: f32,
    /// Objects below this height count as fallen off-stage
    #[serde(default)]
    pub exit_y: Option<f32>,
    /// Background tint (sRGB)
    #[serde(default)]
    pub background: Option<[u8; 3]>,
}

/// Immutable description of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub title: String,
    pub ground: Vec<GroundDef>,
    pub objects: Vec<ObjectPlacement>,
    pub settings: StageSettings,
}

impl StageDefinition {
    /// Parse and validate a stage from JSON
    pub fn from_json(json: &str, origin: &str) -> GameResult<Self> {
        let stage: Self = serde_json::from_str(json).map_err(|e| GameError::Settings {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        stage.validate()?;
        Ok(stage)
    }

    /// Height below which bodies are out of play
    pub fn kill_y(&self) -> f32 {
        self.settings.exit_y.unwrap_or(DEFAULT_KILL_Y)
    }

    /// Check everything a stage load relies on
    pub fn validate(&self) -> GameResult<()> {
        let invalid = |reason: String| GameError::InvalidStage {
            title: self.title.clone(),
            reason,
        };

        if self.title.trim().is_empty() {
            return Err(invalid("missing title".into()));
        }
        if self.ground.is_empty() {
            return Err(invalid("no ground colliders".into()));
        }
        if !(self.settings.radius.is_finite() && self.settings.radius > 0.0) {
            return Err(invalid("camera radius must be positive".into()));
        }
        if !self.settings.center.is_finite() || !self.settings.camera.is_finite() {
            return Err(invalid("camera framing is not finite".into()));
        }

        for (part, ground) in self.ground.iter().enumerate() {
            if !ground.position.is_finite() || !(ground.size.min_element() > 0.0) {
                return Err(GameError::InvalidShape {
                    owner: "ground".into(),
                    part,
                });
            }
        }
        if self.ground.len() > InstanceKind::Ground.capacity() {
            return Err(GameError::SlotCapacityExceeded {
                kind: InstanceKind::Ground,
                capacity: InstanceKind::Ground.capacity(),
            });
        }

        for placement in &self.objects {
            if !placement.kind.is_furniture() {
                return Err(invalid("boxes are populated, not placed".into()));
            }
            if !placement.position.is_finite() || !placement.rotation.is_finite() {
                return Err(invalid(format!(
                    "{} placement is not finite",
                    placement.kind.as_str()
                )));
            }
        }
        for kind in ObjectKind::FURNITURE {
            let count = self.objects.iter().filter(|p| p.kind == kind).count();
            let instance_kind = InstanceKind::from(kind);
            if count > instance_kind.capacity() {
                return Err(GameError::SlotCapacityExceeded {
                    kind: instance_kind,
                    capacity: instance_kind.capacity(),
                });
            }
        }
        Ok(())
    }
}

const BLUE: [u8; 3] = [12, 62, 203];

/// The stages shipped with the game, in selection order
pub fn builtin_stages() -> Vec<StageDefinition> {
    vec![soderhamn(), stockholm(), kungsbacka(), applaro()]
}

fn soderhamn() -> StageDefinition {
    StageDefinition {
        title: "Söderhamn".into(),
        ground: vec![
            GroundDef::new([0.0, -25.0, 0.0], [100.0, 50.0, 100.0]),
            GroundDef::new([5.0, 0.5, 0.0], [20.0, 1.0, 21.0]),
        ],
        objects: vec![
            ObjectPlacement::new(ObjectKind::Cabinet, [9.0, 1.0, 7.0], 0.0),
            ObjectPlacement::new(ObjectKind::Chair, [0.0, 1.0, -3.0], 1.5),
            ObjectPlacement::new(ObjectKind::Plant, [4.5, 1.0, 7.0], 1.0),
            ObjectPlacement::new(ObjectKind::Table, [7.0, 1.0, -2.0], 0.5),
            ObjectPlacement::new(ObjectKind::TableChair, [7.0, 1.0, -6.0], -PI),
            ObjectPlacement::new(ObjectKind::Shelf, [0.0, 1.0, 4.0], FRAC_PI_2),
        ],
        settings: StageSettings {
            center: Vec3::new(4.0, 0.0, 5.0),
            camera: Vec3::new(14.0, 0.0, 5.0),
            radius: 50.0,
            exit_y: None,
            background: Some(BLUE),
        },
    }
}

fn stockholm() -> StageDefinition {
    StageDefinition {
        title: "Stockholm".into(),
        ground: vec![
            GroundDef::new([0.0, -25.0, 0.0], [100.0, 50.0, 100.0]),
            GroundDef::new([5.0, 2.0, 10.0], [10.0, 4.0, 6.0]),
            GroundDef::new([5.0, 1.0, 5.0], [5.0, 2.0, 5.0]),
        ],
        objects: vec![
            ObjectPlacement::new(ObjectKind::Plant, [5.0, 2.0, 5.0], 0.2),
            ObjectPlacement::new(ObjectKind::TableChair, [3.0, 0.0, -2.0], 0.15),
            ObjectPlacement::new(ObjectKind::TableChair, [6.0, 0.0, 0.0], -2.15),
            ObjectPlacement::new(ObjectKind::Shelf, [0.0, 0.0, 3.0], -FRAC_PI_2),
            ObjectPlacement::new(ObjectKind::Shelf, [5.0, 4.0, 10.0], 0.1),
        ],
        settings: StageSettings {
            center: Vec3::new(2.0, 0.0, 6.0),
            camera: Vec3::new(-10.0, 0.0, 3.0),
            radius: 50.0,
            exit_y: None,
            background: Some(BLUE),
        },
    }
}

fn kungsbacka() -> StageDefinition {
    StageDefinition {
        title: "Kungsbacka".into(),
        ground: vec![
            GroundDef::new([0.0, -50.0, -10.0], [10.0, 100.0, 30.0]),
            GroundDef::new([0.0, -50.0, 11.0], [10.0, 100.0, 4.0]),
            GroundDef::new([0.0, -50.0, 19.0], [10.0, 100.0, 4.0]),
        ],
        objects: vec![
            ObjectPlacement::new(ObjectKind::Shelf, [0.0, 0.0, 3.0], 0.0),
            ObjectPlacement::new(ObjectKind::Shelf, [0.0, 0.0, 11.0], 0.0),
            ObjectPlacement::new(ObjectKind::Plant, [-1.0, 0.0, 19.0], 0.0),
            ObjectPlacement::new(ObjectKind::Chair, [3.0, 0.0, 19.0], 1.85),
        ],
        settings: StageSettings {
            center: Vec3::new(0.0, 0.0, 15.0),
            camera: Vec3::new(0.0, 0.0, 22.0),
            radius: 60.0,
            exit_y: Some(-2.0),
            background: None,
        },
    }
}

fn applaro() -> StageDefinition {
    const STEPS_UP: usize = 6;
    const STEPS_DOWN: usize = 16;
    let step_depth = |i: usize, count: usize| if i + 1 == count { 100.0 } else { 3.0 };

    let mut ground: Vec<GroundDef> = (0..STEPS_UP)
        .map(|i| {
            let depth = step_depth(i, STEPS_UP);
            let f = i as f32;
            GroundDef::new(
                [0.0, f * 0.5, f * 1.5 + 8.0 + depth / 2.0],
                [100.0, 1.0, depth],
            )
        })
        .collect();
    ground.push(GroundDef::new([0.0, -5.0, 0.0], [100.0, 10.0, 16.0]));
    ground.extend((0..STEPS_DOWN).map(|i| {
        let depth = step_depth(i, STEPS_DOWN);
        let f = i as f32;
        GroundDef::new(
            [0.0, -f * 0.5 - 1.0, -f * 1.5 - 8.0],
            [100.0, 1.0, depth],
        )
    }));

    StageDefinition {
        title: "Äpplarö".into(),
        ground,
        objects: vec![
            ObjectPlacement::new(ObjectKind::Shelf, [-5.0, 0.0, 0.0], FRAC_PI_2),
            ObjectPlacement::new(ObjectKind::Shelf, [7.0, 0.0, 0.0], 0.0),
            ObjectPlacement::new(ObjectKind::Chair, [0.0, 0.0, 0.0], -PI + 0.3),
        ],
        settings: StageSettings {
            center: Vec3::new(5.0, 0.0, 0.0),
            camera: Vec3::new(5.0, 0.0, -10.0),
            radius: 50.0,
            exit_y: None,
            background: Some(BLUE),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_stages_validate() {
        let stages = builtin_stages();
        assert_eq!(stages.len(), 4);
        for stage in &stages {
            stage.validate().unwrap();
        }
        assert_eq!(stages[3].ground.len(), 23);
        assert_eq!(stages[2].kill_y(), -2.0);
        assert_eq!(stages[0].kill_y(), DEFAULT_KILL_Y);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "title": "Test",
            "ground": [{ "position": [0, -25, 0], "size": [100, 50, 100] }],
            "objects": [{ "kind": "table-chair", "position": [0, 0, 3] }],
            "settings": { "center": [0, 0, 0], "camera": [10, 0, 0], "radius": 40 }
        }"#;
        let stage = StageDefinition::from_json(json, "test.json").unwrap();
        assert_eq!(stage.objects[0].kind, ObjectKind::TableChair);
        assert_eq!(stage.objects[0].rotation, Vec3::ZERO);
        assert_eq!(stage.settings.exit_y, None);
    }

    #[test]
    fn test_rejects_degenerate_ground() {
        let mut stage = soderhamn();
        stage.ground[1].size.y = 0.0;
        match stage.validate() {
            Err(GameError::InvalidShape { owner, part }) => {
                assert_eq!(owner, "ground");
                assert_eq!(part, 1);
            }
            other => panic!("expected InvalidShape, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_too_many_of_a_kind() {
        let mut stage = soderhamn();
        stage.objects = (0..11)
            .map(|i| ObjectPlacement::new(ObjectKind::Chair, [i as f32 * 3.0, 0.0, 0.0], 0.0))
            .collect();
        assert!(matches!(
            stage.validate(),
            Err(GameError::SlotCapacityExceeded {
                kind: InstanceKind::Chair,
                capacity: 10
            })
        ));
    }

    #[test]
    fn test_rejects_missing_ground_and_title() {
        let mut stage = stockholm();
        stage.ground.clear();
        assert!(matches!(stage.validate(), Err(GameError::InvalidStage { .. })));
        let mut stage = stockholm();
        stage.title = "  ".into();
        assert!(matches!(stage.validate(), Err(GameError::InvalidStage { .. })));
    }
}
