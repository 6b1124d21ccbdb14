//! Drag-to-launch aiming with a simulated trajectory preview
//!
//! Pointer down on the ground starts a drag. The ball launches from where the
//! drag ends, away from where it started, so pulling back further throws
//! harder. Drags shorter than the fire threshold are cancelled on release.

use glam::Vec3;

use super::anim::{ease_in_quad, ease_out_quad};
use super::world::{BodyDesc, BodyShape, BodyTag, PhysicsBackend};
use crate::error::GameResult;
use crate::renderer::TrajectoryLine;
use crate::settings::AimSettings;

/// Pointer phase as delivered by the input layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// World-space hit under the pointer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerHit {
    pub point: Vec3,
    pub target: BodyTag,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    /// Screen coordinates in pixels
    pub screen: [f32; 2],
    pub hit: Option<PointerHit>,
}

impl PointerEvent {
    pub fn on_ground(phase: PointerPhase, point: Vec3) -> Self {
        Self {
            phase,
            screen: [0.0, 0.0],
            hit: Some(PointerHit {
                point,
                target: BodyTag::Ground,
            }),
        }
    }

    pub fn cancel() -> Self {
        Self {
            phase: PointerPhase::Cancel,
            screen: [0.0, 0.0],
            hit: None,
        }
    }

    fn ground_point(&self) -> Option<Vec3> {
        self.hit
            .filter(|h| h.target.is_ground())
            .map(|h| h.point)
    }
}

/// Aim interaction state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AimState {
    Idle,
    Aiming {
        start: Vec3,
        current: Vec3,
        velocity: Vec3,
        /// Drag is past the fire threshold
        armed: bool,
    },
}

/// What a pointer event did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AimOutcome {
    Ignored,
    Started,
    Updated { armed: bool },
    Launch { position: Vec3, velocity: Vec3 },
    Cancelled,
}

/// Launch velocity for a drag, plus its normalized length in [0, 1]
pub fn launch_velocity(start: Vec3, end: Vec3, aim: &AimSettings) -> (Vec3, f32) {
    let end = Vec3::new(end.x, start.y, end.z);
    let drag = start - end;
    let distance = drag.length().min(aim.max_drag);
    let normalized = if aim.max_drag > 0.0 {
        distance / aim.max_drag
    } else {
        0.0
    };
    let horizontal = drag.normalize_or_zero() * ease_out_quad(normalized) * aim.speed_scale;
    let vertical = ease_in_quad(normalized) * aim.height_speed + aim.min_height_speed;
    (Vec3::new(horizontal.x, vertical, horizontal.z), normalized)
}

/// Simulate a scratch ball in `world` and return decimated positions
///
/// The first sample is the launch position; after that the first and last
/// steps are always sampled, others once `sample_interval` has accumulated.
/// The scratch body is removed before returning.
pub fn simulate_trajectory(
    world: &mut dyn PhysicsBackend,
    position: Vec3,
    velocity: Vec3,
    aim: &AimSettings,
    dt: f32,
) -> GameResult<Vec<Vec3>> {
    let scratch = world.add_body(
        BodyDesc::dynamic(
            BodyTag::Ball,
            BodyShape::Sphere {
                radius: aim.ball_radius,
            },
            position,
            aim.ball_mass,
        )
        .with_velocity(velocity)
        .with_damping(aim.ball_damping, aim.ball_damping)
        .with_ccd(),
    )?;

    let mut samples = vec![position];
    let mut accumulated = 0.0;
    for step in 0..aim.preview_steps {
        world.step(dt, &mut |_| {});
        accumulated += dt;
        let last = step + 1 == aim.preview_steps;
        if step == 0 || last || accumulated > aim.sample_interval {
            if let Some(state) = world.body_state(scratch) {
                samples.push(state.position);
            }
            accumulated = 0.0;
        }
    }
    world.remove_body(scratch);
    Ok(samples)
}

/// Pointer-driven aim state machine
pub struct AimController {
    settings: AimSettings,
    dt: f32,
    state: AimState,
    samples: Vec<Vec3>,
    line: TrajectoryLine,
}

impl AimController {
    pub fn new(settings: AimSettings, dt: f32) -> Self {
        Self {
            settings,
            dt,
            state: AimState::Idle,
            samples: Vec::new(),
            line: TrajectoryLine::new(),
        }
    }

    pub fn state(&self) -> AimState {
        self.state
    }

    pub fn is_aiming(&self) -> bool {
        matches!(self.state, AimState::Aiming { .. })
    }

    /// Latest preview path (empty when hidden)
    pub fn samples(&self) -> &[Vec3] {
        &self.samples
    }

    pub fn line(&self) -> &TrajectoryLine {
        &self.line
    }

    /// Where a drag ending at `end` launches the ball
    pub fn launch_position(&self, end: Vec3) -> Vec3 {
        end + Vec3::Y * self.settings.ball_radius
    }

    /// Drop any in-progress aim and hide the preview
    pub fn cancel(&mut self) -> AimOutcome {
        let was_aiming = self.is_aiming();
        self.state = AimState::Idle;
        self.samples.clear();
        self.line.hide();
        if was_aiming {
            log::debug!("Aim cancelled");
            AimOutcome::Cancelled
        } else {
            AimOutcome::Ignored
        }
    }

    /// Feed one pointer event; `preview_world` is stepped for the preview
    pub fn handle(
        &mut self,
        event: &PointerEvent,
        panning: bool,
        preview_world: &mut dyn PhysicsBackend,
    ) -> GameResult<AimOutcome> {
        if panning {
            return Ok(self.cancel());
        }
        match event.phase {
            PointerPhase::Cancel => Ok(self.cancel()),
            PointerPhase::Down => {
                let Some(point) = event.ground_point() else {
                    return Ok(AimOutcome::Ignored);
                };
                self.samples.clear();
                self.line.hide();
                self.state = AimState::Aiming {
                    start: point,
                    current: point,
                    velocity: Vec3::ZERO,
                    armed: false,
                };
                Ok(AimOutcome::Started)
            }
            PointerPhase::Move => {
                let AimState::Aiming { start, .. } = self.state else {
                    return Ok(AimOutcome::Ignored);
                };
                let Some(point) = event.ground_point() else {
                    return Ok(AimOutcome::Ignored);
                };
                let armed = self.drag_to(start, point, preview_world)?;
                Ok(AimOutcome::Updated { armed })
            }
            PointerPhase::Up => {
                let AimState::Aiming { start, .. } = self.state else {
                    return Ok(AimOutcome::Ignored);
                };
                let Some(end) = event.ground_point() else {
                    return Ok(self.cancel());
                };
                let (velocity, normalized) = launch_velocity(start, end, &self.settings);
                if normalized < self.settings.fire_threshold {
                    return Ok(self.cancel());
                }
                let position = self.launch_position(end);
                self.state = AimState::Idle;
                self.samples.clear();
                self.line.hide();
                Ok(AimOutcome::Launch { position, velocity })
            }
        }
    }

    fn drag_to(
        &mut self,
        start: Vec3,
        point: Vec3,
        preview_world: &mut dyn PhysicsBackend,
    ) -> GameResult<bool> {
        let (velocity, normalized) = launch_velocity(start, point, &self.settings);
        let armed = normalized >= self.settings.fire_threshold;
        self.state = AimState::Aiming {
            start,
            current: point,
            velocity,
            armed,
        };
        if armed {
            self.samples = simulate_trajectory(
                preview_world,
                self.launch_position(point),
                velocity,
                &self.settings,
                self.dt,
            )?;
            self.line.set_path(&self.samples);
            log::debug!("Preview with {} samples", self.samples.len());
        } else {
            self.samples.clear();
            self.line.hide();
        }
        Ok(armed)
    }
}
