//! Launched balls
//!
//! A ball is exhausted once it touches the ground or drops below the kill
//! plane. Exhausted balls keep simulating until they fall out of the stage,
//! at which point the body goes away and the slot is parked.

use std::collections::BTreeMap;

use glam::{Quat, Vec3};

use super::world::{BodyDesc, BodyId, BodyShape, BodyTag, ContactEvent, ContactFilter, PhysicsBackend};
use crate::error::{GameError, GameResult};
use crate::renderer::{InstanceKind, InstanceMirror};
use crate::settings::AimSettings;

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub id: u32,
    pub slot: usize,
    pub body: Option<BodyId>,
    pub spawn: Vec3,
    pub velocity: Vec3,
    pub exhausted: bool,
    pub last_position: Vec3,
    pub last_rotation: Quat,
}

pub struct ProjectilePool {
    balls: Vec<Projectile>,
    by_body: BTreeMap<BodyId, usize>,
    radius: f32,
    mass: f32,
    damping: f32,
    kill_y: f32,
}

impl ProjectilePool {
    pub fn new(aim: &AimSettings, kill_y: f32) -> Self {
        Self {
            balls: Vec::new(),
            by_body: BTreeMap::new(),
            radius: aim.ball_radius,
            mass: aim.ball_mass,
            damping: aim.ball_damping,
            kill_y,
        }
    }

    pub fn balls(&self) -> &[Projectile] {
        &self.balls
    }

    /// Number of balls fired this stage
    pub fn launched(&self) -> usize {
        self.balls.len()
    }

    /// Balls still in play (not exhausted)
    pub fn live(&self) -> usize {
        self.balls.iter().filter(|b| !b.exhausted).count()
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Spawn a ball; `Ok(None)` if every ball slot is used
    pub fn launch(
        &mut self,
        world: &mut dyn PhysicsBackend,
        mirror: &mut InstanceMirror,
        position: Vec3,
        velocity: Vec3,
    ) -> GameResult<Option<u32>> {
        let slot = match mirror.allocate_slot(InstanceKind::Ball) {
            Ok(slot) => slot,
            Err(GameError::SlotCapacityExceeded { capacity, .. }) => {
                log::warn!("All {capacity} balls used, launch refused");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let body = world.add_body(
            BodyDesc::dynamic(
                BodyTag::Ball,
                BodyShape::Sphere {
                    radius: self.radius,
                },
                position,
                self.mass,
            )
            .with_velocity(velocity)
            .with_damping(self.damping, self.damping)
            .with_ccd(),
        )?;
        world.subscribe(body, ContactFilter::Ground);
        mirror.write_transform(
            InstanceKind::Ball,
            slot,
            position,
            Quat::IDENTITY,
            Vec3::splat(self.radius),
        );

        let id = self.balls.len() as u32;
        self.by_body.insert(body, self.balls.len());
        self.balls.push(Projectile {
            id,
            slot,
            body: Some(body),
            spawn: position,
            velocity,
            exhausted: false,
            last_position: position,
            last_rotation: Quat::IDENTITY,
        });
        log::info!("Launched ball #{id} with velocity {velocity}");
        Ok(Some(id))
    }

    /// Contact callback; a ground hit exhausts the ball
    pub fn on_contact(&mut self, event: &ContactEvent) -> bool {
        let Some(&index) = self.by_body.get(&event.body) else {
            return false;
        };
        let ball = &mut self.balls[index];
        if ball.exhausted || !event.other_tag.is_ground() {
            return false;
        }
        ball.exhausted = true;
        log::debug!("Ball #{} hit the ground", ball.id);
        true
    }

    /// Sync transforms and retire balls below the kill plane
    pub fn update(&mut self, world: &mut dyn PhysicsBackend, mirror: &mut InstanceMirror) {
        for ball in &mut self.balls {
            let Some(body) = ball.body else {
                continue;
            };
            let Some(state) = world.body_state(body) else {
                continue;
            };
            if state.position.y < self.kill_y {
                ball.exhausted = true;
                world.remove_body(body);
                self.by_body.remove(&body);
                ball.body = None;
                mirror.park(InstanceKind::Ball, ball.slot);
                log::debug!("Ball #{} left the stage", ball.id);
                continue;
            }
            if state.position == ball.last_position && state.rotation == ball.last_rotation {
                continue;
            }
            ball.last_position = state.position;
            ball.last_rotation = state.rotation;
            mirror.write_transform(
                InstanceKind::Ball,
                ball.slot,
                state.position,
                state.rotation,
                Vec3::splat(self.radius),
            );
        }
    }

    pub fn clear(&mut self, world: &mut dyn PhysicsBackend, mirror: &mut InstanceMirror) {
        for ball in self.balls.drain(..) {
            if let Some(body) = ball.body {
                world.remove_body(body);
            }
            mirror.park(InstanceKind::Ball, ball.slot);
        }
        self.by_body.clear();
    }

    pub fn set_kill_y(&mut self, kill_y: f32) {
        self.kill_y = kill_y;
    }
}
