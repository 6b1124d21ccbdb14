//! Rigid-body world
//!
//! [`PhysicsBackend`] is the narrow surface the rest of the game talks to;
//! [`PhysicsWorld`] implements it on rapier3d. glam types cross the boundary,
//! nalgebra stays inside this file.

use std::collections::BTreeMap;
use std::sync::Mutex;

use glam::{Quat, Vec3};
use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::*;

use super::shapes::{ObjectKind, ShapePart, validate_parts};
use super::stage::StageDefinition;
use crate::error::{GameError, GameResult};
use crate::settings::PhysicsSettings;

/// Stable handle for a body, independent of the physics engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

/// Semantic role of a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyTag {
    Ground,
    Object(ObjectKind),
    Ball,
}

impl BodyTag {
    pub fn is_ground(&self) -> bool {
        *self == BodyTag::Ground
    }
}

/// Collider geometry in body-local space
#[derive(Debug, Clone, PartialEq)]
pub enum BodyShape {
    Compound(Vec<ShapePart>),
    Sphere { radius: f32 },
}

/// How a body moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMotion {
    /// Immovable (mass 0)
    Static,
    /// Held in place until activated
    Inactive,
    Dynamic,
}

/// Everything needed to create a body
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    pub tag: BodyTag,
    pub shape: BodyShape,
    pub motion: BodyMotion,
    pub position: Vec3,
    pub rotation: Quat,
    pub linvel: Vec3,
    /// Total mass; ignored for static bodies
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Enable continuous collision detection
    pub ccd: bool,
}

impl BodyDesc {
    pub fn fixed(tag: BodyTag, shape: BodyShape, position: Vec3) -> Self {
        Self {
            tag,
            shape,
            motion: BodyMotion::Static,
            position,
            rotation: Quat::IDENTITY,
            linvel: Vec3::ZERO,
            mass: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            ccd: false,
        }
    }

    pub fn dynamic(tag: BodyTag, shape: BodyShape, position: Vec3, mass: f32) -> Self {
        Self {
            motion: BodyMotion::Dynamic,
            mass,
            ..Self::fixed(tag, shape, position)
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_velocity(mut self, linvel: Vec3) -> Self {
        self.linvel = linvel;
        self
    }

    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn with_ccd(mut self) -> Self {
        self.ccd = true;
        self
    }

    /// Start held in place; see [`PhysicsBackend::set_active`]
    pub fn inactive(mut self) -> Self {
        if self.motion == BodyMotion::Dynamic {
            self.motion = BodyMotion::Inactive;
        }
        self
    }

    fn validate(&self) -> GameResult<()> {
        let owner = match self.tag {
            BodyTag::Ground => "ground",
            BodyTag::Object(kind) => kind.as_str(),
            BodyTag::Ball => "ball",
        };
        match &self.shape {
            BodyShape::Compound(parts) => validate_parts(owner, parts)?,
            BodyShape::Sphere { radius } => {
                if !(radius.is_finite() && *radius > 0.0) {
                    return Err(GameError::InvalidShape {
                        owner: owner.to_string(),
                        part: 0,
                    });
                }
            }
        }
        if !self.position.is_finite() || !self.rotation.is_finite() || !self.linvel.is_finite() {
            return Err(GameError::InvalidBody {
                reason: format!("{owner} has a non-finite pose or velocity"),
            });
        }
        if self.motion != BodyMotion::Static && !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(GameError::InvalidBody {
                reason: format!("movable {owner} needs a positive mass, got {}", self.mass),
            });
        }
        Ok(())
    }
}

/// Snapshot of a body's kinematic state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub tag: BodyTag,
    pub position: Vec3,
    pub rotation: Quat,
    pub linvel: Vec3,
    pub angvel: Vec3,
    pub sleeping: bool,
}

/// A new contact between a subscribed body and another body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactEvent {
    /// The subscribed body
    pub body: BodyId,
    pub tag: BodyTag,
    pub other: BodyId,
    pub other_tag: BodyTag,
}

/// Which contacts a subscriber is told about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactFilter {
    Ground,
    Any,
}

impl ContactFilter {
    fn matches(&self, tag: BodyTag) -> bool {
        match self {
            ContactFilter::Ground => tag.is_ground(),
            ContactFilter::Any => true,
        }
    }
}

/// The engine-agnostic world interface
pub trait PhysicsBackend {
    fn add_body(&mut self, desc: BodyDesc) -> GameResult<BodyId>;
    /// Remove a body and its subscription; false if it did not exist
    fn remove_body(&mut self, id: BodyId) -> bool;
    /// Switch a body between held-in-place and simulated
    fn set_active(&mut self, id: BodyId, active: bool);
    fn body_state(&self, id: BodyId) -> Option<BodyState>;
    fn subscribe(&mut self, id: BodyId, filter: ContactFilter);
    fn unsubscribe(&mut self, id: BodyId);
    /// Advance by exactly `dt`, reporting new contacts of subscribed bodies
    fn step(&mut self, dt: f32, on_contact: &mut dyn FnMut(&ContactEvent));
    fn static_body_count(&self) -> usize;
    /// Bodies that are not static (inactive ones included)
    fn dynamic_body_count(&self) -> usize;
    /// True when no simulated body is moving
    fn is_settled(&self) -> bool;
}

/// Collects collision starts during a rapier step
#[derive(Default)]
struct ContactCollector {
    started: Mutex<Vec<(ColliderHandle, ColliderHandle)>>,
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let CollisionEvent::Started(a, b, _) = event
            && let Ok(mut started) = self.started.lock()
        {
            started.push((a, b));
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

#[derive(Debug, Clone, Copy)]
struct BodyEntry {
    handle: RigidBodyHandle,
    tag: BodyTag,
    motion: BodyMotion,
}

/// Linear/angular speed below which a body counts as at rest
const SETTLED_SPEED: f32 = 0.05;

/// rapier3d-backed world
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    restitution: f32,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    collector: ContactCollector,
    entries: BTreeMap<BodyId, BodyEntry>,
    subscriptions: BTreeMap<BodyId, ContactFilter>,
    next_id: u32,
}

impl PhysicsWorld {
    /// Empty world with the given gravity and restitution
    pub fn new(settings: &PhysicsSettings) -> Self {
        let [gx, gy, gz] = settings.gravity;
        Self {
            gravity: vector![gx, gy, gz],
            restitution: settings.restitution,
            params: IntegrationParameters {
                dt: settings.fixed_step,
                ..Default::default()
            },
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            collector: ContactCollector::default(),
            entries: BTreeMap::new(),
            subscriptions: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Fresh world holding one static body per ground collider of the stage
    pub fn from_stage(stage: &StageDefinition, settings: &PhysicsSettings) -> GameResult<Self> {
        let mut world = Self::new(settings);
        for ground in &stage.ground {
            world.add_body(BodyDesc::fixed(
                BodyTag::Ground,
                BodyShape::Compound(vec![ShapePart::centered_box(ground.size)]),
                ground.position,
            ))?;
        }
        log::debug!(
            "Built world for {} with {} ground bodies",
            stage.title,
            world.static_body_count()
        );
        Ok(world)
    }

    pub fn gravity(&self) -> Vec3 {
        Vec3::new(self.gravity.x, self.gravity.y, self.gravity.z)
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.entries.contains_key(&id)
    }

    fn build_collider(&self, desc: &BodyDesc, id: BodyId) -> ColliderBuilder {
        let builder = match &desc.shape {
            BodyShape::Sphere { radius } => ColliderBuilder::ball(*radius),
            BodyShape::Compound(parts) => {
                let shapes = parts
                    .iter()
                    .map(|p| {
                        let h = p.half_extents;
                        (to_isometry(p.offset, p.rotation), SharedShape::cuboid(h.x, h.y, h.z))
                    })
                    .collect();
                ColliderBuilder::new(SharedShape::compound(shapes))
            }
        };
        let builder = builder
            .restitution(self.restitution)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .user_data(id.0 as u128);
        if desc.motion == BodyMotion::Static {
            builder
        } else {
            builder.mass(desc.mass)
        }
    }

    fn body_id_of(&self, collider: ColliderHandle) -> Option<BodyId> {
        let parent = self.colliders.get(collider)?.parent()?;
        let body = self.bodies.get(parent)?;
        Some(BodyId(body.user_data as u32))
    }
}

impl PhysicsBackend for PhysicsWorld {
    fn add_body(&mut self, desc: BodyDesc) -> GameResult<BodyId> {
        desc.validate()?;
        let id = BodyId(self.next_id);
        self.next_id += 1;

        let builder = match desc.motion {
            BodyMotion::Static => RigidBodyBuilder::fixed(),
            BodyMotion::Inactive => RigidBodyBuilder::kinematic_position_based(),
            BodyMotion::Dynamic => RigidBodyBuilder::dynamic()
                .linvel(to_vector(desc.linvel))
                .linear_damping(desc.linear_damping)
                .angular_damping(desc.angular_damping)
                .ccd_enabled(desc.ccd),
        };
        let body = builder
            .pose(to_isometry(desc.position, desc.rotation))
            .user_data(id.0 as u128)
            .build();
        let handle = self.bodies.insert(body);
        let collider = self.build_collider(&desc, id);
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        if let Some(body) = self.bodies.get_mut(handle) {
            // Kept for when an inactive body is switched to dynamic
            body.set_linear_damping(desc.linear_damping);
            body.set_angular_damping(desc.angular_damping);
        }

        self.entries.insert(
            id,
            BodyEntry {
                handle,
                tag: desc.tag,
                motion: desc.motion,
            },
        );
        Ok(id)
    }

    fn remove_body(&mut self, id: BodyId) -> bool {
        self.subscriptions.remove(&id);
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        self.bodies
            .remove(
                entry.handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    fn set_active(&mut self, id: BodyId, active: bool) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        if entry.motion == BodyMotion::Static {
            return;
        }
        let Some(body) = self.bodies.get_mut(entry.handle) else {
            return;
        };
        if active {
            body.set_body_type(RigidBodyType::Dynamic, true);
            entry.motion = BodyMotion::Dynamic;
        } else {
            body.set_linvel(vector![0.0, 0.0, 0.0], false);
            body.set_angvel(vector![0.0, 0.0, 0.0], false);
            body.set_body_type(RigidBodyType::KinematicPositionBased, false);
            entry.motion = BodyMotion::Inactive;
        }
    }

    fn body_state(&self, id: BodyId) -> Option<BodyState> {
        let entry = self.entries.get(&id)?;
        let body = self.bodies.get(entry.handle)?;
        let t = body.translation();
        let r = body.rotation();
        let v = body.linvel();
        let w = body.angvel();
        Some(BodyState {
            tag: entry.tag,
            position: Vec3::new(t.x, t.y, t.z),
            rotation: Quat::from_xyzw(r.i, r.j, r.k, r.w),
            linvel: Vec3::new(v.x, v.y, v.z),
            angvel: Vec3::new(w.x, w.y, w.z),
            sleeping: body.is_sleeping(),
        })
    }

    fn subscribe(&mut self, id: BodyId, filter: ContactFilter) {
        if self.entries.contains_key(&id) {
            self.subscriptions.insert(id, filter);
        }
    }

    fn unsubscribe(&mut self, id: BodyId) {
        self.subscriptions.remove(&id);
    }

    fn step(&mut self, dt: f32, on_contact: &mut dyn FnMut(&ContactEvent)) {
        self.params.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            &(),
            &self.collector,
        );

        let started = match self.collector.started.lock() {
            Ok(mut started) => std::mem::take(&mut *started),
            Err(_) => return,
        };
        for (a, b) in started {
            let (Some(id_a), Some(id_b)) = (self.body_id_of(a), self.body_id_of(b)) else {
                continue;
            };
            let (Some(entry_a), Some(entry_b)) = (self.entries.get(&id_a), self.entries.get(&id_b))
            else {
                continue;
            };
            for (body, tag, other, other_tag) in [
                (id_a, entry_a.tag, id_b, entry_b.tag),
                (id_b, entry_b.tag, id_a, entry_a.tag),
            ] {
                if let Some(filter) = self.subscriptions.get(&body)
                    && filter.matches(other_tag)
                {
                    on_contact(&ContactEvent {
                        body,
                        tag,
                        other,
                        other_tag,
                    });
                }
            }
        }
    }

    fn static_body_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.motion == BodyMotion::Static)
            .count()
    }

    fn dynamic_body_count(&self) -> usize {
        self.entries.len() - self.static_body_count()
    }

    fn is_settled(&self) -> bool {
        self.entries
            .values()
            .filter(|e| e.motion == BodyMotion::Dynamic)
            .filter_map(|e| self.bodies.get(e.handle))
            .all(|b| {
                b.is_sleeping()
                    || (b.linvel().norm() < SETTLED_SPEED && b.angvel().norm() < SETTLED_SPEED)
            })
    }
}

fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

fn to_isometry(position: Vec3, rotation: Quat) -> Isometry<Real> {
    let q = UnitQuaternion::from_quaternion(Quaternion::new(
        rotation.w, rotation.x, rotation.y, rotation.z,
    ));
    Isometry::from_parts(Translation3::new(position.x, position.y, position.z), q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::sim::stage::builtin_stages;

    fn flat_world() -> PhysicsWorld {
        let mut world = PhysicsWorld::new(&PhysicsSettings::default());
        world
            .add_body(BodyDesc::fixed(
                BodyTag::Ground,
                BodyShape::Compound(vec![ShapePart::centered_box(Vec3::new(100.0, 50.0, 100.0))]),
                Vec3::new(0.0, -25.0, 0.0),
            ))
            .unwrap();
        world
    }

    fn ball_at(position: Vec3) -> BodyDesc {
        BodyDesc::dynamic(BodyTag::Ball, BodyShape::Sphere { radius: 0.25 }, position, 8.0)
    }

    #[test]
    fn test_from_stage_counts_only_ground() {
        for stage in builtin_stages() {
            let world = PhysicsWorld::from_stage(&stage, &PhysicsSettings::default()).unwrap();
            assert_eq!(world.static_body_count(), stage.ground.len());
            assert_eq!(world.dynamic_body_count(), 0);
        }
    }

    #[test]
    fn test_rejects_malformed_bodies() {
        let mut world = flat_world();
        let bad_shape = BodyDesc::dynamic(
            BodyTag::Object(ObjectKind::Shelf),
            BodyShape::Compound(vec![ShapePart::centered_box(Vec3::new(1.0, -1.0, 1.0))]),
            Vec3::ZERO,
            10.0,
        );
        assert!(matches!(
            world.add_body(bad_shape),
            Err(GameError::InvalidShape { .. })
        ));
        let massless = BodyDesc::dynamic(
            BodyTag::Ball,
            BodyShape::Sphere { radius: 0.25 },
            Vec3::ZERO,
            0.0,
        );
        assert!(matches!(
            world.add_body(massless),
            Err(GameError::InvalidBody { .. })
        ));
        assert_eq!(world.dynamic_body_count(), 0);
    }

    #[test]
    fn test_ball_falls_and_reports_ground_contact() {
        let mut world = flat_world();
        let ball = world.add_body(ball_at(Vec3::new(0.0, 3.0, 0.0))).unwrap();
        world.subscribe(ball, ContactFilter::Ground);

        let mut contacts = Vec::new();
        for _ in 0..60 {
            world.step(SIM_DT, &mut |e| contacts.push(*e));
        }
        assert!(!contacts.is_empty());
        assert_eq!(contacts[0].body, ball);
        assert_eq!(contacts[0].tag, BodyTag::Ball);
        assert!(contacts[0].other_tag.is_ground());
        let state = world.body_state(ball).unwrap();
        assert!(state.position.y < 1.0);
    }

    #[test]
    fn test_unsubscribed_bodies_are_silent() {
        let mut world = flat_world();
        world.add_body(ball_at(Vec3::new(0.0, 1.0, 0.0))).unwrap();
        let mut count = 0;
        for _ in 0..60 {
            world.step(SIM_DT, &mut |_| count += 1);
        }
        assert_eq!(count, 0);
    }

    #[test]
    fn test_inactive_body_holds_until_activated() {
        let mut world = flat_world();
        let id = world
            .add_body(ball_at(Vec3::new(0.0, 5.0, 0.0)).inactive())
            .unwrap();
        for _ in 0..10 {
            world.step(SIM_DT, &mut |_| {});
        }
        assert_eq!(world.body_state(id).unwrap().position.y, 5.0);

        world.set_active(id, true);
        for _ in 0..10 {
            world.step(SIM_DT, &mut |_| {});
        }
        assert!(world.body_state(id).unwrap().position.y < 5.0);
    }

    #[test]
    fn test_remove_body_drops_subscription() {
        let mut world = flat_world();
        let id = world.add_body(ball_at(Vec3::new(0.0, 1.0, 0.0))).unwrap();
        world.subscribe(id, ContactFilter::Any);
        assert!(world.remove_body(id));
        assert!(!world.remove_body(id));
        assert!(world.body_state(id).is_none());
        let mut count = 0;
        for _ in 0..30 {
            world.step(SIM_DT, &mut |_| count += 1);
        }
        assert_eq!(count, 0);
        assert_eq!(world.dynamic_body_count(), 0);
    }

    #[test]
    fn test_settles_after_resting() {
        let mut world = flat_world();
        world.add_body(ball_at(Vec3::new(0.0, 0.25, 0.0))).unwrap();
        for _ in 0..300 {
            world.step(SIM_DT, &mut |_| {});
        }
        assert!(world.is_settled());
    }
}
