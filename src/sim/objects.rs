//! Stage object lifecycle: spawn, watch for defeat, despawn, score
//!
//! Every record walks `Spawning -> Active -> Defeated -> Removed`. Bodies are
//! held in place while the entrance animation plays and are released when it
//! finishes. A defeat is recorded at most once per record; the body is frozen
//! and the despawn animation started on the next lifecycle update, which runs
//! right after the physics step that caused it.

use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::anim::{Animator, ease_out_elastic, ease_out_quart, linear};
use super::populate::populate_boxes;
use super::shapes::{FurnitureTemplate, ObjectKind, ShapePart};
use super::stage::StageDefinition;
use super::world::{BodyDesc, BodyId, BodyShape, BodyTag, ContactEvent, ContactFilter, PhysicsBackend};
use crate::error::{GameError, GameResult};
use crate::renderer::{InstanceKind, InstanceMirror};
use crate::settings::ObjectSettings;
use crate::{quat_from_euler, upright_cos};

/// Lifecycle phase of a stage object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectPhase {
    /// Entrance animation running, body held in place
    Spawning,
    /// Simulated and watched for defeat
    Active,
    /// Scored, despawn animation running
    Defeated,
    /// Out of play; kept only as a score anchor
    Removed,
}

impl ObjectPhase {
    pub fn is_out(&self) -> bool {
        matches!(self, ObjectPhase::Defeated | ObjectPhase::Removed)
    }
}

/// What defeated an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefeatCause {
    GroundContact,
    Toppled,
    OutOfBounds,
}

/// Score delta for presentation (floating score text)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreEvent {
    pub object_id: u32,
    pub delta: i64,
    pub position: Vec3,
}

/// One logical stage object
#[derive(Debug, Clone, PartialEq)]
pub struct StageObjectRecord {
    pub id: u32,
    pub kind: ObjectKind,
    /// Spawn pose of the body
    pub position: Vec3,
    pub rotation: Quat,
    /// Instance scale at rest
    pub scale: Vec3,
    pub phase: ObjectPhase,
    pub slot: usize,
    pub body: Option<BodyId>,
    pub defeated_by: Option<DefeatCause>,
    pub score: Option<i64>,
    /// Last observed world position
    pub last_position: Vec3,
    pub last_rotation: Quat,
}

impl StageObjectRecord {
    pub fn instance_kind(&self) -> InstanceKind {
        InstanceKind::from(self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ObjectAnimation {
    Spawn,
    Despawn { from: Vec3, rotation: Quat, rise: f32 },
}

pub struct ObjectLifecycle {
    records: Vec<StageObjectRecord>,
    by_body: BTreeMap<BodyId, usize>,
    animator: Animator<ObjectAnimation>,
    /// Defeated since the last update, not yet frozen
    pending: Vec<usize>,
    events: Vec<ScoreEvent>,
    settings: ObjectSettings,
    kill_y: f32,
    rng: Pcg32,
}

impl ObjectLifecycle {
    pub fn new(settings: ObjectSettings) -> Self {
        let rng = Pcg32::seed_from_u64(settings.seed);
        Self {
            records: Vec::new(),
            by_body: BTreeMap::new(),
            animator: Animator::new(),
            pending: Vec::new(),
            events: Vec::new(),
            settings,
            kill_y: crate::consts::DEFAULT_KILL_Y,
            rng,
        }
    }

    pub fn records(&self) -> &[StageObjectRecord] {
        &self.records
    }

    pub fn record(&self, id: u32) -> Option<&StageObjectRecord> {
        self.records.get(id as usize)
    }

    pub fn settings(&self) -> &ObjectSettings {
        &self.settings
    }

    /// Build records, slots and held bodies for a stage; entrance animations start at `now`
    pub fn load(
        &mut self,
        stage: &StageDefinition,
        world: &mut dyn PhysicsBackend,
        mirror: &mut InstanceMirror,
        now: f32,
    ) -> GameResult<()> {
        if !self.records.is_empty() {
            return Err(GameError::InvalidStage {
                title: stage.title.clone(),
                reason: "objects from the previous stage were not cleared".into(),
            });
        }
        self.rng = Pcg32::seed_from_u64(self.settings.seed);
        self.kill_y = stage.kill_y();

        for placement in &stage.objects {
            let Some(template) = FurnitureTemplate::for_kind(placement.kind) else {
                continue;
            };
            let rotation = quat_from_euler(placement.rotation.to_array());
            let position = placement.position + Vec3::Y * template.body_offset;
            self.spawn(
                placement.kind,
                BodyShape::Compound(template.parts),
                template.mass,
                position,
                rotation,
                Vec3::ONE,
                world,
                mirror,
            )?;
        }

        if self.settings.populate_boxes {
            let capacity = mirror.remaining(InstanceKind::Box);
            for spawn in populate_boxes(&stage.objects, &mut self.rng, capacity) {
                self.spawn(
                    ObjectKind::Box,
                    BodyShape::Compound(vec![ShapePart::centered_box(spawn.size)]),
                    spawn.mass(),
                    spawn.position,
                    spawn.rotation,
                    spawn.size,
                    world,
                    mirror,
                )?;
            }
        }

        for (order, record) in self.records.iter().enumerate() {
            self.animator.start(
                record.id,
                now + order as f32 * self.settings.spawn_stagger,
                self.settings.spawn_duration,
                ease_out_elastic,
                ObjectAnimation::Spawn,
            );
        }
        log::info!(
            "Loaded {} objects for {} ({} boxes)",
            self.records.len(),
            stage.title,
            self.records
                .iter()
                .filter(|r| r.kind == ObjectKind::Box)
                .count()
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn(
        &mut self,
        kind: ObjectKind,
        shape: BodyShape,
        mass: f32,
        position: Vec3,
        rotation: Quat,
        scale: Vec3,
        world: &mut dyn PhysicsBackend,
        mirror: &mut InstanceMirror,
    ) -> GameResult<()> {
        let instance_kind = InstanceKind::from(kind);
        let slot = mirror.allocate_slot(instance_kind)?;
        let body = world.add_body(
            BodyDesc::dynamic(BodyTag::Object(kind), shape, position, mass)
                .with_rotation(rotation)
                .inactive(),
        )?;
        mirror.write_transform(instance_kind, slot, position, rotation, Vec3::ZERO);

        let id = self.records.len() as u32;
        self.by_body.insert(body, self.records.len());
        self.records.push(StageObjectRecord {
            id,
            kind,
            position,
            rotation,
            scale,
            phase: ObjectPhase::Spawning,
            slot,
            body: Some(body),
            defeated_by: None,
            score: None,
            last_position: position,
            last_rotation: rotation,
        });
        Ok(())
    }

    /// Contact callback; returns true if it defeated the object
    pub fn on_contact(&mut self, event: &ContactEvent) -> bool {
        let Some(&index) = self.by_body.get(&event.body) else {
            return false;
        };
        let kind = self.records[index].kind;
        if event.other_tag.is_ground() && self.settings.defeated_by_ground(kind) {
            return self.defeat(index, DefeatCause::GroundContact);
        }
        false
    }

    /// Mark an active record defeated and emit its score; no-op otherwise
    fn defeat(&mut self, index: usize, cause: DefeatCause) -> bool {
        let delta = self.settings.score_for(self.records[index].kind);
        let record = &mut self.records[index];
        if record.phase != ObjectPhase::Active {
            return false;
        }
        record.phase = ObjectPhase::Defeated;
        record.defeated_by = Some(cause);
        record.score = Some(delta);
        log::debug!(
            "{} #{} defeated by {:?} ({delta:+})",
            record.kind.as_str(),
            record.id,
            cause
        );
        self.events.push(ScoreEvent {
            object_id: record.id,
            delta,
            position: record.last_position,
        });
        self.pending.push(index);
        true
    }

    /// Observe bodies, freeze fresh defeats and advance animations
    pub fn update(
        &mut self,
        world: &mut dyn PhysicsBackend,
        mirror: &mut InstanceMirror,
        now: f32,
    ) {
        self.observe(world, mirror);
        self.freeze_pending(world, now);
        self.animate(world, mirror, now);
    }

    fn observe(&mut self, world: &dyn PhysicsBackend, mirror: &mut InstanceMirror) {
        for index in 0..self.records.len() {
            let record = &mut self.records[index];
            if record.phase != ObjectPhase::Active {
                continue;
            }
            let Some(state) = record.body.and_then(|b| world.body_state(b)) else {
                continue;
            };
            if state.position != record.last_position || state.rotation != record.last_rotation {
                record.last_position = state.position;
                record.last_rotation = state.rotation;
                mirror.write_transform(
                    record.instance_kind(),
                    record.slot,
                    state.position,
                    state.rotation,
                    record.scale,
                );
            }

            let kind = record.kind;
            if state.position.y < self.kill_y {
                self.defeat(index, DefeatCause::OutOfBounds);
            } else if self.settings.defeated_by_orientation(kind)
                && upright_cos(state.rotation) < self.settings.upright_cos_threshold
            {
                self.defeat(index, DefeatCause::Toppled);
            }
        }
    }

    fn freeze_pending(&mut self, world: &mut dyn PhysicsBackend, now: f32) {
        let [lo, hi] = self.settings.despawn_rise;
        for index in std::mem::take(&mut self.pending) {
            let record = &self.records[index];
            if let Some(body) = record.body {
                world.unsubscribe(body);
                world.set_active(body, false);
            }
            // One task per slot: the despawn replaces anything still running
            self.animator.cancel_owner(record.id);
            let rise = if hi > lo {
                self.rng.random_range(lo..=hi).round()
            } else {
                lo
            };
            self.animator.start(
                record.id,
                now,
                self.settings.despawn_duration,
                linear,
                ObjectAnimation::Despawn {
                    from: record.last_position,
                    rotation: record.last_rotation,
                    rise,
                },
            );
        }
    }

    fn animate(&mut self, world: &mut dyn PhysicsBackend, mirror: &mut InstanceMirror, now: f32) {
        for frame in self.animator.poll(now) {
            let Some(record) = self.records.get_mut(frame.owner as usize) else {
                continue;
            };
            let kind = record.instance_kind();
            match frame.payload {
                ObjectAnimation::Spawn => {
                    mirror.write_transform(
                        kind,
                        record.slot,
                        record.position,
                        record.rotation,
                        record.scale * frame.eased,
                    );
                    if frame.finished && record.phase == ObjectPhase::Spawning {
                        record.phase = ObjectPhase::Active;
                        if let Some(body) = record.body {
                            world.set_active(body, true);
                            if self.settings.defeated_by_ground(record.kind) {
                                world.subscribe(body, ContactFilter::Ground);
                            }
                        }
                    }
                }
                ObjectAnimation::Despawn {
                    from,
                    rotation,
                    rise,
                } => {
                    let p = frame.progress;
                    let shrink = ease_out_elastic(1.0 - p);
                    mirror.write_transform(
                        kind,
                        record.slot,
                        from + Vec3::Y * rise * ease_out_quart(p),
                        rotation.slerp(Quat::IDENTITY, p),
                        record.scale * shrink,
                    );
                    if frame.finished {
                        if let Some(body) = record.body.take() {
                            world.remove_body(body);
                            self.by_body.remove(&body);
                        }
                        mirror.park(kind, record.slot);
                        record.phase = ObjectPhase::Removed;
                        log::debug!("{} #{} removed", record.kind.as_str(), record.id);
                    }
                }
            }
        }
    }

    /// True once every record that counts for clearance is out of play
    pub fn is_cleared(&self) -> bool {
        let counting: Vec<&StageObjectRecord> = self
            .records
            .iter()
            .filter(|r| r.kind.counts_for_clear())
            .collect();
        let pool = if counting.is_empty() {
            self.records.iter().collect()
        } else {
            counting
        };
        !pool.is_empty() && pool.iter().all(|r| r.phase.is_out())
    }

    /// Score text anchors for defeated objects
    pub fn score_anchors(&self) -> Vec<ScoreEvent> {
        self.records
            .iter()
            .filter(|r| r.phase.is_out())
            .filter_map(|r| {
                r.score.map(|delta| ScoreEvent {
                    object_id: r.id,
                    delta,
                    position: r.last_position,
                })
            })
            .collect()
    }

    pub fn drain_events(&mut self) -> Vec<ScoreEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_animating(&self) -> bool {
        !self.animator.is_idle()
    }

    /// Tear down every record: animations first, then bodies, then slots
    pub fn clear(&mut self, world: &mut dyn PhysicsBackend, mirror: &mut InstanceMirror) {
        self.animator.clear();
        self.pending.clear();
        for record in &mut self.records {
            if let Some(body) = record.body.take() {
                world.remove_body(body);
            }
            mirror.park(record.instance_kind(), record.slot);
        }
        self.records.clear();
        self.by_body.clear();
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::settings::PhysicsSettings;
    use crate::sim::stage::{GroundDef, ObjectPlacement, StageSettings};
    use crate::sim::world::PhysicsWorld;

    fn stage_with(objects: Vec<ObjectPlacement>) -> StageDefinition {
        StageDefinition {
            title: "Test".into(),
            ground: vec![GroundDef::new([0.0, -25.0, 0.0], [100.0, 50.0, 100.0])],
            objects,
            settings: StageSettings {
                center: Vec3::ZERO,
                camera: Vec3::new(10.0, 0.0, 0.0),
                radius: 50.0,
                exit_y: None,
                background: None,
            },
        }
    }

    fn quick_settings() -> ObjectSettings {
        ObjectSettings {
            spawn_duration: 0.1,
            spawn_stagger: 0.0,
            despawn_duration: 0.2,
            populate_boxes: false,
            ..ObjectSettings::default()
        }
    }

    struct Harness {
        world: PhysicsWorld,
        mirror: InstanceMirror,
        objects: ObjectLifecycle,
        now: f32,
    }

    impl Harness {
        fn new(stage: &StageDefinition, settings: ObjectSettings) -> Self {
            let mut world = PhysicsWorld::from_stage(stage, &PhysicsSettings::default()).unwrap();
            let mut mirror = InstanceMirror::new();
            let mut objects = ObjectLifecycle::new(settings);
            objects.load(stage, &mut world, &mut mirror, 0.0).unwrap();
            Self {
                world,
                mirror,
                objects,
                now: 0.0,
            }
        }

        fn tick(&mut self) {
            self.now += SIM_DT;
            let objects = &mut self.objects;
            self.world.step(SIM_DT, &mut |e| {
                objects.on_contact(e);
            });
            self.objects.update(&mut self.world, &mut self.mirror, self.now);
        }
    }

    #[test]
    fn test_load_holds_bodies_until_spawned() {
        let stage = stage_with(vec![ObjectPlacement::new(ObjectKind::Table, [0.0; 3], 0.0)]);
        let mut h = Harness::new(&stage, quick_settings());
        let record = h.objects.records()[0].clone();
        assert_eq!(record.phase, ObjectPhase::Spawning);
        assert_eq!(h.world.dynamic_body_count(), 1);
        let t = h.mirror.read_transform(InstanceKind::Table, record.slot).unwrap();
        assert_eq!(t.scale, Vec3::ZERO);

        for _ in 0..5 {
            h.tick();
        }
        let record = &h.objects.records()[0];
        assert_eq!(record.phase, ObjectPhase::Active);
        let t = h.mirror.read_transform(InstanceKind::Table, record.slot).unwrap();
        assert_eq!(t.scale, Vec3::ONE);
    }

    #[test]
    fn test_boxes_populate_and_count_for_clear() {
        let stage = stage_with(vec![ObjectPlacement::new(ObjectKind::Shelf, [0.0; 3], 0.0)]);
        let settings = ObjectSettings {
            populate_boxes: true,
            ..quick_settings()
        };
        let h = Harness::new(&stage, settings);
        let boxes = h
            .objects
            .records()
            .iter()
            .filter(|r| r.kind == ObjectKind::Box)
            .count();
        assert!(boxes >= 3);
        assert_eq!(h.mirror.allocated(InstanceKind::Box), boxes);
        assert!(!h.objects.is_cleared());
    }

    #[test]
    fn test_duplicate_ground_contact_scores_once() {
        let stage = stage_with(vec![ObjectPlacement::new(ObjectKind::Shelf, [0.0, 0.0, 3.0], 0.0)]);
        let mut settings = quick_settings();
        settings.ground_contact_kinds.push(ObjectKind::Shelf);
        settings.orientation_kinds.retain(|k| *k != ObjectKind::Shelf);
        let mut h = Harness::new(&stage, settings);

        let mut defeats = 0;
        let mut defeating = None;
        for _ in 0..60 {
            h.now += SIM_DT;
            let objects = &mut h.objects;
            h.world.step(SIM_DT, &mut |e| {
                if objects.on_contact(e) {
                    defeats += 1;
                    defeating = Some(*e);
                    assert!(!objects.on_contact(e));
                }
            });
            h.objects.update(&mut h.world, &mut h.mirror, h.now);
        }

        assert_eq!(defeats, 1);
        let event = defeating.expect("the shelf touched the ground");
        assert_eq!(event.other_tag, BodyTag::Ground);
        assert!(!h.objects.on_contact(&event));
        let events = h.objects.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].delta, -750);
        let record = &h.objects.records()[0];
        assert!(record.phase.is_out());
        assert_eq!(record.defeated_by, Some(DefeatCause::GroundContact));
    }

    #[test]
    fn test_despawn_rises_before_shrinking() {
        let stage = stage_with(vec![ObjectPlacement::new(ObjectKind::Cabinet, [0.0; 3], 0.0)]);
        let settings = ObjectSettings {
            despawn_duration: 0.9,
            ..quick_settings()
        };
        let mut h = Harness::new(&stage, settings);
        for _ in 0..5 {
            h.tick();
        }
        assert!(h.objects.defeat(0, DefeatCause::Toppled));
        let from = h.objects.records()[0].last_position;
        h.tick();
        assert_eq!(h.objects.animator.len(), 1);

        // About a fifth of the way through
        for _ in 0..5 {
            h.tick();
        }
        let record = &h.objects.records()[0];
        assert_eq!(record.phase, ObjectPhase::Defeated);
        let t = h.mirror.read_transform(InstanceKind::Cabinet, record.slot).unwrap();
        assert!((t.scale - record.scale).abs().max_element() < 0.05);
        assert!(t.position.y > from.y + 1.0);
    }

    #[test]
    fn test_despawn_removes_body_and_parks_slot() {
        let stage = stage_with(vec![ObjectPlacement::new(ObjectKind::Cabinet, [0.0; 3], 0.0)]);
        let mut h = Harness::new(&stage, quick_settings());
        for _ in 0..5 {
            h.tick();
        }
        assert!(h.objects.defeat(0, DefeatCause::Toppled));
        for _ in 0..15 {
            h.tick();
        }
        let record = &h.objects.records()[0];
        assert_eq!(record.phase, ObjectPhase::Removed);
        assert!(record.body.is_none());
        assert_eq!(h.world.dynamic_body_count(), 0);
        let t = h.mirror.read_transform(InstanceKind::Cabinet, record.slot).unwrap();
        assert_eq!(t.position, Vec3::from_array(crate::consts::PARKED_POSITION));
        assert!(h.objects.is_cleared());
        assert_eq!(h.objects.score_anchors().len(), 1);
        assert!(!h.objects.is_animating());
    }

    #[test]
    fn test_falling_below_kill_plane_defeats() {
        let mut stage = stage_with(vec![ObjectPlacement::new(ObjectKind::Plant, [0.0; 3], 0.0)]);
        stage.settings.exit_y = Some(5.0);
        let mut h = Harness::new(&stage, quick_settings());
        for _ in 0..8 {
            h.tick();
        }
        let record = &h.objects.records()[0];
        assert!(record.phase.is_out());
        assert_eq!(record.defeated_by, Some(DefeatCause::OutOfBounds));
    }

    #[test]
    fn test_tipped_furniture_is_toppled() {
        let mut placement = ObjectPlacement::new(ObjectKind::Chair, [0.0, 2.0, 0.0], 0.0);
        placement.rotation = Vec3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2);
        let stage = stage_with(vec![placement]);
        let mut h = Harness::new(&stage, quick_settings());
        for _ in 0..8 {
            h.tick();
        }
        let record = &h.objects.records()[0];
        assert!(record.phase.is_out());
        assert_eq!(record.defeated_by, Some(DefeatCause::Toppled));
        let events = h.objects.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].delta, -750);
    }

    #[test]
    fn test_clear_cancels_animations_and_frees_world() {
        let stage = stage_with(vec![
            ObjectPlacement::new(ObjectKind::Shelf, [0.0; 3], 0.0),
            ObjectPlacement::new(ObjectKind::Table, [10.0, 0.0, 0.0], 0.0),
        ]);
        let mut h = Harness::new(&stage, quick_settings());
        assert!(h.objects.is_animating());
        h.objects.clear(&mut h.world, &mut h.mirror);
        assert!(!h.objects.is_animating());
        assert!(h.objects.records().is_empty());
        assert_eq!(h.world.dynamic_body_count(), 0);
        h.tick();
        assert!(h.objects.drain_events().is_empty());
    }

    #[test]
    fn test_load_twice_without_clear_fails() {
        let stage = stage_with(vec![ObjectPlacement::new(ObjectKind::Plant, [0.0; 3], 0.0)]);
        let mut h = Harness::new(&stage, quick_settings());
        let err = h.objects.load(&stage, &mut h.world, &mut h.mirror, 0.0);
        assert!(matches!(err, Err(GameError::InvalidStage { .. })));
    }
}
