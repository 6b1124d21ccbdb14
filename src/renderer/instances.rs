//! Fixed-capacity instance buffers, one per drawable kind
//!
//! Each kind owns a flat array of model matrices sized to its capacity. Slots
//! are handed out by a monotonically increasing counter and never reused for
//! the lifetime of a stage; retired slots are parked far behind the camera.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

use crate::consts::PARKED_POSITION;
use crate::error::{GameError, GameResult};
use crate::quat_from_euler;
use crate::sim::ObjectKind;

/// A drawable kind with its own instanced draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceKind {
    Ground,
    Ball,
    Box,
    Shelf,
    Table,
    TableChair,
    Chair,
    Cabinet,
    Plant,
}

impl InstanceKind {
    pub const COUNT: usize = 9;

    pub const ALL: [InstanceKind; Self::COUNT] = [
        InstanceKind::Ground,
        InstanceKind::Ball,
        InstanceKind::Box,
        InstanceKind::Shelf,
        InstanceKind::Table,
        InstanceKind::TableChair,
        InstanceKind::Chair,
        InstanceKind::Cabinet,
        InstanceKind::Plant,
    ];

    /// Fixed number of instances the kind's buffer holds
    pub fn capacity(&self) -> usize {
        match self {
            InstanceKind::Box => 100,
            InstanceKind::Ball => 50,
            InstanceKind::Ground => 25,
            _ => 10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceKind::Ground => "ground",
            InstanceKind::Ball => "ball",
            InstanceKind::Box => "box",
            InstanceKind::Shelf => "shelf",
            InstanceKind::Table => "table",
            InstanceKind::TableChair => "table-chair",
            InstanceKind::Chair => "chair",
            InstanceKind::Cabinet => "cabinet",
            InstanceKind::Plant => "plant",
        }
    }

    /// Radius of the unscaled mesh's bounding sphere
    pub fn mesh_radius(&self) -> f32 {
        match self {
            // Unit cube / unit sphere meshes scaled per instance
            InstanceKind::Ground | InstanceKind::Box => 0.87,
            InstanceKind::Ball => 1.0,
            InstanceKind::Shelf => 4.6,
            InstanceKind::Table => 5.2,
            InstanceKind::TableChair => 2.3,
            InstanceKind::Chair => 2.2,
            InstanceKind::Cabinet => 2.6,
            InstanceKind::Plant => 4.0,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl From<ObjectKind> for InstanceKind {
    fn from(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Box => InstanceKind::Box,
            ObjectKind::Shelf => InstanceKind::Shelf,
            ObjectKind::Table => InstanceKind::Table,
            ObjectKind::TableChair => InstanceKind::TableChair,
            ObjectKind::Chair => InstanceKind::Chair,
            ObjectKind::Cabinet => InstanceKind::Cabinet,
            ObjectKind::Plant => InstanceKind::Plant,
        }
    }
}

/// Rotation as authored (Euler triple) or as simulated (quaternion)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rotation {
    Euler([f32; 3]),
    Quat(Quat),
}

impl Rotation {
    pub fn to_quat(self) -> Quat {
        match self {
            Rotation::Euler(euler) => quat_from_euler(euler),
            Rotation::Quat(q) => q,
        }
    }
}

impl From<[f32; 3]> for Rotation {
    fn from(euler: [f32; 3]) -> Self {
        Rotation::Euler(euler)
    }
}

impl From<[f32; 4]> for Rotation {
    fn from(xyzw: [f32; 4]) -> Self {
        Rotation::Quat(Quat::from_array(xyzw))
    }
}

impl From<Quat> for Rotation {
    fn from(q: Quat) -> Self {
        Rotation::Quat(q)
    }
}

/// Per-instance data uploaded to the GPU (column-major model matrix)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
}

impl InstanceRaw {
    fn from_transform(t: &InstanceTransform) -> Self {
        Self {
            model: Mat4::from_scale_rotation_translation(t.scale, t.rotation, t.position)
                .to_cols_array_2d(),
        }
    }
}

/// Decomposed transform kept alongside the matrix so reads are exact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl InstanceTransform {
    pub fn parked() -> Self {
        Self {
            position: Vec3::from_array(PARKED_POSITION),
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// Axis-aligned bounds used for frustum culling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    fn around(center: Vec3, radius: f32) -> Self {
        Self {
            min: center - Vec3::splat(radius),
            max: center + Vec3::splat(radius),
        }
    }

    fn union(self, other: Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// One kind's instance array
#[derive(Debug)]
struct InstanceBuffer {
    kind: InstanceKind,
    raw: Vec<InstanceRaw>,
    transforms: Vec<InstanceTransform>,
    /// Written since allocation and not parked
    live: Vec<bool>,
    next_free: usize,
    visible: bool,
    bounds: Option<Aabb>,
}

impl InstanceBuffer {
    fn new(kind: InstanceKind) -> Self {
        let capacity = kind.capacity();
        let parked = InstanceTransform::parked();
        Self {
            kind,
            raw: vec![InstanceRaw::from_transform(&parked); capacity],
            transforms: vec![parked; capacity],
            live: vec![false; capacity],
            next_free: 0,
            visible: true,
            bounds: None,
        }
    }

    fn recompute_bounds(&mut self) {
        let radius = self.kind.mesh_radius();
        self.bounds = self
            .transforms
            .iter()
            .zip(&self.live)
            .filter(|(_, live)| **live)
            .map(|(t, _)| Aabb::around(t.position, radius * t.scale.abs().max_element()))
            .reduce(Aabb::union);
    }
}

/// CPU mirror of every instanced draw buffer
#[derive(Debug)]
pub struct InstanceMirror {
    buffers: [InstanceBuffer; InstanceKind::COUNT],
    dirty: bool,
}

impl Default for InstanceMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceMirror {
    pub fn new() -> Self {
        Self {
            buffers: InstanceKind::ALL.map(InstanceBuffer::new),
            dirty: false,
        }
    }

    /// Reserve the next slot for a kind; the slot starts parked
    pub fn allocate_slot(&mut self, kind: InstanceKind) -> GameResult<usize> {
        let buffer = &mut self.buffers[kind.index()];
        if buffer.next_free >= kind.capacity() {
            return Err(GameError::SlotCapacityExceeded {
                kind,
                capacity: kind.capacity(),
            });
        }
        let index = buffer.next_free;
        buffer.next_free += 1;
        Ok(index)
    }

    /// Number of slots handed out for a kind
    pub fn allocated(&self, kind: InstanceKind) -> usize {
        self.buffers[kind.index()].next_free
    }

    pub fn remaining(&self, kind: InstanceKind) -> usize {
        kind.capacity() - self.allocated(kind)
    }

    /// Update one instance's model matrix and the kind's culling bounds
    pub fn write_transform(
        &mut self,
        kind: InstanceKind,
        index: usize,
        position: Vec3,
        rotation: impl Into<Rotation>,
        scale: Vec3,
    ) {
        let buffer = &mut self.buffers[kind.index()];
        if index >= buffer.next_free {
            log::warn!("write to unallocated {} slot {index}", kind.as_str());
            return;
        }
        let transform = InstanceTransform {
            position,
            rotation: rotation.into().to_quat(),
            scale,
        };
        buffer.transforms[index] = transform;
        buffer.raw[index] = InstanceRaw::from_transform(&transform);
        buffer.live[index] = true;
        buffer.recompute_bounds();
        self.dirty = true;
    }

    pub fn read_transform(&self, kind: InstanceKind, index: usize) -> Option<InstanceTransform> {
        let buffer = &self.buffers[kind.index()];
        (index < buffer.next_free).then(|| buffer.transforms[index])
    }

    /// Move a retired slot off-screen; the slot stays allocated
    pub fn park(&mut self, kind: InstanceKind, index: usize) {
        let buffer = &mut self.buffers[kind.index()];
        if index >= buffer.next_free {
            return;
        }
        let parked = InstanceTransform::parked();
        buffer.transforms[index] = parked;
        buffer.raw[index] = InstanceRaw::from_transform(&parked);
        buffer.live[index] = false;
        buffer.recompute_bounds();
        self.dirty = true;
    }

    pub fn set_visible(&mut self, kind: InstanceKind, visible: bool) {
        self.buffers[kind.index()].visible = visible;
        self.dirty = true;
    }

    pub fn is_visible(&self, kind: InstanceKind) -> bool {
        self.buffers[kind.index()].visible
    }

    /// Culling bounds over live instances, `None` if nothing is live
    pub fn bounds(&self, kind: InstanceKind) -> Option<Aabb> {
        self.buffers[kind.index()].bounds
    }

    /// The allocated prefix of a kind's instance array, ready for upload
    pub fn raw(&self, kind: InstanceKind) -> &[InstanceRaw] {
        let buffer = &self.buffers[kind.index()];
        &buffer.raw[..buffer.next_free]
    }

    /// Returns and clears the "buffers changed" flag
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Drop every slot; only valid once nothing references them
    pub fn reset(&mut self) {
        self.buffers = InstanceKind::ALL.map(InstanceBuffer::new);
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_slot_is_parked() {
        let mut mirror = InstanceMirror::new();
        let index = mirror.allocate_slot(InstanceKind::Box).unwrap();
        let t = mirror.read_transform(InstanceKind::Box, index).unwrap();
        assert_eq!(t.position, Vec3::from_array(PARKED_POSITION));
        assert!(mirror.bounds(InstanceKind::Box).is_none());
    }

    #[test]
    fn test_slots_are_monotonic() {
        let mut mirror = InstanceMirror::new();
        let a = mirror.allocate_slot(InstanceKind::Shelf).unwrap();
        let b = mirror.allocate_slot(InstanceKind::Shelf).unwrap();
        mirror.park(InstanceKind::Shelf, a);
        let c = mirror.allocate_slot(InstanceKind::Shelf).unwrap();
        assert_eq!((a, b, c), (0, 1, 2));
    }

    #[test]
    fn test_euler_and_quat_rotation_agree() {
        let mut mirror = InstanceMirror::new();
        let i = mirror.allocate_slot(InstanceKind::Table).unwrap();
        let j = mirror.allocate_slot(InstanceKind::Table).unwrap();
        let euler = [0.0, 1.5, 0.0];
        mirror.write_transform(InstanceKind::Table, i, Vec3::ZERO, euler, Vec3::ONE);
        mirror.write_transform(
            InstanceKind::Table,
            j,
            Vec3::ZERO,
            quat_from_euler(euler),
            Vec3::ONE,
        );
        let raw = mirror.raw(InstanceKind::Table);
        for col in 0..4 {
            for row in 0..4 {
                assert!((raw[0].model[col][row] - raw[1].model[col][row]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_bounds_follow_writes_and_parking() {
        let mut mirror = InstanceMirror::new();
        let i = mirror.allocate_slot(InstanceKind::Ground).unwrap();
        let j = mirror.allocate_slot(InstanceKind::Ground).unwrap();
        mirror.write_transform(InstanceKind::Ground, i, Vec3::ZERO, [0.0; 3], Vec3::ONE);
        mirror.write_transform(
            InstanceKind::Ground,
            j,
            Vec3::new(10.0, 0.0, 0.0),
            [0.0; 3],
            Vec3::ONE,
        );
        let bounds = mirror.bounds(InstanceKind::Ground).unwrap();
        assert!(bounds.contains(Vec3::ZERO));
        assert!(bounds.contains(Vec3::new(10.0, 0.0, 0.0)));

        mirror.park(InstanceKind::Ground, j);
        let bounds = mirror.bounds(InstanceKind::Ground).unwrap();
        assert!(!bounds.contains(Vec3::new(10.0, 0.0, 0.0)));
    }

    #[test]
    fn test_visibility_marks_dirty() {
        let mut mirror = InstanceMirror::new();
        mirror.take_dirty();
        assert!(mirror.is_visible(InstanceKind::Plant));
        mirror.set_visible(InstanceKind::Plant, false);
        assert!(!mirror.is_visible(InstanceKind::Plant));
        assert!(mirror.is_visible(InstanceKind::Chair));
        assert!(mirror.take_dirty());
        assert!(!mirror.take_dirty());
    }

    #[test]
    fn test_write_to_unallocated_slot_is_ignored() {
        let mut mirror = InstanceMirror::new();
        mirror.write_transform(InstanceKind::Ball, 3, Vec3::ZERO, [0.0; 3], Vec3::ONE);
        assert!(mirror.read_transform(InstanceKind::Ball, 3).is_none());
        assert!(mirror.raw(InstanceKind::Ball).is_empty());
    }

    proptest! {
        #[test]
        fn prop_allocation_never_exceeds_capacity(extra in 1usize..20, which in 0usize..InstanceKind::COUNT) {
            let kind = InstanceKind::ALL[which];
            let mut mirror = InstanceMirror::new();
            for expected in 0..kind.capacity() {
                prop_assert_eq!(mirror.allocate_slot(kind).unwrap(), expected);
            }
            for _ in 0..extra {
                let is_capacity_error = matches!(
                    mirror.allocate_slot(kind),
                    Err(GameError::SlotCapacityExceeded { .. })
                );
                prop_assert!(is_capacity_error);
            }
            prop_assert_eq!(mirror.allocated(kind), kind.capacity());
        }

        #[test]
        fn prop_transform_round_trip(
            x in -100.0f32..100.0, y in -100.0f32..100.0, z in -100.0f32..100.0,
            rx in -3.0f32..3.0, ry in -3.0f32..3.0, rz in -3.0f32..3.0,
            s in 0.1f32..10.0,
        ) {
            let mut mirror = InstanceMirror::new();
            let index = mirror.allocate_slot(InstanceKind::Box).unwrap();
            let position = Vec3::new(x, y, z);
            let rotation = quat_from_euler([rx, ry, rz]);
            let scale = Vec3::new(s, s * 0.5, s * 2.0);
            mirror.write_transform(InstanceKind::Box, index, position, rotation, scale);

            let read = mirror.read_transform(InstanceKind::Box, index).unwrap();
            prop_assert!((read.position - position).length() < 1e-4);
            prop_assert!(read.rotation.dot(rotation).abs() > 0.9999);
            prop_assert!((read.scale - scale).length() < 1e-4);

            let (m_scale, m_rot, m_pos) =
                Mat4::from_cols_array_2d(&mirror.raw(InstanceKind::Box)[index].model)
                    .to_scale_rotation_translation();
            prop_assert!((m_pos - position).length() < 1e-3);
            prop_assert!(m_rot.dot(rotation).abs() > 0.999);
            prop_assert!((m_scale - scale).length() < 1e-3);
        }
    }
}
