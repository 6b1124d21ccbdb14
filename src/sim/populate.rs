//! Seeded box population along furniture surfaces

use glam::{Quat, Vec3};
use rand::Rng;
use rand_pcg::Pcg32;

use super::shapes::{FurnitureTemplate, Location};
use super::stage::ObjectPlacement;
use crate::consts::BOX_DROP_CLEARANCE;
use crate::quat_from_euler;

/// Narrowest box after the first one on a surface (fraction of surface length)
const MIN_FOLLOWING_WIDTH: f32 = 0.1;
/// Widest box after the first one on a surface
const MAX_FOLLOWING_WIDTH: f32 = 0.35;
/// Random inset of the first box from the surface end
const MAX_START_INSET: f32 = 0.1;

/// A box to spawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSpawn {
    pub position: Vec3,
    pub rotation: Quat,
    pub size: Vec3,
    /// Index of the furniture placement it sits on
    pub owner: usize,
}

impl BoxSpawn {
    /// Boxes weigh their volume
    pub fn mass(&self) -> f32 {
        self.size.x * self.size.y * self.size.z
    }
}

fn random_between(rng: &mut Pcg32, lo: f32, hi: f32) -> f32 {
    if hi > lo { rng.random_range(lo..hi) } else { lo }
}

/// Boxes for every location of every placement, capped at `capacity`
pub fn populate_boxes(
    placements: &[ObjectPlacement],
    rng: &mut Pcg32,
    capacity: usize,
) -> Vec<BoxSpawn> {
    let mut spawns = Vec::new();
    for (owner, placement) in placements.iter().enumerate() {
        let Some(template) = FurnitureTemplate::for_kind(placement.kind) else {
            continue;
        };
        let rotation = quat_from_euler(placement.rotation.to_array());
        let anchor = placement.position + Vec3::Y * template.location_anchor;
        for location in &template.locations {
            for (center, size) in fill_location(location, &template, rng) {
                spawns.push(BoxSpawn {
                    position: anchor
                        + rotation * center
                        + Vec3::Y * (size.y / 2.0 + BOX_DROP_CLEARANCE),
                    rotation,
                    size,
                    owner,
                });
            }
        }
    }
    if spawns.len() > capacity {
        log::warn!(
            "Populated {} boxes, only {capacity} fit; dropping the rest",
            spawns.len()
        );
        spawns.truncate(capacity);
    }
    spawns
}

/// Local centers (on the surface) and sizes of the boxes along one location
fn fill_location(
    location: &Location,
    template: &FurnitureTemplate,
    rng: &mut Pcg32,
) -> Vec<(Vec3, Vec3)> {
    let length = location.start.distance(location.end);
    if length <= 0.0 {
        return Vec::new();
    }
    let at = |t: f32| location.start.lerp(location.end, t);

    let dir: f32 = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
    let mut t = if dir > 0.0 { 0.0 } else { 1.0 };
    t += random_between(rng, 0.0, MAX_START_INSET) * dir;

    let [min_size, max_size] = template.size_range;
    let [min_gap, max_gap] = template.gap_range;
    let mut width = random_between(rng, min_size, max_size);
    let mut gap = 0.0;

    let mut boxes = Vec::new();
    loop {
        let end = t + (width + gap) * dir;
        if !(0.0..=1.0).contains(&end) {
            break;
        }
        let center = at(t + (width / 2.0 + gap / 2.0) * dir);
        let size = Vec3::new(
            width * length,
            random_between(rng, location.height * 0.25, location.height),
            random_between(rng, location.depth * 0.5, location.depth),
        );
        boxes.push((center, size));

        t = end;
        let remainder = if dir > 0.0 { 1.0 - t } else { t };
        let max_width = MAX_FOLLOWING_WIDTH.min(remainder);
        if max_width <= MIN_FOLLOWING_WIDTH {
            break;
        }
        width = random_between(rng, MIN_FOLLOWING_WIDTH, max_width);
        gap = random_between(rng, min_gap, max_gap);
    }
    boxes
}
