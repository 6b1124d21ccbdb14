//! Stage object kinds and their compound collider templates
//!
//! Every furniture kind is a fixed compound of boxes in body-local space, a mass,
//! and the height of the body origin above its placement point. Kinds that hold
//! boxes also declare surface locations (local line segments) that boxes are
//! populated along when a stage loads.

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{GameError, GameResult};

/// Semantic category of a stage object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    /// Scoring target populated onto furniture surfaces
    Box,
    Shelf,
    Table,
    TableChair,
    Chair,
    Cabinet,
    Plant,
}

impl ObjectKind {
    /// All furniture kinds (everything except `Box`)
    pub const FURNITURE: [ObjectKind; 6] = [
        ObjectKind::Shelf,
        ObjectKind::Table,
        ObjectKind::TableChair,
        ObjectKind::Chair,
        ObjectKind::Cabinet,
        ObjectKind::Plant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Box => "box",
            ObjectKind::Shelf => "shelf",
            ObjectKind::Table => "table",
            ObjectKind::TableChair => "table-chair",
            ObjectKind::Chair => "chair",
            ObjectKind::Cabinet => "cabinet",
            ObjectKind::Plant => "plant",
        }
    }

    pub fn is_furniture(&self) -> bool {
        *self != ObjectKind::Box
    }

    /// Returns true if this kind must be defeated to clear a stage
    pub fn counts_for_clear(&self) -> bool {
        *self == ObjectKind::Box
    }
}

/// One convex box of a compound shape, in body-local space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapePart {
    pub half_extents: Vec3,
    pub offset: Vec3,
    pub rotation: Quat,
}

impl ShapePart {
    pub fn new(half_extents: Vec3, offset: Vec3) -> Self {
        Self {
            half_extents,
            offset,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Box centered on the body origin with full size `size`
    pub fn centered_box(size: Vec3) -> Self {
        Self::new(size / 2.0, Vec3::ZERO)
    }

    fn is_well_formed(&self) -> bool {
        self.half_extents.is_finite()
            && self.half_extents.min_element() > 0.0
            && self.offset.is_finite()
            && self.rotation.is_finite()
    }
}

/// Reject compounds with missing or degenerate parts
pub fn validate_parts(owner: &str, parts: &[ShapePart]) -> GameResult<()> {
    if parts.is_empty() {
        return Err(GameError::InvalidShape {
            owner: owner.to_string(),
            part: 0,
        });
    }
    match parts.iter().position(|p| !p.is_well_formed()) {
        Some(part) => Err(GameError::InvalidShape {
            owner: owner.to_string(),
            part,
        }),
        None => Ok(()),
    }
}

/// A surface boxes can be placed along (furniture-local, relative to the location anchor)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub start: Vec3,
    pub end: Vec3,
    /// Maximum box height on this surface
    pub height: f32,
    /// Maximum box depth on this surface
    pub depth: f32,
}

/// Static description of a furniture kind
#[derive(Debug, Clone)]
pub struct FurnitureTemplate {
    pub parts: Vec<ShapePart>,
    pub mass: f32,
    /// Height of the body origin above the placement point
    pub body_offset: f32,
    /// Height of the location frame origin above the placement point
    pub location_anchor: f32,
    pub locations: Vec<Location>,
    /// Box width range as a fraction of location length
    pub size_range: [f32; 2],
    /// Gap range between boxes as a fraction of location length
    pub gap_range: [f32; 2],
}

const DEFAULT_SIZE_RANGE: [f32; 2] = [0.1, 0.3];
const DEFAULT_GAP_RANGE: [f32; 2] = [0.05, 0.2];

impl FurnitureTemplate {
    /// Template for a furniture kind; `None` for boxes, whose shape comes from their size
    pub fn for_kind(kind: ObjectKind) -> Option<Self> {
        match kind {
            ObjectKind::Box => None,
            ObjectKind::Shelf => Some(shelf()),
            ObjectKind::Table => Some(table()),
            ObjectKind::TableChair => Some(table_chair()),
            ObjectKind::Chair => Some(chair()),
            ObjectKind::Cabinet => Some(cabinet()),
            ObjectKind::Plant => Some(plant()),
        }
    }
}

fn shelf() -> FurnitureTemplate {
    let depth: f32 = 2.0;
    let height = 7.0;
    let width = 5.0;
    let leg = 0.15;
    let board = 0.1;

    let mut parts: Vec<ShapePart> = [(1.0f32, 1.0f32), (-1.0, 1.0), (-1.0, -1.0), (1.0, -1.0)]
        .into_iter()
        .map(|(sx, sz)| {
            ShapePart::new(
                Vec3::new(leg, height / 2.0, leg),
                Vec3::new(sx * width / 2.0, 0.0, sz * depth / 2.0),
            )
        })
        .collect();
    for y in [0.0, -height / 3.0, height / 3.0] {
        parts.push(ShapePart::new(
            Vec3::new(width / 2.0 + leg, board, depth / 2.0 + leg),
            Vec3::new(0.0, y, 0.0),
        ));
    }

    let span = |y: f32| {
        (
            Vec3::new(width / 2.0 - leg, y, 0.0),
            Vec3::new(-width / 2.0 + leg, y, 0.0),
        )
    };
    let locations = [
        (span(-height / 3.0 + board), height / 3.0 - board - 0.25),
        (span(board), height / 3.0 - board - 0.25),
        (span(height / 3.0 + board), height / 3.0 + 1.0),
    ]
    .into_iter()
    .map(|((start, end), h)| Location {
        start,
        end,
        height: h,
        depth: 2.0,
    })
    .collect();

    FurnitureTemplate {
        parts,
        mass: 20.0,
        body_offset: height / 2.0,
        location_anchor: height / 2.0,
        locations,
        size_range: DEFAULT_SIZE_RANGE,
        gap_range: DEFAULT_GAP_RANGE,
    }
}

fn table() -> FurnitureTemplate {
    let width = 8.0;
    let thickness = 0.3;
    let height = 3.0;
    let depth = 5.0;
    let inset = 0.4;

    let mut parts = vec![ShapePart::new(
        Vec3::new(width / 2.0, thickness / 2.0, depth / 2.0),
        Vec3::new(0.0, thickness / 2.0, 0.0),
    )];
    parts.extend(four_legs(
        width / 2.0 - inset,
        depth / 2.0 - inset,
        Vec3::new(thickness / 2.0, height / 2.0, thickness / 2.0),
        -height / 2.0,
    ));

    FurnitureTemplate {
        parts,
        mass: 20.0,
        body_offset: height,
        location_anchor: height + thickness,
        locations: vec![Location {
            start: Vec3::new(width / 2.0 * 0.85, 0.0, 0.0),
            end: Vec3::new(-width / 2.0 * 0.85, 0.0, 0.0),
            height: 4.0,
            depth: depth * 0.75,
        }],
        size_range: [0.25, 0.4],
        gap_range: [0.2, 0.35],
    }
}

fn table_chair() -> FurnitureTemplate {
    let width = 2.0;
    let seat_height = 1.75;
    let depth = 2.0;
    let thickness = 0.225;
    let inset = thickness / 2.0;
    let post = Vec3::new(thickness / 2.0, seat_height / 2.0, thickness / 2.0);

    let mut parts = vec![ShapePart::new(
        Vec3::new(width / 2.0, thickness / 2.0, depth / 2.0),
        Vec3::new(0.0, thickness / 2.0, 0.0),
    )];
    parts.extend(four_legs(
        width / 2.0 - inset,
        depth / 2.0 - inset,
        post,
        -seat_height / 2.0,
    ));
    parts.push(ShapePart::new(
        Vec3::new(width / 2.0, seat_height / 4.0, thickness / 2.0),
        Vec3::new(
            0.0,
            seat_height + thickness - seat_height / 4.0,
            depth / 2.0 - thickness / 2.0,
        ),
    ));
    for x in [width / 2.0 - inset, -width / 2.0 + inset] {
        parts.push(ShapePart::new(
            post,
            Vec3::new(x, seat_height / 2.0 + thickness, depth / 2.0 - inset),
        ));
    }

    FurnitureTemplate {
        parts,
        mass: 10.0,
        body_offset: seat_height,
        location_anchor: thickness + seat_height,
        locations: vec![Location {
            start: Vec3::new(width / 2.0, 0.0, 0.0),
            end: Vec3::new(-width / 2.0, 0.0, 0.0),
            height: 3.0,
            depth: depth * 0.75,
        }],
        size_range: [0.5, 0.65],
        gap_range: DEFAULT_GAP_RANGE,
    }
}

fn chair() -> FurnitureTemplate {
    let height = 1.8;
    let depth = 2.2;
    let width = 2.75;
    let thick = 0.15 + 0.25;
    let above_floor = 1.75;
    let leg = 0.15;
    let tilt = Quat::from_rotation_x(-0.1);

    let mut parts = vec![
        ShapePart::new(
            Vec3::new(width / 2.0, thick / 2.0, depth / 2.0),
            Vec3::ZERO,
        )
        .rotated(tilt),
        ShapePart::new(
            Vec3::new(width / 2.0, height / 2.0, thick / 2.0),
            Vec3::new(0.0, height / 2.0 - thick * 0.75, -depth / 2.0),
        )
        .rotated(tilt),
    ];
    // Splayed legs
    for (x, z, splay_x, splay_z) in [
        (1.0, -0.75, 0.5, 0.7),
        (1.0, 0.25, -0.5, 0.7),
        (-1.0, -0.75, 0.5, -0.7),
        (-1.0, 0.25, -0.5, -0.7),
    ] {
        parts.push(
            ShapePart::new(
                Vec3::new(leg / 2.0, above_floor / 2.0, leg / 2.0),
                Vec3::new(x, -above_floor / 2.0 + 0.1, z),
            )
            .rotated(Quat::from_euler(EulerRot::ZYX, splay_z, 0.0, splay_x)),
        );
    }

    FurnitureTemplate {
        parts,
        mass: 25.0,
        body_offset: 1.5,
        location_anchor: height / 2.0,
        locations: vec![Location {
            start: Vec3::new(width / 2.0 * 0.85, 0.75, 0.0),
            end: Vec3::new(-width / 2.0 * 0.85, 0.75, 0.0),
            height: 2.0,
            depth: depth * 0.75,
        }],
        size_range: [0.5, 0.65],
        gap_range: DEFAULT_GAP_RANGE,
    }
}

fn cabinet() -> FurnitureTemplate {
    let width = 4.0;
    let height = 4.0;
    let depth = 1.6;
    let top = 0.1;

    FurnitureTemplate {
        parts: vec![
            ShapePart::new(
                Vec3::new(width / 2.0, height / 2.0 - top, depth / 2.0),
                Vec3::new(0.0, -top, 0.0),
            ),
            ShapePart::new(
                Vec3::new(width / 2.0 + 0.1, top, depth / 2.0 + 0.1),
                Vec3::new(0.0, height / 2.0 - top, 0.0),
            ),
        ],
        mass: 30.0,
        body_offset: height / 2.0,
        location_anchor: height,
        locations: vec![Location {
            start: Vec3::new(width / 2.0 - 0.2, 0.0, 0.0),
            end: Vec3::new(-width / 2.0 + 0.2, 0.0, 0.0),
            height: 2.0,
            depth: depth * 0.85,
        }],
        size_range: [0.2, 0.35],
        gap_range: DEFAULT_GAP_RANGE,
    }
}

fn plant() -> FurnitureTemplate {
    // Top-heavy: pot, stem, foliage
    FurnitureTemplate {
        parts: vec![
            ShapePart::new(Vec3::new(0.6, 0.6, 0.6), Vec3::ZERO),
            ShapePart::new(Vec3::new(0.1, 1.2, 0.1), Vec3::new(0.0, 1.8, 0.0)),
            ShapePart::new(Vec3::new(0.9, 0.7, 0.9), Vec3::new(0.0, 3.2, 0.0)),
        ],
        mass: 6.0,
        body_offset: 0.6,
        location_anchor: 0.0,
        locations: Vec::new(),
        size_range: DEFAULT_SIZE_RANGE,
        gap_range: DEFAULT_GAP_RANGE,
    }
}

/// Four legs at (±x, y, ±z)
fn four_legs(x: f32, z: f32, half_extents: Vec3, y: f32) -> impl Iterator<Item = ShapePart> {
    [(x, z), (-x, z), (-x, -z), (x, -z)]
        .into_iter()
        .map(move |(lx, lz)| ShapePart::new(half_extents, Vec3::new(lx, y, lz)))
}
