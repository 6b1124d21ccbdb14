//! Vertex types for line rendering

use bytemuck::{Pod, Zeroable};

/// 3D line vertex with position and color
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl LineVertex {
    pub const fn new(position: [f32; 3], color: [f32; 3]) -> Self {
        Self { position, color }
    }
}

/// Colors for the aim preview
pub mod colors {
    pub const PREVIEW_NEAR: [f32; 3] = [1.0, 1.0, 1.0];
    pub const PREVIEW_FAR: [f32; 3] = [0.0, 0.0, 1.0];
}
