//! Aim preview polyline
//!
//! The vertex buffer keeps its allocation between previews; hiding collapses
//! the line to two points far below the stage.

use glam::Vec3;

use super::vertex::{LineVertex, colors};

/// Height the hidden line is parked at
pub const HIDDEN_Y: f32 = -100.0;

#[derive(Debug, Default)]
pub struct TrajectoryLine {
    vertices: Vec<LineVertex>,
    visible: bool,
}

impl TrajectoryLine {
    pub fn new() -> Self {
        let mut line = Self::default();
        line.hide();
        line
    }

    /// Replace the path; colors fade from white at the start to blue at the end
    pub fn set_path(&mut self, samples: &[Vec3]) {
        if samples.is_empty() {
            self.hide();
            return;
        }
        self.vertices.clear();
        let last = (samples.len() - 1).max(1) as f32;
        self.vertices
            .extend(samples.iter().enumerate().map(|(i, p)| {
                let t = i as f32 / last;
                let near = Vec3::from_array(colors::PREVIEW_NEAR);
                let far = Vec3::from_array(colors::PREVIEW_FAR);
                LineVertex::new(p.to_array(), near.lerp(far, t).to_array())
            }));
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.vertices.clear();
        let parked = LineVertex::new([0.0, HIDDEN_Y, 0.0], colors::PREVIEW_NEAR);
        self.vertices.extend([parked, parked]);
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn vertices(&self) -> &[LineVertex] {
        &self.vertices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_line_is_below_stage() {
        let line = TrajectoryLine::new();
        assert!(!line.is_visible());
        assert_eq!(line.vertices().len(), 2);
        assert!(line.vertices().iter().all(|v| v.position[1] == HIDDEN_Y));
    }

    #[test]
    fn test_path_fades_white_to_blue() {
        let mut line = TrajectoryLine::new();
        line.set_path(&[Vec3::ZERO, Vec3::X, Vec3::new(2.0, -1.0, 0.0)]);
        assert!(line.is_visible());
        let v = line.vertices();
        assert_eq!(v[0].color, colors::PREVIEW_NEAR);
        assert_eq!(v[2].color, colors::PREVIEW_FAR);
        assert_eq!(v[1].position, [1.0, 0.0, 0.0]);

        line.hide();
        assert_eq!(line.vertices().len(), 2);
    }
}
