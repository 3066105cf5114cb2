use glam::{Mat4, Vec3};

use crate::gpu::{DrawCall, GpuContext, Primitive, RenderState};

const AXIS_COLORS: [[f32; 4]; 3] = [
    [1.0, 0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0, 1.0],
    [0.0, 0.0, 1.0, 1.0],
];

/// X/Y/Z reference lines starting at `origin`
#[derive(Debug, Clone, PartialEq)]
pub struct Axes {
    pub origin: Vec3,
    pub length: f32,
}

impl Default for Axes {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            length: 0.0,
        }
    }
}

impl Axes {
    /// One segment per axis, X first
    pub fn segments(&self) -> [[f32; 6]; 3] {
        let o = self.origin;
        let mut out = [[0.0; 6]; 3];
        for (i, dir) in [Vec3::X, Vec3::Y, Vec3::Z].into_iter().enumerate() {
            let end = o + dir * self.length;
            out[i] = [o.x, o.y, o.z, end.x, end.y, end.z];
        }
        out
    }

    pub fn render(&self, gpu: &mut dyn GpuContext, mvp: Mat4, line_width: f32) {
        if self.length <= 0.0 {
            return;
        }
        let state = RenderState {
            line_width,
            ..RenderState::default()
        };
        for (segment, color) in self.segments().iter().zip(AXIS_COLORS) {
            gpu.draw(&DrawCall::new(Primitive::Lines, segment, color, mvp).with_state(state));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments() {
        let axes = Axes {
            origin: Vec3::new(1.0, 2.0, 3.0),
            length: 10.0,
        };
        let s = axes.segments();
        assert_eq!(s[0], [1.0, 2.0, 3.0, 11.0, 2.0, 3.0]);
        assert_eq!(s[2], [1.0, 2.0, 3.0, 1.0, 2.0, 13.0]);
    }
}
