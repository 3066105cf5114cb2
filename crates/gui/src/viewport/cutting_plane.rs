use canvas3d_model::{BoundingBoxf3, ExPolygon};
use glam::Mat4;

use super::geometry::GeometryBuffer;
use crate::gpu::{DrawCall, GpuContext, Primitive, RenderState};
use crate::settings::CuttingPlaneSettings;

/// Horizontal cross-section at height `z`; hidden while `z` is negative
#[derive(Debug, Clone)]
pub struct CuttingPlane {
    z: f32,
    lines: GeometryBuffer,
}

impl Default for CuttingPlane {
    fn default() -> Self {
        Self {
            z: -1.0,
            lines: GeometryBuffer::new(),
        }
    }
}

impl CuttingPlane {
    pub fn z(&self) -> f32 {
        self.z
    }

    pub fn lines(&self) -> &GeometryBuffer {
        &self.lines
    }

    pub fn is_visible(&self) -> bool {
        self.z >= 0.0
    }

    /// Store the height and rebuild the contour from the slice polygons (contours and holes)
    pub fn set(&mut self, z: f32, polygons: &[ExPolygon]) -> bool {
        self.z = z;
        let lines: Vec<_> = polygons.iter().flat_map(ExPolygon::lines).collect();
        self.lines.set_from_lines(&lines, z)
    }

    /// The plane quad over `bb` grown by `margin`, as two triangles
    pub fn plane_triangles(&self, bb: &BoundingBoxf3, margin: f32) -> Option<[f32; 18]> {
        if !bb.defined {
            return None;
        }
        let min_x = bb.min[0] as f32 - margin;
        let min_y = bb.min[1] as f32 - margin;
        let max_x = bb.max[0] as f32 + margin;
        let max_y = bb.max[1] as f32 + margin;
        let z = self.z;
        Some([
            min_x, min_y, z, max_x, min_y, z, max_x, max_y, z, //
            min_x, min_y, z, max_x, max_y, z, min_x, max_y, z,
        ])
    }

    pub fn render(&self, gpu: &mut dyn GpuContext, mvp: Mat4, bb: &BoundingBoxf3, settings: &CuttingPlaneSettings) {
        if !self.is_visible() {
            return;
        }
        if let Some(quad) = self.plane_triangles(bb, settings.margin) {
            gpu.draw(
                &DrawCall::new(Primitive::Triangles, &quad, settings.plane_color, mvp).with_state(RenderState {
                    blend: true,
                    depth_write: false,
                    ..RenderState::default()
                }),
            );
        }
        if !self.lines.is_empty() {
            gpu.draw(
                &DrawCall::new(Primitive::Lines, self.lines.data(), settings.contour_color, mvp).with_state(
                    RenderState {
                        depth_test: false,
                        line_width: settings.contour_width,
                        ..RenderState::default()
                    },
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas3d_model::{Pointf, Polygon};

    fn square(size: f64) -> Polygon {
        Polygon::new(vec![
            Pointf::new(0.0, 0.0),
            Pointf::new(size, 0.0),
            Pointf::new(size, size),
            Pointf::new(0.0, size),
        ])
    }

    #[test]
    fn test_hidden_by_default() {
        assert!(!CuttingPlane::default().is_visible());
    }

    #[test]
    fn test_contour_includes_holes() {
        let mut plane = CuttingPlane::default();
        let mut section = ExPolygon::new(square(10.0));
        section.holes.push(square(2.0));
        assert!(plane.set(4.0, &[section]));
        assert!(plane.is_visible());
        assert_eq!(plane.lines().vertex_count(), 16);
        assert!(plane.lines().data().chunks_exact(3).all(|p| p[2] == 4.0));
    }

    #[test]
    fn test_empty_section_and_quad() {
        let mut plane = CuttingPlane::default();
        assert!(plane.set(1.5, &[]));
        assert!(plane.lines().is_empty());
        let bb = BoundingBoxf3::new([0.0; 3], [10.0, 10.0, 5.0]);
        let quad = plane.plane_triangles(&bb, 20.0).unwrap();
        assert_eq!(&quad[..3], &[-20.0, -20.0, 1.5]);
        assert!(plane.plane_triangles(&BoundingBoxf3::default(), 20.0).is_none());
    }
}
