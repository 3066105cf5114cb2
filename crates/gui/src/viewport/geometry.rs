use canvas3d_model::{Line, Polygon};

/// Canvas size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn half_width(&self) -> f32 {
        0.5 * self.width as f32
    }

    pub fn half_height(&self) -> f32 {
        0.5 * self.height as f32
    }
}

/// Axis-aligned rectangle given by its four edges.
///
/// Screen-space rects have `top < bottom`; viewport-space rects have `top > bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        (self.bottom - self.top).abs()
    }

    /// Inclusive hit test for a screen-space rect
    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.left <= x && x <= self.right && self.top <= y && y <= self.bottom
    }
}

/// Flat `xyz` vertex stream built from 2D geometry placed at a fixed height
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryBuffer {
    data: Vec<f32>,
}

impl GeometryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with triangles; every polygon must have exactly three points.
    ///
    /// On failure the buffer is left empty.
    pub fn set_from_triangles(&mut self, triangles: &[Polygon], z: f32) -> bool {
        self.data.clear();
        let mut data = Vec::with_capacity(triangles.len() * 9);
        for triangle in triangles {
            if triangle.points.len() != 3 {
                return false;
            }
            for p in &triangle.points {
                data.extend_from_slice(&[p.x as f32, p.y as f32, z]);
            }
        }
        self.data = data;
        true
    }

    /// Replace the contents with line segments (two vertices each)
    pub fn set_from_lines(&mut self, lines: &[Line], z: f32) -> bool {
        self.data.clear();
        self.data.reserve(lines.len() * 6);
        for line in lines {
            self.data
                .extend_from_slice(&[line.a.x as f32, line.a.y as f32, z, line.b.x as f32, line.b.y as f32, z]);
        }
        true
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn vertex_count(&self) -> usize {
        self.data.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas3d_model::Pointf;

    #[test]
    fn test_set_from_triangles() {
        let mut buf = GeometryBuffer::new();
        let tri = Polygon::new(vec![
            Pointf::new(0.0, 0.0),
            Pointf::new(1.0, 0.0),
            Pointf::new(0.0, 1.0),
        ]);
        assert!(buf.set_from_triangles(&[tri], 2.0));
        assert_eq!(buf.vertex_count(), 3);
        assert_eq!(&buf.data()[..3], &[0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_non_triangle_rejected() {
        let mut buf = GeometryBuffer::new();
        let quad = Polygon::new(vec![Pointf::new(0.0, 0.0); 4]);
        assert!(!buf.set_from_triangles(&[quad], 0.0));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_set_from_lines() {
        let mut buf = GeometryBuffer::new();
        let lines = [Line::new(Pointf::new(0.0, 0.0), Pointf::new(5.0, 0.0))];
        assert!(buf.set_from_lines(&lines, -0.5));
        assert_eq!(buf.data(), &[0.0, 0.0, -0.5, 5.0, 0.0, -0.5]);
    }

    #[test]
    fn test_rect_contains_is_inclusive() {
        let r = Rect::new(10.0, 0.0, 20.0, 5.0);
        assert!(r.contains(10.0, 0.0));
        assert!(r.contains(20.0, 5.0));
        assert!(!r.contains(20.1, 5.0));
        assert_eq!(r.width(), 10.0);
        assert_eq!(r.height(), 5.0);
    }
}
