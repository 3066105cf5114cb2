//! Data the 3D canvas borrows from its embedder: geometry value types, the volume
//! collection, the print configuration and the print with its layer-height profiles.

mod config;
mod print;
mod volume;

use serde::{Deserialize, Serialize};

pub use config::{parse_color, PrintConfig};
pub use print::{LayerHeightEditAction, Print, PrintObject};
pub use volume::{GlVolume, VolumeCollection, HOVER_COLOR, SELECTED_COLOR};

/// 2D point in bed coordinates (millimeters)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pointf {
    pub x: f64,
    pub y: f64,
}

impl Pointf {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Segment between two 2D points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub a: Pointf,
    pub b: Pointf,
}

impl Line {
    pub const fn new(a: Pointf, b: Pointf) -> Self {
        Self { a, b }
    }
}

/// Closed polygon; the last point connects back to the first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    pub points: Vec<Pointf>,
}

impl Polygon {
    pub fn new(points: Vec<Pointf>) -> Self {
        Self { points }
    }

    /// Edges in winding order, including the closing edge.
    pub fn lines(&self) -> Vec<Line> {
        let n = self.points.len();
        if n < 2 {
            return Vec::new();
        }
        (0..n)
            .map(|i| Line::new(self.points[i], self.points[(i + 1) % n]))
            .collect()
    }
}

/// Polygon with holes, as produced by slicing a model at some height
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExPolygon {
    pub contour: Polygon,
    #[serde(default)]
    pub holes: Vec<Polygon>,
}

impl ExPolygon {
    pub fn new(contour: Polygon) -> Self {
        Self {
            contour,
            holes: Vec::new(),
        }
    }

    /// Contour and hole edges
    pub fn lines(&self) -> Vec<Line> {
        let mut lines = self.contour.lines();
        for hole in &self.holes {
            lines.extend(hole.lines());
        }
        lines
    }
}

/// Axis-aligned 3D bounding box. An empty box is `defined == false`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBoxf3 {
    pub min: [f64; 3],
    pub max: [f64; 3],
    pub defined: bool,
}

impl Default for BoundingBoxf3 {
    fn default() -> Self {
        Self {
            min: [0.0; 3],
            max: [0.0; 3],
            defined: false,
        }
    }
}

impl BoundingBoxf3 {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self {
            min,
            max,
            defined: true,
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = [f64; 3]>) -> Self {
        let mut bb = Self::default();
        for p in points {
            bb.merge_point(p);
        }
        bb
    }

    pub fn merge_point(&mut self, p: [f64; 3]) {
        if !self.defined {
            self.min = p;
            self.max = p;
            self.defined = true;
            return;
        }
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    pub fn merge(&mut self, other: &BoundingBoxf3) {
        if other.defined {
            self.merge_point(other.min);
            self.merge_point(other.max);
        }
    }

    pub fn size(&self) -> [f64; 3] {
        if !self.defined {
            return [0.0; 3];
        }
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    pub fn max_size(&self) -> f64 {
        let s = self.size();
        s[0].max(s[1]).max(s[2])
    }

    pub fn center(&self) -> [f64; 3] {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
            0.5 * (self.min[2] + self.max[2]),
        ]
    }

    /// Inclusive containment test
    pub fn contains(&self, p: [f64; 3]) -> bool {
        self.defined && (0..3).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
    }

    /// Grow the box by `delta` in every direction
    pub fn offset(&self, delta: f64) -> Self {
        if !self.defined {
            return *self;
        }
        Self::new(
            [self.min[0] - delta, self.min[1] - delta, self.min[2] - delta],
            [self.max[0] + delta, self.max[1] + delta, self.max[2] + delta],
        )
    }

    pub fn translated(&self, v: [f64; 3]) -> Self {
        if !self.defined {
            return *self;
        }
        Self::new(
            [self.min[0] + v[0], self.min[1] + v[1], self.min[2] + v[2]],
            [self.max[0] + v[0], self.max[1] + v[1], self.max[2] + v[2]],
        )
    }

    /// The eight corners, min corner first
    pub fn corners(&self) -> [[f64; 3]; 8] {
        let (a, b) = (self.min, self.max);
        [
            [a[0], a[1], a[2]],
            [b[0], a[1], a[2]],
            [b[0], b[1], a[2]],
            [a[0], b[1], a[2]],
            [a[0], a[1], b[2]],
            [b[0], a[1], b[2]],
            [b[0], b[1], b[2]],
            [a[0], b[1], b[2]],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_merge_and_center() {
        let mut bb = BoundingBoxf3::default();
        assert!(!bb.defined);
        assert_eq!(bb.max_size(), 0.0);

        bb.merge_point([1.0, 2.0, 3.0]);
        bb.merge_point([-1.0, 4.0, 0.0]);
        assert_eq!(bb.min, [-1.0, 2.0, 0.0]);
        assert_eq!(bb.max, [1.0, 4.0, 3.0]);
        assert_eq!(bb.center(), [0.0, 3.0, 1.5]);
        assert_eq!(bb.max_size(), 3.0);
    }

    #[test]
    fn test_bounding_box_offset_contains() {
        let bb = BoundingBoxf3::new([0.0; 3], [10.0; 3]);
        assert!(bb.contains([10.0, 0.0, 5.0]));
        assert!(!bb.contains([10.5, 0.0, 5.0]));
        assert!(bb.offset(1.0).contains([10.5, 0.0, 5.0]));
    }

    #[test]
    fn test_polygon_lines_close_the_ring() {
        let poly = Polygon::new(vec![
            Pointf::new(0.0, 0.0),
            Pointf::new(1.0, 0.0),
            Pointf::new(1.0, 1.0),
        ]);
        let lines = poly.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].b, Pointf::new(0.0, 0.0));
    }
}
