use canvas3d_model::{BoundingBoxf3, Line, Pointf, Polygon};
use geo::coordinate_position::{CoordPos, CoordinatePosition};
use geo::{Area, ClosestPoint, Coord, Intersects, LineString, TriangulateEarcut};
use glam::Mat4;

use super::geometry::GeometryBuffer;
use crate::gpu::{DrawCall, GpuContext, Primitive, RenderState};
use crate::settings::BedSettings;

/// Grid lines are clipped to the outline grown by this much, so lines on the border survive
const GRID_BORDER_EPSILON: f64 = 0.01;

/// The printable area: its outline, fill triangles and clipped grid
#[derive(Debug, Clone)]
pub struct Bed {
    settings: BedSettings,
    shape: Vec<Pointf>,
    bounding_box: BoundingBoxf3,
    polygon: Option<geo::Polygon<f64>>,
    triangles: GeometryBuffer,
    gridlines: GeometryBuffer,
}

impl Bed {
    pub fn new(settings: BedSettings) -> Self {
        Self {
            settings,
            shape: Vec::new(),
            bounding_box: BoundingBoxf3::default(),
            polygon: None,
            triangles: GeometryBuffer::new(),
            gridlines: GeometryBuffer::new(),
        }
    }

    pub fn shape(&self) -> &[Pointf] {
        &self.shape
    }

    pub fn bounding_box(&self) -> &BoundingBoxf3 {
        &self.bounding_box
    }

    pub fn triangles(&self) -> &GeometryBuffer {
        &self.triangles
    }

    pub fn gridlines(&self) -> &GeometryBuffer {
        &self.gridlines
    }

    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    /// Replace the outline and regenerate everything derived from it.
    ///
    /// A self-intersecting or zero-area outline gets no fill; its grid spans the
    /// bounding box unclipped.
    pub fn set_shape(&mut self, shape: &[Pointf]) {
        self.shape = without_repeated_points(shape);
        let shape = &self.shape;
        self.bounding_box = BoundingBoxf3::from_points(shape.iter().map(|p| [p.x, p.y, 0.0]));
        self.polygon = (shape.len() >= 3).then(|| {
            geo::Polygon::new(
                LineString::from(shape.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>()),
                Vec::new(),
            )
        });

        let z = self.settings.ground_z;
        let degenerate = self.polygon.as_ref().is_none_or(is_degenerate);
        if degenerate {
            tracing::warn!("Bed shape with {} points is degenerate, fill skipped", shape.len());
            self.triangles.clear();
        } else {
            let triangles = self.triangulate();
            if !self.triangles.set_from_triangles(&triangles, z) {
                self.triangles.clear();
            }
        }

        let lines = grid_lines(&self.shape, &self.bounding_box, self.settings.grid_spacing, !degenerate);
        self.gridlines.set_from_lines(&lines, z);
    }

    /// Point-in-polygon; boundary points are inside
    pub fn contains(&self, p: Pointf) -> bool {
        self.polygon
            .as_ref()
            .is_some_and(|poly| poly.coordinate_position(&Coord { x: p.x, y: p.y }) != CoordPos::Outside)
    }

    /// Nearest point on the bed outline
    pub fn point_projection(&self, p: Pointf) -> Pointf {
        let Some(poly) = &self.polygon else {
            return p;
        };
        match poly.exterior().closest_point(&geo::Point::new(p.x, p.y)) {
            geo::Closest::Intersection(q) | geo::Closest::SinglePoint(q) => Pointf::new(q.x(), q.y()),
            geo::Closest::Indeterminate => p,
        }
    }

    pub fn render(&self, gpu: &mut dyn GpuContext, mvp: Mat4) {
        if !self.triangles.is_empty() {
            gpu.draw(
                &DrawCall::new(Primitive::Triangles, self.triangles.data(), self.settings.fill_color, mvp)
                    .with_state(RenderState {
                        blend: true,
                        ..RenderState::default()
                    }),
            );
        }
        if !self.gridlines.is_empty() {
            gpu.draw(
                &DrawCall::new(Primitive::Lines, self.gridlines.data(), self.settings.grid_color, mvp)
                    .with_state(RenderState {
                        blend: true,
                        line_width: self.settings.grid_line_width,
                        ..RenderState::default()
                    }),
            );
        }
    }

    fn triangulate(&self) -> Vec<Polygon> {
        let Some(poly) = &self.polygon else {
            return Vec::new();
        };
        let raw = poly.earcut_triangles_raw();
        let v = &raw.vertices;
        raw.triangle_indices
            .chunks_exact(3)
            .map(|t| {
                Polygon::new(
                    t.iter()
                        .map(|&i| Pointf::new(v[2 * i], v[2 * i + 1]))
                        .collect(),
                )
            })
            .collect()
    }
}

/// Drop consecutive repeated vertices, including a closing point equal to the first
fn without_repeated_points(shape: &[Pointf]) -> Vec<Pointf> {
    let mut points: Vec<Pointf> = Vec::with_capacity(shape.len());
    for p in shape {
        if points.last() != Some(p) {
            points.push(*p);
        }
    }
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

fn is_degenerate(poly: &geo::Polygon<f64>) -> bool {
    if poly.unsigned_area() <= f64::EPSILON {
        return true;
    }
    let edges: Vec<geo::Line<f64>> = poly.exterior().lines().collect();
    let n = edges.len();
    for i in 0..n {
        for j in (i + 2)..n {
            // first and last edges share the closing vertex
            if i == 0 && j == n - 1 {
                continue;
            }
            if edges[i].intersects(&edges[j]) {
                return true;
            }
        }
    }
    false
}

/// Grid lines every `spacing` starting at the bounding-box minimum.
///
/// With `clip` each line is cut to the outline grown by `GRID_BORDER_EPSILON`: the line
/// keeps the parts where the polygon lies within that distance on either side.
fn grid_lines(shape: &[Pointf], bb: &BoundingBoxf3, spacing: f64, clip: bool) -> Vec<Line> {
    if !bb.defined || spacing <= 0.0 {
        return Vec::new();
    }
    let [min_x, min_y, _] = bb.min;
    let [max_x, max_y, _] = bb.max;
    let mut lines = Vec::new();

    let steps_x = ((max_x - min_x) / spacing + 1e-9).floor() as usize;
    for k in 0..=steps_x {
        let x = min_x + k as f64 * spacing;
        if !clip {
            lines.push(Line::new(Pointf::new(x, min_y), Pointf::new(x, max_y)));
            continue;
        }
        for (a, b) in clipped_spans(shape, x, |p| p.x, |p| p.y) {
            lines.push(Line::new(Pointf::new(x, a), Pointf::new(x, b)));
        }
    }

    let steps_y = ((max_y - min_y) / spacing + 1e-9).floor() as usize;
    for k in 0..=steps_y {
        let y = min_y + k as f64 * spacing;
        if !clip {
            lines.push(Line::new(Pointf::new(min_x, y), Pointf::new(max_x, y)));
            continue;
        }
        for (a, b) in clipped_spans(shape, y, |p| p.y, |p| p.x) {
            lines.push(Line::new(Pointf::new(a, y), Pointf::new(b, y)));
        }
    }
    lines
}

/// Interior spans of the scan line at `scan`, merged over scans just below, on and just above it
fn clipped_spans(
    shape: &[Pointf],
    scan: f64,
    along: impl Fn(&Pointf) -> f64,
    across: impl Fn(&Pointf) -> f64,
) -> Vec<(f64, f64)> {
    let mut spans: Vec<(f64, f64)> = [scan - GRID_BORDER_EPSILON, scan, scan + GRID_BORDER_EPSILON]
        .into_iter()
        .flat_map(|s| {
            crossings(shape, s, &along, &across)
                .chunks_exact(2)
                .map(|pair| (pair[0], pair[1]))
                .collect::<Vec<_>>()
        })
        .collect();
    spans.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(spans.len());
    for (a, b) in spans {
        match merged.last_mut() {
            Some(last) if a <= last.1 + GRID_BORDER_EPSILON => last.1 = last.1.max(b),
            _ => merged.push((a, b)),
        }
    }
    merged
}

/// Sorted positions along the scan line where the outline crosses `scan`
fn crossings(shape: &[Pointf], scan: f64, along: &impl Fn(&Pointf) -> f64, across: &impl Fn(&Pointf) -> f64) -> Vec<f64> {
    let n = shape.len();
    let mut hits = Vec::new();
    for i in 0..n {
        let a = &shape[i];
        let b = &shape[(i + 1) % n];
        let (a0, b0) = (along(a), along(b));
        if (a0 <= scan) != (b0 <= scan) {
            let t = (scan - a0) / (b0 - a0);
            hits.push(across(a) + t * (across(b) - across(a)));
        }
    }
    hits.sort_by(f64::total_cmp);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Pointf> {
        vec![
            Pointf::new(x0, y0),
            Pointf::new(x0 + size, y0),
            Pointf::new(x0 + size, y0 + size),
            Pointf::new(x0, y0 + size),
        ]
    }

    fn bed(shape: &[Pointf]) -> Bed {
        let mut bed = Bed::new(BedSettings::default());
        bed.set_shape(shape);
        bed
    }

    #[test]
    fn test_square_bed() {
        let bed = bed(&square(0.0, 0.0, 200.0));
        assert_eq!(bed.bounding_box().min, [0.0, 0.0, 0.0]);
        assert_eq!(bed.bounding_box().max, [200.0, 200.0, 0.0]);
        assert_eq!(bed.triangles().vertex_count(), 6);
        // 21 vertical + 21 horizontal lines including both borders
        assert_eq!(bed.gridlines().vertex_count(), 2 * 42);
        assert!(bed.contains(Pointf::new(100.0, 100.0)));
        assert!(bed.contains(Pointf::new(200.0, 50.0)));
        assert!(!bed.contains(Pointf::new(200.5, 50.0)));
    }

    #[test]
    fn test_grid_anchored_at_shape_origin() {
        let bed = bed(&square(5.0, 3.0, 20.0));
        let data = bed.gridlines().data();
        assert_eq!(data[0], 5.0);
        assert_eq!(data[6], 15.0);
        assert_eq!(data[1], 3.0);
        assert_eq!(data[4], 23.0);
    }

    #[test]
    fn test_concave_bed() {
        let l_shape = vec![
            Pointf::new(0.0, 0.0),
            Pointf::new(100.0, 0.0),
            Pointf::new(100.0, 40.0),
            Pointf::new(40.0, 40.0),
            Pointf::new(40.0, 100.0),
            Pointf::new(0.0, 100.0),
        ];
        let bed = bed(&l_shape);
        assert_eq!(bed.triangles().vertex_count(), 4 * 3);
        assert!(bed.contains(Pointf::new(20.0, 80.0)));
        assert!(!bed.contains(Pointf::new(80.0, 60.0)));
        let p = bed.point_projection(Pointf::new(80.0, 60.0));
        assert!((p.x - 80.0).abs() < 1e-9 && (p.y - 40.0).abs() < 1e-9);
    }

    /// Grid segments as (x0, y0, x1, y1)
    fn segments(bed: &Bed) -> Vec<[f64; 4]> {
        bed.gridlines()
            .data()
            .chunks_exact(6)
            .map(|c| [c[0] as f64, c[1] as f64, c[3] as f64, c[4] as f64])
            .collect()
    }

    #[test]
    fn test_concave_bed_keeps_inner_border_grid_lines() {
        let l_shape = vec![
            Pointf::new(0.0, 0.0),
            Pointf::new(100.0, 0.0),
            Pointf::new(100.0, 40.0),
            Pointf::new(40.0, 40.0),
            Pointf::new(40.0, 100.0),
            Pointf::new(0.0, 100.0),
        ];
        let bed = bed(&l_shape);
        let segs = segments(&bed);

        let at_y40: Vec<_> = segs.iter().filter(|s| s[1] == 40.0 && s[3] == 40.0).collect();
        assert_eq!(at_y40.len(), 1, "{at_y40:?}");
        assert!((at_y40[0][0] - 0.0).abs() < 1e-6 && (at_y40[0][2] - 100.0).abs() < 1e-6);

        let at_x40: Vec<_> = segs.iter().filter(|s| s[0] == 40.0 && s[2] == 40.0).collect();
        assert_eq!(at_x40.len(), 1, "{at_x40:?}");
        assert!((at_x40[0][1] - 0.0).abs() < 1e-6 && (at_x40[0][3] - 100.0).abs() < 1e-6);

        // lines past the notch stop at the outline
        let at_y60: Vec<_> = segs.iter().filter(|s| s[1] == 60.0 && s[3] == 60.0).collect();
        assert_eq!(at_y60.len(), 1);
        assert!((at_y60[0][2] - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_repeated_vertices_are_ignored() {
        let shape = vec![
            Pointf::new(0.0, 0.0),
            Pointf::new(0.0, 0.0),
            Pointf::new(200.0, 0.0),
            Pointf::new(200.0, 200.0),
            Pointf::new(0.0, 200.0),
            Pointf::new(0.0, 0.0),
        ];
        let bed = bed(&shape);
        assert_eq!(bed.shape().len(), 4);
        assert_eq!(bed.triangles().vertex_count(), 6);
        assert_eq!(bed.gridlines().vertex_count(), 2 * 42);
    }

    #[test]
    fn test_self_intersecting_bed_has_no_fill() {
        let bowtie = vec![
            Pointf::new(0.0, 0.0),
            Pointf::new(10.0, 10.0),
            Pointf::new(10.0, 0.0),
            Pointf::new(0.0, 10.0),
        ];
        let bed = bed(&bowtie);
        assert!(bed.triangles().is_empty());
        assert!(!bed.gridlines().is_empty());
        assert_eq!(bed.bounding_box().max, [10.0, 10.0, 0.0]);
    }

    #[test]
    fn test_zero_area_bed() {
        let line = vec![Pointf::new(0.0, 0.0), Pointf::new(10.0, 0.0), Pointf::new(20.0, 0.0)];
        let flat = bed(&line);
        assert!(flat.triangles().is_empty());
        let empty = bed(&[]);
        assert!(empty.triangles().is_empty());
        assert!(empty.gridlines().is_empty());
        assert!(!empty.contains(Pointf::new(0.0, 0.0)));
    }
}
