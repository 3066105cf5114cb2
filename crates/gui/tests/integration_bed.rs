//! Bed outline: bounding box, point containment and regeneration.

use canvas3d::settings::BedSettings;
use canvas3d::viewport::Bed;
use canvas3d::Harness;
use canvas3d_model::Pointf;

fn l_shape() -> Vec<Pointf> {
    vec![
        Pointf::new(0.0, 0.0),
        Pointf::new(100.0, 0.0),
        Pointf::new(100.0, 40.0),
        Pointf::new(40.0, 40.0),
        Pointf::new(40.0, 100.0),
        Pointf::new(0.0, 100.0),
    ]
}

fn on_segment(p: Pointf, a: Pointf, b: Pointf) -> bool {
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    cross.abs() < 1e-9
        && p.x >= a.x.min(b.x)
        && p.x <= a.x.max(b.x)
        && p.y >= a.y.min(b.y)
        && p.y <= a.y.max(b.y)
}

/// Crossing-number test with the boundary counted as inside
fn reference_contains(poly: &[Pointf], p: Pointf) -> bool {
    let n = poly.len();
    let mut inside = false;
    for i in 0..n {
        let (a, b) = (poly[i], poly[(i + 1) % n]);
        if on_segment(p, a, b) {
            return true;
        }
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

#[test]
fn test_bed_bounding_box_matches_extents() {
    let mut bed = Bed::new(BedSettings::default());
    let shape = vec![
        Pointf::new(-30.0, 10.0),
        Pointf::new(120.0, -5.0),
        Pointf::new(150.0, 80.0),
        Pointf::new(20.0, 140.0),
    ];
    bed.set_shape(&shape);
    let bb = bed.bounding_box();
    assert_eq!([bb.min[0], bb.min[1]], [-30.0, -5.0]);
    assert_eq!([bb.max[0], bb.max[1]], [150.0, 140.0]);
}

#[test]
fn test_bed_contains_agrees_with_reference() {
    let mut bed = Bed::new(BedSettings::default());
    let shape = l_shape();
    bed.set_shape(&shape);

    let mut boundary_samples = 0;
    for i in -2..=22 {
        for j in -2..=22 {
            let p = Pointf::new(i as f64 * 5.0, j as f64 * 5.0);
            let expected = reference_contains(&shape, p);
            assert_eq!(bed.contains(p), expected, "disagreement at ({}, {})", p.x, p.y);
            if (0..shape.len()).any(|k| on_segment(p, shape[k], shape[(k + 1) % shape.len()])) {
                boundary_samples += 1;
            }
        }
    }
    assert!(boundary_samples > 0);
    // the notch of the L is outside
    assert!(!bed.contains(Pointf::new(70.0, 70.0)));
}

#[test]
fn test_bed_fill_and_grid_generated() {
    let mut bed = Bed::new(BedSettings::default());
    bed.set_shape(&l_shape());
    assert!(!bed.triangles().is_empty());
    assert!(!bed.gridlines().is_empty());
    // four triangles for a six-sided simple polygon, 9 floats each
    assert_eq!(bed.triangles().data().len(), 4 * 9);
}

#[test]
fn test_degenerate_bed_has_no_fill() {
    let mut bed = Bed::new(BedSettings::default());
    bed.set_shape(&[Pointf::new(0.0, 0.0), Pointf::new(10.0, 0.0), Pointf::new(20.0, 0.0)]);
    assert!(bed.triangles().is_empty());

    // bow tie
    bed.set_shape(&[
        Pointf::new(0.0, 0.0),
        Pointf::new(10.0, 10.0),
        Pointf::new(10.0, 0.0),
        Pointf::new(0.0, 10.0),
    ]);
    assert!(bed.triangles().is_empty());
}

#[test]
fn test_set_bed_shape_is_idempotent() {
    let mut h = Harness::new(300, 300);
    h.canvas.set_bed_shape(&l_shape());
    let triangles = h.canvas.bed().triangles().data().to_vec();
    let gridlines = h.canvas.bed().gridlines().data().to_vec();

    h.canvas.set_bed_shape(&l_shape());
    let bits = |v: &[f32]| v.iter().map(|f| f.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(h.canvas.bed().triangles().data()), bits(&triangles));
    assert_eq!(bits(h.canvas.bed().gridlines().data()), bits(&gridlines));
}

#[test]
fn test_set_bed_shape_places_axes() {
    let mut h = Harness::new(300, 300);
    h.set_square_bed(200.0);
    let axes = h.canvas.axes();
    assert_eq!(axes.origin.x, 0.0);
    assert_eq!(axes.origin.y, 0.0);
    assert!((axes.length - 60.0).abs() < 1e-4);
}

#[test]
fn test_auto_bed_surrounds_volumes() {
    let mut h = Harness::new(300, 300);
    h.add_cuboid([50.0, 50.0, 0.0], [20.0, 10.0, 5.0]);
    h.canvas.set_auto_bed_shape();
    let bb = *h.canvas.bed().bounding_box();
    // square of half size 20 around (60, 55)
    assert_eq!([bb.min[0], bb.min[1]], [40.0, 35.0]);
    assert_eq!([bb.max[0], bb.max[1]], [80.0, 75.0]);
    assert!(h.canvas.bed().contains(Pointf::new(60.0, 55.0)));
    assert_eq!(h.canvas.axes().origin.x, 60.0);
}
