use canvas3d_model::BoundingBoxf3;
use glam::{Mat4, Vec3, Vec4};

use super::geometry::Size;

/// Projection kind of a [`Camera`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraType {
    Unknown,
    #[default]
    Ortho,
}

/// Orbit camera: azimuth `phi` around world Z, elevation `theta` away from the top view
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub camera_type: CameraType,
    /// Pixels per millimeter, always > 0
    zoom: f32,
    /// Azimuth in degrees, normalized into `[0, 360)`
    phi: f32,
    /// Elevation in degrees, `0` looks straight down, `180` straight up
    theta: f32,
    /// World point the camera looks at
    pub target: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            camera_type: CameraType::Ortho,
            zoom: 1.0,
            phi: 45.0,
            theta: 45.0,
            target: Vec3::ZERO,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_type_as_string(&self) -> &'static str {
        match self.camera_type {
            CameraType::Unknown => "unknown",
            CameraType::Ortho => "ortho",
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Rejects non-positive and non-finite values
    pub fn set_zoom(&mut self, zoom: f32) -> bool {
        if zoom.is_finite() && zoom > 0.0 {
            self.zoom = zoom;
            true
        } else {
            false
        }
    }

    pub fn get_phi(&self) -> f32 {
        self.phi
    }

    pub fn set_phi(&mut self, phi: f32) {
        self.phi = phi.rem_euclid(360.0);
    }

    pub fn get_theta(&self) -> f32 {
        self.theta
    }

    pub fn set_theta(&mut self, theta: f32) {
        self.theta = theta.clamp(0.0, 180.0);
    }

    /// Orbit by a pointer delta in pixels
    pub fn rotate(&mut self, dx: f32, dy: f32, degrees_per_pixel: f32) {
        self.set_phi(self.phi + dx * degrees_per_pixel);
        self.set_theta(self.theta - dy * degrees_per_pixel);
    }

    /// View matrix (world -> camera)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_x(-self.theta.to_radians())
            * Mat4::from_rotation_z(self.phi.to_radians())
            * Mat4::from_translation(-self.target)
    }

    /// Projection matrix (camera -> clip) for a canvas of `size` showing `scene_box`
    pub fn projection_matrix(&self, size: Size, scene_box: &BoundingBoxf3) -> Mat4 {
        let half_w = size.half_width().max(0.5) / self.zoom;
        let half_h = size.half_height().max(0.5) / self.zoom;
        let depth = match self.camera_type {
            CameraType::Ortho | CameraType::Unknown => {
                let max_size = scene_box.max_size() as f32;
                if max_size > 0.0 {
                    5.0 * max_size
                } else {
                    100.0
                }
            }
        };
        Mat4::orthographic_rh_gl(-half_w, half_w, -half_h, half_h, -depth, depth)
    }

    /// Combined view-projection matrix
    pub fn view_projection(&self, size: Size, scene_box: &BoundingBoxf3) -> Mat4 {
        self.projection_matrix(size, scene_box) * self.view_matrix()
    }

    /// Projection with an identity model-view, used for screen-aligned overlays
    pub fn overlay_projection(&self, size: Size) -> Mat4 {
        let half_w = size.half_width().max(0.5) / self.zoom;
        let half_h = size.half_height().max(0.5) / self.zoom;
        Mat4::orthographic_rh_gl(-half_w, half_w, -half_h, half_h, -1.0, 1.0)
    }

    /// Screen right in world space
    pub fn right_vector(&self) -> Vec3 {
        self.view_matrix().row(0).truncate().normalize_or_zero()
    }

    /// Screen up in world space
    pub fn up_vector(&self) -> Vec3 {
        self.view_matrix().row(1).truncate().normalize_or_zero()
    }

    /// Viewing direction in world space
    pub fn forward_vector(&self) -> Vec3 {
        -self.view_matrix().row(2).truncate().normalize_or_zero()
    }

    /// Zoom factor that fits `bb` into a canvas of `size`; `None` for an empty extent
    pub fn zoom_to_box_factor(&self, bb: &BoundingBoxf3, size: Size, margin: f32) -> Option<f32> {
        if !bb.defined || size.is_empty() {
            return None;
        }
        let center = bb.center();
        let center = Vec3::new(center[0] as f32, center[1] as f32, center[2] as f32);
        let right = self.right_vector();
        let up = self.up_vector();

        let mut max_x = 0.0_f32;
        let mut max_y = 0.0_f32;
        for corner in bb.corners() {
            let v = Vec3::new(corner[0] as f32, corner[1] as f32, corner[2] as f32) - center;
            max_x = max_x.max(margin * 2.0 * v.dot(right).abs());
            max_y = max_y.max(margin * 2.0 * v.dot(up).abs());
        }
        if max_x <= 0.0 || max_y <= 0.0 {
            return None;
        }
        Some((size.width as f32 / max_x).min(size.height as f32 / max_y))
    }
}

/// World point to window coordinates (bottom-left origin, depth in `[0, 1]`)
pub fn project(view_proj: &Mat4, size: Size, world: Vec3) -> Option<Vec3> {
    let clip = *view_proj * world.extend(1.0);
    if clip.w.abs() <= f32::EPSILON {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    Some(Vec3::new(
        (ndc.x + 1.0) * 0.5 * size.width as f32,
        (ndc.y + 1.0) * 0.5 * size.height as f32,
        (ndc.z + 1.0) * 0.5,
    ))
}

/// Window coordinates (bottom-left origin, depth in `[0, 1]`) back to world space
pub fn unproject(view_proj: &Mat4, size: Size, window: Vec3) -> Option<Vec3> {
    if size.is_empty() {
        return None;
    }
    let inv = view_proj.inverse();
    if !inv.is_finite() {
        return None;
    }
    let ndc = Vec4::new(
        2.0 * window.x / size.width as f32 - 1.0,
        2.0 * window.y / size.height as f32 - 1.0,
        2.0 * window.z - 1.0,
        1.0,
    );
    let world = inv * ndc;
    if world.w.abs() <= f32::EPSILON {
        return None;
    }
    Some(world.truncate() / world.w)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> BoundingBoxf3 {
        BoundingBoxf3::new([0.0; 3], [200.0, 200.0, 10.0])
    }

    #[test]
    fn test_defaults_and_labels() {
        let mut cam = Camera::new();
        assert_eq!(cam.get_type_as_string(), "ortho");
        assert_eq!(cam.zoom(), 1.0);
        cam.camera_type = CameraType::Unknown;
        assert_eq!(cam.get_type_as_string(), "unknown");
    }

    #[test]
    fn test_zoom_stays_positive() {
        let mut cam = Camera::new();
        assert!(!cam.set_zoom(0.0));
        assert!(!cam.set_zoom(-2.0));
        assert!(!cam.set_zoom(f32::NAN));
        assert_eq!(cam.zoom(), 1.0);
        assert!(cam.set_zoom(3.0));
        assert_eq!(cam.zoom(), 3.0);
    }

    #[test]
    fn test_angles_are_normalized() {
        let mut cam = Camera::new();
        cam.set_phi(-90.0);
        assert_eq!(cam.get_phi(), 270.0);
        cam.set_theta(200.0);
        assert_eq!(cam.get_theta(), 180.0);
        cam.set_theta(-5.0);
        assert_eq!(cam.get_theta(), 0.0);
    }

    #[test]
    fn test_top_view_axes() {
        let mut cam = Camera::new();
        cam.set_phi(0.0);
        cam.set_theta(0.0);
        assert!((cam.right_vector() - Vec3::X).length() < 1e-6);
        assert!((cam.up_vector() - Vec3::Y).length() < 1e-6);
        assert!((cam.forward_vector() - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn test_front_view_looks_along_y() {
        let mut cam = Camera::new();
        cam.set_phi(0.0);
        cam.set_theta(90.0);
        assert!((cam.up_vector() - Vec3::Z).length() < 1e-6);
        assert!((cam.forward_vector() - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn test_project_unproject_round_trip() {
        let cam = Camera::new();
        let size = Size::new(640, 480);
        let vp = cam.view_projection(size, &scene());
        let p = Vec3::new(12.0, -7.0, 3.0);
        let w = project(&vp, size, p).unwrap();
        let back = unproject(&vp, size, w).unwrap();
        assert!((back - p).length() < 1e-3);
    }

    #[test]
    fn test_zoom_to_box_factor() {
        let mut cam = Camera::new();
        cam.set_phi(0.0);
        cam.set_theta(0.0);
        let bb = BoundingBoxf3::new([0.0; 3], [100.0, 50.0, 0.0]);
        let factor = cam.zoom_to_box_factor(&bb, Size::new(500, 500), 1.25).unwrap();
        // 100 mm wide with a 1.25 margin on both sides
        assert!((factor - 4.0).abs() < 1e-4);
        assert!(cam
            .zoom_to_box_factor(&BoundingBoxf3::default(), Size::new(500, 500), 1.25)
            .is_none());
    }
}
