use glam::{Mat4, Vec2, Vec3};

use super::camera::unproject;
use super::geometry::Size;

/// Largest index that fits in a 24-bit picking color
pub const MAX_PICKABLE: usize = (1 << 24) - 2;

/// A ray in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Ray through window point `(x, y)` (bottom-left origin) from the near to the far plane
    pub fn from_window(view_proj: &Mat4, size: Size, x: f32, y: f32) -> Option<Self> {
        let near = unproject(view_proj, size, Vec3::new(x, y, 0.0))?;
        let far = unproject(view_proj, size, Vec3::new(x, y, 1.0))?;
        let direction = far - near;
        if direction.length_squared() <= f32::EPSILON {
            return None;
        }
        Some(Self {
            origin: near,
            direction,
        })
    }

    /// Intersection with the horizontal plane at height `z`; `None` when parallel
    pub fn intersect_plane_z(&self, z: f32) -> Option<Vec3> {
        if self.direction.z.abs() <= f32::EPSILON {
            return None;
        }
        let t = (z - self.origin.z) / self.direction.z;
        Some(self.origin + self.direction * t)
    }
}

/// Flat color identifying volume `idx` in the picking pass
pub fn encode_id(idx: usize) -> [f32; 4] {
    let id = (idx.min(MAX_PICKABLE) + 1) as u32;
    [
        (id & 0xff) as f32 / 255.0,
        ((id >> 8) & 0xff) as f32 / 255.0,
        ((id >> 16) & 0xff) as f32 / 255.0,
        1.0,
    ]
}

/// Volume index read back from a picking pixel; black is empty space
pub fn decode_pixel(pixel: [u8; 4]) -> Option<usize> {
    let id = pixel[0] as u32 | (pixel[1] as u32) << 8 | (pixel[2] as u32) << 16;
    (id > 0).then(|| (id - 1) as usize)
}

/// Framebuffer pixel under canvas position `position` (top-left origin); `None` outside
pub fn window_pixel(position: Vec2, size: Size) -> Option<(i32, i32)> {
    let (x, y) = (position.x.floor(), position.y.floor());
    if x < 0.0 || y < 0.0 || x >= size.width as f32 || y >= size.height as f32 {
        return None;
    }
    Some((x as i32, size.height as i32 - 1 - y as i32))
}

/// Results of the most recent frame, valid until the next render
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameState {
    /// Volume under the pointer as resolved by the picking pass
    pub hover_volume_id: Option<usize>,
    pub view_projection: Mat4,
    pub size: Size,
    pub rendered: bool,
}

impl FrameState {
    /// Whether a depth read-back taken now still matches `view_projection` and `size`
    pub fn is_current(&self, view_projection: &Mat4, size: Size) -> bool {
        self.rendered && self.size == size && self.view_projection == *view_projection
    }
}
