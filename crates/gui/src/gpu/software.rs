use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::{declared_uniforms, DrawCall, GpuContext, GpuError, GpuInfo, Primitive, ProgramId, RenderState, TextureId};
use crate::assets::TextureImage;
use crate::viewport::Size;

// ── Software GPU ─────────────────────────────────────────────

/// Headless rasterizer with an RGBA8 color buffer and an `f32` depth buffer.
///
/// Clones share the same framebuffer, so a test can keep a handle while the canvas owns
/// another one.
#[derive(Clone)]
pub struct SoftwareBackend {
    inner: Rc<RefCell<Raster>>,
}

struct Program {
    uniforms: HashMap<String, Option<f32>>,
}

struct Raster {
    size: Size,
    color: Vec<[u8; 4]>,
    depth: Vec<f32>,
    available: bool,
    info: GpuInfo,
    programs: HashMap<ProgramId, Program>,
    textures: HashMap<TextureId, TextureImage>,
    active: Option<ProgramId>,
    next_id: u32,
    draws: usize,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::with_info(GpuInfo {
            renderer: "canvas3d software rasterizer".into(),
            version: "3.3".into(),
            legacy: false,
            shaders: true,
            multisample: false,
        })
    }

    /// A fixed-function-only device
    pub fn legacy() -> Self {
        Self::with_info(GpuInfo {
            renderer: "canvas3d software rasterizer (legacy)".into(),
            version: "1.1".into(),
            legacy: true,
            shaders: false,
            multisample: false,
        })
    }

    pub fn with_info(info: GpuInfo) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Raster {
                size: Size::default(),
                color: Vec::new(),
                depth: Vec::new(),
                available: true,
                info,
                programs: HashMap::new(),
                textures: HashMap::new(),
                active: None,
                next_id: 1,
                draws: 0,
            })),
        }
    }

    /// Simulate losing (or regaining) the context
    pub fn set_context_available(&self, available: bool) {
        self.inner.borrow_mut().available = available;
    }

    pub fn size(&self) -> Size {
        self.inner.borrow().size
    }

    /// Color at `(x, y)`, bottom-left origin
    pub fn pixel(&self, x: i32, y: i32) -> [u8; 4] {
        let r = self.inner.borrow();
        r.index(x, y).map_or([0; 4], |i| r.color[i])
    }

    pub fn depth(&self, x: i32, y: i32) -> f32 {
        let r = self.inner.borrow();
        r.index(x, y).map_or(1.0, |i| r.depth[i])
    }

    /// Number of draw calls issued so far
    pub fn draw_count(&self) -> usize {
        self.inner.borrow().draws
    }

    pub fn program_count(&self) -> usize {
        self.inner.borrow().programs.len()
    }

    pub fn texture_count(&self) -> usize {
        self.inner.borrow().textures.len()
    }

    pub fn active_program(&self) -> Option<ProgramId> {
        self.inner.borrow().active
    }

    /// Last value written to a uniform, if any
    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<f32> {
        self.inner
            .borrow()
            .programs
            .get(&program)
            .and_then(|p| p.uniforms.get(name).copied().flatten())
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuContext for SoftwareBackend {
    fn make_current(&mut self) -> bool {
        self.inner.borrow().available
    }

    fn info(&self) -> GpuInfo {
        self.inner.borrow().info.clone()
    }

    fn set_viewport(&mut self, size: Size) {
        let mut r = self.inner.borrow_mut();
        if r.size == size {
            return;
        }
        let n = (size.width * size.height) as usize;
        r.size = size;
        r.color = vec![[0, 0, 0, 255]; n];
        r.depth = vec![1.0; n];
    }

    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool) {
        let mut r = self.inner.borrow_mut();
        if !r.available {
            return;
        }
        if let Some(c) = color {
            let c = to_rgba8(c);
            r.color.fill(c);
        }
        if depth {
            r.depth.fill(1.0);
        }
    }

    fn compile_program(&mut self, vertex_src: &str, fragment_src: &str) -> Result<ProgramId, GpuError> {
        let mut r = self.inner.borrow_mut();
        if !r.available {
            return Err(GpuError::ContextLost);
        }
        if !r.info.shaders {
            return Err(GpuError::Compile {
                stage: "vertex",
                log: "programmable shaders are not supported".into(),
            });
        }
        for (stage, src) in [("vertex", vertex_src), ("fragment", fragment_src)] {
            if src.trim().is_empty() {
                return Err(GpuError::Compile {
                    stage,
                    log: "empty source".into(),
                });
            }
            if !src.contains("void main") {
                return Err(GpuError::Link(format!("{stage} stage has no entry point")));
            }
        }
        let uniforms = declared_uniforms(&[vertex_src, fragment_src])
            .into_iter()
            .map(|name| (name, None))
            .collect();
        let id = ProgramId(r.next_id);
        r.next_id += 1;
        r.programs.insert(id, Program { uniforms });
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        let mut r = self.inner.borrow_mut();
        r.programs.remove(&program);
        if r.active == Some(program) {
            r.active = None;
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        let mut r = self.inner.borrow_mut();
        let known = program.filter(|p| r.programs.contains_key(p));
        r.active = known;
    }

    fn set_uniform_f32(&mut self, program: ProgramId, name: &str, value: f32) -> bool {
        let mut r = self.inner.borrow_mut();
        match r.programs.get_mut(&program).and_then(|p| p.uniforms.get_mut(name)) {
            Some(slot) => {
                *slot = Some(value);
                true
            }
            None => false,
        }
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureId, GpuError> {
        let mut r = self.inner.borrow_mut();
        if !r.available {
            return Err(GpuError::ContextLost);
        }
        if image.width == 0
            || image.height == 0
            || image.rgba.len() != (image.width * image.height * 4) as usize
        {
            return Err(GpuError::Texture(format!(
                "{}x{} image with {} bytes",
                image.width,
                image.height,
                image.rgba.len()
            )));
        }
        let id = TextureId(r.next_id);
        r.next_id += 1;
        r.textures.insert(id, image.clone());
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.inner.borrow_mut().textures.remove(&texture);
    }

    fn draw(&mut self, call: &DrawCall) {
        let mut r = self.inner.borrow_mut();
        if !r.available || r.size.is_empty() {
            return;
        }
        r.draws += 1;
        let verts: Vec<Option<Vec3>> = call
            .positions
            .chunks_exact(3)
            .map(|p| r.to_window(&call.mvp, Vec3::new(p[0], p[1], p[2])))
            .collect();

        match call.primitive {
            Primitive::Triangles => {
                let texture = call
                    .texture
                    .and_then(|(id, uvs)| r.textures.get(&id).cloned().map(|img| (img, uvs)));
                for (t, tri) in verts.chunks_exact(3).enumerate() {
                    let (Some(a), Some(b), Some(c)) = (tri[0], tri[1], tri[2]) else {
                        continue;
                    };
                    let uv = texture.as_ref().and_then(|(img, uvs)| {
                        let at = |k: usize| {
                            let i = (t * 3 + k) * 2;
                            uvs.get(i..i + 2).map(|s| Vec2::new(s[0], s[1]))
                        };
                        Some((img, [at(0)?, at(1)?, at(2)?]))
                    });
                    r.fill_triangle([a, b, c], uv, call.color, call.state);
                }
            }
            Primitive::Lines => {
                for seg in verts.chunks_exact(2) {
                    if let (Some(a), Some(b)) = (seg[0], seg[1]) {
                        r.draw_line(a, b, call.color, call.state);
                    }
                }
            }
            Primitive::LineStrip => {
                for seg in verts.windows(2) {
                    if let (Some(a), Some(b)) = (seg[0], seg[1]) {
                        r.draw_line(a, b, call.color, call.state);
                    }
                }
            }
        }
    }

    fn read_pixel(&mut self, x: i32, y: i32) -> [u8; 4] {
        self.pixel(x, y)
    }

    fn read_depth(&mut self, x: i32, y: i32) -> f32 {
        self.depth(x, y)
    }
}

// ── Rasterization ────────────────────────────────────────────

impl Raster {
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.size.width as i32 || y >= self.size.height as i32 {
            return None;
        }
        Some(y as usize * self.size.width as usize + x as usize)
    }

    /// Clip space to window coordinates (`z` in `[0, 1]`)
    fn to_window(&self, mvp: &Mat4, p: Vec3) -> Option<Vec3> {
        let clip: Vec4 = *mvp * p.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec3::new(
            (ndc.x + 1.0) * 0.5 * self.size.width as f32,
            (ndc.y + 1.0) * 0.5 * self.size.height as f32,
            (ndc.z + 1.0) * 0.5,
        ))
    }

    fn fill_triangle(
        &mut self,
        v: [Vec3; 3],
        uv: Option<(&TextureImage, [Vec2; 3])>,
        color: [f32; 4],
        state: RenderState,
    ) {
        let area = edge(v[0].truncate(), v[1].truncate(), v[2].truncate());
        if area.abs() < 1e-9 {
            return;
        }
        let w = self.size.width as i32;
        let h = self.size.height as i32;
        let min_x = (v[0].x.min(v[1].x).min(v[2].x).floor() as i32).max(0);
        let max_x = (v[0].x.max(v[1].x).max(v[2].x).ceil() as i32).min(w - 1);
        let min_y = (v[0].y.min(v[1].y).min(v[2].y).floor() as i32).max(0);
        let max_y = (v[0].y.max(v[1].y).max(v[2].y).ceil() as i32).min(h - 1);

        for py in min_y..=max_y {
            for px in min_x..=max_x {
                let p = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
                let w0 = edge(v[1].truncate(), v[2].truncate(), p);
                let w1 = edge(v[2].truncate(), v[0].truncate(), p);
                let w2 = edge(v[0].truncate(), v[1].truncate(), p);
                let inside = if area > 0.0 {
                    w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0
                } else {
                    w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0
                };
                if !inside {
                    continue;
                }
                let (b0, b1, b2) = (w0 / area, w1 / area, w2 / area);
                let z = b0 * v[0].z + b1 * v[1].z + b2 * v[2].z;
                let rgba = match uv {
                    Some((img, t)) => {
                        let uv = t[0] * b0 + t[1] * b1 + t[2] * b2;
                        let tx = (uv.x * img.width as f32).floor().max(0.0) as u32;
                        let ty = (uv.y * img.height as f32).floor().max(0.0) as u32;
                        let texel = img.texel(tx, ty);
                        [
                            color[0] * texel[0] as f32 / 255.0,
                            color[1] * texel[1] as f32 / 255.0,
                            color[2] * texel[2] as f32 / 255.0,
                            color[3] * texel[3] as f32 / 255.0,
                        ]
                    }
                    None => color,
                };
                self.shade(px, py, z, rgba, state);
            }
        }
    }

    fn draw_line(&mut self, a: Vec3, b: Vec3, color: [f32; 4], state: RenderState) {
        let d = b - a;
        let steps = d.x.abs().max(d.y.abs()).ceil().max(1.0) as i32;
        let radius = ((state.line_width - 1.0) * 0.5).round().max(0.0) as i32;
        let x_major = d.x.abs() >= d.y.abs();
        for i in 0..=steps {
            let p = a + d * (i as f32 / steps as f32);
            let (px, py) = (p.x.floor() as i32, p.y.floor() as i32);
            for o in -radius..=radius {
                let (qx, qy) = if x_major { (px, py + o) } else { (px + o, py) };
                self.shade(qx, qy, p.z, color, state);
            }
        }
    }

    fn shade(&mut self, x: i32, y: i32, z: f32, rgba: [f32; 4], state: RenderState) {
        if !(0.0..=1.0).contains(&z) {
            return;
        }
        let Some(i) = self.index(x, y) else {
            return;
        };
        if state.depth_test {
            if z >= self.depth[i] {
                return;
            }
            if state.depth_write {
                self.depth[i] = z;
            }
        }
        self.color[i] = if state.blend {
            let dst = self.color[i];
            let a = rgba[3].clamp(0.0, 1.0);
            let mix = |s: f32, d: u8| s * a + (d as f32 / 255.0) * (1.0 - a);
            to_rgba8([
                mix(rgba[0], dst[0]),
                mix(rgba[1], dst[1]),
                mix(rgba[2], dst[2]),
                a + (dst[3] as f32 / 255.0) * (1.0 - a),
            ])
        } else {
            to_rgba8(rgba)
        };
    }
}

fn edge(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn to_rgba8(c: [f32; 4]) -> [u8; 4] {
    c.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(w: u32, h: u32) -> SoftwareBackend {
        let mut gpu = SoftwareBackend::new();
        gpu.set_viewport(Size::new(w, h));
        gpu.clear(Some([0.0, 0.0, 0.0, 1.0]), true);
        gpu
    }

    // NDC quad covering the left half of the screen at depth `z`
    fn left_half(z: f32) -> Vec<f32> {
        vec![
            -1.0, -1.0, z, 0.0, -1.0, z, 0.0, 1.0, z, //
            -1.0, -1.0, z, 0.0, 1.0, z, -1.0, 1.0, z,
        ]
    }

    #[test]
    fn test_triangle_fill_and_read_back() {
        let mut gpu = backend(8, 8);
        let quad = left_half(0.0);
        gpu.draw(&DrawCall::new(Primitive::Triangles, &quad, [1.0, 0.0, 0.0, 1.0], Mat4::IDENTITY));
        assert_eq!(gpu.read_pixel(1, 4), [255, 0, 0, 255]);
        assert_eq!(gpu.read_pixel(6, 4), [0, 0, 0, 255]);
        assert!((gpu.read_depth(1, 4) - 0.5).abs() < 1e-6);
        assert_eq!(gpu.read_depth(6, 4), 1.0);
    }

    #[test]
    fn test_depth_less_keeps_nearest() {
        let mut gpu = backend(8, 8);
        let near = left_half(-0.5);
        let far = left_half(0.5);
        gpu.draw(&DrawCall::new(Primitive::Triangles, &near, [0.0, 1.0, 0.0, 1.0], Mat4::IDENTITY));
        gpu.draw(&DrawCall::new(Primitive::Triangles, &far, [1.0, 0.0, 0.0, 1.0], Mat4::IDENTITY));
        assert_eq!(gpu.read_pixel(2, 2), [0, 255, 0, 255]);
    }

    #[test]
    fn test_blend() {
        let mut gpu = backend(4, 4);
        gpu.clear(Some([0.0, 0.0, 1.0, 1.0]), true);
        let quad = left_half(0.0);
        gpu.draw(
            &DrawCall::new(Primitive::Triangles, &quad, [1.0, 0.0, 0.0, 0.5], Mat4::IDENTITY)
                .with_state(RenderState::overlay()),
        );
        let px = gpu.read_pixel(0, 0);
        assert_eq!(px[0], 128);
        assert_eq!(px[2], 128);
    }

    #[test]
    fn test_out_of_range_reads() {
        let mut gpu = backend(4, 4);
        assert_eq!(gpu.read_pixel(-1, 0), [0, 0, 0, 0]);
        assert_eq!(gpu.read_depth(4, 0), 1.0);
    }

    #[test]
    fn test_lines() {
        let mut gpu = backend(10, 10);
        let line = [-1.0, 0.05, 0.0, 1.0, 0.05, 0.0];
        gpu.draw(&DrawCall::new(Primitive::Lines, &line, [1.0, 1.0, 1.0, 1.0], Mat4::IDENTITY));
        assert_eq!(gpu.read_pixel(3, 5), [255, 255, 255, 255]);
        assert_eq!(gpu.read_pixel(3, 8), [0, 0, 0, 255]);
    }

    #[test]
    fn test_textured_quad_samples_nearest() {
        let mut gpu = backend(4, 4);
        let mut img = TextureImage::solid(2, 1, [255, 0, 0, 255]);
        img.rgba[4..8].copy_from_slice(&[0, 0, 255, 255]);
        let tex = gpu.create_texture(&img).unwrap();
        let quad = [
            -1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0, 1.0, 0.0, //
            -1.0, -1.0, 0.0, 1.0, 1.0, 0.0, -1.0, 1.0, 0.0,
        ];
        let uvs = [0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        gpu.draw(
            &DrawCall::new(Primitive::Triangles, &quad, [1.0; 4], Mat4::IDENTITY)
                .with_texture(tex, &uvs)
                .with_state(RenderState::overlay()),
        );
        assert_eq!(gpu.read_pixel(0, 2), [255, 0, 0, 255]);
        assert_eq!(gpu.read_pixel(3, 2), [0, 0, 255, 255]);
    }

    #[test]
    fn test_program_uniforms() {
        let mut gpu = backend(1, 1);
        let vs = "uniform mat4 u_mvp;\nvoid main() {}";
        let fs = "uniform float u_z;\nvoid main() {}";
        let p = gpu.compile_program(vs, fs).unwrap();
        assert!(gpu.set_uniform_f32(p, "u_z", 2.5));
        assert!(!gpu.set_uniform_f32(p, "u_missing", 1.0));
        assert_eq!(gpu.uniform(p, "u_z"), Some(2.5));
        assert!(gpu.compile_program("", fs).is_err());
    }

    #[test]
    fn test_lost_context() {
        let mut gpu = backend(2, 2);
        gpu.set_context_available(false);
        assert!(!gpu.make_current());
        assert!(matches!(gpu.compile_program("void main", "void main"), Err(GpuError::ContextLost)));
    }

    #[test]
    fn test_legacy_device_has_no_shaders() {
        let mut gpu = SoftwareBackend::legacy();
        assert!(gpu.info().legacy);
        assert!(gpu.compile_program("void main() {}", "void main() {}").is_err());
    }
}
