use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use glow::HasContext;

use super::{DrawCall, GpuContext, GpuError, GpuInfo, Primitive, ProgramId, RenderState, TextureId};
use crate::assets::TextureImage;
use crate::viewport::Size;

// ── OpenGL backend ───────────────────────────────────────────

/// [`GpuContext`] over a `glow` context owned by the window host.
///
/// The canvas may occupy only part of the window framebuffer: `origin` is its
/// bottom-left corner in framebuffer pixels and is added to viewport and read-back
/// coordinates.
pub struct GlowBackend {
    gl: Arc<glow::Context>,
    flat_program: glow::Program,
    textured_program: glow::Program,
    vao: glow::VertexArray,
    position_vbo: glow::Buffer,
    uv_vbo: glow::Buffer,
    programs: HashMap<ProgramId, glow::Program>,
    textures: HashMap<TextureId, glow::Texture>,
    active: Option<ProgramId>,
    next_id: u32,
    origin: Rc<Cell<[i32; 2]>>,
    size: Size,
}

impl GlowBackend {
    pub fn new(gl: Arc<glow::Context>) -> Result<Self, GpuError> {
        let flat_program = link_program(&gl, FLAT_VERT, FLAT_FRAG)?;
        let textured_program = link_program(&gl, TEXTURED_VERT, TEXTURED_FRAG)?;

        let (vao, position_vbo, uv_vbo) = unsafe {
            let vao = gl.create_vertex_array().map_err(GpuError::Allocation)?;
            let position_vbo = gl.create_buffer().map_err(GpuError::Allocation)?;
            let uv_vbo = gl.create_buffer().map_err(GpuError::Allocation)?;
            (vao, position_vbo, uv_vbo)
        };

        tracing::info!(
            "OpenGL canvas backend on {} ({})",
            unsafe { gl.get_parameter_string(glow::RENDERER) },
            unsafe { gl.get_parameter_string(glow::VERSION) }
        );

        Ok(Self {
            gl,
            flat_program,
            textured_program,
            vao,
            position_vbo,
            uv_vbo,
            programs: HashMap::new(),
            textures: HashMap::new(),
            active: None,
            next_id: 1,
            origin: Rc::new(Cell::new([0, 0])),
            size: Size::default(),
        })
    }

    /// Bottom-left corner of the canvas inside the framebuffer
    pub fn set_origin(&mut self, x: i32, y: i32) {
        self.origin.set([x, y]);
    }

    /// Shared handle to the origin, for hosts that hand the backend over to a canvas
    pub fn origin_handle(&self) -> Rc<Cell<[i32; 2]>> {
        self.origin.clone()
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.size.width as i32 && y < self.size.height as i32
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl GpuContext for GlowBackend {
    fn make_current(&mut self) -> bool {
        // The host makes its context current before invoking paint callbacks.
        true
    }

    fn info(&self) -> GpuInfo {
        let gl = &*self.gl;
        let version = gl.version();
        let legacy = !version.is_embedded && version.major < 2;
        unsafe {
            GpuInfo {
                renderer: gl.get_parameter_string(glow::RENDERER),
                version: gl.get_parameter_string(glow::VERSION),
                legacy,
                shaders: !legacy,
                multisample: gl.get_parameter_i32(glow::SAMPLES) > 0,
            }
        }
    }

    fn set_viewport(&mut self, size: Size) {
        self.size = size;
        unsafe {
            self.gl.viewport(
                self.origin.get()[0],
                self.origin.get()[1],
                size.width as i32,
                size.height as i32,
            );
        }
    }

    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool) {
        let gl = &*self.gl;
        let mut mask = 0;
        unsafe {
            if let Some([r, g, b, a]) = color {
                gl.clear_color(r, g, b, a);
                mask |= glow::COLOR_BUFFER_BIT;
            }
            if depth {
                gl.depth_mask(true);
                gl.clear_depth_f32(1.0);
                mask |= glow::DEPTH_BUFFER_BIT;
            }
            if mask != 0 {
                gl.clear(mask);
            }
        }
    }

    fn compile_program(&mut self, vertex_src: &str, fragment_src: &str) -> Result<ProgramId, GpuError> {
        let program = link_program(&self.gl, vertex_src, fragment_src)?;
        let id = ProgramId(self.next_id());
        self.programs.insert(id, program);
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        if let Some(p) = self.programs.remove(&program) {
            unsafe { self.gl.delete_program(p) };
        }
        if self.active == Some(program) {
            self.active = None;
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.active = program.filter(|p| self.programs.contains_key(p));
    }

    fn set_uniform_f32(&mut self, program: ProgramId, name: &str, value: f32) -> bool {
        let Some(&p) = self.programs.get(&program) else {
            return false;
        };
        let gl = &*self.gl;
        unsafe {
            let Some(loc) = gl.get_uniform_location(p, name) else {
                return false;
            };
            gl.use_program(Some(p));
            gl.uniform_1_f32(Some(&loc), value);
        }
        true
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureId, GpuError> {
        if image.rgba.len() != (image.width * image.height * 4) as usize {
            return Err(GpuError::Texture(format!(
                "{}x{} image with {} bytes",
                image.width,
                image.height,
                image.rgba.len()
            )));
        }
        let texture = unsafe {
            let gl = &*self.gl;
            let texture = gl.create_texture().map_err(GpuError::Texture)?;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                image.width as i32,
                image.height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(&image.rgba)),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);
            texture
        };
        let id = TextureId(self.next_id());
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(t) = self.textures.remove(&texture) {
            unsafe { self.gl.delete_texture(t) };
        }
    }

    fn draw(&mut self, call: &DrawCall) {
        let texture = match call.texture {
            Some((id, uvs)) => match self.textures.get(&id) {
                Some(&t) => Some((t, uvs)),
                None => {
                    tracing::warn!("Draw with unknown texture {id:?} skipped");
                    return;
                }
            },
            None => None,
        };
        let program = match (&texture, self.active.and_then(|p| self.programs.get(&p))) {
            (Some(_), _) => self.textured_program,
            (None, Some(&p)) => p,
            (None, None) => self.flat_program,
        };

        let gl = &*self.gl;
        unsafe {
            apply_state(gl, &call.state);
            gl.use_program(Some(program));
            set_uniform_mat4(gl, program, "u_mvp", &call.mvp);
            set_uniform_vec4(gl, program, "u_color", call.color);

            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.position_vbo));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, f32_bytes(call.positions), glow::STREAM_DRAW);
            // position: location 0
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, 3 * 4, 0);

            match texture {
                Some((t, uvs)) => {
                    gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.uv_vbo));
                    gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, f32_bytes(uvs), glow::STREAM_DRAW);
                    // uv: location 1
                    gl.enable_vertex_attrib_array(1);
                    gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, 2 * 4, 0);
                    gl.active_texture(glow::TEXTURE0);
                    gl.bind_texture(glow::TEXTURE_2D, Some(t));
                    if let Some(loc) = gl.get_uniform_location(program, "u_texture") {
                        gl.uniform_1_i32(Some(&loc), 0);
                    }
                }
                None => gl.disable_vertex_attrib_array(1),
            }

            let mode = match call.primitive {
                Primitive::Triangles => glow::TRIANGLES,
                Primitive::Lines => glow::LINES,
                Primitive::LineStrip => glow::LINE_STRIP,
            };
            gl.draw_arrays(mode, 0, call.vertex_count() as i32);

            gl.bind_texture(glow::TEXTURE_2D, None);
            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.use_program(None);
        }
    }

    fn read_pixel(&mut self, x: i32, y: i32) -> [u8; 4] {
        if !self.in_bounds(x, y) {
            return [0; 4];
        }
        let gl = &*self.gl;
        let mut buf = [0u8; 4];
        unsafe {
            gl.read_pixels(
                self.origin.get()[0] + x,
                self.origin.get()[1] + y,
                1,
                1,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(Some(&mut buf)),
            );
        }
        egui_glow::check_for_gl_error!(gl, "read_pixel");
        buf
    }

    fn read_depth(&mut self, x: i32, y: i32) -> f32 {
        if !self.in_bounds(x, y) {
            return 1.0;
        }
        let gl = &*self.gl;
        let mut buf = [0u8; 4];
        unsafe {
            gl.read_pixels(
                self.origin.get()[0] + x,
                self.origin.get()[1] + y,
                1,
                1,
                glow::DEPTH_COMPONENT,
                glow::FLOAT,
                glow::PixelPackData::Slice(Some(&mut buf)),
            );
        }
        egui_glow::check_for_gl_error!(gl, "read_depth");
        f32::from_ne_bytes(buf)
    }
}

impl Drop for GlowBackend {
    fn drop(&mut self) {
        let gl = &*self.gl;
        unsafe {
            for (_, p) in self.programs.drain() {
                gl.delete_program(p);
            }
            for (_, t) in self.textures.drain() {
                gl.delete_texture(t);
            }
            gl.delete_program(self.flat_program);
            gl.delete_program(self.textured_program);
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.position_vbo);
            gl.delete_buffer(self.uv_vbo);
        }
    }
}

// ── Fixed-function state ─────────────────────────────────────

unsafe fn apply_state(gl: &glow::Context, state: &RenderState) {
    if state.depth_test {
        gl.enable(glow::DEPTH_TEST);
        gl.depth_func(glow::LESS);
    } else {
        gl.disable(glow::DEPTH_TEST);
    }
    gl.depth_mask(state.depth_write);
    if state.blend {
        gl.enable(glow::BLEND);
        gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
    } else {
        gl.disable(glow::BLEND);
    }
    if state.multisample {
        gl.enable(glow::MULTISAMPLE);
    } else {
        gl.disable(glow::MULTISAMPLE);
    }
    gl.line_width(state.line_width);
}

// ── Shader compilation ───────────────────────────────────────

fn link_program(gl: &glow::Context, vert_src: &str, frag_src: &str) -> Result<glow::Program, GpuError> {
    unsafe {
        let program = gl.create_program().map_err(GpuError::Allocation)?;
        let mut shaders = Vec::with_capacity(2);
        for (stage, kind, src) in [
            ("vertex", glow::VERTEX_SHADER, vert_src),
            ("fragment", glow::FRAGMENT_SHADER, frag_src),
        ] {
            let shader = match gl.create_shader(kind) {
                Ok(s) => s,
                Err(e) => {
                    gl.delete_program(program);
                    return Err(GpuError::Allocation(e));
                }
            };
            gl.shader_source(shader, src);
            gl.compile_shader(shader);
            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                tracing::error!("{stage} shader error: {log}");
                gl.delete_shader(shader);
                for s in shaders {
                    gl.delete_shader(s);
                }
                gl.delete_program(program);
                return Err(GpuError::Compile { stage, log });
            }
            gl.attach_shader(program, shader);
            shaders.push(shader);
        }

        gl.bind_attrib_location(program, 0, "a_position");
        gl.bind_attrib_location(program, 1, "a_uv");
        gl.link_program(program);
        let linked = gl.get_program_link_status(program);
        for s in shaders {
            gl.detach_shader(program, s);
            gl.delete_shader(s);
        }
        if !linked {
            let log = gl.get_program_info_log(program);
            tracing::error!("Program link error: {log}");
            gl.delete_program(program);
            return Err(GpuError::Link(log));
        }
        Ok(program)
    }
}

// ── Uniform setters ──────────────────────────────────────────

unsafe fn set_uniform_mat4(gl: &glow::Context, program: glow::Program, name: &str, mat: &glam::Mat4) {
    let loc = gl.get_uniform_location(program, name);
    gl.uniform_matrix_4_f32_slice(loc.as_ref(), false, &mat.to_cols_array());
}

unsafe fn set_uniform_vec4(gl: &glow::Context, program: glow::Program, name: &str, v: [f32; 4]) {
    let loc = gl.get_uniform_location(program, name);
    gl.uniform_4_f32(loc.as_ref(), v[0], v[1], v[2], v[3]);
}

// ── Byte cast helper ─────────────────────────────────────────

fn f32_bytes(slice: &[f32]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, std::mem::size_of_val(slice)) }
}

// ── Built-in programs ────────────────────────────────────────

const FLAT_VERT: &str = r#"#version 330 core
uniform mat4 u_mvp;

layout(location = 0) in vec3 a_position;

void main() {
    gl_Position = u_mvp * vec4(a_position, 1.0);
}
"#;

const FLAT_FRAG: &str = r#"#version 330 core
uniform vec4 u_color;
out vec4 frag_color;

void main() {
    frag_color = u_color;
}
"#;

const TEXTURED_VERT: &str = r#"#version 330 core
uniform mat4 u_mvp;

layout(location = 0) in vec3 a_position;
layout(location = 1) in vec2 a_uv;

out vec2 v_uv;

void main() {
    gl_Position = u_mvp * vec4(a_position, 1.0);
    v_uv = a_uv;
}
"#;

const TEXTURED_FRAG: &str = r#"#version 330 core
uniform vec4 u_color;
uniform sampler2D u_texture;

in vec2 v_uv;
out vec4 frag_color;

void main() {
    frag_color = u_color * texture(u_texture, v_uv);
}
"#;
