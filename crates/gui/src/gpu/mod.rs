//! The narrow GPU seam the canvas renders through.
//!
//! The canvas never touches a graphics API directly. Everything it needs (clearing, flat
//! and textured draws, program/uniform lifecycle, color and depth read-back) goes through
//! [`GpuContext`], which has a `glow` implementation for real windows and a software
//! rasterizer for headless use.

mod glow_backend;
mod software;

pub use glow_backend::GlowBackend;
pub use software::SoftwareBackend;

use glam::Mat4;

use crate::assets::TextureImage;
use crate::viewport::Size;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no current GPU context")]
    ContextLost,
    #[error("{stage} shader compile error: {log}")]
    Compile { stage: &'static str, log: String },
    #[error("program link error: {0}")]
    Link(String),
    #[error("texture upload failed: {0}")]
    Texture(String),
    #[error("unknown program {0:?}")]
    UnknownProgram(ProgramId),
    #[error("GPU object allocation failed: {0}")]
    Allocation(String),
}

/// What the driver reports about itself
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GpuInfo {
    pub renderer: String,
    pub version: String,
    /// Fixed-function only; programmable features are unavailable
    pub legacy: bool,
    /// Programmable shaders can be compiled
    pub shaders: bool,
    /// The framebuffer has multisample buffers
    pub multisample: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Triangles,
    Lines,
    LineStrip,
}

/// Fixed-function state for one draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub depth_test: bool,
    pub depth_write: bool,
    /// Source-alpha blending
    pub blend: bool,
    pub multisample: bool,
    pub line_width: f32,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            blend: false,
            multisample: false,
            line_width: 1.0,
        }
    }
}

impl RenderState {
    /// Overlay state: no depth, blended
    pub fn overlay() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            blend: true,
            ..Self::default()
        }
    }
}

/// One draw: flat `xyz` positions in a single color, optionally textured
#[derive(Debug, Clone)]
pub struct DrawCall<'a> {
    pub primitive: Primitive,
    pub positions: &'a [f32],
    pub color: [f32; 4],
    pub mvp: Mat4,
    pub state: RenderState,
    /// Texture plus per-vertex `uv` (two floats per vertex, `v` pointing down the image)
    pub texture: Option<(TextureId, &'a [f32])>,
}

impl<'a> DrawCall<'a> {
    pub fn new(primitive: Primitive, positions: &'a [f32], color: [f32; 4], mvp: Mat4) -> Self {
        Self {
            primitive,
            positions,
            color,
            mvp,
            state: RenderState::default(),
            texture: None,
        }
    }

    pub fn with_state(mut self, state: RenderState) -> Self {
        self.state = state;
        self
    }

    pub fn with_texture(mut self, texture: TextureId, uvs: &'a [f32]) -> Self {
        self.texture = Some((texture, uvs));
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// GPU operations used by the canvas.
///
/// Window coordinates for read-back have their origin at the bottom-left corner of the
/// canvas. Reads outside the canvas return black and far depth (1.0).
pub trait GpuContext {
    /// Make this context current for the calling thread. False when there is no context.
    fn make_current(&mut self) -> bool;
    fn info(&self) -> GpuInfo;
    fn set_viewport(&mut self, size: Size);
    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool);

    fn compile_program(&mut self, vertex_src: &str, fragment_src: &str) -> Result<ProgramId, GpuError>;
    fn delete_program(&mut self, program: ProgramId);
    /// Bind a user program for subsequent untextured draws; `None` restores the flat program.
    fn use_program(&mut self, program: Option<ProgramId>);
    /// False when the program is unknown or has no uniform called `name`
    fn set_uniform_f32(&mut self, program: ProgramId, name: &str, value: f32) -> bool;

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureId, GpuError>;
    fn delete_texture(&mut self, texture: TextureId);

    fn draw(&mut self, call: &DrawCall);

    fn read_pixel(&mut self, x: i32, y: i32) -> [u8; 4];
    fn read_depth(&mut self, x: i32, y: i32) -> f32;
}

/// Uniform names declared as `uniform <type> <name>;` in GLSL sources
pub(crate) fn declared_uniforms(sources: &[&str]) -> Vec<String> {
    let mut names = Vec::new();
    for src in sources {
        for line in src.lines() {
            let line = line.trim();
            let Some(rest) = line.strip_prefix("uniform ") else {
                continue;
            };
            let mut parts = rest.split_whitespace();
            let (Some(_ty), Some(name)) = (parts.next(), parts.next()) else {
                continue;
            };
            let name = name.trim_end_matches(';');
            let name = name.split('[').next().unwrap_or(name);
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_uniforms() {
        let vs = "uniform mat4 u_mvp;\nin vec3 a_position;";
        let fs = "uniform vec4 u_color;\n  uniform float u_lights[4];\nuniform mat4 u_mvp;";
        assert_eq!(declared_uniforms(&[vs, fs]), vec!["u_mvp", "u_color", "u_lights"]);
    }

    #[test]
    fn test_overlay_state() {
        let state = RenderState::overlay();
        assert!(!state.depth_test);
        assert!(state.blend);
    }
}
