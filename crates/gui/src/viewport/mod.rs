//! The 3D canvas: scene state, configuration calls and queries.
//!
//! Rendering lives in `render.rs` and the input handlers in `events.rs`.

mod axes;
mod bed;
mod camera;
mod cutting_plane;
mod events;
mod geometry;
mod layers_editing;
mod mouse;
mod picking;
mod render;
mod shader;

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use canvas3d_model::{BoundingBoxf3, ExPolygon, Pointf, Print, PrintConfig, VolumeCollection};
use glam::{Mat4, Vec2, Vec3};

use crate::assets::{AssetLoader, TextureImage};
use crate::gpu::{DrawCall, GpuContext, Primitive, RenderState, TextureId};
use crate::notify::{CanvasEvent, EventDispatcher};
use crate::settings::CanvasSettings;
use crate::surface::Surface;

pub use axes::Axes;
pub use bed::Bed;
pub use camera::{project, unproject, Camera, CameraType};
pub use cutting_plane::CuttingPlane;
pub use geometry::{GeometryBuffer, Rect, Size};
pub use layers_editing::{EditState, LayersEditing, OverlayFrame};
pub use mouse::{Drag, Mouse};
pub use picking::{decode_pixel, encode_id, window_pixel, FrameState, Ray, MAX_PICKABLE};
pub use shader::Shader;

use layers_editing::quad_triangles;

/// Options passed to [`GlCanvas3D::init`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitOptions {
    pub use_vbos: bool,
    pub use_legacy_opengl: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            use_vbos: true,
            use_legacy_opengl: false,
        }
    }
}

/// What the device and the assets allow, negotiated once by [`GlCanvas3D::init`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub vbos: bool,
    pub legacy_opengl: bool,
    /// The gouraud shader compiled
    pub shader_lit: bool,
    /// The layer editing overlay initialized
    pub layer_editing: bool,
    pub multisample: bool,
}

/// An embedder-supplied image drawn over the scene, uploaded on first use
#[derive(Debug)]
struct OverlayImage {
    image: TextureImage,
    texture: Option<TextureId>,
}

/// The 3D scene view of the plater
pub struct GlCanvas3D {
    gpu: Box<dyn GpuContext>,
    surface: Box<dyn Surface>,
    assets: Box<dyn AssetLoader>,
    settings: CanvasSettings,

    camera: Camera,
    bed: Bed,
    axes: Axes,
    cutting_plane: CuttingPlane,
    shader: Shader,
    layers_editing: LayersEditing,
    mouse: Mouse,

    volumes: Option<Weak<RefCell<VolumeCollection>>>,
    config: Option<Weak<RefCell<PrintConfig>>>,
    print: Option<Weak<RefCell<Print>>>,

    events: EventDispatcher,
    size: Size,
    frame: FrameState,
    capabilities: Option<Capabilities>,

    dirty: bool,
    refresh_pending: bool,
    timer_running: bool,
    force_zoom_to_bed_enabled: bool,
    picking_enabled: bool,
    moving_enabled: bool,
    shader_enabled: bool,
    multisample_allowed: bool,
    warning_texture_enabled: bool,
    legend_texture_enabled: bool,
    warning_texture: Option<OverlayImage>,
    legend_texture: Option<OverlayImage>,
}

impl std::fmt::Debug for GlCanvas3D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlCanvas3D")
            .field("size", &self.size)
            .field("camera", &self.camera)
            .field("capabilities", &self.capabilities)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl GlCanvas3D {
    pub fn new(
        gpu: Box<dyn GpuContext>,
        surface: Box<dyn Surface>,
        assets: Box<dyn AssetLoader>,
        settings: CanvasSettings,
    ) -> Self {
        Self {
            gpu,
            surface,
            assets,
            camera: Camera::new(),
            bed: Bed::new(settings.bed.clone()),
            axes: Axes::default(),
            cutting_plane: CuttingPlane::default(),
            shader: Shader::new(),
            layers_editing: LayersEditing::new(settings.layers_editing.clone()),
            mouse: Mouse::default(),
            volumes: None,
            config: None,
            print: None,
            events: EventDispatcher::new(),
            size: Size::default(),
            frame: FrameState::default(),
            capabilities: None,
            dirty: true,
            refresh_pending: false,
            timer_running: false,
            force_zoom_to_bed_enabled: true,
            picking_enabled: false,
            moving_enabled: false,
            shader_enabled: false,
            multisample_allowed: false,
            warning_texture_enabled: false,
            legend_texture_enabled: false,
            warning_texture: None,
            legend_texture: None,
            settings,
        }
    }

    // ── GPU context ──────────────────────────────────────────

    /// Make the canvas' GPU context current. Must succeed before any GPU work.
    pub fn set_current(&mut self) -> bool {
        let ok = self.gpu.make_current();
        if !ok {
            tracing::warn!("No GPU context available for the 3D canvas");
        }
        ok
    }

    /// Negotiate capabilities and build the shaders. Runs once; false only without a context.
    ///
    /// Shader and overlay failures degrade the canvas instead of failing.
    pub fn init(&mut self, options: InitOptions) -> bool {
        if self.capabilities.is_some() {
            return true;
        }
        if !self.set_current() {
            return false;
        }
        let info = self.gpu.info();
        tracing::info!(
            "3D canvas on {} ({}){}",
            info.renderer,
            info.version,
            if info.legacy { ", legacy OpenGL" } else { "" }
        );
        let legacy = options.use_legacy_opengl || info.legacy;

        let shader_lit = !legacy
            && info.shaders
            && self.shader.init(
                self.gpu.as_mut(),
                self.assets.as_ref(),
                &self.settings.shaders.vertex_shader,
                &self.settings.shaders.fragment_shader,
            );
        if !shader_lit {
            tracing::warn!("Lit shading unavailable, volumes are drawn flat");
        }
        let layer_editing = self
            .layers_editing
            .init(self.gpu.as_mut(), self.assets.as_ref(), legacy || !info.shaders);

        self.capabilities = Some(Capabilities {
            vbos: options.use_vbos && !legacy,
            legacy_opengl: legacy,
            shader_lit,
            layer_editing,
            multisample: info.multisample,
        });
        self.dirty = true;
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.capabilities.is_some()
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        self.capabilities
    }

    // ── Model references ─────────────────────────────────────

    pub fn set_volumes(&mut self, volumes: &Rc<RefCell<VolumeCollection>>) {
        self.volumes = Some(Rc::downgrade(volumes));
        self.dirty = true;
    }

    pub fn set_config(&mut self, config: &Rc<RefCell<PrintConfig>>) {
        self.config = Some(Rc::downgrade(config));
    }

    pub fn set_print(&mut self, print: &Rc<RefCell<Print>>) {
        self.print = Some(Rc::downgrade(print));
    }

    pub(crate) fn volumes_rc(&self) -> Option<Rc<RefCell<VolumeCollection>>> {
        upgrade(&self.volumes, "volume collection")
    }

    pub(crate) fn config_rc(&self) -> Option<Rc<RefCell<PrintConfig>>> {
        upgrade(&self.config, "print config")
    }

    pub(crate) fn print_rc(&self) -> Option<Rc<RefCell<Print>>> {
        upgrade(&self.print, "print")
    }

    // ── Scene configuration ──────────────────────────────────

    /// Replace the bed outline; the axes move to the bed origin and scale with the bed
    pub fn set_bed_shape(&mut self, shape: &[Pointf]) {
        self.bed.set_shape(shape);
        self.axes.origin = Vec3::new(0.0, 0.0, self.settings.bed.ground_z);
        self.set_axes_length(self.settings.axes.length_ratio * self.bed.bounding_box().max_size() as f32);
        self.dirty = true;
    }

    /// Square bed around the current volumes, twice their largest extent wide
    pub fn set_auto_bed_shape(&mut self) {
        let bb = self.volumes_bounding_box();
        let max_size = bb.max_size();
        let [cx, cy, _] = bb.center();
        self.set_bed_shape(&[
            Pointf::new(cx - max_size, cy - max_size),
            Pointf::new(cx + max_size, cy - max_size),
            Pointf::new(cx + max_size, cy + max_size),
            Pointf::new(cx - max_size, cy + max_size),
        ]);
        self.axes.origin = Vec3::new(cx as f32, cy as f32, self.settings.bed.ground_z);
    }

    pub fn set_axes_length(&mut self, length: f32) {
        self.axes.length = length;
        self.dirty = true;
    }

    /// Show the cross-section at `z`; a negative `z` hides it
    pub fn set_cutting_plane(&mut self, z: f32, polygons: &[ExPolygon]) {
        self.cutting_plane.set(z, polygons);
        self.dirty = true;
    }

    pub fn enable_layers_editing(&mut self, enable: bool) {
        self.layers_editing.set_enabled(enable);
        if !enable {
            self.stop_timer();
        }
        self.dirty = true;
    }

    pub fn enable_picking(&mut self, enable: bool) {
        self.picking_enabled = enable;
        self.dirty = true;
    }

    pub fn enable_moving(&mut self, enable: bool) {
        self.moving_enabled = enable;
    }

    pub fn enable_shader(&mut self, enable: bool) {
        self.shader_enabled = enable;
        self.dirty = true;
    }

    pub fn allow_multisample(&mut self, allow: bool) {
        self.multisample_allowed = allow;
    }

    pub fn enable_force_zoom_to_bed(&mut self, enable: bool) {
        self.force_zoom_to_bed_enabled = enable;
    }

    pub fn enable_warning_texture(&mut self, enable: bool) {
        self.warning_texture_enabled = enable;
        self.dirty = true;
    }

    pub fn enable_legend_texture(&mut self, enable: bool) {
        self.legend_texture_enabled = enable;
        self.dirty = true;
    }

    /// Image shown centered at the bottom edge while the warning texture is enabled
    pub fn set_warning_texture(&mut self, image: Option<TextureImage>) {
        let old = std::mem::replace(&mut self.warning_texture, image.map(OverlayImage::new));
        self.release_overlay_image(old);
        self.dirty = true;
    }

    /// Image shown at the top-left corner while the legend texture is enabled
    pub fn set_legend_texture(&mut self, image: Option<TextureImage>) {
        let old = std::mem::replace(&mut self.legend_texture, image.map(OverlayImage::new));
        self.release_overlay_image(old);
        self.dirty = true;
    }

    fn release_overlay_image(&mut self, image: Option<OverlayImage>) {
        if let Some(texture) = image.and_then(|i| i.texture) {
            if self.gpu.make_current() {
                self.gpu.delete_texture(texture);
            }
        }
    }

    // ── Volumes ──────────────────────────────────────────────

    /// Select `idx` together with its select group
    pub fn select_volume(&mut self, idx: usize) {
        let Some(volumes) = self.volumes_rc() else {
            return;
        };
        let mut volumes = volumes.borrow_mut();
        for i in volumes.select_group(idx) {
            volumes.volumes[i].selected = true;
        }
        self.dirty = true;
    }

    pub fn deselect_volumes(&mut self) {
        let Some(volumes) = self.volumes_rc() else {
            return;
        };
        for v in &mut volumes.borrow_mut().volumes {
            v.selected = false;
        }
        self.dirty = true;
    }

    /// Remove every volume from the collection
    pub fn reset_volumes(&mut self) {
        if let Some(volumes) = self.volumes_rc() {
            volumes.borrow_mut().clear();
        }
        self.frame.hover_volume_id = None;
        self.mouse.reset_drag();
        self.dirty = true;
    }

    pub fn update_volumes_colors_by_extruder(&mut self) {
        let (Some(volumes), Some(config)) = (self.volumes_rc(), self.config_rc()) else {
            return;
        };
        volumes.borrow_mut().update_colors_by_extruder(&config.borrow());
        self.dirty = true;
    }

    /// Object id of the first selected volume
    pub fn selected_object_id(&self) -> Option<usize> {
        let volumes = self.volumes_rc()?;
        let id = volumes.borrow().volumes.iter().find(|v| v.selected).and_then(|v| v.object_id());
        id
    }

    // ── Camera ───────────────────────────────────────────────

    /// Switch to a named standard view. False for unknown names or an empty scene.
    pub fn select_view(&mut self, name: &str) -> bool {
        let (phi, theta) = match name {
            "iso" => (45.0, 45.0),
            "top" => (0.0, 0.0),
            "bottom" => (0.0, 180.0),
            "front" => (0.0, 90.0),
            "rear" => (180.0, 90.0),
            "left" => (90.0, 90.0),
            "right" => (-90.0, 90.0),
            _ => {
                tracing::warn!("Unknown view '{name}'");
                return false;
            }
        };
        let empty = match self.volumes_rc() {
            Some(volumes) => volumes.borrow().is_empty(),
            None => true,
        };
        if empty {
            return false;
        }
        self.camera.set_phi(phi);
        self.camera.set_theta(theta);
        self.dirty = true;
        self.events.emit(CanvasEvent::ViewportChanged);
        self.refresh_if_shown_on_screen();
        true
    }

    pub fn zoom_to_bed(&mut self) {
        let bb = *self.bed.bounding_box();
        self.zoom_to_bounding_box(&bb);
    }

    pub fn zoom_to_volumes(&mut self) {
        let bb = self.volumes_bounding_box();
        self.zoom_to_bounding_box(&bb);
    }

    fn zoom_to_bounding_box(&mut self, bb: &BoundingBoxf3) -> bool {
        let Some(zoom) = self.zoom_to_bounding_box_factor(bb) else {
            return false;
        };
        if !self.camera.set_zoom(zoom) {
            return false;
        }
        let [x, y, z] = bb.center();
        self.camera.target = Vec3::new(x as f32, y as f32, z as f32);
        self.dirty = true;
        self.events.emit(CanvasEvent::ViewportChanged);
        self.refresh_if_shown_on_screen();
        true
    }

    fn zoom_to_bounding_box_factor(&self, bb: &BoundingBoxf3) -> Option<f32> {
        self.camera
            .zoom_to_box_factor(bb, self.size, self.settings.camera.zoom_margin)
    }

    /// Copy the camera of another canvas
    pub fn set_viewport_from_scene(&mut self, other: &GlCanvas3D) {
        self.camera = other.camera.clone();
        self.dirty = true;
    }

    pub(crate) fn view_projection(&self) -> Mat4 {
        self.camera.view_projection(self.size, &self.max_bounding_box())
    }

    /// World point under canvas position `position`.
    ///
    /// Without `depth` the depth buffer of the last rendered frame is read; if the camera or
    /// the canvas size changed since, the read-back would be stale and `None` is returned.
    pub fn mouse_to_3d(&mut self, position: Vec2, depth: Option<f32>) -> Option<Vec3> {
        if self.size.is_empty() {
            return None;
        }
        let view_proj = self.view_projection();
        let depth = match depth {
            Some(depth) => depth,
            None => {
                if !self.frame.is_current(&view_proj, self.size) {
                    tracing::debug!("Depth read-back is stale, render first");
                    return None;
                }
                let (x, y) = window_pixel(position, self.size)?;
                if !self.set_current() {
                    return None;
                }
                self.gpu.read_depth(x, y)
            }
        };
        unproject(
            &view_proj,
            self.size,
            Vec3::new(position.x, self.size.height as f32 - position.y, depth),
        )
    }

    // ── Queries ──────────────────────────────────────────────

    pub fn get_camera_zoom(&self) -> f32 {
        self.camera.zoom()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        self.dirty = true;
        &mut self.camera
    }

    pub fn bed(&self) -> &Bed {
        &self.bed
    }

    pub fn axes(&self) -> &Axes {
        &self.axes
    }

    pub fn cutting_plane(&self) -> &CuttingPlane {
        &self.cutting_plane
    }

    pub fn layers_editing(&self) -> &LayersEditing {
        &self.layers_editing
    }

    pub fn mouse(&self) -> &Mouse {
        &self.mouse
    }

    pub fn settings(&self) -> &CanvasSettings {
        &self.settings
    }

    pub fn events_mut(&mut self) -> &mut EventDispatcher {
        &mut self.events
    }

    /// Combined box of all volumes, wipe towers included
    pub fn volumes_bounding_box(&self) -> BoundingBoxf3 {
        self.volumes_rc()
            .map(|v| v.borrow().bounding_box(false))
            .unwrap_or_default()
    }

    /// Bed and volumes together
    pub fn max_bounding_box(&self) -> BoundingBoxf3 {
        let mut bb = *self.bed.bounding_box();
        bb.merge(&self.volumes_bounding_box());
        bb
    }

    pub fn get_canvas_size(&self) -> Size {
        self.size
    }

    pub fn get_local_mouse_position(&self) -> Option<Vec2> {
        self.mouse.position
    }

    /// Volume under the pointer in the last rendered frame
    pub fn hover_volume_id(&self) -> Option<usize> {
        self.frame.hover_volume_id
    }

    pub fn frame(&self) -> &FrameState {
        &self.frame
    }

    pub fn is_layers_editing_enabled(&self) -> bool {
        self.layers_editing.is_enabled()
    }

    pub fn is_layers_editing_allowed(&self) -> bool {
        self.layers_editing.is_allowed()
    }

    pub fn is_picking_enabled(&self) -> bool {
        self.picking_enabled
    }

    pub fn is_moving_enabled(&self) -> bool {
        self.moving_enabled
    }

    pub fn is_shader_enabled(&self) -> bool {
        self.shader_enabled
    }

    pub fn is_shown_on_screen(&self) -> bool {
        self.surface.is_shown_on_screen()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ── Refresh scheduling ───────────────────────────────────

    fn refresh_if_shown_on_screen(&mut self) {
        if self.surface.is_shown_on_screen() {
            self.surface.request_refresh();
        }
    }

    /// Mark dirty and leave the actual refresh to the next timer tick
    fn schedule_refresh(&mut self) {
        self.dirty = true;
        self.refresh_pending = true;
        self.start_timer();
    }

    fn start_timer(&mut self) {
        if !self.timer_running {
            self.surface
                .start_timer(Duration::from_millis(self.settings.timer.interval_ms));
            self.timer_running = true;
        }
    }

    fn stop_timer(&mut self) {
        if self.timer_running {
            self.surface.stop_timer();
            self.timer_running = false;
        }
    }

    fn emit(&mut self, event: CanvasEvent) {
        self.events.emit(event);
    }
}

impl OverlayImage {
    fn new(image: TextureImage) -> Self {
        Self { image, texture: None }
    }
}

impl Drop for GlCanvas3D {
    fn drop(&mut self) {
        if !self.gpu.make_current() {
            return;
        }
        self.shader.reset(self.gpu.as_mut());
        self.layers_editing.release(self.gpu.as_mut());
        for image in [self.warning_texture.take(), self.legend_texture.take()].into_iter().flatten() {
            if let Some(texture) = image.texture {
                self.gpu.delete_texture(texture);
            }
        }
    }
}

fn upgrade<T>(slot: &Option<Weak<RefCell<T>>>, what: &str) -> Option<Rc<RefCell<T>>> {
    let weak = slot.as_ref()?;
    let rc = weak.upgrade();
    if rc.is_none() {
        tracing::warn!("The {what} was dropped while the canvas still referenced it");
    }
    rc
}

/// Draw `texture` over `[left, right] x [bottom, top]` in overlay space
pub(crate) fn render_texture(
    gpu: &mut dyn GpuContext,
    mvp: Mat4,
    texture: TextureId,
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
) {
    let positions = quad_triangles(left, right, bottom, top);
    let uvs = [
        0.0, 1.0, 1.0, 1.0, 1.0, 0.0, //
        0.0, 1.0, 1.0, 0.0, 0.0, 0.0,
    ];
    gpu.draw(
        &DrawCall::new(Primitive::Triangles, &positions, [1.0; 4], mvp)
            .with_state(RenderState::overlay())
            .with_texture(texture, &uvs),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssets;
    use crate::gpu::SoftwareBackend;
    use crate::surface::RecordingSurface;
    use canvas3d_model::GlVolume;

    fn canvas() -> (GlCanvas3D, SoftwareBackend) {
        let gpu = SoftwareBackend::new();
        let canvas = GlCanvas3D::new(
            Box::new(gpu.clone()),
            Box::new(RecordingSurface::new()),
            Box::new(MemoryAssets::builtin()),
            CanvasSettings::default(),
        );
        (canvas, gpu)
    }

    fn square(size: f64) -> Vec<Pointf> {
        vec![
            Pointf::new(0.0, 0.0),
            Pointf::new(size, 0.0),
            Pointf::new(size, size),
            Pointf::new(0.0, size),
        ]
    }

    #[test]
    fn test_init_negotiates_capabilities_once() {
        let (mut canvas, gpu) = canvas();
        assert!(canvas.init(InitOptions::default()));
        let caps = canvas.capabilities().unwrap();
        assert!(caps.shader_lit && caps.layer_editing && caps.vbos && !caps.legacy_opengl);
        let programs = gpu.program_count();
        assert!(canvas.init(InitOptions::default()));
        assert_eq!(gpu.program_count(), programs);
    }

    #[test]
    fn test_init_without_context_fails() {
        let (mut canvas, gpu) = canvas();
        gpu.set_context_available(false);
        assert!(!canvas.set_current());
        assert!(!canvas.init(InitOptions::default()));
        assert!(!canvas.is_initialized());
    }

    #[test]
    fn test_bed_shape_places_axes() {
        let (mut canvas, _) = canvas();
        canvas.set_bed_shape(&square(200.0));
        assert_eq!(canvas.axes().origin, Vec3::new(0.0, 0.0, -0.02));
        assert!((canvas.axes().length - 60.0).abs() < 1e-4);
    }

    #[test]
    fn test_auto_bed_shape_surrounds_volumes() {
        let (mut canvas, _) = canvas();
        let volumes = Rc::new(RefCell::new(VolumeCollection::new(vec![GlVolume::cuboid(
            [10.0, 20.0, 0.0],
            [10.0, 10.0, 5.0],
            [1.0; 4],
        )])));
        canvas.set_volumes(&volumes);
        canvas.set_auto_bed_shape();
        let bb = canvas.bed().bounding_box();
        assert_eq!(bb.min, [5.0, 15.0, 0.0]);
        assert_eq!(bb.max, [25.0, 35.0, 0.0]);
        assert_eq!(canvas.axes().origin, Vec3::new(15.0, 25.0, -0.02));
    }

    #[test]
    fn test_dropped_model_is_tolerated() {
        let (mut canvas, _) = canvas();
        let volumes = Rc::new(RefCell::new(VolumeCollection::default()));
        canvas.set_volumes(&volumes);
        drop(volumes);
        assert!(!canvas.volumes_bounding_box().defined);
        canvas.select_volume(0);
        assert_eq!(canvas.selected_object_id(), None);
    }

    #[test]
    fn test_unknown_view_is_rejected() {
        let (mut canvas, _) = canvas();
        let volumes = Rc::new(RefCell::new(VolumeCollection::new(vec![GlVolume::cuboid(
            [0.0; 3],
            [1.0; 3],
            [1.0; 4],
        )])));
        canvas.set_volumes(&volumes);
        assert!(!canvas.select_view("sideways"));
        assert!(canvas.select_view("right"));
        assert_eq!(canvas.camera().get_phi(), 270.0);
        assert_eq!(canvas.camera().get_theta(), 90.0);
    }
}
