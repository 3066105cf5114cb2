use canvas3d_model::{LayerHeightEditAction, PrintObject};
use glam::Mat4;

use super::geometry::{Rect, Size};
use super::render_texture;
use super::shader::Shader;
use crate::assets::AssetLoader;
use crate::gpu::{DrawCall, GpuContext, Primitive, RenderState, TextureId};
use crate::settings::LayersEditingSettings;

const BAR_COLOR: [f32; 4] = [0.3, 0.3, 0.3, 0.7];
const PROFILE_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const BAND_COLOR: [f32; 4] = [1.0, 1.0, 0.0, 0.4];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditState {
    #[default]
    Unknown,
    Editing,
    Completed,
}

#[derive(Debug, Clone, Copy)]
struct OverlayTexture {
    id: TextureId,
    width: f32,
    height: f32,
}

#[derive(Debug, Clone, Copy, Default)]
enum Textures {
    #[default]
    NotLoaded,
    Loaded {
        tooltip: OverlayTexture,
        reset: OverlayTexture,
    },
}

/// What the overlay needs from the canvas for one frame
pub struct OverlayFrame<'a> {
    pub size: Size,
    pub zoom: f32,
    /// Identity model-view projection for screen-aligned quads
    pub overlay_mvp: Mat4,
    pub scene_mvp: Mat4,
    /// The object being edited
    pub object: Option<&'a PrintObject>,
    /// World-space triangles of that object's volumes
    pub object_triangles: &'a [Vec<f32>],
}

/// Variable layer height painting: the bar at the right edge of the canvas, its reset
/// button and the brush state.
#[derive(Debug)]
pub struct LayersEditing {
    settings: LayersEditingSettings,
    pub state: EditState,
    pub band_width: f32,
    pub strength: f32,
    pub last_object_id: Option<usize>,
    pub last_z: f32,
    pub last_action: LayerHeightEditAction,
    last_serial: Option<u64>,
    enabled: bool,
    allowed: bool,
    shader: Shader,
    textures: Textures,
}

impl LayersEditing {
    pub fn new(settings: LayersEditingSettings) -> Self {
        Self {
            band_width: settings.band_width,
            strength: settings.strength,
            settings,
            state: EditState::Unknown,
            last_object_id: None,
            last_z: 0.0,
            last_action: LayerHeightEditAction::default(),
            last_serial: None,
            enabled: false,
            allowed: true,
            shader: Shader::new(),
            textures: Textures::NotLoaded,
        }
    }

    /// Build the overlay shader. Legacy devices and shader failures disable editing for good.
    pub fn init(&mut self, gpu: &mut dyn GpuContext, assets: &dyn AssetLoader, use_legacy_opengl: bool) -> bool {
        if use_legacy_opengl {
            tracing::info!("Layer height editing unavailable on a legacy OpenGL device");
            self.disable_permanently();
            return false;
        }
        let (vs, fs) = (self.settings.vertex_shader.clone(), self.settings.fragment_shader.clone());
        if !self.shader.init(gpu, assets, &vs, &fs) {
            tracing::warn!("Layer height editing disabled: overlay shader failed");
            self.disable_permanently();
            return false;
        }
        self.allowed = true;
        true
    }

    fn disable_permanently(&mut self) {
        self.allowed = false;
        self.enabled = false;
        self.state = EditState::Unknown;
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = self.allowed && enabled;
        if !self.enabled {
            self.state = EditState::Unknown;
        }
    }

    // ── Hit rectangles ───────────────────────────────────────

    pub fn bar_rect_screen(&self, size: Size) -> Rect {
        let (w, h) = (size.width as f32, size.height as f32);
        Rect::new(w - self.settings.bar_width, 0.0, w, h - self.settings.reset_button_height)
    }

    pub fn reset_rect_screen(&self, size: Size) -> Rect {
        let (w, h) = (size.width as f32, size.height as f32);
        Rect::new(w - self.settings.bar_width, h - self.settings.reset_button_height, w, h)
    }

    pub fn bar_rect_viewport(&self, size: Size, zoom: f32) -> Rect {
        let inv_zoom = if zoom > 0.0 { 1.0 / zoom } else { 0.0 };
        let (half_w, half_h) = (size.half_width(), size.half_height());
        Rect::new(
            (half_w - self.settings.bar_width) * inv_zoom,
            half_h * inv_zoom,
            half_w * inv_zoom,
            (-half_h + self.settings.reset_button_height) * inv_zoom,
        )
    }

    pub fn reset_rect_viewport(&self, size: Size, zoom: f32) -> Rect {
        let inv_zoom = if zoom > 0.0 { 1.0 / zoom } else { 0.0 };
        let (half_w, half_h) = (size.half_width(), size.half_height());
        Rect::new(
            (half_w - self.settings.bar_width) * inv_zoom,
            (-half_h + self.settings.reset_button_height) * inv_zoom,
            half_w * inv_zoom,
            -half_h * inv_zoom,
        )
    }

    pub fn bar_rect_contains(&self, size: Size, x: f32, y: f32) -> bool {
        self.bar_rect_screen(size).contains(x, y)
    }

    pub fn reset_rect_contains(&self, size: Size, x: f32, y: f32) -> bool {
        self.reset_rect_screen(size).contains(x, y)
    }

    /// Pointer height inside the bar, `0` at its bottom and `1` at its top; `-1000` outside.
    /// A bar at most one pixel tall reads as `0`.
    pub fn get_cursor_z_relative(&self, size: Size, x: f32, y: f32) -> f32 {
        if self.bar_rect_contains(size, x, y) {
            self.z_relative_at(size, y).unwrap_or(0.0)
        } else {
            -1000.0
        }
    }

    /// Relative height of pointer row `y` along the bar, not limited to the bar.
    /// `None` when the bar has no rows to map.
    pub fn z_relative_at(&self, size: Size, y: f32) -> Option<f32> {
        let rect = self.bar_rect_screen(size);
        let span = rect.bottom - rect.top - 1.0;
        (span > 0.0).then(|| (rect.bottom - y - 1.0) / span)
    }

    /// Scale the brush band by wheel notches
    pub fn scale_band_width(&mut self, notches: f32) {
        self.band_width = (self.band_width * (1.0 + 0.1 * notches))
            .clamp(self.settings.min_band_width, self.settings.max_band_width);
    }

    // ── Editing ──────────────────────────────────────────────

    /// Apply one brush stroke unless `serial` was already applied.
    ///
    /// Returns true when the profile changed.
    pub fn apply(
        &mut self,
        object: &mut PrintObject,
        z: f32,
        action: LayerHeightEditAction,
        serial: u64,
    ) -> bool {
        if !z.is_finite() {
            tracing::warn!("Layer edit at non-finite z ignored");
            return false;
        }
        if self.last_serial.is_some_and(|last| serial <= last) {
            tracing::debug!("Layer edit for event {serial} already applied");
            return false;
        }
        self.last_serial = Some(serial);
        self.last_z = z;
        self.last_action = action;
        object.adjust_layer_height_profile(z as f64, self.strength as f64, self.band_width as f64, action)
    }

    // ── Rendering ────────────────────────────────────────────

    /// Upload the tooltip and reset textures once. Failure disables editing for good.
    fn ensure_textures(&mut self, gpu: &mut dyn GpuContext, assets: &dyn AssetLoader) -> bool {
        if let Textures::Loaded { .. } = self.textures {
            return true;
        }
        let mut load = |name: &str| -> Option<OverlayTexture> {
            let image = assets
                .load_texture(name)
                .map_err(|e| tracing::error!("Layer editing texture {name}: {e}"))
                .ok()?;
            let id = gpu
                .create_texture(&image)
                .map_err(|e| tracing::error!("Layer editing texture {name}: {e}"))
                .ok()?;
            Some(OverlayTexture {
                id,
                width: image.width as f32,
                height: image.height as f32,
            })
        };
        let tooltip = load(&self.settings.tooltip_texture);
        let reset = load(&self.settings.reset_texture);
        match (tooltip, reset) {
            (Some(tooltip), Some(reset)) => {
                self.textures = Textures::Loaded { tooltip, reset };
                true
            }
            (tooltip, reset) => {
                for t in [tooltip, reset].into_iter().flatten() {
                    gpu.delete_texture(t.id);
                }
                tracing::warn!("Layer height editing disabled: overlay textures unavailable");
                self.disable_permanently();
                false
            }
        }
    }

    /// Draw profile, tooltip, reset button and, while editing, the brush annotations
    pub fn render(&mut self, gpu: &mut dyn GpuContext, assets: &dyn AssetLoader, frame: &OverlayFrame) {
        if !self.enabled || !self.ensure_textures(gpu, assets) {
            return;
        }
        let Textures::Loaded { tooltip, reset } = self.textures else {
            return;
        };
        let bar = self.bar_rect_viewport(frame.size, frame.zoom);
        let reset_rect = self.reset_rect_viewport(frame.size, frame.zoom);

        self.render_profile(gpu, frame, &bar);

        let inv_zoom = 1.0 / frame.zoom;
        let gap = self.settings.tooltip_gap * inv_zoom;
        render_texture(
            gpu,
            frame.overlay_mvp,
            tooltip.id,
            bar.left - tooltip.width * inv_zoom - gap,
            bar.left - gap,
            reset_rect.bottom + gap,
            reset_rect.bottom + tooltip.height * inv_zoom + gap,
        );
        render_texture(
            gpu,
            frame.overlay_mvp,
            reset.id,
            reset_rect.left,
            reset_rect.right,
            reset_rect.bottom,
            reset_rect.top,
        );

        if self.state == EditState::Editing {
            self.render_annotations(gpu, frame, &bar);
        }
    }

    fn render_profile(&self, gpu: &mut dyn GpuContext, frame: &OverlayFrame, bar: &Rect) {
        let quad = quad_triangles(bar.left, bar.right, bar.bottom, bar.top);
        gpu.draw(&DrawCall::new(Primitive::Triangles, &quad, BAR_COLOR, frame.overlay_mvp).with_state(RenderState::overlay()));

        let Some(object) = frame.object else {
            return;
        };
        if object.height <= 0.0 || object.max_layer_height <= 0.0 {
            return;
        }
        let strip: Vec<f32> = object
            .profile()
            .iter()
            .flat_map(|[z, h]| {
                let y = bar.bottom + (*z / object.height) as f32 * (bar.top - bar.bottom);
                let x = bar.left + (*h / object.max_layer_height) as f32 * bar.width();
                [x, y, 0.0]
            })
            .collect();
        gpu.draw(
            &DrawCall::new(Primitive::LineStrip, &strip, PROFILE_COLOR, frame.overlay_mvp).with_state(RenderState {
                line_width: 2.0,
                ..RenderState::overlay()
            }),
        );
    }

    fn render_annotations(&self, gpu: &mut dyn GpuContext, frame: &OverlayFrame, bar: &Rect) {
        let Some(object) = frame.object else {
            return;
        };
        if object.height <= 0.0 {
            return;
        }
        // Brush band on the bar
        let to_y = |z: f32| bar.bottom + (z / object.height as f32).clamp(0.0, 1.0) * (bar.top - bar.bottom);
        let half = 0.5 * self.band_width;
        let band = quad_triangles(bar.left, bar.right, to_y(self.last_z - half), to_y(self.last_z + half));
        gpu.draw(&DrawCall::new(Primitive::Triangles, &band, BAND_COLOR, frame.overlay_mvp).with_state(RenderState::overlay()));

        // Affected region on the object itself
        if !self.shader.is_initialized() {
            return;
        }
        self.shader.start_using(gpu);
        self.shader.set_uniform(gpu, "u_z_cursor", self.last_z);
        self.shader.set_uniform(gpu, "u_z_cursor_band_width", self.band_width);
        self.shader.set_uniform(gpu, "u_object_max_z", object.height as f32);
        for triangles in frame.object_triangles {
            gpu.draw(&DrawCall::new(Primitive::Triangles, triangles, [0.9, 0.9, 0.9, 1.0], frame.scene_mvp));
        }
        self.shader.stop_using(gpu);
    }

    /// Free the GPU objects owned by the overlay
    pub fn release(&mut self, gpu: &mut dyn GpuContext) {
        if let Textures::Loaded { tooltip, reset } = std::mem::take(&mut self.textures) {
            gpu.delete_texture(tooltip.id);
            gpu.delete_texture(reset.id);
        }
        self.shader.reset(gpu);
    }
}

/// Two triangles covering `[left, right] x [bottom, top]` at z = 0
pub(crate) fn quad_triangles(left: f32, right: f32, bottom: f32, top: f32) -> [f32; 18] {
    [
        left, bottom, 0.0, right, bottom, 0.0, right, top, 0.0, //
        left, bottom, 0.0, right, top, 0.0, left, top, 0.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssets;
    use crate::gpu::SoftwareBackend;
    use canvas3d_model::PrintConfig;

    fn editing() -> LayersEditing {
        LayersEditing::new(LayersEditingSettings::default())
    }

    #[test]
    fn test_screen_rects() {
        let le = editing();
        let size = Size::new(800, 600);
        assert_eq!(le.bar_rect_screen(size), Rect::new(730.0, 0.0, 800.0, 578.0));
        assert_eq!(le.reset_rect_screen(size), Rect::new(730.0, 578.0, 800.0, 600.0));
        assert!(le.bar_rect_contains(size, 750.0, 100.0));
        assert!(!le.bar_rect_contains(size, 700.0, 100.0));
        assert!(le.reset_rect_contains(size, 750.0, 590.0));
    }

    #[test]
    fn test_viewport_rects_agree_with_screen_rects() {
        let le = editing();
        let size = Size::new(800, 600);
        let zoom = 2.5;
        let to_screen = |r: Rect| {
            Rect::new(
                r.left * zoom + size.half_width(),
                size.half_height() - r.top * zoom,
                r.right * zoom + size.half_width(),
                size.half_height() - r.bottom * zoom,
            )
        };
        let close = |a: Rect, b: Rect| {
            (a.left - b.left).abs() < 1e-3
                && (a.top - b.top).abs() < 1e-3
                && (a.right - b.right).abs() < 1e-3
                && (a.bottom - b.bottom).abs() < 1e-3
        };
        assert!(close(to_screen(le.bar_rect_viewport(size, zoom)), le.bar_rect_screen(size)));
        assert!(close(to_screen(le.reset_rect_viewport(size, zoom)), le.reset_rect_screen(size)));
    }

    #[test]
    fn test_cursor_z_relative() {
        let le = editing();
        let size = Size::new(800, 600);
        assert_eq!(le.get_cursor_z_relative(size, 750.0, 577.0), 0.0);
        assert_eq!(le.get_cursor_z_relative(size, 750.0, 0.0), 1.0);
        assert_eq!(le.get_cursor_z_relative(size, 10.0, 10.0), -1000.0);
    }

    #[test]
    fn test_collapsed_bar_maps_to_no_height() {
        let le = editing();
        let height = le.settings.reset_button_height as u32 + 1;
        let size = Size::new(800, height);
        assert_eq!(le.z_relative_at(size, 0.0), None);
        assert_eq!(le.get_cursor_z_relative(size, 750.0, 0.0), 0.0);
    }

    #[test]
    fn test_non_finite_z_is_rejected() {
        let mut le = editing();
        let config = PrintConfig::default();
        let mut object = PrintObject::new(10.0, &config);
        let before = object.layer_height_profile.clone();
        assert!(!le.apply(&mut object, f32::NAN, LayerHeightEditAction::Decrease, 1));
        assert_eq!(object.layer_height_profile, before);
        assert_eq!(le.last_serial, None);
        assert!(le.apply(&mut object, 5.0, LayerHeightEditAction::Decrease, 1));
    }

    #[test]
    fn test_band_width_clamped() {
        let mut le = editing();
        le.scale_band_width(100.0);
        assert_eq!(le.band_width, 10.0);
        le.scale_band_width(-9.0);
        assert_eq!(le.band_width, 1.5);
    }

    #[test]
    fn test_duplicate_serial_applies_once() {
        let mut le = editing();
        let mut object = PrintObject::new(20.0, &PrintConfig::default());
        assert!(le.apply(&mut object, 10.0, LayerHeightEditAction::Decrease, 7));
        let after_first = object.clone();
        assert!(!le.apply(&mut object, 10.0, LayerHeightEditAction::Decrease, 7));
        assert!(!le.apply(&mut object, 10.0, LayerHeightEditAction::Decrease, 3));
        assert_eq!(object, after_first);
        assert!(le.apply(&mut object, 10.0, LayerHeightEditAction::Decrease, 8));
    }

    #[test]
    fn test_legacy_device_disables_for_good() {
        let mut le = editing();
        let mut gpu = SoftwareBackend::new();
        assert!(!le.init(&mut gpu, &MemoryAssets::builtin(), true));
        le.set_enabled(true);
        assert!(!le.is_allowed());
        assert!(!le.is_enabled());
    }

    #[test]
    fn test_missing_texture_disables_on_first_render() {
        let mut le = editing();
        let mut gpu = SoftwareBackend::new();
        let mut assets = MemoryAssets::builtin();
        assets.remove("icons/variable_layer_height_reset.png");
        assert!(le.init(&mut gpu, &assets, false));
        le.set_enabled(true);
        assert!(le.is_enabled());

        let frame = OverlayFrame {
            size: Size::new(200, 100),
            zoom: 1.0,
            overlay_mvp: Mat4::IDENTITY,
            scene_mvp: Mat4::IDENTITY,
            object: None,
            object_triangles: &[],
        };
        le.render(&mut gpu, &assets, &frame);
        assert!(!le.is_allowed());
        assert!(!le.is_enabled());
        assert_eq!(gpu.texture_count(), 0);
    }
}
