//! Frame pipeline: picking pass, background, bed, axes, volumes, cutting plane, overlay
//! textures and the layer editing overlay, in that order.

use glam::{Mat4, Vec2};

use super::layers_editing::OverlayFrame;
use super::picking::{decode_pixel, encode_id, window_pixel, FrameState};
use super::{render_texture, GlCanvas3D, InitOptions, OverlayImage, Size};
use crate::gpu::{DrawCall, GpuContext, Primitive, RenderState, TextureId};

/// Horizontal bands used to approximate the background gradient
const BACKGROUND_BANDS: usize = 16;

impl GlCanvas3D {
    /// Draw one frame. Skipped while hidden or without a GPU context.
    pub fn render(&mut self) {
        if !self.surface.is_shown_on_screen() {
            return;
        }
        if !self.set_current() {
            return;
        }
        if !self.is_initialized() && !self.init(InitOptions::default()) {
            return;
        }
        if self.size.is_empty() {
            return;
        }
        if self.force_zoom_to_bed_enabled && !self.bed.is_empty() {
            self.zoom_to_bed();
            self.force_zoom_to_bed_enabled = false;
        }

        let size = self.size;
        self.gpu.set_viewport(size);
        let view_proj = self.view_projection();

        let hover = self.picking_pass(view_proj);
        self.render_background();
        self.bed.render(self.gpu.as_mut(), view_proj);
        self.axes
            .render(self.gpu.as_mut(), view_proj, self.settings.axes.line_width);
        self.render_objects(view_proj);
        let volumes_bb = self.volumes_bounding_box();
        self.cutting_plane.render(
            self.gpu.as_mut(),
            view_proj,
            &volumes_bb,
            &self.settings.cutting_plane,
        );
        let overlay_mvp = self.camera.overlay_projection(size);
        self.render_warning_texture(overlay_mvp);
        self.render_legend_texture(overlay_mvp);
        self.render_layer_editing_overlay(view_proj, overlay_mvp);

        self.frame = FrameState {
            hover_volume_id: hover,
            view_projection: view_proj,
            size,
            rendered: true,
        };
        self.dirty = false;
    }

    /// Draw every volume in its index color and read back the one under the pointer.
    ///
    /// Updates the hover flags of the collection.
    fn picking_pass(&mut self, view_proj: Mat4) -> Option<usize> {
        if self.picking_enabled && self.mouse.dragging {
            return self.frame.hover_volume_id;
        }
        let volumes = self.volumes_rc()?;
        let mut volumes = volumes.borrow_mut();
        for v in &mut volumes.volumes {
            v.hover = false;
        }
        if !self.picking_enabled {
            return None;
        }
        let pixel = self.mouse.position.and_then(|p| window_pixel(p, self.size))?;

        self.gpu.clear(Some([0.0, 0.0, 0.0, 1.0]), true);
        let state = RenderState {
            blend: false,
            multisample: false,
            ..RenderState::default()
        };
        for (idx, volume) in volumes.volumes.iter().enumerate() {
            let triangles = volume.world_triangles();
            self.gpu
                .draw(&DrawCall::new(Primitive::Triangles, &triangles, encode_id(idx), view_proj).with_state(state));
        }
        let hover = decode_pixel(self.gpu.read_pixel(pixel.0, pixel.1)).filter(|&i| i < volumes.len());
        if let Some(idx) = hover {
            for i in volumes.select_group(idx) {
                volumes.volumes[i].hover = true;
            }
        }
        hover
    }

    fn render_background(&mut self) {
        let bg = &self.settings.background;
        self.gpu.clear(Some(bg.bottom_color), true);
        let band_height = 2.0 / BACKGROUND_BANDS as f32;
        for i in 0..BACKGROUND_BANDS {
            let t = (i as f32 + 0.5) / BACKGROUND_BANDS as f32;
            let color = std::array::from_fn(|c| bg.bottom_color[c] + (bg.top_color[c] - bg.bottom_color[c]) * t);
            let bottom = -1.0 + i as f32 * band_height;
            let top = bottom + band_height;
            let quad = super::quad_triangles(-1.0, 1.0, bottom, top);
            self.gpu.draw(
                &DrawCall::new(Primitive::Triangles, &quad, color, Mat4::IDENTITY).with_state(RenderState {
                    depth_test: false,
                    depth_write: false,
                    ..RenderState::default()
                }),
            );
        }
    }

    fn render_objects(&mut self, view_proj: Mat4) {
        let Some(volumes) = self.volumes_rc() else {
            return;
        };
        let volumes = volumes.borrow();
        if volumes.is_empty() {
            return;
        }
        let caps = self.capabilities.unwrap_or_default();
        let lit = caps.shader_lit && self.shader_enabled;
        let state = RenderState {
            multisample: caps.multisample && self.multisample_allowed,
            ..RenderState::default()
        };
        if lit {
            self.shader.start_using(self.gpu.as_mut());
        }
        for volume in &volumes.volumes {
            let triangles = volume.world_triangles();
            self.gpu.draw(
                &DrawCall::new(Primitive::Triangles, &triangles, volume.render_color(), view_proj).with_state(state),
            );
        }
        if lit {
            self.shader.stop_using(self.gpu.as_mut());
        }
    }

    fn render_warning_texture(&mut self, overlay_mvp: Mat4) {
        if !self.warning_texture_enabled {
            return;
        }
        let size = self.size;
        let inv_zoom = 1.0 / self.camera.zoom();
        let Some((texture, w, h)) = upload(self.gpu.as_mut(), self.warning_texture.as_mut()) else {
            return;
        };
        let left = -0.5 * w * inv_zoom;
        let bottom = -size.half_height() * inv_zoom;
        render_texture(
            self.gpu.as_mut(),
            overlay_mvp,
            texture,
            left,
            left + w * inv_zoom,
            bottom,
            bottom + h * inv_zoom,
        );
    }

    fn render_legend_texture(&mut self, overlay_mvp: Mat4) {
        if !self.legend_texture_enabled {
            return;
        }
        let size = self.size;
        let inv_zoom = 1.0 / self.camera.zoom();
        let Some((texture, w, h)) = upload(self.gpu.as_mut(), self.legend_texture.as_mut()) else {
            return;
        };
        let left = -size.half_width() * inv_zoom;
        let top = size.half_height() * inv_zoom;
        render_texture(
            self.gpu.as_mut(),
            overlay_mvp,
            texture,
            left,
            left + w * inv_zoom,
            top - h * inv_zoom,
            top,
        );
    }

    fn render_layer_editing_overlay(&mut self, view_proj: Mat4, overlay_mvp: Mat4) {
        if !self.layers_editing.is_enabled() {
            return;
        }
        let object_id = match self.layers_editing.state {
            super::EditState::Editing => self.layers_editing.last_object_id,
            _ => self.selected_object_id(),
        };
        let object_triangles: Vec<Vec<f32>> = match (object_id, self.volumes_rc()) {
            (Some(id), Some(volumes)) => volumes
                .borrow()
                .volumes
                .iter()
                .filter(|v| v.object_id() == Some(id))
                .map(|v| v.world_triangles())
                .collect(),
            _ => Vec::new(),
        };
        let print = self.print_rc();
        let print = print.as_ref().map(|p| p.borrow());
        let object = match (object_id, print.as_ref()) {
            (Some(id), Some(print)) => print.get_object(id),
            _ => None,
        };
        let frame = OverlayFrame {
            size: self.size,
            zoom: self.camera.zoom(),
            overlay_mvp,
            scene_mvp: view_proj,
            object,
            object_triangles: &object_triangles,
        };
        self.layers_editing
            .render(self.gpu.as_mut(), self.assets.as_ref(), &frame);
    }

    /// Pixel under `position` in the last frame's color buffer
    pub fn read_pixel_at(&mut self, position: Vec2) -> Option<[u8; 4]> {
        let (x, y) = window_pixel(position, self.size)?;
        if !self.set_current() {
            return None;
        }
        Some(self.gpu.read_pixel(x, y))
    }

    /// Resize the GPU viewport to the canvas
    pub(crate) fn resize(&mut self, size: Size) {
        if self.set_current() {
            self.gpu.set_viewport(size);
        }
    }
}

/// Texture id and pixel size of an overlay image, uploading it on first use
fn upload(gpu: &mut dyn GpuContext, image: Option<&mut OverlayImage>) -> Option<(TextureId, f32, f32)> {
    let image = image?;
    let texture = match image.texture {
        Some(texture) => texture,
        None => match gpu.create_texture(&image.image) {
            Ok(texture) => {
                image.texture = Some(texture);
                texture
            }
            Err(e) => {
                tracing::error!("Overlay texture upload failed: {e}");
                return None;
            }
        },
    };
    Some((texture, image.image.width as f32, image.image.height as f32))
}
