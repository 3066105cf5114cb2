//! Handlers for the events delivered by the window host.

use canvas3d_model::{LayerHeightEditAction, Pointf};
use glam::{Vec2, Vec3};

use super::layers_editing::EditState;
use super::picking::Ray;
use super::{GlCanvas3D, Size};
use crate::input::{KeyEvent, MouseButton, PointerEvent, PointerKind, WheelEvent};
use crate::notify::CanvasEvent;

impl GlCanvas3D {
    pub fn on_size(&mut self, width: u32, height: u32) {
        self.size = Size::new(width, height);
        self.dirty = true;
    }

    pub fn on_idle(&mut self) {
        if !self.dirty {
            return;
        }
        self.resize(self.size);
        self.refresh_if_shown_on_screen();
    }

    pub fn on_paint(&mut self) {
        self.render();
    }

    pub fn on_char(&mut self, key: KeyEvent) {
        if key.modifiers.any() {
            return;
        }
        let view = match key.ch {
            '0' => "iso",
            '1' => "top",
            '2' => "bottom",
            '3' => "front",
            '4' => "rear",
            '5' => "left",
            '6' => "right",
            'b' | 'B' => return self.zoom_to_bed(),
            'z' | 'Z' => return self.zoom_to_volumes(),
            _ => return,
        };
        self.select_view(view);
    }

    pub fn on_mouse_wheel(&mut self, wheel: WheelEvent) {
        if wheel.delta == 0.0 {
            return;
        }
        let notches = wheel.rotation / wheel.delta;

        if self.layers_editing.is_enabled()
            && self.selected_object_id().is_some()
            && self
                .layers_editing
                .bar_rect_contains(self.size, wheel.position.x, wheel.position.y)
        {
            self.layers_editing.scale_band_width(notches);
            self.schedule_refresh();
            return;
        }

        let cam = &self.settings.camera;
        let step = notches.clamp(-cam.wheel_max_notches, cam.wheel_max_notches) * cam.wheel_step;
        let mut zoom = self.camera.zoom() / (1.0 - step);
        // keep the scene from shrinking to nothing
        if let Some(min) = self.zoom_to_bounding_box_factor(&self.max_bounding_box()) {
            zoom = zoom.max(min * self.settings.camera.min_zoom_ratio);
        }
        if self.camera.set_zoom(zoom) {
            self.dirty = true;
            self.emit(CanvasEvent::ViewportChanged);
            self.refresh_if_shown_on_screen();
        }
    }

    /// Timer tick: repeat the layer edit and flush a pending refresh
    pub fn on_timer(&mut self, serial: u64) {
        if self.layers_editing.state == EditState::Editing {
            let action = self.layers_editing.last_action;
            let z = self.layers_editing.last_z;
            self.apply_layer_edit(z, action, serial);
        }
        if self.refresh_pending {
            self.refresh_pending = false;
            self.refresh_if_shown_on_screen();
        }
        if self.layers_editing.state != EditState::Editing {
            self.stop_timer();
        }
    }

    pub fn on_mouse(&mut self, event: &PointerEvent) {
        match event.kind {
            PointerKind::Leave => {
                // drop the hover highlight
                self.mouse.position = None;
                if !self.mouse.dragging {
                    self.schedule_refresh();
                }
            }
            PointerKind::DoubleClick(MouseButton::Left) => {
                self.mouse.position = Some(event.position);
                if self.frame.hover_volume_id.is_some() {
                    self.emit(CanvasEvent::DoubleClick);
                }
            }
            PointerKind::DoubleClick(_) => {}
            PointerKind::Down(button) => {
                self.mouse.position = Some(event.position);
                self.on_pointer_down(event, button);
            }
            PointerKind::Move if event.buttons.any() => {
                self.mouse.position = Some(event.position);
                self.on_pointer_drag(event);
            }
            PointerKind::Move => {
                self.mouse.position = Some(event.position);
                if self.picking_enabled {
                    self.schedule_refresh();
                }
            }
            PointerKind::Up(_) => {
                self.mouse.position = Some(event.position);
                self.on_pointer_up();
            }
        }
    }

    fn on_pointer_down(&mut self, event: &PointerEvent, button: MouseButton) {
        let pos = event.position;
        self.mouse.drag.start_position_2d = Some(pos);

        if self.layers_editing.is_enabled() {
            if let Some(object_id) = self.selected_object_id() {
                if self.layers_editing.bar_rect_contains(self.size, pos.x, pos.y) {
                    self.layers_editing.state = EditState::Editing;
                    self.layers_editing.last_object_id = Some(object_id);
                    let action =
                        LayerHeightEditAction::from_buttons(event.buttons.right, event.modifiers.shift);
                    self.apply_layer_edit_at(pos.y, action, event.serial);
                    self.start_timer();
                    return;
                }
                if self.layers_editing.reset_rect_contains(self.size, pos.x, pos.y) {
                    if button == MouseButton::Left {
                        self.reset_layer_height_profile(object_id);
                    }
                    return;
                }
            }
        }

        // The hover state and depth buffer must match the pointer position.
        if self.dirty || !self.frame.is_current(&self.view_projection(), self.size) {
            self.render();
        }
        let hover = self.frame.hover_volume_id;

        if self.picking_enabled && (hover.is_some() || !self.layers_editing.is_enabled()) {
            self.deselect_volumes();
            if let Some(idx) = hover {
                self.select_volume(idx);
            }
            let object_id = self.selected_object_id();
            self.emit(CanvasEvent::SelectionChanged { object_id });
        }

        let Some(idx) = hover else {
            return;
        };
        match button {
            MouseButton::Left if self.moving_enabled => self.start_volume_drag(idx, pos),
            MouseButton::Right => {
                let hovered = self
                    .volumes_rc()
                    .is_some_and(|v| v.borrow().volumes.get(idx).is_some_and(|v| v.hover));
                if hovered {
                    self.emit(CanvasEvent::RightClick { position: pos });
                }
            }
            _ => {}
        }
    }

    /// Begin moving `idx` if the grab point really lies on it
    fn start_volume_drag(&mut self, idx: usize, pos: Vec2) {
        let Some(grab) = self.mouse_to_3d(pos, None) else {
            return;
        };
        let Some(volumes) = self.volumes_rc() else {
            return;
        };
        let bbox = match volumes.borrow().volumes.get(idx) {
            Some(v) => v.transformed_bounding_box().offset(1.0),
            None => return,
        };
        if !bbox.contains([grab.x as f64, grab.y as f64, grab.z as f64]) {
            tracing::debug!("Grab point {grab} outside volume {idx}, no drag");
            return;
        }
        let [cx, cy, cz] = bbox.center();
        let center = Vec3::new(cx as f32, cy as f32, cz as f32);
        self.mouse.drag.volume_idx = Some(idx);
        self.mouse.drag.start_position_3d = Some(grab);
        self.mouse.drag.volume_center_offset = grab - center;
    }

    fn on_pointer_drag(&mut self, event: &PointerEvent) {
        let pos = event.position;
        if self.layers_editing.is_enabled() && self.layers_editing.state == EditState::Editing {
            let action = LayerHeightEditAction::from_buttons(event.buttons.right, event.modifiers.shift);
            self.apply_layer_edit_at(pos.y, action, event.serial);
            return;
        }

        self.mouse.dragging = true;
        if event.buttons.left {
            if self.mouse.drag.volume_idx.is_some() {
                self.move_dragged_volumes(pos);
            } else {
                self.orbit(pos);
            }
        } else if event.buttons.right || event.buttons.middle {
            self.pan(pos);
        }
        self.mouse.drag.start_position_2d = Some(pos);
    }

    fn move_dragged_volumes(&mut self, pos: Vec2) {
        let (Some(idx), Some(start)) = (self.mouse.drag.volume_idx, self.mouse.drag.start_position_3d) else {
            return;
        };
        let size = self.size;
        let view_proj = self.view_projection();
        let Some(ray) = Ray::from_window(&view_proj, size, pos.x, size.height as f32 - pos.y) else {
            return;
        };
        let Some(mut current) = ray.intersect_plane_z(start.z) else {
            return;
        };

        // keep the volume center on the bed
        let offset = self.mouse.drag.volume_center_offset;
        let center = current - offset;
        let center_2d = Pointf::new(center.x as f64, center.y as f64);
        if !self.bed.contains(center_2d) {
            let p = self.bed.point_projection(center_2d);
            current = Vec3::new(p.x as f32, p.y as f32, center.z) + offset;
        }

        let delta = [(current.x - start.x) as f64, (current.y - start.y) as f64];
        if let Some(volumes) = self.volumes_rc() {
            let mut volumes = volumes.borrow_mut();
            for i in volumes.drag_group(idx) {
                let origin = &mut volumes.volumes[i].origin;
                origin[0] += delta[0];
                origin[1] += delta[1];
            }
        }
        self.mouse.drag.start_position_3d = Some(current);
        self.schedule_refresh();
    }

    fn orbit(&mut self, pos: Vec2) {
        let Some(start) = self.mouse.drag.start_position_2d else {
            return;
        };
        let d = pos - start;
        self.camera.rotate(d.x, d.y, self.settings.camera.trackball_size);
        self.emit(CanvasEvent::ViewportChanged);
        self.schedule_refresh();
    }

    fn pan(&mut self, pos: Vec2) {
        let Some(start) = self.mouse.drag.start_position_2d else {
            return;
        };
        let (Some(from), Some(to)) = (self.mouse_to_3d(start, Some(0.0)), self.mouse_to_3d(pos, Some(0.0))) else {
            return;
        };
        self.camera.target += from - to;
        self.emit(CanvasEvent::ViewportChanged);
        self.schedule_refresh();
    }

    fn on_pointer_up(&mut self) {
        if self.layers_editing.state == EditState::Editing {
            self.layers_editing.state = EditState::Completed;
            self.stop_timer();
            if self.layers_editing.last_object_id.is_some() {
                self.emit(CanvasEvent::ModelUpdated);
            }
        } else if self.mouse.dragging {
            if let Some(idx) = self.mouse.drag.volume_idx {
                let volume_idxs = self
                    .volumes_rc()
                    .map(|v| v.borrow().drag_group(idx))
                    .unwrap_or_default();
                self.emit(CanvasEvent::VolumeMoved { volume_idxs });
            }
        }
        self.mouse.reset_drag();
        self.schedule_refresh();
    }

    // ── Layer height editing ─────────────────────────────────

    fn apply_layer_edit_at(&mut self, y: f32, action: LayerHeightEditAction, serial: u64) {
        let Some(height) = self.edited_object_height() else {
            return;
        };
        let Some(relative) = self.layers_editing.z_relative_at(self.size, y) else {
            return;
        };
        let z = height * relative.clamp(0.0, 1.0);
        self.apply_layer_edit(z, action, serial);
    }

    fn apply_layer_edit(&mut self, z: f32, action: LayerHeightEditAction, serial: u64) {
        let (Some(object_id), Some(print)) = (self.layers_editing.last_object_id, self.print_rc()) else {
            return;
        };
        let changed = {
            let mut print = print.borrow_mut();
            let Some(object) = print.get_object_mut(object_id) else {
                tracing::debug!("No print object {object_id} to edit");
                return;
            };
            self.layers_editing.apply(object, z, action, serial)
        };
        if changed {
            self.schedule_refresh();
        }
    }

    fn edited_object_height(&self) -> Option<f32> {
        let object_id = self.layers_editing.last_object_id?;
        let print = self.print_rc()?;
        let height = print.borrow().get_object(object_id).map(|o| o.height as f32);
        height
    }

    fn reset_layer_height_profile(&mut self, object_id: usize) {
        let Some(print) = self.print_rc() else {
            return;
        };
        let reset = match print.borrow_mut().get_object_mut(object_id) {
            Some(object) => {
                object.reset_layer_height_profile();
                true
            }
            None => false,
        };
        if reset {
            self.emit(CanvasEvent::ModelUpdated);
            self.schedule_refresh();
        }
    }
}
