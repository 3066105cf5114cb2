//! eframe host: owns the model, forwards egui input to the canvas and paints it from a
//! glow paint callback.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use canvas3d::{
    Buttons, CanvasEvent, CanvasSettings, FsAssets, GlCanvas3D, GlowBackend, KeyEvent, Modifiers,
    MouseButton, PointerEvent, PointerKind, Surface, WheelEvent,
};
use canvas3d_model::{GlVolume, Print, PrintConfig, PrintObject, VolumeCollection};
use eframe::egui;
use glam::Vec2;
use serde::Deserialize;

/// Events kept in the side panel log
const EVENT_LOG_LEN: usize = 12;

thread_local! {
    // GL objects belong to the UI thread; the paint callback and `update` both run there.
    static VIEWER: RefCell<Option<Viewer>> = const { RefCell::new(None) };
}

fn with_canvas<R>(f: impl FnOnce(&mut GlCanvas3D) -> R) -> Option<R> {
    VIEWER.with_borrow_mut(|viewer| viewer.as_mut()?.canvas.as_mut().map(f))
}

// ── Scene file ───────────────────────────────────────────────

/// Viewer scene: print configuration (bed shape included) and box objects
#[derive(Debug, Deserialize)]
#[serde(default)]
struct SceneFile {
    config: PrintConfig,
    objects: Vec<SceneObject>,
}

#[derive(Debug, Deserialize)]
struct SceneObject {
    origin: [f64; 3],
    size: [f32; 3],
    #[serde(default)]
    extruder: usize,
}

impl Default for SceneFile {
    fn default() -> Self {
        let object = |origin, size| SceneObject {
            origin,
            size,
            extruder: 0,
        };
        Self {
            config: PrintConfig::default(),
            objects: vec![
                object([40.0, 50.0, 0.0], [30.0, 30.0, 20.0]),
                object([100.0, 90.0, 0.0], [20.0, 40.0, 35.0]),
                object([60.0, 130.0, 0.0], [45.0, 20.0, 10.0]),
            ],
        }
    }
}

impl SceneFile {
    fn load(path: &Path) -> Option<Self> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to read scene file {}: {e}", path.display());
                return None;
            }
        };
        match serde_json::from_str::<Self>(&json) {
            Ok(scene) => {
                tracing::info!("Loaded scene from {} ({} objects)", path.display(), scene.objects.len());
                Some(scene)
            }
            Err(e) => {
                tracing::error!("Failed to parse scene JSON from {}: {e}", path.display());
                None
            }
        }
    }
}

// ── Window surface ───────────────────────────────────────────

/// [`Surface`] backed by egui repaint requests; the timer is polled by the app
struct EguiSurface {
    ctx: egui::Context,
    timer: Rc<Cell<Option<Duration>>>,
}

impl Surface for EguiSurface {
    fn request_refresh(&mut self) {
        self.ctx.request_repaint();
    }

    fn start_timer(&mut self, interval: Duration) {
        self.timer.set(Some(interval));
        self.ctx.request_repaint_after(interval);
    }

    fn stop_timer(&mut self) {
        self.timer.set(None);
    }

    fn is_shown_on_screen(&self) -> bool {
        !self.ctx.input(|i| i.viewport().minimized.unwrap_or(false))
    }
}

// ── Viewer state (UI thread) ─────────────────────────────────

struct Viewer {
    settings: CanvasSettings,
    volumes: Rc<RefCell<VolumeCollection>>,
    config: Rc<RefCell<PrintConfig>>,
    print: Rc<RefCell<Print>>,
    /// Created on the first paint, once the GL context is reachable
    canvas: Option<GlCanvas3D>,
    origin: Option<Rc<Cell<[i32; 2]>>>,
    events: Rc<RefCell<Vec<CanvasEvent>>>,
    timer: Rc<Cell<Option<Duration>>>,
    backend_failed: bool,
}

impl Viewer {
    fn new(settings: CanvasSettings, scene: SceneFile) -> Self {
        let mut volumes = VolumeCollection::default();
        let mut objects = Vec::with_capacity(scene.objects.len());
        for (object_id, object) in scene.objects.iter().enumerate() {
            let group = object_id as u32 * 1_000_000;
            let mut volume = GlVolume::cuboid(object.origin, object.size, [1.0, 1.0, 0.0, 1.0])
                .with_groups(group, group);
            volume.extruder_id = object.extruder;
            volumes.volumes.push(volume);
            objects.push(PrintObject::new(object.size[2] as f64, &scene.config));
        }
        volumes.update_colors_by_extruder(&scene.config);

        Self {
            settings,
            volumes: Rc::new(RefCell::new(volumes)),
            config: Rc::new(RefCell::new(scene.config)),
            print: Rc::new(RefCell::new(Print::new(objects))),
            canvas: None,
            origin: None,
            events: Rc::new(RefCell::new(Vec::new())),
            timer: Rc::new(Cell::new(None)),
            backend_failed: false,
        }
    }

    /// Build the canvas over the host's GL context
    fn attach(&mut self, gl: Arc<glow::Context>, ctx: egui::Context) {
        if self.canvas.is_some() || self.backend_failed {
            return;
        }
        let backend = match GlowBackend::new(gl) {
            Ok(backend) => backend,
            Err(e) => {
                tracing::error!("Failed to create the OpenGL canvas backend: {e}");
                self.backend_failed = true;
                return;
            }
        };
        self.origin = Some(backend.origin_handle());

        let surface = EguiSurface {
            ctx,
            timer: self.timer.clone(),
        };
        let mut canvas = GlCanvas3D::new(
            Box::new(backend),
            Box::new(surface),
            Box::new(FsAssets::bundled()),
            self.settings.clone(),
        );
        canvas.set_volumes(&self.volumes);
        canvas.set_config(&self.config);
        canvas.set_print(&self.print);
        let bed_shape = self.config.borrow().bed_shape.clone();
        if bed_shape.len() >= 3 {
            canvas.set_bed_shape(&bed_shape);
        } else {
            canvas.set_auto_bed_shape();
        }
        canvas.enable_picking(true);
        canvas.enable_moving(true);
        canvas.enable_shader(true);
        canvas.allow_multisample(true);

        let sink = self.events.clone();
        canvas.events_mut().subscribe(move |e| sink.borrow_mut().push(e.clone()));
        self.canvas = Some(canvas);
    }
}

// ── Input translation ────────────────────────────────────────

enum Inbound {
    Pointer(PointerKind, Vec2),
    Wheel(WheelEvent),
    Key(KeyEvent),
}

fn modifiers_of(m: egui::Modifiers) -> Modifiers {
    Modifiers {
        shift: m.shift,
        ctrl: m.ctrl || m.command,
        alt: m.alt,
    }
}

fn button_of(button: egui::PointerButton) -> Option<MouseButton> {
    match button {
        egui::PointerButton::Primary => Some(MouseButton::Left),
        egui::PointerButton::Secondary => Some(MouseButton::Right),
        egui::PointerButton::Middle => Some(MouseButton::Middle),
        _ => None,
    }
}

fn buttons_of(pointer: &egui::PointerState) -> Buttons {
    Buttons {
        left: pointer.button_down(egui::PointerButton::Primary),
        right: pointer.button_down(egui::PointerButton::Secondary),
        middle: pointer.button_down(egui::PointerButton::Middle),
    }
}

/// Wheel notches of one egui scroll event
fn wheel_notches(unit: egui::MouseWheelUnit, delta: f32) -> f32 {
    match unit {
        egui::MouseWheelUnit::Line => delta,
        egui::MouseWheelUnit::Point => delta / 50.0,
        egui::MouseWheelUnit::Page => delta * 3.0,
    }
}

// ── App ──────────────────────────────────────────────────────

/// Viewer window: canvas in the center, view controls on the right
pub struct ViewerApp {
    serial: u64,
    last_tick: Instant,
    /// A press started inside the canvas and has not been released yet
    captured: bool,
    hovered: bool,
    layers_editing: bool,
    picking: bool,
    moving: bool,
    shading: bool,
    cutting_z: f32,
    log: Vec<String>,
}

impl ViewerApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, scene: Option<PathBuf>) -> Self {
        let scene = scene
            .as_deref()
            .and_then(SceneFile::load)
            .unwrap_or_default();
        let settings = CanvasSettings::load();
        VIEWER.with_borrow_mut(|viewer| *viewer = Some(Viewer::new(settings, scene)));

        Self {
            serial: 0,
            last_tick: Instant::now(),
            captured: false,
            hovered: false,
            layers_editing: false,
            picking: true,
            moving: true,
            shading: true,
            cutting_z: -1.0,
            log: Vec::new(),
        }
    }

    fn next_serial(&mut self) -> u64 {
        self.serial += 1;
        self.serial
    }

    fn drain_canvas_events(&mut self) {
        let events = VIEWER.with_borrow(|viewer| {
            viewer
                .as_ref()
                .map(|v| std::mem::take(&mut *v.events.borrow_mut()))
                .unwrap_or_default()
        });
        for event in events {
            if event == CanvasEvent::ViewportChanged {
                continue;
            }
            tracing::debug!("Canvas event: {event:?}");
            self.log.push(format!("{event:?}"));
        }
        if self.log.len() > EVENT_LOG_LEN {
            self.log.drain(..self.log.len() - EVENT_LOG_LEN);
        }
    }

    fn tick_timer(&mut self, ctx: &egui::Context) {
        let interval = VIEWER.with_borrow(|viewer| viewer.as_ref().and_then(|v| v.timer.get()));
        let Some(interval) = interval else {
            return;
        };
        if self.last_tick.elapsed() >= interval {
            self.last_tick = Instant::now();
            let serial = self.next_serial();
            with_canvas(|canvas| canvas.on_timer(serial));
        }
        ctx.request_repaint_after(interval);
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("View");
        ui.horizontal_wrapped(|ui| {
            for name in ["iso", "top", "bottom", "front", "rear", "left", "right"] {
                if ui.button(name).clicked() {
                    with_canvas(|canvas| canvas.select_view(name));
                }
            }
        });
        ui.horizontal(|ui| {
            if ui.button("Zoom to bed").clicked() {
                with_canvas(GlCanvas3D::zoom_to_bed);
            }
            if ui.button("Zoom to objects").clicked() {
                with_canvas(GlCanvas3D::zoom_to_volumes);
            }
        });

        ui.separator();
        ui.heading("Canvas");
        if ui.checkbox(&mut self.picking, "Picking").changed() {
            let on = self.picking;
            with_canvas(|canvas| canvas.enable_picking(on));
        }
        if ui.checkbox(&mut self.moving, "Move objects").changed() {
            let on = self.moving;
            with_canvas(|canvas| canvas.enable_moving(on));
        }
        if ui.checkbox(&mut self.shading, "Shading").changed() {
            let on = self.shading;
            with_canvas(|canvas| canvas.enable_shader(on));
        }
        let allowed = with_canvas(|canvas| canvas.is_layers_editing_allowed()).unwrap_or(false);
        ui.add_enabled_ui(allowed, |ui| {
            if ui.checkbox(&mut self.layers_editing, "Layer height editing").changed() {
                let on = self.layers_editing;
                with_canvas(|canvas| canvas.enable_layers_editing(on));
            }
        });
        let max_z = with_canvas(|canvas| canvas.volumes_bounding_box().max[2] as f32).unwrap_or(0.0);
        if ui
            .add(egui::Slider::new(&mut self.cutting_z, -1.0..=max_z.max(1.0)).text("Cut z"))
            .changed()
        {
            let z = self.cutting_z;
            with_canvas(|canvas| canvas.set_cutting_plane(z, &[]));
        }

        ui.separator();
        let status = with_canvas(|canvas| {
            let selected = canvas
                .selected_object_id()
                .map_or_else(|| "none".to_owned(), |id| id.to_string());
            format!(
                "zoom {:.2}\nhover {:?}\nselected object {selected}\nband width {:.2}",
                canvas.get_camera_zoom(),
                canvas.hover_volume_id(),
                canvas.layers_editing().band_width,
            )
        });
        ui.label(status.unwrap_or_else(|| "waiting for OpenGL".to_owned()));

        ui.separator();
        ui.heading("Events");
        for line in self.log.iter().rev() {
            ui.monospace(line);
        }
    }

    fn canvas_panel(&mut self, ui: &mut egui::Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
        let ppp = ui.ctx().pixels_per_point();
        let to_canvas = |pos: egui::Pos2| {
            let p = (pos - rect.min) * ppp;
            Vec2::new(p.x, p.y)
        };
        let width = (rect.width() * ppp).round() as u32;
        let height = (rect.height() * ppp).round() as u32;

        let inbound = ui.input(|i| self.collect_input(i, rect, &to_canvas));
        let (buttons, modifiers) = ui.input(|i| (buttons_of(&i.pointer), modifiers_of(i.modifiers)));
        if response.hovered() && buttons.any() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::Grabbing);
        }

        let mut pointer_events = Vec::new();
        for input in &inbound {
            if let Inbound::Pointer(kind, position) = input {
                let serial = self.next_serial();
                let mut buttons = buttons;
                match kind {
                    PointerKind::Down(b) | PointerKind::DoubleClick(b) => buttons.set(*b, true),
                    PointerKind::Up(b) => buttons.set(*b, false),
                    _ => {}
                }
                pointer_events.push(
                    PointerEvent::new(serial, *kind, *position)
                        .with_buttons(buttons)
                        .with_modifiers(modifiers),
                );
            }
        }

        with_canvas(|canvas| {
            let size = canvas.get_canvas_size();
            if size.width != width || size.height != height {
                canvas.on_size(width, height);
            }
            let mut pointer_events = pointer_events.iter();
            for input in inbound {
                match input {
                    Inbound::Pointer(..) => {
                        if let Some(event) = pointer_events.next() {
                            canvas.on_mouse(event);
                        }
                    }
                    Inbound::Wheel(wheel) => canvas.on_mouse_wheel(wheel),
                    Inbound::Key(key) => canvas.on_char(key),
                }
            }
            canvas.on_idle();
        });

        let ctx = ui.ctx().clone();
        let callback = egui::PaintCallback {
            rect,
            callback: Arc::new(egui_glow::CallbackFn::new(move |info, painter| {
                let gl = painter.gl().clone();
                let viewport = info.viewport_in_pixels();
                VIEWER.with_borrow_mut(|viewer| {
                    let Some(viewer) = viewer.as_mut() else {
                        return;
                    };
                    viewer.attach(gl, ctx.clone());
                    if let Some(origin) = &viewer.origin {
                        origin.set([viewport.left_px, viewport.from_bottom_px]);
                    }
                    if let Some(canvas) = viewer.canvas.as_mut() {
                        canvas.on_paint();
                    }
                });
            })),
        };
        ui.painter().add(callback);
    }

    /// Translate this frame's egui events into canvas input
    fn collect_input(
        &mut self,
        i: &egui::InputState,
        rect: egui::Rect,
        to_canvas: &impl Fn(egui::Pos2) -> Vec2,
    ) -> Vec<Inbound> {
        let mut inbound = Vec::new();
        for event in &i.events {
            match event {
                egui::Event::PointerMoved(pos) => {
                    let inside = rect.contains(*pos);
                    if inside || self.captured {
                        inbound.push(Inbound::Pointer(PointerKind::Move, to_canvas(*pos)));
                    } else if self.hovered {
                        inbound.push(Inbound::Pointer(PointerKind::Leave, to_canvas(*pos)));
                    }
                    self.hovered = inside;
                }
                egui::Event::PointerButton {
                    pos,
                    button,
                    pressed,
                    ..
                } => {
                    let Some(button) = button_of(*button) else {
                        continue;
                    };
                    if *pressed && rect.contains(*pos) {
                        self.captured = true;
                        inbound.push(Inbound::Pointer(PointerKind::Down(button), to_canvas(*pos)));
                        if i.pointer.button_double_clicked(egui::PointerButton::Primary)
                            && button == MouseButton::Left
                        {
                            inbound.push(Inbound::Pointer(PointerKind::DoubleClick(button), to_canvas(*pos)));
                        }
                    } else if !*pressed && self.captured {
                        self.captured = false;
                        inbound.push(Inbound::Pointer(PointerKind::Up(button), to_canvas(*pos)));
                    }
                }
                egui::Event::PointerGone => {
                    if self.hovered {
                        self.hovered = false;
                        inbound.push(Inbound::Pointer(PointerKind::Leave, Vec2::ZERO));
                    }
                }
                egui::Event::MouseWheel {
                    unit,
                    delta,
                    modifiers,
                } if self.hovered => {
                    let Some(pos) = i.pointer.hover_pos() else {
                        continue;
                    };
                    let mut wheel = WheelEvent::notches(to_canvas(pos), wheel_notches(*unit, delta.y));
                    wheel.modifiers = modifiers_of(*modifiers);
                    inbound.push(Inbound::Wheel(wheel));
                }
                egui::Event::Text(text) if self.hovered => {
                    let modifiers = modifiers_of(i.modifiers);
                    for ch in text.chars() {
                        let mut key = KeyEvent::new(ch);
                        key.modifiers = modifiers;
                        inbound.push(Inbound::Key(key));
                    }
                }
                _ => {}
            }
        }
        inbound
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_canvas_events();

        egui::SidePanel::right("canvas_controls")
            .default_width(240.0)
            .width_range(180.0..=400.0)
            .resizable(true)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.side_panel(ui));
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.canvas_panel(ui));

        self.tick_timer(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&glow::Context>) {
        // GL is still current here; dropping the canvas releases its programs and textures.
        VIEWER.with_borrow_mut(|viewer| viewer.take());
    }
}
