//! Headless harness: a canvas wired to the software GPU backend, a recording surface and
//! model objects owned by the harness.

use std::cell::RefCell;
use std::rc::Rc;

use canvas3d_model::{GlVolume, Pointf, Print, PrintConfig, PrintObject, VolumeCollection};
use glam::{Vec2, Vec3};

use crate::assets::{AssetLoader, MemoryAssets};
use crate::gpu::SoftwareBackend;
use crate::input::{Buttons, KeyEvent, Modifiers, MouseButton, PointerEvent, PointerKind, WheelEvent};
use crate::notify::CanvasEvent;
use crate::settings::CanvasSettings;
use crate::surface::RecordingSurface;
use crate::viewport::{project, GlCanvas3D};

const VOLUME_COLOR: [f32; 4] = [1.0, 1.0, 0.0, 1.0];

/// Headless canvas with its model, for driving whole interactions in tests
pub struct Harness {
    pub canvas: GlCanvas3D,
    pub gpu: SoftwareBackend,
    pub surface: RecordingSurface,
    pub volumes: Rc<RefCell<VolumeCollection>>,
    pub config: Rc<RefCell<PrintConfig>>,
    pub print: Rc<RefCell<Print>>,
    events: Rc<RefCell<Vec<CanvasEvent>>>,
    serial: u64,
}

impl Harness {
    /// A `width` x `height` canvas with picking, moving and shading enabled
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_backend(SoftwareBackend::new(), MemoryAssets::builtin(), width, height)
    }

    pub fn with_backend(gpu: SoftwareBackend, assets: impl AssetLoader + 'static, width: u32, height: u32) -> Self {
        let surface = RecordingSurface::new();
        let mut canvas = GlCanvas3D::new(
            Box::new(gpu.clone()),
            Box::new(surface.clone()),
            Box::new(assets),
            CanvasSettings::default(),
        );
        let volumes = Rc::new(RefCell::new(VolumeCollection::default()));
        let config = Rc::new(RefCell::new(PrintConfig::default()));
        let print = Rc::new(RefCell::new(Print::default()));
        canvas.set_volumes(&volumes);
        canvas.set_config(&config);
        canvas.set_print(&print);
        canvas.enable_picking(true);
        canvas.enable_moving(true);
        canvas.enable_shader(true);
        canvas.on_size(width, height);

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        canvas.events_mut().subscribe(move |e| sink.borrow_mut().push(e.clone()));

        Self {
            canvas,
            gpu,
            surface,
            volumes,
            config,
            print,
            events,
            serial: 0,
        }
    }

    // ── Scene ────────────────────────────────────────────────

    pub fn set_square_bed(&mut self, size: f64) {
        self.canvas.set_bed_shape(&[
            Pointf::new(0.0, 0.0),
            Pointf::new(size, 0.0),
            Pointf::new(size, size),
            Pointf::new(0.0, size),
        ]);
    }

    /// Add a cuboid as a new object with its own print object; returns the volume index
    pub fn add_cuboid(&mut self, origin: [f64; 3], size: [f32; 3]) -> usize {
        let object_id = self.print.borrow().objects.len() as u32;
        let group = object_id * 1_000_000;
        let volume = GlVolume::cuboid(origin, size, VOLUME_COLOR).with_groups(group, group);
        let object = PrintObject::new(size[2] as f64, &self.config.borrow());
        self.print.borrow_mut().objects.push(object);
        let mut volumes = self.volumes.borrow_mut();
        volumes.volumes.push(volume);
        volumes.len() - 1
    }

    pub fn volume_origin(&self, idx: usize) -> [f64; 3] {
        self.volumes.borrow().volumes[idx].origin
    }

    pub fn print_object(&self, object_id: usize) -> PrintObject {
        self.print.borrow().objects[object_id].clone()
    }

    // ── Input ────────────────────────────────────────────────

    pub fn next_serial(&mut self) -> u64 {
        self.serial += 1;
        self.serial
    }

    pub fn render(&mut self) {
        self.canvas.render();
    }

    /// Deliver an event as built, without assigning a new serial
    pub fn deliver(&mut self, event: PointerEvent) {
        self.canvas.on_mouse(&event);
    }

    pub fn pointer_event(&mut self, kind: PointerKind, position: Vec2) -> PointerEvent {
        let serial = self.next_serial();
        PointerEvent::new(serial, kind, position)
    }

    pub fn move_to(&mut self, position: Vec2) {
        let event = self.pointer_event(PointerKind::Move, position);
        self.deliver(event);
    }

    pub fn pointer_down(&mut self, button: MouseButton, position: Vec2) {
        self.pointer_down_with(button, position, Modifiers::default());
    }

    pub fn pointer_down_with(&mut self, button: MouseButton, position: Vec2, modifiers: Modifiers) {
        let event = self
            .pointer_event(PointerKind::Down(button), position)
            .with_modifiers(modifiers);
        self.deliver(event);
    }

    /// Motion with `button` held; returns the delivered event for redelivery
    pub fn drag_to(&mut self, button: MouseButton, position: Vec2) -> PointerEvent {
        let event = self
            .pointer_event(PointerKind::Move, position)
            .with_buttons(Buttons::only(button));
        self.deliver(event);
        event
    }

    pub fn pointer_up(&mut self, button: MouseButton, position: Vec2) {
        let event = self.pointer_event(PointerKind::Up(button), position);
        self.deliver(event);
    }

    pub fn double_click(&mut self, position: Vec2) {
        let event = self.pointer_event(PointerKind::DoubleClick(MouseButton::Left), position);
        self.deliver(event);
    }

    pub fn wheel(&mut self, position: Vec2, notches: f32) {
        self.canvas.on_mouse_wheel(WheelEvent::notches(position, notches));
    }

    pub fn key(&mut self, ch: char) {
        self.canvas.on_char(KeyEvent::new(ch));
    }

    pub fn tick(&mut self) {
        let serial = self.next_serial();
        self.canvas.on_timer(serial);
    }

    // ── Observation ──────────────────────────────────────────

    pub fn take_events(&mut self) -> Vec<CanvasEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    /// Canvas pixel position (top-left origin) of a world point in the last rendered frame
    pub fn window_of(&self, world: Vec3) -> Option<Vec2> {
        let frame = self.canvas.frame();
        let w = project(&frame.view_projection, frame.size, world)?;
        Some(Vec2::new(w.x, frame.size.height as f32 - w.y))
    }

    /// Canvas position of the center of the top face of volume `idx`
    pub fn top_center_of(&self, idx: usize) -> Option<Vec2> {
        let bb = self.volumes.borrow().volumes.get(idx)?.transformed_bounding_box();
        let [cx, cy, _] = bb.center();
        self.window_of(Vec3::new(cx as f32, cy as f32, bb.max[2] as f32))
    }
}
