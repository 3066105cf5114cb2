//! Inbound events delivered by the window host.
//!
//! Positions are canvas pixels with the origin at the top-left corner. Pointer and timer
//! events carry a host-assigned `serial` that grows with every physical event; a
//! redelivered event keeps its serial.

use glam::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const SHIFT: Self = Self {
        shift: true,
        ctrl: false,
        alt: false,
    };

    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt
    }
}

/// Buttons held while the event was generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Buttons {
    pub left: bool,
    pub right: bool,
    pub middle: bool,
}

impl Buttons {
    pub fn any(&self) -> bool {
        self.left || self.right || self.middle
    }

    pub fn only(button: MouseButton) -> Self {
        let mut b = Self::default();
        b.set(button, true);
        b
    }

    pub fn set(&mut self, button: MouseButton, down: bool) {
        match button {
            MouseButton::Left => self.left = down,
            MouseButton::Right => self.right = down,
            MouseButton::Middle => self.middle = down,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Down(MouseButton),
    Up(MouseButton),
    /// Motion, with or without buttons held
    Move,
    DoubleClick(MouseButton),
    /// The pointer left the canvas
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub serial: u64,
    pub kind: PointerKind,
    pub position: Vec2,
    pub buttons: Buttons,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn new(serial: u64, kind: PointerKind, position: Vec2) -> Self {
        let buttons = match kind {
            PointerKind::Down(b) | PointerKind::DoubleClick(b) => Buttons::only(b),
            _ => Buttons::default(),
        };
        Self {
            serial,
            kind,
            position,
            buttons,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_buttons(mut self, buttons: Buttons) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Motion with at least one button held
    pub fn is_dragging(&self) -> bool {
        self.kind == PointerKind::Move && self.buttons.any()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelEvent {
    pub position: Vec2,
    /// Signed wheel rotation; positive zooms in
    pub rotation: f32,
    /// Rotation of one notch
    pub delta: f32,
    pub modifiers: Modifiers,
}

impl WheelEvent {
    pub fn notches(position: Vec2, notches: f32) -> Self {
        Self {
            position,
            rotation: notches * 120.0,
            delta: 120.0,
            modifiers: Modifiers::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyEvent {
    pub ch: char,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(ch: char) -> Self {
        Self {
            ch,
            modifiers: Modifiers::default(),
        }
    }
}
