use glam::{Vec2, Vec3};

/// State of an object drag. Both start positions are `None` until a drag begins.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Drag {
    pub start_position_2d: Option<Vec2>,
    pub start_position_3d: Option<Vec3>,
    /// Grab point minus the dragged volume's center
    pub volume_center_offset: Vec3,
    pub volume_idx: Option<usize>,
}

impl Drag {
    pub fn is_started(&self) -> bool {
        self.start_position_3d.is_some()
    }
}

/// Transient pointer state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Mouse {
    pub dragging: bool,
    /// Last pointer position in canvas pixels (top-left origin); `None` outside the canvas
    pub position: Option<Vec2>,
    pub drag: Drag,
}

impl Mouse {
    pub fn set_start_position_2d_as_invalid(&mut self) {
        self.drag.start_position_2d = None;
    }

    pub fn set_start_position_3d_as_invalid(&mut self) {
        self.drag.start_position_3d = None;
    }

    pub fn is_start_position_2d_defined(&self) -> bool {
        self.drag.start_position_2d.is_some()
    }

    pub fn is_start_position_3d_defined(&self) -> bool {
        self.drag.start_position_3d.is_some()
    }

    /// Forget the drag record after pointer-up
    pub fn reset_drag(&mut self) {
        self.drag = Drag::default();
        self.dragging = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_drag() {
        let mut mouse = Mouse {
            dragging: true,
            position: Some(Vec2::new(3.0, 4.0)),
            drag: Drag {
                start_position_2d: Some(Vec2::ONE),
                start_position_3d: Some(Vec3::ONE),
                volume_center_offset: Vec3::X,
                volume_idx: Some(2),
            },
        };
        assert!(mouse.drag.is_started());
        mouse.reset_drag();
        assert!(!mouse.dragging);
        assert!(!mouse.is_start_position_2d_defined());
        assert!(!mouse.is_start_position_3d_defined());
        assert_eq!(mouse.drag.volume_idx, None);
        assert_eq!(mouse.position, Some(Vec2::new(3.0, 4.0)));
    }
}
