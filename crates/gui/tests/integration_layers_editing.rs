//! Variable layer height editing driven through the overlay bar.

use canvas3d::viewport::EditState;
use canvas3d::{CanvasEvent, Harness, Modifiers, MouseButton, PointerKind};
use glam::Vec2;

const WIDTH: u32 = 400;
const HEIGHT: u32 = 300;

/// Inside the bar, about two thirds up
const BAR: Vec2 = Vec2::new(WIDTH as f32 - 35.0, 100.0);
/// Inside the reset button under the bar
const RESET: Vec2 = Vec2::new(WIDTH as f32 - 35.0, HEIGHT as f32 - 10.0);

/// One selected object with layer editing switched on
fn editing_scene() -> Harness {
    let mut h = Harness::new(WIDTH, HEIGHT);
    h.set_square_bed(200.0);
    h.add_cuboid([90.0, 90.0, 0.0], [20.0, 20.0, 10.0]);
    h.render();
    h.canvas.enable_layers_editing(true);
    assert!(h.canvas.is_layers_editing_enabled());

    let pos = h.top_center_of(0).unwrap();
    h.move_to(pos);
    h.pointer_down(MouseButton::Left, pos);
    h.pointer_up(MouseButton::Left, pos);
    assert_eq!(h.canvas.selected_object_id(), Some(0));
    h.take_events();
    h
}

fn state(h: &Harness) -> EditState {
    h.canvas.layers_editing().state
}

#[test]
fn test_state_machine() {
    let mut h = editing_scene();
    assert_eq!(state(&h), EditState::Unknown);

    // outside the bar: nothing happens to the editor
    let outside = Vec2::new(20.0, 20.0);
    h.move_to(outside);
    h.pointer_down(MouseButton::Left, outside);
    assert_eq!(state(&h), EditState::Unknown);
    h.pointer_up(MouseButton::Left, outside);
    assert_eq!(state(&h), EditState::Unknown);
    // clicking empty space keeps the edited object selected
    assert_eq!(h.canvas.selected_object_id(), Some(0));

    h.pointer_down(MouseButton::Left, BAR);
    assert_eq!(state(&h), EditState::Editing);
    assert_eq!(h.canvas.layers_editing().last_object_id, Some(0));

    h.pointer_up(MouseButton::Left, BAR);
    assert_eq!(state(&h), EditState::Completed);
    assert_eq!(h.take_events(), vec![CanvasEvent::ModelUpdated]);
}

#[test]
fn test_edit_changes_profile_at_cursor_height() {
    let mut h = editing_scene();
    let before = h.print_object(0);
    h.pointer_down(MouseButton::Left, BAR);
    let after = h.print_object(0);
    assert_ne!(after.profile(), before.profile());

    // z follows the bar: (bottom - y - 1) / (bottom - top - 1) of the object height
    let bottom = HEIGHT as f32 - 22.0;
    let expected_z = 10.0 * (bottom - BAR.y - 1.0) / (bottom - 1.0);
    assert!((h.canvas.layers_editing().last_z - expected_z).abs() < 1e-4);
    // left button thins layers
    assert!(after.layer_height_at(expected_z as f64) < before.layer_height_at(expected_z as f64));
}

#[test]
fn test_right_button_thickens_layers() {
    let mut h = editing_scene();
    // the base height is already the maximum, so thin first
    h.pointer_down(MouseButton::Left, BAR);
    h.tick();
    h.tick();
    h.pointer_up(MouseButton::Left, BAR);
    let z = h.canvas.layers_editing().last_z as f64;
    let thinned = h.print_object(0).layer_height_at(z);

    h.pointer_down(MouseButton::Right, BAR);
    assert!(h.print_object(0).layer_height_at(z) > thinned);
}

#[test]
fn test_duplicate_event_applies_once() {
    let mut h = editing_scene();
    h.pointer_down(MouseButton::Left, BAR);
    let drag = h.drag_to(MouseButton::Left, BAR + Vec2::new(0.0, -5.0));
    let once = h.print_object(0);

    h.deliver(drag);
    assert_eq!(h.print_object(0), once);

    // a fresh event at the same spot applies again
    h.drag_to(MouseButton::Left, BAR + Vec2::new(0.0, -5.0));
    assert_ne!(h.print_object(0), once);
}

#[test]
fn test_timer_repeats_edit_while_pressed() {
    let mut h = editing_scene();
    h.pointer_down(MouseButton::Left, BAR);
    assert!(h.surface.log().timer_running);
    let z = h.canvas.layers_editing().last_z as f64;
    let first = h.print_object(0).layer_height_at(z);

    h.tick();
    h.tick();
    let repeated = h.print_object(0).layer_height_at(z);
    assert!(repeated < first);
    assert_eq!(state(&h), EditState::Editing);

    h.pointer_up(MouseButton::Left, BAR);
    h.tick();
    assert!(!h.surface.log().timer_running);
    let settled = h.print_object(0);
    h.tick();
    assert_eq!(h.print_object(0), settled);
}

#[test]
fn test_shift_reduces_toward_base_height() {
    let mut h = editing_scene();
    h.pointer_down(MouseButton::Left, BAR);
    for _ in 0..5 {
        h.tick();
    }
    h.pointer_up(MouseButton::Left, BAR);
    let z = h.canvas.layers_editing().last_z as f64;
    let thinned = h.print_object(0).layer_height_at(z);

    h.pointer_down_with(MouseButton::Left, BAR, Modifiers::SHIFT);
    let reduced = h.print_object(0).layer_height_at(z);
    assert!(reduced > thinned);
    assert!(reduced <= 0.3 + 1e-9);
}

#[test]
fn test_reset_button_restores_uniform_profile() {
    let mut h = editing_scene();
    h.pointer_down(MouseButton::Left, BAR);
    h.pointer_up(MouseButton::Left, BAR);
    assert!(h.print_object(0).has_custom_profile());
    h.take_events();

    // only the left button resets
    h.pointer_down(MouseButton::Right, RESET);
    assert!(h.print_object(0).has_custom_profile());
    h.pointer_up(MouseButton::Right, RESET);
    h.take_events();

    h.pointer_down(MouseButton::Left, RESET);
    assert!(!h.print_object(0).has_custom_profile());
    assert_eq!(h.take_events(), vec![CanvasEvent::ModelUpdated]);
    assert_ne!(state(&h), EditState::Editing);
}

#[test]
fn test_wheel_over_bar_scales_band() {
    let mut h = editing_scene();
    let zoom = h.canvas.get_camera_zoom();
    h.wheel(BAR, 2.0);
    assert!((h.canvas.layers_editing().band_width - 2.4).abs() < 1e-5);
    assert_eq!(h.canvas.get_camera_zoom(), zoom);

    for _ in 0..20 {
        h.wheel(BAR, 4.0);
    }
    assert_eq!(h.canvas.layers_editing().band_width, 10.0);
}

#[test]
fn test_bar_ignored_without_selection() {
    let mut h = editing_scene();
    h.canvas.deselect_volumes();
    h.pointer_down(MouseButton::Left, BAR);
    assert_eq!(state(&h), EditState::Unknown);
    assert!(!h.print_object(0).has_custom_profile());
}

#[test]
fn test_disabling_resets_editor() {
    let mut h = editing_scene();
    h.pointer_down(MouseButton::Left, BAR);
    h.canvas.enable_layers_editing(false);
    assert_eq!(state(&h), EditState::Unknown);
    assert!(!h.surface.log().timer_running);

    // the bar no longer intercepts the pointer
    let event = h.pointer_event(PointerKind::Up(MouseButton::Left), BAR);
    h.deliver(event);
    assert!(!h.take_events().contains(&CanvasEvent::ModelUpdated));
}

#[test]
fn test_overlay_renders_with_layer_shader() {
    let mut h = editing_scene();
    h.pointer_down(MouseButton::Left, BAR);
    let draws = h.gpu.draw_count();
    h.render();
    assert!(h.gpu.draw_count() > draws);
    // tooltip and reset icon uploaded on first use
    assert_eq!(h.gpu.texture_count(), 2);
    assert!(h.canvas.is_layers_editing_allowed());
}
