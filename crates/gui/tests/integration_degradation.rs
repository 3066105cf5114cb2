//! Missing GPU features and assets degrade the canvas instead of breaking it.

use canvas3d::{Harness, MemoryAssets, SoftwareBackend, TextureImage};

fn scene(gpu: SoftwareBackend, assets: MemoryAssets) -> Harness {
    let mut h = Harness::with_backend(gpu, assets, 200, 200);
    h.set_square_bed(100.0);
    h.add_cuboid([40.0, 40.0, 0.0], [20.0, 20.0, 10.0]);
    h
}

#[test]
fn test_full_capabilities() {
    let mut h = scene(SoftwareBackend::new(), MemoryAssets::builtin());
    h.render();
    let caps = h.canvas.capabilities().unwrap();
    assert!(caps.shader_lit);
    assert!(caps.layer_editing);
    assert!(caps.vbos);
    assert!(!caps.legacy_opengl);
}

#[test]
fn test_legacy_device_disables_shaders_and_layer_editing() {
    let mut h = scene(SoftwareBackend::legacy(), MemoryAssets::builtin());
    h.render();
    assert!(h.canvas.frame().rendered);

    let caps = h.canvas.capabilities().unwrap();
    assert!(caps.legacy_opengl);
    assert!(!caps.shader_lit);
    assert!(!caps.layer_editing);
    assert!(!caps.vbos);

    h.canvas.enable_layers_editing(true);
    assert!(!h.canvas.is_layers_editing_allowed());
    assert!(!h.canvas.is_layers_editing_enabled());
    assert_eq!(h.gpu.program_count(), 0);
}

#[test]
fn test_missing_volume_shader_draws_flat() {
    let mut assets = MemoryAssets::builtin();
    assets.remove("shaders/gouraud.fs");
    let mut h = scene(SoftwareBackend::new(), assets);
    h.render();
    assert!(h.canvas.frame().rendered);
    let caps = h.canvas.capabilities().unwrap();
    assert!(!caps.shader_lit);
    assert!(caps.layer_editing);
    assert!(h.gpu.draw_count() > 0);
}

#[test]
fn test_missing_layer_shader_disables_editing_for_session() {
    let mut assets = MemoryAssets::builtin();
    assets.remove("shaders/variable_layer_height.vs");
    let mut h = scene(SoftwareBackend::new(), assets);
    h.canvas.enable_layers_editing(true);
    h.render();
    assert!(!h.canvas.capabilities().unwrap().layer_editing);
    assert!(!h.canvas.is_layers_editing_allowed());
    assert!(!h.canvas.is_layers_editing_enabled());

    h.canvas.enable_layers_editing(true);
    assert!(!h.canvas.is_layers_editing_enabled());
}

#[test]
fn test_missing_overlay_texture_disables_editing_on_first_use() {
    let mut assets = MemoryAssets::builtin();
    assets.remove("icons/variable_layer_height_reset.png");
    let mut h = scene(SoftwareBackend::new(), assets);
    h.render();
    h.canvas.enable_layers_editing(true);
    assert!(h.canvas.is_layers_editing_enabled());

    h.render();
    assert!(h.canvas.frame().rendered);
    assert!(!h.canvas.is_layers_editing_allowed());
    assert!(!h.canvas.is_layers_editing_enabled());
    // the tooltip uploaded before the failure is released
    assert_eq!(h.gpu.texture_count(), 0);
}

#[test]
fn test_no_context_skips_rendering() {
    let gpu = SoftwareBackend::new();
    let mut h = scene(gpu.clone(), MemoryAssets::builtin());
    gpu.set_context_available(false);
    assert!(!h.canvas.set_current());
    assert!(!h.canvas.init(Default::default()));
    h.render();
    assert!(!h.canvas.frame().rendered);
    assert!(!h.canvas.is_initialized());
    assert_eq!(h.gpu.draw_count(), 0);

    gpu.set_context_available(true);
    h.render();
    assert!(h.canvas.frame().rendered);
    assert!(h.canvas.is_initialized());
}

#[test]
fn test_overlay_textures_follow_embedder() {
    let mut h = scene(SoftwareBackend::new(), MemoryAssets::builtin());
    h.canvas.set_warning_texture(Some(TextureImage::solid(64, 16, [255, 0, 0, 255])));
    h.canvas.set_legend_texture(Some(TextureImage::solid(32, 32, [0, 0, 255, 255])));
    h.render();
    // supplied but not enabled
    assert_eq!(h.gpu.texture_count(), 0);

    h.canvas.enable_warning_texture(true);
    h.canvas.enable_legend_texture(true);
    h.render();
    assert_eq!(h.gpu.texture_count(), 2);

    // the legend sits in the top-left corner
    assert_eq!(h.gpu.pixel(2, 197), [0, 0, 255, 255]);

    h.canvas.set_warning_texture(None);
    assert_eq!(h.gpu.texture_count(), 1);
}

#[test]
fn test_dropped_model_does_not_break_rendering() {
    let mut h = scene(SoftwareBackend::new(), MemoryAssets::builtin());
    h.render();
    h.volumes = std::rc::Rc::new(std::cell::RefCell::new(Default::default()));
    h.canvas.on_size(150, 150);
    h.render();
    assert!(h.canvas.frame().rendered);
    assert!(h.canvas.volumes_bounding_box() == Default::default());
}
