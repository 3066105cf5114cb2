mod app;

use std::path::PathBuf;

use app::ViewerApp;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canvas3d=info".into()),
        )
        .init();

    let scene = parse_scene_arg();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("canvas3d viewer")
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([640.0, 480.0]),
        depth_buffer: 24,
        ..Default::default()
    };

    if let Err(e) = eframe::run_native(
        "canvas3d-viewer",
        native_options,
        Box::new(move |cc| Ok(Box::new(ViewerApp::new(cc, scene)))),
    ) {
        tracing::error!("Failed to start application: {e}");
    }
}

/// Path given with `--scene <path>`
fn parse_scene_arg() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--scene" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
