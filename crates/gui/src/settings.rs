//! Canvas settings

use serde::{Deserialize, Serialize};

/// Background gradient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundSettings {
    pub bottom_color: [f32; 4],
    pub top_color: [f32; 4],
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            bottom_color: [0.0, 0.0, 0.0, 1.0],
            top_color: [0.2, 0.2, 0.25, 1.0],
        }
    }
}

/// Print bed display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BedSettings {
    pub fill_color: [f32; 4],
    pub grid_color: [f32; 4],
    /// Grid line spacing (mm)
    pub grid_spacing: f64,
    /// Height of the bed surface, just under the volumes (mm)
    pub ground_z: f32,
    pub grid_line_width: f32,
}

impl Default for BedSettings {
    fn default() -> Self {
        Self {
            fill_color: [0.8, 0.6, 0.5, 0.4],
            grid_color: [0.2, 0.2, 0.2, 0.4],
            grid_spacing: 10.0,
            ground_z: -0.02,
            grid_line_width: 3.0,
        }
    }
}

/// Axes display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxesSettings {
    pub line_width: f32,
    /// Axes length relative to the bed size
    pub length_ratio: f32,
}

impl Default for AxesSettings {
    fn default() -> Self {
        Self {
            line_width: 2.0,
            length_ratio: 0.3,
        }
    }
}

/// Camera interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Orbit degrees per pointer pixel
    pub trackball_size: f32,
    /// Empty space kept around a box when zooming to it
    pub zoom_margin: f32,
    /// Wheel notches beyond this are ignored
    pub wheel_max_notches: f32,
    /// Zoom change per wheel notch
    pub wheel_step: f32,
    /// Never zoom out beyond this fraction of the fit-scene zoom
    pub min_zoom_ratio: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            trackball_size: 0.8,
            zoom_margin: 1.25,
            wheel_max_notches: 4.0,
            wheel_step: 0.1,
            min_zoom_ratio: 0.8,
        }
    }
}

/// Variable layer height editing overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayersEditingSettings {
    /// Width of the editing bar at the right edge (px)
    pub bar_width: f32,
    /// Height of the reset button under the bar (px)
    pub reset_button_height: f32,
    /// Gap between the tooltip and the bar (px)
    pub tooltip_gap: f32,
    pub band_width: f32,
    pub strength: f32,
    pub min_band_width: f32,
    pub max_band_width: f32,
    pub vertex_shader: String,
    pub fragment_shader: String,
    pub tooltip_texture: String,
    pub reset_texture: String,
}

impl Default for LayersEditingSettings {
    fn default() -> Self {
        Self {
            bar_width: 70.0,
            reset_button_height: 22.0,
            tooltip_gap: 10.0,
            band_width: 2.0,
            strength: 0.005,
            min_band_width: 1.5,
            max_band_width: 10.0,
            vertex_shader: "shaders/variable_layer_height.vs".into(),
            fragment_shader: "shaders/variable_layer_height.fs".into(),
            tooltip_texture: "icons/variable_layer_height_tooltip.png".into(),
            reset_texture: "icons/variable_layer_height_reset.png".into(),
        }
    }
}

/// Lit volume shading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderSettings {
    pub vertex_shader: String,
    pub fragment_shader: String,
}

impl Default for ShaderSettings {
    fn default() -> Self {
        Self {
            vertex_shader: "shaders/gouraud.vs".into(),
            fragment_shader: "shaders/gouraud.fs".into(),
        }
    }
}

/// Refresh debouncing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    pub interval_ms: u64,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self { interval_ms: 100 }
    }
}

/// Cross-section display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CuttingPlaneSettings {
    /// Plane overhang around the scene (mm)
    pub margin: f32,
    pub plane_color: [f32; 4],
    pub contour_color: [f32; 4],
    pub contour_width: f32,
}

impl Default for CuttingPlaneSettings {
    fn default() -> Self {
        Self {
            margin: 20.0,
            plane_color: [0.8, 0.8, 0.8, 0.5],
            contour_color: [0.0, 0.0, 0.0, 1.0],
            contour_width: 2.0,
        }
    }
}

/// All canvas settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSettings {
    pub background: BackgroundSettings,
    pub bed: BedSettings,
    pub axes: AxesSettings,
    pub camera: CameraSettings,
    pub layers_editing: LayersEditingSettings,
    pub shaders: ShaderSettings,
    pub timer: TimerSettings,
    pub cutting_plane: CuttingPlaneSettings,
}

impl CanvasSettings {
    /// Load settings from the user config directory, or defaults if absent or unreadable
    pub fn load() -> Self {
        let Some(dirs) = directories::ProjectDirs::from("com", "canvas3d", "canvas3d") else {
            return Self::default();
        };
        let config_path = dirs.config_dir().join("settings.json");
        match std::fs::read_to_string(&config_path) {
            Ok(json) => Self::from_json(&json).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed {}: {e}", config_path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
