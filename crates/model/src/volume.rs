use serde::{Deserialize, Serialize};

use crate::{parse_color, BoundingBoxf3, PrintConfig};

/// Color used for selected volumes
pub const SELECTED_COLOR: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
/// Color used for volumes under the cursor
pub const HOVER_COLOR: [f32; 4] = [0.4, 0.9, 0.1, 1.0];

/// Multiplier packing object/volume/instance indices into a select group id
const OBJECT_ID_FACTOR: u32 = 1_000_000;

/// A placed, renderable object instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlVolume {
    /// Flat triangle soup in local coordinates: 9 floats per triangle
    pub triangles: Vec<f32>,
    /// World translation applied to `triangles`
    pub origin: [f64; 3],
    pub color: [f32; 4],
    /// `object * 1_000_000 + volume * 1_000 + instance`; volumes of one group select together
    pub select_group_id: Option<u32>,
    /// Volumes of one drag group move together
    pub drag_group_id: Option<u32>,
    #[serde(default)]
    pub extruder_id: usize,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub hover: bool,
    #[serde(default)]
    pub is_wipe_tower: bool,
}

impl GlVolume {
    pub fn new(triangles: Vec<f32>, origin: [f64; 3], color: [f32; 4]) -> Self {
        Self {
            triangles,
            origin,
            color,
            select_group_id: None,
            drag_group_id: None,
            extruder_id: 0,
            selected: false,
            hover: false,
            is_wipe_tower: false,
        }
    }

    /// Axis-aligned box of size `size` whose min corner sits at the local origin
    pub fn cuboid(origin: [f64; 3], size: [f32; 3], color: [f32; 4]) -> Self {
        let [w, d, h] = size;
        let v = [
            [0.0, 0.0, 0.0],
            [w, 0.0, 0.0],
            [w, d, 0.0],
            [0.0, d, 0.0],
            [0.0, 0.0, h],
            [w, 0.0, h],
            [w, d, h],
            [0.0, d, h],
        ];
        let faces: [[usize; 4]; 6] = [
            [0, 3, 2, 1], // bottom
            [4, 5, 6, 7], // top
            [0, 1, 5, 4], // front
            [2, 3, 7, 6], // rear
            [1, 2, 6, 5], // right
            [3, 0, 4, 7], // left
        ];
        let mut triangles = Vec::with_capacity(6 * 2 * 9);
        for [a, b, c, d] in faces {
            for idx in [a, b, c, a, c, d] {
                triangles.extend_from_slice(&v[idx]);
            }
        }
        Self::new(triangles, origin, color)
    }

    pub fn with_groups(mut self, select_group_id: u32, drag_group_id: u32) -> Self {
        self.select_group_id = Some(select_group_id);
        self.drag_group_id = Some(drag_group_id);
        self
    }

    /// Index of the print object this volume belongs to
    pub fn object_id(&self) -> Option<usize> {
        self.select_group_id
            .map(|id| (id / OBJECT_ID_FACTOR) as usize)
    }

    /// Bounding box of the mesh in local coordinates
    pub fn bounding_box(&self) -> BoundingBoxf3 {
        BoundingBoxf3::from_points(
            self.triangles
                .chunks_exact(3)
                .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64]),
        )
    }

    pub fn transformed_bounding_box(&self) -> BoundingBoxf3 {
        self.bounding_box().translated(self.origin)
    }

    /// Triangle soup translated by `origin`
    pub fn world_triangles(&self) -> Vec<f32> {
        let o = [
            self.origin[0] as f32,
            self.origin[1] as f32,
            self.origin[2] as f32,
        ];
        self.triangles
            .chunks_exact(3)
            .flat_map(|p| [p[0] + o[0], p[1] + o[1], p[2] + o[2]])
            .collect()
    }

    /// Color for the shaded pass, taking selection and hover into account
    pub fn render_color(&self) -> [f32; 4] {
        if self.selected {
            SELECTED_COLOR
        } else if self.hover {
            HOVER_COLOR
        } else {
            self.color
        }
    }
}

/// The volumes of a scene, owned by the embedder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeCollection {
    pub volumes: Vec<GlVolume>,
}

impl VolumeCollection {
    pub fn new(volumes: Vec<GlVolume>) -> Self {
        Self { volumes }
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn clear(&mut self) {
        self.volumes.clear();
    }

    /// Combined box of all volumes, optionally skipping wipe towers
    pub fn bounding_box(&self, skip_wipe_tower: bool) -> BoundingBoxf3 {
        let mut bb = BoundingBoxf3::default();
        for v in &self.volumes {
            if skip_wipe_tower && v.is_wipe_tower {
                continue;
            }
            bb.merge(&v.transformed_bounding_box());
        }
        bb
    }

    /// Indices of all volumes sharing the select group of `idx` (just `idx` if ungrouped)
    pub fn select_group(&self, idx: usize) -> Vec<usize> {
        match self.volumes.get(idx).and_then(|v| v.select_group_id) {
            Some(group) => self
                .volumes
                .iter()
                .enumerate()
                .filter(|(_, v)| v.select_group_id == Some(group))
                .map(|(i, _)| i)
                .collect(),
            None if idx < self.volumes.len() => vec![idx],
            None => Vec::new(),
        }
    }

    /// Indices of all volumes sharing the drag group of `idx` (just `idx` if ungrouped)
    pub fn drag_group(&self, idx: usize) -> Vec<usize> {
        match self.volumes.get(idx).and_then(|v| v.drag_group_id) {
            Some(group) => self
                .volumes
                .iter()
                .enumerate()
                .filter(|(_, v)| v.drag_group_id == Some(group))
                .map(|(i, _)| i)
                .collect(),
            None if idx < self.volumes.len() => vec![idx],
            None => Vec::new(),
        }
    }

    /// Recolor volumes from the configured extruder colors
    pub fn update_colors_by_extruder(&mut self, config: &PrintConfig) {
        let colors: Vec<Option<[f32; 4]>> =
            config.extruder_colour.iter().map(|c| parse_color(c)).collect();
        if colors.is_empty() {
            return;
        }
        for v in &mut self.volumes {
            if v.is_wipe_tower {
                continue;
            }
            let idx = v.extruder_id.min(colors.len() - 1);
            match colors[idx] {
                Some(color) => v.color = color,
                None => tracing::debug!("unparsable color for extruder {idx}"),
            }
        }
    }
}
