use serde::{Deserialize, Serialize};

use crate::PrintConfig;

/// Resampling step inside the edited band (mm)
const Z_STEP: f64 = 0.1;
const EPSILON: f64 = 1e-4;

/// What a layer-height brush stroke does to the profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayerHeightEditAction {
    /// Thicker layers (less detail)
    Increase,
    /// Thinner layers (more detail)
    #[default]
    Decrease,
    /// Pull back toward the base layer height
    Reduce,
    /// Average with neighbouring samples
    Smooth,
}

impl LayerHeightEditAction {
    /// Mapping of mouse buttons to actions used by the layer editing bar
    pub fn from_buttons(right_down: bool, shift_down: bool) -> Self {
        match (shift_down, right_down) {
            (false, false) => Self::Decrease,
            (false, true) => Self::Increase,
            (true, false) => Self::Reduce,
            (true, true) => Self::Smooth,
        }
    }
}

/// A sliced object with a variable layer height profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintObject {
    /// Object height (mm)
    pub height: f64,
    pub layer_height: f64,
    pub min_layer_height: f64,
    pub max_layer_height: f64,
    /// `[z, layer_height]` samples, sorted by z; empty means uniform
    #[serde(default)]
    pub layer_height_profile: Vec<[f64; 2]>,
}

impl PrintObject {
    pub fn new(height: f64, config: &PrintConfig) -> Self {
        Self {
            height,
            layer_height: config.layer_height,
            min_layer_height: config.min_layer_height(),
            max_layer_height: config.max_layer_height(),
            layer_height_profile: Vec::new(),
        }
    }

    /// The profile, with the uniform default filled in
    pub fn profile(&self) -> Vec<[f64; 2]> {
        if self.layer_height_profile.is_empty() {
            vec![[0.0, self.layer_height], [self.height, self.layer_height]]
        } else {
            self.layer_height_profile.clone()
        }
    }

    pub fn has_custom_profile(&self) -> bool {
        !self.layer_height_profile.is_empty()
    }

    pub fn reset_layer_height_profile(&mut self) {
        self.layer_height_profile.clear();
    }

    /// Interpolated layer height at `z`
    pub fn layer_height_at(&self, z: f64) -> f64 {
        height_at(&self.profile(), z, self.layer_height)
    }

    /// Apply one brush stroke centered at `z`. Returns false when nothing changed.
    pub fn adjust_layer_height_profile(
        &mut self,
        z: f64,
        strength: f64,
        band_width: f64,
        action: LayerHeightEditAction,
    ) -> bool {
        if !z.is_finite() || z < 0.0 || z > self.height || band_width <= 0.0 {
            return false;
        }
        let profile = self.profile();
        let current = height_at(&profile, z, self.layer_height);

        let delta = match action {
            LayerHeightEditAction::Increase => {
                if current >= self.max_layer_height - EPSILON {
                    return false;
                }
                strength.min(self.max_layer_height - current)
            }
            LayerHeightEditAction::Decrease => {
                if current <= self.min_layer_height + EPSILON {
                    return false;
                }
                -strength.min(current - self.min_layer_height)
            }
            LayerHeightEditAction::Reduce | LayerHeightEditAction::Smooth => {
                let d = strength.abs().min((self.layer_height - current).abs());
                if action == LayerHeightEditAction::Reduce && d < EPSILON {
                    return false;
                }
                d
            }
        };

        let lo = (z - 0.5 * band_width).max(0.0);
        let hi = (z + 0.5 * band_width).min(self.height);

        let mut resampled = Vec::new();
        let mut zz = lo;
        loop {
            let h = height_at(&profile, zz, self.layer_height);
            let weight = if (zz - z).abs() < 0.5 * band_width {
                0.5 + 0.5 * (2.0 * std::f64::consts::PI * (zz - z) / band_width).cos()
            } else {
                0.0
            };
            let h = match action {
                LayerHeightEditAction::Increase | LayerHeightEditAction::Decrease => {
                    h + weight * delta
                }
                LayerHeightEditAction::Reduce => {
                    let to_base = self.layer_height - h;
                    let step = weight * delta;
                    if to_base.abs() > step {
                        h + step.copysign(to_base)
                    } else {
                        self.layer_height
                    }
                }
                LayerHeightEditAction::Smooth => h,
            };
            resampled.push([zz, h.clamp(self.min_layer_height, self.max_layer_height)]);
            if zz >= hi {
                break;
            }
            zz = (zz + Z_STEP).min(hi);
        }

        if action == LayerHeightEditAction::Smooth {
            let before = resampled.clone();
            for i in 1..before.len().saturating_sub(1) {
                let zz = before[i][0];
                let weight = 0.5 + 0.5 * (2.0 * std::f64::consts::PI * (zz - z) / band_width).cos();
                let avg = (before[i - 1][1] + before[i][1] + before[i + 1][1]) / 3.0;
                resampled[i][1] = before[i][1] + weight * (avg - before[i][1]);
            }
        }

        let mut merged: Vec<[f64; 2]> = profile
            .iter()
            .copied()
            .filter(|p| p[0] < lo - EPSILON)
            .collect();
        merged.extend(resampled);
        merged.extend(profile.iter().copied().filter(|p| p[0] > hi + EPSILON));

        if merged.first().is_some_and(|p| p[0] > EPSILON) {
            merged.insert(0, [0.0, height_at(&profile, 0.0, self.layer_height)]);
        }
        if merged.last().is_some_and(|p| p[0] < self.height - EPSILON) {
            merged.push([self.height, height_at(&profile, self.height, self.layer_height)]);
        }

        let changed = merged != profile;
        self.layer_height_profile = merged;
        changed
    }
}

fn height_at(profile: &[[f64; 2]], z: f64, fallback: f64) -> f64 {
    let Some(first) = profile.first() else {
        return fallback;
    };
    if z <= first[0] {
        return first[1];
    }
    for pair in profile.windows(2) {
        let ([z1, h1], [z2, h2]) = (pair[0], pair[1]);
        if z <= z2 {
            if z2 - z1 <= f64::EPSILON {
                return h2;
            }
            let t = (z - z1) / (z2 - z1);
            return h1 + (h2 - h1) * t;
        }
    }
    profile.last().map_or(fallback, |p| p[1])
}

/// The print: one object per model object, indexed like the volumes' object ids
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Print {
    pub objects: Vec<PrintObject>,
}

impl Print {
    pub fn new(objects: Vec<PrintObject>) -> Self {
        Self { objects }
    }

    pub fn get_object(&self, idx: usize) -> Option<&PrintObject> {
        self.objects.get(idx)
    }

    pub fn get_object_mut(&mut self, idx: usize) -> Option<&mut PrintObject> {
        self.objects.get_mut(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object() -> PrintObject {
        PrintObject::new(20.0, &PrintConfig::default())
    }

    #[test]
    fn test_button_mapping() {
        assert_eq!(LayerHeightEditAction::from_buttons(false, false), LayerHeightEditAction::Decrease);
        assert_eq!(LayerHeightEditAction::from_buttons(true, false), LayerHeightEditAction::Increase);
        assert_eq!(LayerHeightEditAction::from_buttons(false, true), LayerHeightEditAction::Reduce);
        assert_eq!(LayerHeightEditAction::from_buttons(true, true), LayerHeightEditAction::Smooth);
    }

    #[test]
    fn test_uniform_profile_by_default() {
        let obj = object();
        assert!(!obj.has_custom_profile());
        assert_eq!(obj.profile(), vec![[0.0, 0.3], [20.0, 0.3]]);
        assert!((obj.layer_height_at(7.0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_decrease_thins_layers_inside_band_only() {
        let mut obj = object();
        assert!(obj.adjust_layer_height_profile(10.0, 0.05, 2.0, LayerHeightEditAction::Decrease));
        assert!(obj.layer_height_at(10.0) < 0.3);
        assert!((obj.layer_height_at(2.0) - 0.3).abs() < 1e-9);
        assert!((obj.layer_height_at(18.0) - 0.3).abs() < 1e-9);
        assert_eq!(obj.layer_height_profile.first().map(|p| p[0]), Some(0.0));
        assert_eq!(obj.layer_height_profile.last().map(|p| p[0]), Some(20.0));
    }

    #[test]
    fn test_increase_at_maximum_is_noop() {
        let mut obj = object();
        // Default max layer height equals the base layer height.
        assert!(!obj.adjust_layer_height_profile(10.0, 0.05, 2.0, LayerHeightEditAction::Increase));
        assert!(!obj.has_custom_profile());
    }

    #[test]
    fn test_heights_stay_within_limits() {
        let mut obj = object();
        for _ in 0..50 {
            obj.adjust_layer_height_profile(10.0, 0.05, 2.0, LayerHeightEditAction::Decrease);
        }
        for [_, h] in &obj.layer_height_profile {
            assert!(*h >= obj.min_layer_height - 1e-9);
        }
    }

    #[test]
    fn test_reduce_returns_toward_base_and_reset() {
        let mut obj = object();
        obj.adjust_layer_height_profile(10.0, 0.1, 2.0, LayerHeightEditAction::Decrease);
        let thinned = obj.layer_height_at(10.0);
        obj.adjust_layer_height_profile(10.0, 0.05, 2.0, LayerHeightEditAction::Reduce);
        assert!(obj.layer_height_at(10.0) > thinned);

        obj.reset_layer_height_profile();
        assert!(!obj.has_custom_profile());
    }

    #[test]
    fn test_out_of_range_z_is_ignored() {
        let mut obj = object();
        assert!(!obj.adjust_layer_height_profile(-1.0, 0.05, 2.0, LayerHeightEditAction::Decrease));
        assert!(!obj.adjust_layer_height_profile(25.0, 0.05, 2.0, LayerHeightEditAction::Decrease));
    }
}
