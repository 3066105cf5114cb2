use serde::{Deserialize, Serialize};

use crate::Pointf;

/// The subset of the print configuration the canvas reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintConfig {
    /// Printable area, in winding order
    pub bed_shape: Vec<Pointf>,
    /// Base layer height (mm)
    pub layer_height: f64,
    /// Per extruder minimum layer height (mm)
    pub min_layer_height: Vec<f64>,
    /// Per extruder maximum layer height (mm); 0 means 75% of the nozzle diameter
    pub max_layer_height: Vec<f64>,
    pub nozzle_diameter: Vec<f64>,
    /// Per extruder color, `#RRGGBB`
    pub extruder_colour: Vec<String>,
    pub variable_layer_height: bool,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            bed_shape: vec![
                Pointf::new(0.0, 0.0),
                Pointf::new(200.0, 0.0),
                Pointf::new(200.0, 200.0),
                Pointf::new(0.0, 200.0),
            ],
            layer_height: 0.3,
            min_layer_height: vec![0.07],
            max_layer_height: vec![0.0],
            nozzle_diameter: vec![0.4],
            extruder_colour: vec!["#FFFF00".into()],
            variable_layer_height: true,
        }
    }
}

impl PrintConfig {
    /// Largest layer height any extruder can print
    pub fn max_layer_height(&self) -> f64 {
        let from_nozzles = self
            .nozzle_diameter
            .iter()
            .enumerate()
            .map(|(i, nozzle)| match self.max_layer_height.get(i) {
                Some(&h) if h > 0.0 => h,
                _ => 0.75 * nozzle,
            })
            .fold(0.0_f64, f64::max);
        if from_nozzles > 0.0 {
            from_nozzles
        } else {
            self.layer_height
        }
    }

    /// Smallest layer height any extruder can print
    pub fn min_layer_height(&self) -> f64 {
        self.min_layer_height
            .iter()
            .copied()
            .filter(|h| *h > 0.0)
            .fold(None, |acc: Option<f64>, h| Some(acc.map_or(h, |a| a.min(h))))
            .unwrap_or(0.07)
            .min(self.layer_height)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Parse `#RRGGBB` into an opaque RGBA color
pub fn parse_color(s: &str) -> Option<[f32; 4]> {
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| {
        u8::from_str_radix(hex.get(i..i + 2)?, 16)
            .ok()
            .map(|v| v as f32 / 255.0)
    };
    Some([channel(0)?, channel(2)?, channel(4)?, 1.0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#FF0000"), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(parse_color("00FF00"), None);
        assert_eq!(parse_color("#GG0000"), None);
        assert_eq!(parse_color("#FFF"), None);
    }

    #[test]
    fn test_layer_height_limits() {
        let config = PrintConfig::default();
        assert!((config.max_layer_height() - 0.3).abs() < 1e-9);
        assert!((config.min_layer_height() - 0.07).abs() < 1e-9);

        let config = PrintConfig {
            max_layer_height: vec![0.25],
            ..PrintConfig::default()
        };
        assert!((config.max_layer_height() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PrintConfig::from_json(r#"{ "layer_height": 0.2 }"#).unwrap();
        assert_eq!(config.layer_height, 0.2);
        assert_eq!(config.bed_shape.len(), 4);
    }
}
