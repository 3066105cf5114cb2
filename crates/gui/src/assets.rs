//! Shader sources and overlay textures, loaded by name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Decoded RGBA8 image, rows top to bottom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 || rgba.len() != (width * height * 4) as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            rgba,
        })
    }

    /// Single-color image
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self {
            width,
            height,
            rgba: color.repeat((width * height) as usize),
        }
    }

    /// Texel at `(x, y)` counted from the top-left corner
    pub fn texel(&self, x: u32, y: u32) -> [u8; 4] {
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let i = ((y * self.width + x) * 4) as usize;
        match self.rgba.get(i..i + 4) {
            Some(t) => [t[0], t[1], t[2], t[3]],
            None => [0; 4],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("failed to read {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },
}

/// Source of shader text and texture images
pub trait AssetLoader {
    fn load_text(&self, name: &str) -> Result<String, AssetError>;
    fn load_texture(&self, name: &str) -> Result<TextureImage, AssetError>;
}

/// Assets read from a directory tree (`shaders/…`, `icons/…`)
#[derive(Debug, Clone)]
pub struct FsAssets {
    root: PathBuf,
}

impl FsAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The `assets` directory shipped with this crate
    pub fn bundled() -> Self {
        Self::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("assets"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl AssetLoader for FsAssets {
    fn load_text(&self, name: &str) -> Result<String, AssetError> {
        let path = self.path(name);
        std::fs::read_to_string(&path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound(path.display().to_string()),
            _ => AssetError::Io {
                name: name.to_string(),
                source,
            },
        })
    }

    fn load_texture(&self, name: &str) -> Result<TextureImage, AssetError> {
        let path = self.path(name);
        if !path.exists() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }
        let img = image::open(&path)
            .map_err(|source| AssetError::Decode {
                name: name.to_string(),
                source,
            })?
            .to_rgba8();
        let (width, height) = img.dimensions();
        tracing::debug!("Loaded texture {name} ({width}x{height})");
        Ok(TextureImage {
            width,
            height,
            rgba: img.into_raw(),
        })
    }
}

/// In-memory assets, keyed by the same names the filesystem loader uses
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    texts: HashMap<String, String>,
    textures: HashMap<String, TextureImage>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bundled shaders plus placeholder overlay textures
    pub fn builtin() -> Self {
        Self::new()
            .with_text("shaders/gouraud.vs", include_str!("../assets/shaders/gouraud.vs"))
            .with_text("shaders/gouraud.fs", include_str!("../assets/shaders/gouraud.fs"))
            .with_text(
                "shaders/variable_layer_height.vs",
                include_str!("../assets/shaders/variable_layer_height.vs"),
            )
            .with_text(
                "shaders/variable_layer_height.fs",
                include_str!("../assets/shaders/variable_layer_height.fs"),
            )
            .with_texture(
                "icons/variable_layer_height_tooltip.png",
                TextureImage::solid(128, 32, [40, 40, 40, 220]),
            )
            .with_texture(
                "icons/variable_layer_height_reset.png",
                TextureImage::solid(32, 16, [200, 60, 60, 255]),
            )
    }

    pub fn with_text(mut self, name: &str, text: &str) -> Self {
        self.texts.insert(name.to_string(), text.to_string());
        self
    }

    pub fn with_texture(mut self, name: &str, image: TextureImage) -> Self {
        self.textures.insert(name.to_string(), image);
        self
    }

    pub fn remove(&mut self, name: &str) {
        self.texts.remove(name);
        self.textures.remove(name);
    }
}

impl AssetLoader for MemoryAssets {
    fn load_text(&self, name: &str) -> Result<String, AssetError> {
        self.texts
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }

    fn load_texture(&self, name: &str) -> Result<TextureImage, AssetError> {
        self.textures
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }
}
