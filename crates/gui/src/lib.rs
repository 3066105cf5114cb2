//! Interactive 3D scene canvas of a slicer plater: bed, volumes, picking, dragging,
//! camera control and variable layer height editing, behind a narrow GPU seam.

pub mod assets;
pub mod gpu;
pub mod harness;
pub mod input;
pub mod notify;
pub mod settings;
pub mod surface;
pub mod viewport;

pub use assets::{AssetError, AssetLoader, FsAssets, MemoryAssets, TextureImage};
pub use gpu::{GpuContext, GpuError, GpuInfo, GlowBackend, SoftwareBackend};
pub use harness::Harness;
pub use input::{Buttons, KeyEvent, Modifiers, MouseButton, PointerEvent, PointerKind, WheelEvent};
pub use notify::{CanvasEvent, EventDispatcher, EventKind, SubscriptionId};
pub use settings::CanvasSettings;
pub use surface::{RecordingSurface, Surface, SurfaceLog};
pub use viewport::{Capabilities, GlCanvas3D, InitOptions};
