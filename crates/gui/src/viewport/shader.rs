use crate::assets::AssetLoader;
use crate::gpu::{GpuContext, ProgramId};

/// A GPU program built from a vertex and a fragment source asset
#[derive(Debug, Default)]
pub struct Shader {
    program: Option<ProgramId>,
}

impl Shader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.program.is_some()
    }

    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    /// Load and build the program. On any failure the shader stays uninitialized.
    pub fn init(
        &mut self,
        gpu: &mut dyn GpuContext,
        assets: &dyn AssetLoader,
        vertex_path: &str,
        fragment_path: &str,
    ) -> bool {
        self.reset(gpu);
        let sources = assets
            .load_text(vertex_path)
            .and_then(|vs| Ok((vs, assets.load_text(fragment_path)?)));
        let (vs, fs) = match sources {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Shader {vertex_path} / {fragment_path} unavailable: {e}");
                return false;
            }
        };
        match gpu.compile_program(&vs, &fs) {
            Ok(program) => {
                tracing::debug!("Shader {vertex_path} / {fragment_path} ready");
                self.program = Some(program);
                true
            }
            Err(e) => {
                tracing::error!("Shader {vertex_path} / {fragment_path} failed: {e}");
                false
            }
        }
    }

    pub fn reset(&mut self, gpu: &mut dyn GpuContext) {
        if let Some(program) = self.program.take() {
            gpu.delete_program(program);
        }
    }

    pub fn start_using(&self, gpu: &mut dyn GpuContext) {
        if let Some(program) = self.program {
            gpu.use_program(Some(program));
        }
    }

    pub fn stop_using(&self, gpu: &mut dyn GpuContext) {
        gpu.use_program(None);
    }

    /// False when uninitialized or the program has no such uniform
    pub fn set_uniform(&self, gpu: &mut dyn GpuContext, name: &str, value: f32) -> bool {
        match self.program {
            Some(program) => gpu.set_uniform_f32(program, name, value),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssets;
    use crate::gpu::SoftwareBackend;

    #[test]
    fn test_init_and_uniforms() {
        let mut gpu = SoftwareBackend::new();
        let assets = MemoryAssets::builtin();
        let mut shader = Shader::new();
        assert!(shader.init(&mut gpu, &assets, "shaders/gouraud.vs", "shaders/gouraud.fs"));
        shader.start_using(&mut gpu);
        assert_eq!(gpu.active_program(), shader.program());
        assert!(!shader.set_uniform(&mut gpu, "u_not_there", 1.0));
        shader.stop_using(&mut gpu);
        assert_eq!(gpu.active_program(), None);
    }

    #[test]
    fn test_missing_source_leaves_uninitialized() {
        let mut gpu = SoftwareBackend::new();
        let assets = MemoryAssets::new().with_text("a.vs", "void main() {}");
        let mut shader = Shader::new();
        assert!(!shader.init(&mut gpu, &assets, "a.vs", "missing.fs"));
        assert!(!shader.is_initialized());
        assert!(!shader.set_uniform(&mut gpu, "u_color", 1.0));
    }

    #[test]
    fn test_compile_failure_leaves_uninitialized() {
        let mut gpu = SoftwareBackend::new();
        let assets = MemoryAssets::new().with_text("a.vs", "void main() {}").with_text("b.fs", "  ");
        let mut shader = Shader::new();
        assert!(!shader.init(&mut gpu, &assets, "a.vs", "b.fs"));
        assert_eq!(gpu.program_count(), 0);
    }
}
