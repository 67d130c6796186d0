use anyhow::Context;
use catalog::ShaderProgram;
use renderer::{DrmPresenter, GpuState, ReloadOutcome};
use scheduler::{FrameBackend, FrameInputs, LoadStatus};

/// The Vulkan renderer paired with the KMS output it scans out on.
///
/// Field order matters: the GPU state is torn down before the presenter
/// releases its dumb buffer.
pub struct VulkanViewer {
    gpu: GpuState,
    display: DrmPresenter,
}

impl VulkanViewer {
    pub fn new(gpu: GpuState, display: DrmPresenter) -> Self {
        Self { gpu, display }
    }
}

impl FrameBackend for VulkanViewer {
    fn load_program(&mut self, program: &ShaderProgram) -> anyhow::Result<LoadStatus> {
        let outcome = self
            .gpu
            .load_program(&program.vertex_path, &program.fragment_path)?;
        Ok(match outcome {
            ReloadOutcome::Ready => LoadStatus::Ready,
            ReloadOutcome::Unavailable { path, error } => LoadStatus::Unavailable {
                path,
                reason: error.to_string(),
            },
        })
    }

    fn is_ready(&self) -> bool {
        self.gpu.is_ready()
    }

    fn render(&mut self, inputs: &FrameInputs) -> anyhow::Result<()> {
        let resolution = self.display.resolution();
        self.gpu
            .write_uniforms(resolution, inputs.elapsed_seconds, inputs.pointer);
        self.gpu.render_frame()?;
        Ok(())
    }

    fn present(&mut self) -> anyhow::Result<()> {
        self.display
            .present(self.gpu.frame_pixels(), self.gpu.row_pitch())
            .context("failed to copy frame to scanout buffer")
    }
}
