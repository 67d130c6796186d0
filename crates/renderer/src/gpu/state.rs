use std::path::Path;

use ash::vk;

use crate::error::{GpuError, VkContext};
use crate::types::{ReloadOutcome, Resolution};

use super::context::GpuContext;
use super::pipeline::{PipelineController, VulkanStages};
use super::resources::{
    DescriptorBindings, FrameCommands, OffscreenPass, RenderTarget, SampledTexture, UniformBuffer,
};
use super::texture::checkerboard;
use super::uniforms::UniformBlock;

const VERTICES_PER_QUAD: u32 = 6;
const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Every GPU object the viewer owns, from device to pipeline.
///
/// Fields are created top to bottom and torn down bottom to top in `Drop`;
/// `context` goes last through its own `Drop`.
pub struct GpuState {
    context: GpuContext,
    target: RenderTarget,
    texture: SampledTexture,
    pass: OffscreenPass,
    uniforms: UniformBuffer,
    bindings: DescriptorBindings,
    commands: FrameCommands,
    pipelines: PipelineController<VulkanStages>,
    resolution: Resolution,
}

impl GpuState {
    pub fn new(resolution: Resolution) -> Result<Self, GpuError> {
        let context = GpuContext::new()?;
        let device = &context.device;

        let target = RenderTarget::new(&context, resolution)?;
        let texture = SampledTexture::new(&context, &checkerboard())?;
        let pass = OffscreenPass::new(device, &target, resolution)?;
        let uniforms = UniformBuffer::new(&context)?;
        let bindings = DescriptorBindings::new(device, &uniforms, &texture)?;
        let commands = FrameCommands::new(&context)?;

        commands.submit_and_wait(device, context.queue, |buffer| {
            texture.record_transition(device, buffer)
        })?;

        let stages = VulkanStages::new(
            device.clone(),
            bindings.pipeline_layout,
            pass.render_pass,
            resolution,
        );

        tracing::debug!(
            %resolution,
            row_pitch = target.row_pitch(),
            "created offscreen render target"
        );

        Ok(Self {
            context,
            target,
            texture,
            pass,
            uniforms,
            bindings,
            commands,
            pipelines: PipelineController::new(stages),
            resolution,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.context.device_name
    }

    pub fn is_ready(&self) -> bool {
        self.pipelines.is_ready()
    }

    /// Destroys the resident pipeline and builds one from the given bytecode.
    pub fn load_program(
        &mut self,
        vertex_path: &Path,
        fragment_path: &Path,
    ) -> Result<ReloadOutcome, GpuError> {
        unsafe { self.context.device.device_wait_idle() }.vk_context("vkDeviceWaitIdle")?;
        self.pipelines.reload(vertex_path, fragment_path)
    }

    pub fn write_uniforms(&self, resolution: Resolution, elapsed_seconds: f32, pointer: [f32; 4]) {
        self.uniforms
            .write(&UniformBlock::new(resolution, elapsed_seconds, pointer));
    }

    /// Draws one fullscreen quad into the render target and waits for it.
    pub fn render_frame(&mut self) -> Result<(), GpuError> {
        let Some(&pipeline) = self.pipelines.pipeline() else {
            tracing::trace!("no resident pipeline; skipping draw");
            return Ok(());
        };

        let device = &self.context.device;
        let clear = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: CLEAR_COLOR,
            },
        }];
        let area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D {
                width: self.resolution.width,
                height: self.resolution.height,
            },
        };
        let begin = vk::RenderPassBeginInfo::default()
            .render_pass(self.pass.render_pass)
            .framebuffer(self.pass.framebuffer)
            .render_area(area)
            .clear_values(&clear);
        let layout = self.bindings.pipeline_layout;
        let set = self.bindings.set;

        self.commands
            .submit_and_wait(device, self.context.queue, |buffer| unsafe {
                device.cmd_begin_render_pass(buffer, &begin, vk::SubpassContents::INLINE);
                device.cmd_bind_pipeline(buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
                device.cmd_bind_descriptor_sets(
                    buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    layout,
                    0,
                    &[set],
                    &[],
                );
                device.cmd_draw(buffer, VERTICES_PER_QUAD, 1, 0, 0);
                device.cmd_end_render_pass(buffer);
            })
    }

    /// Mapped render target contents, `row_pitch()` bytes per row.
    pub fn frame_pixels(&self) -> &[u8] {
        self.target.pixels()
    }

    pub fn row_pitch(&self) -> usize {
        self.target.row_pitch()
    }
}

impl Drop for GpuState {
    fn drop(&mut self) {
        let device = &self.context.device;
        unsafe {
            if let Err(err) = device.device_wait_idle() {
                tracing::warn!(?err, "device did not go idle before teardown");
            }
            self.pipelines.destroy();
            self.commands.destroy(device);
            self.bindings.destroy(device);
            self.uniforms.destroy(device);
            self.pass.destroy(device);
            self.texture.destroy(device);
            self.target.destroy(device);
        }
        tracing::debug!("released GPU resources");
    }
}
