//! Long-lived GPU objects created once per session.
//!
//! None of these types implement `Drop`: they are torn down explicitly by
//! `GpuState` so that destruction order follows creation order in reverse and
//! always happens before the owning device goes away.
use std::ffi::c_void;

use ash::{vk, Device};
use image::RgbaImage;

use crate::error::{GpuError, VkContext};
use crate::pitch::{copy_rows, RowSpan};
use crate::types::{Resolution, BYTES_PER_PIXEL};

use super::context::GpuContext;
use super::uniforms::{UniformBlock, UNIFORM_BUFFER_SIZE};

pub(crate) const TARGET_FORMAT: vk::Format = vk::Format::B8G8R8A8_UNORM;
const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

const COLOR_SUBRESOURCE: vk::ImageSubresource = vk::ImageSubresource {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    mip_level: 0,
    array_layer: 0,
};

const COLOR_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

fn host_memory() -> vk::MemoryPropertyFlags {
    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
}

/// Host writes to the texture happen before submission, so the barrier waits
/// on the HOST stage; TOP_OF_PIPE carries no memory access.
const UPLOAD_SRC_STAGE: vk::PipelineStageFlags = vk::PipelineStageFlags::HOST;
const UPLOAD_DST_STAGE: vk::PipelineStageFlags = vk::PipelineStageFlags::FRAGMENT_SHADER;

fn upload_barrier(image: vk::Image) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::HOST_WRITE)
        .dst_access_mask(vk::AccessFlags::SHADER_READ)
        .old_layout(vk::ImageLayout::PREINITIALIZED)
        .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(COLOR_RANGE)
}

/// Makes the colour attachment writes of the single subpass visible to the
/// CPU once the frame fence signals. The fence alone only orders device work.
fn host_readback_dependency() -> vk::SubpassDependency {
    vk::SubpassDependency::default()
        .src_subpass(0)
        .dst_subpass(vk::SUBPASS_EXTERNAL)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        .dst_stage_mask(vk::PipelineStageFlags::HOST)
        .dst_access_mask(vk::AccessFlags::HOST_READ)
}

/// A linear, host-visible 2D image with its bound memory and a colour view.
struct HostImage {
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl HostImage {
    fn new(
        ctx: &GpuContext,
        format: vk::Format,
        width: u32,
        height: u32,
        usage: vk::ImageUsageFlags,
        initial_layout: vk::ImageLayout,
    ) -> Result<Self, GpuError> {
        let device = &ctx.device;
        let info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::LINEAR)
            .usage(usage)
            .initial_layout(initial_layout);
        let image = unsafe { device.create_image(&info, None) }.vk_context("vkCreateImage")?;

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type = ctx.memory_type(requirements.memory_type_bits, host_memory())?;
        let alloc = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        let memory =
            unsafe { device.allocate_memory(&alloc, None) }.vk_context("vkAllocateMemory")?;
        unsafe { device.bind_image_memory(image, memory, 0) }.vk_context("vkBindImageMemory")?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(COLOR_RANGE);
        let view = unsafe { device.create_image_view(&view_info, None) }
            .vk_context("vkCreateImageView")?;

        Ok(Self {
            image,
            memory,
            view,
        })
    }

    fn layout(&self, device: &Device) -> vk::SubresourceLayout {
        unsafe { device.get_image_subresource_layout(self.image, COLOR_SUBRESOURCE) }
    }

    /// Maps the whole allocation and returns a pointer to the first texel.
    fn map(&self, device: &Device, layout: &vk::SubresourceLayout) -> Result<*mut u8, GpuError> {
        let base = unsafe {
            device.map_memory(self.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
        }
        .vk_context("vkMapMemory")? as *mut u8;
        Ok(unsafe { base.add(layout.offset as usize) })
    }

    unsafe fn destroy(&mut self, device: &Device) {
        device.destroy_image_view(self.view, None);
        device.destroy_image(self.image, None);
        device.free_memory(self.memory, None);
    }
}

/// Offscreen colour image the pipeline draws into, mapped for the whole session.
pub(crate) struct RenderTarget {
    image: HostImage,
    mapped: *const u8,
    len: usize,
    row_pitch: usize,
}

impl RenderTarget {
    pub fn new(ctx: &GpuContext, resolution: Resolution) -> Result<Self, GpuError> {
        let image = HostImage::new(
            ctx,
            TARGET_FORMAT,
            resolution.width,
            resolution.height,
            vk::ImageUsageFlags::COLOR_ATTACHMENT,
            vk::ImageLayout::UNDEFINED,
        )?;
        let layout = image.layout(&ctx.device);
        let mapped = image.map(&ctx.device, &layout)? as *const u8;

        Ok(Self {
            image,
            mapped,
            len: layout.size as usize,
            row_pitch: layout.row_pitch as usize,
        })
    }

    pub fn view(&self) -> vk::ImageView {
        self.image.view
    }

    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    /// Pixels of the last completed frame, `row_pitch` bytes per row.
    ///
    /// Only meaningful after the frame fence has signalled.
    pub fn pixels(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.mapped, self.len) }
    }

    pub unsafe fn destroy(&mut self, device: &Device) {
        device.unmap_memory(self.image.memory);
        self.image.destroy(device);
    }
}

/// The read-only checkerboard texture plus its sampler.
pub(crate) struct SampledTexture {
    image: HostImage,
    pub sampler: vk::Sampler,
}

impl SampledTexture {
    pub fn new(ctx: &GpuContext, pixels: &RgbaImage) -> Result<Self, GpuError> {
        let image = HostImage::new(
            ctx,
            TEXTURE_FORMAT,
            pixels.width(),
            pixels.height(),
            vk::ImageUsageFlags::SAMPLED,
            vk::ImageLayout::PREINITIALIZED,
        )?;

        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT);
        let sampler = unsafe { ctx.device.create_sampler(&sampler_info, None) }
            .vk_context("vkCreateSampler")?;

        let texture = Self { image, sampler };
        texture.upload(&ctx.device, pixels)?;
        Ok(texture)
    }

    pub fn view(&self) -> vk::ImageView {
        self.image.view
    }

    /// Writes `pixels` into the still-preinitialized image, honouring the
    /// driver's row pitch.
    fn upload(&self, device: &Device, pixels: &RgbaImage) -> Result<(), GpuError> {
        let layout = self.image.layout(device);
        let span = RowSpan::new(
            pixels.width() as usize * BYTES_PER_PIXEL,
            pixels.height() as usize,
        );

        let mapped = self.image.map(device, &layout)?;
        let dst = unsafe { std::slice::from_raw_parts_mut(mapped, layout.size as usize) };
        let copied = copy_rows(
            dst,
            layout.row_pitch as usize,
            pixels.as_raw(),
            span.row_bytes,
            span,
        );
        unsafe { device.unmap_memory(self.image.memory) };
        Ok(copied?)
    }

    /// Records the one-time PREINITIALIZED to SHADER_READ_ONLY_OPTIMAL barrier.
    pub fn record_transition(&self, device: &Device, commands: vk::CommandBuffer) {
        let barrier = upload_barrier(self.image.image);
        unsafe {
            device.cmd_pipeline_barrier(
                commands,
                UPLOAD_SRC_STAGE,
                UPLOAD_DST_STAGE,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }

    pub unsafe fn destroy(&mut self, device: &Device) {
        device.destroy_sampler(self.sampler, None);
        self.image.destroy(device);
    }
}

/// Host-coherent uniform buffer holding one [`UniformBlock`].
pub(crate) struct UniformBuffer {
    pub buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    mapped: *mut c_void,
}

impl UniformBuffer {
    pub fn new(ctx: &GpuContext) -> Result<Self, GpuError> {
        let device = &ctx.device;
        let info = vk::BufferCreateInfo::default()
            .size(UNIFORM_BUFFER_SIZE)
            .usage(vk::BufferUsageFlags::UNIFORM_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.create_buffer(&info, None) }.vk_context("vkCreateBuffer")?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type = ctx.memory_type(requirements.memory_type_bits, host_memory())?;
        let alloc = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        let memory =
            unsafe { device.allocate_memory(&alloc, None) }.vk_context("vkAllocateMemory")?;
        unsafe { device.bind_buffer_memory(buffer, memory, 0) }
            .vk_context("vkBindBufferMemory")?;
        let mapped = unsafe {
            device.map_memory(memory, 0, UNIFORM_BUFFER_SIZE, vk::MemoryMapFlags::empty())
        }
        .vk_context("vkMapMemory")?;

        let uniforms = Self {
            buffer,
            memory,
            mapped,
        };
        uniforms.write(&UniformBlock::default());
        Ok(uniforms)
    }

    /// Plain store into coherent memory; visible to the next submission.
    pub fn write(&self, block: &UniformBlock) {
        let bytes = bytemuck::bytes_of(block);
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped as *mut u8, bytes.len());
        }
    }

    pub unsafe fn destroy(&mut self, device: &Device) {
        device.unmap_memory(self.memory);
        device.destroy_buffer(self.buffer, None);
        device.free_memory(self.memory, None);
    }
}

/// Descriptor layout, pool and the single set shared by every pipeline.
pub(crate) struct DescriptorBindings {
    pub set_layout: vk::DescriptorSetLayout,
    pub pipeline_layout: vk::PipelineLayout,
    pool: vk::DescriptorPool,
    pub set: vk::DescriptorSet,
}

impl DescriptorBindings {
    pub fn new(
        device: &Device,
        uniforms: &UniformBuffer,
        texture: &SampledTexture,
    ) -> Result<Self, GpuError> {
        let bindings = [
            vk::DescriptorSetLayoutBinding::default()
                .binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT),
            vk::DescriptorSetLayoutBinding::default()
                .binding(1)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT),
        ];
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let set_layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }
            .vk_context("vkCreateDescriptorSetLayout")?;

        let pipeline_layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(std::slice::from_ref(&set_layout));
        let pipeline_layout = unsafe { device.create_pipeline_layout(&pipeline_layout_info, None) }
            .vk_context("vkCreatePipelineLayout")?;

        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 1,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: 1,
            },
        ];
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(1)
            .pool_sizes(&pool_sizes);
        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }
            .vk_context("vkCreateDescriptorPool")?;

        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(std::slice::from_ref(&set_layout));
        let set = unsafe { device.allocate_descriptor_sets(&alloc_info) }
            .vk_context("vkAllocateDescriptorSets")?
            .first()
            .copied()
            .ok_or(GpuError::Vulkan {
                operation: "vkAllocateDescriptorSets",
                code: vk::Result::ERROR_OUT_OF_POOL_MEMORY,
            })?;

        let buffer_info = vk::DescriptorBufferInfo::default()
            .buffer(uniforms.buffer)
            .offset(0)
            .range(UNIFORM_BUFFER_SIZE);
        let image_info = vk::DescriptorImageInfo::default()
            .sampler(texture.sampler)
            .image_view(texture.view())
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        let writes = [
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(std::slice::from_ref(&buffer_info)),
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(1)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(std::slice::from_ref(&image_info)),
        ];
        unsafe { device.update_descriptor_sets(&writes, &[]) };

        Ok(Self {
            set_layout,
            pipeline_layout,
            pool,
            set,
        })
    }

    pub unsafe fn destroy(&mut self, device: &Device) {
        device.destroy_descriptor_pool(self.pool, None);
        device.destroy_pipeline_layout(self.pipeline_layout, None);
        device.destroy_descriptor_set_layout(self.set_layout, None);
    }
}

/// Single-subpass render pass and the framebuffer wrapping the render target.
pub(crate) struct OffscreenPass {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
}

impl OffscreenPass {
    pub fn new(
        device: &Device,
        target: &RenderTarget,
        resolution: Resolution,
    ) -> Result<Self, GpuError> {
        let attachment = vk::AttachmentDescription::default()
            .format(TARGET_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::GENERAL);
        let color_ref = vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(std::slice::from_ref(&color_ref));
        let readback = host_readback_dependency();
        let info = vk::RenderPassCreateInfo::default()
            .attachments(std::slice::from_ref(&attachment))
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&readback));
        let render_pass =
            unsafe { device.create_render_pass(&info, None) }.vk_context("vkCreateRenderPass")?;

        let view = target.view();
        let fb_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(std::slice::from_ref(&view))
            .width(resolution.width)
            .height(resolution.height)
            .layers(1);
        let framebuffer = unsafe { device.create_framebuffer(&fb_info, None) }
            .vk_context("vkCreateFramebuffer")?;

        Ok(Self {
            render_pass,
            framebuffer,
        })
    }

    pub unsafe fn destroy(&mut self, device: &Device) {
        device.destroy_framebuffer(self.framebuffer, None);
        device.destroy_render_pass(self.render_pass, None);
    }
}

/// The one reusable command buffer and the fence guarding it.
pub(crate) struct FrameCommands {
    pool: vk::CommandPool,
    pub buffer: vk::CommandBuffer,
    pub fence: vk::Fence,
}

impl FrameCommands {
    pub fn new(ctx: &GpuContext) -> Result<Self, GpuError> {
        let device = &ctx.device;
        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(ctx.queue_family);
        let pool = unsafe { device.create_command_pool(&pool_info, None) }
            .vk_context("vkCreateCommandPool")?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffer = unsafe { device.allocate_command_buffers(&alloc_info) }
            .vk_context("vkAllocateCommandBuffers")?
            .first()
            .copied()
            .ok_or(GpuError::Vulkan {
                operation: "vkAllocateCommandBuffers",
                code: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
            })?;

        let fence = unsafe { device.create_fence(&vk::FenceCreateInfo::default(), None) }
            .vk_context("vkCreateFence")?;

        Ok(Self {
            pool,
            buffer,
            fence,
        })
    }

    /// Records `record` into the command buffer, submits it, and blocks on the
    /// fence with no timeout.
    pub fn submit_and_wait(
        &self,
        device: &Device,
        queue: vk::Queue,
        record: impl FnOnce(vk::CommandBuffer),
    ) -> Result<(), GpuError> {
        unsafe {
            device
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())
                .vk_context("vkResetCommandBuffer")?;
            let begin = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(self.buffer, &begin)
                .vk_context("vkBeginCommandBuffer")?;
            record(self.buffer);
            device
                .end_command_buffer(self.buffer)
                .vk_context("vkEndCommandBuffer")?;

            let submit = vk::SubmitInfo::default().command_buffers(std::slice::from_ref(&self.buffer));
            device
                .queue_submit(queue, std::slice::from_ref(&submit), self.fence)
                .vk_context("vkQueueSubmit")?;
            device
                .wait_for_fences(std::slice::from_ref(&self.fence), true, u64::MAX)
                .vk_context("vkWaitForFences")?;
            device
                .reset_fences(std::slice::from_ref(&self.fence))
                .vk_context("vkResetFences")?;
        }
        Ok(())
    }

    pub unsafe fn destroy(&mut self, device: &Device) {
        device.destroy_fence(self.fence, None);
        device.destroy_command_pool(self.pool, None);
    }
}
