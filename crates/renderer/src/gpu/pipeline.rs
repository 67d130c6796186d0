//! Pipeline lifecycle: bytecode loading and the rebuild state machine.
//!
//! The controller is generic over [`StageBackend`] so the lifecycle rules
//! (destroy before rebuild, pipeline before modules, degrade on missing
//! files) can be exercised without a device.
use std::fs;
use std::io::{self, Cursor};
use std::path::Path;

use ash::{vk, Device};

use crate::error::{GpuError, VkContext};
use crate::types::{ReloadOutcome, Resolution};

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Creates and destroys the GPU objects that make up one program.
pub trait StageBackend {
    type Modules;
    type Pipeline;

    fn create_modules(&mut self, vertex: &[u32], fragment: &[u32])
        -> Result<Self::Modules, GpuError>;
    fn create_pipeline(&mut self, modules: &Self::Modules) -> Result<Self::Pipeline, GpuError>;
    fn destroy_pipeline(&mut self, pipeline: Self::Pipeline);
    fn destroy_modules(&mut self, modules: Self::Modules);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Empty,
    Loading,
    Ready,
    Destroyed,
}

enum Slot<M, P> {
    Empty,
    Loading,
    Ready { modules: M, pipeline: P },
    Destroyed,
}

pub struct PipelineController<B: StageBackend> {
    backend: B,
    slot: Slot<B::Modules, B::Pipeline>,
}

impl<B: StageBackend> PipelineController<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            slot: Slot::Empty,
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        match self.slot {
            Slot::Empty => PipelinePhase::Empty,
            Slot::Loading => PipelinePhase::Loading,
            Slot::Ready { .. } => PipelinePhase::Ready,
            Slot::Destroyed => PipelinePhase::Destroyed,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.slot, Slot::Ready { .. })
    }

    pub fn pipeline(&self) -> Option<&B::Pipeline> {
        match &self.slot {
            Slot::Ready { pipeline, .. } => Some(pipeline),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Tears down whatever is resident and builds the program at the given
    /// paths.
    ///
    /// The rebuild is unconditional: reloading the program that is already
    /// ready still destroys and recreates it.
    pub fn reload(
        &mut self,
        vertex_path: &Path,
        fragment_path: &Path,
    ) -> Result<ReloadOutcome, GpuError> {
        if self.phase() == PipelinePhase::Destroyed {
            return Err(GpuError::ShutDown);
        }

        self.release();
        self.slot = Slot::Loading;

        let vertex = match read_bytecode(vertex_path)? {
            Ok(words) => words,
            Err(error) => return Ok(unavailable(vertex_path, error)),
        };
        let fragment = match read_bytecode(fragment_path)? {
            Ok(words) => words,
            Err(error) => return Ok(unavailable(fragment_path, error)),
        };

        let modules = self.backend.create_modules(&vertex, &fragment)?;
        let pipeline = match self.backend.create_pipeline(&modules) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                self.backend.destroy_modules(modules);
                return Err(err);
            }
        };

        self.slot = Slot::Ready { modules, pipeline };
        Ok(ReloadOutcome::Ready)
    }

    /// Final teardown; no further reloads are accepted.
    pub fn destroy(&mut self) {
        self.release();
        self.slot = Slot::Destroyed;
    }

    fn release(&mut self) {
        let previous = std::mem::replace(&mut self.slot, Slot::Empty);
        match previous {
            Slot::Ready { modules, pipeline } => {
                self.backend.destroy_pipeline(pipeline);
                self.backend.destroy_modules(modules);
            }
            Slot::Destroyed => self.slot = Slot::Destroyed,
            Slot::Empty | Slot::Loading => {}
        }
    }
}

fn unavailable(path: &Path, error: io::Error) -> ReloadOutcome {
    ReloadOutcome::Unavailable {
        path: path.to_path_buf(),
        error,
    }
}

/// Reads one SPIR-V file.
///
/// The outer result carries fatal format errors; the inner one carries the
/// recoverable case of a file that cannot be read at all.
pub fn read_bytecode(path: &Path) -> Result<Result<Vec<u32>, io::Error>, GpuError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => return Ok(Err(err)),
    };
    decode_spirv(&bytes)
        .map(Ok)
        .map_err(|source| GpuError::Bytecode {
            path: path.to_path_buf(),
            source,
        })
}

fn decode_spirv(bytes: &[u8]) -> io::Result<Vec<u32>> {
    let words = ash::util::read_spv(&mut Cursor::new(bytes))?;
    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "missing SPIR-V magic number",
        )),
    }
}

/// Shader modules of one resident program.
pub struct VulkanModules {
    vertex: vk::ShaderModule,
    fragment: vk::ShaderModule,
}

/// [`StageBackend`] that builds real Vulkan pipelines against the shared
/// layout and render pass.
pub struct VulkanStages {
    device: Device,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    resolution: Resolution,
}

impl VulkanStages {
    pub(crate) fn new(
        device: Device,
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
        resolution: Resolution,
    ) -> Self {
        Self {
            device,
            layout,
            render_pass,
            resolution,
        }
    }

    fn module(&self, code: &[u32], operation: &'static str) -> Result<vk::ShaderModule, GpuError> {
        let info = vk::ShaderModuleCreateInfo::default().code(code);
        unsafe { self.device.create_shader_module(&info, None) }.vk_context(operation)
    }
}

impl StageBackend for VulkanStages {
    type Modules = VulkanModules;
    type Pipeline = vk::Pipeline;

    fn create_modules(&mut self, vertex: &[u32], fragment: &[u32]) -> Result<VulkanModules, GpuError> {
        let vertex = self.module(vertex, "vkCreateShaderModule (vertex)")?;
        let fragment = match self.module(fragment, "vkCreateShaderModule (fragment)") {
            Ok(module) => module,
            Err(err) => {
                unsafe { self.device.destroy_shader_module(vertex, None) };
                return Err(err);
            }
        };
        Ok(VulkanModules { vertex, fragment })
    }

    fn create_pipeline(&mut self, modules: &VulkanModules) -> Result<vk::Pipeline, GpuError> {
        let entry = c"main";
        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(modules.vertex)
                .name(entry),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(modules.fragment)
                .name(entry),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

        let Resolution { width, height } = self.resolution;
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D { width, height },
        };
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(std::slice::from_ref(&viewport))
            .scissors(std::slice::from_ref(&scissor));

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);
        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);
        let blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA);
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .attachments(std::slice::from_ref(&blend_attachment));

        let info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .layout(self.layout)
            .render_pass(self.render_pass)
            .subpass(0);

        let pipelines = unsafe {
            self.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&info),
                None,
            )
        }
        .map_err(|(_, code)| GpuError::Vulkan {
            operation: "vkCreateGraphicsPipelines",
            code,
        })?;
        pipelines.first().copied().ok_or(GpuError::Vulkan {
            operation: "vkCreateGraphicsPipelines",
            code: vk::Result::ERROR_UNKNOWN,
        })
    }

    fn destroy_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) };
    }

    fn destroy_modules(&mut self, modules: VulkanModules) {
        unsafe {
            self.device.destroy_shader_module(modules.vertex, None);
            self.device.destroy_shader_module(modules.fragment, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        CreateModules(u32),
        CreatePipeline(u32),
        DestroyPipeline(u32),
        DestroyModules(u32),
    }

    #[derive(Default)]
    struct Recording {
        calls: Vec<Call>,
        next_id: u32,
        fail_pipeline: bool,
    }

    impl StageBackend for Recording {
        type Modules = u32;
        type Pipeline = u32;

        fn create_modules(&mut self, vertex: &[u32], fragment: &[u32]) -> Result<u32, GpuError> {
            assert_eq!(vertex[0], SPIRV_MAGIC);
            assert_eq!(fragment[0], SPIRV_MAGIC);
            self.next_id += 1;
            self.calls.push(Call::CreateModules(self.next_id));
            Ok(self.next_id)
        }

        fn create_pipeline(&mut self, modules: &u32) -> Result<u32, GpuError> {
            if self.fail_pipeline {
                return Err(GpuError::Vulkan {
                    operation: "vkCreateGraphicsPipelines",
                    code: vk::Result::ERROR_INITIALIZATION_FAILED,
                });
            }
            self.calls.push(Call::CreatePipeline(*modules));
            Ok(*modules)
        }

        fn destroy_pipeline(&mut self, pipeline: u32) {
            self.calls.push(Call::DestroyPipeline(pipeline));
        }

        fn destroy_modules(&mut self, modules: u32) {
            self.calls.push(Call::DestroyModules(modules));
        }
    }

    struct Program {
        _dir: TempDir,
        vertex: PathBuf,
        fragment: PathBuf,
    }

    fn spirv_bytes() -> Vec<u8> {
        [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0]
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect()
    }

    fn program() -> Program {
        let dir = tempfile::tempdir().unwrap();
        let vertex = dir.path().join("demo.vert.spv");
        let fragment = dir.path().join("demo.frag.spv");
        fs::write(&vertex, spirv_bytes()).unwrap();
        fs::write(&fragment, spirv_bytes()).unwrap();
        Program {
            _dir: dir,
            vertex,
            fragment,
        }
    }

    #[test]
    fn starts_empty_and_becomes_ready() {
        let program = program();
        let mut controller = PipelineController::new(Recording::default());
        assert_eq!(controller.phase(), PipelinePhase::Empty);

        let outcome = controller.reload(&program.vertex, &program.fragment).unwrap();
        assert!(outcome.is_ready());
        assert_eq!(controller.phase(), PipelinePhase::Ready);
        assert_eq!(controller.pipeline(), Some(&1));
    }

    #[test]
    fn reload_of_same_program_rebuilds_everything() {
        let program = program();
        let mut controller = PipelineController::new(Recording::default());
        controller.reload(&program.vertex, &program.fragment).unwrap();
        controller.reload(&program.vertex, &program.fragment).unwrap();

        assert_eq!(
            controller.backend().calls,
            vec![
                Call::CreateModules(1),
                Call::CreatePipeline(1),
                Call::DestroyPipeline(1),
                Call::DestroyModules(1),
                Call::CreateModules(2),
                Call::CreatePipeline(2),
            ]
        );
        assert_eq!(controller.pipeline(), Some(&2));
    }

    #[test]
    fn missing_file_degrades_to_loading() {
        let program = program();
        let mut controller = PipelineController::new(Recording::default());
        controller.reload(&program.vertex, &program.fragment).unwrap();

        let missing = program.vertex.with_file_name("gone.frag.spv");
        let outcome = controller.reload(&program.vertex, &missing).unwrap();
        match outcome {
            ReloadOutcome::Unavailable { path, error } => {
                assert_eq!(path, missing);
                assert_eq!(error.kind(), io::ErrorKind::NotFound);
            }
            ReloadOutcome::Ready => panic!("expected degraded reload"),
        }
        assert_eq!(controller.phase(), PipelinePhase::Loading);
        assert!(controller.pipeline().is_none());
        assert_eq!(
            controller.backend().calls.last(),
            Some(&Call::DestroyModules(1))
        );

        let outcome = controller.reload(&program.vertex, &program.fragment).unwrap();
        assert!(outcome.is_ready());
    }

    #[test]
    fn malformed_bytecode_is_fatal() {
        let program = program();
        fs::write(&program.fragment, [1u8, 2, 3]).unwrap();
        let mut controller = PipelineController::new(Recording::default());
        let err = controller
            .reload(&program.vertex, &program.fragment)
            .unwrap_err();
        assert!(matches!(err, GpuError::Bytecode { .. }));

        fs::write(&program.fragment, [0u8; 8]).unwrap();
        let err = controller
            .reload(&program.vertex, &program.fragment)
            .unwrap_err();
        match err {
            GpuError::Bytecode { path, .. } => assert_eq!(path, program.fragment),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn failed_pipeline_releases_modules() {
        let program = program();
        let mut controller = PipelineController::new(Recording {
            fail_pipeline: true,
            ..Recording::default()
        });
        assert!(controller.reload(&program.vertex, &program.fragment).is_err());
        assert_eq!(
            controller.backend().calls,
            vec![Call::CreateModules(1), Call::DestroyModules(1)]
        );
    }

    #[test]
    fn destroy_is_terminal() {
        let program = program();
        let mut controller = PipelineController::new(Recording::default());
        controller.reload(&program.vertex, &program.fragment).unwrap();
        controller.destroy();
        assert_eq!(controller.phase(), PipelinePhase::Destroyed);
        assert_eq!(
            &controller.backend().calls[2..],
            &[Call::DestroyPipeline(1), Call::DestroyModules(1)]
        );

        let err = controller
            .reload(&program.vertex, &program.fragment)
            .unwrap_err();
        assert!(matches!(err, GpuError::ShutDown));
        controller.destroy();
        assert_eq!(controller.backend().calls.len(), 4);
    }
}
