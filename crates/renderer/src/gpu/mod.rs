//! Vulkan side of the viewer.
//!
//! - `context` loads Vulkan, picks the first physical device and its first
//!   graphics queue family, and answers memory-type queries.
//! - `resources` owns the objects that live for the whole session: the mapped
//!   render target, the checkerboard texture and sampler, the uniform buffer,
//!   the descriptor set and layouts, the render pass and the frame command
//!   buffer with its fence.
//! - `pipeline` drives the reload state machine and turns SPIR-V into
//!   graphics pipelines.
//! - `uniforms` and `texture` describe the data bound at slots 0 and 1.
//! - `state` glues everything together behind `GpuState`.

mod context;
mod pipeline;
mod resources;
mod state;
mod texture;
mod uniforms;

pub use state::GpuState;
