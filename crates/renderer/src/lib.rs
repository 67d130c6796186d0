//! Renderer crate for metalshade.
//!
//! Draws a fullscreen quad with the current SPIR-V program into a linear,
//! host-visible Vulkan image and pushes the result to a KMS output through a
//! CPU-mapped dumb buffer. The flow of one frame is:
//!
//! ```text
//!   GpuState::write_uniforms ─▶ UBO (coherent, mapped)
//!          │
//!          ▼
//!   GpuState::render_frame ─▶ submit ─▶ fence wait (no timeout)
//!          │
//!          ▼
//!   DrmPresenter::present ─▶ copy_rows (own pitch per side) ─▶ dirty_framebuffer
//! ```
//!
//! `GpuState` owns every Vulkan object and rebuilds only the pipeline and its
//! two shader modules when a new program is loaded; descriptor and pipeline
//! layouts are shared across reloads. `DrmPresenter` owns the card, the dumb
//! buffer and the framebuffer. Neither knows about the shader catalog or the
//! frame loop.

mod display;
mod error;
mod gpu;
mod pitch;
mod types;

pub use display::DrmPresenter;
pub use error::{DisplayError, GpuError};
pub use gpu::GpuState;
pub use pitch::RowCopyError;
pub use types::{ReloadOutcome, Resolution};
