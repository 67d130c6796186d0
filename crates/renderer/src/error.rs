use std::io;
use std::path::PathBuf;

use ash::prelude::VkResult;
use ash::vk;

use crate::pitch::RowCopyError;

/// Unrecoverable failures raised while driving the Vulkan device.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("failed to load the Vulkan library: {0}")]
    Loader(#[from] ash::LoadingError),
    #[error("{operation} failed with {code:?}")]
    Vulkan {
        operation: &'static str,
        code: vk::Result,
    },
    #[error("no Vulkan physical device available")]
    NoPhysicalDevice,
    #[error("physical device exposes no graphics queue family")]
    NoQueueFamily,
    #[error("no memory type in mask {type_bits:#b} provides {flags:?}")]
    NoMemoryType {
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    },
    #[error("malformed shader bytecode at {}: {source}", path.display())]
    Bytecode { path: PathBuf, source: io::Error },
    #[error("pipeline reload requested after shutdown")]
    ShutDown,
    #[error("texture upload does not fit its image: {0}")]
    Upload(#[from] RowCopyError),
}

/// Failures raised by the DRM scanout path.
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("failed to open DRM device {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("failed to query DRM resources: {0}")]
    Query(#[source] io::Error),
    #[error("no connected display output found")]
    NoConnectedOutput,
    #[error("connected output advertises no display modes")]
    NoMode,
    #[error("no CRTC available for the connected output")]
    NoCrtc,
    #[error("{operation} failed: {source}")]
    Call {
        operation: &'static str,
        source: io::Error,
    },
    #[error(transparent)]
    Copy(#[from] RowCopyError),
}

/// Attaches the failing operation name to a raw Vulkan result.
pub(crate) trait VkContext<T> {
    fn vk_context(self, operation: &'static str) -> Result<T, GpuError>;
}

impl<T> VkContext<T> for VkResult<T> {
    fn vk_context(self, operation: &'static str) -> Result<T, GpuError> {
        self.map_err(|code| GpuError::Vulkan { operation, code })
    }
}

pub(crate) trait DrmContext<T> {
    fn drm_context(self, operation: &'static str) -> Result<T, DisplayError>;
}

impl<T> DrmContext<T> for io::Result<T> {
    fn drm_context(self, operation: &'static str) -> Result<T, DisplayError> {
        self.map_err(|source| DisplayError::Call { operation, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vulkan_errors_name_operation_and_code() {
        let result: VkResult<()> = Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        let err = result.vk_context("vkAllocateMemory").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("vkAllocateMemory"));
        assert!(message.contains("OUT_OF_DEVICE_MEMORY"));
    }

    #[test]
    fn drm_errors_name_operation() {
        let result: io::Result<()> = Err(io::Error::from(io::ErrorKind::PermissionDenied));
        match result.drm_context("set_crtc").unwrap_err() {
            DisplayError::Call { operation, .. } => assert_eq!(operation, "set_crtc"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
