use bytemuck::{Pod, Zeroable};

use crate::types::Resolution;

/// Size of the uniform buffer allocation; the block itself is smaller and the
/// tail is reserved for future fields.
pub const UNIFORM_BUFFER_SIZE: u64 = 64;

/// Per-frame values shared by both shader stages at binding 0.
///
/// Layout matches a std140 block of `vec3 iResolution; float iTime; vec4 iMouse;`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct UniformBlock {
    pub resolution: [f32; 3],
    pub time: f32,
    /// Pointer position and button state. Nothing feeds it yet, so it stays zero.
    pub pointer: [f32; 4],
}

impl UniformBlock {
    pub fn new(resolution: Resolution, elapsed_seconds: f32, pointer: [f32; 4]) -> Self {
        Self {
            resolution: resolution.as_uniform(),
            time: elapsed_seconds,
            pointer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn layout_matches_std140_block() {
        assert_eq!(size_of::<UniformBlock>(), 32);
        assert_eq!(offset_of!(UniformBlock, resolution), 0);
        assert_eq!(offset_of!(UniformBlock, time), 12);
        assert_eq!(offset_of!(UniformBlock, pointer), 16);
        assert!(size_of::<UniformBlock>() as u64 <= UNIFORM_BUFFER_SIZE);
    }

    #[test]
    fn encodes_resolution_and_time() {
        let block = UniformBlock::new(Resolution::new(1280, 800), 2.5, [0.0; 4]);
        let bytes = bytemuck::bytes_of(&block);
        let floats: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(floats, &[1280.0, 800.0, 1.0, 2.5, 0.0, 0.0, 0.0, 0.0]);
    }
}
