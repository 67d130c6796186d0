use std::fmt;
use std::io;
use std::path::PathBuf;

/// Bytes per pixel of both the render target and the scanout buffer.
pub const BYTES_PER_PIXEL: usize = 4;

/// Pixel dimensions of the negotiated display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Tightly packed length of one row, before any driver padding.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    pub fn rows(&self) -> usize {
        self.height as usize
    }

    pub fn as_uniform(&self) -> [f32; 3] {
        [self.width as f32, self.height as f32, 1.0]
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Result of asking the pipeline controller to (re)build the current program.
#[derive(Debug)]
pub enum ReloadOutcome {
    /// A fresh pipeline is resident and ready to draw.
    Ready,
    /// A bytecode file could not be read; no pipeline is resident.
    Unavailable { path: PathBuf, error: io::Error },
}

impl ReloadOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_helpers() {
        let resolution = Resolution::new(768, 1024);
        assert_eq!(resolution.row_bytes(), 3072);
        assert_eq!(resolution.rows(), 1024);
        assert_eq!(resolution.as_uniform(), [768.0, 1024.0, 1.0]);
        assert_eq!(resolution.to_string(), "768x1024");
    }
}
