//! KMS scanout through a single CPU-mapped dumb buffer.
//!
//! The presenter picks the first connected connector and its first mode,
//! allocates one XRGB8888 dumb buffer of that size and programs the CRTC once.
//! Each `present` copies a rendered frame into the buffer row by row and marks
//! the framebuffer dirty so virtual GPUs pick up the change. There is no page
//! flip and no vblank wait; tearing under load is accepted.
use std::fs::{File, OpenOptions};
use std::os::unix::io::{AsFd, BorrowedFd};
use std::path::Path;

use drm::buffer::{Buffer, DrmFourcc};
use drm::control::dumbbuffer::DumbBuffer;
use drm::control::{connector, crtc, framebuffer, ClipRect, Device as ControlDevice, Mode};

use crate::error::{DisplayError, DrmContext};
use crate::pitch::{copy_rows, RowSpan};
use crate::types::Resolution;

struct Card(File);

impl AsFd for Card {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

impl drm::Device for Card {}
impl ControlDevice for Card {}

pub struct DrmPresenter {
    card: Card,
    buffer: DumbBuffer,
    framebuffer: framebuffer::Handle,
    resolution: Resolution,
    mode_name: String,
}

impl DrmPresenter {
    pub fn open(path: &Path) -> Result<Self, DisplayError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| DisplayError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let card = Card(file);

        let resources = card.resource_handles().map_err(DisplayError::Query)?;
        let (connector, info) = resources
            .connectors()
            .iter()
            .find_map(|&handle| {
                let info = card.get_connector(handle, true).ok()?;
                (info.state() == connector::State::Connected).then_some((handle, info))
            })
            .ok_or(DisplayError::NoConnectedOutput)?;

        for (index, mode) in info.modes().iter().enumerate() {
            let (width, height) = mode.size();
            tracing::debug!(index, width, height, refresh = mode.vrefresh(), "display mode");
        }
        let mode: Mode = info.modes().first().copied().ok_or(DisplayError::NoMode)?;
        let (width, height) = mode.size();
        let resolution = Resolution::new(u32::from(width), u32::from(height));

        let crtc: crtc::Handle = info
            .current_encoder()
            .and_then(|encoder| card.get_encoder(encoder).ok())
            .and_then(|encoder| encoder.crtc())
            .or_else(|| resources.crtcs().first().copied())
            .ok_or(DisplayError::NoCrtc)?;

        let buffer = card
            .create_dumb_buffer(
                (resolution.width, resolution.height),
                DrmFourcc::Xrgb8888,
                32,
            )
            .drm_context("create_dumb_buffer")?;
        let framebuffer = assemble(
            buffer,
            |buffer| card.add_framebuffer(buffer, 24, 32).drm_context("add_framebuffer"),
            |framebuffer| {
                card.set_crtc(crtc, Some(framebuffer), (0, 0), &[connector], Some(mode))
                    .drm_context("set_crtc")
            },
            |framebuffer, buffer| release(&card, framebuffer, buffer),
        )?;

        let mode_name = mode.name().to_string_lossy().into_owned();
        tracing::debug!(
            device = %path.display(),
            mode = %mode_name,
            %resolution,
            pitch = buffer.pitch(),
            "programmed CRTC with dumb buffer"
        );

        Ok(Self {
            card,
            buffer,
            framebuffer,
            resolution,
            mode_name,
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn mode_name(&self) -> &str {
        &self.mode_name
    }

    /// Copies one frame into scanout memory and flags it for refresh.
    ///
    /// `row_pitch` is the stride of `pixels`; the destination stride is the
    /// dumb buffer's own pitch.
    pub fn present(&mut self, pixels: &[u8], row_pitch: usize) -> Result<(), DisplayError> {
        let span = RowSpan::new(self.resolution.row_bytes(), self.resolution.rows());
        let dst_pitch = self.buffer.pitch() as usize;
        {
            let mut mapping = self
                .card
                .map_dumb_buffer(&mut self.buffer)
                .drm_context("map_dumb_buffer")?;
            copy_rows(mapping.as_mut(), dst_pitch, pixels, row_pitch, span)?;
        }

        let clip = ClipRect::new(
            0,
            0,
            clamp_u16(self.resolution.width),
            clamp_u16(self.resolution.height),
        );
        self.card
            .dirty_framebuffer(self.framebuffer, &[clip])
            .drm_context("dirty_framebuffer")
    }
}

fn clamp_u16(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// Attaches a framebuffer to `buffer` and programs the CRTC with it.
///
/// When a step fails, whatever was already created is handed to `release`
/// before the error is returned.
fn assemble<B, F: Copy, E>(
    buffer: B,
    attach: impl FnOnce(&B) -> Result<F, E>,
    program: impl FnOnce(F) -> Result<(), E>,
    release: impl FnOnce(Option<F>, B),
) -> Result<F, E> {
    let framebuffer = match attach(&buffer) {
        Ok(framebuffer) => framebuffer,
        Err(err) => {
            release(None, buffer);
            return Err(err);
        }
    };
    if let Err(err) = program(framebuffer) {
        release(Some(framebuffer), buffer);
        return Err(err);
    }
    Ok(framebuffer)
}

fn release(card: &Card, framebuffer: Option<framebuffer::Handle>, buffer: DumbBuffer) {
    if let Some(framebuffer) = framebuffer {
        if let Err(err) = card.destroy_framebuffer(framebuffer) {
            tracing::debug!(error = %err, "failed to destroy framebuffer");
        }
    }
    if let Err(err) = card.destroy_dumb_buffer(buffer) {
        tracing::debug!(error = %err, "failed to destroy dumb buffer");
    }
}

impl Drop for DrmPresenter {
    fn drop(&mut self) {
        release(&self.card, Some(self.framebuffer), self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Step {
        Attach(u32),
        Program(u32),
        Release(Option<u32>, u32),
    }

    fn run(attach_ok: bool, program_ok: bool) -> (Result<u32, &'static str>, Vec<Step>) {
        let log = RefCell::new(Vec::new());
        let result = assemble(
            7u32,
            |buffer| {
                log.borrow_mut().push(Step::Attach(*buffer));
                if attach_ok {
                    Ok(70)
                } else {
                    Err("add_framebuffer")
                }
            },
            |framebuffer| {
                log.borrow_mut().push(Step::Program(framebuffer));
                if program_ok {
                    Ok(())
                } else {
                    Err("set_crtc")
                }
            },
            |framebuffer, buffer| log.borrow_mut().push(Step::Release(framebuffer, buffer)),
        );
        (result, log.into_inner())
    }

    #[test]
    fn successful_setup_keeps_everything() {
        let (result, steps) = run(true, true);
        assert_eq!(result, Ok(70));
        assert_eq!(steps, vec![Step::Attach(7), Step::Program(70)]);
    }

    #[test]
    fn failed_framebuffer_releases_the_buffer() {
        let (result, steps) = run(false, true);
        assert_eq!(result, Err("add_framebuffer"));
        assert_eq!(steps, vec![Step::Attach(7), Step::Release(None, 7)]);
    }

    #[test]
    fn failed_modeset_releases_framebuffer_and_buffer() {
        let (result, steps) = run(true, false);
        assert_eq!(result, Err("set_crtc"));
        assert_eq!(
            steps,
            vec![Step::Attach(7), Step::Program(70), Step::Release(Some(70), 7)]
        );
    }
}
