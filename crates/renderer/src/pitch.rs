//! Row-by-row copies between buffers whose rows carry different padding.
//!
//! Both the Vulkan render target and the DRM dumb buffer report their own row
//! pitch, and the two rarely agree. Every transfer between them walks the rows
//! individually; a single flat copy would shear the image whenever the
//! pitches differ.

/// Shape of the pixel region being moved: bytes per row and row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpan {
    pub row_bytes: usize,
    pub rows: usize,
}

impl RowSpan {
    pub fn new(row_bytes: usize, rows: usize) -> Self {
        Self { row_bytes, rows }
    }

    /// Smallest buffer length able to hold this span at `pitch`.
    pub fn required_len(&self, pitch: usize) -> usize {
        match self.rows {
            0 => 0,
            rows => pitch * (rows - 1) + self.row_bytes,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RowCopyError {
    #[error("{side} pitch {pitch} is smaller than the {row_bytes}-byte row")]
    PitchTooSmall {
        side: &'static str,
        pitch: usize,
        row_bytes: usize,
    },
    #[error("{side} buffer holds {actual} bytes but {needed} are required")]
    BufferTooShort {
        side: &'static str,
        needed: usize,
        actual: usize,
    },
}

/// Copies `span.rows` rows of `span.row_bytes` each from `src` to `dst`,
/// stepping each buffer by its own pitch.
pub fn copy_rows(
    dst: &mut [u8],
    dst_pitch: usize,
    src: &[u8],
    src_pitch: usize,
    span: RowSpan,
) -> Result<(), RowCopyError> {
    check("destination", dst.len(), dst_pitch, span)?;
    check("source", src.len(), src_pitch, span)?;

    let RowSpan { row_bytes, rows } = span;
    for row in 0..rows {
        let dst_offset = row * dst_pitch;
        let src_offset = row * src_pitch;
        dst[dst_offset..dst_offset + row_bytes]
            .copy_from_slice(&src[src_offset..src_offset + row_bytes]);
    }
    Ok(())
}

fn check(side: &'static str, len: usize, pitch: usize, span: RowSpan) -> Result<(), RowCopyError> {
    if span.rows > 1 && pitch < span.row_bytes {
        return Err(RowCopyError::PitchTooSmall {
            side,
            pitch,
            row_bytes: span.row_bytes,
        });
    }
    let needed = span.required_len(pitch);
    if len < needed {
        return Err(RowCopyError::BufferTooShort {
            side,
            needed,
            actual: len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTH: usize = 768;
    const ROWS: usize = 16;
    const SRC_PITCH: usize = 3200;
    const DST_PITCH: usize = 3072;

    fn padded_source() -> Vec<u8> {
        let mut src = vec![0xEE; SRC_PITCH * ROWS];
        for row in 0..ROWS {
            for col in 0..WIDTH * 4 {
                src[row * SRC_PITCH + col] = ((row * 31 + col) % 251) as u8;
            }
        }
        src
    }

    #[test]
    fn copies_each_row_at_its_own_pitch() {
        let src = padded_source();
        let mut dst = vec![0u8; DST_PITCH * ROWS];
        copy_rows(
            &mut dst,
            DST_PITCH,
            &src,
            SRC_PITCH,
            RowSpan::new(WIDTH * 4, ROWS),
        )
        .unwrap();

        for row in 0..ROWS {
            let copied = &dst[row * DST_PITCH..row * DST_PITCH + DST_PITCH];
            let expected = &src[row * SRC_PITCH..row * SRC_PITCH + DST_PITCH];
            assert_eq!(copied, expected, "row {row} mismatched");
        }
        assert!(!dst.contains(&0xEE), "padding bytes leaked into scanout");
    }

    #[test]
    fn flat_copies_are_distinguishable() {
        let src = padded_source();
        let mut dst = vec![0u8; DST_PITCH * ROWS];
        copy_rows(
            &mut dst,
            DST_PITCH,
            &src,
            SRC_PITCH,
            RowSpan::new(WIDTH * 4, ROWS),
        )
        .unwrap();

        let flat = &src[..DST_PITCH * ROWS];
        assert_eq!(&dst[..DST_PITCH], &flat[..DST_PITCH]);
        assert_ne!(dst.as_slice(), flat);

        // Source pitch applied to both sides runs past the scanout buffer.
        let err = copy_rows(
            &mut dst,
            SRC_PITCH,
            &src,
            SRC_PITCH,
            RowSpan::new(WIDTH * 4, ROWS),
        )
        .unwrap_err();
        assert!(matches!(err, RowCopyError::BufferTooShort { .. }));
    }

    #[test]
    fn leaves_destination_padding_untouched() {
        let src = vec![7u8; 8 * 2];
        let mut dst = vec![0u8; 12 * 2];
        copy_rows(&mut dst, 12, &src, 8, RowSpan::new(8, 2)).unwrap();
        assert_eq!(&dst[0..8], &[7; 8]);
        assert_eq!(&dst[8..12], &[0; 4]);
        assert_eq!(&dst[12..20], &[7; 8]);
    }

    #[test]
    fn rejects_short_buffers_and_narrow_pitches() {
        let src = vec![0u8; 100];
        let mut dst = vec![0u8; 100];
        let err = copy_rows(&mut dst, 40, &src, 40, RowSpan::new(40, 3)).unwrap_err();
        assert_eq!(
            err,
            RowCopyError::BufferTooShort {
                side: "destination",
                needed: 120,
                actual: 100
            }
        );

        let err = copy_rows(&mut dst, 10, &src, 10, RowSpan::new(20, 2)).unwrap_err();
        assert!(matches!(err, RowCopyError::PitchTooSmall { .. }));
    }

    #[test]
    fn final_row_needs_no_trailing_padding() {
        let span = RowSpan::new(WIDTH * 4, ROWS);
        assert_eq!(span.required_len(SRC_PITCH), SRC_PITCH * (ROWS - 1) + 3072);
        assert_eq!(RowSpan::new(4, 0).required_len(16), 0);
    }
}
