use image::{Rgba, RgbaImage};

pub const TEXTURE_SIZE: u32 = 256;
pub const CHECKER_CELL: u32 = 32;

const LIGHT: Rgba<u8> = Rgba([200, 180, 160, 255]);
const DARK: Rgba<u8> = Rgba([50, 60, 80, 255]);

/// The procedural checkerboard bound to every program at binding 1.
pub fn checkerboard() -> RgbaImage {
    RgbaImage::from_fn(TEXTURE_SIZE, TEXTURE_SIZE, |x, y| {
        if (x / CHECKER_CELL + y / CHECKER_CELL) % 2 != 0 {
            LIGHT
        } else {
            DARK
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternates_every_cell() {
        let image = checkerboard();
        assert_eq!(image.dimensions(), (256, 256));
        assert_eq!(*image.get_pixel(0, 0), DARK);
        assert_eq!(*image.get_pixel(31, 31), DARK);
        assert_eq!(*image.get_pixel(32, 0), LIGHT);
        assert_eq!(*image.get_pixel(0, 32), LIGHT);
        assert_eq!(*image.get_pixel(32, 32), DARK);
        assert_eq!(*image.get_pixel(255, 0), LIGHT);
    }

    #[test]
    fn is_fully_opaque() {
        assert!(checkerboard().pixels().all(|pixel| pixel[3] == 255));
    }
}
