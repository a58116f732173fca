//! Test utilities for imageops-matting
//!
//! This module provides common fixtures for testing the matting stages.
//! It is only compiled when running tests.

use image::{Luma, Rgb, Rgba};
use imageproc::definitions::Image;

/// Foreground color used by [`create_split_image`]
pub const SPLIT_FOREGROUND: Rgb<u8> = Rgb([220, 60, 40]);
/// Background color used by [`create_split_image`]
pub const SPLIT_BACKGROUND: Rgb<u8> = Rgb([30, 90, 200]);

/// Creates a test RGB image with predefined pixel values for testing.
///
/// This function creates a 2x2 test image with known pixel values:
/// - (0,0): [200, 150, 100]
/// - (1,0): [100, 200, 150]
/// - (0,1): [150, 100, 200]
/// - (1,1): [50, 75, 25]
pub fn create_test_rgb_image() -> Image<Rgb<u8>> {
    let mut image: Image<Rgb<u8>> = Image::new(2, 2);
    image.put_pixel(0, 0, Rgb([200, 150, 100]));
    image.put_pixel(1, 0, Rgb([100, 200, 150]));
    image.put_pixel(0, 1, Rgb([150, 100, 200]));
    image.put_pixel(1, 1, Rgb([50, 75, 25]));
    image
}

/// Creates a test RGBA image with the same colors as [`create_test_rgb_image`]
/// and alpha values 255, 128, 64 and 0 in raster order.
pub fn create_test_rgba_image() -> Image<Rgba<u8>> {
    let mut image: Image<Rgba<u8>> = Image::new(2, 2);
    image.put_pixel(0, 0, Rgba([200, 150, 100, 255]));
    image.put_pixel(1, 0, Rgba([100, 200, 150, 128]));
    image.put_pixel(0, 1, Rgba([150, 100, 200, 64]));
    image.put_pixel(1, 1, Rgba([50, 75, 25, 0]));
    image
}

/// Creates a checkerboard RGB image for tests that need texture.
pub fn create_large_test_image(width: u32, height: u32) -> Image<Rgb<u8>> {
    Image::from_fn(width, height, |x, y| {
        if (x + y) % 2 == 0 {
            Rgb([200, 150, 100])
        } else {
            Rgb([100, 150, 200])
        }
    })
}

/// Mask that is certain foreground for `x < split` and certain background
/// elsewhere.
pub fn create_split_mask(width: u32, height: u32, split: u32) -> Image<Luma<f32>> {
    Image::from_fn(width, height, |x, _| Luma([if x < split { 1.0 } else { 0.0 }]))
}

/// Image matching [`create_split_mask`]: [`SPLIT_FOREGROUND`] for `x < split`,
/// [`SPLIT_BACKGROUND`] elsewhere.
pub fn create_split_image(width: u32, height: u32, split: u32) -> Image<Rgb<u8>> {
    Image::from_fn(width, height, |x, _| {
        if x < split {
            SPLIT_FOREGROUND
        } else {
            SPLIT_BACKGROUND
        }
    })
}

/// Mask with a centered foreground disc of radius `min(width, height) / 3`.
pub fn create_disc_mask(width: u32, height: u32) -> Image<Luma<f32>> {
    let cx = f64::from(width) / 2.0;
    let cy = f64::from(height) / 2.0;
    let radius = f64::from(width.min(height)) / 3.0;
    Image::from_fn(width, height, |x, y| {
        let dx = f64::from(x) + 0.5 - cx;
        let dy = f64::from(y) + 0.5 - cy;
        Luma([if dx.hypot(dy) <= radius { 1.0 } else { 0.0 }])
    })
}

/// Compares two alpha buffers with a tolerance for floating-point errors.
///
/// Returns `false` when the dimensions differ.
pub fn alphas_approx_equal(
    expected: &Image<Luma<f32>>,
    actual: &Image<Luma<f32>>,
    tolerance: f32,
) -> bool {
    expected.dimensions() == actual.dimensions()
        && expected
            .pixels()
            .zip(actual.pixels())
            .all(|(Luma([e]), Luma([a]))| (e - a).abs() <= tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_fixtures_agree() {
        let mask = create_split_mask(6, 2, 4);
        let image = create_split_image(6, 2, 4);

        assert_eq!(mask.get_pixel(3, 1), &Luma([1.0]));
        assert_eq!(mask.get_pixel(4, 1), &Luma([0.0]));
        assert_eq!(image.get_pixel(3, 1), &SPLIT_FOREGROUND);
        assert_eq!(image.get_pixel(4, 1), &SPLIT_BACKGROUND);
    }

    #[test]
    fn disc_mask_has_foreground_center_and_background_corners() {
        let mask = create_disc_mask(12, 12);

        assert_eq!(mask.get_pixel(6, 6), &Luma([1.0]));
        assert_eq!(mask.get_pixel(0, 0), &Luma([0.0]));
        assert_eq!(mask.get_pixel(11, 11), &Luma([0.0]));
    }

    #[test]
    fn checkerboard_alternates() {
        let image = create_large_test_image(10, 10);
        assert_eq!(image.get_pixel(0, 0), &Rgb([200, 150, 100]));
        assert_eq!(image.get_pixel(1, 0), &Rgb([100, 150, 200]));
        assert_eq!(image.get_pixel(1, 1), &Rgb([200, 150, 100]));
    }

    #[test]
    fn alphas_approx_equal_respects_tolerance() {
        let a = Image::from_pixel(2, 2, Luma([0.5f32]));
        let b = Image::from_pixel(2, 2, Luma([0.505f32]));

        assert!(alphas_approx_equal(&a, &b, 0.01));
        assert!(!alphas_approx_equal(&a, &b, 0.001));
        assert!(!alphas_approx_equal(&a, &Image::new(3, 2), 1.0));
    }
}
