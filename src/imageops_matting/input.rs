use image::{DynamicImage, Luma, Primitive, Rgb, RgbImage, Rgba};
use imageproc::definitions::Image;
use imageproc::map::map_colors;

use crate::error::MattingError;
use crate::utils::{normalize_with_max, subpixel_max};

/// Converts a decoded image into the 8-bit RGB working buffer.
///
/// RGB and RGBA images at any bit depth are accepted; an existing alpha
/// channel is discarded because the matte replaces it. Grayscale layouts
/// carry no color information for the affinity weights and are rejected.
///
/// # Errors
///
/// * `MattingError::UnsupportedChannelLayout` - For grayscale, gray+alpha or
///   unknown color types
pub fn prepare_image(image: &DynamicImage) -> Result<RgbImage, MattingError> {
    match image {
        DynamicImage::ImageRgb8(rgb) => Ok(rgb.clone()),
        DynamicImage::ImageRgba8(rgba) => Ok(drop_alpha(rgba)),
        DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_)
        | DynamicImage::ImageRgb32F(_)
        | DynamicImage::ImageRgba32F(_) => Ok(image.to_rgb8()),
        other => {
            let color_type = other.color();
            Err(MattingError::UnsupportedChannelLayout {
                channels: color_type.channel_count(),
                color_type: Some(color_type),
            })
        }
    }
}

/// Wraps a raw interleaved 8-bit buffer as the RGB working buffer.
///
/// # Arguments
///
/// * `width`, `height` - Image dimensions
/// * `channels` - Interleaved channels per pixel: 3 (RGB) or 4 (RGBA)
/// * `data` - Row-major pixel bytes
///
/// # Errors
///
/// * `MattingError::UnsupportedChannelLayout` - When `channels` is not 3 or 4
/// * `MattingError::InvalidBufferLength` - When `data` has the wrong size
pub fn image_from_raw(
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
) -> Result<RgbImage, MattingError> {
    if channels != 3 && channels != 4 {
        return Err(MattingError::UnsupportedChannelLayout {
            channels,
            color_type: None,
        });
    }

    let expected = width as usize * height as usize * usize::from(channels);
    if data.len() != expected {
        return Err(MattingError::InvalidBufferLength {
            expected,
            actual: data.len(),
        });
    }

    let buffer_error = || MattingError::InvalidBufferLength {
        expected,
        actual: expected,
    };
    if channels == 3 {
        RgbImage::from_raw(width, height, data).ok_or_else(buffer_error)
    } else {
        let rgba: Image<Rgba<u8>> =
            Image::from_raw(width, height, data).ok_or_else(buffer_error)?;
        Ok(drop_alpha(&rgba))
    }
}

/// Maps a mask of any subpixel type onto `[0, 1]`.
///
/// Integer masks are divided by their type maximum; `f32` masks are assumed
/// to already be probabilities and pass through unchanged.
pub fn normalize_mask<S>(mask: &Image<Luma<S>>) -> Image<Luma<f32>>
where
    S: Primitive,
{
    let max_value = subpixel_max::<S>();
    map_colors(mask, |Luma([value])| {
        Luma([normalize_with_max(value, max_value)])
    })
}

fn drop_alpha(rgba: &Image<Rgba<u8>>) -> RgbImage {
    map_colors(rgba, |Rgba([red, green, blue, _])| Rgb([red, green, blue]))
}
