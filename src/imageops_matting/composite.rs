//! Alpha compositing and output encoding
//!
//! The solved alpha becomes the fourth channel of the original colors,
//! scaled to the subpixel range. Colors are never premultiplied. The
//! composited RGBA8 image is then serialized as PNG or as raw pixel bytes.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Luma, Pixel, Primitive, Rgb, Rgba};
use imageproc::definitions::Image;
use imageproc::map::map_colors2;
use serde::{Deserialize, Serialize};

use crate::error::MattingError;
use crate::utils::{clamp_unit, subpixel_max, validate_matching_dimensions};

/// Serialization format for the composited image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// Raw interleaved RGBA8 pixel data (4 bytes per pixel, row-major)
    Rgba8,
}

impl OutputFormat {
    /// MIME type to report for the encoded bytes
    #[must_use]
    pub const fn media_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Rgba8 => "application/octet-stream",
        }
    }
}

/// Trait providing alpha compositing from a solved alpha buffer
///
/// RGB images gain an alpha channel; RGBA images have theirs replaced. The
/// output always carries an explicit alpha channel, in R, G, B, A order.
pub trait CompositeAlphaExt {
    type Subpixel: Primitive;

    /// Merges `alpha` (values in `[0, 1]`) into the image.
    ///
    /// Each output pixel is `(R, G, B, round(alpha × MAX))` where `MAX` is
    /// the maximum value of the subpixel type. Out-of-range alpha values are
    /// clamped.
    ///
    /// This consumes the original image.
    ///
    /// # Errors
    ///
    /// * `MattingError::InvalidMaskShape` - When image and alpha dimensions differ
    ///
    /// # Examples
    ///
    /// ```
    /// use image::{Luma, Rgb, Rgba};
    /// use imageops_matting::{CompositeAlphaExt, Image};
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let image: Image<Rgb<u8>> = Image::from_pixel(2, 1, Rgb([10, 20, 30]));
    /// let alpha: Image<Luma<f32>> = Image::from_raw(2, 1, vec![1.0, 0.5]).unwrap();
    ///
    /// let rgba = image.composite_alpha(&alpha)?;
    /// assert_eq!(rgba.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    /// assert_eq!(rgba.get_pixel(1, 0), &Rgba([10, 20, 30, 128]));
    /// # Ok(())
    /// # }
    /// # example().unwrap();
    /// ```
    fn composite_alpha(
        self,
        alpha: &Image<Luma<f32>>,
    ) -> Result<Image<Rgba<Self::Subpixel>>, MattingError>
    where
        Rgba<Self::Subpixel>: Pixel<Subpixel = Self::Subpixel>;
}

impl<S> CompositeAlphaExt for Image<Rgb<S>>
where
    Rgb<S>: Pixel<Subpixel = S>,
    Rgba<S>: Pixel<Subpixel = S>,
    S: Primitive,
{
    type Subpixel = S;

    fn composite_alpha(
        self,
        alpha: &Image<Luma<f32>>,
    ) -> Result<Image<Rgba<Self::Subpixel>>, MattingError>
    where
        Rgba<Self::Subpixel>: Pixel<Subpixel = Self::Subpixel>,
    {
        validate_matching_dimensions(self.dimensions(), alpha.dimensions())?;

        let max_value = subpixel_max::<S>();
        Ok(map_colors2(&self, alpha, |Rgb([red, green, blue]), Luma([a])| {
            Rgba([red, green, blue, scale_alpha::<S>(a, max_value)])
        }))
    }
}

impl<S> CompositeAlphaExt for Image<Rgba<S>>
where
    Rgba<S>: Pixel<Subpixel = S>,
    S: Primitive,
{
    type Subpixel = S;

    fn composite_alpha(
        self,
        alpha: &Image<Luma<f32>>,
    ) -> Result<Image<Rgba<Self::Subpixel>>, MattingError>
    where
        Rgba<Self::Subpixel>: Pixel<Subpixel = Self::Subpixel>,
    {
        validate_matching_dimensions(self.dimensions(), alpha.dimensions())?;

        let max_value = subpixel_max::<S>();
        let mut image = self;
        image
            .pixels_mut()
            .zip(alpha.pixels())
            .for_each(|(pixel, Luma([a]))| pixel[3] = scale_alpha::<S>(*a, max_value));
        Ok(image)
    }
}

/// Free-function form of [`CompositeAlphaExt::composite_alpha`] for borrowed images.
///
/// # Errors
///
/// * `MattingError::InvalidMaskShape` - When image and alpha dimensions differ
pub fn composite<S>(
    image: &Image<Rgb<S>>,
    alpha: &Image<Luma<f32>>,
) -> Result<Image<Rgba<S>>, MattingError>
where
    Rgb<S>: Pixel<Subpixel = S>,
    Rgba<S>: Pixel<Subpixel = S>,
    S: Primitive,
{
    image.clone().composite_alpha(alpha)
}

/// Serializes an RGBA8 image.
///
/// # Errors
///
/// * `MattingError::Image` - When the PNG encoder fails
pub fn encode(image: &Image<Rgba<u8>>, format: OutputFormat) -> Result<Vec<u8>, MattingError> {
    match format {
        OutputFormat::Png => {
            let mut bytes = Vec::new();
            PngEncoder::new(&mut bytes).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgba8,
            )?;
            Ok(bytes)
        }
        OutputFormat::Rgba8 => Ok(image.as_raw().clone()),
    }
}

#[inline]
fn scale_alpha<S: Primitive>(alpha: f32, max_value: f32) -> S {
    let scaled = clamp_unit(alpha, 0.0) * max_value;
    // Integer subpixels round to nearest; float subpixels keep the exact value
    let value = if S::DEFAULT_MAX_VALUE.to_f32() == Some(1.0) {
        scaled
    } else {
        scaled.round()
    };
    S::from(value).unwrap_or(S::DEFAULT_MIN_VALUE)
}
