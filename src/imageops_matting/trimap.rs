//! Trimap construction from a coarse foreground probability mask
//!
//! A trimap splits the image into three disjoint regions:
//!
//! - **Foreground**: alpha is known to be 1
//! - **Background**: alpha is known to be 0
//! - **Unknown**: alpha has to be solved for
//!
//! The mask is first double-thresholded. Both certain regions are then
//! eroded with a square structuring element, widening the unknown band
//! around every boundary. Segmentation masks tend to be confidently wrong
//! right at hard edges (hair, fur, semi-transparent fabric); erosion hands
//! those pixels to the solver instead of trusting the mask.
//!
//! The trimap is stored as an `Image<Luma<u8>>` using the conventional
//! encoding `0` / `128` / `255` so it can be saved or inspected directly.

use image::{GrayImage, Luma, Primitive};
use imageproc::definitions::Image;
use imageproc::distance_transform::Norm;
use imageproc::map::map_colors;
use imageproc::morphology::erode;
use tracing::debug;

/// Label of a single trimap pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TrimapLabel {
    Background = 0,
    Unknown = 128,
    Foreground = 255,
}

impl TrimapLabel {
    /// Luma value used to store the label
    #[inline]
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Interprets a stored luma value. Anything other than 0 or 255 is unknown.
    #[inline]
    #[must_use]
    pub const fn from_value(value: u8) -> Self {
        match value {
            0 => Self::Background,
            255 => Self::Foreground,
            _ => Self::Unknown,
        }
    }

    /// Fixed alpha for certain labels, `None` for `Unknown`
    #[inline]
    #[must_use]
    pub const fn known_alpha(self) -> Option<f32> {
        match self {
            Self::Background => Some(0.0),
            Self::Foreground => Some(1.0),
            Self::Unknown => None,
        }
    }
}

/// Three-region labeling of an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trimap {
    labels: GrayImage,
}

impl Trimap {
    /// Wraps an externally produced trimap.
    ///
    /// Values other than `0` and `255` are normalized to the unknown value
    /// `128`, so every pixel ends up with exactly one label.
    #[must_use]
    pub fn from_luma(image: &GrayImage) -> Self {
        let labels = map_colors(image, |Luma([value])| {
            Luma([TrimapLabel::from_value(value).value()])
        });
        Self { labels }
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.labels.dimensions()
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.labels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.labels.height()
    }

    /// Label at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    #[must_use]
    pub fn label(&self, x: u32, y: u32) -> TrimapLabel {
        TrimapLabel::from_value(self.labels.get_pixel(x, y)[0])
    }

    /// Label of the pixel at row-major `index`.
    #[inline]
    #[must_use]
    pub fn label_at(&self, index: usize) -> TrimapLabel {
        TrimapLabel::from_value(self.labels.as_raw()[index])
    }

    /// Labels in row-major order.
    pub fn labels(&self) -> impl Iterator<Item = TrimapLabel> + '_ {
        self.labels.as_raw().iter().map(|&value| TrimapLabel::from_value(value))
    }

    /// Number of pixels carrying `label`.
    #[must_use]
    pub fn count(&self, label: TrimapLabel) -> usize {
        self.labels().filter(|&l| l == label).count()
    }

    /// Returns the single certain label covering the whole image, if any.
    ///
    /// An image that is entirely foreground or entirely background needs no
    /// solve. An all-unknown trimap is not reported here; the solver handles
    /// it by falling back on the coarse mask.
    #[must_use]
    pub fn uniform_label(&self) -> Option<TrimapLabel> {
        let mut labels = self.labels();
        let first = labels.next()?;
        if first == TrimapLabel::Unknown {
            return None;
        }
        labels.all(|label| label == first).then_some(first)
    }

    /// Trimap as a luma image (`0` / `128` / `255`).
    #[must_use]
    pub const fn as_luma(&self) -> &GrayImage {
        &self.labels
    }

    #[must_use]
    pub fn into_luma(self) -> GrayImage {
        self.labels
    }
}

/// Builds a trimap from a probability mask.
///
/// A pixel is `Foreground` if `mask >= fg_threshold`, `Background` if
/// `mask <= bg_threshold` and `Unknown` otherwise (including NaN). Both
/// certain regions are then eroded by `erosion_radius` pixels using the
/// L∞ norm: a certain pixel becomes `Unknown` if any pixel of a different
/// label lies within the `(2r+1)×(2r+1)` square around it. The image border
/// does not erode.
///
/// Callers are expected to pass `fg_threshold > bg_threshold`; when they
/// overlap the foreground test wins.
///
/// # Examples
///
/// ```
/// use image::Luma;
/// use imageops_matting::{build_trimap, Image, TrimapLabel};
///
/// let mask: Image<Luma<f32>> = Image::from_fn(10, 10, |x, _| Luma([if x < 5 { 1.0 } else { 0.0 }]));
/// let trimap = build_trimap(&mask, 0.94, 0.04, 1);
///
/// assert_eq!(trimap.label(3, 0), TrimapLabel::Foreground);
/// assert_eq!(trimap.label(4, 0), TrimapLabel::Unknown);
/// assert_eq!(trimap.label(5, 0), TrimapLabel::Unknown);
/// assert_eq!(trimap.label(6, 0), TrimapLabel::Background);
/// ```
pub fn build_trimap(
    mask: &Image<Luma<f32>>,
    fg_threshold: f32,
    bg_threshold: f32,
    erosion_radius: u8,
) -> Trimap {
    let labels = map_colors(mask, |Luma([probability])| {
        let label = if probability >= fg_threshold {
            TrimapLabel::Foreground
        } else if probability <= bg_threshold {
            TrimapLabel::Background
        } else {
            TrimapLabel::Unknown
        };
        Luma([label.value()])
    });

    if erosion_radius == 0 {
        return Trimap { labels };
    }

    let radius = erosion_radius.min(MAX_EROSION_RADIUS);
    let foreground = erode_region(&labels, TrimapLabel::Foreground, radius);
    let background = erode_region(&labels, TrimapLabel::Background, radius);

    let eroded = Image::from_fn(labels.width(), labels.height(), |x, y| {
        let label = if foreground.get_pixel(x, y)[0] > 0 {
            TrimapLabel::Foreground
        } else if background.get_pixel(x, y)[0] > 0 {
            TrimapLabel::Background
        } else {
            TrimapLabel::Unknown
        };
        Luma([label.value()])
    });

    let trimap = Trimap { labels: eroded };
    debug!(
        erosion_radius,
        foreground = trimap.count(TrimapLabel::Foreground),
        background = trimap.count(TrimapLabel::Background),
        unknown = trimap.count(TrimapLabel::Unknown),
        "trimap built"
    );
    trimap
}

/// Builds a trimap from an integer mask (e.g. a `u8` mask read from disk).
///
/// Thresholds are still given on the `[0, 1]` scale.
pub fn build_trimap_from_luma<S>(
    mask: &Image<Luma<S>>,
    fg_threshold: f32,
    bg_threshold: f32,
    erosion_radius: u8,
) -> Trimap
where
    S: Primitive,
    Luma<S>: image::Pixel<Subpixel = S>,
{
    let normalized = crate::imageops_matting::input::normalize_mask(mask);
    build_trimap(&normalized, fg_threshold, bg_threshold, erosion_radius)
}

/// Distance transforms saturate at 255, so larger radii cannot be told apart.
const MAX_EROSION_RADIUS: u8 = 254;

/// Binary image of `label` (255 inside, 0 outside), eroded by `radius`.
///
/// A region without any complement pixel is left untouched: only other
/// labels erode, the image border never does.
fn erode_region(labels: &GrayImage, label: TrimapLabel, radius: u8) -> GrayImage {
    let region = map_colors(labels, |Luma([value])| {
        Luma([if value == label.value() { 255 } else { 0 }])
    });

    if region.as_raw().iter().all(|&value| value > 0) {
        return region;
    }
    erode(&region, Norm::LInf, radius)
}
