//! Trimap-based alpha matting for background removal
//!
//! A coarse foreground probability mask, typically produced by a
//! segmentation network, is refined into a soft alpha matte:
//!
//! 1. [`build_trimap`] splits the image into Foreground, Background and an
//!    Unknown band around every boundary.
//! 2. [`build_affinities`] connects each Unknown pixel to its window
//!    neighbors with color-similarity weights.
//! 3. [`solve`] propagates alpha from the certain regions into the band.
//! 4. [`CompositeAlphaExt::composite_alpha`] and [`encode`] produce the
//!    transparent RGBA output.
//!
//! [`MattingPipeline`] ties the stages to an injected [`SegmentationModel`].
//!
//! ```
//! use std::sync::Arc;
//!
//! use image::{DynamicImage, Luma, Rgb};
//! use imageops_matting::{Image, MattingConfig, MattingPipeline, PrecomputedMask};
//!
//! # fn example() -> Result<(), imageops_matting::MattingError> {
//! let image = Image::from_fn(16, 16, |x, _| if x < 8 { Rgb([230u8, 40, 40]) } else { Rgb([20, 20, 200]) });
//! let mask = Image::from_fn(16, 16, |x, _| Luma([if x < 8 { 1.0f32 } else { 0.0 }]));
//!
//! let config = MattingConfig::builder().erosion_radius(2).build()?;
//! let pipeline = MattingPipeline::new(Arc::new(PrecomputedMask::new(mask)), config)?;
//! let outcome = pipeline.process(&DynamicImage::ImageRgb8(image))?;
//!
//! assert_eq!(outcome.image.get_pixel(0, 0)[3], 255);
//! assert_eq!(outcome.image.get_pixel(15, 0)[3], 0);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod config;
mod error;
mod imageops_matting;
mod utils;

#[cfg(test)]
mod test_utils;

use image::{ImageBuffer, Pixel};

pub use config::{MattingConfig, MattingConfigBuilder};
pub use error::{MattingError, Result};
pub use imageops_matting::affinity::{
    build_affinities, AffinityEdge, AffinityGraph, MAX_WINDOW_RADIUS,
};
pub use imageops_matting::composite::{composite, encode, CompositeAlphaExt, OutputFormat};
pub use imageops_matting::input::{image_from_raw, normalize_mask, prepare_image};
pub use imageops_matting::pipeline::{
    matte, Degradation, MattingOutcome, MattingPipeline, PrecomputedMask, SegmentationModel,
    SegmentationModelMut, SerializedModel,
};
pub use imageops_matting::solver::{solve, AlphaSolution, SolveStatus, SolverParams};
pub use imageops_matting::summed_area_table::SummedAreaTable;
pub use imageops_matting::trimap::{build_trimap, build_trimap_from_luma, Trimap, TrimapLabel};

pub type Image<P> = ImageBuffer<P, Vec<<P as Pixel>::Subpixel>>;
