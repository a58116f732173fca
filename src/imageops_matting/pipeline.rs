//! Request-level matting pipeline
//!
//! The segmentation model is injected through [`SegmentationModel`] and
//! shared as a long-lived `Arc` handle; everything else is a pure function
//! of the request's image, mask and configuration:
//!
//! ```text
//! image ─► model.infer ─► mask ─► trimap ─► affinity graph ─► alpha ─► RGBA ─► bytes
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use image::{DynamicImage, Luma, RgbImage, Rgba};
use imageproc::definitions::Image;
use tracing::{debug, info, instrument, warn};

use crate::config::MattingConfig;
use crate::error::MattingError;
use crate::imageops_matting::affinity::build_affinities;
use crate::imageops_matting::composite::{encode, CompositeAlphaExt, OutputFormat};
use crate::imageops_matting::input::prepare_image;
use crate::imageops_matting::solver::{solve, SolveStatus};
use crate::imageops_matting::trimap::{build_trimap, Trimap, TrimapLabel};
use crate::utils::validate_matching_dimensions;

/// Segmentation model producing a coarse foreground probability mask
///
/// Implementations must be safe to call from several requests at once.
/// Engines that need `&mut self` can be shared through [`SerializedModel`].
///
/// Closures of the right shape implement this trait, which keeps tests and
/// simple integrations free of boilerplate:
///
/// ```
/// use image::{Luma, RgbImage};
/// use imageops_matting::{Image, MattingError, SegmentationModel};
///
/// let everything_is_foreground = |image: &RgbImage| -> Result<Image<Luma<f32>>, MattingError> {
///     Ok(Image::from_pixel(image.width(), image.height(), Luma([1.0])))
/// };
/// let mask = everything_is_foreground.infer(&RgbImage::new(4, 4)).unwrap();
/// assert_eq!(mask.dimensions(), (4, 4));
/// ```
pub trait SegmentationModel: Send + Sync {
    /// Returns a probability mask in `[0, 1]` at the image's resolution.
    ///
    /// # Errors
    ///
    /// * `MattingError::Inference` - The model failed
    fn infer(&self, image: &RgbImage) -> Result<Image<Luma<f32>>, MattingError>;

    /// Name used in logs and error messages
    fn name(&self) -> &str {
        "segmentation-model"
    }
}

impl<F> SegmentationModel for F
where
    F: Fn(&RgbImage) -> Result<Image<Luma<f32>>, MattingError> + Send + Sync,
{
    fn infer(&self, image: &RgbImage) -> Result<Image<Luma<f32>>, MattingError> {
        self(image)
    }
}

/// Segmentation engine that is not reentrant
pub trait SegmentationModelMut: Send {
    /// # Errors
    ///
    /// * `MattingError::Inference` - The model failed
    fn infer_mut(&mut self, image: &RgbImage) -> Result<Image<Luma<f32>>, MattingError>;

    fn name(&self) -> &str {
        "segmentation-model"
    }
}

/// Shares a [`SegmentationModelMut`] by serializing calls behind a mutex
pub struct SerializedModel<M> {
    name: String,
    inner: Mutex<M>,
}

impl<M> SerializedModel<M>
where
    M: SegmentationModelMut,
{
    pub fn new(model: M) -> Self {
        Self {
            name: model.name().to_owned(),
            inner: Mutex::new(model),
        }
    }
}

impl<M> SegmentationModel for SerializedModel<M>
where
    M: SegmentationModelMut,
{
    fn infer(&self, image: &RgbImage) -> Result<Image<Luma<f32>>, MattingError> {
        let mut model = self
            .inner
            .lock()
            .map_err(|_| MattingError::inference(&self.name, "model lock poisoned"))?;
        model.infer_mut(image)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Model that always returns the same, externally computed mask
///
/// Useful when inference runs elsewhere (another service, a file on disk).
#[derive(Debug, Clone)]
pub struct PrecomputedMask {
    mask: Image<Luma<f32>>,
}

impl PrecomputedMask {
    #[must_use]
    pub const fn new(mask: Image<Luma<f32>>) -> Self {
        Self { mask }
    }
}

impl SegmentationModel for PrecomputedMask {
    fn infer(&self, image: &RgbImage) -> Result<Image<Luma<f32>>, MattingError> {
        validate_matching_dimensions(image.dimensions(), self.mask.dimensions())?;
        Ok(self.mask.clone())
    }

    fn name(&self) -> &str {
        "precomputed-mask"
    }
}

/// Numerical edge case absorbed by the pipeline instead of failing
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Degradation {
    /// The whole image is one certain label after erosion; the solver was
    /// skipped and the output is uniformly opaque or transparent
    DegenerateTrimap(TrimapLabel),
    /// The solver hit its iteration cap; alpha is the clamped best effort
    SolverNonConvergence { iterations: usize, residual: f64 },
}

/// Everything one matting request produces
#[derive(Debug, Clone)]
pub struct MattingOutcome {
    pub trimap: Trimap,
    /// Alpha per pixel in `[0, 1]`
    pub alpha: Image<Luma<f32>>,
    /// Original colors with the solved alpha channel
    pub image: Image<Rgba<u8>>,
    pub solve_status: SolveStatus,
    pub degradations: Vec<Degradation>,
}

impl MattingOutcome {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    /// Serializes the composited image.
    ///
    /// # Errors
    ///
    /// * `MattingError::Image` - When encoding fails
    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>, MattingError> {
        encode(&self.image, format)
    }
}

/// Runs trimap construction, alpha solve and compositing on one image.
///
/// This is the pure core of the pipeline: no model, no shared state.
///
/// # Errors
///
/// * `MattingError::InvalidMaskShape` - When mask and image dimensions differ
/// * `MattingError::InvalidConfig` - When `config` fails validation
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn matte(
    image: &RgbImage,
    mask: &Image<Luma<f32>>,
    config: &MattingConfig,
) -> Result<MattingOutcome, MattingError> {
    validate_matching_dimensions(image.dimensions(), mask.dimensions())?;
    config.validate()?;

    let started = Instant::now();
    let trimap = build_trimap(
        mask,
        config.fg_threshold,
        config.bg_threshold,
        config.erosion_radius,
    );

    let mut degradations = Vec::new();
    let (alpha, solve_status) = if let Some(label) = trimap.uniform_label() {
        warn!(?label, "trimap is degenerate, skipping alpha solve");
        degradations.push(Degradation::DegenerateTrimap(label));
        let value = label.known_alpha().unwrap_or(0.0);
        (
            Image::from_pixel(image.width(), image.height(), Luma([value])),
            SolveStatus::NoUnknownPixels,
        )
    } else {
        let graph = build_affinities(
            image,
            &trimap,
            config.window_radius,
            config.variance_floor,
        )?;
        let solution = solve(&trimap, &graph, mask, &config.solver_params())?;
        if let SolveStatus::NotConverged {
            iterations,
            residual,
        } = solution.status
        {
            warn!(
                iterations,
                residual, "alpha solve did not converge, using best-effort result"
            );
            degradations.push(Degradation::SolverNonConvergence {
                iterations,
                residual,
            });
        }
        (solution.alpha, solution.status)
    };

    let composited = image.clone().composite_alpha(&alpha)?;
    debug!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        degraded = !degradations.is_empty(),
        "matting finished"
    );

    Ok(MattingOutcome {
        trimap,
        alpha,
        image: composited,
        solve_status,
        degradations,
    })
}

/// Long-lived matting handle sharing one segmentation model across requests
///
/// Create it once at startup and call it from any number of threads; every
/// call works on its own buffers.
#[derive(Clone)]
pub struct MattingPipeline {
    model: Arc<dyn SegmentationModel>,
    config: MattingConfig,
}

impl fmt::Debug for MattingPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MattingPipeline")
            .field("model", &self.model.name())
            .field("config", &self.config)
            .finish()
    }
}

impl MattingPipeline {
    /// # Errors
    ///
    /// * `MattingError::InvalidConfig` - When `config` fails validation
    pub fn new(
        model: Arc<dyn SegmentationModel>,
        config: MattingConfig,
    ) -> Result<Self, MattingError> {
        config.validate()?;
        info!(model = model.name(), "matting pipeline ready");
        Ok(Self { model, config })
    }

    #[must_use]
    pub const fn config(&self) -> &MattingConfig {
        &self.config
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Mattes a decoded image.
    ///
    /// # Errors
    ///
    /// * `MattingError::UnsupportedChannelLayout` - Grayscale input
    /// * `MattingError::Inference` - The model failed
    /// * `MattingError::InvalidMaskShape` - The model returned a mask of the
    ///   wrong size
    pub fn process(&self, image: &DynamicImage) -> Result<MattingOutcome, MattingError> {
        let rgb = prepare_image(image)?;
        self.process_rgb(&rgb)
    }

    /// Mattes an RGB working buffer.
    ///
    /// # Errors
    ///
    /// See [`MattingPipeline::process`].
    #[instrument(skip_all, fields(model = self.model.name()))]
    pub fn process_rgb(&self, image: &RgbImage) -> Result<MattingOutcome, MattingError> {
        let started = Instant::now();
        let mask = self.model.infer(image)?;
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "segmentation mask inferred"
        );
        matte(image, &mask, &self.config)
    }

    /// Mattes a decoded image and encodes it with the configured format.
    ///
    /// # Errors
    ///
    /// See [`MattingPipeline::process`]; also `MattingError::Image` when
    /// encoding fails.
    pub fn remove_background(&self, image: &DynamicImage) -> Result<Vec<u8>, MattingError> {
        self.process(image)?.encode(self.config.output_format)
    }

    /// Decodes an uploaded file, mattes it and encodes the result.
    ///
    /// # Errors
    ///
    /// * `MattingError::Image` - The bytes are not a supported image
    /// * Everything [`MattingPipeline::remove_background`] reports
    pub fn remove_background_from_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>, MattingError> {
        let image = image::load_from_memory(bytes)?;
        self.remove_background(&image)
    }
}
