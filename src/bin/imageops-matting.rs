//! Background removal CLI
//!
//! Refines a precomputed segmentation mask into an alpha matte and writes the
//! transparent result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use imageops_matting::{
    normalize_mask, Degradation, MattingConfig, MattingPipeline, OutputFormat, PrecomputedMask,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Trimap-based alpha matting for background removal
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "imageops-matting")]
struct Cli {
    /// Input image (RGB or RGBA)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Coarse foreground mask (grayscale, white = foreground)
    #[arg(short, long, value_name = "MASK")]
    mask: PathBuf,

    /// Output file [default: <INPUT stem>.matte.png]
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// JSON configuration file; flags below override it
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<CliOutputFormat>,

    /// Mask probability at or above which a pixel is foreground
    #[arg(long)]
    fg_threshold: Option<f32>,

    /// Mask probability at or below which a pixel is background
    #[arg(long)]
    bg_threshold: Option<f32>,

    /// Erosion radius of both certain regions, in pixels
    #[arg(long)]
    erosion_radius: Option<u8>,

    /// Affinity window radius
    #[arg(long)]
    window_radius: Option<u32>,

    /// Solver iteration cap
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Solver relative residual tolerance
    #[arg(long)]
    tolerance: Option<f64>,

    /// Also write the trimap as a grayscale PNG
    #[arg(long, value_name = "TRIMAP")]
    trimap_out: Option<PathBuf>,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum CliOutputFormat {
    Png,
    Rgba8,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(cli_format: CliOutputFormat) -> Self {
        match cli_format {
            CliOutputFormat::Png => Self::Png,
            CliOutputFormat::Rgba8 => Self::Rgba8,
        }
    }
}

impl Cli {
    fn matting_config(&self) -> Result<MattingConfig> {
        let base = match &self.config {
            Some(path) => MattingConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => MattingConfig::default(),
        };

        let mut builder = MattingConfig::builder()
            .fg_threshold(self.fg_threshold.unwrap_or(base.fg_threshold))
            .bg_threshold(self.bg_threshold.unwrap_or(base.bg_threshold))
            .erosion_radius(self.erosion_radius.unwrap_or(base.erosion_radius))
            .window_radius(self.window_radius.unwrap_or(base.window_radius))
            .max_iterations(self.max_iterations.unwrap_or(base.max_iterations))
            .tolerance(self.tolerance.unwrap_or(base.tolerance))
            .variance_floor(base.variance_floor)
            .prior_weight(base.prior_weight)
            .output_format(base.output_format);
        if let Some(format) = self.format {
            builder = builder.output_format(format.into());
        }

        builder.build().context("Invalid matting configuration")
    }

    fn output_path(&self, format: OutputFormat) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let extension = match format {
                OutputFormat::Png => "matte.png",
                OutputFormat::Rgba8 => "matte.rgba",
            };
            self.input.with_extension(extension)
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose).context("Failed to initialize tracing")?;

    let config = cli.matting_config()?;
    debug!(?config, "configuration resolved");

    let image = open_image(&cli.input)?;
    let mask = normalize_mask(&open_image(&cli.mask)?.to_luma8());

    let started = Instant::now();
    let pipeline = MattingPipeline::new(Arc::new(PrecomputedMask::new(mask)), config)?;
    let outcome = pipeline
        .process(&image)
        .with_context(|| format!("Failed to matte {}", cli.input.display()))?;

    for degradation in &outcome.degradations {
        match degradation {
            Degradation::DegenerateTrimap(label) => {
                warn!(?label, "mask is uniform after erosion, output is uniform");
            }
            Degradation::SolverNonConvergence {
                iterations,
                residual,
            } => warn!(iterations, residual, "solver stopped before converging"),
        }
    }

    let format = pipeline.config().output_format;
    let output = cli.output_path(format);
    let bytes = outcome.encode(format)?;
    std::fs::write(&output, bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if let Some(trimap_path) = &cli.trimap_out {
        outcome
            .trimap
            .as_luma()
            .save(trimap_path)
            .with_context(|| format!("Failed to write trimap {}", trimap_path.display()))?;
    }

    info!(
        output = %output.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        status = ?outcome.solve_status,
        "background removed"
    );
    Ok(())
}

fn open_image(path: &Path) -> Result<image::DynamicImage> {
    image::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

/// Initialize tracing based on verbosity level; `RUST_LOG` wins when set
fn init_tracing(verbose_count: u8) -> Result<()> {
    let level = match verbose_count {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("imageops_matting={level}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|error| anyhow::anyhow!(error))?;
    Ok(())
}
