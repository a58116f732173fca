//! Configuration for the matting pipeline

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MattingError;
use crate::imageops_matting::affinity::MAX_WINDOW_RADIUS;
use crate::imageops_matting::composite::OutputFormat;
use crate::imageops_matting::solver::SolverParams;

/// Tunable parameters of every pipeline stage
///
/// Missing fields take their default when deserialized, so a configuration
/// file only needs to list what it overrides.
///
/// # Examples
///
/// ```
/// use imageops_matting::MattingConfig;
///
/// let config = MattingConfig::builder()
///     .erosion_radius(4)
///     .max_iterations(200)
///     .build()
///     .unwrap();
/// assert_eq!(config.erosion_radius, 4);
/// assert_eq!(config.fg_threshold, 0.94);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MattingConfig {
    /// Probability at or above which a pixel is definite foreground
    pub fg_threshold: f32,
    /// Probability at or below which a pixel is definite background
    pub bg_threshold: f32,
    /// Pixels by which both certain regions are eroded
    pub erosion_radius: u8,
    /// Affinity window radius (1 = 3×3), at most [`MAX_WINDOW_RADIUS`]
    pub window_radius: u32,
    /// Lower bound on local color variance in the affinity weights
    pub variance_floor: f64,
    /// Weight of the pull toward the coarse mask inside the unknown region
    pub prior_weight: f64,
    /// Relative residual at which the solver stops
    pub tolerance: f64,
    /// Iteration cap of the solver
    pub max_iterations: usize,
    /// Encoding used by `remove_background`
    pub output_format: OutputFormat,
}

impl Default for MattingConfig {
    fn default() -> Self {
        Self {
            fg_threshold: 0.94,
            bg_threshold: 0.04,
            erosion_radius: 10,
            window_radius: 1,
            variance_floor: 1e-4,
            prior_weight: 1e-3,
            tolerance: 1e-6,
            max_iterations: 1000,
            output_format: OutputFormat::Png,
        }
    }
}

impl MattingConfig {
    #[must_use]
    pub fn builder() -> MattingConfigBuilder {
        MattingConfigBuilder::new()
    }

    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// * `MattingError::ConfigFormat` - Malformed JSON or unknown fields
    /// * `MattingError::InvalidConfig` - Values out of range
    pub fn from_json_str(json: &str) -> Result<Self, MattingError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// * `MattingError::Io` - The file cannot be read
    /// * `MattingError::ConfigFormat` / `MattingError::InvalidConfig` - As for
    ///   [`MattingConfig::from_json_str`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MattingError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks every value against its valid range.
    ///
    /// # Errors
    ///
    /// * `MattingError::InvalidConfig` - Naming the first offending field
    pub fn validate(&self) -> Result<(), MattingError> {
        for (name, value) in [
            ("fg_threshold", self.fg_threshold),
            ("bg_threshold", self.bg_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MattingError::invalid_config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.fg_threshold <= self.bg_threshold {
            return Err(MattingError::invalid_config(format!(
                "fg_threshold ({}) must be greater than bg_threshold ({})",
                self.fg_threshold, self.bg_threshold
            )));
        }
        if !(1..=MAX_WINDOW_RADIUS).contains(&self.window_radius) {
            return Err(MattingError::invalid_config(format!(
                "window_radius must be within [1, {MAX_WINDOW_RADIUS}], got {}",
                self.window_radius
            )));
        }
        for (name, value) in [
            ("variance_floor", self.variance_floor),
            ("prior_weight", self.prior_weight),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(MattingError::invalid_config(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(MattingError::invalid_config(format!(
                "tolerance must be non-negative and finite, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    /// Solver-facing subset of the configuration
    #[must_use]
    pub const fn solver_params(&self) -> SolverParams {
        SolverParams {
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
            prior_weight: self.prior_weight,
        }
    }
}

/// Builder for [`MattingConfig`]
#[derive(Debug, Default)]
pub struct MattingConfigBuilder {
    config: MattingConfig,
}

impl MattingConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn fg_threshold(mut self, fg_threshold: f32) -> Self {
        self.config.fg_threshold = fg_threshold;
        self
    }

    #[must_use]
    pub fn bg_threshold(mut self, bg_threshold: f32) -> Self {
        self.config.bg_threshold = bg_threshold;
        self
    }

    #[must_use]
    pub fn erosion_radius(mut self, erosion_radius: u8) -> Self {
        self.config.erosion_radius = erosion_radius;
        self
    }

    #[must_use]
    pub fn window_radius(mut self, window_radius: u32) -> Self {
        self.config.window_radius = window_radius;
        self
    }

    #[must_use]
    pub fn variance_floor(mut self, variance_floor: f64) -> Self {
        self.config.variance_floor = variance_floor;
        self
    }

    #[must_use]
    pub fn prior_weight(mut self, prior_weight: f64) -> Self {
        self.config.prior_weight = prior_weight;
        self
    }

    #[must_use]
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    #[must_use]
    pub fn output_format(mut self, output_format: OutputFormat) -> Self {
        self.config.output_format = output_format;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// * `MattingError::InvalidConfig` - See [`MattingConfig::validate`]
    pub fn build(self) -> Result<MattingConfig, MattingError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
