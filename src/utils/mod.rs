//! Internal utility functions for imageops-matting.
//!
//! This module contains common functionality used across the matting stages.

use image::Primitive;

use crate::error::MattingError;

/// Clamps a solved or sampled alpha value into `[0, 1]`.
///
/// Non-finite values are replaced by `fallback`, which must itself already
/// be in range.
#[inline]
pub fn clamp_unit(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

/// Normalizes a subpixel value to `[0, 1]` using a pre-computed max value.
///
/// This is more efficient when processing multiple pixels with the same type.
///
/// # Arguments
///
/// * `value` - The subpixel value to normalize
/// * `max_value` - The pre-computed maximum value for the type
#[inline]
pub fn normalize_with_max<S>(value: S, max_value: f32) -> f32
where
    S: Primitive,
{
    value.to_f32().unwrap_or(0.0) / max_value
}

/// Returns the maximum value of a subpixel type as `f32`.
///
/// Floating-point subpixels report `1.0`.
#[inline]
pub fn subpixel_max<S: Primitive>() -> f32 {
    S::DEFAULT_MAX_VALUE.to_f32().unwrap_or(1.0)
}

/// Validates that two buffers have matching dimensions.
///
/// # Arguments
///
/// * `expected` - Dimensions of the reference buffer (usually the image)
/// * `actual` - Dimensions of the buffer being checked
///
/// # Errors
///
/// * `MattingError::InvalidMaskShape` - When the dimensions differ
pub fn validate_matching_dimensions(
    expected: (u32, u32),
    actual: (u32, u32),
) -> Result<(), MattingError> {
    if expected == actual {
        Ok(())
    } else {
        Err(MattingError::InvalidMaskShape { expected, actual })
    }
}
