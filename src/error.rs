use image::ColorType;
use thiserror::Error;

/// Error type for the matting pipeline
///
/// Only unrecoverable shape, format and configuration problems are reported
/// here. Numerical edge cases (a degenerate trimap, a solver that hits its
/// iteration cap) are absorbed by the pipeline and reported as
/// [`Degradation`](crate::Degradation) values instead.
#[derive(Debug, Error)]
pub enum MattingError {
    /// Mask (or trimap, alpha buffer) dimensions do not match the image
    ///
    /// Fatal for the request: there is no way to recover without new input.
    #[error("Mask dimensions do not match image: expected {expected:?}, actual {actual:?}")]
    InvalidMaskShape {
        /// Expected dimensions (width, height)
        expected: (u32, u32),
        /// Actual dimensions (width, height)
        actual: (u32, u32),
    },

    /// Input image has a channel arrangement the pipeline cannot matte
    ///
    /// Grayscale and gray+alpha images fall into this category, as do raw
    /// buffers with a channel count other than 3 or 4.
    #[error("Unsupported channel layout: {channels} channel(s){}", describe_color_type(.color_type))]
    UnsupportedChannelLayout {
        /// Number of interleaved channels found
        channels: u8,
        /// Decoded color type, when the input came from a decoder
        color_type: Option<ColorType>,
    },

    /// Raw pixel buffer length does not match `width * height * channels`
    #[error("Pixel buffer has {actual} bytes, expected {expected}")]
    InvalidBufferLength { expected: usize, actual: usize },

    /// Image has more pixels than a `u32` pixel index can address
    #[error("Image of {width}x{height} pixels is too large to matte")]
    ImageTooLarge { width: u32, height: u32 },

    /// A configuration value is outside its valid range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The injected segmentation model failed to produce a mask
    #[error("Segmentation model '{model}' failed: {message}")]
    Inference { model: String, message: String },

    /// Image decode or encode failure reported by the codec
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// Filesystem failure while loading configuration or images
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON for [`MattingConfig`](crate::MattingConfig)
    #[error("Malformed configuration: {0}")]
    ConfigFormat(#[from] serde_json::Error),
}

fn describe_color_type(color_type: &Option<ColorType>) -> String {
    color_type
        .map(|color_type| format!(" ({color_type:?})"))
        .unwrap_or_default()
}

impl MattingError {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Convenience constructor for model implementations
    pub fn inference(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Inference {
            model: model.into(),
            message: message.into(),
        }
    }
}

pub type Result<T, E = MattingError> = std::result::Result<T, E>;
