//! Watermark errors

use thiserror::Error;

/// Errors from embedding, extraction and the attack simulator.
///
/// A wrong set of extraction parameters is deliberately *not* an error: the
/// math cannot tell, so it surfaces as a garbled message with low confidence.
#[derive(Error, Debug)]
pub enum WatermarkError {
    /// Quantization step outside `(0, 255]` (embed) or not positive (extract).
    #[error("invalid quantization step: {0}")]
    InvalidStep(f64),

    /// Decomposition level below 1 or deeper than the image allows.
    #[error("invalid decomposition level {level} (image supports 1..={max})")]
    InvalidLevel { level: usize, max: usize },

    /// Embedding strength outside `[0, 1]`.
    #[error("invalid embedding strength: {0} (expected 0..=1)")]
    InvalidStrength(f64),

    /// Nothing to embed.
    #[error("watermark message is empty")]
    EmptyMessage,

    /// The framed payload does not fit in the selected subband.
    #[error("watermark too long: needs {required} bits, capacity is {available} bits")]
    CapacityExceeded { required: usize, available: usize },

    /// The payload would reach subband coefficients that only cover padding,
    /// which is cropped off after embedding.
    #[error(
        "watermark reaches padding: needs a {needed_width}x{needed_height} region, image is {width}x{height}"
    )]
    PayloadInPadding {
        needed_width: usize,
        needed_height: usize,
        width: u32,
        height: u32,
    },

    /// Pixel data length does not match `width * height * 4`.
    #[error("pixel buffer size mismatch: expected {expected} bytes, got {got}")]
    InvalidBuffer { expected: usize, got: usize },

    /// Width or height is zero.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Two planes compared by a metric have different shapes.
    #[error("plane shape mismatch: {left_rows}x{left_cols} vs {right_rows}x{right_cols}")]
    ShapeMismatch {
        left_rows: usize,
        left_cols: usize,
        right_rows: usize,
        right_cols: usize,
    },

    /// Attack parameters that cannot be applied.
    #[error("invalid attack: {0}")]
    InvalidAttack(String),

    /// Codec failure inside the attack simulator.
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
}
