use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::dwt::{max_decomposition_level, DwtPyramid, SubBand};
use super::error::WatermarkError;
use super::metrics::QualityMetrics;
use super::pixels::{self, PixelBuffer};
use super::plane::Plane;
use super::qim;
use super::text::{self, ExtractedPayload};
use super::wavelets::Wavelet;
use super::Result;

/// Largest accepted embedding step; larger steps saturate 8-bit pixels.
const MAX_EMBED_STEP: f64 = 255.0;
/// Below this extraction confidence the result is logged as suspect.
const LOW_CONFIDENCE: f64 = 0.5;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedParams {
    pub wavelet: Wavelet,
    /// Decomposition depth; the payload goes into this level.
    pub level: usize,
    pub band: SubBand,
    /// QIM quantization step.
    pub step: f64,
    /// Only consulted by [`suggest_step`].
    pub strength: f64,
}

impl Default for EmbedParams {
    fn default() -> Self {
        Self {
            wavelet: Wavelet::Haar,
            level: 2,
            band: SubBand::HL,
            step: 50.0,
            strength: 0.5,
        }
    }
}

impl EmbedParams {
    /// Check against the (padded) image size.
    pub fn validate(&self, width: u32, height: u32) -> Result<()> {
        if !(self.step.is_finite() && self.step > 0.0 && self.step <= MAX_EMBED_STEP) {
            return Err(WatermarkError::InvalidStep(self.step));
        }
        validate_level(self.level, width, height)?;
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(WatermarkError::InvalidStrength(self.strength));
        }
        Ok(())
    }
}

/// Extraction must use the same wavelet, level, band and step as embedding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractParams {
    pub wavelet: Wavelet,
    pub level: usize,
    pub band: SubBand,
    pub step: f64,
}

impl Default for ExtractParams {
    fn default() -> Self {
        Self::from(&EmbedParams::default())
    }
}

impl From<&EmbedParams> for ExtractParams {
    fn from(p: &EmbedParams) -> Self {
        Self {
            wavelet: p.wavelet,
            level: p.level,
            band: p.band,
            step: p.step,
        }
    }
}

impl ExtractParams {
    pub fn validate(&self, width: u32, height: u32) -> Result<()> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(WatermarkError::InvalidStep(self.step));
        }
        validate_level(self.level, width, height)
    }
}

fn validate_level(level: usize, width: u32, height: u32) -> Result<()> {
    let max = max_decomposition_level(width as usize, height as usize);
    if level < 1 || level > max {
        return Err(WatermarkError::InvalidLevel { level, max });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct EmbedOutput {
    /// Watermarked image, same size as the input.
    pub image: PixelBuffer,
    /// Y-channel quality of the padded image before 8-bit rounding.
    pub metrics: QualityMetrics,
    /// Message bits the chosen band could hold.
    pub capacity: usize,
    /// Header plus message bits actually written.
    pub payload_bits: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractOutput {
    pub message: String,
    /// Share of recovered bytes that look like text, in `[0, 1]`.
    pub confidence: f64,
    /// Message bits (header excluded).
    pub bits: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Capacity
// ---------------------------------------------------------------------------

/// Capacity in bits of an image of this size at `level`, measured on the
/// power-of-two padded size the pipeline works on.
pub fn capacity_for(image: &PixelBuffer, level: usize) -> usize {
    let w = image.width().next_power_of_two() as usize;
    let h = image.height().next_power_of_two() as usize;
    qim::calculate_capacity(w, h, level)
}

/// Y-channel subband that `wavelet`/`level`/`band` select on the padded image.
fn target_band(
    padded: &PixelBuffer,
    wavelet: Wavelet,
    level: usize,
    band: SubBand,
) -> Result<Plane> {
    let pyramid = DwtPyramid::decompose(&padded.luma_plane(), level, wavelet)?;
    pyramid
        .band(level, band)
        .cloned()
        .ok_or(WatermarkError::InvalidLevel {
            level,
            max: pyramid.depth(),
        })
}

/// Reject payloads whose coefficients map onto rows or columns that
/// `remove_padding` will crop away.
fn check_footprint(
    coeffs: &Plane,
    bits: usize,
    level: usize,
    width: u32,
    height: u32,
) -> Result<()> {
    let Some((row, col)) = qim::embed_extent(coeffs.rows(), coeffs.cols(), bits) else {
        return Ok(());
    };
    let needed_width = (col + 1) << level;
    let needed_height = (row + 1) << level;
    if needed_width > width as usize || needed_height > height as usize {
        return Err(WatermarkError::PayloadInPadding {
            needed_width,
            needed_height,
            width,
            height,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Embed `message` into the luminance of `image`.
///
/// The image is padded to power-of-two dimensions with white, transformed,
/// and the selected subband is QIM-coded; chroma and alpha pass through.
pub fn embed(image: &PixelBuffer, message: &str, params: &EmbedParams) -> Result<EmbedOutput> {
    if message.trim().is_empty() {
        return Err(WatermarkError::EmptyMessage);
    }

    let (padded, orig_w, orig_h) = pixels::pad_to_power_of_two(image);
    params.validate(padded.width(), padded.height())?;

    let yuv = pixels::to_yuv(&padded);
    let mut pyramid = DwtPyramid::decompose(&yuv.y, params.level, params.wavelet)?;

    let capacity = qim::calculate_capacity(
        padded.width() as usize,
        padded.height() as usize,
        params.level,
    );
    let payload = text::prepare_watermark(message);
    debug!(
        width = padded.width(),
        height = padded.height(),
        capacity,
        payload_bits = payload.total_bits(),
        "checking capacity"
    );
    if payload.total_bits() > capacity {
        return Err(WatermarkError::CapacityExceeded {
            required: payload.total_bits(),
            available: capacity,
        });
    }

    let coeffs = pyramid
        .band(params.level, params.band)
        .ok_or(WatermarkError::InvalidLevel {
            level: params.level,
            max: pyramid.depth(),
        })?;
    check_footprint(coeffs, payload.total_bits(), params.level, orig_w, orig_h)?;
    let marked = qim::qim_embed(coeffs, &payload.bits, params.step);
    pyramid.replace_band(params.level, params.band, marked)?;

    let y_marked = pyramid.reconstruct();
    let metrics = QualityMetrics::compare(&yuv.y, &y_marked)?;
    if !params.wavelet.reconstructs_exactly() {
        warn!(
            wavelet = %params.wavelet,
            "synthesis reuses analysis taps; reconstruction is approximate"
        );
    }

    let merged = pixels::from_yuv(&y_marked, &yuv.u, &yuv.v, &yuv.alpha)?;
    let out = pixels::remove_padding(&merged, orig_w, orig_h);

    info!(
        wavelet = %params.wavelet,
        level = params.level,
        band = %params.band,
        step = params.step,
        psnr = metrics.psnr,
        ssim = metrics.ssim,
        "embedded {} message bits",
        payload.length
    );

    Ok(EmbedOutput {
        image: out,
        metrics,
        capacity,
        payload_bits: payload.total_bits(),
    })
}

/// Read the payload back with the header-declared length.
pub fn extract(image: &PixelBuffer, params: &ExtractParams) -> Result<ExtractOutput> {
    let payload = extract_payload(image, params, None)?;
    let confidence = text::calculate_confidence(&payload.bits);
    if confidence < LOW_CONFIDENCE {
        warn!(confidence, "extracted payload does not look like text");
    }
    Ok(ExtractOutput {
        message: payload.message,
        confidence,
        bits: payload.bits,
    })
}

/// Read the payload, optionally trusting a known message bit count over the
/// embedded header.
pub fn extract_payload(
    image: &PixelBuffer,
    params: &ExtractParams,
    expected_length: Option<usize>,
) -> Result<ExtractedPayload> {
    let (padded, _, _) = pixels::pad_to_power_of_two(image);
    params.validate(padded.width(), padded.height())?;

    let coeffs = target_band(&padded, params.wavelet, params.level, params.band)?;
    let payload = qim::qim_extract(&coeffs, params.step, expected_length);
    debug!(
        declared = payload.length,
        recovered = payload.bits.len(),
        "extracted payload"
    );
    Ok(payload)
}

/// Step derived from the spread of the target band and `params.strength`.
pub fn suggest_step(image: &PixelBuffer, params: &EmbedParams) -> Result<f64> {
    let (padded, _, _) = pixels::pad_to_power_of_two(image);
    if !(0.0..=1.0).contains(&params.strength) {
        return Err(WatermarkError::InvalidStrength(params.strength));
    }
    validate_level(params.level, padded.width(), padded.height())?;
    let coeffs = target_band(&padded, params.wavelet, params.level, params.band)?;
    Ok(qim::adaptive_step(&coeffs, params.strength))
}

/// Embed the same message into every image in parallel.
///
/// Results line up with `images`; one failure does not affect the rest.
pub fn embed_batch(
    images: &[PixelBuffer],
    message: &str,
    params: &EmbedParams,
) -> Vec<Result<EmbedOutput>> {
    (0..images.len())
        .into_par_iter()
        .map(|i| embed(&images[i], message, params))
        .collect()
}

/// Extract from every image in parallel.
pub fn extract_batch(images: &[PixelBuffer], params: &ExtractParams) -> Vec<Result<ExtractOutput>> {
    (0..images.len())
        .into_par_iter()
        .map(|i| extract(&images[i], params))
        .collect()
}
