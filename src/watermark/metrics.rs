//! Imperceptibility and robustness metrics.
//!
//! PSNR and SSIM compare two luminance planes sample by sample; BER compares
//! embedded and recovered message bits.
//!
//! Typical PSNR values for an embedded image:
//! - Invisible: > 40 dB
//! - Hard to notice: 30-40 dB
//! - Visible: < 30 dB

use serde::{Deserialize, Serialize};

use super::plane::Plane;
use super::Result;

const MAX_PIXEL: f64 = 255.0;
const C1: f64 = (0.01 * MAX_PIXEL) * (0.01 * MAX_PIXEL);
const C2: f64 = (0.03 * MAX_PIXEL) * (0.03 * MAX_PIXEL);

/// Mean squared error.
pub fn mse(original: &Plane, modified: &Plane) -> Result<f64> {
    original.ensure_same_shape(modified)?;
    if original.is_empty() {
        return Ok(0.0);
    }
    let sum: f64 = original
        .as_slice()
        .iter()
        .zip(modified.as_slice())
        .map(|(a, b)| (a - b) * (a - b))
        .sum();
    Ok(sum / original.len() as f64)
}

/// Peak signal-to-noise ratio in dB. `+inf` for identical planes.
pub fn psnr(original: &Plane, modified: &Plane) -> Result<f64> {
    Ok(psnr_from_mse(mse(original, modified)?))
}

fn psnr_from_mse(mse: f64) -> f64 {
    if mse == 0.0 {
        f64::INFINITY
    } else {
        10.0 * (MAX_PIXEL * MAX_PIXEL / mse).log10()
    }
}

/// Single-window structural similarity over the whole plane.
///
/// Variances and covariance use the `N - 1` divisor.
pub fn ssim(original: &Plane, modified: &Plane) -> Result<f64> {
    original.ensure_same_shape(modified)?;
    let n = original.len();
    if n == 0 {
        return Ok(1.0);
    }
    let nf = n as f64;
    let a = original.as_slice();
    let b = modified.as_slice();

    let mean_a = a.iter().sum::<f64>() / nf;
    let mean_b = b.iter().sum::<f64>() / nf;

    let (mut var_a, mut var_b, mut cov) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let da = x - mean_a;
        let db = y - mean_b;
        var_a += da * da;
        var_b += db * db;
        cov += da * db;
    }
    let denom = (n.max(2) - 1) as f64;
    var_a /= denom;
    var_b /= denom;
    cov /= denom;

    let numerator = (2.0 * mean_a * mean_b + C1) * (2.0 * cov + C2);
    let denominator = (mean_a * mean_a + mean_b * mean_b + C1) * (var_a + var_b + C2);
    Ok(numerator / denominator)
}

/// Fraction of differing bits over the shorter of the two sequences.
///
/// Returns 1.0 when either side is empty: nothing was recovered.
pub fn bit_error_rate(original: &[u8], extracted: &[u8]) -> f64 {
    let len = original.len().min(extracted.len());
    if len == 0 {
        return 1.0;
    }
    let errors = original
        .iter()
        .zip(extracted)
        .filter(|(a, b)| a != b)
        .count();
    errors as f64 / len as f64
}

/// Quality of an embedded image relative to its source.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub mse: f64,
    /// dB; infinite when the planes are identical.
    pub psnr: f64,
    pub ssim: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ber: Option<f64>,
}

impl QualityMetrics {
    /// MSE, PSNR and SSIM of `modified` against `original`.
    pub fn compare(original: &Plane, modified: &Plane) -> Result<Self> {
        let mse = mse(original, modified)?;
        Ok(Self {
            mse,
            psnr: psnr_from_mse(mse),
            ssim: ssim(original, modified)?,
            ber: None,
        })
    }

    pub fn with_ber(mut self, ber: f64) -> Self {
        self.ber = Some(ber);
        self
    }

    /// Above 40 dB.
    pub fn is_invisible(&self) -> bool {
        self.psnr > 40.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watermark::error::WatermarkError;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn noisy_plane(seed: u64) -> Plane {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Plane::from_fn(32, 32, |_, _| rng.random_range(0.0..255.0))
    }

    #[test]
    fn test_identical_planes() {
        let a = noisy_plane(1);
        assert_eq!(mse(&a, &a).unwrap(), 0.0);
        assert_eq!(psnr(&a, &a).unwrap(), f64::INFINITY);
        assert!((ssim(&a, &a).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_known_mse_and_psnr() {
        let a = Plane::from_fn(4, 4, |_, _| 100.0);
        let b = Plane::from_fn(4, 4, |_, _| 110.0);
        assert_eq!(mse(&a, &b).unwrap(), 100.0);
        let expected = 10.0 * (255.0f64 * 255.0 / 100.0).log10();
        assert!((psnr(&a, &b).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_different_planes_are_finite() {
        let a = noisy_plane(1);
        let b = noisy_plane(2);
        let p = psnr(&a, &b).unwrap();
        assert!(p.is_finite());
        let s = ssim(&a, &b).unwrap();
        assert!(s < 0.5, "independent noise should be dissimilar, got {s}");
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Plane::zeros(4, 4);
        let b = Plane::zeros(4, 5);
        assert!(matches!(mse(&a, &b), Err(WatermarkError::ShapeMismatch { .. })));
        assert!(ssim(&a, &b).is_err());
        assert!(QualityMetrics::compare(&a, &b).is_err());
    }

    #[test]
    fn test_single_sample_ssim() {
        let a = Plane::from_fn(1, 1, |_, _| 10.0);
        assert!((ssim(&a, &a).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ber() {
        assert_eq!(bit_error_rate(&[1, 0, 1, 1], &[1, 0, 1, 1]), 0.0);
        assert_eq!(bit_error_rate(&[1, 0, 1, 1], &[0, 0, 1, 0]), 0.5);
        // shorter side decides the length
        assert_eq!(bit_error_rate(&[1, 1, 1, 1], &[1, 0]), 0.5);
        assert_eq!(bit_error_rate(&[1, 0], &[]), 1.0);
    }

    #[test]
    fn test_compare_serializes() {
        let a = noisy_plane(3);
        let m = QualityMetrics::compare(&a, &a).unwrap().with_ber(0.0);
        assert!(m.is_invisible());
        let json = serde_json::to_string(&QualityMetrics { psnr: 42.0, ..m }).unwrap();
        assert!(json.contains("\"ber\":0.0"));
        let back: QualityMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.psnr, 42.0);
    }
}
