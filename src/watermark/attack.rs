//! Deterministic image attacks for robustness testing.
//!
//! Every attack takes a [`PixelBuffer`] and returns a new one; the input is
//! never modified. Randomness comes from the simulator's own RNG, so a seeded
//! simulator replays the same noise.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::error::WatermarkError;
use super::pixels::PixelBuffer;
use super::Result;

/// Interpolation used by [`ImageAttackSimulator::resize`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Bilinear,
}

impl From<ResizeFilter> for FilterType {
    fn from(f: ResizeFilter) -> Self {
        match f {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
        }
    }
}

/// A single distortion applied to a watermarked image.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attack {
    /// JPEG re-encode at `quality` (1..=100).
    Jpeg { quality: u8 },
    /// Additive white Gaussian noise on R, G and B.
    GaussianNoise { sigma: f64 },
    /// Shrink by `factor`, then resize back to the input size.
    Scale { factor: f64 },
    /// Rotate by `degrees`, rotate back, then resize to the input size.
    Rotate { degrees: f64 },
    /// Keep the `width × height` window at `(x, y)`.
    Crop { x: u32, y: u32, width: u32, height: u32 },
}

impl Attack {
    /// Short label for reports.
    pub fn label(&self) -> String {
        match *self {
            Attack::Jpeg { quality } => format!("JPEG q{quality}"),
            Attack::GaussianNoise { sigma } => format!("Gaussian noise σ={sigma}"),
            Attack::Scale { factor } => format!("Scale {factor}"),
            Attack::Rotate { degrees } => format!("Rotate {degrees}°"),
            Attack::Crop {
                x,
                y,
                width,
                height,
            } => format!("Crop {width}x{height}+{x}+{y}"),
        }
    }
}

impl std::fmt::Display for Attack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Image attack simulator with an injectable RNG.
pub struct ImageAttackSimulator<R: Rng = ChaCha8Rng> {
    rng: R,
}

impl ImageAttackSimulator<ChaCha8Rng> {
    /// Simulator whose noise is reproducible from `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> ImageAttackSimulator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Run one [`Attack`].
    pub fn apply(&mut self, image: &PixelBuffer, attack: &Attack) -> Result<PixelBuffer> {
        match *attack {
            Attack::Jpeg { quality } => self.jpeg(image, quality),
            Attack::GaussianNoise { sigma } => self.gaussian_noise(image, sigma),
            Attack::Scale { factor } => {
                if !(factor.is_finite() && factor > 0.0) {
                    return Err(WatermarkError::InvalidAttack(format!(
                        "scale factor must be positive, got {factor}"
                    )));
                }
                let (w, h) = (image.width(), image.height());
                let sw = ((w as f64 * factor).floor() as u32).max(1);
                let sh = ((h as f64 * factor).floor() as u32).max(1);
                let small = self.resize(image, sw, sh, ResizeFilter::Bilinear)?;
                self.resize(&small, w, h, ResizeFilter::Bilinear)
            }
            Attack::Rotate { degrees } => {
                let there = self.rotate(image, degrees)?;
                let back = self.rotate(&there, -degrees)?;
                self.resize(&back, image.width(), image.height(), ResizeFilter::Bilinear)
            }
            Attack::Crop {
                x,
                y,
                width,
                height,
            } => self.crop(image, x, y, width, height),
        }
    }

    /// Encode as RGB JPEG at `quality` and decode again. Alpha is restored
    /// from the input.
    pub fn jpeg(&mut self, image: &PixelBuffer, quality: u8) -> Result<PixelBuffer> {
        if !(1..=100).contains(&quality) {
            return Err(WatermarkError::InvalidAttack(format!(
                "JPEG quality must be in 1..=100, got {quality}"
            )));
        }

        let rgb: Vec<u8> = image
            .data()
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        let rgb = RgbImage::from_raw(image.width(), image.height(), rgb).ok_or_else(|| {
            WatermarkError::InvalidBuffer {
                expected: image.width() as usize * image.height() as usize * 3,
                got: image.data().len() / 4 * 3,
            }
        })?;

        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, quality).encode_image(&rgb)?;
        let decoded = image::load_from_memory_with_format(&encoded, ImageFormat::Jpeg)?.to_rgb8();

        let mut data = Vec::with_capacity(image.data().len());
        for (px, src) in decoded.pixels().zip(image.data().chunks_exact(4)) {
            data.extend_from_slice(&[px[0], px[1], px[2], src[3]]);
        }
        PixelBuffer::new(image.width(), image.height(), data)
    }

    /// One standard normal sample via Box–Muller.
    fn standard_normal(&mut self) -> f64 {
        // (0, 1] keeps ln finite
        let u = 1.0 - self.rng.random::<f64>();
        let v = 1.0 - self.rng.random::<f64>();
        (-2.0 * u.ln()).sqrt() * (2.0 * std::f64::consts::PI * v).cos()
    }

    /// Add the same `N(0, sigma²)` sample to R, G and B of each pixel.
    pub fn gaussian_noise(&mut self, image: &PixelBuffer, sigma: f64) -> Result<PixelBuffer> {
        if !(sigma.is_finite() && sigma >= 0.0) {
            return Err(WatermarkError::InvalidAttack(format!(
                "noise sigma must be non-negative, got {sigma}"
            )));
        }
        let mut out = image.clone();
        for px in out.data_mut().chunks_exact_mut(4) {
            let noise = self.standard_normal() * sigma;
            for c in &mut px[..3] {
                *c = (*c as f64 + noise).round().clamp(0.0, 255.0) as u8;
            }
        }
        Ok(out)
    }

    pub fn resize(
        &mut self,
        image: &PixelBuffer,
        width: u32,
        height: u32,
        filter: ResizeFilter,
    ) -> Result<PixelBuffer> {
        if width == 0 || height == 0 {
            return Err(WatermarkError::InvalidDimensions { width, height });
        }
        let src = image.clone().into_rgba_image();
        let resized = imageops::resize(&src, width, height, filter.into());
        PixelBuffer::try_from(resized)
    }

    /// Rotate about the centre with bilinear sampling.
    ///
    /// The canvas grows to hold the whole rotated image; uncovered pixels are
    /// transparent black.
    pub fn rotate(&mut self, image: &PixelBuffer, degrees: f64) -> Result<PixelBuffer> {
        if !degrees.is_finite() {
            return Err(WatermarkError::InvalidAttack(format!(
                "rotation must be finite, got {degrees}"
            )));
        }
        let (w, h) = (image.width() as f64, image.height() as f64);
        let rad = degrees.to_radians();
        let (sin, cos) = rad.sin_cos();
        let new_w = canvas_dim(w * cos.abs() + h * sin.abs());
        let new_h = canvas_dim(w * sin.abs() + h * cos.abs());

        let mut out = PixelBuffer::filled(new_w, new_h, [0, 0, 0, 0])?;
        let (cx, cy) = (new_w as f64 / 2.0, new_h as f64 / 2.0);
        for y in 0..new_h {
            for x in 0..new_w {
                let dx = x as f64 + 0.5 - cx;
                let dy = y as f64 + 0.5 - cy;
                // inverse rotation back into source pixel-centre coordinates
                let sx = cos * dx + sin * dy + w / 2.0 - 0.5;
                let sy = -sin * dx + cos * dy + h / 2.0 - 0.5;
                if let Some(px) = sample_bilinear(image, sx, sy) {
                    out.put_pixel(x, y, px);
                }
            }
        }
        Ok(out)
    }

    /// Copy the `width × height` window at `(x, y)`. Parts of the window
    /// outside the source stay transparent black.
    pub fn crop(
        &mut self,
        image: &PixelBuffer,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<PixelBuffer> {
        let mut out = PixelBuffer::filled(width, height, [0, 0, 0, 0])?;
        let copy_w = image.width().saturating_sub(x).min(width);
        let copy_h = image.height().saturating_sub(y).min(height);
        for row in 0..copy_h {
            for col in 0..copy_w {
                out.put_pixel(col, row, image.pixel(x + col, y + row));
            }
        }
        Ok(out)
    }
}

/// Round a canvas extent up, ignoring the float residue of `cos(90°)`.
fn canvas_dim(extent: f64) -> u32 {
    (extent - 1e-9).ceil().max(1.0) as u32
}

/// Bilinear sample at a fractional pixel-centre position; `None` outside the
/// image's half-pixel margin.
fn sample_bilinear(image: &PixelBuffer, sx: f64, sy: f64) -> Option<[u8; 4]> {
    let (w, h) = (image.width(), image.height());
    if sx < -0.5 || sy < -0.5 || sx > w as f64 - 0.5 || sy > h as f64 - 0.5 {
        return None;
    }
    let sx = sx.clamp(0.0, (w - 1) as f64);
    let sy = sy.clamp(0.0, (h - 1) as f64);
    let x0 = sx.floor() as u32;
    let y0 = sy.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = sx - x0 as f64;
    let fy = sy - y0 as f64;

    let p00 = image.pixel(x0, y0);
    let p10 = image.pixel(x1, y0);
    let p01 = image.pixel(x0, y1);
    let p11 = image.pixel(x1, y1);
    let mut px = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        px[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(px)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32) -> PixelBuffer {
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                let v = if (x / 4 + y / 4) % 2 == 0 { 60 } else { 190 };
                data.extend_from_slice(&[v, v, 128, 255]);
            }
        }
        PixelBuffer::new(w, h, data).unwrap()
    }

    #[test]
    fn test_jpeg_preserves_size_and_alpha() {
        let mut img = checker(32, 24);
        img.put_pixel(3, 3, [60, 60, 128, 17]);
        let mut sim = ImageAttackSimulator::seeded(1);
        let out = sim.jpeg(&img, 75).unwrap();
        assert_eq!((out.width(), out.height()), (32, 24));
        assert_eq!(out.pixel(3, 3)[3], 17);
        assert_eq!(out.pixel(0, 0)[3], 255);
        assert!(sim.jpeg(&img, 0).is_err());
        assert!(sim.jpeg(&img, 101).is_err());
    }

    #[test]
    fn test_noise_is_seeded_and_leaves_alpha() {
        let img = checker(16, 16);
        let a = ImageAttackSimulator::seeded(7).gaussian_noise(&img, 10.0).unwrap();
        let b = ImageAttackSimulator::seeded(7).gaussian_noise(&img, 10.0).unwrap();
        let c = ImageAttackSimulator::seeded(8).gaussian_noise(&img, 10.0).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.data().chunks_exact(4).all(|px| px[3] == 255));
        // R and G start equal and get the same noise sample
        assert!(a.data().chunks_exact(4).all(|px| px[0] == px[1]));
    }

    #[test]
    fn test_zero_sigma_is_identity() {
        let img = checker(8, 8);
        let out = ImageAttackSimulator::seeded(0).gaussian_noise(&img, 0.0).unwrap();
        assert_eq!(out, img);
        assert!(ImageAttackSimulator::seeded(0).gaussian_noise(&img, -1.0).is_err());
    }

    #[test]
    fn test_resize() {
        let img = checker(32, 16);
        let mut sim = ImageAttackSimulator::seeded(0);
        let small = sim.resize(&img, 16, 8, ResizeFilter::Nearest).unwrap();
        assert_eq!((small.width(), small.height()), (16, 8));
        let big = sim.resize(&small, 32, 16, ResizeFilter::Bilinear).unwrap();
        assert_eq!((big.width(), big.height()), (32, 16));
        assert!(sim.resize(&img, 0, 8, ResizeFilter::Nearest).is_err());
    }

    #[test]
    fn test_rotate_canvas_and_identity() {
        let img = checker(40, 20);
        let mut sim = ImageAttackSimulator::seeded(0);

        let same = sim.rotate(&img, 0.0).unwrap();
        assert_eq!(same, img);

        let quarter = sim.rotate(&img, 90.0).unwrap();
        assert_eq!((quarter.width(), quarter.height()), (20, 40));

        let tilted = sim.rotate(&img, 30.0).unwrap();
        let (s, c) = 30f64.to_radians().sin_cos();
        assert_eq!(tilted.width(), (40.0 * c + 20.0 * s).ceil() as u32);
        assert_eq!(tilted.height(), (40.0 * s + 20.0 * c).ceil() as u32);
        // corners are uncovered
        assert_eq!(tilted.pixel(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_crop() {
        let img = checker(16, 16);
        let mut sim = ImageAttackSimulator::seeded(0);
        let out = sim.crop(&img, 4, 4, 8, 8).unwrap();
        assert_eq!(out.pixel(0, 0), img.pixel(4, 4));
        assert_eq!(out.pixel(7, 7), img.pixel(11, 11));

        let edge = sim.crop(&img, 12, 12, 8, 8).unwrap();
        assert_eq!(edge.pixel(3, 3), img.pixel(15, 15));
        assert_eq!(edge.pixel(4, 4), [0, 0, 0, 0]);
        assert!(sim.crop(&img, 0, 0, 0, 4).is_err());
    }

    #[test]
    fn test_apply_dispatch() {
        let img = checker(32, 32);
        let mut sim = ImageAttackSimulator::seeded(3);
        for attack in [
            Attack::Jpeg { quality: 50 },
            Attack::GaussianNoise { sigma: 5.0 },
            Attack::Scale { factor: 0.5 },
            Attack::Rotate { degrees: 5.0 },
        ] {
            let out = sim.apply(&img, &attack).unwrap();
            assert_eq!((out.width(), out.height()), (32, 32), "{attack}");
        }
        assert!(sim.apply(&img, &Attack::Scale { factor: 0.0 }).is_err());

        let json = serde_json::to_string(&Attack::Jpeg { quality: 75 }).unwrap();
        assert_eq!(json, r#"{"kind":"jpeg","quality":75}"#);
    }
}
