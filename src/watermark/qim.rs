//! Quantization Index Modulation over a single subband.
//!
//! Bit 0 snaps a coefficient to an integer multiple of `step`, bit 1 to an
//! odd multiple of `step / 2`. Coefficients are visited row-major, skipping a
//! border of `min(rows, cols) / 10` rows and columns at the top and left.

use super::plane::Plane;
use super::text::{self, ExtractedPayload, HEADER_BITS};

/// Multiplier from coefficient spread to suggested step.
const ADAPTIVE_BASE: f64 = 0.1;

/// Rows and columns skipped at the top-left of a subband.
#[inline]
pub fn skip_border(rows: usize, cols: usize) -> usize {
    rows.min(cols) / 10
}

/// Message bits that fit in the subband of a `width × height` image
/// decomposed `levels` times, after the border and the 32 header bits.
pub fn calculate_capacity(width: usize, height: usize, levels: usize) -> usize {
    let fw = width.checked_shr(levels as u32).unwrap_or(0);
    let fh = height.checked_shr(levels as u32).unwrap_or(0);
    let skip = skip_border(fh, fw);
    ((fh - skip) * (fw - skip)).saturating_sub(HEADER_BITS)
}

/// Quantize one coefficient onto the lattice for `bit`.
#[inline]
pub fn quantize(value: f64, bit: u8, step: f64) -> f64 {
    if bit == 0 {
        // round half up
        (value / step + 0.5).floor() * step
    } else {
        (value / step).floor() * step + step / 2.0
    }
}

/// Read the bit nearest to `value`'s lattice.
#[inline]
pub fn dequantize(value: f64, step: f64) -> u8 {
    let r = value.abs() % step;
    if r >= step / 4.0 && r < step * 3.0 / 4.0 {
        1
    } else {
        0
    }
}

/// Row-major positions of the embeddable coefficients.
fn scan(rows: usize, cols: usize) -> impl Iterator<Item = (usize, usize)> {
    let skip = skip_border(rows, cols);
    (skip..rows).flat_map(move |r| (skip..cols).map(move |c| (r, c)))
}

/// Largest row and column that `bits` payload bits occupy, or `None` for an
/// empty payload. Bits past the end of the plane are not counted.
pub fn embed_extent(rows: usize, cols: usize, bits: usize) -> Option<(usize, usize)> {
    scan(rows, cols)
        .take(bits)
        .fold(None, |acc, (r, c)| match acc {
            None => Some((r, c)),
            Some((mr, mc)) => Some((mr.max(r), mc.max(c))),
        })
}

/// Embed `bits` into a copy of `coeffs`, one coefficient per bit.
///
/// Stops when either the bits or the coefficients run out; coefficients past
/// the last bit are left untouched.
pub fn qim_embed(coeffs: &Plane, bits: &[u8], step: f64) -> Plane {
    let mut out = coeffs.clone();
    for ((r, c), &bit) in scan(coeffs.rows(), coeffs.cols()).zip(bits) {
        out.set(r, c, quantize(coeffs.get(r, c), bit, step));
    }
    out
}

/// Read a framed payload back from `coeffs`.
///
/// Without `expected_length` the first 32 bits are decoded as the message bit
/// count. With it the header is still scanned but ignored. A zero
/// `expected_length` counts as absent. The scan never runs past the plane, so
/// a garbage header yields a short message instead of a failure.
pub fn qim_extract(coeffs: &Plane, step: f64, expected_length: Option<usize>) -> ExtractedPayload {
    let expected_length = expected_length.filter(|&n| n > 0);
    let mut max_bits = HEADER_BITS.saturating_add(expected_length.unwrap_or(coeffs.len()));
    let mut bits = Vec::new();

    for (r, c) in scan(coeffs.rows(), coeffs.cols()) {
        if bits.len() >= max_bits {
            break;
        }
        bits.push(dequantize(coeffs.get(r, c), step));
        if bits.len() == HEADER_BITS && expected_length.is_none() {
            max_bits = HEADER_BITS.saturating_add(text::decode_header(&bits));
        }
    }

    let length = expected_length.unwrap_or_else(|| text::decode_header(&bits));
    let start = HEADER_BITS.min(bits.len());
    let end = HEADER_BITS.saturating_add(length).min(bits.len());
    let message_bits = bits[start..end].to_vec();

    ExtractedPayload {
        message: text::bits_to_text(&message_bits),
        bits: message_bits,
        length,
    }
}

/// Suggested step from the spread of coefficient magnitudes.
///
/// Population standard deviation of `|c|`, times 0.1, times `0.5 + strength`.
pub fn adaptive_step(coeffs: &Plane, strength: f64) -> f64 {
    if coeffs.is_empty() {
        return 0.0;
    }
    let n = coeffs.len() as f64;
    let mean = coeffs.as_slice().iter().map(|v| v.abs()).sum::<f64>() / n;
    let variance = coeffs
        .as_slice()
        .iter()
        .map(|v| {
            let d = v.abs() - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    variance.sqrt() * ADAPTIVE_BASE * (0.5 + strength)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watermark::text::prepare_watermark;
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn random_plane(rows: usize, cols: usize, seed: u64) -> Plane {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Plane::from_fn(rows, cols, |_, _| rng.random_range(-200.0..200.0))
    }

    #[test]
    fn test_skip_border() {
        assert_eq!(skip_border(64, 64), 6);
        assert_eq!(skip_border(9, 100), 0);
        assert_eq!(skip_border(32, 16), 1);
    }

    #[test]
    fn test_embed_extent() {
        // 64x64 band, skip 6: 58 coefficients per row
        assert_eq!(embed_extent(64, 64, 0), None);
        assert_eq!(embed_extent(64, 64, 40), Some((6, 45)));
        assert_eq!(embed_extent(64, 64, 58), Some((6, 63)));
        assert_eq!(embed_extent(64, 64, 248), Some((10, 63)));
        // clipped to the plane
        assert_eq!(embed_extent(4, 4, 100), Some((3, 3)));
    }

    #[test]
    fn test_capacity() {
        // 256x256 at level 2: 64x64, skip 6, 58*58 - 32
        assert_eq!(calculate_capacity(256, 256, 2), 58 * 58 - 32);
        // 64x64 at level 3: 8x8, skip 0, 64 - 32
        assert_eq!(calculate_capacity(64, 64, 3), 32);
        // tiny subbands floor at zero
        assert_eq!(calculate_capacity(8, 8, 2), 0);
        assert_eq!(calculate_capacity(8, 8, 70), 0);
    }

    #[test]
    fn test_quantize_lattices() {
        assert_eq!(quantize(74.0, 0, 50.0), 50.0);
        assert_eq!(quantize(75.0, 0, 50.0), 100.0);
        assert_eq!(quantize(-75.0, 0, 50.0), -50.0);
        assert_eq!(quantize(74.0, 1, 50.0), 75.0);
        assert_eq!(quantize(-10.0, 1, 50.0), -25.0);
    }

    #[test]
    fn test_dequantize_thresholds() {
        assert_eq!(dequantize(0.0, 40.0), 0);
        assert_eq!(dequantize(9.999, 40.0), 0);
        assert_eq!(dequantize(10.0, 40.0), 1);
        assert_eq!(dequantize(29.999, 40.0), 1);
        assert_eq!(dequantize(30.0, 40.0), 0);
        assert_eq!(dequantize(-20.0, 40.0), 1);
    }

    #[test]
    fn test_embed_extract_plane() {
        let coeffs = random_plane(64, 64, 11);
        let payload = prepare_watermark("Copyright © 2024 MyCompany");
        let marked = qim_embed(&coeffs, &payload.bits, 50.0);

        let out = qim_extract(&marked, 50.0, None);
        assert_eq!(out.length, payload.length);
        assert_eq!(out.bits, payload.message_bits());
        assert_eq!(out.message, payload.message);

        let known = qim_extract(&marked, 50.0, Some(payload.length));
        assert_eq!(known.message, payload.message);
    }

    #[test]
    fn test_embed_touches_only_payload_positions() {
        let coeffs = random_plane(20, 20, 5);
        let marked = qim_embed(&coeffs, &[1, 0, 1], 30.0);
        // skip = 2; bits land at (2,2), (2,3), (2,4)
        for r in 0..20 {
            for c in 0..20 {
                let touched = r == 2 && (2..5).contains(&c);
                if !touched {
                    assert_eq!(marked.get(r, c), coeffs.get(r, c));
                }
            }
        }
        assert_eq!(dequantize(marked.get(2, 2), 30.0), 1);
        assert_eq!(dequantize(marked.get(2, 3), 30.0), 0);
    }

    #[test]
    fn test_garbage_header_is_bounded() {
        // All-ones header claims ~4 billion bits.
        let coeffs = Plane::from_fn(16, 16, |_, _| 25.0);
        let out = qim_extract(&coeffs, 50.0, None);
        assert_eq!(out.length, u32::MAX as usize);
        assert_eq!(out.bits.len(), 15 * 15 - 32);
    }

    #[test]
    fn test_short_plane_header() {
        let coeffs = Plane::from_fn(4, 4, |_, _| 0.0);
        let out = qim_extract(&coeffs, 50.0, None);
        assert_eq!(out.length, 0);
        assert!(out.bits.is_empty());
        assert_eq!(out.message, "");
    }

    #[test]
    fn test_adaptive_step() {
        let flat = Plane::from_fn(4, 4, |_, _| -7.0);
        assert_eq!(adaptive_step(&flat, 0.5), 0.0);

        // |c| is 0 or 10 in equal measure: std 5
        let p = Plane::from_fn(2, 2, |r, _| if r == 0 { 0.0 } else { -10.0 });
        assert!((adaptive_step(&p, 0.5) - 0.5).abs() < 1e-12);
        assert!((adaptive_step(&p, 0.0) - 0.25).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_quantized_bit_is_stable(
            v in -1000.0f64..1000.0,
            bit in 0u8..=1,
            step in prop::sample::select(vec![10.0f64, 30.0, 50.0, 100.0]),
        ) {
            prop_assert_eq!(dequantize(quantize(v, bit, step), step), bit);
        }
    }
}
