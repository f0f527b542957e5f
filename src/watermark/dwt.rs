//! 2D Discrete Wavelet Transform with periodic boundary extension.
//!
//! Analysis and synthesis both use the analysis taps of the selected
//! [`Wavelet`]. That is exact for Haar; Daubechies-4/8 reconstruct only
//! approximately (a constant signal comes back scaled by the lowpass DC gain).
use super::error::WatermarkError;
use super::plane::Plane;
use super::wavelets::{Wavelet, WaveletFilter};
use super::Result;

/// One of the four quadrants of a 2D decomposition level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubBand {
    /// Approximation (low rows, low cols).
    LL,
    /// Horizontal detail (low rows, high cols).
    LH,
    /// Vertical detail (high rows, low cols).
    #[default]
    HL,
    /// Diagonal detail (high rows, high cols).
    HH,
}

impl std::str::FromStr for SubBand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ll" => Ok(SubBand::LL),
            "lh" => Ok(SubBand::LH),
            "hl" => Ok(SubBand::HL),
            "hh" => Ok(SubBand::HH),
            _ => Err(format!("unknown subband '{s}'; expected ll, lh, hl, or hh")),
        }
    }
}

impl std::fmt::Display for SubBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubBand::LL => "LL",
            SubBand::LH => "LH",
            SubBand::HL => "HL",
            SubBand::HH => "HH",
        };
        f.write_str(s)
    }
}

/// Result of a single-level 2D DWT decomposition.
#[derive(Clone, Debug, PartialEq)]
pub struct Dwt2Result {
    /// Low-low (approximation), size (rows/2, cols/2)
    pub ll: Plane,
    /// Low-high (horizontal detail)
    pub lh: Plane,
    /// High-low (vertical detail)
    pub hl: Plane,
    /// High-high (diagonal detail)
    pub hh: Plane,
    /// 1 for a decomposition of the input plane, k for the LL of level k-1.
    pub level: usize,
}

impl Dwt2Result {
    pub fn band(&self, band: SubBand) -> &Plane {
        match band {
            SubBand::LL => &self.ll,
            SubBand::LH => &self.lh,
            SubBand::HL => &self.hl,
            SubBand::HH => &self.hh,
        }
    }

    fn band_mut(&mut self, band: SubBand) -> &mut Plane {
        match band {
            SubBand::LL => &mut self.ll,
            SubBand::LH => &mut self.lh,
            SubBand::HL => &mut self.hl,
            SubBand::HH => &mut self.hh,
        }
    }

    #[inline]
    pub fn half_rows(&self) -> usize {
        self.ll.rows()
    }

    #[inline]
    pub fn half_cols(&self) -> usize {
        self.ll.cols()
    }
}

// ---------------------------------------------------------------------------
// 1D
// ---------------------------------------------------------------------------

/// One level of 1D analysis.
///
/// `low[i]` and `high[i]` are the inner products of the taps with the window
/// starting at `2i`, indices taken modulo the signal length.
pub fn dwt1d(signal: &[f64], filter: &WaveletFilter) -> (Vec<f64>, Vec<f64>) {
    let n = signal.len();
    let half = n / 2;
    let mut low = vec![0.0f64; half];
    let mut high = vec![0.0f64; half];

    for i in 0..half {
        let mut sum_low = 0.0;
        let mut sum_high = 0.0;
        for (j, (&lo, &hi)) in filter.lowpass.iter().zip(filter.highpass).enumerate() {
            let x = signal[(2 * i + j) % n];
            sum_low += x * lo;
            sum_high += x * hi;
        }
        low[i] = sum_low;
        high[i] = sum_high;
    }

    (low, high)
}

/// One level of 1D synthesis, the adjoint of [`dwt1d`].
pub fn idwt1d(low: &[f64], high: &[f64], filter: &WaveletFilter) -> Vec<f64> {
    debug_assert_eq!(low.len(), high.len());
    let n = low.len() * 2;
    let mut out = vec![0.0f64; n];

    for i in 0..low.len() {
        for (j, (&lo, &hi)) in filter.lowpass.iter().zip(filter.highpass).enumerate() {
            out[(2 * i + j) % n] += low[i] * lo + high[i] * hi;
        }
    }

    out
}

// ---------------------------------------------------------------------------
// 2D
// ---------------------------------------------------------------------------

/// Perform one level of 2D DWT.
///
/// Input rows and cols must be even.
/// Returns the four sub-bands, each of size `(rows/2) × (cols/2)`.
pub fn dwt2d(data: &Plane, wavelet: Wavelet) -> Dwt2Result {
    let filter = wavelet.filter();
    let rows = data.rows();
    let cols = data.cols();
    debug_assert!(rows % 2 == 0 && cols % 2 == 0, "dimensions must be even");

    let hr = rows / 2;
    let hc = cols / 2;

    // Step 1: row-wise 1D DWT → temp[rows][cols] where left half = low, right half = high
    let mut temp = Plane::zeros(rows, cols);
    for r in 0..rows {
        let (low, high) = dwt1d(data.row(r), filter);
        let dst = temp.row_mut(r);
        dst[..hc].copy_from_slice(&low);
        dst[hc..].copy_from_slice(&high);
    }

    // Step 2: column-wise 1D DWT, top half = low, bottom half = high
    let mut full = Plane::zeros(rows, cols);
    for c in 0..cols {
        let (low, high) = dwt1d(&temp.column(c), filter);
        let mut col = low;
        col.extend_from_slice(&high);
        full.set_column(c, &col);
    }

    Dwt2Result {
        ll: full.sub_plane(0, 0, hr, hc),
        lh: full.sub_plane(0, hc, hr, hc),
        hl: full.sub_plane(hr, 0, hr, hc),
        hh: full.sub_plane(hr, hc, hr, hc),
        level: 1,
    }
}

/// Perform one level of inverse 2D DWT.
///
/// Reconstructs a plane of size `(2*half_rows) × (2*half_cols)` from the four sub-bands.
pub fn idwt2d(bands: &Dwt2Result, wavelet: Wavelet) -> Plane {
    let filter = wavelet.filter();
    let hr = bands.half_rows();
    let hc = bands.half_cols();
    let rows = hr * 2;
    let cols = hc * 2;

    let mut combined = Plane::zeros(rows, cols);
    combined.paste(&bands.ll, 0, 0);
    combined.paste(&bands.lh, 0, hc);
    combined.paste(&bands.hl, hr, 0);
    combined.paste(&bands.hh, hr, hc);

    // Step 1: inverse column-wise
    let mut temp = Plane::zeros(rows, cols);
    for c in 0..cols {
        let col = combined.column(c);
        let rebuilt = idwt1d(&col[..hr], &col[hr..], filter);
        temp.set_column(c, &rebuilt);
    }

    // Step 2: inverse row-wise
    let mut out = Plane::zeros(rows, cols);
    for r in 0..rows {
        let row = temp.row(r);
        let rebuilt = idwt1d(&row[..hc], &row[hc..], filter);
        out.row_mut(r).copy_from_slice(&rebuilt);
    }
    out
}

// ---------------------------------------------------------------------------
// Multi-level
// ---------------------------------------------------------------------------

/// Deepest decomposition a `width × height` plane supports: `floor(log2(min))`.
pub fn max_decomposition_level(width: usize, height: usize) -> usize {
    let min = width.min(height);
    if min == 0 {
        0
    } else {
        min.ilog2() as usize
    }
}

/// Multi-level decomposition, level 1 first.
///
/// Each level owns its four planes; only the deepest level's LL is a
/// free-standing approximation; shallower LL planes are superseded by the
/// reconstruction of the level below them.
#[derive(Clone, Debug)]
pub struct DwtPyramid {
    levels: Vec<Dwt2Result>,
    wavelet: Wavelet,
}

impl DwtPyramid {
    /// Decompose `plane` into `levels` levels.
    ///
    /// # Errors
    /// [`WatermarkError::InvalidLevel`] if `levels` is 0 or deeper than
    /// `floor(log2(min(rows, cols)))`.
    pub fn decompose(plane: &Plane, levels: usize, wavelet: Wavelet) -> Result<Self> {
        let max = max_decomposition_level(plane.cols(), plane.rows());
        if levels < 1 || levels > max {
            return Err(WatermarkError::InvalidLevel { level: levels, max });
        }

        let mut out = Vec::with_capacity(levels);
        let mut current = dwt2d(plane, wavelet);
        for level in 1..levels {
            let next = dwt2d(&current.ll, wavelet);
            out.push(current);
            current = Dwt2Result {
                level: level + 1,
                ..next
            };
        }
        out.push(current);

        Ok(Self {
            levels: out,
            wavelet,
        })
    }

    /// Reconstruct the full-size plane, deepest level first.
    pub fn reconstruct(&self) -> Plane {
        let mut iter = self.levels.iter().rev();
        let Some(deepest) = iter.next() else {
            return Plane::zeros(0, 0);
        };
        let mut current = idwt2d(deepest, self.wavelet);

        for level in iter {
            // Rebuilt LL replaces the stored one.
            let bands = Dwt2Result {
                ll: current,
                lh: level.lh.clone(),
                hl: level.hl.clone(),
                hh: level.hh.clone(),
                level: level.level,
            };
            current = idwt2d(&bands, self.wavelet);
        }
        current
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn levels(&self) -> &[Dwt2Result] {
        &self.levels
    }

    /// Level `level` (1-based).
    pub fn level(&self, level: usize) -> Option<&Dwt2Result> {
        level.checked_sub(1).and_then(|i| self.levels.get(i))
    }

    /// Subband of level `level` (1-based).
    pub fn band(&self, level: usize, band: SubBand) -> Option<&Plane> {
        self.level(level).map(|l| l.band(band))
    }

    /// Replace a subband with a new plane of the same shape, returning the old one.
    pub fn replace_band(&mut self, level: usize, band: SubBand, plane: Plane) -> Result<Plane> {
        let max = self.levels.len();
        let entry = level
            .checked_sub(1)
            .and_then(|i| self.levels.get_mut(i))
            .ok_or(WatermarkError::InvalidLevel { level, max })?;
        let slot = entry.band_mut(band);
        slot.ensure_same_shape(&plane)?;
        Ok(std::mem::replace(slot, plane))
    }
}
