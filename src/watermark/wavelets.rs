//! Wavelet filter banks.
//!
//! Filters are fixed tables looked up by [`Wavelet`]; nothing here is ever
//! mutated, so the tables can be shared freely across threads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lowpass/highpass analysis taps of equal length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveletFilter {
    pub lowpass: &'static [f64],
    pub highpass: &'static [f64],
}

impl WaveletFilter {
    #[inline]
    pub fn taps(&self) -> usize {
        self.lowpass.len()
    }
}

static HAAR: WaveletFilter = WaveletFilter {
    lowpass: &[0.7071067811865476, 0.7071067811865476],
    highpass: &[-0.7071067811865476, 0.7071067811865476],
};

// Unnormalized: the lowpass taps sum to 2, not sqrt(2).
static DB4: WaveletFilter = WaveletFilter {
    lowpass: &[
        0.6830127018922193,
        1.1830127018922193,
        0.3169872981077807,
        -0.1830127018922193,
    ],
    highpass: &[
        -0.1830127018922193,
        -0.3169872981077807,
        1.1830127018922193,
        -0.6830127018922193,
    ],
};

static DB8: WaveletFilter = WaveletFilter {
    lowpass: &[
        0.32580343,
        1.01094572,
        0.89220014,
        -0.03957503,
        -0.26450717,
        0.0436163,
        0.0465036,
        -0.01498699,
    ],
    highpass: &[
        -0.01498699,
        -0.0465036,
        0.0436163,
        0.26450717,
        -0.03957503,
        -0.89220014,
        1.01094572,
        -0.32580343,
    ],
};

/// Named wavelet family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wavelet {
    #[default]
    Haar,
    Db4,
    Db8,
}

impl Wavelet {
    pub const ALL: [Wavelet; 3] = [Wavelet::Haar, Wavelet::Db4, Wavelet::Db8];

    /// Filter taps for this wavelet.
    #[inline]
    pub fn filter(self) -> &'static WaveletFilter {
        match self {
            Wavelet::Haar => &HAAR,
            Wavelet::Db4 => &DB4,
            Wavelet::Db8 => &DB8,
        }
    }

    /// Human-readable name.
    pub const fn display_name(self) -> &'static str {
        match self {
            Wavelet::Haar => "Haar",
            Wavelet::Db4 => "Daubechies 4",
            Wavelet::Db8 => "Daubechies 8",
        }
    }

    /// Short identifier used in parameter files and on the command line.
    pub const fn id(self) -> &'static str {
        match self {
            Wavelet::Haar => "haar",
            Wavelet::Db4 => "db4",
            Wavelet::Db8 => "db8",
        }
    }

    /// Synthesis with the analysis taps is only exact for Haar.
    pub const fn reconstructs_exactly(self) -> bool {
        matches!(self, Wavelet::Haar)
    }
}

impl fmt::Display for Wavelet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Wavelet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "haar" => Ok(Wavelet::Haar),
            "db4" => Ok(Wavelet::Db4),
            "db8" => Ok(Wavelet::Db8),
            _ => Err(format!("unknown wavelet '{s}'; expected haar, db4, or db8")),
        }
    }
}
