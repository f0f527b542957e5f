//! Invisible image watermarking with the discrete wavelet transform and
//! quantization index modulation.
//!
//! ```
//! use wavemark::{embed, extract, EmbedParams, ExtractParams, PixelBuffer};
//!
//! # fn main() -> wavemark::Result<()> {
//! let (w, h) = (256u32, 256u32);
//! let mut data = Vec::with_capacity((w * h * 4) as usize);
//! for y in 0..h {
//!     for x in 0..w {
//!         let v = 128.0 + 40.0 * (x as f64 / 7.0).sin() * (y as f64 / 5.0).cos();
//!         let v = v as u8;
//!         data.extend_from_slice(&[v, v, v, 255]);
//!     }
//! }
//! let image = PixelBuffer::new(w, h, data)?;
//!
//! let params = EmbedParams::default();
//! let marked = embed(&image, "Copyright © 2024 MyCompany", &params)?;
//! let found = extract(&marked.image, &ExtractParams::from(&params))?;
//! assert_eq!(found.message, "Copyright © 2024 MyCompany");
//! # Ok(())
//! # }
//! ```

pub mod watermark;

pub use watermark::{
    capacity_for, embed, embed_batch, extract, extract_batch, extract_payload, suggest_step,
    Attack, AttackCase, AttackOutcome, DwtPyramid, EmbedOutput, EmbedParams, ExtractOutput,
    ExtractParams, ExtractedPayload, ImageAttackSimulator, PixelBuffer, Plane, QualityMetrics,
    ResizeFilter, Result, RobustnessReport, RobustnessSuite, SubBand, WatermarkError,
    WatermarkPayload, Wavelet,
};
