pub mod attack;
pub mod core;
pub mod dwt;
pub mod error;
pub mod metrics;
pub mod pixels;
pub mod plane;
pub mod qim;
pub mod robustness;
pub mod text;
pub mod wavelets;

pub use self::attack::{Attack, ImageAttackSimulator, ResizeFilter};
pub use self::core::{
    capacity_for, embed, embed_batch, extract, extract_batch, extract_payload, suggest_step,
    EmbedOutput, EmbedParams, ExtractOutput, ExtractParams,
};
pub use self::dwt::{DwtPyramid, SubBand};
pub use self::error::WatermarkError;
pub use self::metrics::QualityMetrics;
pub use self::pixels::PixelBuffer;
pub use self::plane::Plane;
pub use self::robustness::{AttackCase, AttackOutcome, RobustnessReport, RobustnessSuite};
pub use self::text::{ExtractedPayload, WatermarkPayload};
pub use self::wavelets::Wavelet;

/// Result type for watermark operations
pub type Result<T> = std::result::Result<T, WatermarkError>;
