//! Standard attack battery with per-attack BER pass thresholds.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::attack::{Attack, ImageAttackSimulator};
use super::core::{extract_payload, ExtractParams};
use super::metrics::bit_error_rate;
use super::pixels::PixelBuffer;
use super::text::prepare_watermark;

/// One attack and the BER below which it counts as survived.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttackCase {
    pub attack: Attack,
    pub max_ber: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub name: String,
    pub ber: f64,
    pub passed: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RobustnessReport {
    pub cases: Vec<AttackOutcome>,
}

impl RobustnessReport {
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.passed).count()
    }

    pub fn all_passed(&self) -> bool {
        self.cases.iter().all(|c| c.passed)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RobustnessSuite {
    cases: Vec<AttackCase>,
}

impl Default for RobustnessSuite {
    fn default() -> Self {
        Self::standard()
    }
}

impl RobustnessSuite {
    pub fn new(cases: Vec<AttackCase>) -> Self {
        Self { cases }
    }

    /// JPEG q75 and q50, σ=10 noise, half-scale round trip, ±5° rotation.
    pub fn standard() -> Self {
        Self::new(vec![
            AttackCase {
                attack: Attack::Jpeg { quality: 75 },
                max_ber: 0.1,
            },
            AttackCase {
                attack: Attack::Jpeg { quality: 50 },
                max_ber: 0.2,
            },
            AttackCase {
                attack: Attack::GaussianNoise { sigma: 10.0 },
                max_ber: 0.15,
            },
            AttackCase {
                attack: Attack::Scale { factor: 0.5 },
                max_ber: 0.15,
            },
            AttackCase {
                attack: Attack::Rotate { degrees: 5.0 },
                max_ber: 0.3,
            },
        ])
    }

    pub fn cases(&self) -> &[AttackCase] {
        &self.cases
    }

    /// Attack `watermarked` with every case and measure how many of
    /// `message`'s bits survive.
    ///
    /// Extraction trusts the known message length. A failed attack or
    /// extraction scores BER 1.0.
    pub fn run<R: Rng>(
        &self,
        watermarked: &PixelBuffer,
        message: &str,
        params: &ExtractParams,
        simulator: &mut ImageAttackSimulator<R>,
    ) -> RobustnessReport {
        let expected = prepare_watermark(message);
        let mut report = RobustnessReport::default();

        for case in &self.cases {
            let ber = simulator
                .apply(watermarked, &case.attack)
                .and_then(|attacked| extract_payload(&attacked, params, Some(expected.length)))
                .map(|got| bit_error_rate(expected.message_bits(), &got.bits))
                .unwrap_or_else(|e| {
                    debug!(attack = %case.attack, error = %e, "attack case failed");
                    1.0
                });
            let passed = ber < case.max_ber;
            info!(attack = %case.attack, ber, passed, "robustness case");
            report.cases.push(AttackOutcome {
                name: case.attack.label(),
                ber,
                passed,
            });
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watermark::core::{embed, EmbedParams};

    fn smooth(w: u32, h: u32) -> PixelBuffer {
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                let v = (100.0 + 50.0 * ((x as f64 / 11.0).sin() + (y as f64 / 7.0).cos()) / 2.0) as u8;
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        PixelBuffer::new(w, h, data).unwrap()
    }

    #[test]
    fn test_standard_suite_shape() {
        let suite = RobustnessSuite::standard();
        let thresholds: Vec<f64> = suite.cases().iter().map(|c| c.max_ber).collect();
        assert_eq!(thresholds, vec![0.1, 0.2, 0.15, 0.15, 0.3]);
    }

    #[test]
    fn test_untouched_image_passes() {
        let img = smooth(128, 128);
        let params = EmbedParams::default();
        let marked = embed(&img, "robust", &params).unwrap().image;

        let suite = RobustnessSuite::new(vec![AttackCase {
            attack: Attack::GaussianNoise { sigma: 0.0 },
            max_ber: 0.01,
        }]);
        let mut sim = ImageAttackSimulator::seeded(1);
        let report = suite.run(&marked, "robust", &ExtractParams::from(&params), &mut sim);
        assert_eq!(report.cases.len(), 1);
        assert_eq!(report.cases[0].ber, 0.0);
        assert!(report.all_passed());
    }

    #[test]
    fn test_failed_attack_scores_one() {
        let img = smooth(64, 64);
        let suite = RobustnessSuite::new(vec![AttackCase {
            attack: Attack::Jpeg { quality: 0 },
            max_ber: 0.5,
        }]);
        let mut sim = ImageAttackSimulator::seeded(1);
        let report = suite.run(&img, "x", &ExtractParams::default(), &mut sim);
        assert_eq!(report.cases[0].ber, 1.0);
        assert!(!report.cases[0].passed);
        assert_eq!(report.passed(), 0);
    }

    #[test]
    fn test_standard_run_reports_every_case() {
        let img = smooth(128, 128);
        let params = EmbedParams::default();
        let marked = embed(&img, "robust", &params).unwrap().image;
        let mut sim = ImageAttackSimulator::seeded(42);
        let report = RobustnessSuite::standard().run(
            &marked,
            "robust",
            &ExtractParams::from(&params),
            &mut sim,
        );
        assert_eq!(report.cases.len(), 5);
        assert_eq!(report.cases[0].name, "JPEG q75");
        for case in &report.cases {
            assert!((0.0..=1.0).contains(&case.ber), "{}: {}", case.name, case.ber);
        }
    }
}
