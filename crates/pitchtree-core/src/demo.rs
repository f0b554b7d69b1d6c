// Demonstration data for running the dashboard without a backend.
//
// Nothing here touches real analysis results. Jitter is applied to display
// copies after scoring, so a shown score always matches the rates it was
// computed from, and every perturbed row is flagged synthetic.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::metrics::{clamp_rate, PitchMetrics, ScoredPitch};

const WHIFF_JITTER: f64 = 0.05;
const HARD_HIT_JITTER: f64 = 0.025;
const CALLED_STRIKE_JITTER: f64 = 0.025;

/// A four-pitch arsenal used when demo mode is on.
pub fn sample_arsenal() -> Vec<PitchMetrics> {
    vec![
        PitchMetrics {
            pitch_type: "4-Seam Fastball".into(),
            whiff_rate: 0.234,
            hard_hit_rate: 0.156,
            called_strike_rate: 0.089,
            weak_contact_rate: 0.078,
            chase_rate: 0.045,
            pitches: 187,
        },
        PitchMetrics {
            pitch_type: "Slider".into(),
            whiff_rate: 0.389,
            hard_hit_rate: 0.098,
            called_strike_rate: 0.045,
            weak_contact_rate: 0.067,
            chase_rate: 0.156,
            pitches: 134,
        },
        PitchMetrics {
            pitch_type: "Changeup".into(),
            whiff_rate: 0.312,
            hard_hit_rate: 0.123,
            called_strike_rate: 0.067,
            weak_contact_rate: 0.089,
            chase_rate: 0.098,
            pitches: 78,
        },
        PitchMetrics {
            pitch_type: "Curveball".into(),
            whiff_rate: 0.441,
            hard_hit_rate: 0.087,
            called_strike_rate: 0.078,
            weak_contact_rate: 0.056,
            chase_rate: 0.123,
            pitches: 39,
        },
    ]
}

/// A scored pitch prepared for display. `displayed` may differ from
/// `scored.metrics` when `synthetic` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayedPitch {
    pub scored: ScoredPitch,
    pub displayed: PitchMetrics,
    pub synthetic: bool,
}

impl DisplayedPitch {
    /// Pass-through for real data.
    pub fn exact(scored: ScoredPitch) -> Self {
        DisplayedPitch {
            displayed: scored.metrics.clone(),
            scored,
            synthetic: false,
        }
    }
}

/// Seeded noise source for demo displays.
#[derive(Debug, Clone)]
pub struct DemoJitter {
    seed: u64,
}

impl DemoJitter {
    pub fn new(seed: u64) -> Self {
        DemoJitter { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Add bounded noise to display copies of the whiff, hard-hit and
    /// called-strike rates. The same seed always yields the same output.
    pub fn perturb_display(&self, scored: &[ScoredPitch]) -> Vec<DisplayedPitch> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        scored
            .iter()
            .map(|sp| {
                let mut shown = sp.metrics.clone();
                shown.whiff_rate =
                    clamp_rate(shown.whiff_rate + rng.gen_range(-WHIFF_JITTER..=WHIFF_JITTER));
                shown.hard_hit_rate = clamp_rate(
                    shown.hard_hit_rate + rng.gen_range(-HARD_HIT_JITTER..=HARD_HIT_JITTER),
                );
                shown.called_strike_rate = clamp_rate(
                    shown.called_strike_rate
                        + rng.gen_range(-CALLED_STRIKE_JITTER..=CALLED_STRIKE_JITTER),
                );
                DisplayedPitch {
                    scored: sp.clone(),
                    displayed: shown,
                    synthetic: true,
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
