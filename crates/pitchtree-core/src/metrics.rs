// Pitch rate metrics and scored results.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::count::Count;

// ---------------------------------------------------------------------------
// RateMetric
// ---------------------------------------------------------------------------

/// The five outcome rates the scoring engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RateMetric {
    #[serde(rename = "whiff_rate")]
    Whiff,
    #[serde(rename = "hard_hit_rate")]
    HardHit,
    #[serde(rename = "called_strike_rate")]
    CalledStrike,
    #[serde(rename = "weak_contact_rate")]
    WeakContact,
    #[serde(rename = "chase_rate")]
    Chase,
}

impl RateMetric {
    pub const ALL: [RateMetric; 5] = [
        RateMetric::Whiff,
        RateMetric::HardHit,
        RateMetric::CalledStrike,
        RateMetric::WeakContact,
        RateMetric::Chase,
    ];

    /// Field name used on the wire and in metric selections (`whiff_rate`, ...).
    pub fn key(&self) -> &'static str {
        match self {
            RateMetric::Whiff => "whiff_rate",
            RateMetric::HardHit => "hard_hit_rate",
            RateMetric::CalledStrike => "called_strike_rate",
            RateMetric::WeakContact => "weak_contact_rate",
            RateMetric::Chase => "chase_rate",
        }
    }

    /// Name of the per-count weight coefficient (`is_whiff`, ...).
    pub fn weight_key(&self) -> &'static str {
        match self {
            RateMetric::Whiff => "is_whiff",
            RateMetric::HardHit => "is_hard_hit",
            RateMetric::CalledStrike => "is_called_strike",
            RateMetric::WeakContact => "is_weak_contact",
            RateMetric::Chase => "is_chase",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RateMetric::Whiff => "Whiff %",
            RateMetric::HardHit => "Hard Hit %",
            RateMetric::CalledStrike => "Called Strike %",
            RateMetric::WeakContact => "Weak Contact %",
            RateMetric::Chase => "Chase %",
        }
    }

    /// Hard contact is the only outcome that counts against the pitcher.
    pub fn is_pitcher_favorable(&self) -> bool {
        !matches!(self, RateMetric::HardHit)
    }

    /// Accepts either the rate key or the weight key.
    pub fn from_key(key: &str) -> Option<Self> {
        RateMetric::ALL
            .into_iter()
            .find(|m| m.key() == key || m.weight_key() == key)
    }
}

impl fmt::Display for RateMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Render a rate in [0,1] as a percentage with one decimal (`0.234` -> `23.4%`).
pub fn format_rate(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

// ---------------------------------------------------------------------------
// PitchMetrics
// ---------------------------------------------------------------------------

/// Observed outcome rates for one pitch type, plus the sample size they were
/// computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchMetrics {
    pub pitch_type: String,
    pub whiff_rate: f64,
    pub hard_hit_rate: f64,
    pub called_strike_rate: f64,
    pub weak_contact_rate: f64,
    pub chase_rate: f64,
    pub pitches: u32,
}

impl PitchMetrics {
    pub fn rate(&self, metric: RateMetric) -> f64 {
        match metric {
            RateMetric::Whiff => self.whiff_rate,
            RateMetric::HardHit => self.hard_hit_rate,
            RateMetric::CalledStrike => self.called_strike_rate,
            RateMetric::WeakContact => self.weak_contact_rate,
            RateMetric::Chase => self.chase_rate,
        }
    }

    pub fn set_rate(&mut self, metric: RateMetric, value: f64) {
        let slot = match metric {
            RateMetric::Whiff => &mut self.whiff_rate,
            RateMetric::HardHit => &mut self.hard_hit_rate,
            RateMetric::CalledStrike => &mut self.called_strike_rate,
            RateMetric::WeakContact => &mut self.weak_contact_rate,
            RateMetric::Chase => &mut self.chase_rate,
        };
        *slot = value;
    }

    /// Copy with every rate forced into [0,1]. Non-finite rates become 0.
    pub fn clamped(&self) -> Self {
        let mut out = self.clone();
        for metric in RateMetric::ALL {
            out.set_rate(metric, clamp_rate(self.rate(metric)));
        }
        out
    }
}

/// Force a rate into [0,1]; NaN and infinities map to 0.
pub fn clamp_rate(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// ScoredPitch
// ---------------------------------------------------------------------------

/// A pitch scored for one count. `rank` is 1-based within that count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPitch {
    pub metrics: PitchMetrics,
    pub count: Count,
    pub score: f64,
    pub rank: usize,
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
