// Per-count weight coefficients and count difficulty modifiers.
//
// Both tables are static configuration: loaded once at start-up (either the
// calibrated built-ins below or a scoring.toml override) and never mutated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::count::Count;
use crate::metrics::RateMetric;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightsError {
    #[error("weight {metric} for count {count} must be within [0, 1], got {value}")]
    InvalidWeight {
        count: Count,
        metric: &'static str,
        value: f64,
    },

    #[error("difficulty modifier for count {count} must be within (0, 1], got {value}")]
    InvalidModifier { count: Count, value: f64 },

    #[error("{table} table has no entry for count {count}")]
    MissingCount { table: &'static str, count: Count },
}

// ---------------------------------------------------------------------------
// MetricWeights
// ---------------------------------------------------------------------------

/// Independently calibrated coefficients for one count. They are not a
/// probability distribution and need not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricWeights {
    #[serde(alias = "is_whiff")]
    pub whiff: f64,
    #[serde(alias = "is_hard_hit")]
    pub hard_hit: f64,
    #[serde(alias = "is_called_strike")]
    pub called_strike: f64,
    #[serde(alias = "is_weak_contact")]
    pub weak_contact: f64,
    #[serde(alias = "is_chase")]
    pub chase: f64,
}

impl MetricWeights {
    pub fn weight(&self, metric: RateMetric) -> f64 {
        match metric {
            RateMetric::Whiff => self.whiff,
            RateMetric::HardHit => self.hard_hit,
            RateMetric::CalledStrike => self.called_strike,
            RateMetric::WeakContact => self.weak_contact,
            RateMetric::Chase => self.chase,
        }
    }
}

// ---------------------------------------------------------------------------
// Calibrated tables
// ---------------------------------------------------------------------------

/// (balls, strikes, hard_hit, called_strike, weak_contact, whiff, chase)
const CALIBRATED_WEIGHTS: [(u8, u8, f64, f64, f64, f64, f64); 12] = [
    (0, 0, 0.745, 0.101, 0.078, 0.067, 0.009),
    (0, 1, 0.877, 0.053, 0.019, 0.023, 0.027),
    (0, 2, 0.529, 0.119, 0.001, 0.349, 0.002),
    (1, 0, 0.693, 0.087, 0.124, 0.083, 0.013),
    (1, 1, 0.858, 0.049, 0.032, 0.030, 0.031),
    (1, 2, 0.511, 0.126, 0.011, 0.350, 0.003),
    (2, 0, 0.418, 0.185, 0.248, 0.120, 0.030),
    (2, 1, 0.655, 0.107, 0.127, 0.082, 0.029),
    (2, 2, 0.310, 0.164, 0.043, 0.478, 0.006),
    (3, 0, 0.033, 0.759, 0.146, 0.053, 0.009),
    (3, 1, 0.054, 0.249, 0.433, 0.199, 0.064),
    (3, 2, 0.022, 0.294, 0.169, 0.485, 0.029),
];

/// (balls, strikes, modifier). Hitter's counts are discounted less because
/// the pitch choice there is already forced.
const CALIBRATED_MODIFIERS: [(u8, u8, f64); 12] = [
    (0, 0, 0.85),
    (0, 1, 0.8),
    (0, 2, 0.95),
    (1, 0, 0.85),
    (1, 1, 0.8),
    (1, 2, 0.95),
    (2, 0, 0.9),
    (2, 1, 0.85),
    (2, 2, 1.0),
    (3, 0, 1.0),
    (3, 1, 1.0),
    (3, 2, 1.0),
];

// ---------------------------------------------------------------------------
// CountWeights
// ---------------------------------------------------------------------------

/// Count -> metric weights. Deserializes from a table keyed by `"b-s"`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountWeights(BTreeMap<Count, MetricWeights>);

impl CountWeights {
    pub fn new(entries: BTreeMap<Count, MetricWeights>) -> Self {
        CountWeights(entries)
    }

    /// The historical per-count calibration shipped with the dashboard.
    pub fn calibrated() -> Self {
        let entries = CALIBRATED_WEIGHTS
            .iter()
            .map(|&(b, s, hard_hit, called_strike, weak_contact, whiff, chase)| {
                (
                    Count::from_table(b, s),
                    MetricWeights {
                        whiff,
                        hard_hit,
                        called_strike,
                        weak_contact,
                        chase,
                    },
                )
            })
            .collect();
        CountWeights(entries)
    }

    pub fn get(&self, count: Count) -> Option<&MetricWeights> {
        self.0.get(&count)
    }

    pub fn insert(&mut self, count: Count, weights: MetricWeights) {
        self.0.insert(count, weights);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Count, &MetricWeights)> {
        self.0.iter()
    }

    /// Every count present and every weight within [0, 1].
    pub fn validate(&self) -> Result<(), WeightsError> {
        for count in Count::all() {
            let Some(w) = self.0.get(&count) else {
                return Err(WeightsError::MissingCount {
                    table: "weights",
                    count,
                });
            };
            for metric in RateMetric::ALL {
                let value = w.weight(metric);
                if !(0.0..=1.0).contains(&value) {
                    return Err(WeightsError::InvalidWeight {
                        count,
                        metric: metric.weight_key(),
                        value,
                    });
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CountDifficultyModifier
// ---------------------------------------------------------------------------

/// Count -> multiplicative discount in (0, 1] applied after clamping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountDifficultyModifier(BTreeMap<Count, f64>);

impl CountDifficultyModifier {
    pub fn new(entries: BTreeMap<Count, f64>) -> Self {
        CountDifficultyModifier(entries)
    }

    pub fn calibrated() -> Self {
        let entries = CALIBRATED_MODIFIERS
            .iter()
            .map(|&(b, s, m)| (Count::from_table(b, s), m))
            .collect();
        CountDifficultyModifier(entries)
    }

    pub fn get(&self, count: Count) -> Option<f64> {
        self.0.get(&count).copied()
    }

    pub fn insert(&mut self, count: Count, modifier: f64) {
        self.0.insert(count, modifier);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn validate(&self) -> Result<(), WeightsError> {
        for count in Count::all() {
            let Some(&value) = self.0.get(&count) else {
                return Err(WeightsError::MissingCount {
                    table: "modifiers",
                    count,
                });
            };
            if !(value > 0.0 && value <= 1.0) {
                return Err(WeightsError::InvalidModifier { count, value });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
