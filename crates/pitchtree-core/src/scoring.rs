// Count-specific pitch scoring and ranking.
//
// Scoring is a pure function of (pitch rates, count, weight tables, bounds).
// The engine owns no mutable state and can be shared freely across tasks.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::count::Count;
use crate::metrics::{PitchMetrics, RateMetric, ScoredPitch};
use crate::weights::{CountDifficultyModifier, CountWeights, WeightsError};

/// Multiplier that lifts the weighted rate sum into the display band.
const SCALE_FACTOR: f64 = 10.0;

/// Lower edge of a Good rating on the ten-point scale.
pub const GOOD_THRESHOLD: f64 = 7.5;
/// Scores strictly below this are Poor.
pub const POOR_THRESHOLD: f64 = 3.5;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("no weights or difficulty modifier configured for count {count}")]
    MissingWeight { count: Count },

    #[error("invalid score bounds: min {min} must be below max {max}")]
    InvalidBounds { min: f64, max: f64 },

    #[error(transparent)]
    Weights(#[from] WeightsError),
}

// ---------------------------------------------------------------------------
// ScoreBounds
// ---------------------------------------------------------------------------

/// Clamp range applied to the scaled score before the difficulty modifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for ScoreBounds {
    fn default() -> Self {
        ScoreBounds {
            min: 1.0,
            max: 10.0,
        }
    }
}

impl ScoreBounds {
    pub fn new(min: f64, max: f64) -> Result<Self, ScoringError> {
        let bounds = ScoreBounds { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min < self.max) {
            return Err(ScoringError::InvalidBounds {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

// ---------------------------------------------------------------------------
// Rating
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rating {
    Good,
    Average,
    Poor,
}

impl Rating {
    pub fn label(&self) -> &'static str {
        match self {
            Rating::Good => "Good",
            Rating::Average => "Average",
            Rating::Poor => "Poor",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bucket a ten-point score. Good is `>= 7.5`, Poor is `< 3.5`, everything
/// else (including NaN) is Average.
pub fn classify(score: f64) -> Rating {
    if score >= GOOD_THRESHOLD {
        Rating::Good
    } else if score < POOR_THRESHOLD {
        Rating::Poor
    } else {
        Rating::Average
    }
}

/// The scale a score was reported on. The backend may send 0-100 values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreScale {
    #[default]
    TenPoint,
    Percentile,
}

impl ScoreScale {
    /// Percentile when any score exceeds the ten-point ceiling.
    pub fn detect<I>(scores: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        if scores.into_iter().any(|s| s > SCALE_FACTOR) {
            ScoreScale::Percentile
        } else {
            ScoreScale::TenPoint
        }
    }

    /// Map a score on this scale to the ten-point scale.
    pub fn to_ten_point(&self, score: f64) -> f64 {
        match self {
            ScoreScale::TenPoint => score,
            ScoreScale::Percentile => score / SCALE_FACTOR,
        }
    }
}

pub fn classify_on(scale: ScoreScale, score: f64) -> Rating {
    classify(scale.to_ten_point(score))
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Score one pitch for one count with the default 1..10 bounds.
pub fn score_for_count(
    pitch: &PitchMetrics,
    count: Count,
    weights: &CountWeights,
    modifiers: &CountDifficultyModifier,
) -> Result<f64, ScoringError> {
    score_with_bounds(pitch, count, weights, modifiers, ScoreBounds::default())
}

fn score_with_bounds(
    pitch: &PitchMetrics,
    count: Count,
    weights: &CountWeights,
    modifiers: &CountDifficultyModifier,
    bounds: ScoreBounds,
) -> Result<f64, ScoringError> {
    let w = weights
        .get(count)
        .ok_or(ScoringError::MissingWeight { count })?;
    let modifier = modifiers
        .get(count)
        .ok_or(ScoringError::MissingWeight { count })?;

    let pitch = pitch.clamped();
    let raw: f64 = RateMetric::ALL
        .iter()
        .map(|&metric| {
            let term = pitch.rate(metric) * w.weight(metric);
            if metric.is_pitcher_favorable() {
                term
            } else {
                -term
            }
        })
        .sum();

    // Clamp first, then discount: the result may land below `bounds.min`.
    let scaled = bounds.clamp(raw * SCALE_FACTOR);
    let score = scaled * modifier;

    debug!(
        pitch_type = %pitch.pitch_type,
        %count,
        raw,
        scaled,
        modifier,
        score,
        "scored pitch"
    );
    Ok(score)
}

/// Descending by score, then by larger sample size. Stable sorts keep input
/// order for anything still tied.
fn rank_order(a: &ScoredPitch, b: &ScoredPitch) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.metrics.pitches.cmp(&a.metrics.pitches))
}

/// Order already-scored pitches, keep the best `n` and assign 1-based ranks.
pub fn rank_scored(mut scored: Vec<ScoredPitch>, n: usize) -> Vec<ScoredPitch> {
    scored.sort_by(rank_order);
    scored.truncate(n);
    for (i, sp) in scored.iter_mut().enumerate() {
        sp.rank = i + 1;
    }
    scored
}

// ---------------------------------------------------------------------------
// CountScoringEngine
// ---------------------------------------------------------------------------

/// Weight tables plus bounds, bundled for repeated scoring passes.
#[derive(Debug, Clone)]
pub struct CountScoringEngine {
    weights: CountWeights,
    modifiers: CountDifficultyModifier,
    bounds: ScoreBounds,
}

impl Default for CountScoringEngine {
    fn default() -> Self {
        CountScoringEngine::calibrated()
    }
}

impl CountScoringEngine {
    /// Build an engine from tables that cover all twelve counts.
    pub fn new(
        weights: CountWeights,
        modifiers: CountDifficultyModifier,
        bounds: ScoreBounds,
    ) -> Result<Self, ScoringError> {
        weights.validate()?;
        modifiers.validate()?;
        bounds.validate()?;
        Ok(CountScoringEngine {
            weights,
            modifiers,
            bounds,
        })
    }

    pub fn calibrated() -> Self {
        CountScoringEngine {
            weights: CountWeights::calibrated(),
            modifiers: CountDifficultyModifier::calibrated(),
            bounds: ScoreBounds::default(),
        }
    }

    pub fn weights(&self) -> &CountWeights {
        &self.weights
    }

    pub fn modifiers(&self) -> &CountDifficultyModifier {
        &self.modifiers
    }

    pub fn bounds(&self) -> ScoreBounds {
        self.bounds
    }

    pub fn score_for_count(&self, pitch: &PitchMetrics, count: Count) -> Result<f64, ScoringError> {
        score_with_bounds(pitch, count, &self.weights, &self.modifiers, self.bounds)
    }

    /// Score every pitch for `count` and keep the best `n`.
    pub fn rank_top_n(
        &self,
        pitches: &[PitchMetrics],
        count: Count,
        n: usize,
    ) -> Result<Vec<ScoredPitch>, ScoringError> {
        let scored = pitches
            .iter()
            .map(|p| {
                Ok(ScoredPitch {
                    metrics: p.clone(),
                    count,
                    score: self.score_for_count(p, count)?,
                    rank: 0,
                })
            })
            .collect::<Result<Vec<_>, ScoringError>>()?;

        Ok(rank_scored(scored, n))
    }

    /// Rank the candidates of every count that has any.
    pub fn recommend_all(
        &self,
        pitches_by_count: &BTreeMap<Count, Vec<PitchMetrics>>,
        n: usize,
    ) -> Result<BTreeMap<Count, Vec<ScoredPitch>>, ScoringError> {
        let mut out = BTreeMap::new();
        for (&count, pitches) in pitches_by_count {
            if pitches.is_empty() {
                continue;
            }
            out.insert(count, self.rank_top_n(pitches, count, n)?);
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn c(b: u8, s: u8) -> Count {
        Count::new(b, s).unwrap()
    }

    fn pitch(name: &str, whiff: f64, hard: f64, called: f64, weak: f64, chase: f64, n: u32) -> PitchMetrics {
        PitchMetrics {
            pitch_type: name.into(),
            whiff_rate: whiff,
            hard_hit_rate: hard,
            called_strike_rate: called,
            weak_contact_rate: weak,
            chase_rate: chase,
            pitches: n,
        }
    }

    fn fastball() -> PitchMetrics {
        pitch("4-Seam Fastball", 0.234, 0.156, 0.089, 0.078, 0.045, 187)
    }

    #[test]
    fn first_pitch_example_clamps_then_discounts() {
        let score = score_for_count(
            &fastball(),
            c(0, 0),
            &CountWeights::calibrated(),
            &CountDifficultyModifier::calibrated(),
        )
        .unwrap();
        assert!((score - 0.85).abs() < 1e-12, "got {score}");
    }

    #[test]
    fn perfect_rates_score_by_count_weights() {
        let engine = CountScoringEngine::calibrated();
        let elite = pitch("Splitter", 1.0, 0.0, 1.0, 1.0, 1.0, 50);
        // 3-0: raw = 0.053 + 0.009 + 0.146 + 0.759 = 0.967 -> 9.67, modifier 1.0
        let s = engine.score_for_count(&elite, c(3, 0)).unwrap();
        assert!((s - 9.67).abs() < 1e-9, "got {s}");

        // 1-1: favorable weights sum to 0.142 -> 1.42, then 0.8.
        let s = engine.score_for_count(&elite, c(1, 1)).unwrap();
        assert!((s - 1.136).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn out_of_range_rates_are_clamped_before_weighting() {
        let engine = CountScoringEngine::calibrated();
        let wild = pitch("Knuckle", 3.0, -1.0, 0.0, 0.0, 0.0, 10);
        let tame = pitch("Knuckle", 1.0, 0.0, 0.0, 0.0, 0.0, 10);
        assert_eq!(
            engine.score_for_count(&wild, c(2, 2)).unwrap(),
            engine.score_for_count(&tame, c(2, 2)).unwrap()
        );

        // NaN counts as a zero rate instead of poisoning the sum.
        let nan = pitch("Knuckle", 1.0, f64::NAN, 0.0, 0.0, 0.0, 10);
        let s = engine.score_for_count(&nan, c(2, 2)).unwrap();
        assert!(s.is_finite());
        assert_eq!(s, engine.score_for_count(&tame, c(2, 2)).unwrap());
    }

    #[test]
    fn missing_weight_is_reported() {
        let mut weights = CountWeights::default();
        let modifiers = CountDifficultyModifier::calibrated();
        let err = score_for_count(&fastball(), c(2, 1), &weights, &modifiers).unwrap_err();
        assert_eq!(err, ScoringError::MissingWeight { count: c(2, 1) });

        let calibrated = CountWeights::calibrated();
        weights.insert(c(2, 1), *calibrated.get(c(2, 1)).unwrap());
        let err = score_for_count(&fastball(), c(2, 1), &weights, &CountDifficultyModifier::default())
            .unwrap_err();
        assert_eq!(err, ScoringError::MissingWeight { count: c(2, 1) });
    }

    #[test]
    fn engine_new_rejects_incomplete_tables() {
        let err = CountScoringEngine::new(
            CountWeights::default(),
            CountDifficultyModifier::calibrated(),
            ScoreBounds::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ScoringError::Weights(WeightsError::MissingCount { .. })));
    }

    #[test]
    fn engine_new_rejects_inverted_bounds() {
        let err = CountScoringEngine::new(
            CountWeights::calibrated(),
            CountDifficultyModifier::calibrated(),
            ScoreBounds { min: 10.0, max: 1.0 },
        )
        .unwrap_err();
        assert_eq!(err, ScoringError::InvalidBounds { min: 10.0, max: 1.0 });
    }

    #[test]
    fn custom_bounds_change_the_floor() {
        let engine = CountScoringEngine::new(
            CountWeights::calibrated(),
            CountDifficultyModifier::calibrated(),
            ScoreBounds::new(0.0, 10.0).unwrap(),
        )
        .unwrap();
        let s = engine.score_for_count(&fastball(), c(0, 0)).unwrap();
        assert_eq!(s, 0.0);
    }

    #[test]
    fn classify_boundaries() {
        assert_eq!(classify(7.5), Rating::Good);
        assert_eq!(classify(3.4), Rating::Poor);
        assert_eq!(classify(5.0), Rating::Average);
        assert_eq!(classify(3.5), Rating::Average);
        assert_eq!(classify(f64::NEG_INFINITY), Rating::Poor);
        assert_eq!(classify(f64::INFINITY), Rating::Good);
        assert_eq!(classify(f64::NAN), Rating::Average);
    }

    #[test]
    fn percentile_scores_classify_after_rescaling() {
        assert_eq!(classify_on(ScoreScale::Percentile, 80.0), Rating::Good);
        assert_eq!(classify_on(ScoreScale::Percentile, 34.0), Rating::Poor);
        assert_eq!(classify_on(ScoreScale::TenPoint, 8.0), Rating::Good);
    }

    #[test]
    fn scale_detection() {
        assert_eq!(ScoreScale::detect([1.2, 9.9, 10.0]), ScoreScale::TenPoint);
        assert_eq!(ScoreScale::detect([4.0, 62.5]), ScoreScale::Percentile);
        assert_eq!(ScoreScale::detect(std::iter::empty()), ScoreScale::TenPoint);
    }

    #[test]
    fn rank_top_n_sorts_and_truncates() {
        let engine = CountScoringEngine::calibrated();
        let pitches = vec![
            fastball(),
            pitch("Slider", 0.389, 0.098, 0.045, 0.067, 0.156, 134),
            pitch("Changeup", 0.312, 0.123, 0.067, 0.089, 0.098, 78),
            pitch("Curveball", 0.441, 0.087, 0.078, 0.056, 0.123, 39),
        ];
        let top = engine.rank_top_n(&pitches, c(2, 2), 3).unwrap();
        assert_eq!(top.len(), 3);
        for pair in top.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        let ranks: Vec<usize> = top.iter().map(|s| s.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert!(top.iter().all(|s| s.count == c(2, 2)));
        assert_eq!(top[0].metrics.pitch_type, "Curveball");
    }

    #[test]
    fn rank_ties_prefer_larger_sample_then_input_order() {
        let engine = CountScoringEngine::calibrated();
        // Every one of these clamps to the floor at 0-0.
        let pitches = vec![
            pitch("A", 0.0, 0.5, 0.0, 0.0, 0.0, 10),
            pitch("B", 0.0, 0.5, 0.0, 0.0, 0.0, 40),
            pitch("C", 0.0, 0.5, 0.0, 0.0, 0.0, 10),
        ];
        let ranked = engine.rank_top_n(&pitches, c(0, 0), 10).unwrap();
        let order: Vec<&str> = ranked.iter().map(|s| s.metrics.pitch_type.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
    }

    #[test]
    fn rank_top_n_with_zero_or_empty() {
        let engine = CountScoringEngine::calibrated();
        assert!(engine.rank_top_n(&[fastball()], c(1, 0), 0).unwrap().is_empty());
        assert!(engine.rank_top_n(&[], c(1, 0), 3).unwrap().is_empty());
    }

    #[test]
    fn recommend_all_skips_counts_without_candidates() {
        let engine = CountScoringEngine::calibrated();
        let mut by_count = BTreeMap::new();
        by_count.insert(c(0, 0), vec![fastball()]);
        by_count.insert(c(1, 2), Vec::new());
        by_count.insert(c(3, 2), vec![fastball(), pitch("Sinker", 0.1, 0.2, 0.3, 0.2, 0.1, 60)]);

        let all = engine.recommend_all(&by_count, 1).unwrap();
        assert_eq!(all.len(), 2);
        assert!(!all.contains_key(&c(1, 2)));
        assert_eq!(all[&c(3, 2)].len(), 1);
    }

    fn rate() -> impl Strategy<Value = f64> {
        0.0f64..=1.0
    }

    fn any_count() -> impl Strategy<Value = Count> {
        (0u8..=3, 0u8..=2).prop_map(|(b, s)| Count::new(b, s).unwrap())
    }

    proptest! {
        #[test]
        fn scoring_is_deterministic(
            w in rate(), h in rate(), cs in rate(), wc in rate(), ch in rate(), count in any_count()
        ) {
            let engine = CountScoringEngine::calibrated();
            let p = pitch("P", w, h, cs, wc, ch, 1);
            prop_assert_eq!(
                engine.score_for_count(&p, count).unwrap(),
                engine.score_for_count(&p, count).unwrap()
            );
        }

        #[test]
        fn favorable_rates_never_lower_the_score(
            w in rate(), h in rate(), cs in rate(), wc in rate(), ch in rate(),
            bump in rate(), which in 0usize..4, count in any_count()
        ) {
            let engine = CountScoringEngine::calibrated();
            let base = pitch("P", w, h, cs, wc, ch, 1);
            let metric = [
                RateMetric::Whiff,
                RateMetric::CalledStrike,
                RateMetric::WeakContact,
                RateMetric::Chase,
            ][which];
            let mut higher = base.clone();
            higher.set_rate(metric, (base.rate(metric) + bump).min(1.0));
            prop_assert!(
                engine.score_for_count(&higher, count).unwrap()
                    >= engine.score_for_count(&base, count).unwrap()
            );
        }

        #[test]
        fn hard_contact_never_raises_the_score(
            w in rate(), h in rate(), cs in rate(), wc in rate(), ch in rate(),
            bump in rate(), count in any_count()
        ) {
            let engine = CountScoringEngine::calibrated();
            let base = pitch("P", w, h, cs, wc, ch, 1);
            let mut harder = base.clone();
            harder.hard_hit_rate = (h + bump).min(1.0);
            prop_assert!(
                engine.score_for_count(&harder, count).unwrap()
                    <= engine.score_for_count(&base, count).unwrap()
            );
        }

        #[test]
        fn score_stays_within_discounted_bounds(
            w in rate(), h in rate(), cs in rate(), wc in rate(), ch in rate(), count in any_count()
        ) {
            let engine = CountScoringEngine::calibrated();
            let p = pitch("P", w, h, cs, wc, ch, 1);
            let s = engine.score_for_count(&p, count).unwrap();
            let m = engine.modifiers().get(count).unwrap();
            prop_assert!(s >= m * 1.0 - 1e-12 && s <= m * 10.0 + 1e-12);
        }
    }
}
