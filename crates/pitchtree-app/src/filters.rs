// Report filter state and the checks that run before any backend call.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pitchtree_client::protocol::{AnalysisRequest, Handedness, League, OpponentType, PitcherOption};
use pitchtree_core::metrics::RateMetric;

/// At most this many seasons can be combined in one report.
pub const MAX_YEARS: usize = 2;
/// Seasons offered: the current one plus this many before it.
const YEARS_BACK: i32 = 3;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("at most {max} years can be selected")]
    TooManyYears { max: usize },
}

/// A filter combination that cannot be sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select a pitcher to generate the report")]
    MissingPitcher,

    #[error("Please select at least one year")]
    NoYears,

    #[error("{year} is not an available season (choose from {})", .available.join(", "))]
    YearOutOfRange { year: String, available: Vec<String> },

    #[error("Please enter a batter's name")]
    MissingBatter,

    #[error("Minimum pitches must be at least 1")]
    ZeroMinPitches,
}

impl ValidationError {
    /// Notification title shown alongside the message.
    pub fn title(&self) -> &'static str {
        match self {
            ValidationError::YearOutOfRange { .. } => "Invalid Season",
            _ => "Missing Selection",
        }
    }
}

// ---------------------------------------------------------------------------
// FilterState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub league: League,
    pub years: Vec<String>,
    pub pitcher: Option<PitcherOption>,
    pub opponent: OpponentType,
    pub batter_name: String,
    pub handedness: Handedness,
    pub metrics: Vec<RateMetric>,
    pub min_pitches: u32,
}

impl Default for FilterState {
    fn default() -> Self {
        FilterState::new(Utc::now().date_naive())
    }
}

impl FilterState {
    /// Defaults as of `today`: last season, MLB, league-average right-handed
    /// opponent, whiff and hard-hit metrics, 10-pitch minimum.
    pub fn new(today: NaiveDate) -> Self {
        FilterState {
            league: League::Mlb,
            years: vec![(today.year() - 1).to_string()],
            pitcher: None,
            opponent: OpponentType::Average,
            batter_name: String::new(),
            handedness: Handedness::R,
            metrics: vec![RateMetric::Whiff, RateMetric::HardHit],
            min_pitches: 10,
        }
    }

    /// Switching league invalidates the chosen pitcher.
    pub fn set_league(&mut self, league: League) {
        if self.league != league {
            self.league = league;
            self.pitcher = None;
        }
    }

    /// Add `year` if absent, remove it if present.
    pub fn toggle_year(&mut self, year: &str) -> Result<(), FilterError> {
        if let Some(pos) = self.years.iter().position(|y| y == year) {
            self.years.remove(pos);
            return Ok(());
        }
        if self.years.len() >= MAX_YEARS {
            return Err(FilterError::TooManyYears { max: MAX_YEARS });
        }
        self.years.push(year.to_string());
        self.years.sort_unstable_by(|a, b| b.cmp(a));
        Ok(())
    }

    pub fn toggle_metric(&mut self, metric: RateMetric) {
        if let Some(pos) = self.metrics.iter().position(|m| *m == metric) {
            self.metrics.remove(pos);
        } else {
            self.metrics.push(metric);
        }
    }

    /// Check the selection against today's season list and build the
    /// request body.
    pub fn validate(&self) -> Result<AnalysisRequest, ValidationError> {
        self.validate_as_of(Utc::now().date_naive())
    }

    /// Like [`FilterState::validate`], with seasons offered as of `today`.
    pub fn validate_as_of(&self, today: NaiveDate) -> Result<AnalysisRequest, ValidationError> {
        let pitcher = self.pitcher.as_ref().ok_or(ValidationError::MissingPitcher)?;
        if self.years.is_empty() {
            return Err(ValidationError::NoYears);
        }
        let available = available_years(today);
        if let Some(year) = self.years.iter().find(|y| !available.contains(y)) {
            return Err(ValidationError::YearOutOfRange {
                year: year.clone(),
                available,
            });
        }
        let batter = self.batter_name.trim();
        if self.opponent == OpponentType::Specific && batter.is_empty() {
            return Err(ValidationError::MissingBatter);
        }
        if self.min_pitches == 0 {
            return Err(ValidationError::ZeroMinPitches);
        }

        let (batter_name, handedness) = match self.opponent {
            OpponentType::Specific => (Some(batter.to_string()), None),
            OpponentType::Average => (None, Some(self.handedness)),
        };
        Ok(AnalysisRequest {
            pitcher_id: pitcher.value,
            years: self.years.clone(),
            opponent_type: self.opponent,
            batter_name,
            handedness,
            min_pitches: self.min_pitches,
        })
    }

    /// Label for report headers, e.g. `League Average (RHH)`.
    pub fn opponent_label(&self) -> String {
        match self.opponent {
            OpponentType::Specific => self.batter_name.trim().to_string(),
            OpponentType::Average => {
                let hand = match self.handedness {
                    Handedness::R => "R",
                    Handedness::L => "L",
                };
                format!("League Average ({hand}HH)")
            }
        }
    }
}

/// Seasons offered for selection, newest first.
pub fn available_years(today: NaiveDate) -> Vec<String> {
    let current = today.year();
    (0..=YEARS_BACK).map(|back| (current - back).to_string()).collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 15).unwrap()
    }

    fn with_pitcher() -> FilterState {
        let mut f = FilterState::new(today());
        f.pitcher = Some(PitcherOption {
            label: "Tarik Skubal".into(),
            value: 669373,
        });
        f
    }

    #[test]
    fn defaults_match_dashboard() {
        let f = FilterState::new(today());
        assert_eq!(f.league, League::Mlb);
        assert_eq!(f.years, vec!["2025"]);
        assert_eq!(f.opponent, OpponentType::Average);
        assert_eq!(f.handedness, Handedness::R);
        assert_eq!(f.metrics, vec![RateMetric::Whiff, RateMetric::HardHit]);
        assert_eq!(f.min_pitches, 10);
        assert!(f.pitcher.is_none());
    }

    #[test]
    fn available_years_are_current_and_three_prior() {
        assert_eq!(available_years(today()), vec!["2026", "2025", "2024", "2023"]);
    }

    #[test]
    fn toggle_year_caps_at_two() {
        let mut f = FilterState::new(today());
        f.toggle_year("2024").unwrap();
        assert_eq!(f.years, vec!["2025", "2024"]);
        assert_eq!(
            f.toggle_year("2023"),
            Err(FilterError::TooManyYears { max: 2 })
        );
        f.toggle_year("2025").unwrap();
        assert_eq!(f.years, vec!["2024"]);
        f.toggle_year("2024").unwrap();
        assert!(f.years.is_empty());
    }

    #[test]
    fn changing_league_clears_pitcher() {
        let mut f = with_pitcher();
        f.set_league(League::Mlb);
        assert!(f.pitcher.is_some());
        f.set_league(League::Milb);
        assert!(f.pitcher.is_none());
    }

    #[test]
    fn validate_requires_pitcher() {
        let f = FilterState::new(today());
        let err = f.validate_as_of(today()).unwrap_err();
        assert_eq!(err, ValidationError::MissingPitcher);
        assert_eq!(err.title(), "Missing Selection");
        assert_eq!(err.to_string(), "Please select a pitcher to generate the report");
    }

    #[test]
    fn validate_requires_a_year() {
        let mut f = with_pitcher();
        f.years.clear();
        assert_eq!(f.validate_as_of(today()).unwrap_err(), ValidationError::NoYears);
    }

    #[test]
    fn validate_rejects_seasons_outside_the_offered_range() {
        let mut f = with_pitcher();
        f.years = vec!["2025".into(), "2019".into()];
        let err = f.validate_as_of(today()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::YearOutOfRange {
                year: "2019".into(),
                available: available_years(today()),
            }
        );
        assert_eq!(err.title(), "Invalid Season");
        assert_eq!(
            err.to_string(),
            "2019 is not an available season (choose from 2026, 2025, 2024, 2023)"
        );

        // Next season is not offered yet either.
        f.years = vec!["2027".into()];
        assert!(matches!(
            f.validate_as_of(today()),
            Err(ValidationError::YearOutOfRange { .. })
        ));

        // The oldest offered season still passes.
        f.years = vec!["2023".into()];
        assert!(f.validate_as_of(today()).is_ok());
    }

    #[test]
    fn validate_requires_batter_for_specific_opponent() {
        let mut f = with_pitcher();
        f.opponent = OpponentType::Specific;
        f.batter_name = "   ".into();
        assert_eq!(f.validate_as_of(today()).unwrap_err(), ValidationError::MissingBatter);
    }

    #[test]
    fn validate_rejects_zero_min_pitches() {
        let mut f = with_pitcher();
        f.min_pitches = 0;
        assert_eq!(f.validate_as_of(today()).unwrap_err(), ValidationError::ZeroMinPitches);
    }

    #[test]
    fn average_request_sends_handedness_only() {
        let mut f = with_pitcher();
        f.handedness = Handedness::L;
        f.batter_name = "ignored".into();
        let req = f.validate_as_of(today()).unwrap();
        assert_eq!(req.pitcher_id, 669373);
        assert_eq!(req.years, vec!["2025"]);
        assert_eq!(req.opponent_type, OpponentType::Average);
        assert_eq!(req.handedness, Some(Handedness::L));
        assert!(req.batter_name.is_none());
        assert_eq!(f.opponent_label(), "League Average (LHH)");
    }

    #[test]
    fn specific_request_sends_trimmed_batter() {
        let mut f = with_pitcher();
        f.opponent = OpponentType::Specific;
        f.batter_name = " Juan Soto ".into();
        let req = f.validate_as_of(today()).unwrap();
        assert_eq!(req.batter_name.as_deref(), Some("Juan Soto"));
        assert!(req.handedness.is_none());
        assert_eq!(f.opponent_label(), "Juan Soto");
    }

    #[test]
    fn toggle_metric_adds_and_removes() {
        let mut f = FilterState::new(today());
        f.toggle_metric(RateMetric::Chase);
        assert!(f.metrics.contains(&RateMetric::Chase));
        f.toggle_metric(RateMetric::Whiff);
        assert_eq!(f.metrics, vec![RateMetric::HardHit, RateMetric::Chase]);
    }
}
