// Wire types exchanged with the analytics backend.
//
// Field names match the backend's JSON exactly; optional request fields are
// omitted rather than sent as null.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use pitchtree_core::metrics::PitchMetrics;

// ---------------------------------------------------------------------------
// Filter enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum League {
    #[default]
    Mlb,
    Milb,
}

impl League {
    /// Path segment for `GET /pitchers/{league}`.
    pub fn as_path(&self) -> &'static str {
        match self {
            League::Mlb => "mlb",
            League::Milb => "milb",
        }
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

impl FromStr for League {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mlb" => Ok(League::Mlb),
            "milb" => Ok(League::Milb),
            other => Err(format!("unknown league `{other}` (expected mlb or milb)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpponentType {
    Specific,
    #[default]
    Average,
}

impl FromStr for OpponentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "specific" => Ok(OpponentType::Specific),
            "average" => Ok(OpponentType::Average),
            other => Err(format!("unknown opponent type `{other}` (expected specific or average)")),
        }
    }
}

/// Batter handedness for league-average opponents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Handedness {
    #[default]
    R,
    L,
}

impl FromStr for Handedness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "R" => Ok(Handedness::R),
            "L" => Ok(Handedness::L),
            other => Err(format!("unknown handedness `{other}` (expected R or L)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitcherOption {
    pub label: String,
    pub value: i64,
}

/// Body of `POST /analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub pitcher_id: i64,
    pub years: Vec<String>,
    pub opponent_type: OpponentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handedness: Option<Handedness>,
    pub min_pitches: u32,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// One (pitch type, count) row of an analysis. `count` is kept as the raw
/// string so a bad value can be reported without failing the whole response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchRecommendation {
    pub pitch_type: String,
    pub count: String,
    pub score: f64,
    pub pitches: u32,
    pub whiff_rate: f64,
    pub hard_hit_rate: f64,
    pub called_strike_rate: f64,
    pub weak_contact_rate: f64,
    pub chase_rate: f64,
}

impl PitchRecommendation {
    pub fn metrics(&self) -> PitchMetrics {
        PitchMetrics {
            pitch_type: self.pitch_type.clone(),
            whiff_rate: self.whiff_rate,
            hard_hit_rate: self.hard_hit_rate,
            called_strike_rate: self.called_strike_rate,
            weak_contact_rate: self.weak_contact_rate,
            chase_rate: self.chase_rate,
            pitches: self.pitches,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub pitcher_name: String,
    pub opponent_name: String,
    pub years: Vec<String>,
    pub league: String,
    pub total_pitches: u64,
    pub recommendations: Vec<PitchRecommendation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub pitcher_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub pybaseball_available: bool,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
