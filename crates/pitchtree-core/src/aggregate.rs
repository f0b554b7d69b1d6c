// Pitch-level CSV rows -> per-count PitchMetrics.
//
// Rows follow the Statcast column names. Only `pitch_type`, `description`,
// `balls`, `strikes` and `events` are required; `zone` and `launch_speed`
// feed the chase and contact-quality rates when present.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use thiserror::Error;
use tracing::{debug, warn};

use crate::count::Count;
use crate::metrics::PitchMetrics;

pub const REQUIRED_COLUMNS: [&str; 5] = ["pitch_type", "description", "balls", "strikes", "events"];

const SWING_DESCRIPTIONS: [&str; 6] = [
    "foul",
    "foul_tip",
    "hit_into_play",
    "swinging_strike",
    "swinging_strike_blocked",
    "foul_bunt",
];
const WHIFF_DESCRIPTIONS: [&str; 2] = ["swinging_strike", "swinging_strike_blocked"];
const BIP_DESCRIPTIONS: [&str; 3] = ["hit_into_play", "hit_into_play_no_out", "hit_into_play_score"];
const OUT_OF_ZONE: [u8; 4] = [11, 12, 13, 14];

/// Exit velocity (mph) below which a ball in play counts as weak contact.
const WEAK_CONTACT_MPH: f64 = 85.0;
/// Exit velocity (mph) at or above which a ball in play counts as hard hit.
const HARD_HIT_MPH: f64 = 95.0;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("failed to read pitch CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Fail if any of [`REQUIRED_COLUMNS`] is absent from `headers`.
pub fn check_required_columns<'a, I>(headers: I) -> Result<(), AggregateError>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: Vec<&str> = headers.into_iter().map(str::trim).collect();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !present.contains(col))
        .map(|col| col.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AggregateError::MissingColumns { missing })
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One pitch as read from the CSV.
#[derive(Debug, Clone, Deserialize)]
pub struct PitchRow {
    pub pitch_type: String,
    pub description: String,
    pub balls: u8,
    pub strikes: u8,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub zone: Option<u8>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub launch_speed: Option<f64>,
}

impl PitchRow {
    fn is_swing(&self) -> bool {
        SWING_DESCRIPTIONS.contains(&self.description.as_str())
    }

    fn is_whiff(&self) -> bool {
        WHIFF_DESCRIPTIONS.contains(&self.description.as_str())
    }

    fn is_out_of_zone(&self) -> bool {
        self.zone.is_some_and(|z| OUT_OF_ZONE.contains(&z))
    }

    fn is_ball_in_play(&self) -> bool {
        BIP_DESCRIPTIONS.contains(&self.description.as_str())
    }

    fn is_tracked_contact(&self) -> bool {
        self.description == "hit_into_play"
    }

    fn is_weak_contact(&self) -> bool {
        self.is_tracked_contact() && self.launch_speed.is_some_and(|v| v < WEAK_CONTACT_MPH)
    }

    fn is_hard_hit(&self) -> bool {
        self.is_tracked_contact() && self.launch_speed.is_some_and(|v| v >= HARD_HIT_MPH)
    }
}

#[derive(Debug, Default)]
struct Tally {
    pitches: u32,
    swings: u32,
    whiffs: u32,
    out_of_zone: u32,
    chases: u32,
    called_strikes: u32,
    balls_in_play: u32,
    weak: u32,
    hard: u32,
}

impl Tally {
    fn add(&mut self, row: &PitchRow) {
        let swing = row.is_swing();
        let out_of_zone = row.is_out_of_zone();
        self.pitches += 1;
        self.swings += u32::from(swing);
        self.whiffs += u32::from(row.is_whiff());
        self.out_of_zone += u32::from(out_of_zone);
        self.chases += u32::from(out_of_zone && swing);
        self.called_strikes += u32::from(row.description == "called_strike");
        self.balls_in_play += u32::from(row.is_ball_in_play());
        self.weak += u32::from(row.is_weak_contact());
        self.hard += u32::from(row.is_hard_hit());
    }

    fn into_metrics(self, pitch_type: String) -> PitchMetrics {
        PitchMetrics {
            pitch_type,
            whiff_rate: ratio(self.whiffs, self.swings),
            hard_hit_rate: ratio(self.hard, self.balls_in_play),
            called_strike_rate: ratio(self.called_strikes, self.pitches),
            weak_contact_rate: ratio(self.weak, self.balls_in_play),
            chase_rate: ratio(self.chases, self.out_of_zone),
            pitches: self.pitches,
        }
    }
}

fn ratio(num: u32, den: u32) -> f64 {
    if den == 0 {
        0.0
    } else {
        f64::from(num) / f64::from(den)
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Group rows by (count, pitch type) and compute rates. Groups with fewer
/// than `min_pitches` pitches are dropped; rows with an impossible count or
/// no pitch type are skipped.
pub fn aggregate_rows<I>(rows: I, min_pitches: u32) -> BTreeMap<Count, Vec<PitchMetrics>>
where
    I: IntoIterator<Item = PitchRow>,
{
    let mut tallies: BTreeMap<(Count, String), Tally> = BTreeMap::new();
    for row in rows {
        let count = match Count::new(row.balls, row.strikes) {
            Ok(c) => c,
            Err(e) => {
                warn!("skipping {} pitch: {}", row.pitch_type, e);
                continue;
            }
        };
        let pitch_type = row.pitch_type.trim();
        if pitch_type.is_empty() {
            warn!("skipping pitch at {} with no pitch_type", count);
            continue;
        }
        tallies
            .entry((count, pitch_type.to_string()))
            .or_default()
            .add(&row);
    }

    let mut out: BTreeMap<Count, Vec<PitchMetrics>> = BTreeMap::new();
    for ((count, pitch_type), tally) in tallies {
        if tally.pitches < min_pitches {
            debug!(%count, %pitch_type, pitches = tally.pitches, "below min_pitches, dropped");
            continue;
        }
        out.entry(count).or_default().push(tally.into_metrics(pitch_type));
    }
    out
}

/// Read a pitch-level CSV and aggregate it with [`aggregate_rows`].
pub fn aggregate_csv<R: Read>(
    reader: R,
    min_pitches: u32,
) -> Result<BTreeMap<Count, Vec<PitchMetrics>>, AggregateError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    check_required_columns(rdr.headers()?.iter())?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (i, record) in rdr.deserialize::<PitchRow>().enumerate() {
        match record {
            Ok(row) => rows.push(row),
            Err(e) => {
                // Line 1 is the header.
                warn!("skipping CSV line {}: {}", i + 2, e);
                skipped += 1;
            }
        }
    }
    debug!(rows = rows.len(), skipped, "parsed pitch CSV");
    Ok(aggregate_rows(rows, min_pitches))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
