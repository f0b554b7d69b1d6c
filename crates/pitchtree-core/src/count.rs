// Ball-strike count value type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Highest ball total that still leaves the at-bat alive (a fourth ball is a walk).
pub const MAX_BALLS: u8 = 3;
/// Highest strike total that still leaves the at-bat alive.
pub const MAX_STRIKES: u8 = 2;
/// Number of distinct live counts (4 ball states x 3 strike states).
pub const COUNT_TOTAL: usize = 12;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CountError {
    #[error("unknown count `{0}`: balls must be 0-3 and strikes 0-2")]
    UnknownCount(String),

    #[error("malformed count `{0}`: expected \"balls-strikes\"")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// Count
// ---------------------------------------------------------------------------

/// The (balls, strikes) state of an at-bat.
///
/// Always one of the twelve live counts; construction outside that range
/// fails. The canonical text form is `"balls-strikes"` (e.g. `"3-2"`), which
/// is also the serde representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Count {
    balls: u8,
    strikes: u8,
}

impl Count {
    pub fn new(balls: u8, strikes: u8) -> Result<Self, CountError> {
        if balls > MAX_BALLS || strikes > MAX_STRIKES {
            return Err(CountError::UnknownCount(format!("{balls}-{strikes}")));
        }
        Ok(Count { balls, strikes })
    }

    /// Unchecked constructor for the crate's static tables, which only list
    /// live counts.
    pub(crate) const fn from_table(balls: u8, strikes: u8) -> Self {
        debug_assert!(balls <= MAX_BALLS && strikes <= MAX_STRIKES);
        Count { balls, strikes }
    }

    /// Start of every at-bat.
    pub const fn first_pitch() -> Self {
        Count { balls: 0, strikes: 0 }
    }

    /// The full count, the single terminal node of the tree.
    pub const fn full() -> Self {
        Count {
            balls: MAX_BALLS,
            strikes: MAX_STRIKES,
        }
    }

    /// All twelve live counts, ordered by balls then strikes.
    pub fn all() -> Vec<Count> {
        (0..=MAX_BALLS)
            .flat_map(|balls| (0..=MAX_STRIKES).map(move |strikes| Count { balls, strikes }))
            .collect()
    }

    pub fn balls(&self) -> u8 {
        self.balls
    }

    pub fn strikes(&self) -> u8 {
        self.strikes
    }

    /// Distance from 0-0 in the count tree.
    pub fn depth(&self) -> u8 {
        self.balls + self.strikes
    }

    /// Count reached by taking a ball, if the at-bat stays alive.
    pub fn next_ball(&self) -> Option<Count> {
        (self.balls < MAX_BALLS).then(|| Count {
            balls: self.balls + 1,
            strikes: self.strikes,
        })
    }

    /// Count reached by taking a strike, if the at-bat stays alive.
    pub fn next_strike(&self) -> Option<Count> {
        (self.strikes < MAX_STRIKES).then(|| Count {
            balls: self.balls,
            strikes: self.strikes + 1,
        })
    }

    /// True only for 3-2, where neither axis can advance.
    pub fn is_terminal(&self) -> bool {
        self.next_ball().is_none() && self.next_strike().is_none()
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.balls, self.strikes)
    }
}

impl FromStr for Count {
    type Err = CountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CountError::Malformed(s.to_string());
        let (balls, strikes) = s.trim().split_once('-').ok_or_else(malformed)?;
        let balls: u8 = balls.trim().parse().map_err(|_| malformed())?;
        let strikes: u8 = strikes.trim().parse().map_err(|_| malformed())?;
        Count::new(balls, strikes)
    }
}

impl TryFrom<String> for Count {
    type Error = CountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Count> for String {
    fn from(count: Count) -> Self {
        count.to_string()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
