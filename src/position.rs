use std::fmt;

use serde::{Deserialize, Serialize};

/// Roster position. Anything outside the offensive fantasy positions collapses
/// into `Other`, which never satisfies a position-aware match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    Qb,
    Rb,
    Wr,
    Te,
    Fb,
    Other,
}

impl Position {
    pub const FANTASY_RELEVANT: [Position; 5] = [
        Position::Qb,
        Position::Rb,
        Position::Wr,
        Position::Te,
        Position::Fb,
    ];

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "QB" => Position::Qb,
            "RB" => Position::Rb,
            "WR" => Position::Wr,
            "TE" => Position::Te,
            "FB" => Position::Fb,
            _ => Position::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Position::Qb => "QB",
            Position::Rb => "RB",
            Position::Wr => "WR",
            Position::Te => "TE",
            Position::Fb => "FB",
            Position::Other => "OTHER",
        }
    }

    pub fn is_known(self) -> bool {
        self != Position::Other
    }

    /// Positions a source label may stand for when the exact label finds
    /// nobody. Some sources list fullbacks as running backs.
    pub fn fallback_group(self) -> Option<&'static [Position]> {
        match self {
            Position::Rb => Some(&[Position::Rb, Position::Fb]),
            _ => None,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Position {
    fn from(raw: &str) -> Self {
        Position::parse(raw)
    }
}

/// Splits a comma separated list such as `"RB,WR"`; blanks are dropped.
pub fn parse_position_list(raw: &str) -> Vec<Position> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(Position::parse)
        .collect()
}
