use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Active,
    Inactive,
    Other,
}

impl PlayerStatus {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("active") {
            PlayerStatus::Active
        } else if trimmed.eq_ignore_ascii_case("inactive") {
            PlayerStatus::Inactive
        } else {
            PlayerStatus::Other
        }
    }
}

/// A player as known to the authoritative roster. `identifier` is assigned by
/// that roster and never regenerated; `canonical_name` is already the output of
/// [`crate::name_canon::canonicalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub identifier: String,
    pub canonical_name: String,
    pub team: Option<String>,
    pub position: Option<Position>,
    pub fantasy_positions: BTreeSet<Position>,
    pub status: PlayerStatus,
    pub last_updated: DateTime<Utc>,
}

impl PlayerRecord {
    pub fn new(identifier: impl Into<String>, canonical_name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            canonical_name: canonical_name.into(),
            team: None,
            position: None,
            fantasy_positions: BTreeSet::new(),
            status: PlayerStatus::Inactive,
            last_updated: Utc::now(),
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_fantasy_positions(mut self, positions: impl IntoIterator<Item = Position>) -> Self {
        self.fantasy_positions = positions.into_iter().collect();
        self
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn with_status(mut self, status: PlayerStatus) -> Self {
        self.status = status;
        self
    }

    /// True when either the fantasy-position list or the roster position is
    /// one of `positions`. `Other` never matches.
    pub fn plays_any(&self, positions: &[Position]) -> bool {
        positions.iter().filter(|p| p.is_known()).any(|p| {
            self.fantasy_positions.contains(p) || self.position == Some(*p)
        })
    }

    pub fn on_team(&self, team: &str) -> bool {
        let wanted = team.trim();
        !wanted.is_empty()
            && self
                .team
                .as_deref()
                .is_some_and(|t| t.trim().eq_ignore_ascii_case(wanted))
    }

    pub fn is_active(&self) -> bool {
        self.status == PlayerStatus::Active
    }
}
