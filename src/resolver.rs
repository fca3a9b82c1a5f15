//! Maps a player as spelled by a valuation source onto the roster identifier.
//!
//! Strategies run in a fixed order and the first one that finds any candidate
//! decides the outcome:
//!
//! 1. curated exception for `(canonical name, position)`
//! 2. canonical name + position (team, then active status, break ties)
//! 3. RB label widened to RB/FB
//! 4. canonical name alone, accepted only when unique
//!
//! Once a position-aware step finds several players it reports them as
//! ambiguous instead of falling through to a weaker strategy.

use crate::exceptions::ExceptionTable;
use crate::identity_index::IdentityIndex;
use crate::name_canon::canonicalize;
use crate::player::PlayerRecord;
use crate::position::Position;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Resolved(String),
    /// Candidate identifiers, sorted ascending.
    Ambiguous(Vec<String>),
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Exception,
    Primary,
    PositionGroup,
    NameOnly,
    Identifier,
}

impl Strategy {
    pub fn label(self) -> &'static str {
        match self {
            Strategy::Exception => "exception",
            Strategy::Primary => "name+position",
            Strategy::PositionGroup => "rb/fb fallback",
            Strategy::NameOnly => "name only",
            Strategy::Identifier => "identifier",
        }
    }
}

/// Outcome plus what produced it, for logging and review reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionReport {
    pub canonical_name: String,
    pub position: Position,
    pub outcome: ResolutionOutcome,
    /// Strategy that decided the outcome; `None` when nothing matched.
    pub strategy: Option<Strategy>,
    /// Players sharing the name that the name-only step refused to pick from.
    pub name_only_candidates: Vec<String>,
}

enum Narrowed {
    Nobody,
    One(String),
    Many(Vec<String>),
}

/// Resolver over one run's index and one source's exception table.
#[derive(Debug, Clone, Copy)]
pub struct PlayerResolver<'a> {
    index: &'a IdentityIndex,
    exceptions: &'a ExceptionTable,
    prefer_active: bool,
}

impl<'a> PlayerResolver<'a> {
    pub fn new(index: &'a IdentityIndex, exceptions: &'a ExceptionTable) -> Self {
        Self {
            index,
            exceptions,
            prefer_active: false,
        }
    }

    /// When several candidates survive the team filter, keep only the active
    /// ones if any exist.
    pub fn prefer_active(mut self, enabled: bool) -> Self {
        self.prefer_active = enabled;
        self
    }

    pub fn resolve(&self, raw_name: &str, position: &str, team: Option<&str>) -> ResolutionOutcome {
        self.resolve_report(raw_name, position, team).outcome
    }

    pub fn resolve_report(
        &self,
        raw_name: &str,
        position: &str,
        team: Option<&str>,
    ) -> ResolutionReport {
        let canonical_name = canonicalize(raw_name);
        let position = Position::parse(position);
        let mut report = ResolutionReport {
            canonical_name,
            position,
            outcome: ResolutionOutcome::Unresolved,
            strategy: None,
            name_only_candidates: Vec::new(),
        };
        if report.canonical_name.is_empty() {
            return report;
        }

        if let Some(id) = self.exceptions.lookup(&report.canonical_name, position) {
            report.outcome = ResolutionOutcome::Resolved(id.to_string());
            report.strategy = Some(Strategy::Exception);
            return report;
        }

        let candidates = self.index.candidates(&report.canonical_name);
        if candidates.is_empty() {
            return report;
        }

        let team = team.map(str::trim).filter(|t| !t.is_empty());
        let mut attempts: Vec<(Strategy, &[Position])> = vec![(Strategy::Primary, &[])];
        if let Some(group) = position.fallback_group() {
            attempts.push((Strategy::PositionGroup, group));
        }

        for (strategy, group) in attempts {
            let wanted: &[Position] = if group.is_empty() {
                std::slice::from_ref(&position)
            } else {
                group
            };
            let matching: Vec<&PlayerRecord> =
                candidates.iter().filter(|p| p.plays_any(wanted)).collect();
            match self.narrow(matching, team) {
                Narrowed::Nobody => continue,
                Narrowed::One(id) => {
                    report.outcome = ResolutionOutcome::Resolved(id);
                    report.strategy = Some(strategy);
                    return report;
                }
                Narrowed::Many(ids) => {
                    report.outcome = ResolutionOutcome::Ambiguous(ids);
                    report.strategy = Some(strategy);
                    return report;
                }
            }
        }

        if let [only] = candidates {
            report.outcome = ResolutionOutcome::Resolved(only.identifier.clone());
            report.strategy = Some(Strategy::NameOnly);
        } else {
            report.name_only_candidates = sorted_ids(candidates.iter());
        }
        report
    }

    /// For sources that already carry the roster identifier.
    pub fn resolve_identifier(&self, identifier: &str) -> ResolutionOutcome {
        let id = identifier.trim();
        if !id.is_empty() && self.index.contains_id(id) {
            ResolutionOutcome::Resolved(id.to_string())
        } else {
            ResolutionOutcome::Unresolved
        }
    }

    fn narrow(&self, candidates: Vec<&PlayerRecord>, team: Option<&str>) -> Narrowed {
        let mut current = candidates;
        match current.len() {
            0 => return Narrowed::Nobody,
            1 => return Narrowed::One(current[0].identifier.clone()),
            _ => {}
        }

        if let Some(team) = team {
            let on_team: Vec<&PlayerRecord> =
                current.iter().copied().filter(|p| p.on_team(team)).collect();
            match on_team.len() {
                0 => {}
                1 => return Narrowed::One(on_team[0].identifier.clone()),
                _ => current = on_team,
            }
        }

        if self.prefer_active {
            let active: Vec<&PlayerRecord> =
                current.iter().copied().filter(|p| p.is_active()).collect();
            match active.len() {
                0 => {}
                1 => return Narrowed::One(active[0].identifier.clone()),
                _ => current = active,
            }
        }

        Narrowed::Many(sorted_ids(current.into_iter()))
    }
}

/// One-shot form of [`PlayerResolver::resolve`].
pub fn resolve(
    raw_name: &str,
    position: &str,
    team: Option<&str>,
    index: &IdentityIndex,
    exceptions: &ExceptionTable,
) -> ResolutionOutcome {
    PlayerResolver::new(index, exceptions).resolve(raw_name, position, team)
}

fn sorted_ids<'r>(records: impl Iterator<Item = &'r PlayerRecord>) -> Vec<String> {
    let mut ids: Vec<String> = records.map(|p| p.identifier.clone()).collect();
    ids.sort();
    ids.dedup();
    ids
}
