//! FantasyPros season projection tables, one page per position.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use rusqlite::{Transaction, params};

use crate::html::{Element, find_by_classes, find_by_tag, first_by_id};
use crate::http_client::{fetch_text, http_client};
use crate::ingest::{RecordKey, SourceRecord};
use crate::name_canon::is_generational_suffix;
use crate::position::Position;
use crate::store::now_rfc3339;

pub const POSITIONS: [Position; 4] = [Position::Qb, Position::Rb, Position::Wr, Position::Te];

pub fn projection_url(position: Position) -> String {
    format!(
        "https://www.fantasypros.com/nfl/projections/{}.php?week=draft",
        position.as_str().to_ascii_lowercase()
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    PassAttempts,
    Completions,
    PassYards,
    PassTds,
    Interceptions,
    RushAttempts,
    RushYards,
    RushTds,
    Receptions,
    RecYards,
    RecTds,
    FumblesLost,
    FantasyPoints,
}

/// Stat columns after the name cell, in page order.
pub fn columns(position: Position) -> &'static [Stat] {
    use Stat::*;
    match position {
        Position::Qb => &[
            PassAttempts,
            Completions,
            PassYards,
            PassTds,
            Interceptions,
            RushAttempts,
            RushYards,
            RushTds,
            FumblesLost,
            FantasyPoints,
        ],
        Position::Rb => &[
            RushAttempts,
            RushYards,
            RushTds,
            Receptions,
            RecYards,
            RecTds,
            FumblesLost,
            FantasyPoints,
        ],
        Position::Wr => &[
            Receptions,
            RecYards,
            RecTds,
            RushAttempts,
            RushYards,
            RushTds,
            FumblesLost,
            FantasyPoints,
        ],
        Position::Te => &[Receptions, RecYards, RecTds, FumblesLost, FantasyPoints],
        Position::Fb | Position::Other => &[],
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FprosProjection {
    pub raw_name: String,
    pub team: Option<String>,
    pub position: Option<Position>,
    pub pass_attempts: Option<f64>,
    pub completions: Option<f64>,
    pub pass_yards: Option<f64>,
    pub pass_tds: Option<f64>,
    pub interceptions: Option<f64>,
    pub rush_attempts: Option<f64>,
    pub rush_yards: Option<f64>,
    pub rush_tds: Option<f64>,
    pub receptions: Option<f64>,
    pub rec_yards: Option<f64>,
    pub rec_tds: Option<f64>,
    pub fumbles_lost: Option<f64>,
    pub fantasy_points: Option<f64>,
}

impl FprosProjection {
    fn set(&mut self, stat: Stat, value: Option<f64>) {
        let slot = match stat {
            Stat::PassAttempts => &mut self.pass_attempts,
            Stat::Completions => &mut self.completions,
            Stat::PassYards => &mut self.pass_yards,
            Stat::PassTds => &mut self.pass_tds,
            Stat::Interceptions => &mut self.interceptions,
            Stat::RushAttempts => &mut self.rush_attempts,
            Stat::RushYards => &mut self.rush_yards,
            Stat::RushTds => &mut self.rush_tds,
            Stat::Receptions => &mut self.receptions,
            Stat::RecYards => &mut self.rec_yards,
            Stat::RecTds => &mut self.rec_tds,
            Stat::FumblesLost => &mut self.fumbles_lost,
            Stat::FantasyPoints => &mut self.fantasy_points,
        };
        *slot = value;
    }
}

/// `"1,234.5"` -> 1234.5
pub fn clean_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").trim().parse::<f64>().ok()
}

/// Splits `"Bijan Robinson ATL"` on a trailing team code: upper-case, at most
/// three characters and not a generational suffix.
pub fn split_name_team(text: &str) -> (String, Option<String>) {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if let [name @ .., last] = parts.as_slice()
        && !name.is_empty()
        && last.len() <= 3
        && last.chars().all(|c| c.is_ascii_uppercase())
        && !is_generational_suffix(last)
    {
        return (name.join(" "), Some(last.to_string()));
    }
    (parts.join(" "), None)
}

/// Projection rows from one position page. Looks for `table#data`, falling
/// back to the first `table.table`; the header row is skipped.
pub fn parse_fpros_page(html: &str, position: Position) -> Vec<FprosProjection> {
    let table = first_by_id(html, "table", "data").or_else(|| {
        find_by_classes(html, &["table"])
            .into_iter()
            .find(|el| el.open.to_ascii_lowercase().starts_with("<table"))
    });
    let Some(table) = table else {
        tracing::warn!("fantasypros {position}: projection table not found");
        return Vec::new();
    };
    find_by_tag(table.inner, "tr")
        .into_iter()
        .skip(1)
        .filter_map(|row| parse_row(&row, position))
        .collect()
}

fn parse_row(row: &Element<'_>, position: Position) -> Option<FprosProjection> {
    let cells = find_by_tag(row.inner, "td");
    let stats = columns(position);
    if cells.len() < 2 || cells.len() < stats.len() + 1 {
        return None;
    }
    let name_cell = find_by_tag(cells[0].inner, "a")
        .into_iter()
        .next()
        .unwrap_or(cells[0]);
    let (raw_name, team) = split_name_team(&name_cell.text());
    let (raw_name, team) = if team.is_none() {
        // Team code often sits outside the link.
        let (_, cell_team) = split_name_team(&cells[0].text());
        (raw_name, cell_team)
    } else {
        (raw_name, team)
    };
    if raw_name.is_empty() {
        return None;
    }

    let mut projection = FprosProjection {
        raw_name,
        team,
        position: Some(position),
        ..FprosProjection::default()
    };
    for (stat, cell) in stats.iter().zip(&cells[1..]) {
        projection.set(*stat, clean_number(&cell.text()));
    }
    Some(projection)
}

impl SourceRecord for FprosProjection {
    fn key(&self) -> RecordKey<'_> {
        RecordKey::Named {
            raw_name: &self.raw_name,
            position: self.position.map(Position::as_str).unwrap_or(""),
            team: self.team.as_deref(),
        }
    }

    fn upsert(&self, tx: &Transaction<'_>, player_id: &str) -> rusqlite::Result<()> {
        tx.execute(
            r#"
            INSERT INTO fpros_projections (
                player_id, player_name, team, position,
                pass_attempts, completions, pass_yards, pass_tds, interceptions,
                rush_attempts, rush_yards, rush_tds,
                receptions, rec_yards, rec_tds, fumbles_lost, fantasy_points, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ON CONFLICT(player_id) DO UPDATE SET
                player_name = excluded.player_name,
                team = excluded.team,
                position = excluded.position,
                pass_attempts = excluded.pass_attempts,
                completions = excluded.completions,
                pass_yards = excluded.pass_yards,
                pass_tds = excluded.pass_tds,
                interceptions = excluded.interceptions,
                rush_attempts = excluded.rush_attempts,
                rush_yards = excluded.rush_yards,
                rush_tds = excluded.rush_tds,
                receptions = excluded.receptions,
                rec_yards = excluded.rec_yards,
                rec_tds = excluded.rec_tds,
                fumbles_lost = excluded.fumbles_lost,
                fantasy_points = excluded.fantasy_points,
                updated_at = excluded.updated_at
            "#,
            params![
                player_id,
                self.raw_name,
                self.team,
                self.position.map(Position::as_str).unwrap_or(""),
                self.pass_attempts,
                self.completions,
                self.pass_yards,
                self.pass_tds,
                self.interceptions,
                self.rush_attempts,
                self.rush_yards,
                self.rush_tds,
                self.receptions,
                self.rec_yards,
                self.rec_tds,
                self.fumbles_lost,
                self.fantasy_points,
                now_rfc3339()
            ],
        )?;
        Ok(())
    }
}

/// Fetches every position page in turn. A page that fails is logged and
/// contributes nothing.
pub fn fetch_fpros(delay: Duration) -> Result<Vec<FprosProjection>> {
    let client = http_client()?;
    let mut out = Vec::new();
    for position in POSITIONS {
        let url = projection_url(position);
        match fetch_text(client, &url) {
            Ok(html) => {
                let rows = parse_fpros_page(&html, position);
                tracing::info!("fantasypros {position}: {} rows", rows.len());
                let fetched = !rows.is_empty();
                out.extend(rows);
                if fetched && !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
            Err(err) => tracing::warn!("fantasypros {position}: {err:#}"),
        }
    }
    Ok(out)
}
