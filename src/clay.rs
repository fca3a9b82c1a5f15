//! Mike Clay's season projection report. The report is a PDF; this module
//! reads the text a PDF extractor produces from it (`pdftotext -layout`
//! style, pages separated by form feeds).

use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rusqlite::{Transaction, params};

use crate::ingest::{RecordKey, SourceRecord};
use crate::position::Position;
use crate::store::now_rfc3339;

const NAME_TEAM_HEAD: &str = r"^([A-Za-z.' -]+) (\w+) (\d+) (\d+) (\d+)";

static QB_LINE: Lazy<Regex> = Lazy::new(|| {
    line_pattern(r" (\d+) (\d+) (\d+) (\d+) (\d+) (\d+) (\d+) (\d+) (\d+)")
});
static FLEX_LINE: Lazy<Regex> = Lazy::new(|| {
    line_pattern(r" (\d+) (\d+) (\d+) (\d+) (\d+) (\d+) (\d+) (\d+)% (\d+)%?")
});
// Tight ends sometimes have no target share printed.
static TE_LINE: Lazy<Regex> = Lazy::new(|| {
    line_pattern(r" (\d+) (\d+) (\d+) (\d+) (\d+) (\d+) (\d+) (\d+)%(?: (\d+)%?)?")
});

fn line_pattern(stats: &str) -> Regex {
    Regex::new(&format!("{NAME_TEAM_HEAD}{stats}")).expect("valid clay line pattern")
}

/// Zero-based, inclusive page range holding each position's table.
pub const PAGE_RANGES: [(Position, usize, usize); 4] = [
    (Position::Qb, 34, 34),
    (Position::Rb, 35, 37),
    (Position::Wr, 38, 42),
    (Position::Te, 43, 44),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClayProjection {
    pub raw_name: String,
    pub team: String,
    pub position: Option<Position>,
    pub pos_rank: i64,
    pub ff_points: i64,
    pub games: i64,
    pub pass_att: Option<i64>,
    pub comp: Option<i64>,
    pub pass_yds: Option<i64>,
    pub pass_td: Option<i64>,
    pub ints: Option<i64>,
    pub sk: Option<i64>,
    pub carry: Option<i64>,
    pub ru_yds: Option<i64>,
    pub ru_tds: Option<i64>,
    pub targ: Option<i64>,
    pub rec: Option<i64>,
    pub re_yds: Option<i64>,
    pub re_tds: Option<i64>,
    pub car_pct: Option<f64>,
    pub targ_pct: Option<f64>,
}

/// Parses one whitespace-normalised report line for `position`.
pub fn parse_line(line: &str, position: Position) -> Option<ClayProjection> {
    let pattern: &Regex = match position {
        Position::Qb => &QB_LINE,
        Position::Rb | Position::Wr => &FLEX_LINE,
        Position::Te => &TE_LINE,
        Position::Fb | Position::Other => return None,
    };
    let caps = pattern.captures(line)?;
    let int = |i: usize| group(&caps, i).and_then(|s| s.parse::<i64>().ok());
    let pct = |i: usize| group(&caps, i).and_then(|s| s.parse::<f64>().ok());

    let mut projection = ClayProjection {
        raw_name: group(&caps, 1)?.trim().to_string(),
        team: group(&caps, 2)?.to_string(),
        position: Some(position),
        pos_rank: int(3)?,
        ff_points: int(4)?,
        games: int(5)?,
        ..ClayProjection::default()
    };
    if position == Position::Qb {
        projection.pass_att = int(6);
        projection.comp = int(7);
        projection.pass_yds = int(8);
        projection.pass_td = int(9);
        projection.ints = int(10);
        projection.sk = int(11);
        projection.carry = int(12);
        projection.ru_yds = int(13);
        projection.ru_tds = int(14);
    } else {
        projection.carry = int(6);
        projection.ru_yds = int(7);
        projection.ru_tds = int(8);
        projection.targ = int(9);
        projection.rec = int(10);
        projection.re_yds = int(11);
        projection.re_tds = int(12);
        projection.car_pct = pct(13);
        projection.targ_pct = pct(14);
    }
    if projection.raw_name.is_empty() {
        return None;
    }
    Some(projection)
}

fn group<'t>(caps: &Captures<'t>, i: usize) -> Option<&'t str> {
    caps.get(i).map(|m| m.as_str())
}

/// Every projection line on `position`'s pages. Page indices beyond the end
/// of the report are clamped to the last page.
pub fn parse_position_pages(
    pages: &[&str],
    position: Position,
    first: usize,
    last: usize,
) -> Vec<ClayProjection> {
    let Some(max_page) = pages.len().checked_sub(1) else {
        return Vec::new();
    };
    let (first, last) = (first.min(max_page), last.min(max_page));
    if last < first {
        return Vec::new();
    }
    pages[first..=last]
        .iter()
        .flat_map(|page| page.lines())
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter_map(|line| parse_line(&line, position))
        .collect()
}

pub fn parse_report(text: &str) -> Vec<ClayProjection> {
    let pages: Vec<&str> = text.split('\u{000C}').collect();
    let mut out = Vec::new();
    for (position, first, last) in PAGE_RANGES {
        let rows = parse_position_pages(&pages, position, first, last);
        tracing::info!(
            "clay {position} (pages {}-{}): {} rows",
            first + 1,
            last + 1,
            rows.len()
        );
        out.extend(rows);
    }
    out
}

pub fn load_report(path: &Path) -> Result<Vec<ClayProjection>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read clay report {}", path.display()))?;
    Ok(parse_report(&text))
}

impl SourceRecord for ClayProjection {
    fn key(&self) -> RecordKey<'_> {
        RecordKey::Named {
            raw_name: &self.raw_name,
            position: self.position.map(Position::as_str).unwrap_or(""),
            team: Some(self.team.as_str()).filter(|t| !t.is_empty()),
        }
    }

    fn upsert(&self, tx: &Transaction<'_>, player_id: &str) -> rusqlite::Result<()> {
        tx.execute(
            r#"
            INSERT INTO clay_projections (
                player_id, player_name, team, position, pos_rank, ff_points, games,
                pass_att, comp, pass_yds, pass_td, ints, sk, carry, ru_yds, ru_tds,
                targ, rec, re_yds, re_tds, car_pct, targ_pct, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                      ?17, ?18, ?19, ?20, ?21, ?22, ?23)
            ON CONFLICT(player_id) DO UPDATE SET
                player_name = excluded.player_name,
                team = excluded.team,
                position = excluded.position,
                pos_rank = excluded.pos_rank,
                ff_points = excluded.ff_points,
                games = excluded.games,
                pass_att = excluded.pass_att,
                comp = excluded.comp,
                pass_yds = excluded.pass_yds,
                pass_td = excluded.pass_td,
                ints = excluded.ints,
                sk = excluded.sk,
                carry = excluded.carry,
                ru_yds = excluded.ru_yds,
                ru_tds = excluded.ru_tds,
                targ = excluded.targ,
                rec = excluded.rec,
                re_yds = excluded.re_yds,
                re_tds = excluded.re_tds,
                car_pct = excluded.car_pct,
                targ_pct = excluded.targ_pct,
                updated_at = excluded.updated_at
            "#,
            params![
                player_id,
                self.raw_name,
                self.team,
                self.position.map(Position::as_str).unwrap_or(""),
                self.pos_rank,
                self.ff_points,
                self.games,
                self.pass_att,
                self.comp,
                self.pass_yds,
                self.pass_td,
                self.ints,
                self.sk,
                self.carry,
                self.ru_yds,
                self.ru_tds,
                self.targ,
                self.rec,
                self.re_yds,
                self.re_tds,
                self.car_pct,
                self.targ_pct,
                now_rfc3339()
            ],
        )?;
        Ok(())
    }
}
