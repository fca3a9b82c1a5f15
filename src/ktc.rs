//! KeepTradeCut value pages. Each ranking page lists `onePlayer` blocks with a
//! name (team code glued on the end), a position rank such as `QB12`, the
//! value and, optionally, an age line.

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;
use rusqlite::{Transaction, params};

use crate::html::{find_by_classes, first_by_classes};
use crate::http_client::{fetch_text, http_client, with_fetch_pool};
use crate::ingest::{RecordKey, SourceRecord};
use crate::name_canon::{canonicalize, is_generational_suffix};
use crate::position::Position;
use crate::store::now_rfc3339;

const DYNASTY_URL: &str =
    "https://keeptradecut.com/dynasty-rankings?page={page}&filters=QB|WR|RB|TE|RDP&format={format}";
const REDRAFT_URL: &str =
    "https://keeptradecut.com/fantasy-rankings?page={page}&filters=QB|WR|RB|TE&format={format}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KtcFormat {
    Dynasty1Qb,
    DynastySuperflex,
    Redraft1Qb,
    RedraftSuperflex,
}

impl KtcFormat {
    pub const ALL: [KtcFormat; 4] = [
        KtcFormat::Dynasty1Qb,
        KtcFormat::DynastySuperflex,
        KtcFormat::Redraft1Qb,
        KtcFormat::RedraftSuperflex,
    ];

    pub fn is_redraft(self) -> bool {
        matches!(self, KtcFormat::Redraft1Qb | KtcFormat::RedraftSuperflex)
    }

    /// KTC's `format` query value: 1 for one-QB leagues, 0 for superflex.
    fn code(self) -> u8 {
        match self {
            KtcFormat::Dynasty1Qb | KtcFormat::Redraft1Qb => 1,
            KtcFormat::DynastySuperflex | KtcFormat::RedraftSuperflex => 0,
        }
    }

    pub fn url(self, page: usize) -> String {
        let template = if self.is_redraft() { REDRAFT_URL } else { DYNASTY_URL };
        template
            .replace("{page}", &page.to_string())
            .replace("{format}", &self.code().to_string())
    }

    pub fn label(self) -> &'static str {
        match self {
            KtcFormat::Dynasty1Qb => "dynasty 1qb",
            KtcFormat::DynastySuperflex => "dynasty superflex",
            KtcFormat::Redraft1Qb => "redraft 1qb",
            KtcFormat::RedraftSuperflex => "redraft superflex",
        }
    }

    fn slot(self) -> usize {
        match self {
            KtcFormat::Dynasty1Qb => 0,
            KtcFormat::DynastySuperflex => 1,
            KtcFormat::Redraft1Qb => 2,
            KtcFormat::RedraftSuperflex => 3,
        }
    }
}

/// What followed the player name in the name cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamTag {
    Team(String),
    /// Rookie marker `R` in front of the team code, e.g. `RBUF`.
    Rookie(String),
    FreeAgent,
    RookieFreeAgent,
    Missing,
}

impl TeamTag {
    pub fn team(&self) -> Option<&str> {
        match self {
            TeamTag::Team(t) | TeamTag::Rookie(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_rookie(&self) -> bool {
        matches!(self, TeamTag::Rookie(_) | TeamTag::RookieFreeAgent)
    }
}

/// Splits `"Josh AllenBUF"` into `("Josh Allen", Team("BUF"))`. Generational
/// suffixes such as `III` are never read as team codes.
pub fn split_team_suffix(full: &str) -> (&str, TeamTag) {
    let text = full.trim();
    let upper_run = text
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_uppercase())
        .count();
    let cut = |n: usize| text[..text.len() - n].trim_end();

    if text.ends_with("RFA") && upper_run >= 3 {
        return (cut(3), TeamTag::RookieFreeAgent);
    }
    if upper_run >= 4 && text[..text.len() - 3].ends_with('R') {
        let code = &text[text.len() - 3..];
        return (cut(4), TeamTag::Rookie(code.to_string()));
    }
    if text.ends_with("FA") && upper_run >= 2 {
        return (cut(2), TeamTag::FreeAgent);
    }
    if upper_run >= 3 {
        let code = &text[text.len() - 3..];
        if !is_generational_suffix(code) {
            return (cut(3), TeamTag::Team(code.to_string()));
        }
    }
    (text, TeamTag::Missing)
}

#[derive(Debug, Clone, PartialEq)]
pub struct KtcEntry {
    pub raw_name: String,
    pub position: Position,
    pub position_rank: String,
    pub team: TeamTag,
    pub value: i64,
    pub age: Option<f64>,
    pub format: KtcFormat,
}

/// Every usable player block on one ranking page. Draft picks, positions
/// outside QB/RB/WR/TE and blocks missing a name, rank or value are dropped.
pub fn parse_ktc_page(html: &str, format: KtcFormat) -> Vec<KtcEntry> {
    find_by_classes(html, &["onePlayer"])
        .into_iter()
        .filter_map(|block| parse_player_block(block.inner, format))
        .collect()
}

fn parse_player_block(block: &str, format: KtcFormat) -> Option<KtcEntry> {
    let name_text = first_by_classes(block, &["player-name"])?.text_compact();
    let rank_text = first_by_classes(block, &["position"])?.text_compact();
    let value = first_by_classes(block, &["value"])?
        .text_compact()
        .replace(',', "")
        .parse::<i64>()
        .ok()?;

    let (name, team) = split_team_suffix(&name_text);
    if name.is_empty() {
        return None;
    }
    let label = rank_text.get(..2)?;
    if label.eq_ignore_ascii_case("RD") {
        return None;
    }
    let position = Position::parse(label);
    if !matches!(position, Position::Qb | Position::Rb | Position::Wr | Position::Te) {
        return None;
    }
    let age = first_by_classes(block, &["position", "hidden-xs"])
        .and_then(|el| parse_age(&el.text_compact()));

    Some(KtcEntry {
        raw_name: name.to_string(),
        position,
        position_rank: rank_text,
        team,
        value,
        age,
        format,
    })
}

// "24.9 y.o." or "24.9|..." -> 24.9
fn parse_age(text: &str) -> Option<f64> {
    let head = text.split('|').next()?.trim();
    let digits: String = head.chars().take(4).collect();
    digits.trim().parse::<f64>().ok().filter(|age| *age > 0.0)
}

/// One player across every format stream, written as a single `ktc_values` row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KtcRecord {
    pub raw_name: String,
    pub position: Option<Position>,
    pub team: Option<String>,
    pub age: Option<f64>,
    pub rookie: bool,
    values: [Option<(i64, String)>; 4],
}

impl KtcRecord {
    pub fn value(&self, format: KtcFormat) -> Option<(i64, &str)> {
        self.values[format.slot()]
            .as_ref()
            .map(|(v, rank)| (*v, rank.as_str()))
    }

    fn absorb(&mut self, entry: KtcEntry) {
        if let Some(team) = entry.team.team() {
            self.team = Some(team.to_string());
        }
        if entry.age.is_some() {
            self.age = entry.age;
        }
        self.rookie |= entry.team.is_rookie();
        self.values[entry.format.slot()] = Some((entry.value, entry.position_rank));
    }
}

/// Folds the per-format entries into one record per raw name and position,
/// ordered by name.
pub fn consolidate(entries: impl IntoIterator<Item = KtcEntry>) -> Vec<KtcRecord> {
    let mut by_key: BTreeMap<(String, Position), KtcRecord> = BTreeMap::new();
    for entry in entries {
        let key = (entry.raw_name.clone(), entry.position);
        let record = by_key.entry(key).or_insert_with(|| KtcRecord {
            raw_name: entry.raw_name.clone(),
            position: Some(entry.position),
            ..KtcRecord::default()
        });
        record.absorb(entry);
    }
    by_key.into_values().collect()
}

impl SourceRecord for KtcRecord {
    fn key(&self) -> RecordKey<'_> {
        RecordKey::Named {
            raw_name: &self.raw_name,
            position: self.position.map(Position::as_str).unwrap_or(""),
            team: self.team.as_deref(),
        }
    }

    // Two spellings of one player: keep every format either of them carried.
    fn merge_same_player(&mut self, later: &Self) {
        for (slot, value) in self.values.iter_mut().zip(&later.values) {
            if value.is_some() {
                *slot = value.clone();
            }
        }
        if later.team.is_some() {
            self.team = later.team.clone();
        }
        if later.age.is_some() {
            self.age = later.age;
        }
        self.rookie |= later.rookie;
    }

    fn upsert(&self, tx: &Transaction<'_>, player_id: &str) -> rusqlite::Result<()> {
        let now = now_rfc3339();
        let value_date = now.get(..10).unwrap_or(&now).to_string();
        let slot = |f: KtcFormat| self.value(f);
        tx.execute(
            r#"
            INSERT INTO ktc_values (
                player_id, player_name, position, team, age, rookie,
                ktc_1qb_value, ktc_1qb_position_rank, ktc_sf_value, ktc_sf_position_rank,
                ktc_1qb_redraft_value, ktc_1qb_redraft_position_rank,
                ktc_sf_redraft_value, ktc_sf_redraft_position_rank,
                value_date, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ON CONFLICT(player_id) DO UPDATE SET
                player_name = excluded.player_name,
                position = excluded.position,
                team = excluded.team,
                age = excluded.age,
                rookie = excluded.rookie,
                ktc_1qb_value = excluded.ktc_1qb_value,
                ktc_1qb_position_rank = excluded.ktc_1qb_position_rank,
                ktc_sf_value = excluded.ktc_sf_value,
                ktc_sf_position_rank = excluded.ktc_sf_position_rank,
                ktc_1qb_redraft_value = excluded.ktc_1qb_redraft_value,
                ktc_1qb_redraft_position_rank = excluded.ktc_1qb_redraft_position_rank,
                ktc_sf_redraft_value = excluded.ktc_sf_redraft_value,
                ktc_sf_redraft_position_rank = excluded.ktc_sf_redraft_position_rank,
                value_date = excluded.value_date,
                updated_at = excluded.updated_at
            "#,
            params![
                player_id,
                canonicalize(&self.raw_name),
                self.position.map(Position::as_str),
                self.team,
                self.age,
                self.rookie,
                slot(KtcFormat::Dynasty1Qb).map(|v| v.0),
                slot(KtcFormat::Dynasty1Qb).map(|v| v.1),
                slot(KtcFormat::DynastySuperflex).map(|v| v.0),
                slot(KtcFormat::DynastySuperflex).map(|v| v.1),
                slot(KtcFormat::Redraft1Qb).map(|v| v.0),
                slot(KtcFormat::Redraft1Qb).map(|v| v.1),
                slot(KtcFormat::RedraftSuperflex).map(|v| v.0),
                slot(KtcFormat::RedraftSuperflex).map(|v| v.1),
                value_date,
                now
            ],
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KtcFetchOptions {
    pub max_pages: usize,
    pub include_redraft: bool,
    pub delay: Duration,
    pub parallelism: usize,
}

/// Scrapes one format stream page by page. A failed page is logged and
/// skipped; the first empty page after page one ends the stream.
pub fn fetch_stream(format: KtcFormat, max_pages: usize, delay: Duration) -> Result<Vec<KtcEntry>> {
    let client = http_client()?;
    let mut out = Vec::new();
    for page in 0..max_pages {
        let url = format.url(page);
        let html = match fetch_text(client, &url) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!("ktc {} page {}: {err:#}", format.label(), page + 1);
                continue;
            }
        };
        let entries = parse_ktc_page(&html, format);
        tracing::debug!(
            "ktc {} page {}: {} players",
            format.label(),
            page + 1,
            entries.len()
        );
        if entries.is_empty() && page > 0 {
            break;
        }
        out.extend(entries);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
    Ok(out)
}

/// Fetches every enabled format stream in parallel and consolidates them.
pub fn fetch_ktc(opts: KtcFetchOptions) -> Result<Vec<KtcRecord>> {
    let formats: Vec<KtcFormat> = KtcFormat::ALL
        .into_iter()
        .filter(|f| opts.include_redraft || !f.is_redraft())
        .collect();
    let streams: Vec<Result<Vec<KtcEntry>>> = with_fetch_pool(opts.parallelism, || {
        formats
            .par_iter()
            .map(|f| fetch_stream(*f, opts.max_pages, opts.delay))
            .collect()
    });

    let mut entries = Vec::new();
    for (format, stream) in formats.iter().zip(streams) {
        let stream = stream.with_context(|| format!("ktc {} stream", format.label()))?;
        tracing::info!("ktc {}: {} entries", format.label(), stream.len());
        entries.extend(stream);
    }
    if entries.is_empty() {
        return Err(anyhow!("ktc returned no players in any format"));
    }
    Ok(consolidate(entries))
}
