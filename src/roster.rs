//! Authoritative roster: the Sleeper players feed is the only writer of
//! player identifiers.

use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::IngestError;
use crate::http_client::{fetch_text, http_client};
use crate::name_canon::canonicalize;
use crate::position::Position;
use crate::store::{self, RunCounts};

pub const SLEEPER_PLAYERS_URL: &str = "https://api.sleeper.app/v1/players/nfl";
pub const DEFAULT_SKIP_IDS: &[&str] = &["232"];
const RUN_SOURCE: &str = "roster";

/// One player object from the feed. Numeric fields arrive as numbers or
/// strings depending on the player, so they are kept as raw JSON values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SleeperPlayer {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// `None` when absent, `Some(None)` when the feed sends `null` (free agent).
    #[serde(default, deserialize_with = "present")]
    pub team: Option<Option<String>>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub fantasy_positions: Option<Vec<String>>,
    #[serde(default)]
    pub rotowire_id: Option<Value>,
    #[serde(default)]
    pub years_exp: Option<Value>,
    #[serde(default)]
    pub weight: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub height: Option<Option<Value>>,
    #[serde(default)]
    pub age: Option<Value>,
    #[serde(default)]
    pub status: Option<String>,
}

fn present<'de, D, T>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub player_id: String,
    pub player: SleeperPlayer,
}

/// Parses the feed body, a JSON object keyed by player id. Entries come back
/// ordered by id.
pub fn parse_roster_json(raw: &str) -> Result<Vec<RosterEntry>> {
    let map: BTreeMap<String, Value> =
        serde_json::from_str(raw).context("roster feed is not a JSON object")?;
    let mut out = Vec::with_capacity(map.len());
    for (player_id, value) in map {
        match serde_json::from_value::<SleeperPlayer>(value) {
            Ok(player) => out.push(RosterEntry { player_id, player }),
            Err(err) => tracing::warn!("skipping malformed roster entry {player_id}: {err}"),
        }
    }
    Ok(out)
}

pub fn fetch_roster() -> Result<Vec<RosterEntry>> {
    let client = http_client()?;
    let body = fetch_text(client, SLEEPER_PLAYERS_URL)?;
    parse_roster_json(&body)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterSummary {
    pub run_id: i64,
    pub created: usize,
    pub updated: usize,
    pub skipped_position: usize,
    pub skipped_id: usize,
    pub rotowire_conflicts: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct StoredPlayer {
    player_name: String,
    first_name: Option<String>,
    last_name: Option<String>,
    team: Option<String>,
    position: Option<String>,
    fantasy_position: Option<String>,
    rotowire_id: Option<String>,
    years_exp: Option<i64>,
    weight: Option<i64>,
    height: Option<String>,
    age: Option<i64>,
    status: String,
}

/// Creates or updates every relevant roster player inside one transaction.
/// Values the feed leaves out keep what is already stored.
pub fn ingest_roster(
    conn: &mut Connection,
    entries: &[RosterEntry],
    skip_ids: &[String],
) -> Result<RosterSummary, IngestError> {
    let run_id = store::begin_run(conn, RUN_SOURCE)?;
    let skip: HashSet<&str> = skip_ids.iter().map(String::as_str).collect();
    let mut summary = RosterSummary {
        run_id,
        ..RosterSummary::default()
    };

    let result = write_roster(conn, entries, &skip, &mut summary);
    let counts = RunCounts {
        records_seen: entries.len(),
        upserted: summary.created + summary.updated,
        not_matched: 0,
        ambiguous: 0,
    };
    match result {
        Ok(()) => {
            store::finish_run(conn, run_id, "ok", counts, "[]")?;
            tracing::info!(
                created = summary.created,
                updated = summary.updated,
                skipped_position = summary.skipped_position,
                "roster committed"
            );
            Ok(summary)
        }
        Err(err) => {
            tracing::error!("roster ingestion rolled back: {err}");
            let counts = RunCounts {
                upserted: 0,
                ..counts
            };
            if let Err(ledger_err) = store::finish_run(conn, run_id, "failed", counts, "[]") {
                tracing::warn!("could not record failed run {run_id}: {ledger_err}");
            }
            Err(err)
        }
    }
}

fn write_roster(
    conn: &mut Connection,
    entries: &[RosterEntry],
    skip: &HashSet<&str>,
    summary: &mut RosterSummary,
) -> Result<(), IngestError> {
    let tx = conn
        .transaction()
        .map_err(IngestError::storage("beginning roster transaction"))?;
    let now = store::now_rfc3339();

    for entry in entries {
        let details = &entry.player;
        let position = details.position.as_deref().map(Position::parse);
        if !position.is_some_and(|p| Position::FANTASY_RELEVANT.contains(&p)) {
            summary.skipped_position += 1;
            continue;
        }
        if skip.contains(entry.player_id.as_str()) {
            tracing::debug!("skipping roster id {} by configuration", entry.player_id);
            summary.skipped_id += 1;
            continue;
        }

        let existing = load_stored(&tx, &entry.player_id)?;
        let is_new = existing.is_none();
        let mut merged = merge(existing.unwrap_or_default(), details, is_new);

        if let Some(rotowire) = details.rotowire_id.as_ref().and_then(value_to_string)
            && let Some((holder_id, holder_name)) =
                rotowire_holder(&tx, &rotowire, &entry.player_id)?
        {
            tracing::warn!(
                "rotowire id {rotowire} for {} ({}) already belongs to {holder_name} ({holder_id}); keeping the old value",
                merged.player_name,
                entry.player_id
            );
            summary.rotowire_conflicts += 1;
            if is_new {
                merged.rotowire_id = None;
            } else {
                merged.rotowire_id = load_stored(&tx, &entry.player_id)?.and_then(|p| p.rotowire_id);
            }
        }

        write_player(&tx, &entry.player_id, &merged, &now)?;
        if is_new {
            summary.created += 1;
        } else {
            summary.updated += 1;
        }
    }

    tx.commit().map_err(IngestError::Commit)?;
    Ok(())
}

fn merge(mut stored: StoredPlayer, details: &SleeperPlayer, is_new: bool) -> StoredPlayer {
    if let Some(name) = details.full_name.as_deref() {
        stored.player_name = canonicalize(name);
    }
    if let Some(first) = details.first_name.as_deref() {
        stored.first_name = Some(canonicalize(first));
    }
    if let Some(last) = details.last_name.as_deref() {
        stored.last_name = Some(canonicalize(last));
    }
    if let Some(team) = &details.team {
        stored.team = team.clone();
    }
    stored.position = details.position.as_deref().map(|p| p.trim().to_ascii_uppercase());
    if let Some(list) = &details.fantasy_positions {
        stored.fantasy_position = Some(list.join(","));
    }
    // A missing rotowire id clears the stored one; conflicts are handled by the caller.
    stored.rotowire_id = details.rotowire_id.as_ref().and_then(value_to_string);
    if let Some(v) = details.years_exp.as_ref() {
        stored.years_exp = value_to_int(v);
    }
    if let Some(v) = details.weight.as_ref() {
        stored.weight = value_to_int(v);
    }
    if let Some(height) = &details.height {
        stored.height = height.as_ref().and_then(value_to_string);
    }
    if let Some(v) = details.age.as_ref() {
        stored.age = value_to_int(v);
    }
    match details.status.as_deref().map(str::trim) {
        Some(status) if !status.is_empty() => stored.status = status.to_string(),
        _ if is_new || stored.status.is_empty() => stored.status = "Inactive".to_string(),
        _ => {}
    }
    stored
}

fn load_stored(tx: &Transaction<'_>, player_id: &str) -> Result<Option<StoredPlayer>, IngestError> {
    tx.query_row(
        r#"
        SELECT player_name, first_name, last_name, team, position, fantasy_position,
               rotowire_id, years_exp, weight, height, age, status
        FROM players WHERE player_id = ?1
        "#,
        params![player_id],
        |row| {
            Ok(StoredPlayer {
                player_name: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                team: row.get(3)?,
                position: row.get(4)?,
                fantasy_position: row.get(5)?,
                rotowire_id: row.get(6)?,
                years_exp: row.get(7)?,
                weight: row.get(8)?,
                height: row.get(9)?,
                age: row.get(10)?,
                status: row.get(11)?,
            })
        },
    )
    .optional()
    .map_err(IngestError::storage("loading stored player"))
}

fn rotowire_holder(
    tx: &Transaction<'_>,
    rotowire_id: &str,
    player_id: &str,
) -> Result<Option<(String, String)>, IngestError> {
    tx.query_row(
        "SELECT player_id, player_name FROM players WHERE rotowire_id = ?1 AND player_id <> ?2",
        params![rotowire_id, player_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
    .map_err(IngestError::storage("checking rotowire id"))
}

fn write_player(
    tx: &Transaction<'_>,
    player_id: &str,
    p: &StoredPlayer,
    now: &str,
) -> Result<(), IngestError> {
    tx.execute(
        r#"
        INSERT INTO players (
            player_id, player_name, first_name, last_name, team, position, fantasy_position,
            rotowire_id, years_exp, weight, height, age, status, last_updated
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT(player_id) DO UPDATE SET
            player_name = excluded.player_name,
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            team = excluded.team,
            position = excluded.position,
            fantasy_position = excluded.fantasy_position,
            rotowire_id = excluded.rotowire_id,
            years_exp = excluded.years_exp,
            weight = excluded.weight,
            height = excluded.height,
            age = excluded.age,
            status = excluded.status,
            last_updated = excluded.last_updated
        "#,
        params![
            player_id,
            p.player_name,
            p.first_name,
            p.last_name,
            p.team,
            p.position,
            p.fantasy_position,
            p.rotowire_id,
            p.years_exp,
            p.weight,
            p.height,
            p.age,
            p.status,
            now
        ],
    )
    .map_err(IngestError::storage("writing player"))?;
    Ok(())
}

pub(crate) fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
