//! Sleeper week-by-week projections. Like the season totals these are
//! requested per roster identifier; one player's body holds every week.

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use rayon::prelude::*;
use rusqlite::{Transaction, params};
use serde::Deserialize;
use serde_json::Value;

use crate::http_client::{fetch_text, http_client, with_fetch_pool};
use crate::ingest::{RecordKey, SourceRecord};
use crate::roster::value_to_string;
use crate::store::now_rfc3339;

const DEFAULT_COMPANY: &str = "Sleeper";

pub fn weekly_projection_url(player_id: &str, season: i32) -> String {
    format!(
        "https://api.sleeper.app/projections/nfl/player/{player_id}?season_type=regular&season={season}&grouping=week"
    )
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WeeklyStats {
    pub gp: Option<f64>,
    pub pts_std: Option<f64>,
    pub pts_half_ppr: Option<f64>,
    pub pts_ppr: Option<f64>,
    pub adp_dd_ppr: Option<f64>,
    pub pos_adp_dd_ppr: Option<f64>,
    pub rush_att: Option<f64>,
    pub rush_yd: Option<f64>,
    pub rush_fd: Option<f64>,
    pub rec_tgt: Option<f64>,
    pub rec: Option<f64>,
    pub rec_yd: Option<f64>,
    pub rec_td: Option<f64>,
    pub rec_fd: Option<f64>,
    pub rec_td_40p: Option<f64>,
    pub rec_0_4: Option<f64>,
    pub rec_5_9: Option<f64>,
    pub rec_10_19: Option<f64>,
    pub rec_20_29: Option<f64>,
    pub rec_30_39: Option<f64>,
    pub rec_40p: Option<f64>,
    pub bonus_rec_wr: Option<f64>,
    pub fum: Option<f64>,
    pub fum_lost: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WeekItem {
    #[serde(default)]
    opponent: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    game_id: Option<Value>,
    #[serde(default)]
    date: Option<String>,
    stats: Option<WeeklyStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SleeperWeeklyProjection {
    pub player_id: String,
    pub season: i32,
    pub week: u32,
    pub opponent: Option<String>,
    pub company: String,
    pub game_id: Option<String>,
    pub projection_date: Option<NaiveDate>,
    pub stats: WeeklyStats,
}

/// Parses a body keyed by week number. Weeks that are null, carry no
/// `stats`, or have a non-numeric key are skipped; `only_week` keeps a
/// single week. Output is ordered by week.
pub fn parse_weekly_json(
    raw: &str,
    player_id: &str,
    season: i32,
    only_week: Option<u32>,
) -> Result<Vec<SleeperWeeklyProjection>> {
    let value: Value = serde_json::from_str(raw).context("weekly projection body is not JSON")?;
    let Value::Object(weeks) = value else {
        return Err(anyhow!("weekly projections for {player_id} are not keyed by week"));
    };

    let mut by_week = BTreeMap::new();
    for (key, item) in weeks {
        let Ok(week) = key.trim().parse::<u32>() else {
            tracing::warn!("sleeper weekly {player_id}: unparseable week {key:?}");
            continue;
        };
        if only_week.is_some_and(|w| w != week) || item.is_null() {
            continue;
        }
        let item: WeekItem = match serde_json::from_value(item) {
            Ok(item) => item,
            Err(err) => {
                tracing::warn!("sleeper weekly {player_id} week {week}: {err}");
                continue;
            }
        };
        let Some(stats) = item.stats else {
            continue;
        };
        let projection_date = item.date.as_deref().and_then(|raw| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|_| tracing::warn!("sleeper weekly {player_id} week {week}: bad date {raw:?}"))
                .ok()
        });
        by_week.insert(
            week,
            SleeperWeeklyProjection {
                player_id: player_id.to_string(),
                season,
                week,
                opponent: item.opponent,
                company: item.company.unwrap_or_else(|| DEFAULT_COMPANY.to_string()),
                game_id: item.game_id.as_ref().and_then(value_to_string),
                projection_date,
                stats,
            },
        );
    }
    Ok(by_week.into_values().collect())
}

fn fetch_one(
    player_id: &str,
    season: i32,
    only_week: Option<u32>,
    delay: Duration,
) -> Result<Vec<SleeperWeeklyProjection>> {
    let client = http_client()?;
    let body = fetch_text(client, &weekly_projection_url(player_id, season))?;
    if !delay.is_zero() {
        thread::sleep(delay);
    }
    parse_weekly_json(&body, player_id, season, only_week)
}

/// Fetches every week for `player_ids` on a pool of `parallelism` workers.
/// A player whose request or body fails is logged and left out.
pub fn fetch_weekly_projections(
    player_ids: &[String],
    season: i32,
    only_week: Option<u32>,
    parallelism: usize,
    delay: Duration,
) -> Vec<SleeperWeeklyProjection> {
    let results: Vec<(String, Result<Vec<SleeperWeeklyProjection>>)> =
        with_fetch_pool(parallelism, || {
            player_ids
                .par_iter()
                .map(|id| (id.clone(), fetch_one(id, season, only_week, delay)))
                .collect()
        });

    let mut out = Vec::new();
    for (player_id, result) in results {
        match result {
            Ok(weeks) => out.extend(weeks),
            Err(err) => tracing::warn!("sleeper weekly {player_id}: {err:#}"),
        }
    }
    out
}

impl SourceRecord for SleeperWeeklyProjection {
    fn key(&self) -> RecordKey<'_> {
        RecordKey::Identifier(&self.player_id)
    }

    fn row_key(&self, player_id: &str) -> String {
        format!("{player_id}/{}/{}", self.season, self.week)
    }

    fn upsert(&self, tx: &Transaction<'_>, player_id: &str) -> rusqlite::Result<()> {
        let s = &self.stats;
        tx.execute(
            r#"
            INSERT INTO sleeper_weekly_projections (
                player_id, season, week, team, opponent, company, game_id, projection_date,
                gp, pts_std, pts_half_ppr, pts_ppr, adp_dd_ppr, pos_adp_dd_ppr,
                rush_att, rush_yd, rush_fd,
                rec_tgt, rec, rec_yd, rec_td, rec_fd, rec_td_40p,
                rec_0_4, rec_5_9, rec_10_19, rec_20_29, rec_30_39, rec_40p,
                bonus_rec_wr, fum, fum_lost, updated_at
            ) VALUES (
                ?1, ?2, ?3, (SELECT team FROM players WHERE player_id = ?1), ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22,
                ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32
            )
            ON CONFLICT(player_id, season, week) DO UPDATE SET
                team = excluded.team,
                opponent = excluded.opponent,
                company = excluded.company,
                game_id = excluded.game_id,
                projection_date = excluded.projection_date,
                gp = excluded.gp,
                pts_std = excluded.pts_std,
                pts_half_ppr = excluded.pts_half_ppr,
                pts_ppr = excluded.pts_ppr,
                adp_dd_ppr = excluded.adp_dd_ppr,
                pos_adp_dd_ppr = excluded.pos_adp_dd_ppr,
                rush_att = excluded.rush_att,
                rush_yd = excluded.rush_yd,
                rush_fd = excluded.rush_fd,
                rec_tgt = excluded.rec_tgt,
                rec = excluded.rec,
                rec_yd = excluded.rec_yd,
                rec_td = excluded.rec_td,
                rec_fd = excluded.rec_fd,
                rec_td_40p = excluded.rec_td_40p,
                rec_0_4 = excluded.rec_0_4,
                rec_5_9 = excluded.rec_5_9,
                rec_10_19 = excluded.rec_10_19,
                rec_20_29 = excluded.rec_20_29,
                rec_30_39 = excluded.rec_30_39,
                rec_40p = excluded.rec_40p,
                bonus_rec_wr = excluded.bonus_rec_wr,
                fum = excluded.fum,
                fum_lost = excluded.fum_lost,
                updated_at = excluded.updated_at
            "#,
            params![
                player_id,
                self.season,
                self.week,
                self.opponent,
                self.company,
                self.game_id,
                self.projection_date.map(|d| d.to_string()),
                s.gp,
                s.pts_std,
                s.pts_half_ppr,
                s.pts_ppr,
                s.adp_dd_ppr,
                s.pos_adp_dd_ppr,
                s.rush_att,
                s.rush_yd,
                s.rush_fd,
                s.rec_tgt,
                s.rec,
                s.rec_yd,
                s.rec_td,
                s.rec_fd,
                s.rec_td_40p,
                s.rec_0_4,
                s.rec_5_9,
                s.rec_10_19,
                s.rec_20_29,
                s.rec_30_39,
                s.rec_40p,
                s.bonus_rec_wr,
                s.fum,
                s.fum_lost,
                now_rfc3339()
            ],
        )?;
        Ok(())
    }
}
