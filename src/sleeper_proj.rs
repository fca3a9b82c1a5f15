//! Sleeper season-total projections. Requests are made per roster identifier,
//! so records never need name resolution.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;
use rusqlite::{Transaction, params};
use serde::Deserialize;
use serde_json::Value;

use crate::http_client::{fetch_text, http_client, with_fetch_pool};
use crate::ingest::{RecordKey, SourceRecord};
use crate::store::now_rfc3339;

pub fn projection_url(player_id: &str, season: i32) -> String {
    format!(
        "https://api.sleeper.app/projections/nfl/player/{player_id}?season_type=regular&season={season}&grouping=total"
    )
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProjectedStats {
    pub gp: Option<f64>,
    pub pts_std: Option<f64>,
    pub pts_half_ppr: Option<f64>,
    pub pts_ppr: Option<f64>,
    pub adp_std: Option<f64>,
    pub adp_half_ppr: Option<f64>,
    pub adp_ppr: Option<f64>,
    pub adp_dynasty_ppr: Option<f64>,
    pub adp_2qb: Option<f64>,
    pub pass_att: Option<f64>,
    pub pass_cmp: Option<f64>,
    pub pass_yd: Option<f64>,
    pub pass_td: Option<f64>,
    pub pass_int: Option<f64>,
    pub rush_att: Option<f64>,
    pub rush_yd: Option<f64>,
    pub rush_td: Option<f64>,
    pub rec_tgt: Option<f64>,
    pub rec: Option<f64>,
    pub rec_yd: Option<f64>,
    pub rec_td: Option<f64>,
    pub fum_lost: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProjectionItem {
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    player: Option<ProjectionPlayer>,
    stats: Option<ProjectedStats>,
}

#[derive(Debug, Deserialize)]
struct ProjectionPlayer {
    #[serde(default)]
    position: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SleeperProjection {
    pub player_id: String,
    pub season: i32,
    pub team: Option<String>,
    pub position: Option<String>,
    pub stats: ProjectedStats,
}

/// The endpoint answers with either one projection object or a list whose
/// first element is the season total. Bodies without `stats` yield `None`.
pub fn parse_projection_json(
    raw: &str,
    player_id: &str,
    season: i32,
) -> Result<Option<SleeperProjection>> {
    let value: Value = serde_json::from_str(raw).context("projection body is not JSON")?;
    let item = match value {
        Value::Array(items) => match items.into_iter().next() {
            Some(first) => first,
            None => return Ok(None),
        },
        Value::Object(_) => value,
        Value::Null => return Ok(None),
        other => return Err(anyhow!("unexpected projection shape: {other}")),
    };
    let item: ProjectionItem =
        serde_json::from_value(item).context("projection object has unexpected fields")?;
    let Some(stats) = item.stats else {
        return Ok(None);
    };
    Ok(Some(SleeperProjection {
        player_id: player_id.to_string(),
        season,
        team: item.team,
        position: item.player.and_then(|p| p.position),
        stats,
    }))
}

fn fetch_one(player_id: &str, season: i32, delay: Duration) -> Result<Option<SleeperProjection>> {
    let client = http_client()?;
    let body = fetch_text(client, &projection_url(player_id, season))?;
    if !delay.is_zero() {
        thread::sleep(delay);
    }
    parse_projection_json(&body, player_id, season)
}

/// Fetches projections for `player_ids` on a pool of `parallelism` workers.
/// A player whose request fails is logged and left out.
pub fn fetch_projections(
    player_ids: &[String],
    season: i32,
    parallelism: usize,
    delay: Duration,
) -> Vec<SleeperProjection> {
    let results: Vec<(String, Result<Option<SleeperProjection>>)> =
        with_fetch_pool(parallelism, || {
            player_ids
                .par_iter()
                .map(|id| (id.clone(), fetch_one(id, season, delay)))
                .collect()
        });

    let mut out = Vec::with_capacity(results.len());
    for (player_id, result) in results {
        match result {
            Ok(Some(projection)) => out.push(projection),
            Ok(None) => tracing::debug!("no {season} projection for {player_id}"),
            Err(err) => tracing::warn!("sleeper projection {player_id}: {err:#}"),
        }
    }
    out
}

impl SourceRecord for SleeperProjection {
    fn key(&self) -> RecordKey<'_> {
        RecordKey::Identifier(&self.player_id)
    }

    fn row_key(&self, player_id: &str) -> String {
        format!("{player_id}/{}", self.season)
    }

    fn upsert(&self, tx: &Transaction<'_>, player_id: &str) -> rusqlite::Result<()> {
        let s = &self.stats;
        tx.execute(
            r#"
            INSERT INTO sleeper_projections (
                player_id, season, team, position, gp,
                pts_std, pts_half_ppr, pts_ppr,
                adp_std, adp_half_ppr, adp_ppr, adp_dynasty_ppr, adp_2qb,
                pass_att, pass_cmp, pass_yd, pass_td, pass_int,
                rush_att, rush_yd, rush_td,
                rec_tgt, rec, rec_yd, rec_td, fum_lost, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                      ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)
            ON CONFLICT(player_id, season) DO UPDATE SET
                team = excluded.team,
                position = excluded.position,
                gp = excluded.gp,
                pts_std = excluded.pts_std,
                pts_half_ppr = excluded.pts_half_ppr,
                pts_ppr = excluded.pts_ppr,
                adp_std = excluded.adp_std,
                adp_half_ppr = excluded.adp_half_ppr,
                adp_ppr = excluded.adp_ppr,
                adp_dynasty_ppr = excluded.adp_dynasty_ppr,
                adp_2qb = excluded.adp_2qb,
                pass_att = excluded.pass_att,
                pass_cmp = excluded.pass_cmp,
                pass_yd = excluded.pass_yd,
                pass_td = excluded.pass_td,
                pass_int = excluded.pass_int,
                rush_att = excluded.rush_att,
                rush_yd = excluded.rush_yd,
                rush_td = excluded.rush_td,
                rec_tgt = excluded.rec_tgt,
                rec = excluded.rec,
                rec_yd = excluded.rec_yd,
                rec_td = excluded.rec_td,
                fum_lost = excluded.fum_lost,
                updated_at = excluded.updated_at
            "#,
            params![
                player_id,
                self.season,
                self.team,
                self.position,
                s.gp,
                s.pts_std,
                s.pts_half_ppr,
                s.pts_ppr,
                s.adp_std,
                s.adp_half_ppr,
                s.adp_ppr,
                s.adp_dynasty_ppr,
                s.adp_2qb,
                s.pass_att,
                s.pass_cmp,
                s.pass_yd,
                s.pass_td,
                s.pass_int,
                s.rush_att,
                s.rush_yd,
                s.rush_td,
                s.rec_tgt,
                s.rec,
                s.rec_yd,
                s.rec_td,
                s.fum_lost,
                now_rfc3339()
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_and_object_bodies() {
        let body = r#"[{"team":"MIN","player":{"position":"WR"},"stats":{"pts_ppr":321.5,"rec":110}}]"#;
        let proj = parse_projection_json(body, "100", 2025)
            .expect("parse")
            .expect("projection");
        assert_eq!(proj.team.as_deref(), Some("MIN"));
        assert_eq!(proj.position.as_deref(), Some("WR"));
        assert_eq!(proj.stats.pts_ppr, Some(321.5));
        assert_eq!(proj.stats.rec, Some(110.0));
        assert_eq!(proj.stats.pass_yd, None);

        let object = r#"{"stats":{"gp":17}}"#;
        assert!(parse_projection_json(object, "100", 2025).expect("parse").is_some());
    }

    #[test]
    fn bodies_without_stats_are_empty() {
        assert!(parse_projection_json("[]", "1", 2025).expect("parse").is_none());
        assert!(parse_projection_json("null", "1", 2025).expect("parse").is_none());
        assert!(parse_projection_json(r#"{"team":"MIN"}"#, "1", 2025).expect("parse").is_none());
        assert!(parse_projection_json("42", "1", 2025).is_err());
    }

    #[test]
    fn url_carries_id_and_season() {
        assert_eq!(
            projection_url("4984", 2025),
            "https://api.sleeper.app/projections/nfl/player/4984?season_type=regular&season=2025&grouping=total"
        );
    }
}
