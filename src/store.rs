use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::IngestError;
use crate::player::{PlayerRecord, PlayerStatus};
use crate::position::{Position, parse_position_list};

const APP_DIR: &str = "ff_ingest";
const DB_FILE: &str = "fantasy.sqlite";

pub fn default_db_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(DB_FILE))
}

fn app_data_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_DATA_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(APP_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".local").join("share").join(APP_DIR))
}

pub fn open_db(path: &Path) -> Result<Connection, IngestError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn = Connection::open(path).map_err(IngestError::storage("opening database"))?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")
        .map_err(IngestError::storage("enabling WAL"))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection, IngestError> {
    let conn = Connection::open_in_memory().map_err(IngestError::storage("opening database"))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<(), IngestError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS players (
            player_id TEXT PRIMARY KEY,
            player_name TEXT NOT NULL,
            first_name TEXT NULL,
            last_name TEXT NULL,
            team TEXT NULL,
            position TEXT NULL,
            fantasy_position TEXT NULL,
            rotowire_id TEXT NULL UNIQUE,
            years_exp INTEGER NULL,
            weight INTEGER NULL,
            height TEXT NULL,
            age INTEGER NULL,
            status TEXT NOT NULL DEFAULT 'Inactive',
            last_updated TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_players_name ON players(player_name);
        CREATE INDEX IF NOT EXISTS idx_players_position ON players(position);
        CREATE INDEX IF NOT EXISTS idx_players_status ON players(status);

        CREATE TABLE IF NOT EXISTS ktc_values (
            player_id TEXT PRIMARY KEY,
            player_name TEXT NOT NULL,
            position TEXT NULL,
            team TEXT NULL,
            age REAL NULL,
            rookie INTEGER NOT NULL,
            ktc_1qb_value INTEGER NULL,
            ktc_1qb_position_rank TEXT NULL,
            ktc_sf_value INTEGER NULL,
            ktc_sf_position_rank TEXT NULL,
            ktc_1qb_redraft_value INTEGER NULL,
            ktc_1qb_redraft_position_rank TEXT NULL,
            ktc_sf_redraft_value INTEGER NULL,
            ktc_sf_redraft_position_rank TEXT NULL,
            value_date TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS fpros_projections (
            player_id TEXT PRIMARY KEY,
            player_name TEXT NOT NULL,
            team TEXT NULL,
            position TEXT NOT NULL,
            pass_attempts REAL NULL,
            completions REAL NULL,
            pass_yards REAL NULL,
            pass_tds REAL NULL,
            interceptions REAL NULL,
            rush_attempts REAL NULL,
            rush_yards REAL NULL,
            rush_tds REAL NULL,
            receptions REAL NULL,
            rec_yards REAL NULL,
            rec_tds REAL NULL,
            fumbles_lost REAL NULL,
            fantasy_points REAL NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS clay_projections (
            player_id TEXT PRIMARY KEY,
            player_name TEXT NOT NULL,
            team TEXT NULL,
            position TEXT NOT NULL,
            pos_rank INTEGER NOT NULL,
            ff_points INTEGER NOT NULL,
            games INTEGER NOT NULL,
            pass_att INTEGER NULL,
            comp INTEGER NULL,
            pass_yds INTEGER NULL,
            pass_td INTEGER NULL,
            ints INTEGER NULL,
            sk INTEGER NULL,
            carry INTEGER NULL,
            ru_yds INTEGER NULL,
            ru_tds INTEGER NULL,
            targ INTEGER NULL,
            rec INTEGER NULL,
            re_yds INTEGER NULL,
            re_tds INTEGER NULL,
            car_pct REAL NULL,
            targ_pct REAL NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sleeper_projections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            player_id TEXT NOT NULL,
            season INTEGER NOT NULL,
            team TEXT NULL,
            position TEXT NULL,
            gp REAL NULL,
            pts_std REAL NULL,
            pts_half_ppr REAL NULL,
            pts_ppr REAL NULL,
            adp_std REAL NULL,
            adp_half_ppr REAL NULL,
            adp_ppr REAL NULL,
            adp_dynasty_ppr REAL NULL,
            adp_2qb REAL NULL,
            pass_att REAL NULL,
            pass_cmp REAL NULL,
            pass_yd REAL NULL,
            pass_td REAL NULL,
            pass_int REAL NULL,
            rush_att REAL NULL,
            rush_yd REAL NULL,
            rush_td REAL NULL,
            rec_tgt REAL NULL,
            rec REAL NULL,
            rec_yd REAL NULL,
            rec_td REAL NULL,
            fum_lost REAL NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(player_id, season)
        );

        CREATE TABLE IF NOT EXISTS sleeper_weekly_projections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            player_id TEXT NOT NULL,
            season INTEGER NOT NULL,
            week INTEGER NOT NULL,
            team TEXT NULL,
            opponent TEXT NULL,
            company TEXT NULL,
            game_id TEXT NULL,
            projection_date TEXT NULL,
            gp REAL NULL,
            pts_std REAL NULL,
            pts_half_ppr REAL NULL,
            pts_ppr REAL NULL,
            adp_dd_ppr REAL NULL,
            pos_adp_dd_ppr REAL NULL,
            rush_att REAL NULL,
            rush_yd REAL NULL,
            rush_fd REAL NULL,
            rec_tgt REAL NULL,
            rec REAL NULL,
            rec_yd REAL NULL,
            rec_td REAL NULL,
            rec_fd REAL NULL,
            rec_td_40p REAL NULL,
            rec_0_4 REAL NULL,
            rec_5_9 REAL NULL,
            rec_10_19 REAL NULL,
            rec_20_29 REAL NULL,
            rec_30_39 REAL NULL,
            rec_40p REAL NULL,
            bonus_rec_wr REAL NULL,
            fum REAL NULL,
            fum_lost REAL NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(player_id, season, week)
        );
        CREATE INDEX IF NOT EXISTS idx_weekly_season_week ON sleeper_weekly_projections(season, week);

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            status TEXT NOT NULL,
            records_seen INTEGER NOT NULL DEFAULT 0,
            upserted INTEGER NOT NULL DEFAULT 0,
            not_matched INTEGER NOT NULL DEFAULT 0,
            ambiguous INTEGER NOT NULL DEFAULT 0,
            unmatched_json TEXT NOT NULL DEFAULT '[]'
        );
        "#,
    )
    .map_err(IngestError::storage("creating schema"))?;
    Ok(())
}

/// Every player in the registry, for building the run's identity index.
pub fn load_players(conn: &Connection) -> Result<Vec<PlayerRecord>, IngestError> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT player_id, player_name, team, position, fantasy_position, status, last_updated
            FROM players
            ORDER BY player_id ASC
            "#,
        )
        .map_err(IngestError::storage("preparing player load"))?;

    let rows = stmt
        .query_map([], |row| {
            let position: Option<String> = row.get(3)?;
            let fantasy: Option<String> = row.get(4)?;
            let status: String = row.get(5)?;
            let last_updated: String = row.get(6)?;
            Ok(PlayerRecord {
                identifier: row.get(0)?,
                canonical_name: row.get(1)?,
                team: row.get(2)?,
                position: position.as_deref().map(Position::parse),
                fantasy_positions: fantasy
                    .as_deref()
                    .map(parse_position_list)
                    .unwrap_or_default()
                    .into_iter()
                    .collect(),
                status: PlayerStatus::parse(&status),
                last_updated: parse_timestamp(&last_updated),
            })
        })
        .map_err(IngestError::storage("loading players"))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(IngestError::storage("decoding player row"))?);
    }
    Ok(out)
}

/// Identifiers of active players at any of `positions`.
pub fn active_player_ids(
    conn: &Connection,
    positions: &[Position],
) -> Result<Vec<String>, IngestError> {
    let players = load_players(conn)?;
    Ok(players
        .into_iter()
        .filter(|p| p.is_active() && p.position.is_some_and(|pos| positions.contains(&pos)))
        .map(|p| p.identifier)
        .collect())
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<usize, IngestError> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    let n = conn
        .query_row(&sql, [], |row| row.get::<_, i64>(0))
        .map_err(IngestError::storage("counting rows"))?;
    Ok(usize::try_from(n).unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRow {
    pub run_id: i64,
    pub source: String,
    pub status: String,
    pub records_seen: i64,
    pub upserted: i64,
    pub not_matched: i64,
    pub ambiguous: i64,
    pub unmatched_json: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub records_seen: usize,
    pub upserted: usize,
    pub not_matched: usize,
    pub ambiguous: usize,
}

pub fn begin_run(conn: &Connection, source: &str) -> Result<i64, IngestError> {
    conn.execute(
        "INSERT INTO ingest_runs(source, started_at, finished_at, status) VALUES (?1, ?2, NULL, 'running')",
        params![source, Utc::now().to_rfc3339()],
    )
    .map_err(IngestError::storage("recording run start"))?;
    Ok(conn.last_insert_rowid())
}

pub fn finish_run(
    conn: &Connection,
    run_id: i64,
    status: &str,
    counts: RunCounts,
    unmatched_json: &str,
) -> Result<(), IngestError> {
    conn.execute(
        "UPDATE ingest_runs
         SET finished_at = ?1, status = ?2, records_seen = ?3, upserted = ?4,
             not_matched = ?5, ambiguous = ?6, unmatched_json = ?7
         WHERE run_id = ?8",
        params![
            Utc::now().to_rfc3339(),
            status,
            counts.records_seen as i64,
            counts.upserted as i64,
            counts.not_matched as i64,
            counts.ambiguous as i64,
            unmatched_json,
            run_id
        ],
    )
    .map_err(IngestError::storage("recording run finish"))?;
    Ok(())
}

pub fn latest_run(conn: &Connection, source: &str) -> Result<Option<RunRow>, IngestError> {
    conn.query_row(
        "SELECT run_id, source, status, records_seen, upserted, not_matched, ambiguous, unmatched_json
         FROM ingest_runs WHERE source = ?1 ORDER BY run_id DESC LIMIT 1",
        params![source],
        |row| {
            Ok(RunRow {
                run_id: row.get(0)?,
                source: row.get(1)?,
                status: row.get(2)?,
                records_seen: row.get(3)?,
                upserted: row.get(4)?,
                not_matched: row.get(5)?,
                ambiguous: row.get(6)?,
                unmatched_json: row.get(7)?,
            })
        },
    )
    .optional()
    .map_err(IngestError::storage("loading latest run"))
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}
