use std::fs;
use std::path::PathBuf;

use rusqlite::{Connection, params};

use ff_ingest::clay::parse_report;
use ff_ingest::exceptions::{ExceptionTable, SourceTag};
use ff_ingest::fpros::parse_fpros_page;
use ff_ingest::ingest::{IngestionPipeline, UnmatchedReason};
use ff_ingest::ktc::{KtcEntry, KtcFormat, TeamTag, consolidate, parse_ktc_page};
use ff_ingest::player::PlayerStatus;
use ff_ingest::position::Position;
use ff_ingest::roster::{ingest_roster, parse_roster_json};
use ff_ingest::sleeper_proj::parse_projection_json;
use ff_ingest::sleeper_weekly::parse_weekly_json;
use ff_ingest::store;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn seeded_db() -> Connection {
    let mut conn = store::open_in_memory().expect("in-memory db");
    let entries = parse_roster_json(&read_fixture("sleeper_players.json")).expect("roster");
    ingest_roster(&mut conn, &entries, &["232".to_string()]).expect("roster ingest");
    conn
}

fn text_column(conn: &Connection, sql: &str, id: &str) -> Option<String> {
    conn.query_row(sql, params![id], |row| row.get(0))
        .expect("query should succeed")
}

#[test]
fn roster_ingest_filters_and_canonicalizes() {
    let mut conn = store::open_in_memory().expect("db");
    let entries = parse_roster_json(&read_fixture("sleeper_players.json")).expect("roster");
    let summary = ingest_roster(&mut conn, &entries, &["232".to_string()]).expect("ingest");

    assert_eq!(summary.created, 10);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.skipped_position, 2);
    assert_eq!(summary.skipped_id, 1);
    assert_eq!(summary.rotowire_conflicts, 1);
    assert_eq!(store::count_rows(&conn, "players").expect("count"), 10);

    let players = store::load_players(&conn).expect("load");
    let walker = players
        .iter()
        .find(|p| p.identifier == "8151")
        .expect("walker");
    assert_eq!(walker.canonical_name, "Kenneth Walker");
    assert_eq!(walker.status, PlayerStatus::Active);
    let swift = players.iter().find(|p| p.identifier == "5000").expect("swift");
    assert_eq!(swift.canonical_name, "Dandre Swift");
    assert!(players.iter().all(|p| p.identifier != "232"));

    // First holder of a rotowire id keeps it.
    let rotowire = |id: &str| {
        text_column(&conn, "SELECT rotowire_id FROM players WHERE player_id = ?1", id)
    };
    assert_eq!(rotowire("5000").as_deref(), Some("14000"));
    assert_eq!(rotowire("8151"), None);

    let run = store::latest_run(&conn, "roster").expect("q").expect("run");
    assert_eq!(run.status, "ok");
    assert_eq!(run.upserted, 10);
}

#[test]
fn roster_updates_keep_values_the_feed_omits() {
    let mut conn = seeded_db();
    let update = parse_roster_json(
        r#"{"100": {"position": "WR", "team": null, "status": "Inactive"},
            "4984": {"full_name": "Josh Allen", "position": "QB"}}"#,
    )
    .expect("update json");
    let summary = ingest_roster(&mut conn, &update, &[]).expect("update");
    assert_eq!(summary.updated, 2);
    assert_eq!(summary.created, 0);

    let players = store::load_players(&conn).expect("load");
    let jefferson = players.iter().find(|p| p.identifier == "100").expect("100");
    assert_eq!(jefferson.canonical_name, "Justin Jefferson");
    assert_eq!(jefferson.team, None);
    assert_eq!(jefferson.status, PlayerStatus::Inactive);

    let allen = players.iter().find(|p| p.identifier == "4984").expect("4984");
    assert_eq!(allen.team.as_deref(), Some("BUF"));
    assert_eq!(allen.status, PlayerStatus::Active);
    let weight: Option<i64> = conn
        .query_row("SELECT weight FROM players WHERE player_id = '100'", [], |row| row.get(0))
        .expect("weight");
    assert_eq!(weight, Some(195));
}

#[test]
fn ktc_fixture_end_to_end() {
    let mut conn = seeded_db();
    let records = consolidate(parse_ktc_page(
        &read_fixture("ktc_page.html"),
        KtcFormat::DynastySuperflex,
    ));
    let pipeline = IngestionPipeline::new(SourceTag::Ktc, ExceptionTable::builtin(SourceTag::Ktc));
    let summary = pipeline.run(&mut conn, &records).expect("ktc run");

    assert_eq!(summary.records_seen, 6);
    assert_eq!(summary.upserted, 4);
    assert_eq!(summary.not_matched, 2);
    assert_eq!(summary.ambiguous, 1);

    let ambiguous = summary
        .unmatched
        .iter()
        .find(|u| u.reason == UnmatchedReason::Ambiguous)
        .expect("mike williams");
    assert_eq!(ambiguous.raw_name, "Mike Williams");
    assert_eq!(ambiguous.candidates, vec!["200", "201"]);

    let (value, rank, rookie): (Option<i64>, Option<String>, bool) = conn
        .query_row(
            "SELECT ktc_sf_value, ktc_sf_position_rank, rookie FROM ktc_values WHERE player_id = '11612'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .expect("cam ward row");
    assert_eq!(value, Some(5500));
    assert_eq!(rank.as_deref(), Some("QB14"));
    assert!(rookie);
    assert_eq!(store::count_rows(&conn, "ktc_values").expect("count"), 4);
}

#[test]
fn rerunning_a_source_overwrites_rows() {
    let mut conn = seeded_db();
    let html = read_fixture("ktc_page.html");
    let pipeline = IngestionPipeline::new(SourceTag::Ktc, ExceptionTable::builtin(SourceTag::Ktc));

    let superflex = consolidate(parse_ktc_page(&html, KtcFormat::DynastySuperflex));
    pipeline.run(&mut conn, &superflex).expect("first run");
    let one_qb = consolidate(parse_ktc_page(&html, KtcFormat::Dynasty1Qb));
    pipeline.run(&mut conn, &one_qb).expect("second run");

    let (sf, one): (Option<i64>, Option<i64>) = conn
        .query_row(
            "SELECT ktc_sf_value, ktc_1qb_value FROM ktc_values WHERE player_id = '4984'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("josh allen row");
    assert_eq!(sf, None, "replace-on-conflict drops the previous run's columns");
    assert_eq!(one, Some(9999));
    assert_eq!(store::count_rows(&conn, "ktc_values").expect("count"), 4);
}

#[test]
fn ktc_spellings_of_one_player_share_a_row() {
    let mut conn = seeded_db();
    let entry = |raw_name: &str, format, value, rank: &str| KtcEntry {
        raw_name: raw_name.to_string(),
        position: Position::Rb,
        position_rank: rank.to_string(),
        team: TeamTag::Team("SEA".to_string()),
        value,
        age: None,
        format,
    };
    let records = consolidate([
        entry("Ken Walker", KtcFormat::DynastySuperflex, 5000, "RB9"),
        entry("Kenneth Walker III", KtcFormat::Redraft1Qb, 4000, "RB12"),
    ]);
    assert_eq!(records.len(), 2);

    let pipeline = IngestionPipeline::new(SourceTag::Ktc, ExceptionTable::builtin(SourceTag::Ktc));
    let summary = pipeline.run(&mut conn, &records).expect("ktc run");
    assert_eq!(summary.upserted, 2);
    assert_eq!(summary.merged, 1);

    let (sf, redraft): (Option<i64>, Option<i64>) = conn
        .query_row(
            "SELECT ktc_sf_value, ktc_1qb_redraft_value FROM ktc_values WHERE player_id = '8151'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("walker row");
    assert_eq!(sf, Some(5000));
    assert_eq!(redraft, Some(4000));
    assert_eq!(store::count_rows(&conn, "ktc_values").expect("count"), 1);
}

#[test]
fn fantasypros_fixture_end_to_end() {
    let mut conn = seeded_db();
    let records = parse_fpros_page(&read_fixture("fpros_qb.html"), Position::Qb);
    let pipeline = IngestionPipeline::new(
        SourceTag::FantasyPros,
        ExceptionTable::builtin(SourceTag::FantasyPros),
    )
    .prefer_active(true);
    let summary = pipeline.run(&mut conn, &records).expect("fpros run");

    assert_eq!(summary.upserted, 2);
    assert_eq!(summary.not_matched, 1);
    assert_eq!(summary.unmatched[0].raw_name, "Lamar Jackson");
    assert_eq!(summary.unmatched[0].reason, UnmatchedReason::Unresolved);

    let points: Option<f64> = conn
        .query_row(
            "SELECT fantasy_points FROM fpros_projections WHERE player_id = '4984'",
            [],
            |row| row.get(0),
        )
        .expect("allen projection");
    assert_eq!(points, Some(378.4));
}

#[test]
fn clay_fixture_end_to_end() {
    let mut conn = seeded_db();
    let records = parse_report(&read_fixture("clay_report.txt"));
    let pipeline = IngestionPipeline::new(SourceTag::Clay, ExceptionTable::builtin(SourceTag::Clay));
    let summary = pipeline.run(&mut conn, &records).expect("clay run");

    assert_eq!(summary.records_seen, 10);
    assert_eq!(summary.upserted, 8);
    assert_eq!(summary.not_matched, 2);
    assert_eq!(summary.ambiguous, 0);

    // RB label in the report, FB on the roster.
    let ham = text_column(
        &conn,
        "SELECT player_name FROM clay_projections WHERE player_id = ?1",
        "3832",
    );
    assert_eq!(ham.as_deref(), Some("C.J. Ham"));
    // Team breaks the Mike Williams tie.
    let williams = text_column(
        &conn,
        "SELECT team FROM clay_projections WHERE player_id = ?1",
        "200",
    );
    assert_eq!(williams.as_deref(), Some("PIT"));
}

#[test]
fn sleeper_projections_key_on_identifier() {
    let mut conn = seeded_db();
    let raw = read_fixture("sleeper_projection.json");
    let known = parse_projection_json(&raw, "4984", 2025)
        .expect("parse")
        .expect("projection");
    let unknown = parse_projection_json(&raw, "99999", 2025)
        .expect("parse")
        .expect("projection");
    let pipeline = IngestionPipeline::new(SourceTag::SleeperProjections, ExceptionTable::empty());
    let summary = pipeline
        .run(&mut conn, &[known.clone(), unknown])
        .expect("projection run");
    assert_eq!(summary.upserted, 1);
    assert_eq!(summary.not_matched, 1);

    // Same player, same season: still one row.
    pipeline.run(&mut conn, &[known]).expect("rerun");
    assert_eq!(store::count_rows(&conn, "sleeper_projections").expect("count"), 1);
}

#[test]
fn weekly_projections_write_one_row_per_week() {
    let mut conn = seeded_db();
    let raw = read_fixture("sleeper_weekly.json");
    let weeks = parse_weekly_json(&raw, "4984", 2025, None).expect("parse");
    assert_eq!(weeks.len(), 3);

    let pipeline = IngestionPipeline::new(
        SourceTag::SleeperWeeklyProjections,
        ExceptionTable::builtin(SourceTag::SleeperWeeklyProjections),
    );
    let summary = pipeline.run(&mut conn, &weeks).expect("weekly run");
    assert_eq!(summary.upserted, 3);
    assert_eq!(summary.merged, 0);
    assert_eq!(store::count_rows(&conn, "sleeper_weekly_projections").expect("count"), 3);

    let (team, opponent, date, points): (Option<String>, Option<String>, Option<String>, Option<f64>) = conn
        .query_row(
            "SELECT team, opponent, projection_date, pts_ppr FROM sleeper_weekly_projections
             WHERE player_id = '4984' AND season = 2025 AND week = 2",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .expect("week 2 row");
    assert_eq!(team.as_deref(), Some("BUF"));
    assert_eq!(opponent.as_deref(), Some("NYJ"));
    assert_eq!(date.as_deref(), Some("2025-09-14"));
    assert_eq!(points, Some(22.9));

    // Re-running one week replaces that row only.
    let week_two = parse_weekly_json(&raw, "4984", 2025, Some(2)).expect("parse");
    assert_eq!(week_two.len(), 1);
    pipeline.run(&mut conn, &week_two).expect("single week run");
    assert_eq!(store::count_rows(&conn, "sleeper_weekly_projections").expect("count"), 3);

    let unknown = parse_weekly_json(&raw, "99999", 2025, Some(1)).expect("parse");
    let summary = pipeline.run(&mut conn, &unknown).expect("unknown player run");
    assert_eq!(summary.not_matched, 1);
    assert_eq!(store::count_rows(&conn, "sleeper_weekly_projections").expect("count"), 3);
}

#[test]
fn storage_failure_rolls_back_the_whole_run() {
    let mut conn = seeded_db();
    conn.execute_batch(
        "CREATE TRIGGER reject_swift BEFORE INSERT ON clay_projections
         WHEN NEW.player_id = '5000'
         BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
    )
    .expect("trigger");
    let records = parse_report(&read_fixture("clay_report.txt"));
    let pipeline = IngestionPipeline::new(SourceTag::Clay, ExceptionTable::builtin(SourceTag::Clay));
    let err = pipeline
        .run(&mut conn, &records)
        .expect_err("write should fail");
    assert!(err.is_storage());
    assert_eq!(store::count_rows(&conn, "clay_projections").expect("count"), 0);
    let run = store::latest_run(&conn, "clay").expect("q").expect("run");
    assert_eq!(run.status, "failed");
    assert_eq!(run.upserted, 0);
}

#[test]
fn active_players_feed_the_projection_fetch() {
    let conn = seeded_db();
    let ids = store::active_player_ids(&conn, &[Position::Qb, Position::Rb, Position::Wr, Position::Te])
        .expect("ids");
    assert!(ids.contains(&"4984".to_string()));
    assert!(!ids.contains(&"201".to_string()), "inactive");
    assert!(!ids.contains(&"3832".to_string()), "fullback");
}
