use std::fs;
use std::path::PathBuf;

use ff_ingest::clay::parse_report;
use ff_ingest::fpros::parse_fpros_page;
use ff_ingest::ktc::{KtcFormat, TeamTag, consolidate, parse_ktc_page};
use ff_ingest::position::Position;
use ff_ingest::roster::parse_roster_json;
use ff_ingest::sleeper_proj::parse_projection_json;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_ktc_ranking_fixture() {
    let raw = read_fixture("ktc_page.html");
    let rows = parse_ktc_page(&raw, KtcFormat::DynastySuperflex);
    assert_eq!(rows.len(), 6, "draft pick row should be dropped");

    assert_eq!(rows[0].raw_name, "Josh Allen");
    assert_eq!(rows[0].team, TeamTag::Team("BUF".into()));
    assert_eq!(rows[0].position, Position::Qb);
    assert_eq!(rows[0].position_rank, "QB1");
    assert_eq!(rows[0].value, 9999);
    assert_eq!(rows[0].age, Some(29.4));

    assert_eq!(rows[2].raw_name, "Kenneth Walker III");
    assert_eq!(rows[2].team, TeamTag::Team("SEA".into()));
    assert_eq!(rows[2].age, None);

    assert_eq!(rows[3].raw_name, "Cam Ward");
    assert_eq!(rows[3].team, TeamTag::Rookie("TEN".into()));
    assert_eq!(rows[4].team, TeamTag::FreeAgent);
    assert_eq!(rows[5].team, TeamTag::RookieFreeAgent);
    assert_eq!(rows[5].position, Position::Te);
}

#[test]
fn ktc_streams_consolidate_per_player() {
    let raw = read_fixture("ktc_page.html");
    let mut entries = parse_ktc_page(&raw, KtcFormat::Dynasty1Qb);
    entries.extend(parse_ktc_page(&raw, KtcFormat::RedraftSuperflex));
    let records = consolidate(entries);
    assert_eq!(records.len(), 6);
    let ward = records
        .iter()
        .find(|r| r.raw_name == "Cam Ward")
        .expect("cam ward");
    assert!(ward.rookie);
    assert_eq!(ward.team.as_deref(), Some("TEN"));
    assert_eq!(ward.value(KtcFormat::Dynasty1Qb), Some((5500, "QB14")));
    assert_eq!(ward.value(KtcFormat::RedraftSuperflex), Some((5500, "QB14")));
    assert_eq!(ward.value(KtcFormat::DynastySuperflex), None);
}

#[test]
fn parses_fantasypros_fixture() {
    let raw = read_fixture("fpros_qb.html");
    let rows = parse_fpros_page(&raw, Position::Qb);
    assert_eq!(rows.len(), 3);
    let allen = &rows[0];
    assert_eq!(allen.raw_name, "Josh Allen");
    assert_eq!(allen.team.as_deref(), Some("BUF"));
    assert_eq!(allen.pass_attempts, Some(545.2));
    assert_eq!(allen.pass_yards, Some(4025.3));
    assert_eq!(allen.interceptions, Some(11.8));
    assert_eq!(allen.fumbles_lost, Some(2.9));
    assert_eq!(allen.fantasy_points, Some(378.4));
    assert_eq!(allen.receptions, None);
    assert_eq!(rows[2].raw_name, "Cam Ward");
}

#[test]
fn fantasypros_page_without_table_is_empty() {
    assert!(parse_fpros_page("<html><body>maintenance</body></html>", Position::Wr).is_empty());
}

#[test]
fn parses_clay_report_fixture() {
    let raw = read_fixture("clay_report.txt");
    let rows = parse_report(&raw);
    assert_eq!(rows.len(), 10);

    let qbs: Vec<_> = rows.iter().filter(|r| r.position == Some(Position::Qb)).collect();
    assert_eq!(qbs.len(), 3);
    assert_eq!(qbs[0].raw_name, "Josh Allen");
    assert_eq!(qbs[0].pass_yds, Some(4010));

    let walker = rows
        .iter()
        .find(|r| r.raw_name == "Kenneth Walker III")
        .expect("walker row");
    assert_eq!(walker.team, "SEA");
    assert_eq!(walker.games, 15);
    assert_eq!(walker.car_pct, Some(55.0));

    let swift = rows.iter().find(|r| r.raw_name == "D'Andre Swift");
    assert!(swift.is_some());

    let te = rows
        .iter()
        .find(|r| r.position == Some(Position::Te))
        .expect("te row");
    assert_eq!(te.raw_name, "Trey McBride");
    assert_eq!(te.targ_pct, Some(24.0));
}

#[test]
fn parses_sleeper_roster_fixture() {
    let raw = read_fixture("sleeper_players.json");
    let entries = parse_roster_json(&raw).expect("fixture should parse");
    assert_eq!(entries.len(), 13);
    // Ordered by identifier string.
    assert_eq!(entries[0].player_id, "100");
    let jefferson = &entries[0].player;
    assert_eq!(jefferson.full_name.as_deref(), Some("Justin Jefferson"));
    assert_eq!(jefferson.team, Some(Some("MIN".to_string())));
    let free_agent = entries
        .iter()
        .find(|e| e.player_id == "201")
        .expect("201");
    assert_eq!(free_agent.player.team, Some(None));
}

#[test]
fn parses_sleeper_projection_fixture() {
    let raw = read_fixture("sleeper_projection.json");
    let proj = parse_projection_json(&raw, "4984", 2025)
        .expect("fixture should parse")
        .expect("projection present");
    assert_eq!(proj.team.as_deref(), Some("BUF"));
    assert_eq!(proj.position.as_deref(), Some("QB"));
    assert_eq!(proj.stats.gp, Some(17.0));
    assert_eq!(proj.stats.pass_td, Some(29.1));
    assert_eq!(proj.stats.rec, None);
}
