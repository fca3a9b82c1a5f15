use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use ff_ingest::config::IngestConfig;
use ff_ingest::exceptions::{ExceptionTable, SourceTag};
use ff_ingest::ingest::{IngestSummary, IngestionPipeline};
use ff_ingest::position::Position;
use ff_ingest::config::parse_week;
use ff_ingest::{clay, fpros, ktc, roster, sleeper_proj, sleeper_weekly, store};

const USAGE: &str = "usage: ff_ingest <roster|ktc|fpros|clay|sleeper|sleeper-weekly|status> [--db PATH] [--season YEAR] [--week N] [--text PATH]";
const VALUE_FLAGS: [&str; 4] = ["--db", "--season", "--week", "--text"];
const PROJECTED_POSITIONS: [Position; 4] = [Position::Qb, Position::Rb, Position::Wr, Position::Te];

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut cfg = IngestConfig::from_env();
    if let Some(path) = flag_value(&args, "--db") {
        cfg.db_path = Some(PathBuf::from(path));
    }
    if let Some(raw) = flag_value(&args, "--season") {
        cfg.season = raw
            .parse::<i32>()
            .with_context(|| format!("invalid --season {raw:?}"))?;
    }
    if let Some(raw) = flag_value(&args, "--week") {
        let week = parse_week(&raw).with_context(|| format!("invalid --week {raw:?}"))?;
        cfg.sleeper_week = Some(week);
    }
    if let Some(path) = flag_value(&args, "--text") {
        cfg.clay_text_path = Some(PathBuf::from(path));
    }
    let command = command_arg(&args).ok_or_else(|| anyhow!(USAGE))?;

    let db_path = cfg.db_path.clone().context("unable to resolve sqlite path")?;
    let mut conn = store::open_db(&db_path)?;
    println!("DB: {}", db_path.display());

    match command.as_str() {
        "roster" => {
            let entries = roster::fetch_roster()?;
            let summary = roster::ingest_roster(&mut conn, &entries, &cfg.roster_skip_ids)?;
            println!("Roster ingest complete");
            println!("Entries in feed: {}", entries.len());
            println!("Created: {}", summary.created);
            println!("Updated: {}", summary.updated);
            println!("Skipped (position): {}", summary.skipped_position);
            println!("Skipped (configured id): {}", summary.skipped_id);
            if summary.rotowire_conflicts > 0 {
                println!("Rotowire id conflicts: {}", summary.rotowire_conflicts);
            }
        }
        "ktc" => {
            let records = ktc::fetch_ktc(ktc::KtcFetchOptions {
                max_pages: cfg.ktc_max_pages,
                include_redraft: cfg.ktc_include_redraft,
                delay: Duration::from_millis(cfg.request_delay_ms),
                parallelism: cfg.fetch_parallelism,
            })?;
            let summary = pipeline(&cfg, SourceTag::Ktc)?.run(&mut conn, &records)?;
            print_summary(&summary);
        }
        "fpros" => {
            let records = fpros::fetch_fpros(Duration::from_millis(cfg.request_delay_ms))?;
            if records.is_empty() {
                return Err(anyhow!("no projections extracted from fantasypros"));
            }
            let summary = pipeline(&cfg, SourceTag::FantasyPros)?
                .prefer_active(true)
                .run(&mut conn, &records)?;
            print_summary(&summary);
        }
        "clay" => {
            let path = cfg
                .clay_text_path
                .clone()
                .context("clay needs --text PATH or FF_CLAY_TEXT_PATH")?;
            let records = clay::load_report(&path)?;
            if records.is_empty() {
                return Err(anyhow!("no projections found in {}", path.display()));
            }
            let summary = pipeline(&cfg, SourceTag::Clay)?.run(&mut conn, &records)?;
            print_summary(&summary);
        }
        "sleeper" => {
            let ids = store::active_player_ids(&conn, &PROJECTED_POSITIONS)?;
            if ids.is_empty() {
                println!("No active players; run `ff_ingest roster` first.");
                return Ok(());
            }
            println!("Fetching {} projections for {}", ids.len(), cfg.season);
            let records = sleeper_proj::fetch_projections(
                &ids,
                cfg.season,
                cfg.fetch_parallelism,
                Duration::from_millis(cfg.request_delay_ms),
            );
            let summary =
                pipeline(&cfg, SourceTag::SleeperProjections)?.run(&mut conn, &records)?;
            print_summary(&summary);
        }
        "sleeper-weekly" => {
            let ids = store::active_player_ids(&conn, &PROJECTED_POSITIONS)?;
            if ids.is_empty() {
                println!("No active players; run `ff_ingest roster` first.");
                return Ok(());
            }
            match cfg.sleeper_week {
                Some(week) => println!(
                    "Fetching week {week} projections for {} players ({})",
                    ids.len(),
                    cfg.season
                ),
                None => println!("Fetching weekly projections for {} players ({})", ids.len(), cfg.season),
            }
            let records = sleeper_weekly::fetch_weekly_projections(
                &ids,
                cfg.season,
                cfg.sleeper_week,
                cfg.fetch_parallelism,
                Duration::from_millis(cfg.request_delay_ms),
            );
            let summary = pipeline(&cfg, SourceTag::SleeperWeeklyProjections)?
                .run(&mut conn, &records)?;
            print_summary(&summary);
        }
        "status" => {
            for (source, table) in [
                ("roster", "players"),
                ("ktc", "ktc_values"),
                ("fantasy_pros", "fpros_projections"),
                ("clay", "clay_projections"),
                ("sleeper_projections", "sleeper_projections"),
                ("sleeper_weekly_projections", "sleeper_weekly_projections"),
            ] {
                let rows = store::count_rows(&conn, table)?;
                match store::latest_run(&conn, source)? {
                    Some(run) => println!(
                        "{source}: {rows} rows, last run #{} {} (upserted {}, not matched {})",
                        run.run_id, run.status, run.upserted, run.not_matched
                    ),
                    None => println!("{source}: {rows} rows, never run"),
                }
            }
        }
        other => return Err(anyhow!("unknown command {other:?}\n{USAGE}")),
    }

    Ok(())
}

fn pipeline(cfg: &IngestConfig, source: SourceTag) -> Result<IngestionPipeline> {
    let exceptions = ExceptionTable::for_source(source, cfg.exceptions_path.as_deref())?;
    Ok(IngestionPipeline::new(source, exceptions))
}

fn print_summary(summary: &IngestSummary) {
    println!("{} ingest complete (run #{})", summary.source, summary.run_id);
    println!("Records: {}", summary.records_seen);
    println!("Upserted: {}", summary.upserted);
    if summary.merged > 0 {
        println!("Merged into an earlier row: {}", summary.merged);
    }
    println!(
        "Not matched: {} ({} ambiguous)",
        summary.not_matched, summary.ambiguous
    );
    for unmatched in summary.unmatched.iter().take(12) {
        if unmatched.candidates.is_empty() {
            println!(" - {} {}", unmatched.raw_name, unmatched.position);
        } else {
            println!(
                " - {} {} -> {}",
                unmatched.raw_name,
                unmatched.position,
                unmatched.candidates.join(", ")
            );
        }
    }
    if summary.unmatched.len() > 12 {
        println!(" ... {} more in the run ledger", summary.unmatched.len() - 12);
    }
}

fn command_arg(args: &[String]) -> Option<String> {
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            skip_next = true;
            continue;
        }
        if !arg.starts_with("--") {
            return Some(arg.trim().to_ascii_lowercase());
        }
    }
    None
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}
