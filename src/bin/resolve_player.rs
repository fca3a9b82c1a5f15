use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use ff_ingest::config::IngestConfig;
use ff_ingest::exceptions::{ExceptionTable, SourceTag};
use ff_ingest::identity_index::IdentityIndex;
use ff_ingest::resolver::{PlayerResolver, ResolutionOutcome};
use ff_ingest::store;

// Looks a single source spelling up against the stored roster, to check a
// name before adding an exception entry.
fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let positional = positional_args(&args);
    let [name, position, rest @ ..] = positional.as_slice() else {
        return Err(anyhow!(
            "usage: resolve_player NAME POSITION [TEAM] [--db PATH] [--source ktc|fantasy_pros|clay]"
        ));
    };
    let team = rest.first().map(String::as_str);

    let cfg = IngestConfig::from_env();
    let db_path = db_path_for(&args, &cfg).context("unable to resolve sqlite path")?;
    let source = match flag_value(&args, "--source") {
        Some(raw) => Some(SourceTag::from_key(&raw).with_context(|| format!("unknown source {raw:?}"))?),
        None => None,
    };

    let conn = store::open_db(&db_path)?;
    let index = IdentityIndex::build(store::load_players(&conn)?);
    let exceptions = match source {
        Some(tag) => ExceptionTable::for_source(tag, cfg.exceptions_path.as_deref())?,
        None => ExceptionTable::empty(),
    };
    let resolver = PlayerResolver::new(&index, &exceptions)
        .prefer_active(source == Some(SourceTag::FantasyPros));

    let report = resolver.resolve_report(name, position, team);
    println!("DB: {} ({} players)", db_path.display(), index.player_count());
    println!("Canonical: {:?} {}", report.canonical_name, report.position);
    match &report.outcome {
        ResolutionOutcome::Resolved(id) => println!("Resolved: {id}"),
        ResolutionOutcome::Ambiguous(ids) => println!("Ambiguous: {}", ids.join(", ")),
        ResolutionOutcome::Unresolved => println!("Unresolved"),
    }
    if let Some(strategy) = report.strategy {
        println!("Strategy: {}", strategy.label());
    }
    if !report.name_only_candidates.is_empty() {
        println!(
            "Same name, no position match: {}",
            report.name_only_candidates.join(", ")
        );
    }
    for player in index.candidates(&report.canonical_name) {
        println!(
            " - {} {} {} {:?}",
            player.identifier,
            player.position.map(|p| p.as_str()).unwrap_or("-"),
            player.team.as_deref().unwrap_or("-"),
            player.status
        );
    }
    Ok(())
}

fn db_path_for(args: &[String], cfg: &IngestConfig) -> Option<PathBuf> {
    flag_value(args, "--db")
        .map(PathBuf::from)
        .or_else(|| cfg.db_path.clone())
}

fn positional_args(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
        } else if arg == "--db" || arg == "--source" {
            skip_next = true;
        } else if !arg.starts_with("--") {
            out.push(arg.clone());
        }
    }
    out
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix)
            && !value.trim().is_empty()
        {
            return Some(value.trim().to_string());
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}
