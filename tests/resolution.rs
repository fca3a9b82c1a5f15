use ff_ingest::exceptions::{ExceptionTable, SourceTag};
use ff_ingest::identity_index::IdentityIndex;
use ff_ingest::name_canon::canonicalize;
use ff_ingest::player::{PlayerRecord, PlayerStatus};
use ff_ingest::position::Position;
use ff_ingest::resolver::{PlayerResolver, ResolutionOutcome, Strategy, resolve};

fn player(id: &str, name: &str, position: Position) -> PlayerRecord {
    PlayerRecord::new(id, canonicalize(name))
        .with_position(position)
        .with_fantasy_positions([position])
        .with_status(PlayerStatus::Active)
}

fn resolved(id: &str) -> ResolutionOutcome {
    ResolutionOutcome::Resolved(id.to_string())
}

#[test]
fn canonicalization_is_idempotent() {
    let samples = [
        "Kenneth Walker III",
        "Ken Walker III",
        "D'Andre Swift",
        "Amon-Ra St. Brown",
        "J.J. McCarthy",
        "JJ McCarthy",
        "Marvin Harrison Jr.",
        "  odell   BECKHAM jr  ",
        "Jaxon Smith-Njigba",
        "De'Von Achane",
        "Michael Pittman Jr",
        "T.J. Hockenson",
        "Hollywood Brown",
        "Jr.",
        "...",
        "",
    ];
    for raw in samples {
        let once = canonicalize(raw);
        assert_eq!(canonicalize(&once), once, "not a fixed point for {raw:?}");
    }
}

#[test]
fn suffix_and_punctuation_examples() {
    assert_eq!(canonicalize("Kenneth Walker III"), "Kenneth Walker");
    assert_eq!(canonicalize("D'Andre Swift"), "Dandre Swift");
    assert_eq!(canonicalize("Amon-Ra St. Brown"), "Amon Ra St Brown");
}

#[test]
fn exception_wins_over_a_unique_index_match() {
    let index = IdentityIndex::build([player("999", "Josh Allen", Position::Qb)]);
    let exceptions = ExceptionTable::builtin(SourceTag::Ktc);
    assert_eq!(
        resolve("Josh Allen", "QB", None, &index, &exceptions),
        resolved("4984")
    );
    assert_eq!(
        resolve("Josh Allen", "QB", None, &index, &ExceptionTable::empty()),
        resolved("999")
    );
}

#[test]
fn same_name_same_position_is_ambiguous() {
    let index = IdentityIndex::build([
        player("201", "Mike Williams", Position::Wr),
        player("200", "Mike Williams", Position::Wr),
    ]);
    let outcome = resolve("Mike Williams", "WR", None, &index, &ExceptionTable::empty());
    assert_eq!(
        outcome,
        ResolutionOutcome::Ambiguous(vec!["200".to_string(), "201".to_string()])
    );
}

#[test]
fn fullback_only_found_when_no_running_back_matches() {
    let exceptions = ExceptionTable::empty();
    let fb_only = IdentityIndex::build([player("3832", "C.J. Ham", Position::Fb)]);
    let resolver = PlayerResolver::new(&fb_only, &exceptions);
    let report = resolver.resolve_report("C.J. Ham", "RB", None);
    assert_eq!(report.outcome, resolved("3832"));
    assert_eq!(report.strategy, Some(Strategy::PositionGroup));

    let both = IdentityIndex::build([
        player("3832", "Pat Smith", Position::Fb),
        player("4000", "Pat Smith", Position::Rb),
    ]);
    let resolver = PlayerResolver::new(&both, &exceptions);
    let report = resolver.resolve_report("Pat Smith", "RB", None);
    assert_eq!(report.outcome, resolved("4000"));
    assert_eq!(report.strategy, Some(Strategy::Primary));

    // Only a running-back label widens to fullbacks.
    assert_eq!(
        resolver.resolve("Pat Smith", "WR", None),
        ResolutionOutcome::Unresolved
    );
}

#[test]
fn ambiguity_stops_weaker_strategies() {
    let index = IdentityIndex::build([
        player("10", "Alex Jones", Position::Rb),
        player("11", "Alex Jones", Position::Rb),
        player("12", "Alex Jones", Position::Fb),
    ]);
    let exceptions = ExceptionTable::empty();
    let report = PlayerResolver::new(&index, &exceptions).resolve_report("Alex Jones", "RB", None);
    assert_eq!(
        report.outcome,
        ResolutionOutcome::Ambiguous(vec!["10".to_string(), "11".to_string()])
    );
    assert_eq!(report.strategy, Some(Strategy::Primary));
}

#[test]
fn position_collision_is_not_resolved_by_name_alone() {
    let index = IdentityIndex::build([
        player("4984", "Josh Allen", Position::Qb),
        player("4985", "Josh Allen", Position::Other),
    ]);
    let exceptions = ExceptionTable::empty();
    let resolver = PlayerResolver::new(&index, &exceptions);
    assert_eq!(resolver.resolve("Josh Allen", "QB", None), resolved("4984"));
    let report = resolver.resolve_report("Josh Allen", "TE", None);
    assert_eq!(report.outcome, ResolutionOutcome::Unresolved);
    assert_eq!(report.name_only_candidates, vec!["4984", "4985"]);
}

#[test]
fn other_position_never_matches_position_steps() {
    let index = IdentityIndex::build([player("7", "Taysom Hill", Position::Other)]);
    let exceptions = ExceptionTable::empty();
    let report = PlayerResolver::new(&index, &exceptions).resolve_report("Taysom Hill", "K", None);
    // The name is unique, so the last-resort step still finds him.
    assert_eq!(report.outcome, resolved("7"));
    assert_eq!(report.strategy, Some(Strategy::NameOnly));
}

#[test]
fn unknown_and_empty_names_are_unresolved() {
    let index = IdentityIndex::build([player("100", "Justin Jefferson", Position::Wr)]);
    let exceptions = ExceptionTable::empty();
    assert_eq!(
        resolve("Nobody Here", "WR", None, &index, &exceptions),
        ResolutionOutcome::Unresolved
    );
    assert_eq!(
        resolve("  Jr. ", "WR", None, &index, &exceptions),
        ResolutionOutcome::Unresolved
    );
}

#[test]
fn jefferson_scenario() {
    let index = IdentityIndex::build([player("100", "Justin Jefferson", Position::Wr)]);
    assert_eq!(
        resolve(
            "Justin Jefferson",
            "WR",
            Some("MIN"),
            &index,
            &ExceptionTable::empty()
        ),
        resolved("100")
    );
}

#[test]
fn source_spellings_converge_on_one_player() {
    let index = IdentityIndex::build([
        player("8151", "Kenneth Walker III", Position::Rb),
        player("7547", "Amon-Ra St. Brown", Position::Wr),
        player("5000", "D'Andre Swift", Position::Rb),
    ]);
    let exceptions = ExceptionTable::empty();
    let resolver = PlayerResolver::new(&index, &exceptions);
    for raw in ["Ken Walker", "Kenneth Walker", "KENNETH WALKER III", "Ken Walker III"] {
        assert_eq!(resolver.resolve(raw, "rb", None), resolved("8151"), "{raw}");
    }
    assert_eq!(resolver.resolve("Amon-Ra St.Brown", "WR", None), ResolutionOutcome::Unresolved);
    assert_eq!(resolver.resolve("Amon Ra St Brown", " wr ", None), resolved("7547"));
    assert_eq!(resolver.resolve("DAndre Swift", "RB", Some("CHI")), resolved("5000"));
}
