use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Raw spelling (matched case-insensitively) -> canonical name. Used where the
/// generic rules would produce the wrong join key: nicknames, reordered or
/// shortened first names, and initials that should stay upper-case.
const NAME_CORRECTIONS: &[(&str, &str)] = &[
    ("Ken Walker III", "Kenneth Walker"),
    ("Ken Walker", "Kenneth Walker"),
    ("Marquise Brown", "Hollywood Brown"),
    ("Gabriel Davis", "Gabe Davis"),
    ("Josh Palmer", "Joshua Palmer"),
    ("D'Wayne Eskridge", "Dee Eskridge"),
    ("Andrew Ogletree", "Drew Ogletree"),
    ("Cam Ward", "Cameron Ward"),
    ("Kyle T Williams", "Kyle Williams"),
    ("Kyle T. Williams", "Kyle Williams"),
    ("Chigoziem Okonkwo", "Chig Okonkwo"),
    ("Jeffery Wilson", "Jeff Wilson"),
    ("J.J. McCarthy", "JJ McCarthy"),
    ("C.J. Stroud", "CJ Stroud"),
    ("De'Von Achane", "Devon Achane"),
    ("D'Andre Swift", "Dandre Swift"),
    ("Ja'Marr Chase", "Jamarr Chase"),
    ("A.J. Brown", "AJ Brown"),
    ("D.J. Moore", "DJ Moore"),
    ("DK Metcalf", "DK Metcalf"),
    ("Amon-Ra St. Brown", "Amon Ra St Brown"),
    ("Jaxon Smith-Njigba", "Jaxon Smith Njigba"),
];

const GENERATIONAL_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "v"];

// Keys are lower-cased. Every canonical value is also registered as its own key
// so canonical output never gets re-cased by the generic rules.
static CORRECTIONS: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::with_capacity(NAME_CORRECTIONS.len() * 2);
    for (_, canonical) in NAME_CORRECTIONS {
        map.insert(canonical.to_lowercase(), *canonical);
    }
    for (raw, canonical) in NAME_CORRECTIONS {
        map.insert(raw.to_lowercase(), *canonical);
    }
    map
});

/// Maps a player name as spelled by any source to the single spelling used as
/// the join key across sources.
///
/// Returns an empty string when nothing name-like is left (empty input, a bare
/// suffix, punctuation only). Callers must treat that as a resolution failure.
pub fn canonicalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if let Some(canonical) = correction_for(trimmed) {
        return canonical.to_string();
    }

    let generic = apply_generic_rules(trimmed);
    match correction_for(&generic) {
        Some(canonical) => canonical.to_string(),
        None => generic,
    }
}

/// `canonicalize` for optional inputs; `None` canonicalizes to an empty string.
pub fn canonicalize_opt(raw: Option<&str>) -> String {
    raw.map(canonicalize).unwrap_or_default()
}

pub fn is_generational_suffix(token: &str) -> bool {
    let bare: String = token
        .chars()
        .filter(|c| !matches!(c, '.' | ','))
        .flat_map(char::to_lowercase)
        .collect();
    GENERATIONAL_SUFFIXES.contains(&bare.as_str())
}

fn correction_for(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        return None;
    }
    CORRECTIONS.get(&name.to_lowercase()).copied()
}

fn apply_generic_rules(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '.' | '\'' | '\u{2019}' => {}
            '-' => cleaned.push(' '),
            _ => cleaned.extend(ch.to_lowercase()),
        }
    }

    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    if tokens
        .last()
        .is_some_and(|last| GENERATIONAL_SUFFIXES.contains(last))
    {
        tokens.pop();
    }

    tokens
        .iter()
        .map(|token| capitalize(token))
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut out = String::with_capacity(token.len());
    out.extend(first.to_uppercase());
    for ch in chars {
        out.extend(ch.to_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_one_trailing_suffix() {
        assert_eq!(canonicalize("Kenneth Walker III"), "Kenneth Walker");
        assert_eq!(canonicalize("Brian Thomas Jr."), "Brian Thomas");
        assert_eq!(canonicalize("Michael Pittman Jr"), "Michael Pittman");
        assert_eq!(canonicalize("Marvin Harrison SR."), "Marvin Harrison");
        assert_eq!(canonicalize("Patrick Mahomes II"), "Patrick Mahomes");
        assert_eq!(canonicalize("Tony Jones IV"), "Tony Jones");
    }

    #[test]
    fn suffix_letters_inside_a_token_are_kept() {
        assert_eq!(canonicalize("Marv Jones"), "Marv Jones");
        assert_eq!(canonicalize("Travis Etienne"), "Travis Etienne");
    }

    #[test]
    fn punctuation_rules() {
        assert_eq!(canonicalize("D'Andre Swift"), "Dandre Swift");
        assert_eq!(canonicalize("Amon-Ra St. Brown"), "Amon Ra St Brown");
        assert_eq!(canonicalize("T.J. Hockenson"), "Tj Hockenson");
        assert_eq!(canonicalize("Tre'Quan Smith"), "Trequan Smith");
        assert_eq!(canonicalize("  justin   JEFFERSON "), "Justin Jefferson");
    }

    #[test]
    fn correction_table_wins_and_is_case_insensitive() {
        assert_eq!(canonicalize("ken walker iii"), "Kenneth Walker");
        assert_eq!(canonicalize("J.J. McCarthy"), "JJ McCarthy");
        assert_eq!(canonicalize("JJ McCarthy"), "JJ McCarthy");
        assert_eq!(canonicalize("Marquise Brown"), "Hollywood Brown");
    }

    #[test]
    fn empty_results() {
        assert_eq!(canonicalize(""), "");
        assert_eq!(canonicalize("   "), "");
        assert_eq!(canonicalize("Jr."), "");
        assert_eq!(canonicalize("..."), "");
        assert_eq!(canonicalize("' - '"), "");
        assert_eq!(canonicalize_opt(None), "");
    }

    #[test]
    fn canonical_output_is_a_fixed_point() {
        let inputs = [
            "Kenneth Walker III",
            "D'Andre Swift",
            "Amon-Ra St. Brown",
            "Ken-Walker",
            "C.J. Stroud",
            "DK Metcalf",
            "CeeDee Lamb",
            "Christian McCaffrey",
            "Smith-Jr",
            "J.R. Smith J.R.",
            "Odell Beckham Jr.",
            "Jaxon Smith-Njigba",
            "Jr.",
            "",
        ];
        for input in inputs {
            let once = canonicalize(input);
            assert_eq!(canonicalize(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn suffix_detection_ignores_periods() {
        assert!(is_generational_suffix("Jr."));
        assert!(is_generational_suffix("III"));
        assert!(!is_generational_suffix("BUF"));
    }
}
