use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::name_canon::canonicalize;
use crate::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Ktc,
    FantasyPros,
    Clay,
    SleeperProjections,
    SleeperWeeklyProjections,
}

impl SourceTag {
    pub const ALL: [SourceTag; 5] = [
        SourceTag::Ktc,
        SourceTag::FantasyPros,
        SourceTag::Clay,
        SourceTag::SleeperProjections,
        SourceTag::SleeperWeeklyProjections,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SourceTag::Ktc => "ktc",
            SourceTag::FantasyPros => "fantasy_pros",
            SourceTag::Clay => "clay",
            SourceTag::SleeperProjections => "sleeper_projections",
            SourceTag::SleeperWeeklyProjections => "sleeper_weekly_projections",
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        let wanted = raw.trim().to_ascii_lowercase();
        SourceTag::ALL.into_iter().find(|tag| tag.key() == wanted)
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// (source, name, position, identifier). Names are canonicalized on load.
const BUILTIN_EXCEPTIONS: &[(SourceTag, &str, Position, &str)] = &[
    (SourceTag::Ktc, "Josh Allen", Position::Qb, "4984"),
    (SourceTag::Ktc, "Kenneth Walker", Position::Rb, "8151"),
    (SourceTag::Ktc, "Frank Gore", Position::Rb, "11573"),
    (SourceTag::Ktc, "Cameron Ward", Position::Qb, "11612"),
    (SourceTag::Ktc, "Chig Okonkwo", Position::Te, "8210"),
    (SourceTag::FantasyPros, "Mike Williams", Position::Wr, "4068"),
    (SourceTag::FantasyPros, "Kyle Williams", Position::Wr, "12547"),
    (SourceTag::FantasyPros, "Justin Shorter", Position::Te, "9489"),
    (SourceTag::FantasyPros, "Robbie Ouzts", Position::Rb, "12656"),
    (SourceTag::FantasyPros, "Velus Jones", Position::Rb, "8223"),
    (SourceTag::FantasyPros, "Brady Russell", Position::Rb, "11280"),
    (SourceTag::Clay, "Josh Allen", Position::Qb, "4984"),
    (SourceTag::Clay, "Frank Gore", Position::Rb, "11573"),
    (SourceTag::Clay, "Kenneth Walker", Position::Rb, "8151"),
    (SourceTag::Clay, "Kyle Williams", Position::Wr, "12547"),
];

/// A curated override: this `(name, position)` as written by `source` is
/// always `identifier`, whatever the index says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionEntry {
    pub source: SourceTag,
    pub canonical_name: String,
    pub position: Position,
    pub identifier: String,
}

/// Per-source override map keyed by `(canonical name, position)`.
#[derive(Debug, Clone, Default)]
pub struct ExceptionTable {
    entries: HashMap<(String, Position), String>,
}

#[derive(Debug, Deserialize)]
struct OverrideRow {
    name: String,
    position: String,
    player_id: String,
}

impl ExceptionTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The overrides that ship with `source`.
    pub fn builtin(source: SourceTag) -> Self {
        let entries = BUILTIN_EXCEPTIONS
            .iter()
            .filter(|(tag, ..)| *tag == source)
            .map(|(tag, name, position, id)| ExceptionEntry {
                source: *tag,
                canonical_name: canonicalize(name),
                position: *position,
                identifier: (*id).to_string(),
            });
        let mut table = Self::default();
        table.extend(entries);
        table
    }

    /// Builds a table from explicit `(name, position, identifier)` triples.
    /// Names are canonicalized, so any spelling a source uses works as a key.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Position, &'a str)>,
    {
        let mut table = Self::default();
        for (name, position, id) in entries {
            table.insert(name, position, id);
        }
        table
    }

    pub fn insert(&mut self, name: &str, position: Position, identifier: &str) {
        let canonical = canonicalize(name);
        if canonical.is_empty() || identifier.trim().is_empty() {
            return;
        }
        self.entries
            .insert((canonical, position), identifier.trim().to_string());
    }

    /// Adds entries; later entries replace earlier ones with the same key.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = ExceptionEntry>) {
        for entry in entries {
            self.insert(&entry.canonical_name, entry.position, &entry.identifier);
        }
    }

    /// `canonical_name` must already be canonical.
    pub fn lookup(&self, canonical_name: &str, position: Position) -> Option<&str> {
        self.entries
            .get(&(canonical_name.to_string(), position))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Built-in overrides for `source` with the entries of an optional JSON
    /// override file layered on top.
    pub fn for_source(source: SourceTag, overrides: Option<&Path>) -> Result<Self> {
        let mut table = Self::builtin(source);
        if let Some(path) = overrides {
            let extra = load_override_file(path)?;
            table.extend(extra.into_iter().filter(|e| e.source == source));
        }
        Ok(table)
    }
}

/// Reads `{"ktc": [{"name": ..., "position": ..., "player_id": ...}], ...}`.
pub fn load_override_file(path: &Path) -> Result<Vec<ExceptionEntry>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read exception overrides {}", path.display()))?;
    parse_overrides_json(&raw)
        .with_context(|| format!("parse exception overrides {}", path.display()))
}

pub fn parse_overrides_json(raw: &str) -> Result<Vec<ExceptionEntry>> {
    let by_source: HashMap<String, Vec<OverrideRow>> =
        serde_json::from_str(raw).context("invalid exception override json")?;
    let mut out = Vec::new();
    for (key, rows) in by_source {
        let Some(source) = SourceTag::from_key(&key) else {
            tracing::warn!("unknown source {key:?} in exception overrides, ignoring");
            continue;
        };
        for row in rows {
            out.push(ExceptionEntry {
                source,
                canonical_name: canonicalize(&row.name),
                position: Position::parse(&row.position),
                identifier: row.player_id,
            });
        }
    }
    Ok(out)
}
