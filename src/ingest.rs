use std::borrow::Cow;
use std::collections::HashMap;

use rusqlite::{Connection, Transaction};
use serde::Serialize;

use crate::error::IngestError;
use crate::exceptions::{ExceptionTable, SourceTag};
use crate::identity_index::IdentityIndex;
use crate::resolver::{PlayerResolver, ResolutionOutcome, ResolutionReport};
use crate::store::{self, RunCounts};

/// How a raw source record identifies its player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKey<'a> {
    /// The source already uses roster identifiers.
    Identifier(&'a str),
    Named {
        raw_name: &'a str,
        position: &'a str,
        team: Option<&'a str>,
    },
}

/// One raw row from a valuation source.
pub trait SourceRecord: Clone {
    fn key(&self) -> RecordKey<'_>;

    /// Identity of the detail row this record writes for `player_id`. Records
    /// of one run sharing a row key are merged before anything is written.
    fn row_key(&self, player_id: &str) -> String {
        player_id.to_string()
    }

    /// Folds `later`, another record of the same run with the same row key,
    /// into this one. The default keeps the later record.
    fn merge_same_player(&mut self, later: &Self) {
        *self = later.clone();
    }

    /// Write this record as the source's detail row for `player_id`, replacing
    /// every column of any existing row.
    fn upsert(&self, tx: &Transaction<'_>, player_id: &str) -> rusqlite::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    Ambiguous,
    Unresolved,
}

/// A skipped record, kept for manual review (usually a new exception entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedRecord {
    pub raw_name: String,
    pub canonical_name: String,
    pub position: String,
    pub team: Option<String>,
    pub reason: UnmatchedReason,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub source: SourceTag,
    pub run_id: i64,
    pub records_seen: usize,
    /// Resolved records. Records sharing a row key share a row.
    pub upserted: usize,
    /// Resolved records folded into an earlier record with the same row key.
    pub merged: usize,
    /// Ambiguous plus unresolved records.
    pub not_matched: usize,
    pub ambiguous: usize,
    pub unmatched: Vec<UnmatchedRecord>,
}

impl IngestSummary {
    fn counts(&self) -> RunCounts {
        RunCounts {
            records_seen: self.records_seen,
            upserted: self.upserted,
            not_matched: self.not_matched,
            ambiguous: self.ambiguous,
        }
    }
}

/// Resolve-and-upsert driver shared by every valuation source. One run is one
/// transaction: either every resolved record is written or none is.
#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    source: SourceTag,
    exceptions: ExceptionTable,
    prefer_active: bool,
}

impl IngestionPipeline {
    pub fn new(source: SourceTag, exceptions: ExceptionTable) -> Self {
        Self {
            source,
            exceptions,
            prefer_active: false,
        }
    }

    pub fn prefer_active(mut self, enabled: bool) -> Self {
        self.prefer_active = enabled;
        self
    }

    /// Builds a fresh identity index from the registry, then ingests `records`.
    pub fn run<R: SourceRecord>(
        &self,
        conn: &mut Connection,
        records: &[R],
    ) -> Result<IngestSummary, IngestError> {
        let index = IdentityIndex::build(store::load_players(conn)?);
        tracing::debug!(
            source = %self.source,
            players = index.player_count(),
            names = index.name_count(),
            shared_names = index.shared_names().len(),
            "identity index built"
        );
        self.run_with_index(conn, &index, records)
    }

    pub fn run_with_index<R: SourceRecord>(
        &self,
        conn: &mut Connection,
        index: &IdentityIndex,
        records: &[R],
    ) -> Result<IngestSummary, IngestError> {
        let resolver =
            PlayerResolver::new(index, &self.exceptions).prefer_active(self.prefer_active);
        let run_id = store::begin_run(conn, self.source.key())?;
        let mut summary = IngestSummary {
            source: self.source,
            run_id,
            records_seen: records.len(),
            upserted: 0,
            merged: 0,
            not_matched: 0,
            ambiguous: 0,
            unmatched: Vec::new(),
        };

        match self.write_batch(conn, &resolver, records, &mut summary) {
            Ok(()) => {
                let report = serde_json::to_string(&summary.unmatched)
                    .unwrap_or_else(|_| "[]".to_string());
                // The batch is committed; a ledger failure must not report it as lost.
                if let Err(ledger_err) =
                    store::finish_run(conn, run_id, "ok", summary.counts(), &report)
                {
                    tracing::warn!("run {run_id} committed but not recorded: {ledger_err}");
                }
                tracing::info!(
                    source = %self.source,
                    upserted = summary.upserted,
                    not_matched = summary.not_matched,
                    ambiguous = summary.ambiguous,
                    "ingestion committed"
                );
                Ok(summary)
            }
            Err(err) => {
                tracing::error!(source = %self.source, "ingestion rolled back: {err}");
                let counts = RunCounts {
                    upserted: 0,
                    ..summary.counts()
                };
                if let Err(ledger_err) = store::finish_run(conn, run_id, "failed", counts, "[]") {
                    tracing::warn!("could not record failed run {run_id}: {ledger_err}");
                }
                Err(err)
            }
        }
    }

    fn write_batch<R: SourceRecord>(
        &self,
        conn: &mut Connection,
        resolver: &PlayerResolver<'_>,
        records: &[R],
        summary: &mut IngestSummary,
    ) -> Result<(), IngestError> {
        let tx = conn
            .transaction()
            .map_err(IngestError::storage("beginning ingest transaction"))?;
        let mut resolved: Vec<(String, Cow<'_, R>)> = Vec::new();
        let mut slot_by_row: HashMap<String, usize> = HashMap::new();

        for record in records {
            let (outcome, report) = match record.key() {
                RecordKey::Identifier(id) => (resolver.resolve_identifier(id), None),
                RecordKey::Named {
                    raw_name,
                    position,
                    team,
                } => {
                    let report = resolver.resolve_report(raw_name, position, team);
                    (report.outcome.clone(), Some(report))
                }
            };

            match outcome {
                ResolutionOutcome::Resolved(player_id) => {
                    summary.upserted += 1;
                    let row_key = record.row_key(&player_id);
                    match slot_by_row.get(&row_key) {
                        Some(&slot) => {
                            tracing::debug!(
                                source = %self.source,
                                "{row_key} seen again, merging into the earlier record"
                            );
                            resolved[slot].1.to_mut().merge_same_player(record);
                            summary.merged += 1;
                        }
                        None => {
                            slot_by_row.insert(row_key, resolved.len());
                            resolved.push((player_id, Cow::Borrowed(record)));
                        }
                    }
                }
                ResolutionOutcome::Ambiguous(candidates) => {
                    summary.not_matched += 1;
                    summary.ambiguous += 1;
                    let unmatched =
                        unmatched_record(record.key(), report.as_ref(), UnmatchedReason::Ambiguous, candidates);
                    tracing::warn!(
                        source = %self.source,
                        "ambiguous: {:?} ({} {}) candidates {:?}",
                        unmatched.raw_name,
                        unmatched.position,
                        unmatched.team.as_deref().unwrap_or("-"),
                        unmatched.candidates
                    );
                    summary.unmatched.push(unmatched);
                }
                ResolutionOutcome::Unresolved => {
                    summary.not_matched += 1;
                    let candidates = report
                        .as_ref()
                        .map(|r| r.name_only_candidates.clone())
                        .unwrap_or_default();
                    let unmatched =
                        unmatched_record(record.key(), report.as_ref(), UnmatchedReason::Unresolved, candidates);
                    if unmatched.candidates.is_empty() {
                        tracing::warn!(
                            source = %self.source,
                            "not found: {:?} (canonical {:?}, {} {})",
                            unmatched.raw_name,
                            unmatched.canonical_name,
                            unmatched.position,
                            unmatched.team.as_deref().unwrap_or("-")
                        );
                    } else {
                        tracing::warn!(
                            source = %self.source,
                            "name shared by {:?}, no position match: {:?} ({})",
                            unmatched.candidates,
                            unmatched.raw_name,
                            unmatched.position
                        );
                    }
                    summary.unmatched.push(unmatched);
                }
            }
        }

        for (player_id, record) in &resolved {
            record
                .upsert(&tx, player_id)
                .map_err(IngestError::storage("upserting source record"))?;
        }

        tx.commit().map_err(IngestError::Commit)?;
        Ok(())
    }
}

fn unmatched_record(
    key: RecordKey<'_>,
    report: Option<&ResolutionReport>,
    reason: UnmatchedReason,
    candidates: Vec<String>,
) -> UnmatchedRecord {
    let (raw_name, position, team) = match key {
        RecordKey::Identifier(id) => (id.to_string(), String::new(), None),
        RecordKey::Named {
            raw_name,
            position,
            team,
        } => (
            raw_name.to_string(),
            position.trim().to_ascii_uppercase(),
            team.map(str::to_string),
        ),
    };
    UnmatchedRecord {
        raw_name,
        canonical_name: report.map(|r| r.canonical_name.clone()).unwrap_or_default(),
        position,
        team,
        reason,
        candidates,
    }
}
