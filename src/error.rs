use thiserror::Error;

/// Storage failures that abort an ingestion run. Fetch and parse problems are
/// handled before a run starts; unmatched or ambiguous players are never
/// errors, they are counted in the run summary.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("storage error while {stage}: {source}")]
    Storage {
        stage: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("commit failed, batch rolled back: {0}")]
    Commit(#[source] rusqlite::Error),
}

impl IngestError {
    pub fn storage(stage: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| IngestError::Storage { stage, source }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, IngestError::Storage { .. } | IngestError::Commit(_))
    }
}
