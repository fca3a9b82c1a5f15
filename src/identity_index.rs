use std::collections::HashMap;

use crate::player::PlayerRecord;

/// Canonical name -> every roster player carrying that name. Rebuilt for each
/// ingestion run from the full player set; never persisted.
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex {
    by_name: HashMap<String, Vec<PlayerRecord>>,
    by_id: HashMap<String, String>,
}

impl IdentityIndex {
    /// Groups records by their stored canonical name. Records with an empty
    /// name are only reachable by identifier. A repeated identifier keeps the
    /// last record seen.
    pub fn build<I>(records: I) -> Self
    where
        I: IntoIterator<Item = PlayerRecord>,
    {
        let mut index = Self::default();
        for record in records {
            if let Some(old_name) = index.by_id.get(&record.identifier).cloned()
                && let Some(group) = index.by_name.get_mut(&old_name)
            {
                group.retain(|p| p.identifier != record.identifier);
                if group.is_empty() {
                    index.by_name.remove(&old_name);
                }
            }
            index
                .by_id
                .insert(record.identifier.clone(), record.canonical_name.clone());
            if record.canonical_name.is_empty() {
                continue;
            }
            index
                .by_name
                .entry(record.canonical_name.clone())
                .or_default()
                .push(record);
        }
        for group in index.by_name.values_mut() {
            group.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        }
        index
    }

    pub fn candidates(&self, canonical_name: &str) -> &[PlayerRecord] {
        self.by_name
            .get(canonical_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains_id(&self, identifier: &str) -> bool {
        self.by_id.contains_key(identifier)
    }

    pub fn player_count(&self) -> usize {
        self.by_id.len()
    }

    pub fn name_count(&self) -> usize {
        self.by_name.len()
    }

    /// Names shared by more than one player, for review reports.
    pub fn shared_names(&self) -> Vec<(&str, Vec<&str>)> {
        let mut out: Vec<(&str, Vec<&str>)> = self
            .by_name
            .iter()
            .filter(|(_, group)| group.len() > 1)
            .map(|(name, group)| {
                (
                    name.as_str(),
                    group.iter().map(|p| p.identifier.as_str()).collect(),
                )
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }
}
