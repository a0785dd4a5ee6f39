// src/storage/memory.rs

//! The memory log: every record seen within the retention horizon, keyed by
//! dedup key.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::models::Record;

/// Immutable set of dedup keys already present in the log at the start of a
/// run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownKeys(HashSet<String>);

impl KnownKeys {
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<String> for KnownKeys {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Counts from one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    /// Incoming records whose key was already present
    pub duplicates: usize,
}

/// Records keyed by dedup key. At most one entry per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryLog {
    entries: BTreeMap<String, Record>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from possibly-duplicated rows, keeping the earliest
    /// observation of each key.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut log = Self::new();
        log.merge(records);
        log
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.entries.get(key)
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.entries.values()
    }

    /// Snapshot of the keys currently held.
    pub fn known_keys(&self) -> KnownKeys {
        self.entries.keys().cloned().collect()
    }

    /// Most recent `observed_at` in the log.
    pub fn newest_observation(&self) -> Option<DateTime<Utc>> {
        self.records().map(|r| r.observed_at).max()
    }

    /// Union by dedup key.
    ///
    /// On collision the entry with the earlier `observed_at` is kept; on a
    /// tie the one already in the log stays.
    pub fn merge(&mut self, incoming: impl IntoIterator<Item = Record>) -> MergeStats {
        let mut stats = MergeStats::default();
        for record in incoming {
            match self.entries.get_mut(&record.dedup_key) {
                Some(existing) => {
                    stats.duplicates += 1;
                    if record.observed_at < existing.observed_at {
                        *existing = record;
                    }
                }
                None => {
                    stats.added += 1;
                    self.entries.insert(record.dedup_key.clone(), record);
                }
            }
        }
        stats
    }

    /// Drop entries observed before `now - horizon`. Returns how many went.
    pub fn prune(&mut self, horizon: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = now - horizon;
        let before = self.entries.len();
        self.entries.retain(|_, record| record.observed_at >= cutoff);
        before - self.entries.len()
    }

    /// Remove records that have been judged, except those observed at or
    /// after `keep_from`. Returns how many went.
    pub fn release_processed(
        &mut self,
        processed: &HashSet<String>,
        keep_from: DateTime<Utc>,
    ) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|key, record| !processed.contains(key) || record.observed_at >= keep_from);
        before - self.entries.len()
    }

    /// Records ordered most-recently-observed first, ties by key.
    pub fn records_sorted(&self) -> Vec<&Record> {
        let mut records: Vec<&Record> = self.entries.values().collect();
        records.sort_by(|a, b| {
            b.observed_at
                .cmp(&a.observed_at)
                .then_with(|| a.dedup_key.cmp(&b.dedup_key))
        });
        records
    }
}
