//! Output snapshot consumed by the digest sender.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Record;

/// Records from one source inside a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGroup {
    pub count: usize,
    pub records: Vec<Record>,
}

/// Details attached to a snapshot written by the relevance filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSummary {
    /// Number of candidate records submitted
    pub processed_count: usize,
    /// Number of records judged relevant
    pub kept_count: usize,
    /// Batches that exhausted their retries and were dropped
    pub degraded_batches: usize,
    /// Run date (`YYYY-MM-DD`)
    pub filtered_date: String,
    /// First day of the filtered window (`YYYY-MM-DD`)
    pub window_start: String,
    pub has_records: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A point-in-time projection of a window over the memory log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub record_count: usize,
    pub window_days: u32,
    pub groups: BTreeMap<String, SourceGroup>,
    pub all_records: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterSummary>,
}

impl Snapshot {
    /// Build a snapshot from already-selected records, keeping their order.
    pub fn from_records(
        records: Vec<Record>,
        window_days: u32,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let mut groups: BTreeMap<String, SourceGroup> = BTreeMap::new();
        for record in &records {
            let group = groups.entry(record.source_name.clone()).or_default();
            group.count += 1;
            group.records.push(record.clone());
        }

        Self {
            generated_at,
            record_count: records.len(),
            window_days,
            groups,
            all_records: records,
            filter: None,
        }
    }

    /// A snapshot with no records.
    pub fn empty(window_days: u32, generated_at: DateTime<Utc>) -> Self {
        Self::from_records(Vec::new(), window_days, generated_at)
    }

    /// Attach a filter summary.
    pub fn with_filter(mut self, summary: FilterSummary) -> Self {
        self.filter = Some(summary);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(key: &str, source: &str) -> Record {
        Record {
            dedup_key: key.to_string(),
            title: format!("Title {key}"),
            source_name: source.to_string(),
            published_at: None,
            observed_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            link: key.to_string(),
            description: String::new(),
            authors: String::new(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_groups_by_source() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let snapshot = Snapshot::from_records(
            vec![record("a", "Feed 1"), record("b", "Feed 2"), record("c", "Feed 1")],
            7,
            now,
        );

        assert_eq!(snapshot.record_count, 3);
        assert_eq!(snapshot.groups.len(), 2);
        assert_eq!(snapshot.groups["Feed 1"].count, 2);
        assert_eq!(snapshot.groups["Feed 1"].records[1].dedup_key, "c");
        assert_eq!(snapshot.all_records.len(), 3);
    }

    #[test]
    fn test_empty_snapshot_shape() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let json = serde_json::to_value(Snapshot::empty(7, now)).unwrap();

        assert_eq!(json["record_count"], 0);
        assert_eq!(json["window_days"], 7);
        assert_eq!(json["groups"], serde_json::json!({}));
        assert_eq!(json["all_records"], serde_json::json!([]));
        assert!(json.get("filter").is_none());
        assert!(json["generated_at"].as_str().unwrap().starts_with("2024-05-02T00:00:00"));
    }
}
