//! Canonical record stored in the memory log and emitted in snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized article or scholarly work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    /// Identity: URL for news items, DOI (or URL fallback) for works
    pub dedup_key: String,

    /// Cleaned title
    pub title: String,

    /// Feed name or journal name
    pub source_name: String,

    /// Best-effort publication time
    pub published_at: Option<DateTime<Utc>>,

    /// When this record was first normalized; never recomputed
    pub observed_at: DateTime<Utc>,

    /// Link to the item
    #[serde(default)]
    pub link: String,

    /// Description or abstract, markup removed
    #[serde(default)]
    pub description: String,

    /// Authors joined with `"; "`
    #[serde(default)]
    pub authors: String,

    /// Passthrough metadata (ISSN, volume, guid, ...)
    #[serde(flatten, default)]
    pub extra: BTreeMap<String, String>,
}

/// Which timestamp a time window is evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBasis {
    /// Ingestion time (`observed_at`)
    #[default]
    Observed,
    /// `published_at` when known, otherwise `observed_at`
    PublishedOrObserved,
}

impl Record {
    /// The timestamp used for windowing under the given basis.
    pub fn timestamp(&self, basis: TimeBasis) -> DateTime<Utc> {
        match basis {
            TimeBasis::Observed => self.observed_at,
            TimeBasis::PublishedOrObserved => self.published_at.unwrap_or(self.observed_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> Record {
        Record {
            dedup_key: "10.1000/xyz".to_string(),
            title: "Paper".to_string(),
            source_name: "Journal of Tests".to_string(),
            published_at: None,
            observed_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            link: "https://doi.org/10.1000/xyz".to_string(),
            description: String::new(),
            authors: "Doe, Jane".to_string(),
            extra: BTreeMap::from([("issn".to_string(), "1234-5678".to_string())]),
        }
    }

    #[test]
    fn test_timestamp_basis() {
        let mut record = sample_record();
        assert_eq!(record.timestamp(TimeBasis::PublishedOrObserved), record.observed_at);

        let published = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        record.published_at = Some(published);
        assert_eq!(record.timestamp(TimeBasis::PublishedOrObserved), published);
        assert_eq!(record.timestamp(TimeBasis::Observed), record.observed_at);
    }

    #[test]
    fn test_extra_fields_flatten_into_json() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(json["issn"], "1234-5678");
        assert_eq!(json["dedup_key"], "10.1000/xyz");
        assert!(json["published_at"].is_null());
    }
}
