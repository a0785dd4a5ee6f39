// src/storage/table.rs

//! CSV encoding of the memory log.
//!
//! Core columns come first in a fixed order, followed by every extra field
//! name seen in the written records, sorted. Decoding matches columns by
//! header name, so reordered or widened files load unchanged, and the older
//! header names are read as aliases.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{AppError, Result};
use crate::models::Record;
use crate::utils::dates::parse_timestamp;

/// Core columns, in write order.
pub const CORE_COLUMNS: [&str; 8] = [
    "dedup_key",
    "title",
    "source_name",
    "published_at",
    "observed_at",
    "link",
    "description",
    "authors",
];

/// Header names accepted for each core column, in preference order.
const ALIASES: [(&str, &[&str]); 8] = [
    ("dedup_key", &["dedup_key", "doi", "link"]),
    ("title", &["title"]),
    ("source_name", &["source_name", "source", "journal_name"]),
    ("published_at", &["published_at", "published", "published_date"]),
    ("observed_at", &["observed_at", "scraped_at"]),
    ("link", &["link", "url"]),
    ("description", &["description", "abstract"]),
    ("authors", &["authors", "author"]),
];

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Encode records as CSV with a header row.
pub fn encode<'a>(records: impl IntoIterator<Item = &'a Record>) -> Result<Vec<u8>> {
    let records: Vec<&Record> = records.into_iter().collect();
    let extra_columns: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.extra.keys().map(String::as_str))
        .filter(|key| !CORE_COLUMNS.contains(key))
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    let header = CORE_COLUMNS
        .iter()
        .copied()
        .chain(extra_columns.iter().copied());
    writer.write_record(header)?;

    for record in records {
        let published = record
            .published_at
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_default();
        let observed = format_timestamp(&record.observed_at);
        let core = [
            record.dedup_key.as_str(),
            record.title.as_str(),
            record.source_name.as_str(),
            published.as_str(),
            observed.as_str(),
            record.link.as_str(),
            record.description.as_str(),
            record.authors.as_str(),
        ];
        let extras = extra_columns
            .iter()
            .map(|column| record.extra.get(*column).map(String::as_str).unwrap_or(""));
        writer.write_record(core.into_iter().chain(extras))?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))
}

fn cell<'r>(row: &'r csv::StringRecord, columns: &BTreeMap<&str, usize>, field: &str) -> &'r str {
    columns
        .get(field)
        .and_then(|&i| row.get(i))
        .map(str::trim)
        .unwrap_or("")
}

/// Decode a memory log file. Empty content is an empty log; anything else
/// that cannot be read is a corrupt store.
pub fn decode(content: &[u8], path: &str) -> Result<Vec<Record>> {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new().from_reader(content);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::corrupt_store(path, e))?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase())
        .collect();

    let mut columns: BTreeMap<&str, usize> = BTreeMap::new();
    for (field, names) in ALIASES {
        if let Some(index) = names
            .iter()
            .find_map(|name| headers.iter().position(|h| h == name))
        {
            columns.insert(field, index);
        }
    }
    for required in ["dedup_key", "observed_at"] {
        if !columns.contains_key(required) {
            return Err(AppError::corrupt_store(
                path,
                format!("missing {required} column"),
            ));
        }
    }
    let consumed: HashSet<usize> = columns.values().copied().collect();

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let line = index + 2;
        let row = row.map_err(|e| AppError::corrupt_store(path, e))?;
        let get = |field: &str| cell(&row, &columns, field);

        let dedup_key = get("dedup_key");
        if dedup_key.is_empty() {
            return Err(AppError::corrupt_store(path, format!("row {line}: empty dedup key")));
        }
        let observed_at = parse_timestamp(get("observed_at")).ok_or_else(|| {
            AppError::corrupt_store(
                path,
                format!("row {line}: invalid observed_at '{}'", get("observed_at")),
            )
        })?;

        let extra = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !consumed.contains(i))
            .filter_map(|(i, name)| {
                let value = row.get(i).map(str::trim).unwrap_or("");
                (!value.is_empty()).then(|| (name.clone(), value.to_string()))
            })
            .collect();

        records.push(Record {
            dedup_key: dedup_key.to_string(),
            title: get("title").to_string(),
            source_name: get("source_name").to_string(),
            published_at: parse_timestamp(get("published_at")),
            observed_at,
            link: get("link").to_string(),
            description: get("description").to_string(),
            authors: get("authors").to_string(),
            extra,
        });
    }

    Ok(records)
}
