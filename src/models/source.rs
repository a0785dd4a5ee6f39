//! Source descriptor tables (one row per feed or journal).

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AppError, Result};

const NAME_COLUMNS: &[&str] = &["name", "source", "journal_name"];
const ADDRESS_COLUMNS: &[&str] = &["address", "url", "issn"];
const CONSUMED_COLUMNS: &[&str] = &["name", "source", "journal_name", "address", "url", "active"];

static ISSN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{3}[\dXx]$").expect("valid ISSN pattern"));

/// What kind of upstream a descriptor points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// RSS or Atom feed; address is a URL
    Feed,
    /// Scholarly journal; address is an ISSN
    Journal,
}

/// One configured feed or journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub name: String,
    pub address: String,
    pub active: bool,
    /// Extra columns, copied into every record from this source
    pub extra: BTreeMap<String, String>,
}

/// A parsed descriptor table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTable {
    pub sources: Vec<SourceDescriptor>,
    /// One message per row that could not be read
    pub rejected: Vec<String>,
}

impl SourceTable {
    /// All rows, or a validation error naming every rejected row.
    pub fn into_strict(self) -> Result<Vec<SourceDescriptor>> {
        if self.rejected.is_empty() {
            Ok(self.sources)
        } else {
            Err(AppError::validation(self.rejected.join("; ")))
        }
    }
}

impl SourceDescriptor {
    /// Create an active descriptor with no extra columns.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            active: true,
            extra: BTreeMap::new(),
        }
    }

    /// Add a passthrough column.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Parse a descriptor table with a header row.
    ///
    /// Legacy headers are accepted: `source`/`journal_name` for `name` and
    /// `url`/`issn` for `address`. A missing `active` column means active.
    /// Rows are parsed independently; a bad row lands in
    /// [`SourceTable::rejected`] and the rest still load. Only an unreadable
    /// header fails the whole table.
    pub fn parse_table(content: &str) -> Result<SourceTable> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.to_lowercase())
            .collect();

        let mut table = SourceTable::default();
        for (index, row) in reader.records().enumerate() {
            let line = index + 2;
            let parsed = row
                .map_err(|e| e.to_string())
                .and_then(|row| Self::from_row(&headers, &row));
            match parsed {
                Ok(source) => table.sources.push(source),
                Err(reason) => table.rejected.push(format!("row {line}: {reason}")),
            }
        }
        Ok(table)
    }

    fn from_row(headers: &[String], row: &csv::StringRecord) -> std::result::Result<Self, String> {
        let fields: BTreeMap<&str, &str> = headers
            .iter()
            .map(String::as_str)
            .zip(row.iter())
            .filter(|(_, value)| !value.is_empty())
            .collect();

        let name = first_of(&fields, NAME_COLUMNS).ok_or("missing name")?;
        let address = first_of(&fields, ADDRESS_COLUMNS).ok_or("missing address")?;
        let active = match fields.get("active") {
            Some(value) => {
                parse_flag(value).ok_or_else(|| format!("invalid active flag '{value}'"))?
            }
            None => true,
        };

        let extra = fields
            .iter()
            .filter(|(key, _)| !CONSUMED_COLUMNS.contains(key))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        Ok(Self {
            name: name.to_string(),
            address: address.to_string(),
            active,
            extra,
        })
    }

    /// Validate a loaded table for the given source kind.
    pub fn validate_table(sources: &[Self], kind: SourceKind) -> Result<()> {
        let mut names = HashSet::new();
        for source in sources {
            if !names.insert(source.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            match kind {
                SourceKind::Feed => {
                    let url = url::Url::parse(&source.address)?;
                    if !matches!(url.scheme(), "http" | "https") {
                        return Err(AppError::validation(format!(
                            "{}: feed address must be http(s), got {}",
                            source.name, source.address
                        )));
                    }
                }
                SourceKind::Journal => {
                    if !ISSN.is_match(&source.address) {
                        return Err(AppError::validation(format!(
                            "{}: '{}' is not an ISSN",
                            source.name, source.address
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn first_of<'a>(fields: &BTreeMap<&str, &'a str>, columns: &[&str]) -> Option<&'a str> {
    columns.iter().find_map(|column| fields.get(column).copied())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}
