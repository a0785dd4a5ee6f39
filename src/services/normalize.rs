// src/services/normalize.rs

//! Record normalizer.
//!
//! Turns a source-specific [`RawItem`] into a canonical [`Record`]. Pure:
//! no I/O, no clock reads; the observation time is fixed at construction.

use chrono::{DateTime, Utc};

use crate::models::{RawAuthor, RawDate, RawItem, Record, SourceDescriptor};
use crate::utils::dates::{from_date_parts, parse_timestamp};
use crate::utils::text::{clean_optional, collapse_whitespace, strip_html};

/// Why a raw item was not turned into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingKey,
    MissingTitle,
}

/// Normalizes raw items observed at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    observed_at: DateTime<Utc>,
}

impl Normalizer {
    pub fn new(observed_at: DateTime<Utc>) -> Self {
        Self { observed_at }
    }

    /// Normalize one raw item, or report why it was rejected.
    pub fn normalize(
        &self,
        raw: RawItem,
        source: &SourceDescriptor,
    ) -> std::result::Result<Record, Rejection> {
        let dedup_key = resolve_key(&raw).ok_or(Rejection::MissingKey)?;
        let title = clean_optional(raw.title.as_deref()).ok_or(Rejection::MissingTitle)?;
        let published_at = raw.dates.in_precedence().find_map(parse_raw_date);

        let link = raw
            .link
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| dedup_key.clone());

        let mut extra = source.extra.clone();
        extra.extend(raw.extra);

        Ok(Record {
            dedup_key,
            title,
            source_name: source.name.clone(),
            published_at,
            observed_at: self.observed_at,
            link,
            description: raw
                .description
                .as_deref()
                .map(strip_html)
                .unwrap_or_default(),
            authors: render_authors(&raw.authors),
            extra,
        })
    }
}

/// The dedup key: persistent identifier first, then link.
pub fn resolve_key(raw: &RawItem) -> Option<String> {
    [raw.identifier.as_deref(), raw.link.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .map(str::to_string)
}

/// Parse a single date candidate; failures read as absent.
pub fn parse_raw_date(date: &RawDate) -> Option<DateTime<Utc>> {
    match date {
        RawDate::Text(text) => parse_timestamp(text),
        RawDate::Parts(parts) => from_date_parts(parts),
    }
}

/// Render authors as `"Family, Given"` entries joined with `"; "`.
pub fn render_authors(authors: &[RawAuthor]) -> String {
    authors
        .iter()
        .filter_map(|author| match author {
            RawAuthor::Structured { given, family } => {
                let given = given
                    .as_deref()
                    .map(collapse_whitespace)
                    .filter(|s| !s.is_empty());
                let family = family
                    .as_deref()
                    .map(collapse_whitespace)
                    .filter(|s| !s.is_empty());
                match (family, given) {
                    (Some(family), Some(given)) => Some(format!("{family}, {given}")),
                    (Some(name), None) | (None, Some(name)) => Some(name),
                    (None, None) => None,
                }
            }
            RawAuthor::Plain(name) => Some(collapse_whitespace(name)).filter(|s| !s.is_empty()),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateCandidates;
    use chrono::TimeZone;

    fn observed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn journal() -> SourceDescriptor {
        SourceDescriptor::new("Journal of Tests", "1234-5678")
            .with_extra("journal_abbrev", "JT")
    }

    fn work() -> RawItem {
        RawItem {
            title: Some("  A <i>Study</i> of\n Things ".to_string()),
            link: Some("https://doi.org/10.1/abc".to_string()),
            identifier: Some("10.1/abc".to_string()),
            description: Some("<jats:p>Abstract &amp; more</jats:p>".to_string()),
            authors: vec![
                RawAuthor::Structured {
                    given: Some("Jane".into()),
                    family: Some("Doe".into()),
                },
                RawAuthor::Structured {
                    given: None,
                    family: Some("Plato".into()),
                },
                RawAuthor::Structured {
                    given: Some("Cher".into()),
                    family: None,
                },
                RawAuthor::Structured {
                    given: None,
                    family: None,
                },
            ],
            dates: DateCandidates {
                print: Some(RawDate::Parts(vec![Some(2024), Some(3)])),
                created: Some(RawDate::Parts(vec![Some(2024), Some(1), Some(2)])),
                ..DateCandidates::default()
            },
            ..RawItem::default()
        }
    }

    #[test]
    fn test_normalize_work() {
        let record = Normalizer::new(observed()).normalize(work(), &journal()).unwrap();

        assert_eq!(record.dedup_key, "10.1/abc");
        assert_eq!(record.title, "A Study of Things");
        assert_eq!(record.source_name, "Journal of Tests");
        assert_eq!(record.description, "Abstract & more");
        assert_eq!(record.authors, "Doe, Jane; Plato; Cher");
        assert_eq!(record.observed_at, observed());
        assert_eq!(
            record.published_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(record.extra.get("journal_abbrev").map(String::as_str), Some("JT"));
    }

    #[test]
    fn test_online_date_wins_over_print() {
        let mut raw = work();
        raw.dates.online = Some(RawDate::Parts(vec![Some(2024), Some(2), Some(10)]));
        let record = Normalizer::new(observed()).normalize(raw, &journal()).unwrap();
        assert_eq!(
            record.published_at,
            Some(Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_unparseable_date_falls_through() {
        let feed = SourceDescriptor::new("Feed", "https://feed.example/rss");
        let raw = RawItem {
            title: Some("News".into()),
            link: Some("https://feed.example/a".into()),
            dates: DateCandidates {
                published: Some(RawDate::Text("not a date".into())),
                updated: Some(RawDate::Text("2024-05-30T08:00:00Z".into())),
                ..DateCandidates::default()
            },
            ..RawItem::default()
        };
        let record = Normalizer::new(observed()).normalize(raw, &feed).unwrap();
        assert_eq!(
            record.published_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 30, 8, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_all_dates_unparseable_is_absent() {
        let feed = SourceDescriptor::new("Feed", "https://feed.example/rss");
        let raw = RawItem {
            title: Some("News".into()),
            link: Some("https://feed.example/a".into()),
            dates: DateCandidates {
                published: Some(RawDate::Text("soon".into())),
                ..DateCandidates::default()
            },
            ..RawItem::default()
        };
        let record = Normalizer::new(observed()).normalize(raw, &feed).unwrap();
        assert_eq!(record.published_at, None);
    }

    #[test]
    fn test_key_falls_back_to_link() {
        let mut raw = work();
        raw.identifier = Some("   ".into());
        let record = Normalizer::new(observed()).normalize(raw, &journal()).unwrap();
        assert_eq!(record.dedup_key, "https://doi.org/10.1/abc");
    }

    #[test]
    fn test_rejects_missing_key_or_title() {
        let normalizer = Normalizer::new(observed());

        let mut no_key = work();
        no_key.identifier = None;
        no_key.link = None;
        assert_eq!(
            normalizer.normalize(no_key, &journal()),
            Err(Rejection::MissingKey)
        );

        let mut no_title = work();
        no_title.title = Some("<b> </b>".into());
        assert_eq!(
            normalizer.normalize(no_title, &journal()),
            Err(Rejection::MissingTitle)
        );
    }

    #[test]
    fn test_plain_authors() {
        let authors = vec![
            RawAuthor::Plain(" Jane   Doe ".into()),
            RawAuthor::Plain(String::new()),
            RawAuthor::Plain("John Roe".into()),
        ];
        assert_eq!(render_authors(&authors), "Jane Doe; John Roe");
    }
}
