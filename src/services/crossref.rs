// src/services/crossref.rs

//! Crossref REST API fetcher for scholarly journals.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::models::{DateCandidates, RawAuthor, RawDate, RawItem, ResearchConfig, SourceDescriptor};
use crate::services::{FetchWindow, SourceFetcher};

/// Queries `/works` for one ISSN per source, following cursor pages.
pub struct CrossrefFetcher {
    client: Client,
    api_url: String,
    mailto: Option<String>,
    rows: u32,
    max_pages: u32,
}

impl CrossrefFetcher {
    pub fn new(client: Client, config: &ResearchConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            mailto: config.mailto.clone().filter(|m| !m.trim().is_empty()),
            rows: config.rows.max(1),
            max_pages: config.max_pages.max(1),
        }
    }
}

#[async_trait]
impl SourceFetcher for CrossrefFetcher {
    async fn fetch(&self, source: &SourceDescriptor, window: &FetchWindow) -> Result<Vec<RawItem>> {
        let issn = source.address.trim();
        let filter = format!(
            "issn:{},from-online-pub-date:{},until-online-pub-date:{}",
            issn,
            window.from.format("%Y-%m-%d"),
            window.until.format("%Y-%m-%d"),
        );
        let url = format!("{}/works", self.api_url);

        let mut cursor = "*".to_string();
        let mut items = Vec::new();

        for page in 0..self.max_pages {
            let mut query = vec![
                ("filter", filter.clone()),
                ("rows", self.rows.to_string()),
                ("cursor", cursor.clone()),
            ];
            if let Some(mailto) = &self.mailto {
                query.push(("mailto", mailto.clone()));
            }

            let envelope: Envelope = self
                .client
                .get(&url)
                .query(&query)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let message = envelope.message;

            if page == 0 {
                log::info!(
                    "{} ({}): {} works in range",
                    source.name,
                    issn,
                    message.total_results
                );
            }

            let received = message.items.len();
            for value in message.items {
                match decode_work(value) {
                    Ok(mut raw) => {
                        raw.extra.insert("issn".to_string(), issn.to_string());
                        items.push(raw);
                    }
                    Err(e) => log::warn!("Skipping malformed work from {}: {}", source.name, e),
                }
            }

            match message.next_cursor {
                Some(next) if received >= self.rows as usize && next != cursor => cursor = next,
                _ => break,
            }
        }

        Ok(items)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    message: WorksPage,
}

#[derive(Debug, Deserialize)]
struct WorksPage {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(rename = "next-cursor")]
    next_cursor: Option<String>,
    #[serde(rename = "total-results", default)]
    total_results: u64,
}

#[derive(Debug, Deserialize)]
struct Work {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<Author>,
    #[serde(rename = "published-online")]
    published_online: Option<DateField>,
    #[serde(rename = "published-print")]
    published_print: Option<DateField>,
    created: Option<DateField>,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    volume: Option<String>,
    issue: Option<String>,
    page: Option<String>,
    #[serde(default)]
    subject: Vec<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    given: Option<String>,
    family: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DateField {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

impl DateField {
    fn into_raw(self) -> Option<RawDate> {
        self.date_parts
            .into_iter()
            .next()
            .filter(|parts| !parts.is_empty())
            .map(RawDate::Parts)
    }
}

/// Decode one Crossref work object into a raw item.
pub fn decode_work(value: Value) -> Result<RawItem> {
    let work: Work = serde_json::from_value(value)?;

    let doi = work
        .doi
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    let link = work
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .or_else(|| doi.as_ref().map(|d| format!("https://doi.org/{d}")));

    let mut extra = BTreeMap::new();
    let passthrough = [
        ("volume", work.volume),
        ("issue", work.issue),
        ("pages", work.page),
        ("subjects", Some(work.subject.join("; "))),
        ("article_type", work.kind),
    ];
    for (key, value) in passthrough {
        let value = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if let Some(value) = value {
            extra.insert(key.to_string(), value);
        }
    }

    Ok(RawItem {
        title: work.title.into_iter().next(),
        link,
        identifier: doi,
        description: work.abstract_text,
        authors: work
            .author
            .into_iter()
            .map(|a| RawAuthor::Structured {
                given: a.given,
                family: a.family,
            })
            .collect(),
        dates: DateCandidates {
            online: work.published_online.and_then(DateField::into_raw),
            print: work.published_print.and_then(DateField::into_raw),
            created: work.created.and_then(DateField::into_raw),
            ..DateCandidates::default()
        },
        extra,
    })
}
