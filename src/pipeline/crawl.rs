// src/pipeline/crawl.rs

//! Source crawling: fetch, normalize and filter new records per source.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::{Record, SourceDescriptor};
use crate::services::{FetchWindow, Normalizer, Rejection, SourceFetcher};
use crate::storage::KnownKeys;

/// Summary of a crawl run.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    /// New records from all sources, in source order
    pub records: Vec<Record>,
    /// Active sources attempted
    pub source_total: usize,
    pub source_failures: usize,
    /// Raw items returned by fetchers
    pub fetched: usize,
    /// Raw items without a usable key or title
    pub rejected: usize,
    /// Records whose key was already in the log
    pub known: usize,
    /// Records published before the lookback cutoff
    pub stale: usize,
}

/// Crawls sources one at a time with a fixed pause between them.
pub struct SourceCrawler<'a> {
    fetcher: &'a dyn SourceFetcher,
    delay: Duration,
}

impl<'a> SourceCrawler<'a> {
    pub fn new(fetcher: &'a dyn SourceFetcher, delay: Duration) -> Self {
        Self { fetcher, delay }
    }

    /// Crawl every active source.
    ///
    /// A failing source is logged and counted; it never stops the others.
    /// Records with no resolvable publication time are kept.
    pub async fn crawl(
        &self,
        sources: &[SourceDescriptor],
        known: &KnownKeys,
        lookback: chrono::Duration,
        now: DateTime<Utc>,
    ) -> CrawlOutcome {
        let cutoff = now - lookback;
        let window = FetchWindow {
            from: cutoff,
            until: now,
        };
        let normalizer = Normalizer::new(now);

        let active: Vec<&SourceDescriptor> = sources.iter().filter(|s| s.active).collect();
        let mut outcome = CrawlOutcome {
            source_total: active.len(),
            ..CrawlOutcome::default()
        };

        for (position, source) in active.into_iter().enumerate() {
            if position > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let items = match self.fetcher.fetch(source, &window).await {
                Ok(items) => items,
                Err(e) => {
                    outcome.source_failures += 1;
                    log::warn!("Source '{}' failed: {}", source.name, e);
                    continue;
                }
            };
            outcome.fetched += items.len();

            let mut new_count = 0;
            for raw in items {
                let record = match normalizer.normalize(raw, source) {
                    Ok(record) => record,
                    Err(rejection) => {
                        outcome.rejected += 1;
                        let reason = match rejection {
                            Rejection::MissingKey => "no key",
                            Rejection::MissingTitle => "no title",
                        };
                        log::debug!("Dropped item from '{}': {}", source.name, reason);
                        continue;
                    }
                };

                if known.contains(&record.dedup_key) {
                    outcome.known += 1;
                } else if record.published_at.is_some_and(|ts| ts < cutoff) {
                    outcome.stale += 1;
                } else {
                    new_count += 1;
                    outcome.records.push(record);
                }
            }
            log::info!("{}: {} new records", source.name, new_count);
        }

        if outcome.source_failures > 0 {
            log::warn!(
                "{}/{} sources failed",
                outcome.source_failures,
                outcome.source_total
            );
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use tokio::time::Instant;

    use crate::error::{AppError, Result};
    use crate::models::{DateCandidates, RawDate, RawItem};

    /// Serves canned items per source name; unknown names fail.
    struct CannedFetcher {
        items: HashMap<String, Vec<RawItem>>,
        calls: Mutex<Vec<String>>,
    }

    impl CannedFetcher {
        fn new(items: Vec<(&str, Vec<RawItem>)>) -> Self {
            Self {
                items: items
                    .into_iter()
                    .map(|(name, items)| (name.to_string(), items))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SourceFetcher for CannedFetcher {
        async fn fetch(&self, source: &SourceDescriptor, _: &FetchWindow) -> Result<Vec<RawItem>> {
            self.calls.lock().unwrap().push(source.name.clone());
            self.items
                .get(&source.name)
                .cloned()
                .ok_or_else(|| AppError::crawl(&source.name, "connection refused"))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 2, 6, 0, 0).unwrap()
    }

    fn item(link: &str, published: Option<&str>) -> RawItem {
        RawItem {
            title: Some(format!("Story {link}")),
            link: Some(link.to_string()),
            dates: DateCandidates {
                published: published.map(|p| RawDate::Text(p.to_string())),
                ..DateCandidates::default()
            },
            ..RawItem::default()
        }
    }

    fn source(name: &str) -> SourceDescriptor {
        SourceDescriptor::new(name, format!("https://{name}.example/rss"))
    }

    #[tokio::test]
    async fn test_failing_source_is_isolated() {
        let fetcher = CannedFetcher::new(vec![(
            "a",
            vec![
                item("https://a.example/1", None),
                item("https://a.example/2", None),
                item("https://a.example/3", None),
            ],
        )]);
        let crawler = SourceCrawler::new(&fetcher, Duration::ZERO);

        let outcome = crawler
            .crawl(
                &[source("a"), source("b")],
                &KnownKeys::default(),
                chrono::Duration::hours(25),
                now(),
            )
            .await;

        assert_eq!(outcome.records.len(), 3);
        assert!(outcome.records.iter().all(|r| r.source_name == "a"));
        assert_eq!(outcome.source_total, 2);
        assert_eq!(outcome.source_failures, 1);
        assert_eq!(*fetcher.calls.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_filters_known_stale_and_rejected() {
        let mut untitled = item("https://a.example/untitled", None);
        untitled.title = None;
        let fetcher = CannedFetcher::new(vec![(
            "a",
            vec![
                item("https://a.example/known", None),
                item("https://a.example/old", Some("2024-05-20T00:00:00Z")),
                item("https://a.example/fresh", Some("2024-06-01T12:00:00Z")),
                item("https://a.example/undated", Some("sometime")),
                untitled,
            ],
        )]);
        let known: KnownKeys = vec!["https://a.example/known".to_string()]
            .into_iter()
            .collect();
        let crawler = SourceCrawler::new(&fetcher, Duration::ZERO);

        let outcome = crawler
            .crawl(&[source("a")], &known, chrono::Duration::hours(25), now())
            .await;

        let keys: Vec<_> = outcome
            .records
            .iter()
            .map(|r| r.dedup_key.as_str())
            .collect();
        assert_eq!(keys, vec!["https://a.example/fresh", "https://a.example/undated"]);
        assert_eq!(outcome.fetched, 5);
        assert_eq!(outcome.known, 1);
        assert_eq!(outcome.stale, 1);
        assert_eq!(outcome.rejected, 1);
        assert!(outcome.records.iter().all(|r| r.observed_at == now()));
    }

    #[tokio::test]
    async fn test_known_keys_not_updated_mid_crawl() {
        let fetcher = CannedFetcher::new(vec![
            ("a", vec![item("https://shared.example/x", None)]),
            ("b", vec![item("https://shared.example/x", None)]),
        ]);
        let crawler = SourceCrawler::new(&fetcher, Duration::ZERO);

        let outcome = crawler
            .crawl(
                &[source("a"), source("b")],
                &KnownKeys::default(),
                chrono::Duration::hours(25),
                now(),
            )
            .await;

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.known, 0);
    }

    #[tokio::test]
    async fn test_inactive_sources_are_skipped() {
        let fetcher = CannedFetcher::new(vec![("a", vec![item("https://a.example/1", None)])]);
        let mut off = source("off");
        off.active = false;
        let crawler = SourceCrawler::new(&fetcher, Duration::ZERO);

        let outcome = crawler
            .crawl(
                &[off, source("a")],
                &KnownKeys::default(),
                chrono::Duration::hours(1),
                now(),
            )
            .await;

        assert_eq!(outcome.source_total, 1);
        assert_eq!(outcome.source_failures, 0);
        assert_eq!(*fetcher.calls.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_politeness_delay_between_sources() {
        let fetcher = CannedFetcher::new(vec![("a", vec![]), ("b", vec![]), ("c", vec![])]);
        let crawler = SourceCrawler::new(&fetcher, Duration::from_secs(2));
        let start = Instant::now();

        crawler
            .crawl(
                &[source("a"), source("b"), source("c")],
                &KnownKeys::default(),
                chrono::Duration::hours(1),
                now(),
            )
            .await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4) && elapsed < Duration::from_secs(5));
    }
}
