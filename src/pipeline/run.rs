// src/pipeline/run.rs

//! Run orchestration: one crawl cycle per stream, one filter cycle for news.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::models::{Config, FilterSummary, Snapshot, StreamSettings, TimeBasis};
use crate::pipeline::{RelevanceGate, RetryPolicy, SourceCrawler, project, select_window};
use crate::services::{RelevanceClassifier, SourceFetcher};
use crate::storage::{MergeStats, RecordStorage};

const NOTHING_KEPT: &str = "No relevant articles found for this period.";

/// Totals from one crawl cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub source_total: usize,
    pub source_failures: usize,
    pub fetched: usize,
    pub rejected: usize,
    pub known: usize,
    pub stale: usize,
    pub merged: MergeStats,
    pub pruned: usize,
    pub store_size: usize,
    pub snapshot_count: usize,
}

/// Totals from one filter cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterReport {
    pub summary: FilterSummary,
    /// Archive written before classification, if there was anything to judge
    pub archive: Option<String>,
    pub released: usize,
    pub store_size: usize,
}

/// Crawl → merge → prune → persist → project → write snapshot.
///
/// The snapshot is written even when nothing is new.
pub async fn run_crawl(
    settings: &StreamSettings,
    storage: &dyn RecordStorage,
    fetcher: &dyn SourceFetcher,
    now: DateTime<Utc>,
) -> Result<CrawlReport> {
    let label = settings.label;
    let table = storage.load_sources(&settings.sources_file).await?;
    for reason in &table.rejected {
        log::warn!("[{}] Skipping source {}", label, reason);
    }
    let sources = table.sources;
    let mut log = storage.load_log(&settings.log_file).await?;
    log::info!(
        "[{}] {} sources configured, {} records in memory",
        label,
        sources.len(),
        log.len()
    );

    let crawler = SourceCrawler::new(fetcher, settings.source_delay);
    let mut outcome = crawler
        .crawl(&sources, &log.known_keys(), settings.lookback, now)
        .await;

    let merged = log.merge(std::mem::take(&mut outcome.records));
    let pruned = log.prune(settings.retention, now);
    storage.persist_log(&settings.log_file, &log).await?;

    let snapshot = project(&log, settings.window_days, settings.time_basis, now);
    storage.write_snapshot(&settings.output_file, &snapshot).await?;

    let report = CrawlReport {
        source_total: outcome.source_total,
        source_failures: outcome.source_failures,
        fetched: outcome.fetched,
        rejected: outcome.rejected,
        known: outcome.known,
        stale: outcome.stale,
        merged,
        pruned,
        store_size: log.len(),
        snapshot_count: snapshot.record_count,
    };
    log::info!(
        "[{}] sources {}/{} ok, fetched {}, new {}, known {}, stale {}, rejected {}, pruned {}, stored {}, snapshot {}",
        label,
        report.source_total - report.source_failures,
        report.source_total,
        report.fetched,
        report.merged.added,
        report.known,
        report.stale,
        report.rejected,
        report.pruned,
        report.store_size,
        report.snapshot_count
    );
    Ok(report)
}

/// Gate the news window through the classifier.
///
/// Archives the candidates, writes the filtered snapshot, then releases the
/// judged records from the log except the most recent safety margin.
pub async fn run_filter(
    config: &Config,
    storage: &dyn RecordStorage,
    classifier: &dyn RelevanceClassifier,
    now: DateTime<Utc>,
) -> Result<FilterReport> {
    let relevance = &config.relevance;
    let log_file = &config.news.log_file;
    let mut log = storage.load_log(log_file).await?;

    let candidates = select_window(&log, relevance.window_days, TimeBasis::Observed, now);
    let filtered_date = now.format("%Y-%m-%d").to_string();
    let window_start = (now - Duration::days(i64::from(relevance.window_days)))
        .format("%Y-%m-%d")
        .to_string();

    if candidates.is_empty() {
        log::info!("No records observed in the last {} days", relevance.window_days);
        let summary = FilterSummary {
            processed_count: 0,
            kept_count: 0,
            degraded_batches: 0,
            filtered_date,
            window_start,
            has_records: false,
            message: Some(NOTHING_KEPT.to_string()),
        };
        let snapshot =
            Snapshot::empty(relevance.window_days, now).with_filter(summary.clone());
        storage.write_snapshot(&relevance.output_file, &snapshot).await?;
        return Ok(FilterReport {
            summary,
            archive: None,
            released: 0,
            store_size: log.len(),
        });
    }

    let archive = format!(
        "{}/news_archive_{}.csv",
        relevance.archive_dir.trim_end_matches('/'),
        filtered_date
    );
    storage.write_records(&archive, &candidates).await?;
    log::info!("Archived {} candidates to {}", candidates.len(), archive);

    let gate = RelevanceGate::new(
        classifier,
        relevance.batch_size,
        RetryPolicy::from_config(relevance),
    );
    let outcome = gate.filter(&candidates).await;

    let kept_count = outcome.kept.len();
    let summary = FilterSummary {
        processed_count: outcome.processed,
        kept_count,
        degraded_batches: outcome.degraded_batches,
        filtered_date,
        window_start,
        has_records: kept_count > 0,
        message: (kept_count == 0).then(|| NOTHING_KEPT.to_string()),
    };
    let snapshot = Snapshot::from_records(outcome.kept, relevance.window_days, now)
        .with_filter(summary.clone());
    storage.write_snapshot(&relevance.output_file, &snapshot).await?;

    let processed: HashSet<String> = candidates.into_iter().map(|r| r.dedup_key).collect();
    let keep_from = now - Duration::days(i64::from(relevance.safety_margin_days));
    let released = log.release_processed(&processed, keep_from);
    storage.persist_log(log_file, &log).await?;

    if outcome.degraded_batches > 0 {
        log::warn!(
            "{} of {} batches could not be classified and were dropped",
            outcome.degraded_batches,
            outcome.batches
        );
    }
    log::info!(
        "Kept {} of {} records; released {}, {} remain in memory",
        kept_count,
        summary.processed_count,
        released,
        log.len()
    );

    Ok(FilterReport {
        summary,
        archive: Some(archive),
        released,
        store_size: log.len(),
    })
}
