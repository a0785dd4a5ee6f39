//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::TimeBasis;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// News feed stream
    #[serde(default)]
    pub news: NewsConfig,

    /// Scholarly journal stream
    #[serde(default)]
    pub research: ResearchConfig,

    /// Relevance filter for the news stream
    #[serde(default)]
    pub relevance: RelevanceConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.news.lookback_hours == 0 {
            return Err(AppError::validation("news.lookback_hours must be > 0"));
        }
        if self.research.lookback_days == 0 {
            return Err(AppError::validation("research.lookback_days must be > 0"));
        }
        for (section, retention, window) in [
            ("news", self.news.retention_days, self.news.window_days),
            ("research", self.research.retention_days, self.research.window_days),
        ] {
            if retention == 0 {
                return Err(AppError::validation(format!(
                    "{section}.retention_days must be > 0"
                )));
            }
            if window > retention {
                return Err(AppError::validation(format!(
                    "{section}.window_days ({window}) exceeds retention_days ({retention})"
                )));
            }
        }
        if self.research.rows == 0 || self.research.max_pages == 0 {
            return Err(AppError::validation(
                "research.rows and research.max_pages must be > 0",
            ));
        }
        if self.relevance.batch_size == 0 {
            return Err(AppError::validation("relevance.batch_size must be > 0"));
        }
        if self.relevance.max_retries == 0 {
            return Err(AppError::validation("relevance.max_retries must be > 0"));
        }
        if self.relevance.safety_margin_days >= self.relevance.window_days {
            return Err(AppError::validation(
                "relevance.safety_margin_days must be smaller than relevance.window_days",
            ));
        }
        Ok(())
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// News feed stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    #[serde(default = "defaults::news_sources")]
    pub sources_file: String,
    #[serde(default = "defaults::news_log")]
    pub log_file: String,
    #[serde(default = "defaults::news_output")]
    pub output_file: String,
    /// Trailing crawl cutoff; slightly over the run interval to avoid gaps
    #[serde(default = "defaults::news_lookback_hours")]
    pub lookback_hours: u32,
    #[serde(default = "defaults::news_retention_days")]
    pub retention_days: u32,
    #[serde(default = "defaults::window_days")]
    pub window_days: u32,
    /// Politeness delay between feeds
    #[serde(default = "defaults::news_source_delay")]
    pub source_delay_ms: u64,
    #[serde(default)]
    pub time_basis: TimeBasis,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            sources_file: defaults::news_sources(),
            log_file: defaults::news_log(),
            output_file: defaults::news_output(),
            lookback_hours: defaults::news_lookback_hours(),
            retention_days: defaults::news_retention_days(),
            window_days: defaults::window_days(),
            source_delay_ms: defaults::news_source_delay(),
            time_basis: TimeBasis::Observed,
        }
    }
}

impl NewsConfig {
    pub fn settings(&self) -> StreamSettings {
        StreamSettings {
            label: "news",
            sources_file: self.sources_file.clone(),
            log_file: self.log_file.clone(),
            output_file: self.output_file.clone(),
            lookback: Duration::hours(i64::from(self.lookback_hours)),
            retention: Duration::days(i64::from(self.retention_days)),
            window_days: self.window_days,
            source_delay: StdDuration::from_millis(self.source_delay_ms),
            time_basis: self.time_basis,
        }
    }
}

/// Scholarly journal stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "defaults::research_sources")]
    pub sources_file: String,
    #[serde(default = "defaults::research_log")]
    pub log_file: String,
    #[serde(default = "defaults::research_output")]
    pub output_file: String,
    #[serde(default = "defaults::research_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "defaults::research_retention_days")]
    pub retention_days: u32,
    #[serde(default = "defaults::window_days")]
    pub window_days: u32,
    /// Delay between journal queries (metadata API rate limit)
    #[serde(default = "defaults::research_source_delay")]
    pub source_delay_ms: u64,
    #[serde(default)]
    pub time_basis: TimeBasis,
    /// Base URL of the Crossref REST API
    #[serde(default = "defaults::crossref_api")]
    pub api_url: String,
    /// Contact address for the API's polite pool
    #[serde(default)]
    pub mailto: Option<String>,
    /// Works per page
    #[serde(default = "defaults::crossref_rows")]
    pub rows: u32,
    /// Maximum pages fetched per journal
    #[serde(default = "defaults::crossref_max_pages")]
    pub max_pages: u32,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            sources_file: defaults::research_sources(),
            log_file: defaults::research_log(),
            output_file: defaults::research_output(),
            lookback_days: defaults::research_lookback_days(),
            retention_days: defaults::research_retention_days(),
            window_days: defaults::window_days(),
            source_delay_ms: defaults::research_source_delay(),
            time_basis: TimeBasis::Observed,
            api_url: defaults::crossref_api(),
            mailto: None,
            rows: defaults::crossref_rows(),
            max_pages: defaults::crossref_max_pages(),
        }
    }
}

impl ResearchConfig {
    pub fn settings(&self) -> StreamSettings {
        StreamSettings {
            label: "research",
            sources_file: self.sources_file.clone(),
            log_file: self.log_file.clone(),
            output_file: self.output_file.clone(),
            lookback: Duration::days(i64::from(self.lookback_days)),
            retention: Duration::days(i64::from(self.retention_days)),
            window_days: self.window_days,
            source_delay: StdDuration::from_millis(self.source_delay_ms),
            time_basis: self.time_basis,
        }
    }
}

/// Relevance filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceConfig {
    #[serde(default = "defaults::anthropic_api")]
    pub api_url: String,
    #[serde(default = "defaults::model")]
    pub model: String,
    #[serde(default = "defaults::max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "defaults::temperature")]
    pub temperature: f32,
    /// Subject area the digest is curated for
    #[serde(default = "defaults::topic")]
    pub topic: String,
    /// Records per classifier call
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,
    /// Attempts per batch, including the first
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_secs: u64,
    #[serde(default = "defaults::window_days")]
    pub window_days: u32,
    /// Most recent records kept in the log after filtering
    #[serde(default = "defaults::safety_margin_days")]
    pub safety_margin_days: u32,
    #[serde(default = "defaults::archive_dir")]
    pub archive_dir: String,
    #[serde(default = "defaults::news_output")]
    pub output_file: String,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::anthropic_api(),
            model: defaults::model(),
            max_tokens: defaults::max_tokens(),
            temperature: defaults::temperature(),
            topic: defaults::topic(),
            batch_size: defaults::batch_size(),
            max_retries: defaults::max_retries(),
            retry_delay_secs: defaults::retry_delay(),
            window_days: defaults::window_days(),
            safety_margin_days: defaults::safety_margin_days(),
            archive_dir: defaults::archive_dir(),
            output_file: defaults::news_output(),
        }
    }
}

/// Resolved settings for one crawl stream (news or research).
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub label: &'static str,
    pub sources_file: String,
    pub log_file: String,
    pub output_file: String,
    pub lookback: Duration,
    pub retention: Duration,
    pub window_days: u32,
    pub source_delay: StdDuration,
    pub time_basis: TimeBasis,
}

mod defaults {
    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; feedcrawler/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    pub fn window_days() -> u32 {
        7
    }

    // News defaults
    pub fn news_sources() -> String {
        "sources/news_feeds.csv".into()
    }
    pub fn news_log() -> String {
        "memory/news_log.csv".into()
    }
    pub fn news_output() -> String {
        "output/news_articles.json".into()
    }
    pub fn news_lookback_hours() -> u32 {
        25
    }
    pub fn news_retention_days() -> u32 {
        30
    }
    pub fn news_source_delay() -> u64 {
        2000
    }

    // Research defaults
    pub fn research_sources() -> String {
        "sources/journals.csv".into()
    }
    pub fn research_log() -> String {
        "memory/research_log.csv".into()
    }
    pub fn research_output() -> String {
        "output/research_articles.json".into()
    }
    pub fn research_lookback_days() -> u32 {
        8
    }
    pub fn research_retention_days() -> u32 {
        730
    }
    pub fn research_source_delay() -> u64 {
        100
    }
    pub fn crossref_api() -> String {
        "https://api.crossref.org".into()
    }
    pub fn crossref_rows() -> u32 {
        100
    }
    pub fn crossref_max_pages() -> u32 {
        10
    }

    // Relevance defaults
    pub fn anthropic_api() -> String {
        "https://api.anthropic.com/v1/messages".into()
    }
    pub fn model() -> String {
        "claude-3-5-haiku-latest".into()
    }
    pub fn max_tokens() -> u32 {
        1000
    }
    pub fn temperature() -> f32 {
        0.1
    }
    pub fn topic() -> String {
        "Jewish Studies".into()
    }
    pub fn batch_size() -> usize {
        50
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn retry_delay() -> u64 {
        5
    }
    pub fn safety_margin_days() -> u32 {
        2
    }
    pub fn archive_dir() -> String {
        "memory".into()
    }
}
