//! Service layer for the crawler application.
//!
//! This module contains the business logic for:
//! - Record normalization (`Normalizer`)
//! - RSS/Atom feed fetching (`FeedFetcher`)
//! - Scholarly metadata fetching (`CrossrefFetcher`)
//! - Relevance classification (`AnthropicClassifier`)

mod crossref;
mod feeds;
mod normalize;
mod relevance;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{RawItem, SourceDescriptor};

pub use crossref::{CrossrefFetcher, decode_work};
pub use feeds::{FeedFetcher, parse_feed};
pub use normalize::{Normalizer, Rejection, parse_raw_date, render_authors, resolve_key};
pub use relevance::{API_KEY_VAR, AnthropicClassifier, build_prompt};

/// Time range a fetch should cover. Sources that cannot filter server-side
/// may ignore it; the crawler applies the lookback cutoff afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub from: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

/// Produces raw candidate items for one source.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &SourceDescriptor, window: &FetchWindow) -> Result<Vec<RawItem>>;
}

/// A record as presented to the relevance classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Position within the batch, starting at 0
    pub index: usize,
    pub title: String,
    pub description: String,
    pub source: String,
}

/// Judges which candidates in a batch are on-topic.
///
/// Returns the classifier's raw reply; extracting indices from it is the
/// caller's job.
#[async_trait]
pub trait RelevanceClassifier: Send + Sync {
    async fn classify(&self, batch: &[Candidate]) -> Result<String>;
}
