// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod raw;
mod record;
mod snapshot;
mod source;

// Re-export all public types
pub use config::{
    Config, CrawlerConfig, NewsConfig, RelevanceConfig, ResearchConfig, StreamSettings,
};
pub use raw::{DateCandidates, RawAuthor, RawDate, RawItem};
pub use record::{Record, TimeBasis};
pub use snapshot::{FilterSummary, Snapshot, SourceGroup};
pub use source::{SourceDescriptor, SourceKind, SourceTable};
