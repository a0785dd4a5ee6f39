//! Storage abstractions for the memory logs and snapshots.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml
//! ├── sources/
//! │   ├── news_feeds.csv        # Feed descriptors
//! │   └── journals.csv          # Journal descriptors
//! ├── memory/
//! │   ├── news_log.csv          # Memory log (news)
//! │   ├── research_log.csv      # Memory log (research)
//! │   └── news_archive_YYYY-MM-DD.csv
//! └── output/
//!     ├── news_articles.json    # Snapshot
//!     └── research_articles.json
//! ```

pub mod local;
pub mod memory;
pub mod table;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Record, Snapshot, SourceTable};

pub use local::LocalStorage;
pub use memory::{KnownKeys, MemoryLog, MergeStats};

/// Trait for storage backends. Keys are paths relative to the backend root.
#[async_trait]
pub trait RecordStorage: Send + Sync {
    /// Load a memory log. A missing or empty file is an empty log.
    async fn load_log(&self, key: &str) -> Result<MemoryLog>;

    /// Replace a memory log, most recent observations first.
    async fn persist_log(&self, key: &str, log: &MemoryLog) -> Result<()>;

    /// Write records verbatim in the memory log format.
    async fn write_records(&self, key: &str, records: &[Record]) -> Result<()>;

    /// Replace a snapshot document.
    async fn write_snapshot(&self, key: &str, snapshot: &Snapshot) -> Result<()>;

    /// Read a snapshot document, if present.
    async fn read_snapshot(&self, key: &str) -> Result<Option<Snapshot>>;

    /// Load a source descriptor table. A missing table is a configuration
    /// error; unreadable rows are reported in the table, not as an error.
    async fn load_sources(&self, key: &str) -> Result<SourceTable>;
}
