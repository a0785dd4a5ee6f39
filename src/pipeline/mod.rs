//! Pipeline stages and run entry points.
//!
//! - `run_crawl`: Crawl one stream's sources into its memory log and snapshot
//! - `run_filter`: Gate the news window through the relevance classifier

pub mod crawl;
pub mod gate;
pub mod project;
pub mod retry;
pub mod run;

pub use crawl::{CrawlOutcome, SourceCrawler};
pub use gate::{GateOutcome, RelevanceGate, parse_indices};
pub use project::{project, select_window};
pub use retry::RetryPolicy;
pub use run::{CrawlReport, FilterReport, run_crawl, run_filter};
