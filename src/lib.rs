// src/lib.rs

//! Feed Crawler Library
//!
//! Crawls news feeds and scholarly journals into deduplicated memory logs,
//! projects recent windows into snapshots, and gates news through a
//! relevance classifier.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
