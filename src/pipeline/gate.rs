// src/pipeline/gate.rs

//! Relevance gate: batch records through the classifier and keep what it
//! selects. Batches that cannot be classified are dropped.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::Record;
use crate::pipeline::RetryPolicy;
use crate::services::{Candidate, RelevanceClassifier};

static INDEX_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\[\]]*\]").expect("valid index array pattern"));

/// Result of gating one set of records.
#[derive(Debug, Default)]
pub struct GateOutcome {
    /// Selected records, in input order
    pub kept: Vec<Record>,
    pub processed: usize,
    pub batches: usize,
    /// Batches dropped after exhausting retries
    pub degraded_batches: usize,
}

pub struct RelevanceGate<'a> {
    classifier: &'a dyn RelevanceClassifier,
    batch_size: usize,
    retry: RetryPolicy,
}

impl<'a> RelevanceGate<'a> {
    pub fn new(
        classifier: &'a dyn RelevanceClassifier,
        batch_size: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            classifier,
            batch_size: batch_size.max(1),
            retry,
        }
    }

    /// Classify `records` batch by batch. Never fails: a batch whose replies
    /// stay unusable contributes nothing.
    pub async fn filter(&self, records: &[Record]) -> GateOutcome {
        let total_batches = records.len().div_ceil(self.batch_size);
        let mut outcome = GateOutcome {
            processed: records.len(),
            batches: total_batches,
            ..GateOutcome::default()
        };

        for (batch_no, chunk) in records.chunks(self.batch_size).enumerate() {
            let offset = batch_no * self.batch_size;
            let candidates = to_candidates(chunk);
            let label = format!("relevance batch {}/{}", batch_no + 1, total_batches);
            let classifier = self.classifier;

            let reply = self
                .retry
                .run(&label, |_| {
                    let candidates = &candidates;
                    async move {
                        let reply = classifier.classify(candidates).await?;
                        parse_indices(&reply)
                    }
                })
                .await;

            match reply {
                Ok(indices) => {
                    let selected = batch_selection(&indices, chunk.len());
                    log::info!("{}: kept {} of {}", label, selected.len(), chunk.len());
                    outcome
                        .kept
                        .extend(selected.into_iter().map(|i| records[offset + i].clone()));
                }
                Err(e) => {
                    outcome.degraded_batches += 1;
                    log::error!("{}: dropping {} records: {}", label, chunk.len(), e);
                }
            }
        }

        outcome
    }
}

fn to_candidates(chunk: &[Record]) -> Vec<Candidate> {
    chunk
        .iter()
        .enumerate()
        .map(|(index, record)| Candidate {
            index,
            title: record.title.clone(),
            description: record.description.clone(),
            source: record.source_name.clone(),
        })
        .collect()
}

/// In-range batch positions, ascending, each once.
fn batch_selection(indices: &[i64], batch_len: usize) -> BTreeSet<usize> {
    indices
        .iter()
        .filter_map(|&i| usize::try_from(i).ok())
        .filter(|&i| i < batch_len)
        .collect()
}

/// Extract the first bracketed list from a reply and parse it as integers.
pub fn parse_indices(reply: &str) -> Result<Vec<i64>> {
    let array = INDEX_ARRAY.find(reply).ok_or_else(|| {
        AppError::relevance(format!("no index array in reply: {:.200}", reply))
    })?;
    serde_json::from_str(array.as_str()).map_err(|e| {
        AppError::relevance(format!("malformed index array {:.200}: {}", array.as_str(), e))
    })
}
