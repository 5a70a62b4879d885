//! Cosine-similarity recall over the full record history.
//!
//! Scoring is an exact linear scan. `Retriever` is the seam where an
//! approximate index would slot in; the scan stays the default behavior.

use crate::model::MemoryRecord;
use log::{debug, warn};
use std::cmp::Ordering;

/// Default number of records to recall per turn.
pub const DEFAULT_RECALL_K: usize = 5;

/// Cosine similarity between two vectors.
///
/// Zero vectors, mismatched lengths and non-finite results all score 0.0.
/// Sums are taken in `f64` so very large or very small finite components
/// neither overflow nor underflow.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    let na = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    let score = (dot / (na * nb)) as f32;
    if score.is_finite() { score } else { 0.0 }
}

/// Similarity of one history entry to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRecord {
    /// Position of the record in the history slice.
    pub index: usize,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// Score every record, ordered by descending similarity.
///
/// Equal scores keep their history order.
pub fn score_all(query: &[f32], history: &[MemoryRecord]) -> Vec<ScoredRecord> {
    let mut mismatched = 0usize;
    let mut scored = history
        .iter()
        .enumerate()
        .map(|(index, record)| {
            if record.vector.len() != query.len() {
                mismatched += 1;
            }
            ScoredRecord {
                index,
                score: cosine_similarity(query, &record.vector),
            }
        })
        .collect::<Vec<_>>();
    if mismatched > 0 {
        warn!(
            "records with mismatched vector dimension scored as 0 (count={}, query_dim={})",
            mismatched,
            query.len()
        );
    }
    // sort_by is stable, so ties stay in insertion order.
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored
}

/// Return the `k` records most similar to `query`.
pub fn top_k<'a>(query: &[f32], history: &'a [MemoryRecord], k: usize) -> Vec<&'a MemoryRecord> {
    if history.is_empty() || k == 0 {
        return Vec::new();
    }
    score_all(query, history)
        .into_iter()
        .take(k)
        .map(|scored| &history[scored.index])
        .collect()
}

/// Recall settings for a retriever.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecallOptions {
    /// Number of records to return.
    pub k: usize,
    /// Optional minimum similarity; records below it are dropped.
    pub min_score: Option<f32>,
}

impl Default for RecallOptions {
    fn default() -> Self {
        Self {
            k: DEFAULT_RECALL_K,
            min_score: None,
        }
    }
}

/// Top-k retriever over a borrowed history.
#[derive(Debug, Clone, Default)]
pub struct Retriever {
    options: RecallOptions,
}

impl Retriever {
    /// Create a retriever with the given options.
    pub fn new(options: RecallOptions) -> Self {
        Self { options }
    }

    /// Recall settings in use.
    pub fn options(&self) -> RecallOptions {
        self.options
    }

    /// Recall records for a query vector.
    pub fn recall<'a>(&self, query: &[f32], history: &'a [MemoryRecord]) -> Vec<&'a MemoryRecord> {
        if history.is_empty() || self.options.k == 0 {
            return Vec::new();
        }
        let selected = score_all(query, history)
            .into_iter()
            .filter(|scored| {
                self.options
                    .min_score
                    .is_none_or(|min_score| scored.score >= min_score)
            })
            .take(self.options.k)
            .map(|scored| &history[scored.index])
            .collect::<Vec<_>>();
        debug!(
            "recalled memories (history={}, k={}, returned={})",
            history.len(),
            self.options.k,
            selected.len()
        );
        selected
    }
}
