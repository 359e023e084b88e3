//! Ranking metrics for link prediction against a shared pool of negatives.
//!
//! Unlike per-triple filtered ranking, every positive edge is compared with
//! the same set of negative edges (the OGB `ogbl-collab` protocol):
//!
//! ```text
//! threshold = K-th largest negative score
//! hits@K    = |{ p in pos : p > threshold }| / |pos|
//! ```
//!
//! With fewer than K negatives every positive trivially ranks in the top K
//! and hits@K is 1.0.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// K values reported by [`crate::epoch::evaluate_network`], in order.
pub const HITS_AT: [usize; 3] = [10, 50, 100];

/// Metric key for hits@K, e.g. `"hits@50"`.
pub fn hits_key(k: usize) -> String {
    format!("hits@{k}")
}

/// Positive and negative score vectors.
#[derive(Debug, Clone, Copy)]
pub struct EvalInput<'a> {
    pub y_pred_pos: &'a [f32],
    pub y_pred_neg: &'a [f32],
}

/// Rank-threshold evaluator.
pub trait LinkEvaluator {
    /// Set the rank threshold used by subsequent calls to [`eval`](Self::eval).
    fn set_k(&mut self, k: usize);

    /// Metrics keyed by name.
    fn eval(&self, input: &EvalInput<'_>) -> Result<BTreeMap<String, f64>>;
}

/// hits@K evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitsEvaluator {
    k: usize,
}

impl HitsEvaluator {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// hits@K of `pos` against `neg`.
    pub fn hits(&self, pos: &[f32], neg: &[f32]) -> Result<f64> {
        if self.k == 0 {
            return Err(Error::InvalidConfig("hits@K needs K >= 1".into()));
        }
        if pos.is_empty() {
            return Err(Error::EmptyScores);
        }
        if neg.len() < self.k {
            return Ok(1.0);
        }

        let threshold = kth_largest(neg, self.k);
        let hits = pos.iter().filter(|&&p| p > threshold).count();
        Ok(hits as f64 / pos.len() as f64)
    }
}

impl Default for HitsEvaluator {
    fn default() -> Self {
        Self::new(HITS_AT[0])
    }
}

impl LinkEvaluator for HitsEvaluator {
    fn set_k(&mut self, k: usize) {
        self.k = k;
    }

    fn eval(&self, input: &EvalInput<'_>) -> Result<BTreeMap<String, f64>> {
        let value = self.hits(input.y_pred_pos, input.y_pred_neg)?;
        Ok(BTreeMap::from([(hits_key(self.k), value)]))
    }
}

/// K-th largest value (1-based). Requires `1 <= k <= scores.len()`.
fn kth_largest(scores: &[f32], k: usize) -> f32 {
    let mut sorted = scores.to_vec();
    sorted.sort_unstable_by(|a, b| b.total_cmp(a));
    sorted[k - 1]
}
