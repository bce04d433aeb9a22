//! BM25 Okapi scoring.
//!
//! ```text
//! score(d, Q) = Σ IDF(t) · f(t,d)·(k1+1) / (f(t,d) + k1·(1 − b + b·|d|/avgdl))
//! IDF(t)      = ln((N − df(t) + 0.5) / (df(t) + 0.5) + 1)
//! ```
//!
//! With `epsilon > 0`, each IDF is floored at `epsilon · mean(IDF)` over the
//! query's terms so that very common terms keep a small positive weight.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{LexstoreError, Result};
use crate::lexical::inverted::InvertedIndex;

/// Default term-frequency saturation.
pub const DEFAULT_K1: f64 = 1.2;
/// Default length normalization.
pub const DEFAULT_B: f64 = 0.75;
/// Default IDF floor factor.
pub const DEFAULT_EPSILON: f64 = 0.25;

/// BM25 parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Bm25Params {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl Bm25Params {
    /// Reject out-of-range values. `k1` and `epsilon` must be non-negative,
    /// `b` must lie in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(LexstoreError::invalid_config(format!(
                "k1 must be a non-negative number, got {}",
                self.k1
            )));
        }
        if !self.b.is_finite() || !(0.0..=1.0).contains(&self.b) {
            return Err(LexstoreError::invalid_config(format!(
                "b must be within [0, 1], got {}",
                self.b
            )));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(LexstoreError::invalid_config(format!(
                "epsilon must be a non-negative number, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// IDF weights of one query's distinct, indexed terms, sorted by term.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryWeights {
    terms: Vec<(String, f64)>,
}

impl QueryWeights {
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.terms.iter().map(|(t, w)| (t.as_str(), *w))
    }

    /// True when no query term exists in the index.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }
}

/// Scores documents against a query using an index's statistics.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Scorer {
    params: Bm25Params,
}

impl Bm25Scorer {
    pub fn new(params: Bm25Params) -> Self {
        Bm25Scorer { params }
    }

    pub fn params(&self) -> &Bm25Params {
        &self.params
    }

    /// Raw IDF for a term with document frequency `df` in a corpus of `n`.
    pub fn idf(n: f64, df: f64) -> f64 {
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Compute IDF weights for the distinct query terms present in the index.
    ///
    /// Terms that were never indexed are dropped: they contribute nothing.
    pub fn weights(&self, index: &InvertedIndex, query_terms: &[String]) -> QueryWeights {
        let n = index.document_count() as f64;
        let distinct: BTreeSet<&str> = query_terms.iter().map(String::as_str).collect();

        let mut terms: Vec<(String, f64)> = distinct
            .into_iter()
            .filter_map(|term| {
                let df = index.document_frequency(term);
                (df > 0).then(|| (term.to_string(), Self::idf(n, df as f64)))
            })
            .collect();

        if self.params.epsilon > 0.0 && !terms.is_empty() {
            let mean = terms.iter().map(|(_, idf)| idf).sum::<f64>() / terms.len() as f64;
            let floor = self.params.epsilon * mean;
            for (_, idf) in terms.iter_mut() {
                *idf = idf.max(floor);
            }
        }

        QueryWeights { terms }
    }

    /// Contribution of one term occurring `tf` times in a document of length `dl`.
    pub fn term_score(&self, idf: f64, tf: f64, dl: f64, avgdl: f64) -> f64 {
        if tf <= 0.0 {
            return 0.0;
        }
        let Bm25Params { k1, b, .. } = self.params;
        let length_ratio = if avgdl > 0.0 { dl / avgdl } else { 1.0 };
        idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * length_ratio))
    }

    /// BM25 score of a document for precomputed query weights.
    pub fn score(&self, index: &InvertedIndex, weights: &QueryWeights, doc_id: &str) -> f64 {
        let Some(dl) = index.doc_length(doc_id) else {
            return 0.0;
        };
        let avgdl = index.average_document_length();
        weights
            .iter()
            .map(|(term, idf)| {
                let tf = index.term_frequency(term, doc_id) as f64;
                self.term_score(idf, tf, dl as f64, avgdl)
            })
            .sum()
    }
}

impl Default for Bm25Scorer {
    fn default() -> Self {
        Bm25Scorer::new(Bm25Params::default())
    }
}
