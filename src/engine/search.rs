use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::data::{Document, Metadata};
use crate::filter::Filter;
use crate::lexical::scoring::Bm25Scorer;
use crate::store::document::DocumentStore;

/// A ranked search request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    /// Free text; analyzed the same way as indexed documents.
    pub query: String,

    /// Metadata filter applied to candidates before scoring.
    pub filter: Option<Filter>,

    /// Maximum number of results. `None` uses the engine's `top_k_default`.
    pub k: Option<usize>,

    /// Results scoring below this value are dropped.
    pub score_threshold: Option<f64>,

    /// Attach the stored document to each result.
    pub include_documents: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        SearchRequest {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn builder(query: impl Into<String>) -> SearchRequestBuilder {
        SearchRequestBuilder {
            request: SearchRequest::new(query),
        }
    }
}

pub struct SearchRequestBuilder {
    request: SearchRequest,
}

impl SearchRequestBuilder {
    pub fn filter(mut self, filter: Filter) -> Self {
        self.request.filter = Some(filter);
        self
    }

    pub fn k(mut self, k: usize) -> Self {
        self.request.k = Some(k);
        self
    }

    pub fn score_threshold(mut self, threshold: f64) -> Self {
        self.request.score_threshold = Some(threshold);
        self
    }

    pub fn include_documents(mut self, include: bool) -> Self {
        self.request.include_documents = include;
        self
    }

    pub fn build(self) -> SearchRequest {
        self.request
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// External document ID.
    pub id: String,
    pub score: f64,
    /// 1-based position in the ranking.
    pub rank: usize,
    pub document: Option<Document>,
}

/// Run a search against one consistent view of the store.
///
/// Candidates are the documents containing at least one query term. The
/// filter runs before scoring, so rejected candidates are never scored.
pub(crate) fn execute(
    store: &DocumentStore,
    scorer: &Bm25Scorer,
    request: &SearchRequest,
    default_k: usize,
) -> Vec<SearchResult> {
    let k = request.k.unwrap_or(default_k);
    if k == 0 {
        return Vec::new();
    }

    let index = store.index();
    let terms = store.analyzer().terms(&request.query);
    let weights = scorer.weights(index, &terms);
    if weights.is_empty() {
        return Vec::new();
    }

    let candidates: BTreeSet<&str> = weights
        .iter()
        .flat_map(|(term, _)| index.get_postings(term))
        .map(|posting| posting.doc_id.as_str())
        .collect();
    let candidate_count = candidates.len();

    let empty = Metadata::new();
    let filter = request.filter.as_ref().filter(|f| !f.is_open());

    let mut scored: Vec<(&str, f64)> = candidates
        .into_iter()
        .filter(|id| filter.is_none_or(|f| f.evaluate(store.metadata(id).unwrap_or(&empty))))
        .map(|id| (id, scorer.score(index, &weights, id)))
        .filter(|(_, score)| request.score_threshold.is_none_or(|t| *score >= t))
        .collect();

    scored.sort_unstable_by(|a, b| match b.1.total_cmp(&a.1) {
        Ordering::Equal => a.0.cmp(b.0),
        other => other,
    });
    scored.truncate(k);

    log::debug!(
        "search '{}': {} terms, {candidate_count} candidates, {} results",
        request.query,
        weights.len(),
        scored.len()
    );

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (id, score))| SearchResult {
            id: id.to_string(),
            score,
            rank: i + 1,
            document: if request.include_documents {
                store.get(id).ok()
            } else {
                None
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::analysis::StandardAnalyzer;
    use crate::data::DataValue;

    fn store(docs: &[(&str, &str, Option<i64>)]) -> DocumentStore {
        let mut store = DocumentStore::new(Arc::new(StandardAnalyzer::new()), false);
        for (id, text, year) in docs {
            let mut doc = Document::new_with_id(*id, *text);
            if let Some(year) = year {
                doc = doc.add_field("year", DataValue::Int64(*year));
            }
            store.add(doc).unwrap();
        }
        store
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_only_overlapping_documents_are_returned() {
        let store = store(&[("d1", "the cat sat", None), ("d2", "the dog sat", None)]);
        let results = execute(&store, &Bm25Scorer::default(), &SearchRequest::new("cat"), 10);
        assert_eq!(ids(&results), vec!["d1"]);
        assert_eq!(results[0].rank, 1);
        assert!(results[0].score > 0.0);
    }

    #[test]
    fn test_filter_before_scoring() {
        let store = store(&[("d1", "alpha", Some(2020)), ("d2", "alpha", Some(2024))]);
        let request = SearchRequest::builder("alpha")
            .filter(Filter::parse(r#"{"year": {"$gte": 2023}}"#).unwrap())
            .build();
        let results = execute(&store, &Bm25Scorer::default(), &request, 10);
        assert_eq!(ids(&results), vec!["d2"]);
    }

    #[test]
    fn test_ties_break_on_ascending_id() {
        let store = store(&[
            ("c", "same words", None),
            ("a", "same words", None),
            ("b", "same words", None),
        ]);
        let results = execute(&store, &Bm25Scorer::default(), &SearchRequest::new("same"), 10);
        assert_eq!(ids(&results), vec!["a", "b", "c"]);
        assert_eq!(results[0].score, results[2].score);
    }

    #[test]
    fn test_k_and_threshold() {
        let store = store(&[
            ("d1", "rust rust rust", None),
            ("d2", "rust and more words here", None),
            ("d3", "rust", None),
        ]);
        let scorer = Bm25Scorer::default();

        let top = execute(&store, &scorer, &SearchRequest::builder("rust").k(2).build(), 10);
        assert_eq!(top.len(), 2);
        assert!(top[0].score >= top[1].score);

        let none = SearchRequest::builder("rust").k(0).build();
        assert!(execute(&store, &scorer, &none, 10).is_empty());

        let all = execute(&store, &scorer, &SearchRequest::new("rust"), 10);
        let cutoff = all[1].score;
        let filtered = execute(
            &store,
            &scorer,
            &SearchRequest::builder("rust").score_threshold(cutoff).build(),
            10,
        );
        assert!(filtered.iter().all(|r| r.score >= cutoff));
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_unseen_and_empty_queries() {
        let store = store(&[("d1", "hello world", None)]);
        let scorer = Bm25Scorer::default();
        assert!(execute(&store, &scorer, &SearchRequest::new("nothing"), 10).is_empty());
        assert!(execute(&store, &scorer, &SearchRequest::new(""), 10).is_empty());
        assert!(execute(&store, &scorer, &SearchRequest::new("?!"), 10).is_empty());
    }

    #[test]
    fn test_include_documents() {
        let store = store(&[("d1", "hello world", Some(2000))]);
        let request = SearchRequest::builder("hello").include_documents(true).build();
        let results = execute(&store, &Bm25Scorer::default(), &request, 10);
        let doc = results[0].document.as_ref().unwrap();
        assert_eq!(doc.text, "hello world");
        assert_eq!(doc.get("year"), Some(&DataValue::Int64(2000)));
    }
}
