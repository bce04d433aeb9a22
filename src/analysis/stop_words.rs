//! Stop-word sets applied after segmentation.

use std::collections::HashSet;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::normalize;

lazy_static! {
    static ref ENGLISH_STOP_WORDS: HashSet<&'static str> = [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
        "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there",
        "these", "they", "this", "to", "was", "will", "with",
    ]
    .into_iter()
    .collect();
}

/// Which terms are dropped during analysis.
///
/// Serialized as `"none"`, `"english"` or `{"custom": ["foo", "bar"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopWords {
    /// Keep every term.
    #[default]
    None,
    /// A small English list (articles, conjunctions, common prepositions).
    English,
    /// Caller-supplied terms, compared after normalization.
    Custom(Vec<String>),
}

impl StopWords {
    /// Builds the lookup set; `None` when no term is ever dropped.
    pub(crate) fn build(&self) -> Option<HashSet<String>> {
        match self {
            StopWords::None => None,
            StopWords::English => Some(ENGLISH_STOP_WORDS.iter().map(|s| s.to_string()).collect()),
            StopWords::Custom(words) => Some(words.iter().map(|w| normalize(w)).collect()),
        }
    }
}
