//! Lexical search structures.
//!
//! - `posting`: postings and sorted posting lists
//! - `inverted`: the inverted index and its corpus statistics
//! - `scoring`: BM25 parameters and scorer

pub mod inverted;
pub mod posting;
pub mod scoring;

pub use inverted::{CorpusStats, DocEntry, InvertedIndex};
pub use posting::{Posting, PostingList};
pub use scoring::{Bm25Params, Bm25Scorer, QueryWeights};
