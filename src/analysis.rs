//! Text analysis for lexstore.
//!
//! Turns raw text into index terms. The same [`Analyzer`] instance is used
//! for documents at index time and for query text at search time, so both
//! sides always agree on normalization and segmentation.
//!
//! ```text
//! Text → NFKC normalization → lowercase → word segmentation → stop words → Tokens
//! ```
//!
//! # Examples
//!
//! ```
//! use lexstore::analysis::{Analyzer, StandardAnalyzer};
//!
//! let analyzer = StandardAnalyzer::new();
//! let terms = analyzer.terms("Hello, World!");
//! assert_eq!(terms, vec!["hello", "world"]);
//! ```

pub mod analyzer;
pub mod stop_words;
pub mod token;

pub use analyzer::{Analyzer, StandardAnalyzer};
pub use stop_words::StopWords;
pub use token::Token;
