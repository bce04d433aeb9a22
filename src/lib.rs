//! # lexstore
//!
//! A keyword search engine with BM25 ranking and metadata filtering.
//!
//! ## Features
//!
//! - Incrementally maintained inverted index (add, update, delete)
//! - BM25 Okapi scoring with an IDF floor
//! - Metadata filters with comparison, set and boolean operators
//! - Single and batch mutations, all-or-nothing in strict mode
//! - Atomic, checksummed snapshots
//!
//! ```
//! use lexstore::{Document, Engine, EngineConfig, Filter, SearchRequest};
//!
//! let engine = Engine::new(EngineConfig::default())?;
//! engine.add(Document::new_with_id("d1", "alpha beta").add_field("year", 2020i64))?;
//! engine.add(Document::new_with_id("d2", "alpha gamma").add_field("year", 2024i64))?;
//!
//! let request = SearchRequest::builder("alpha")
//!     .filter(Filter::parse(r#"{"year": {"$gte": 2023}}"#)?)
//!     .build();
//! let results = engine.search(&request)?;
//! assert_eq!(results.len(), 1);
//! assert_eq!(results[0].id, "d2");
//! # Ok::<(), lexstore::LexstoreError>(())
//! ```

pub mod analysis;
pub mod data;
pub mod engine;
pub mod error;
pub mod filter;
pub mod lexical;
pub mod persistence;
pub mod store;

// Re-exports for the public API
pub use analysis::{Analyzer, StandardAnalyzer, StopWords};
pub use data::{DataValue, Document, Metadata};
pub use engine::config::{EngineConfig, EngineConfigBuilder};
pub use engine::search::{SearchRequest, SearchRequestBuilder, SearchResult};
pub use engine::{Engine, IndexStats};
pub use error::{LexstoreError, Result};
pub use filter::{Condition, Filter, Predicate};
pub use store::{BatchReport, DocumentUpdate};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
