//! Document and metadata storage.

pub mod document;
pub mod metadata;

pub use document::{BatchReport, DocumentStore, DocumentUpdate};
pub use metadata::MetadataStore;
