//! Inverted index with incrementally maintained BM25 statistics.
//!
//! Maps terms to posting lists and tracks per-document lengths. Corpus
//! statistics (document count, total and average length, document
//! frequencies) are updated on every add and remove, never recomputed by a
//! full scan, and always agree with the postings.

use std::collections::BTreeMap;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::analysis::Token;
use crate::error::{LexstoreError, Result};
use crate::lexical::posting::{Posting, PostingList};

/// Per-document bookkeeping needed to remove a document without scanning
/// every posting list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocEntry {
    /// Number of indexed tokens.
    pub length: u32,
    /// Distinct terms of the document, sorted.
    pub terms: Vec<String>,
}

/// Snapshot of corpus-level statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CorpusStats {
    pub document_count: u64,
    pub total_length: u64,
    pub average_document_length: f64,
}

/// Inverted index mapping terms to posting lists.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    postings: AHashMap<String, PostingList>,
    docs: AHashMap<String, DocEntry>,
    total_length: u64,
    average_length: f64,
    store_positions: bool,
}

impl InvertedIndex {
    /// Creates a new empty inverted index.
    pub fn new(store_positions: bool) -> Self {
        InvertedIndex {
            store_positions,
            ..Default::default()
        }
    }

    /// Index a document's analyzed tokens.
    ///
    /// Fails with [`LexstoreError::DuplicateId`] if the id is already indexed.
    /// A document with no tokens is still counted (zero-length entry).
    pub fn add_document(&mut self, id: &str, tokens: &[Token]) -> Result<()> {
        if self.docs.contains_key(id) {
            return Err(LexstoreError::duplicate_id(id));
        }

        let length = u32::try_from(tokens.len()).map_err(|_| {
            LexstoreError::invalid_document(format!("document {id} has too many tokens"))
        })?;

        // term -> (frequency, positions)
        let mut frequencies: BTreeMap<&str, (u32, Vec<u32>)> = BTreeMap::new();
        for token in tokens {
            let entry = frequencies.entry(token.text.as_str()).or_default();
            entry.0 += 1;
            if self.store_positions {
                entry.1.push(token.position);
            }
        }

        let mut terms = Vec::with_capacity(frequencies.len());
        for (term, (term_frequency, positions)) in frequencies {
            self.postings
                .entry(term.to_string())
                .or_default()
                .insert(Posting {
                    doc_id: id.to_string(),
                    term_frequency,
                    positions: self.store_positions.then_some(positions),
                });
            terms.push(term.to_string());
        }

        self.docs.insert(id.to_string(), DocEntry { length, terms });
        self.total_length += length as u64;
        self.refresh_average();
        Ok(())
    }

    /// Remove a document from every posting list it appears in.
    ///
    /// Fails with [`LexstoreError::NotFound`] if the id is not indexed.
    pub fn remove_document(&mut self, id: &str) -> Result<DocEntry> {
        let entry = self
            .docs
            .remove(id)
            .ok_or_else(|| LexstoreError::not_found(id))?;

        for term in &entry.terms {
            if let Some(list) = self.postings.get_mut(term) {
                list.remove(id);
                if list.is_empty() {
                    self.postings.remove(term);
                }
            }
        }

        self.total_length -= entry.length as u64;
        self.refresh_average();
        Ok(entry)
    }

    // The running total gives the same value as updating the mean
    // incrementally, without accumulating rounding error.
    fn refresh_average(&mut self) {
        self.average_length = if self.docs.is_empty() {
            0.0
        } else {
            self.total_length as f64 / self.docs.len() as f64
        };
    }

    /// Postings of a term; empty if the term was never indexed.
    pub fn get_postings(&self, term: &str) -> &[Posting] {
        self.postings
            .get(term)
            .map(PostingList::as_slice)
            .unwrap_or(&[])
    }

    /// Number of documents containing the term.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, PostingList::len)
    }

    /// Frequency of a term in a document; zero if absent.
    pub fn term_frequency(&self, term: &str, id: &str) -> u32 {
        self.postings
            .get(term)
            .and_then(|list| list.get(id))
            .map_or(0, |p| p.term_frequency)
    }

    pub fn doc_length(&self, id: &str) -> Option<u32> {
        self.docs.get(id).map(|entry| entry.length)
    }

    pub fn doc_entry(&self, id: &str) -> Option<&DocEntry> {
        self.docs.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    pub fn document_count(&self) -> usize {
        self.docs.len()
    }

    pub fn average_document_length(&self) -> f64 {
        self.average_length
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn unique_terms(&self) -> usize {
        self.postings.len()
    }

    pub fn total_postings(&self) -> usize {
        self.postings.values().map(PostingList::len).sum()
    }

    pub fn stores_positions(&self) -> bool {
        self.store_positions
    }

    pub fn stats(&self) -> CorpusStats {
        CorpusStats {
            document_count: self.docs.len() as u64,
            total_length: self.total_length,
            average_document_length: self.average_length,
        }
    }

    /// Iterate over indexed document ids (unordered).
    pub fn doc_ids(&self) -> impl Iterator<Item = &str> {
        self.docs.keys().map(String::as_str)
    }

    /// Iterate over terms and their posting lists (unordered).
    pub fn terms(&self) -> impl Iterator<Item = (&str, &PostingList)> {
        self.postings.iter().map(|(term, list)| (term.as_str(), list))
    }

    /// Remove every document and posting.
    pub fn clear(&mut self) {
        self.postings.clear();
        self.docs.clear();
        self.total_length = 0;
        self.average_length = 0.0;
    }

    /// Rebuild an index from persisted postings and document lengths.
    ///
    /// Checks that every posting references a known document and that each
    /// document's length equals the sum of its term frequencies.
    pub(crate) fn from_parts(
        lengths: impl IntoIterator<Item = (String, u32)>,
        postings: impl IntoIterator<Item = (String, PostingList)>,
        store_positions: bool,
    ) -> Result<Self> {
        let mut docs: AHashMap<String, DocEntry> = lengths
            .into_iter()
            .map(|(id, length)| {
                (
                    id,
                    DocEntry {
                        length,
                        terms: Vec::new(),
                    },
                )
            })
            .collect();

        let mut observed: AHashMap<String, u64> = AHashMap::new();
        let mut index_postings = AHashMap::new();
        for (term, mut list) in postings {
            if list.is_empty() {
                continue;
            }
            if !list.normalize() {
                return Err(LexstoreError::serialization(format!(
                    "duplicate postings for term '{term}'"
                )));
            }
            for posting in list.iter() {
                let entry = docs.get_mut(&posting.doc_id).ok_or_else(|| {
                    LexstoreError::serialization(format!(
                        "posting for term '{term}' references unknown document {}",
                        posting.doc_id
                    ))
                })?;
                entry.terms.push(term.clone());
                *observed.entry(posting.doc_id.clone()).or_default() +=
                    posting.term_frequency as u64;
            }
            index_postings.insert(term, list);
        }

        let mut total_length = 0u64;
        for (id, entry) in docs.iter_mut() {
            entry.terms.sort();
            let expected = observed.get(id).copied().unwrap_or(0);
            if expected != entry.length as u64 {
                return Err(LexstoreError::serialization(format!(
                    "document {id} has length {} but postings sum to {expected}",
                    entry.length
                )));
            }
            total_length += entry.length as u64;
        }

        let mut index = InvertedIndex {
            postings: index_postings,
            docs,
            total_length,
            average_length: 0.0,
            store_positions,
        };
        index.refresh_average();
        Ok(index)
    }
}
